//! HTTP surface: the `/api` REST routes, the `/ws` feed and the optional
//! dashboard bundle. Every route except login, registration and health
//! needs a bearer token; role checks happen in the handlers.
use crate::auth::{self, AuthUser};
use crate::dashboard;
use crate::errors::LavError;
use crate::hub::Hub;
use crate::jobs;
use crate::jwks::JwksManager;
use crate::mqtt::MqttBridge;
use crate::settings::Settings;
use crate::storage::{
    self, AccessLogFilter, AlertFilter, ClientFilter, ClientUpdate, ConfigUpdate, DeviceFilter,
    DeviceUpdate, NewAccessLog, NewClient, NewDevice, NewStore, NewUser, Store, StoreFilter,
    StoreUpdate, User, UserUpdate,
};
use crate::types::{AccessMethod, DeviceCommand, Role, Severity};
use axum::body::Body;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{FromRequest, FromRequestParts, Path, State, WebSocketUpgrade};
use axum::http::{header, HeaderName, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use miette::IntoDiagnostic;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub db: DatabaseConnection,
    pub jwks: JwksManager,
    pub hub: Hub,
    pub mqtt: MqttBridge,
}

/// `Json` whose rejection is a `{message}` 400.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(LavError))]
pub struct ApiJson<T>(pub T);

/// `Query` whose rejection is a `{message}` 400.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(LavError))]
pub struct ApiQuery<T>(pub T);

// Security headers middleware
async fn security_headers(request: Request<Body>, next: Next) -> impl IntoResponse {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    // The dashboard talks back over fetch and WebSocket only
    headers.insert(
        HeaderName::from_static("content-security-policy"),
        HeaderValue::from_static("default-src 'self'; connect-src 'self' ws: wss:; style-src 'self' 'unsafe-inline'; img-src 'self' data: https:"),
    );
    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
    );

    response
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if allowed.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(allowed)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
    )
}

fn api_routes(allow_public_registration: bool) -> Router<AppState> {
    let mut api = Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/auth/password", axum::routing::put(change_password))
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/{id}",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/users/{id}/unlock", post(unlock_user))
        .route("/stores", get(list_stores).post(create_store))
        .route(
            "/stores/{id}",
            get(get_store).patch(update_store).delete(delete_store),
        )
        .route("/devices", get(list_devices).post(create_device))
        .route(
            "/devices/{id}",
            get(get_device).patch(update_device).delete(delete_device),
        )
        .route("/devices/{id}/command", post(send_device_command))
        .route("/clients", get(list_clients).post(create_client))
        .route(
            "/clients/{id}",
            get(get_client).patch(update_client).delete(delete_client),
        )
        .route("/access-logs", get(list_access_logs))
        .route("/alerts", get(list_alerts))
        .route("/alerts/{id}/resolve", post(resolve_alert))
        .route("/dashboard/summary", get(dashboard_summary))
        .route("/dashboard/access-stats", get(dashboard_access_stats))
        .route("/dashboard/stores", get(dashboard_stores))
        .route("/dashboard/recent-activity", get(dashboard_recent_activity))
        .route("/config", get(get_config).patch(update_config))
        .route("/jobs", get(list_jobs))
        .route("/jobs/{name}/run", post(run_job));

    if allow_public_registration {
        tracing::info!("Public user registration is ENABLED");
        api = api.route("/auth/register", post(register));
    } else {
        tracing::info!("Public user registration is DISABLED - use the users API");
    }

    api.fallback(api_not_found)
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let settings = state.settings.clone();

    let mut router = Router::new()
        .nest("/api", api_routes(settings.server.allow_public_registration))
        .route("/ws", get(ws_handler))
        .route("/.well-known/jwks.json", get(jwks));

    if let Some(dir) = &settings.server.static_dir {
        tracing::info!(dir = %dir.display(), "Serving dashboard assets");
        router = router
            .fallback_service(ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html"))));
    }

    let mut router = router
        .layer(middleware::from_fn(security_headers))
        .with_state(state);

    if let Some(cors) = cors_layer(&settings.server.cors_origins) {
        router = router.layer(cors);
    }
    router
}

pub async fn serve(state: AppState) -> miette::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        state.settings.server.host, state.settings.server.port
    )
    .parse()
    .map_err(|e| miette::miette!("bad listen addr: {e}"))?;

    let app = router(state);

    tracing::info!(%addr, "API listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .into_diagnostic()?;
    axum::serve(listener, app).await.into_diagnostic()?;
    Ok(())
}

async fn api_not_found() -> LavError {
    LavError::NotFound("No such endpoint".to_string())
}

async fn jwks(State(state): State<AppState>) -> Json<Value> {
    Json(state.jwks.jwks_json())
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let database = state.db.ping().await.is_ok();
    Json(json!({
        "status": if database { "ok" } else { "degraded" },
        "database": database,
        "mqtt": state.mqtt.is_enabled(),
        "websocketConnections": state.hub.connection_count(),
    }))
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    token: String,
    expires_at: i64,
    user: User,
}

async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, LavError> {
    let user = storage::login(&state.db, &state.settings.auth, &req.username, &req.password)
        .await
        .inspect_err(|e| tracing::info!(username = %req.username, error = %e, "Login rejected"))?;

    let (token, expires_at) = state.jwks.issue_token(
        &user.id,
        &user.username,
        user.role.as_str(),
        state.settings.auth.token_ttl_secs,
    )?;
    tracing::info!(username = %user.username, "User logged in");

    Ok(Json(LoginResponse {
        token,
        expires_at,
        user,
    }))
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    username: String,
    password: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: Option<String>,
}

async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), LavError> {
    let user = storage::create_user(
        &state.db,
        NewUser {
            username: req.username,
            password: req.password,
            name: req.name,
            email: req.email,
            role: Role::Operator,
            alert_classification: Severity::Critical,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn me(State(state): State<AppState>, auth: AuthUser) -> Result<Json<User>, LavError> {
    storage::get_user(&state.db, &auth.id)
        .await?
        .map(Json)
        .ok_or_else(|| LavError::NotFound(format!("User not found: {}", auth.id)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest {
    current_password: String,
    new_password: String,
}

async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> Result<StatusCode, LavError> {
    storage::change_password(&state.db, &auth.id, &req.current_password, &req.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Users
// ============================================================================

async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<User>>, LavError> {
    auth.require_admin()?;
    Ok(Json(storage::list_users(&state.db).await?))
}

async fn create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(input): ApiJson<NewUser>,
) -> Result<(StatusCode, Json<User>), LavError> {
    auth.require_admin()?;
    let user = storage::create_user(&state.db, input).await?;
    tracing::info!(admin = %auth.username, username = %user.username, "User created");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<User>, LavError> {
    if !auth.is_admin() && auth.id != id {
        return Err(LavError::Forbidden(
            "Administrator role required".to_string(),
        ));
    }
    storage::get_user(&state.db, &id)
        .await?
        .map(Json)
        .ok_or_else(|| LavError::NotFound(format!("User not found: {}", id)))
}

async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<UserUpdate>,
) -> Result<Json<User>, LavError> {
    auth.require_admin()?;
    let demotes_self =
        update.enabled == Some(false) || matches!(update.role, Some(r) if r != Role::Admin);
    if auth.id == id && demotes_self {
        return Err(LavError::BadRequest(
            "Administrators cannot disable or demote themselves".to_string(),
        ));
    }
    Ok(Json(storage::update_user(&state.db, &id, update).await?))
}

async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, LavError> {
    auth.require_admin()?;
    if auth.id == id {
        return Err(LavError::BadRequest(
            "Administrators cannot delete themselves".to_string(),
        ));
    }
    storage::delete_user(&state.db, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn unlock_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<User>, LavError> {
    auth.require_admin()?;
    Ok(Json(storage::unlock_user(&state.db, &id).await?))
}

// ============================================================================
// Stores
// ============================================================================

/// Operators never see Wi-Fi or door secrets.
fn present_store(store: Store, auth: &AuthUser) -> Store {
    if auth.role == Role::Operator {
        store.redacted()
    } else {
        store
    }
}

async fn list_stores(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(filter): ApiQuery<StoreFilter>,
) -> Result<Json<Vec<Store>>, LavError> {
    let stores = storage::list_stores(&state.db, &filter).await?;
    Ok(Json(
        stores
            .into_iter()
            .map(|s| present_store(s, &auth))
            .collect(),
    ))
}

async fn get_store(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i32>,
) -> Result<Json<Store>, LavError> {
    storage::get_store(&state.db, id)
        .await?
        .map(|s| Json(present_store(s, &auth)))
        .ok_or_else(|| LavError::NotFound(format!("Store not found: {}", id)))
}

async fn create_store(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(input): ApiJson<NewStore>,
) -> Result<(StatusCode, Json<Store>), LavError> {
    auth.require_site_manager()?;
    let store = storage::create_store(&state.db, input).await?;
    state
        .hub
        .broadcast("store_created", &store.clone().redacted());
    Ok((StatusCode::CREATED, Json(store)))
}

async fn update_store(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i32>,
    ApiJson(update): ApiJson<StoreUpdate>,
) -> Result<Json<Store>, LavError> {
    auth.require_site_manager()?;
    let store = storage::update_store(&state.db, id, update).await?;
    state
        .hub
        .broadcast("store_updated", &store.clone().redacted());
    Ok(Json(store))
}

async fn delete_store(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, LavError> {
    auth.require_site_manager()?;
    storage::delete_store(&state.db, id).await?;
    state.hub.broadcast("store_deleted", &json!({ "id": id }));
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Devices
// ============================================================================

async fn list_devices(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiQuery(filter): ApiQuery<DeviceFilter>,
) -> Result<Json<Vec<storage::Device>>, LavError> {
    Ok(Json(storage::list_devices(&state.db, &filter).await?))
}

async fn get_device(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<storage::Device>, LavError> {
    storage::get_device(&state.db, &id)
        .await?
        .map(Json)
        .ok_or_else(|| LavError::NotFound(format!("Device not found: {}", id)))
}

async fn create_device(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(input): ApiJson<NewDevice>,
) -> Result<(StatusCode, Json<storage::Device>), LavError> {
    auth.require_site_manager()?;
    let device = storage::create_device(&state.db, input).await?;
    state.hub.broadcast("device_created", &device);
    Ok((StatusCode::CREATED, Json(device)))
}

async fn update_device(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<DeviceUpdate>,
) -> Result<Json<storage::Device>, LavError> {
    auth.require_site_manager()?;
    let device = storage::update_device(&state.db, &id, update).await?;
    state.hub.broadcast("device_updated", &device);
    Ok(Json(device))
}

async fn delete_device(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, LavError> {
    auth.require_site_manager()?;
    storage::delete_device(&state.db, &id).await?;
    state.hub.broadcast("device_deleted", &json!({ "id": id }));
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct CommandRequest {
    command: DeviceCommand,
    #[serde(default)]
    payload: Value,
}

/// Publish a command and record it as a remote access attempt. A refused
/// publish is still logged, then reported as a 500.
async fn send_device_command(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<CommandRequest>,
) -> Result<Json<Value>, LavError> {
    let device = storage::get_device(&state.db, &id)
        .await?
        .ok_or_else(|| LavError::NotFound(format!("Device not found: {}", id)))?;

    let sent = state
        .mqtt
        .send_command(&device.id, req.command, &req.payload)
        .await;

    let log = storage::record_access_log(
        &state.db,
        NewAccessLog {
            user_id: Some(auth.id.clone()),
            client_id: None,
            device_id: Some(device.id.clone()),
            store_id: device.store_id,
            method: AccessMethod::Remote,
            success: sent,
            details: Some(format!("{} by {}", req.command, auth.username)),
        },
    )
    .await?;
    state.hub.broadcast("access_log_created", &log);

    if !sent {
        return Err(LavError::Other(format!(
            "Failed to send {} command to device {}",
            req.command, device.id
        )));
    }

    Ok(Json(json!({
        "deviceId": device.id,
        "command": req.command,
        "sent": true,
        "accessLogId": log.id,
    })))
}

// ============================================================================
// Clients
// ============================================================================

async fn list_clients(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiQuery(filter): ApiQuery<ClientFilter>,
) -> Result<Json<Vec<storage::Client>>, LavError> {
    Ok(Json(storage::list_clients(&state.db, &filter).await?))
}

async fn get_client(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i32>,
) -> Result<Json<storage::Client>, LavError> {
    storage::get_client(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| LavError::NotFound(format!("Client not found: {}", id)))
}

async fn create_client(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiJson(input): ApiJson<NewClient>,
) -> Result<(StatusCode, Json<storage::Client>), LavError> {
    let client = storage::create_client(&state.db, input).await?;
    state.hub.broadcast("client_created", &client);
    Ok((StatusCode::CREATED, Json(client)))
}

async fn update_client(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i32>,
    ApiJson(update): ApiJson<ClientUpdate>,
) -> Result<Json<storage::Client>, LavError> {
    let client = storage::update_client(&state.db, id, update).await?;
    state.hub.broadcast("client_updated", &client);
    Ok(Json(client))
}

async fn delete_client(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, LavError> {
    auth.require_site_manager()?;
    storage::delete_client(&state.db, id).await?;
    state.hub.broadcast("client_deleted", &json!({ "id": id }));
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Access logs and alerts
// ============================================================================

async fn list_access_logs(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiQuery(filter): ApiQuery<AccessLogFilter>,
) -> Result<Json<Vec<storage::AccessLog>>, LavError> {
    Ok(Json(storage::list_access_logs(&state.db, &filter).await?))
}

async fn list_alerts(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiQuery(filter): ApiQuery<AlertFilter>,
) -> Result<Json<Vec<storage::Alert>>, LavError> {
    Ok(Json(storage::list_alerts(&state.db, &filter).await?))
}

async fn resolve_alert(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i32>,
) -> Result<Json<storage::Alert>, LavError> {
    let alert = storage::resolve_alert(&state.db, id, &auth.id).await?;
    tracing::info!(alert_id = id, user = %auth.username, "Alert resolved");
    state.hub.broadcast("alert_resolved", &alert);
    Ok(Json(alert))
}

// ============================================================================
// Dashboard
// ============================================================================

async fn dashboard_summary(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<dashboard::Summary>, LavError> {
    Ok(Json(dashboard::summary(&state.db).await?))
}

#[derive(Debug, Deserialize)]
struct StatsQuery {
    days: Option<u32>,
}

async fn dashboard_access_stats(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiQuery(q): ApiQuery<StatsQuery>,
) -> Result<Json<Vec<dashboard::DayStats>>, LavError> {
    let days = dashboard::clamp_days(q.days);
    Ok(Json(dashboard::access_stats(&state.db, days).await?))
}

async fn dashboard_stores(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<Vec<dashboard::StoreOverview>>, LavError> {
    Ok(Json(dashboard::store_overview(&state.db).await?))
}

#[derive(Debug, Deserialize)]
struct ActivityQuery {
    limit: Option<u64>,
}

async fn dashboard_recent_activity(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiQuery(q): ApiQuery<ActivityQuery>,
) -> Result<Json<dashboard::RecentActivity>, LavError> {
    Ok(Json(dashboard::recent_activity(&state.db, q.limit).await?))
}

// ============================================================================
// System configuration and jobs
// ============================================================================

async fn get_config(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<storage::SystemConfig>, LavError> {
    Ok(Json(storage::get_system_config(&state.db).await?))
}

async fn update_config(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(update): ApiJson<ConfigUpdate>,
) -> Result<Json<storage::SystemConfig>, LavError> {
    auth.require_admin()?;
    let config = storage::update_system_config(&state.db, update).await?;
    state.hub.broadcast("config_updated", &config);
    Ok(Json(config))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobsQuery {
    job_name: Option<String>,
    #[serde(default)]
    only_failures: bool,
    limit: Option<u64>,
}

async fn list_jobs(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(q): ApiQuery<JobsQuery>,
) -> Result<Json<Value>, LavError> {
    auth.require_admin()?;
    let executions = jobs::recent_executions(
        &state.db,
        q.job_name.as_deref(),
        q.only_failures,
        q.limit.unwrap_or(50),
    )
    .await?;
    Ok(Json(json!({
        "jobs": jobs::available_jobs(&state.settings.jobs),
        "executions": executions,
    })))
}

async fn run_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(name): Path<String>,
) -> Result<Json<jobs::JobRun>, LavError> {
    auth.require_admin()?;
    Ok(Json(
        jobs::trigger_job_manually(&state.db, &state.hub, &name).await?,
    ))
}

// ============================================================================
// WebSocket
// ============================================================================

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

/// Browsers cannot set headers on an upgrade request, so the bearer token
/// travels in the query string. It is checked before upgrading.
async fn ws_handler(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<WsQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Some(token) = q.token.as_deref().filter(|t| !t.is_empty()) else {
        return LavError::Unauthorized("token query parameter required".to_string())
            .into_response();
    };
    let user = match auth::authenticate(&state, token).await {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let (access_tx, access_rx) = watch::channel(Some(user.alert_classification));
    tokio::spawn(auth::watch_socket_access(
        state.db.clone(),
        user.id.clone(),
        access_tx,
    ));

    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| async move {
        hub.serve_socket(socket, user.username, access_rx).await
    })
}

