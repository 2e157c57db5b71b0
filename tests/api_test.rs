mod helpers;

use axum::http::{Method, StatusCode};
use helpers::db::{seed_access_log, seed_alert};
use helpers::{DeviceBuilder, StoreBuilder, TestApp, UserBuilder};
use lavcontrol::settings::Settings;
use lavcontrol::storage;
use lavcontrol::types::{Role, Severity};
use serde_json::json;

// ============================================================================
// Health and authentication
// ============================================================================

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new().await;

    let (status, body) = app.request(Method::GET, "/api/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["mqtt"], false);
    assert_eq!(body["websocketConnections"], 0);
}

#[tokio::test]
async fn test_login_returns_token_and_user() {
    let app = TestApp::new().await;
    UserBuilder::new("maria")
        .with_role(Role::Manager)
        .create(app.db.connection())
        .await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"username": "maria", "password": "password123"})),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().unwrap().split('.').count() == 3);
    assert!(body["expiresAt"].as_i64().unwrap() > 0);
    assert_eq!(body["user"]["username"], "maria");
    assert_eq!(body["user"]["role"], "manager");
    assert!(body["user"].get("passwordHash").is_none());

    // the issued token works
    let token = body["token"].as_str().unwrap();
    let (status, me) = app.get("/api/auth/me", token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "maria");
}

#[tokio::test]
async fn test_login_bad_credentials_and_lockout() {
    let app = TestApp::new().await;
    UserBuilder::new("maria").create(app.db.connection()).await;
    let attempt = |password: &'static str| {
        app.request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"username": "maria", "password": password})),
        )
    };

    for _ in 0..4 {
        let (status, body) = attempt("wrong-password").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid username or password");
    }
    let (status, _) = attempt("wrong-password").await;
    assert_eq!(status, StatusCode::LOCKED);

    let (status, _) = attempt("password123").await;
    assert_eq!(status, StatusCode::LOCKED);
}

#[tokio::test]
async fn test_login_malformed_body() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"username": "maria"})),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_missing_and_invalid_token() {
    let app = TestApp::new().await;

    let (status, body) = app.request(Method::GET, "/api/stores", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Bearer token required");

    let (status, _) = app.get("/api/stores", "not-a-jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_disabled_user_token_rejected() {
    let app = TestApp::new().await;
    let (user, token) = app.token_for("joao", Role::Operator).await;
    storage::update_user(
        app.db.connection(),
        &user.id,
        storage::UserUpdate {
            enabled: Some(false),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let (status, _) = app.get("/api/auth/me", &token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_change_password() {
    let app = TestApp::new().await;
    let (_, token) = app.token_for("maria", Role::Operator).await;

    let (status, _) = app
        .request(
            Method::PUT,
            "/api/auth/password",
            Some(&token),
            Some(json!({"currentPassword": "wrong", "newPassword": "another-pass"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(
            Method::PUT,
            "/api/auth/password",
            Some(&token),
            Some(json!({"currentPassword": "password123", "newPassword": "another-pass"})),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_registration_disabled_by_default() {
    let app = TestApp::new().await;

    let (status, _) = app
        .request(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"username": "newbie", "password": "password123"})),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_registration_creates_operator() {
    let mut settings = Settings::default();
    settings.server.allow_public_registration = true;
    let app = TestApp::with_settings(settings).await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"username": "newbie", "password": "password123", "role": "admin"})),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "operator");
}

// ============================================================================
// Users
// ============================================================================

#[tokio::test]
async fn test_users_are_admin_only() {
    let app = TestApp::new().await;
    let (operator, op_token) = app.token_for("operator", Role::Operator).await;
    let (_, admin_token) = app.token_for("boss", Role::Admin).await;

    let (status, _) = app.get("/api/users", &op_token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // operators can read themselves
    let (status, body) = app
        .get(&format!("/api/users/{}", operator.id), &op_token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "operator");

    let (status, users) = app.get("/api/users", &admin_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_admin_user_crud() {
    let app = TestApp::new().await;
    let (admin, token) = app.token_for("boss", Role::Admin).await;

    let (status, created) = app
        .post(
            "/api/users",
            &token,
            json!({
                "username": "carla",
                "password": "password123",
                "role": "manager",
                "alertClassification": "warning"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["alertClassification"], "warning");
    let id = created["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .post(
            "/api/users",
            &token,
            json!({"username": "carla", "password": "password123"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, updated) = app
        .patch(
            &format!("/api/users/{}", id),
            &token,
            json!({"name": "Carla Dias", "role": "operator"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Carla Dias");
    assert_eq!(updated["role"], "operator");

    let (status, _) = app
        .delete(&format!("/api/users/{}", admin.id), &token)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .patch(
            &format!("/api/users/{}", admin.id),
            &token,
            json!({"role": "operator"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .patch(
            &format!("/api/users/{}", admin.id),
            &token,
            json!({"enabled": false}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.delete(&format!("/api/users/{}", id), &token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&format!("/api/users/{}", id), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_unlocks_user() {
    let app = TestApp::new().await;
    let (_, token) = app.token_for("boss", Role::Admin).await;
    let user = UserBuilder::new("maria").create(app.db.connection()).await;
    let auth = app.state.settings.auth.clone();
    for _ in 0..auth.max_failed_logins {
        let _ = storage::login(app.db.connection(), &auth, "maria", "nope-nope").await;
    }

    let (status, body) = app
        .post(&format!("/api/users/{}/unlock", user.id), &token, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["lockedUntil"].is_null());

    assert!(
        storage::login(app.db.connection(), &auth, "maria", "password123")
            .await
            .is_ok()
    );
}

// ============================================================================
// Stores
// ============================================================================

#[tokio::test]
async fn test_store_mutations_require_manager() {
    let app = TestApp::new().await;
    let (_, op_token) = app.token_for("operator", Role::Operator).await;
    let (_, mgr_token) = app.token_for("mgr", Role::Manager).await;
    let body = json!({"name": "Centro", "code": "CTR", "washPriceCents": 1500});

    let (status, _) = app.post("/api/stores", &op_token, body.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, store) = app.post("/api/stores", &mgr_token, body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(store["washPriceCents"], 1500);
    assert_eq!(store["opensAt"], "07:00");

    let (status, _) = app.post("/api/stores", &mgr_token, body).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let id = store["id"].as_i64().unwrap();
    let (status, updated) = app
        .patch(
            &format!("/api/stores/{}", id),
            &mgr_token,
            json!({"status": "inactive", "address": "Rua A, 10"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "inactive");
    assert_eq!(updated["address"], "Rua A, 10");

    let (status, _) = app
        .patch(
            &format!("/api/stores/{}", id),
            &mgr_token,
            json!({"closesAt": "25:99"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.delete(&format!("/api/stores/{}", id), &op_token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.delete(&format!("/api/stores/{}", id), &mgr_token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&format!("/api/stores/{}", id), &mgr_token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_store_secrets_hidden_from_operators() {
    let app = TestApp::new().await;
    let (_, op_token) = app.token_for("operator", Role::Operator).await;
    let (_, mgr_token) = app.token_for("mgr", Role::Manager).await;
    let store = StoreBuilder::new("CTR")
        .with_secrets("wifi-secret", "4321")
        .create(app.db.connection())
        .await;
    let uri = format!("/api/stores/{}", store.id);

    let (_, as_operator) = app.get(&uri, &op_token).await;
    assert!(as_operator["wifiPassword"].is_null());
    assert!(as_operator["doorPassword"].is_null());
    assert_eq!(as_operator["wifiSsid"], "lav-guest");

    let (_, as_manager) = app.get(&uri, &mgr_token).await;
    assert_eq!(as_manager["wifiPassword"], "wifi-secret");
    assert_eq!(as_manager["doorPassword"], "4321");

    let (_, list) = app.get("/api/stores", &op_token).await;
    assert!(list[0]["doorPassword"].is_null());
}

#[tokio::test]
async fn test_store_biometry_link_conflict() {
    let app = TestApp::new().await;
    let (_, token) = app.token_for("mgr", Role::Manager).await;
    let db = app.db.connection();
    let owner = StoreBuilder::new("A").create(db).await;
    let other = StoreBuilder::new("B").create(db).await;
    DeviceBuilder::new("door-a").in_store(owner.id).create(db).await;

    let (status, _) = app
        .patch(
            &format!("/api/stores/{}", other.id),
            &token,
            json!({"biometry": "door-a"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .patch(
            &format!("/api/stores/{}", owner.id),
            &token,
            json!({"biometry": "door-a"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["biometry"], "door-a");

    let (status, body) = app
        .patch(
            &format!("/api/stores/{}", owner.id),
            &token,
            json!({"biometry": null}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["biometry"].is_null());
}

// ============================================================================
// Devices and commands
// ============================================================================

#[tokio::test]
async fn test_device_crud() {
    let app = TestApp::new().await;
    let (_, token) = app.token_for("mgr", Role::Manager).await;
    let (_, op_token) = app.token_for("operator", Role::Operator).await;
    let store = StoreBuilder::new("CTR").create(app.db.connection()).await;

    let (status, device) = app
        .post(
            "/api/devices",
            &token,
            json!({"id": "door-1", "name": "Front door", "kind": "facial", "storeId": store.id}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(device["status"], "offline");

    let (status, _) = app
        .post(
            "/api/devices",
            &op_token,
            json!({"id": "door-2", "name": "Back door", "kind": "keypad"}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post(
            "/api/devices",
            &token,
            json!({"id": "door/2", "name": "Bad", "kind": "keypad"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, listed) = app
        .get(&format!("/api/devices?storeId={}", store.id), &op_token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, updated) = app
        .patch("/api/devices/door-1", &token, json!({"storeId": null}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(updated["storeId"].is_null());

    let (status, _) = app.delete("/api/devices/door-1", &token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get("/api/devices/door-1", &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_command_without_broker_fails_and_is_logged() {
    let app = TestApp::new().await;
    let (operator, token) = app.token_for("operator", Role::Operator).await;
    let store = StoreBuilder::new("CTR").create(app.db.connection()).await;
    DeviceBuilder::new("door-1")
        .in_store(store.id)
        .create(app.db.connection())
        .await;

    let (status, body) = app
        .post(
            "/api/devices/door-1/command",
            &token,
            json!({"command": "open"}),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Internal server error");

    let (status, logs) = app.get("/api/access-logs?deviceId=door-1", &token).await;
    assert_eq!(status, StatusCode::OK);
    let logs = logs.as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["method"], "remote");
    assert_eq!(logs[0]["success"], false);
    assert_eq!(logs[0]["userId"], operator.id.as_str());
    assert_eq!(logs[0]["storeId"], store.id);
}

#[tokio::test]
async fn test_command_validation() {
    let app = TestApp::new().await;
    let (_, token) = app.token_for("operator", Role::Operator).await;
    DeviceBuilder::new("door-1").create(app.db.connection()).await;

    let (status, _) = app
        .post(
            "/api/devices/ghost/command",
            &token,
            json!({"command": "open"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post(
            "/api/devices/door-1/command",
            &token,
            json!({"command": "explode"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Clients
// ============================================================================

#[tokio::test]
async fn test_clients_any_role_edits_managers_delete() {
    let app = TestApp::new().await;
    let (_, op_token) = app.token_for("operator", Role::Operator).await;
    let (_, mgr_token) = app.token_for("mgr", Role::Manager).await;

    let (status, client) = app
        .post(
            "/api/clients",
            &op_token,
            json!({"name": "Ana Lima", "phone": "+55 11 99999-0000"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(client["status"], "active");
    let uri = format!("/api/clients/{}", client["id"]);

    let (status, updated) = app
        .patch(&uri, &op_token, json!({"status": "vip", "phone": null}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "vip");
    assert!(updated["phone"].is_null());

    let (_, vips) = app.get("/api/clients?status=vip", &op_token).await;
    assert_eq!(vips.as_array().unwrap().len(), 1);

    let (status, _) = app.delete(&uri, &op_token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.delete(&uri, &mgr_token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_client_rejects_unknown_status() {
    let app = TestApp::new().await;
    let (_, token) = app.token_for("operator", Role::Operator).await;

    let (status, _) = app
        .post(
            "/api/clients",
            &token,
            json!({"name": "Ana", "status": "gold"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Access logs and alerts
// ============================================================================

#[tokio::test]
async fn test_access_log_filters() {
    let app = TestApp::new().await;
    let (_, token) = app.token_for("operator", Role::Operator).await;
    let db = app.db.connection();
    seed_access_log(db, None, None, true).await;
    seed_access_log(db, None, None, false).await;
    seed_access_log(db, None, None, false).await;

    let (_, failed) = app.get("/api/access-logs?success=false", &token).await;
    assert_eq!(failed.as_array().unwrap().len(), 2);

    let (_, page) = app.get("/api/access-logs?limit=1&offset=1", &token).await;
    assert_eq!(page.as_array().unwrap().len(), 1);

    let (status, _) = app.get("/api/access-logs?limit=lots", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_alert_resolve_is_one_way() {
    let app = TestApp::new().await;
    let (user, token) = app.token_for("operator", Role::Operator).await;
    let alert = seed_alert(app.db.connection(), Severity::Critical, None).await;
    let uri = format!("/api/alerts/{}/resolve", alert.id);

    let (status, resolved) = app.post(&uri, &token, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resolved["resolved"], true);
    assert_eq!(resolved["resolvedBy"], user.id.as_str());

    let (status, body) = app.post(&uri, &token, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["message"].as_str().unwrap().contains("already resolved"));

    let (status, _) = app.post("/api/alerts/9999/resolve", &token, json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, active) = app.get("/api/alerts?resolved=false", &token).await;
    assert!(active.as_array().unwrap().is_empty());
}

// ============================================================================
// Dashboard
// ============================================================================

#[tokio::test]
async fn test_dashboard_endpoints() {
    let app = TestApp::new().await;
    let (_, token) = app.token_for("operator", Role::Operator).await;
    let db = app.db.connection();
    let store = StoreBuilder::new("CTR").create(db).await;
    DeviceBuilder::new("door-1")
        .in_store(store.id)
        .online()
        .create(db)
        .await;
    seed_access_log(db, Some("door-1"), Some(store.id), true).await;
    seed_alert(db, Severity::Warning, Some(store.id)).await;

    let (status, summary) = app.get("/api/dashboard/summary", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["devices"]["online"], 1);
    assert_eq!(summary["alerts"]["active"], 1);
    assert_eq!(summary["alerts"]["critical"], 0);
    assert_eq!(summary["accessesToday"]["successful"], 1);

    let (status, stats) = app.get("/api/dashboard/access-stats?days=3", &token).await;
    assert_eq!(status, StatusCode::OK);
    let stats = stats.as_array().unwrap();
    assert_eq!(stats.len(), 3);
    assert_eq!(stats[2]["successful"], 1);

    let (_, stats) = app.get("/api/dashboard/access-stats", &token).await;
    assert_eq!(stats.as_array().unwrap().len(), 7);

    let (_, stores) = app.get("/api/dashboard/stores", &token).await;
    assert_eq!(stores[0]["storeId"], store.id);
    assert_eq!(stores[0]["devicesOnline"], 1);

    let (_, activity) = app
        .get("/api/dashboard/recent-activity?limit=5", &token)
        .await;
    assert_eq!(activity["accessLogs"].as_array().unwrap().len(), 1);
    assert_eq!(activity["alerts"].as_array().unwrap().len(), 1);
}

// ============================================================================
// Configuration and jobs
// ============================================================================

#[tokio::test]
async fn test_system_config_admin_updates() {
    let app = TestApp::new().await;
    let (_, op_token) = app.token_for("operator", Role::Operator).await;
    let (_, admin_token) = app.token_for("boss", Role::Admin).await;

    let (status, config) = app.get("/api/config", &op_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(config["companyName"], "LavControl");

    let (status, _) = app
        .patch("/api/config", &op_token, json!({"companyName": "X"}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = app
        .patch(
            "/api/config",
            &admin_token,
            json!({"companyName": "Lava Bem", "supportEmail": "help@lavabem.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["companyName"], "Lava Bem");
    assert_eq!(updated["supportEmail"], "help@lavabem.com");

    let (status, _) = app
        .patch("/api/config", &admin_token, json!({"primaryColor": "red"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_jobs_endpoints() {
    let app = TestApp::new().await;
    let (_, op_token) = app.token_for("operator", Role::Operator).await;
    let (_, admin_token) = app.token_for("boss", Role::Admin).await;

    let (status, _) = app.get("/api/jobs", &op_token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, run) = app
        .post(
            "/api/jobs/purge_old_access_logs/run",
            &admin_token,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["success"], true);
    assert_eq!(run["recordsProcessed"], 0);

    let (status, _) = app
        .post("/api/jobs/not_a_job/run", &admin_token, json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get("/api/jobs", &admin_token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["jobs"].as_array().unwrap().len(), 2);
    assert_eq!(body["executions"].as_array().unwrap().len(), 1);
}

// ============================================================================
// Misc
// ============================================================================

#[tokio::test]
async fn test_websocket_requires_token() {
    let app = TestApp::new().await;

    let (status, _) = app.request(Method::GET, "/ws", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(Method::GET, "/ws?token=garbage", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_api_route_is_json_404() {
    let app = TestApp::new().await;
    let (_, token) = app.token_for("operator", Role::Operator).await;

    let (status, body) = app.get("/api/nothing-here", &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_security_headers_present() {
    let app = TestApp::new().await;
    let request = axum::http::Request::builder()
        .uri("/api/health")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = tower::ServiceExt::oneshot(app.router(), request)
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert!(headers["content-security-policy"]
        .to_str()
        .unwrap()
        .contains("connect-src 'self' ws: wss:"));
}

#[tokio::test]
async fn test_jwks_is_public() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(Method::GET, "/.well-known/jwks.json", None, None)
        .await;

    assert_eq!(status, StatusCode::OK);
    let keys = body["keys"].as_array().unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0]["kty"], "RSA");
    assert!(keys[0].get("d").is_none());
}

#[tokio::test]
async fn test_socket_access_follows_stored_user() {
    let app = TestApp::new().await;
    let db = app.db.connection();
    let user = UserBuilder::new("maria")
        .with_alert_classification(Severity::Warning)
        .create(db)
        .await;

    assert_eq!(
        lavcontrol::auth::socket_access(db, &user.id).await.unwrap(),
        Some(Severity::Warning)
    );

    let update = |update: storage::UserUpdate| storage::update_user(db, &user.id, update);
    update(storage::UserUpdate {
        alert_classification: Some(Severity::Info),
        ..Default::default()
    })
    .await
    .unwrap();
    assert_eq!(
        lavcontrol::auth::socket_access(db, &user.id).await.unwrap(),
        Some(Severity::Info)
    );

    update(storage::UserUpdate {
        enabled: Some(false),
        ..Default::default()
    })
    .await
    .unwrap();
    assert_eq!(
        lavcontrol::auth::socket_access(db, &user.id).await.unwrap(),
        None
    );

    storage::delete_user(db, &user.id).await.unwrap();
    assert_eq!(
        lavcontrol::auth::socket_access(db, &user.id).await.unwrap(),
        None
    );
}
