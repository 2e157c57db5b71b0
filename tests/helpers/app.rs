use super::{TestDb, UserBuilder};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use lavcontrol::hub::Hub;
use lavcontrol::jwks::JwksManager;
use lavcontrol::mqtt::MqttBridge;
use lavcontrol::settings::{Keys, Settings};
use lavcontrol::storage::User;
use lavcontrol::types::Role;
use lavcontrol::web::{self, AppState};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// In-process application with a migrated database, fresh signing keys
/// and a disabled MQTT bridge.
pub struct TestApp {
    pub db: TestDb,
    pub state: AppState,
    _keys_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_settings(Settings::default()).await
    }

    pub async fn with_settings(mut settings: Settings) -> Self {
        let db = TestDb::new().await;
        let keys_dir = TempDir::new().expect("Failed to create keys dir");
        settings.keys = Keys {
            jwks_path: keys_dir.path().join("jwks.json"),
            private_key_path: keys_dir.path().join("private_key.json"),
            ..Keys::default()
        };

        let jwks = JwksManager::new(settings.keys.clone(), settings.issuer())
            .await
            .expect("Failed to init keys");

        let state = AppState {
            settings: Arc::new(settings),
            db: db.connection().clone(),
            jwks,
            hub: Hub::new(),
            mqtt: MqttBridge::disabled(),
        };

        Self {
            db,
            state,
            _keys_dir: keys_dir,
        }
    }

    pub fn router(&self) -> Router {
        web::router(self.state.clone())
    }

    /// Create a user with `role` and return a bearer token for them.
    pub async fn token_for(&self, username: &str, role: Role) -> (User, String) {
        let user = UserBuilder::new(username)
            .with_role(role)
            .create(self.db.connection())
            .await;
        let (token, _) = self
            .state
            .jwks
            .issue_token(&user.id, &user.username, role.as_str(), 3600)
            .expect("Failed to issue token");
        (user, token)
    }

    /// Send one request through the router and decode the JSON response.
    /// Empty bodies decode as `Value::Null`.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .router()
            .oneshot(request)
            .await
            .expect("Router failed");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), None).await
    }
}
