use crate::errors::LavError;
use crate::storage;
use crate::types::{Role, Severity};
use crate::web::AppState;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use sea_orm::DatabaseConnection;
use std::time::Duration;
use tokio::sync::watch;

/// How often an open WebSocket re-reads its user.
pub const SOCKET_RECHECK_INTERVAL: Duration = Duration::from_secs(30);

/// The caller behind a verified bearer token.
///
/// Role and enablement come from the database on every request, so a
/// demoted or disabled user loses access before their token expires.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub alert_classification: Severity,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), LavError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(LavError::Forbidden("Administrator role required".to_string()))
        }
    }

    /// Admins and managers may change stores, devices and clients.
    pub fn require_site_manager(&self) -> Result<(), LavError> {
        if self.role.can_manage_sites() {
            Ok(())
        } else {
            Err(LavError::Forbidden(
                "Administrator or manager role required".to_string(),
            ))
        }
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Verify `token` and load its user.
pub async fn authenticate(state: &AppState, token: &str) -> Result<AuthUser, LavError> {
    let claims = state.jwks.verify_token(token)?;

    let user = storage::get_user(&state.db, &claims.subject)
        .await?
        .ok_or_else(|| LavError::Unauthorized("Invalid or expired token".to_string()))?;
    if !user.enabled {
        return Err(LavError::Forbidden("Account is disabled".to_string()));
    }

    Ok(AuthUser {
        id: user.id,
        username: user.username,
        role: user.role,
        alert_classification: user.alert_classification,
    })
}

/// Alert classification a socket may receive for `user_id`, or `None`
/// once the user is disabled or deleted.
pub async fn socket_access(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<Option<Severity>, LavError> {
    Ok(storage::get_user(db, user_id)
        .await?
        .filter(|u| u.enabled)
        .map(|u| u.alert_classification))
}

/// Keep `access` in step with the stored user until the socket closes or
/// the user loses access. Lookup errors keep the last known value.
pub async fn watch_socket_access(
    db: DatabaseConnection,
    user_id: String,
    access: watch::Sender<Option<Severity>>,
) {
    let mut interval = tokio::time::interval(SOCKET_RECHECK_INTERVAL);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = access.closed() => return,
        }

        match socket_access(&db, &user_id).await {
            Ok(current) => {
                access.send_if_modified(|value| {
                    let changed = *value != current;
                    *value = current;
                    changed
                });
                if current.is_none() {
                    tracing::info!(
                        user_id = %user_id,
                        "Closing WebSocket for user without access"
                    );
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "WebSocket access check failed")
            }
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = LavError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| LavError::Unauthorized("Bearer token required".to_string()))?;
        authenticate(state, token).await
    }
}
