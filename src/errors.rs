use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use miette::Diagnostic;
use sea_orm::{DbErr, SqlErr};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum LavError {
    #[error("I/O error: {0}")]
    #[diagnostic(code(lavcontrol::io))]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    #[diagnostic(code(lavcontrol::config))]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(lavcontrol::serde))]
    Serde(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    #[diagnostic(code(lavcontrol::db))]
    Db(#[from] DbErr),

    #[error("JOSE error: {0}")]
    #[diagnostic(code(lavcontrol::jose))]
    Jose(String),

    #[error("{0}")]
    #[diagnostic(code(lavcontrol::bad_request))]
    BadRequest(String),

    #[error("{0}")]
    #[diagnostic(code(lavcontrol::unauthorized))]
    Unauthorized(String),

    #[error("{0}")]
    #[diagnostic(code(lavcontrol::forbidden))]
    Forbidden(String),

    #[error("{0}")]
    #[diagnostic(code(lavcontrol::not_found))]
    NotFound(String),

    #[error("{0}")]
    #[diagnostic(code(lavcontrol::conflict))]
    Conflict(String),

    #[error("Account locked until {until}")]
    #[diagnostic(
        code(lavcontrol::locked),
        help("Wait for the lockout to expire or ask an administrator to unlock the account")
    )]
    Locked { until: i64 },

    #[error("{0}")]
    #[diagnostic(code(lavcontrol::other))]
    Other(String),
}

impl From<josekit::JoseError> for LavError {
    fn from(value: josekit::JoseError) -> Self {
        LavError::Jose(value.to_string())
    }
}

impl From<JsonRejection> for LavError {
    fn from(rejection: JsonRejection) -> Self {
        LavError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for LavError {
    fn from(rejection: QueryRejection) -> Self {
        LavError::BadRequest(rejection.body_text())
    }
}

impl LavError {
    pub fn status(&self) -> StatusCode {
        match self {
            LavError::BadRequest(_) => StatusCode::BAD_REQUEST,
            LavError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            LavError::Forbidden(_) => StatusCode::FORBIDDEN,
            LavError::NotFound(_) => StatusCode::NOT_FOUND,
            LavError::Conflict(_) => StatusCode::CONFLICT,
            LavError::Locked { .. } => StatusCode::LOCKED,
            LavError::Db(e) => match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_))
                | Some(SqlErr::ForeignKeyConstraintViolation(_)) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for LavError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match (&self, status) {
            (LavError::Db(_), StatusCode::CONFLICT) => {
                "Conflicts with an existing record".to_string()
            }
            (_, StatusCode::INTERNAL_SERVER_ERROR) => {
                tracing::error!(error = %self, "request failed");
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}
