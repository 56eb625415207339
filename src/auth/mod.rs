// Auth module - bearer token verification and role gating

pub mod cognito;
pub mod extractors;

use async_trait::async_trait;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub use cognito::CognitoIdentityProvider;
pub use extractors::{AdminCaller, Caller};

/// Identity resolved from a verified bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub email: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Unauthorized access")]
    MissingToken,

    #[error("Unauthorized access")]
    InvalidToken,

    #[error("Forbidden access")]
    Forbidden,

    #[error("Identity provider error: {message}")]
    Provider { message: String },

    #[error("{message}")]
    Lookup { message: String },
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingToken | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Provider { .. } | AuthError::Lookup { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Label used for the `auth_decisions_total` metric
    pub fn outcome(&self) -> &'static str {
        match self {
            AuthError::MissingToken | AuthError::InvalidToken => "unauthorized",
            AuthError::Forbidden => "forbidden",
            AuthError::Provider { .. } | AuthError::Lookup { .. } => "error",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(json!({ "message": self.to_string() })),
        )
            .into_response()
    }
}

/// Verifies bearer tokens against an external identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve the caller behind `token`, or reject it
    async fn verify(&self, token: &str) -> Result<CallerIdentity, AuthError>;
}
