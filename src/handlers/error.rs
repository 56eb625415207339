use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::Json,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::warn;

use crate::models::ServiceError;

pub type HandlerResult<T> = Result<T, (StatusCode, Json<Value>)>;

/// JSON request body that rejects unreadable input with the same
/// `{"message": ...}` shape as every other error
#[derive(Debug)]
pub struct JsonBody(pub Value);

#[async_trait]
impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<Value>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection_to_response(rejection)),
        }
    }
}

pub fn json_rejection_to_response(rejection: JsonRejection) -> (StatusCode, Json<Value>) {
    warn!("Rejected request body: {}", rejection.body_text());
    (
        rejection.status(),
        Json(json!({ "message": rejection.body_text() })),
    )
}

/// Convert service errors to HTTP responses
pub fn service_error_to_response(err: ServiceError) -> (StatusCode, Json<Value>) {
    let status = match &err {
        e if e.is_not_found() => StatusCode::NOT_FOUND,
        // Clients treat 302 on registration as "already registered"
        ServiceError::UserAlreadyExists { .. } => StatusCode::FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (status, Json(json!({ "message": err.to_string() })))
}

/// Decode a JSON body into a draft type. Type mismatches are reported the
/// same way as missing fields.
pub fn parse_body<T: DeserializeOwned>(entity: &str, body: Value) -> Result<T, ServiceError> {
    serde_json::from_value(body).map_err(|e| ServiceError::ValidationError {
        entity: entity.to_string(),
        message: e.to_string(),
    })
}
