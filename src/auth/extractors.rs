use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::warn;

use super::{AuthError, CallerIdentity};
use crate::app::AppState;

/// A caller whose bearer token was verified by the identity provider
#[derive(Debug, Clone)]
pub struct Caller(pub CallerIdentity);

/// A verified caller whose registered user holds the admin role
#[derive(Debug, Clone)]
pub struct AdminCaller(pub CallerIdentity);

/// Extract the token from `Authorization: Bearer <token>`
pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    match value.trim().split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(AuthError::MissingToken),
    }
}

async fn verify_caller(parts: &Parts, state: &AppState) -> Result<CallerIdentity, AuthError> {
    let token = bearer_token(&parts.headers)?;
    state.identity.verify(token).await
}

async fn require_admin(parts: &Parts, state: &AppState) -> Result<CallerIdentity, AuthError> {
    let identity = verify_caller(parts, state).await?;

    let user = state
        .users
        .find_by_email(&identity.email)
        .await
        .map_err(|e| AuthError::Lookup {
            message: e.to_string(),
        })?;

    match user {
        Some(user) if user.is_admin() => Ok(identity),
        _ => {
            warn!(email = %identity.email, "Admin route denied");
            Err(AuthError::Forbidden)
        }
    }
}

/// Record the gate decision before handing the result back to axum
fn record(state: &AppState, result: &Result<CallerIdentity, AuthError>) {
    let outcome = match result {
        Ok(_) => "allowed",
        Err(e) => e.outcome(),
    };
    state.metrics.record_auth_decision(outcome);
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let result = verify_caller(parts, state).await;
        record(state, &result);
        result.map(Caller)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminCaller {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let result = require_admin(parts, state).await;
        record(state, &result);
        result.map(AdminCaller)
    }
}
