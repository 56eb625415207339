use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::{info, instrument};

use super::error::{parse_body, service_error_to_response, HandlerResult, JsonBody};
use crate::app::AppState;
use crate::auth::{AdminCaller, Caller};
use crate::models::{AdminStatus, Role, User, UserDraft};

#[instrument(name = "list_users", skip(state))]
pub async fn list_users(State(state): State<AppState>) -> HandlerResult<Json<Vec<User>>> {
    state
        .tracer
        .trace("user", "list", state.users.list_users())
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

/// Fetch a user by id. An unknown id answers 200 with a `null` body.
#[instrument(name = "get_user", skip(state), fields(user_id = %id))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HandlerResult<Json<Option<User>>> {
    state
        .tracer
        .trace("user", "get", state.users.get_user(&id))
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "create_user", skip(state, body))]
pub async fn create_user(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> HandlerResult<(StatusCode, Json<User>)> {
    let draft: UserDraft = parse_body("User", body).map_err(service_error_to_response)?;

    state
        .tracer
        .trace("user", "create", state.users.create_user(draft))
        .await
        .map(|user| (StatusCode::CREATED, Json(user)))
        .map_err(service_error_to_response)
}

#[instrument(name = "update_user", skip(state, body), fields(user_id = %id))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody,
) -> HandlerResult<Json<User>> {
    let draft: UserDraft = parse_body("User", body).map_err(service_error_to_response)?;

    state
        .tracer
        .trace("user", "update", state.users.update_user(&id, draft))
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "delete_user", skip(state), fields(user_id = %id))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HandlerResult<Json<User>> {
    state
        .tracer
        .trace("user", "delete", state.users.delete_user(&id))
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

/// Whether the user registered under `email` is an admin. Any verified
/// caller may ask.
#[instrument(name = "is_admin", skip(state, caller), fields(email = %email))]
pub async fn is_admin(
    State(state): State<AppState>,
    caller: Caller,
    Path(email): Path<String>,
) -> HandlerResult<Json<AdminStatus>> {
    info!(caller = %caller.0.email, "Admin status requested");

    state
        .tracer
        .trace("user", "is_admin", state.users.is_admin(&email))
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "make_admin", skip(state, caller), fields(user_id = %id))]
pub async fn make_admin(
    State(state): State<AppState>,
    caller: AdminCaller,
    Path(id): Path<String>,
) -> HandlerResult<Json<User>> {
    change_role(state, caller, id, Role::Admin).await
}

#[instrument(name = "make_user", skip(state, caller), fields(user_id = %id))]
pub async fn make_user(
    State(state): State<AppState>,
    caller: AdminCaller,
    Path(id): Path<String>,
) -> HandlerResult<Json<User>> {
    change_role(state, caller, id, Role::User).await
}

async fn change_role(
    state: AppState,
    AdminCaller(caller): AdminCaller,
    id: String,
    role: Role,
) -> HandlerResult<Json<User>> {
    match state
        .tracer
        .trace("user", "set_role", state.users.set_role(&id, role))
        .await
    {
        Ok(user) => {
            crate::info_with_trace!(
                caller = %caller.email,
                user_id = %user.id,
                role = %user.role,
                "Role changed"
            );
            Ok(Json(user))
        }
        Err(err) => Err(service_error_to_response(err)),
    }
}
