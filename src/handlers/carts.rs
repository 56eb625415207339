use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::Value;
use tracing::{info, instrument};

use super::error::{parse_body, service_error_to_response, HandlerResult, JsonBody};
use crate::app::AppState;
use crate::models::{CartAddition, CartItem, CartItemDraft, ClearCartResult};

#[instrument(name = "list_cart_items", skip(state))]
pub async fn list_cart_items(State(state): State<AppState>) -> HandlerResult<Json<Vec<CartItem>>> {
    state
        .tracer
        .trace("cart", "list", state.carts.list_cart_items())
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

/// All lines owned by `email`
#[instrument(name = "list_owner_cart", skip(state), fields(email = %email))]
pub async fn list_owner_cart(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> HandlerResult<Json<Vec<CartItem>>> {
    match state
        .tracer
        .trace("cart", "list_by_owner", state.carts.list_by_owner(&email))
        .await
    {
        Ok(items) => {
            info!("Found {} cart items", items.len());
            Ok(Json(items))
        }
        Err(err) => Err(service_error_to_response(err)),
    }
}

/// Add a line to a cart.
///
/// A merge into an existing line answers 200 and echoes the request body
/// as received; clients rely on that shape. A new line answers 201 with
/// the stored document.
#[instrument(name = "add_cart_item", skip(state, body))]
pub async fn add_cart_item(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> Result<Response, (StatusCode, Json<Value>)> {
    let draft: CartItemDraft =
        parse_body("Cart", body.clone()).map_err(service_error_to_response)?;

    match state
        .tracer
        .trace("cart", "add", state.carts.add_item(draft))
        .await
    {
        Ok(CartAddition::Merged(_)) => Ok((StatusCode::OK, Json(body)).into_response()),
        Ok(CartAddition::Created(item)) => Ok((StatusCode::CREATED, Json(item)).into_response()),
        Err(err) => Err(service_error_to_response(err)),
    }
}

#[instrument(name = "update_cart_item", skip(state, body), fields(cart_item_id = %id))]
pub async fn update_cart_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody,
) -> HandlerResult<Json<CartItem>> {
    let draft: CartItemDraft = parse_body("Cart", body).map_err(service_error_to_response)?;

    state
        .tracer
        .trace("cart", "update", state.carts.update_item(&id, draft))
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "delete_cart_item", skip(state), fields(cart_item_id = %id))]
pub async fn delete_cart_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HandlerResult<Json<CartItem>> {
    state
        .tracer
        .trace("cart", "delete", state.carts.delete_item(&id))
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "clear_cart", skip(state), fields(email = %email))]
pub async fn clear_cart(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> HandlerResult<Json<ClearCartResult>> {
    match state
        .tracer
        .trace("cart", "clear", state.carts.clear_cart(&email))
        .await
    {
        Ok(result) => {
            crate::info_with_trace!(deleted_count = result.deleted_count, "Cart cleared");
            Ok(Json(result))
        }
        Err(err) => Err(service_error_to_response(err)),
    }
}
