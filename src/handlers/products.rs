use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::{info, instrument};

use super::error::{parse_body, service_error_to_response, HandlerResult, JsonBody};
use crate::app::AppState;
use crate::models::{Product, ProductDraft};

/// List every product in the catalog
#[instrument(name = "list_products", skip(state))]
pub async fn list_products(State(state): State<AppState>) -> HandlerResult<Json<Vec<Product>>> {
    match state
        .tracer
        .trace("product", "list", state.products.list_products())
        .await
    {
        Ok(products) => {
            info!("Listed {} products", products.len());
            Ok(Json(products))
        }
        Err(err) => Err(service_error_to_response(err)),
    }
}

#[instrument(name = "get_product", skip(state), fields(product_id = %id))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HandlerResult<Json<Product>> {
    state
        .tracer
        .trace("product", "get", state.products.get_product(&id))
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "create_product", skip(state, body))]
pub async fn create_product(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> HandlerResult<(StatusCode, Json<Product>)> {
    let draft: ProductDraft = parse_body("Product", body).map_err(service_error_to_response)?;

    match state
        .tracer
        .trace("product", "create", state.products.create_product(draft))
        .await
    {
        Ok(product) => {
            crate::info_with_trace!(product_id = %product.id, name = %product.name, "Product created");
            Ok((StatusCode::CREATED, Json(product)))
        }
        Err(err) => Err(service_error_to_response(err)),
    }
}

/// Replace a product's fields; the body must be a complete product
#[instrument(name = "update_product", skip(state, body), fields(product_id = %id))]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody,
) -> HandlerResult<Json<Product>> {
    let draft: ProductDraft = parse_body("Product", body).map_err(service_error_to_response)?;

    state
        .tracer
        .trace("product", "update", state.products.update_product(&id, draft))
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "delete_product", skip(state), fields(product_id = %id))]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HandlerResult<Json<Product>> {
    match state
        .tracer
        .trace("product", "delete", state.products.delete_product(&id))
        .await
    {
        Ok(product) => {
            crate::info_with_trace!(product_id = %product.id, "Product deleted");
            Ok(Json(product))
        }
        Err(err) => Err(service_error_to_response(err)),
    }
}
