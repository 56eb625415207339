use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware,
    routing::{delete, get, patch},
    Router,
};
use std::{sync::Arc, time::Duration};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::IdentityProvider;
use crate::config::ServerConfig;
use crate::handlers::{
    carts, health_check, metrics_handler, products, request_validation_middleware, root,
    security_headers_middleware, users,
};
use crate::observability::{observability_middleware, Metrics, OperationTracer};
use crate::services::{CartService, ProductService, UserService};

/// Everything a handler or extractor can reach
#[derive(Clone)]
pub struct AppState {
    pub products: Arc<ProductService>,
    pub carts: Arc<CartService>,
    pub users: Arc<UserService>,
    pub identity: Arc<dyn IdentityProvider>,
    pub metrics: Arc<Metrics>,
    pub tracer: Arc<OperationTracer>,
}

impl AppState {
    pub fn new(
        products: Arc<ProductService>,
        carts: Arc<CartService>,
        users: Arc<UserService>,
        identity: Arc<dyn IdentityProvider>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let tracer = Arc::new(OperationTracer::new(metrics.clone()));
        Self {
            products,
            carts,
            users,
            identity,
            metrics,
            tracer,
        }
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(86400))
}

/// Build the router with all routes and middleware
pub fn create_app(state: AppState, server: &ServerConfig) -> Router {
    let metrics_for_middleware = state.metrics.clone();
    let max_request_size = server.max_request_size as u64;

    Router::new()
        .route("/", get(root))
        .route("/health/status", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route(
            "/products",
            get(products::list_products).post(products::create_product),
        )
        .route(
            "/products/:id",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        .route(
            "/carts",
            get(carts::list_cart_items).post(carts::add_cart_item),
        )
        // GET reads the segment as an owner email, PUT/DELETE as an item id
        .route(
            "/carts/:id",
            get(carts::list_owner_cart)
                .put(carts::update_cart_item)
                .delete(carts::delete_cart_item),
        )
        .route("/carts/clear/:email", delete(carts::clear_cart))
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        // GET takes an email, PATCH takes a user id
        .route(
            "/users/admin/:key",
            get(users::is_admin).patch(users::make_admin),
        )
        .route("/users/user/:id", patch(users::make_user))
        .with_state(state)
        // Order matters - the last layer added runs first
        .layer(middleware::from_fn(move |req, next| {
            request_validation_middleware(max_request_size, req, next)
        }))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(cors_layer())
        .layer(TimeoutLayer::new(server.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(move |req, next| {
            observability_middleware(metrics_for_middleware.clone(), req, next)
        }))
}

#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    use crate::auth::{AuthError, CallerIdentity};
    use crate::repositories::{
        dynamo::test_client, DynamoDbCartRepository, DynamoDbProductRepository,
        DynamoDbUserRepository,
    };
    use async_trait::async_trait;

    struct RejectAll;

    #[async_trait]
    impl IdentityProvider for RejectAll {
        async fn verify(&self, _token: &str) -> Result<CallerIdentity, AuthError> {
            Err(AuthError::InvalidToken)
        }
    }

    let client = test_client();
    let region = "us-east-1".to_string();

    AppState::new(
        Arc::new(ProductService::new(Arc::new(DynamoDbProductRepository::new(
            client.clone(),
            "ShopProducts".to_string(),
            region.clone(),
        )))),
        Arc::new(CartService::new(Arc::new(DynamoDbCartRepository::new(
            client.clone(),
            "ShopCarts".to_string(),
            region.clone(),
        )))),
        Arc::new(UserService::new(Arc::new(DynamoDbUserRepository::new(
            client,
            "ShopUsers".to_string(),
            region,
        )))),
        Arc::new(RejectAll),
        Arc::new(Metrics::new().expect("metrics registry")),
    )
}
