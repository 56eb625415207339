use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use shopcart_rs::{
    auth::CognitoIdentityProvider,
    create_app, init_observability,
    observability::Metrics,
    repositories::{
        DynamoDbCartRepository, DynamoDbProductRepository, DynamoDbUserRepository, TableManager,
    },
    services::{CartService, ProductService, UserService},
    shutdown_observability, AppState, Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration first (logging is not up yet)
    let config = Config::from_environment()
        .await
        .context("Failed to load configuration")?;

    init_observability(&config.observability).context("Failed to initialize observability")?;

    info!(
        "Starting {} v{}",
        config.observability.service_name, config.observability.service_version
    );
    info!("Region: {}", config.aws.region);
    info!(
        "DynamoDB tables: products={}, carts={}, users={}",
        config.database.products_table_name,
        config.database.carts_table_name,
        config.database.users_table_name
    );

    let metrics = Arc::new(Metrics::new().context("Failed to register metrics")?);

    let dynamodb_client = Arc::new(config.aws.dynamodb_client.clone());

    if config.database.auto_create_tables {
        TableManager::new(dynamodb_client.clone())
            .create_all_tables(&config.database)
            .await
            .context("Failed to provision DynamoDB tables")?;
        info!("DynamoDB tables ready");
    }

    let product_repository = DynamoDbProductRepository::new(
        dynamodb_client.clone(),
        config.database.products_table_name.clone(),
        config.database.region.clone(),
    )
    .with_metrics(metrics.clone());
    let cart_repository = DynamoDbCartRepository::new(
        dynamodb_client.clone(),
        config.database.carts_table_name.clone(),
        config.database.region.clone(),
    )
    .with_metrics(metrics.clone());
    let user_repository = DynamoDbUserRepository::new(
        dynamodb_client,
        config.database.users_table_name.clone(),
        config.database.region.clone(),
    )
    .with_metrics(metrics.clone());

    let state = AppState::new(
        Arc::new(ProductService::new(Arc::new(product_repository))),
        Arc::new(CartService::new(Arc::new(cart_repository))),
        Arc::new(UserService::new(Arc::new(user_repository))),
        Arc::new(CognitoIdentityProvider::new(
            config.aws.cognito_client.clone(),
        )),
        metrics,
    );

    let app = create_app(state, &config.server);

    let address = config.server.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Server listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    shutdown_observability().await;
    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
