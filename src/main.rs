use fulfillment_backend::{
    AppState,
    config::FulfillmentConfig,
    handlers,
    jobs::{order_submission_sync, pick_status_sync},
    services::{
        execution_api::{ExecutionApi, ExecutionApiService},
        order_submitter::OrderSubmitter,
        pick_reconciler::{PickReconciler, ReconcilerSettings},
    },
};
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,fulfillment_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = FulfillmentConfig::from_env()?;
    tracing::info!(
        api_host = %config.api_host,
        warehouse = %config.warehouse,
        timeout_days = config.timeout_days,
        "Loaded configuration"
    );

    // Connect to database
    tracing::info!("Connecting to database...");
    let db = Database::connect(&config.database_url).await?;

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None).await?;

    let api: Arc<dyn ExecutionApi> = Arc::new(ExecutionApiService::new(
        config.api_host.clone(),
        config.api_timeout,
    )?);

    // Background jobs
    let submitter = OrderSubmitter::new(db.clone(), api.clone(), config.warehouse.clone());
    order_submission_sync::start_order_submission_job(submitter, config.submit_interval).await;

    let reconciler = PickReconciler::new(db.clone(), api, ReconcilerSettings::from(&config));
    pick_status_sync::start_pick_status_job(reconciler, config.reconcile_interval).await;

    let app = handlers::router(AppState::new(db))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
