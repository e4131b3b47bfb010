use std::net::SocketAddr;
use std::sync::Arc;

use imprint_api::{app, AppState};
use imprint_api::jobs::RetryPolicy;
use imprint_order::{
    FailureCompensator, FulfillmentService, MockFulfillmentProvider, MockPaymentProvider,
    PaymentReconciler, StatusEngine,
};
use imprint_store::PgOrderStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "imprint_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = imprint_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Imprint API on port {}", config.server.port);

    let pg = PgOrderStore::connect(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    pg.migrate().await.expect("Failed to run migrations");
    let store: Arc<dyn imprint_core::repository::OrderStore> = Arc::new(pg);

    // In-process provider adapters. The real payment and fulfillment
    // clients are separate integrations and not part of this service.
    let payments = Arc::new(MockPaymentProvider::new());
    let pod = Arc::new(MockFulfillmentProvider::new());

    let engine = StatusEngine::new(store.clone());
    let reconciler = PaymentReconciler::new(store.clone());
    let fulfillment = Arc::new(FulfillmentService::new(
        store.clone(),
        pod,
        engine.clone(),
    ));
    let compensator = Arc::new(FailureCompensator::new(
        store.clone(),
        payments,
        engine.clone(),
    ));

    let app_state = AppState {
        store,
        engine,
        reconciler,
        fulfillment,
        compensator,
        retry: RetryPolicy::from_config(&config.retry),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
