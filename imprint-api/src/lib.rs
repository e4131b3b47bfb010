use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub mod error;
pub mod jobs;
pub mod orders;
pub mod state;
pub mod webhooks;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/v1/orders/{id}", get(orders::get_order))
        .route("/v1/orders/{id}/history", get(orders::get_history))
        .route("/v1/orders/{id}/transitions", post(orders::request_transition))
        .route("/v1/orders/{id}/submit", post(orders::submit_order))
        .route(
            "/v1/orders/{id}/items/{item_id}/print-asset",
            post(orders::attach_print_asset),
        )
        .route("/v1/webhooks/payments", post(webhooks::handle_payment_webhook))
        .route(
            "/v1/webhooks/fulfillment",
            post(webhooks::handle_fulfillment_webhook),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
