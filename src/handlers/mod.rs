pub mod order_lines;

use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;

async fn health() -> &'static str {
    "ok"
}

/// All HTTP routes served by the backend
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/order-lines/summary",
            get(order_lines::get_status_summary),
        )
        .route(
            "/api/order-lines/{id}/reset",
            post(order_lines::reset_order_line),
        )
        .route("/api/orders", post(order_lines::create_order))
        .with_state(state)
}
