//! Route table.

pub mod health;
pub mod orders;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the application router with request tracing.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/orders", get(orders::find_order).post(orders::create_order))
        .route("/orders/{id}", get(orders::get_order))
        .route("/cashiers/me/orders", get(orders::list_my_orders))
        .route("/stores/{store_id}/orders", get(orders::list_store_orders));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
