use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use relay_protocol::endpoints;

use crate::handler::{self, AppState};

/// Build the axum router with all relay endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::PREPARE_RANGE, post(handler::prepare_range_handler))
        .route(endpoints::NEXT_LEDGER, post(handler::next_ledger_handler))
        .route(endpoints::STATUS, get(handler::status_handler))
        .route(endpoints::LATEST_SEQUENCE, get(handler::latest_sequence_handler))
        .route(endpoints::HEALTH, get(handler::health_handler))
        .route(endpoints::INFO, get(handler::info_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
