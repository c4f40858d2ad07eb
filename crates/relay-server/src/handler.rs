use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use tracing::{error, warn};

use relay_coordinator::{Coordinator, CoordinatorError, CoordinatorResult, CoordinatorState, Phase};
use relay_protocol::{
    HealthResponse, InfoResponse, LatestSequenceResponse, NextLedgerResponse,
    PrepareRangeRequest, PrepareRangeResponse, StatusResponse,
};
use relay_types::LedgerRange;

use crate::error::ApiError;

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub info: InfoResponse,
    pub request_timeout: Option<Duration>,
}

/// Run a coordinator call on the blocking pool, bounded by the request
/// timeout.
///
/// On timeout the call is flagged as abandoned. A call still queued for the
/// engine then gives up without touching it; one already running completes
/// and its effect on the cursor stands.
async fn run_blocking<T, F>(state: &AppState, op: &'static str, call: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Coordinator, &AtomicBool) -> CoordinatorResult<T> + Send + 'static,
{
    let coordinator = Arc::clone(&state.coordinator);
    let abandoned = Arc::new(AtomicBool::new(false));
    let task = {
        let abandoned = Arc::clone(&abandoned);
        tokio::task::spawn_blocking(move || call(&coordinator, &abandoned))
    };

    let joined = match state.request_timeout {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => {
                abandoned.store(true, Ordering::Release);
                warn!(op, timeout_ms = limit.as_millis() as u64, "coordinator call timed out");
                return Err(ApiError::timeout(limit));
            }
        },
        None => task.await,
    };

    match joined {
        Ok(result) => result.map_err(ApiError::from),
        Err(err) => {
            error!(op, error = %err, "coordinator task did not complete");
            Err(ApiError::internal())
        }
    }
}

pub async fn prepare_range_handler(
    State(state): State<AppState>,
    payload: Result<Json<PrepareRangeRequest>, JsonRejection>,
) -> Result<Json<PrepareRangeResponse>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::malformed(e.body_text()))?;
    let range = LedgerRange::new(req.from, req.to)
        .map_err(|e| ApiError::from(CoordinatorError::InvalidRange { reason: e.to_string() }))?;

    let outcome = run_blocking(&state, "prepare_range", move |c, abandoned| {
        c.prepare_unless(range, abandoned)
    })
    .await?;
    Ok(Json(PrepareRangeResponse {
        range: outcome.range,
        ready: true,
        newly_prepared: outcome.newly_prepared,
        next_sequence: outcome.next_sequence,
    }))
}

pub async fn next_ledger_handler(
    State(state): State<AppState>,
) -> Result<Json<NextLedgerResponse>, ApiError> {
    let ledger = run_blocking(&state, "next_ledger", |c, abandoned| {
        match c.next_ledger_unless(abandoned) {
            Ok(ledger) => Ok(Some(ledger)),
            Err(CoordinatorError::NotYetAvailable { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    })
    .await?;

    Ok(Json(match ledger {
        Some(ledger) => NextLedgerResponse::present(ledger),
        None => NextLedgerResponse::absent(),
    }))
}

pub async fn latest_sequence_handler(
    State(state): State<AppState>,
) -> Result<Json<LatestSequenceResponse>, ApiError> {
    let sequence = run_blocking(&state, "latest_sequence", |c, _| c.latest_sequence()).await?;
    Ok(Json(LatestSequenceResponse { sequence }))
}

pub async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(status_response(state.coordinator.status()))
}

/// Health check handler. Answers 503 once the relay stops accepting work.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let snapshot = state.coordinator.status();
    if snapshot.is_failed() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse::with_status("failed")),
        );
    }
    match snapshot.phase {
        Phase::Running => (StatusCode::OK, Json(HealthResponse::default())),
        phase => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse::with_status(phase.to_string())),
        ),
    }
}

pub async fn info_handler(State(state): State<AppState>) -> Json<InfoResponse> {
    Json(state.info)
}

fn status_response(state: CoordinatorState) -> StatusResponse {
    StatusResponse {
        prepared_range: state.prepared_range,
        next_expected_seq: state.next_expected_seq,
        closed: state.closed,
        phase: state.phase.to_string(),
        failure: state.failure,
        prepared_at: state.prepared_at,
        prepare_duration_ms: state.prepare_duration_ms,
        ledgers_served: state.ledgers_served,
    }
}
