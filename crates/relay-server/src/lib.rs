//! HTTP server for the ledger relay.
//!
//! Exposes the request coordinator as a small JSON API: prepare a ledger
//! range, pull ledgers one at a time, and inspect the relay's state.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::RelayConfig;
pub use error::{ApiError, ServerError, ServerResult};
pub use handler::AppState;
pub use router::build_router;
pub use server::{open_engine, RelayServer};

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde::de::DeserializeOwned;
    use tower::util::ServiceExt;

    use relay_coordinator::Coordinator;
    use relay_engine::{EngineError, EngineCounters, InMemoryEngine};
    use relay_protocol::{
        endpoints, ErrorBody, ErrorCode, HealthResponse, InfoResponse, LatestSequenceResponse,
        NextLedgerResponse, PrepareRangeResponse, StatusResponse,
    };

    use super::*;

    fn app_with(
        engine: InMemoryEngine,
        timeout: Option<Duration>,
    ) -> (Router, Arc<Coordinator>, EngineCounters) {
        let counters = engine.counters();
        let coordinator = Arc::new(Coordinator::new(engine));
        let config = RelayConfig {
            history_archives: vec!["/unused".into()],
            ..RelayConfig::default()
        };
        let router = build_router(AppState {
            coordinator: Arc::clone(&coordinator),
            info: config.info(),
            request_timeout: timeout,
        });
        (router, coordinator, counters)
    }

    fn app() -> Router {
        app_with(InMemoryEngine::with_chain(90, 30), None).0
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<&str>,
    ) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let request = builder
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    fn parse<T: DeserializeOwned>(bytes: &[u8]) -> T {
        serde_json::from_slice(bytes).unwrap()
    }

    async fn prepare(app: &Router, body: &str) -> (StatusCode, Vec<u8>) {
        send(app, "POST", endpoints::PREPARE_RANGE, Some(body)).await
    }

    async fn next(app: &Router) -> (StatusCode, Vec<u8>) {
        send(app, "POST", endpoints::NEXT_LEDGER, None).await
    }

    fn error_code(bytes: &[u8]) -> ErrorCode {
        ErrorBody::from_json(bytes).unwrap().code()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let (status, body) = send(&app(), "GET", endpoints::HEALTH, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(parse::<HealthResponse>(&body).is_ok());
    }

    #[tokio::test]
    async fn info_endpoint() {
        let (status, body) = send(&app(), "GET", endpoints::INFO, None).await;
        assert_eq!(status, StatusCode::OK);
        let info: InfoResponse = parse(&body);
        assert_eq!(info.checkpoint_frequency, 64);
        assert!(!info.hash_verification);
    }

    #[tokio::test]
    async fn bounded_range_end_to_end() {
        let app = app();
        let (status, body) = prepare(&app, r#"{"from":100,"to":105}"#).await;
        assert_eq!(status, StatusCode::OK);
        let prepared: PrepareRangeResponse = parse(&body);
        assert!(prepared.ready);
        assert!(prepared.newly_prepared);
        assert_eq!(prepared.next_sequence, 100);

        for seq in 100..105 {
            let (status, body) = next(&app).await;
            assert_eq!(status, StatusCode::OK);
            let resp: NextLedgerResponse = parse(&body);
            assert!(resp.present);
            assert_eq!(resp.ledger.unwrap().sequence, seq);
        }

        let (status, body) = next(&app).await;
        assert_eq!(status, StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(error_code(&body), ErrorCode::OutOfRange);

        let (_, body) = send(&app, "GET", endpoints::STATUS, None).await;
        let status: StatusResponse = parse(&body);
        assert_eq!(status.next_expected_seq, 105);
        assert_eq!(status.ledgers_served, 5);
        assert_eq!(status.phase, "running");
        assert!(status.prepared_at.is_some());
    }

    #[tokio::test]
    async fn next_before_prepare_is_conflict() {
        let (status, body) = next(&app()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error_code(&body), ErrorCode::NotPrepared);
    }

    #[tokio::test]
    async fn malformed_bodies_are_rejected() {
        let app = app();
        let (status, body) = prepare(&app, "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&body), ErrorCode::MalformedRequest);

        let (status, body) = prepare(&app, r#"{"to":5}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&body), ErrorCode::MalformedRequest);
    }

    #[tokio::test]
    async fn inverted_range_is_invalid() {
        let (status, body) = prepare(&app(), r#"{"from":105,"to":100}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&body), ErrorCode::InvalidRange);
    }

    #[tokio::test]
    async fn repeated_prepare_reports_existing_range() {
        let (app, _, counters) = app_with(InMemoryEngine::with_chain(1, 50), None);
        prepare(&app, r#"{"from":10,"to":20}"#).await;
        let (status, body) = prepare(&app, r#"{"from":10,"to":20}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!parse::<PrepareRangeResponse>(&body).newly_prepared);
        assert_eq!(counters.prepare_calls(), 1);
    }

    #[tokio::test]
    async fn live_edge_reports_absent_ledger() {
        let (app, _, _) = app_with(InMemoryEngine::with_chain(1, 5), None);
        let (status, _) = prepare(&app, r#"{"from":5}"#).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = next(&app).await;
        assert_eq!(parse::<NextLedgerResponse>(&body).ledger.unwrap().sequence, 5);

        let (status, body) = next(&app).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<serde_json::Value>(&body), serde_json::json!({ "present": false }));

        let (_, body) = send(&app, "GET", endpoints::LATEST_SEQUENCE, None).await;
        assert_eq!(parse::<LatestSequenceResponse>(&body).sequence, 5);
    }

    #[tokio::test]
    async fn engine_failure_is_terminal() {
        let engine = InMemoryEngine::with_chain(1, 100)
            .fail_at(52, EngineError::Crashed("core exited".into()));
        let (app, _, _) = app_with(engine, None);
        prepare(&app, r#"{"from":50,"to":0}"#).await;
        next(&app).await;
        next(&app).await;

        let (status, body) = next(&app).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_code(&body), ErrorCode::EngineFailure);

        let (status, _) = prepare(&app, r#"{"from":60,"to":70}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (_, body) = send(&app, "GET", endpoints::STATUS, None).await;
        let status: StatusResponse = parse(&body);
        assert!(status.closed);
        assert!(status.failure.is_some());

        let (status, body) = send(&app, "GET", endpoints::HEALTH, None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(parse::<HealthResponse>(&body).status, "failed");
    }

    #[tokio::test]
    async fn closed_coordinator_is_shutting_down() {
        let (app, coordinator, _) = app_with(InMemoryEngine::with_chain(1, 10), None);
        coordinator.close().unwrap();

        let (status, body) = prepare(&app, r#"{"from":1,"to":5}"#).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error_code(&body), ErrorCode::ShuttingDown);

        let (status, body) = send(&app, "GET", endpoints::STATUS, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse::<StatusResponse>(&body).phase, "closed");
    }

    #[tokio::test]
    async fn slow_prepare_times_out_but_completes() {
        let engine =
            InMemoryEngine::with_chain(1, 10).with_prepare_delay(Duration::from_millis(200));
        let (app, coordinator, _) = app_with(engine, Some(Duration::from_millis(20)));

        let (status, body) = prepare(&app, r#"{"from":1,"to":5}"#).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(error_code(&body), ErrorCode::RequestTimeout);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(coordinator.status().prepared_range.is_some());
    }

    #[tokio::test]
    async fn timed_out_queued_request_consumes_nothing() {
        let engine = InMemoryEngine::with_chain(1, 10).with_get_delay(Duration::from_millis(100));
        let (app, coordinator, counters) = app_with(engine, Some(Duration::from_millis(20)));
        let (status, _) = prepare(&app, r#"{"from":1,"to":10}"#).await;
        assert_eq!(status, StatusCode::OK);

        let ((first, _), (second, _)) = tokio::join!(next(&app), next(&app));
        assert_eq!(first, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(second, StatusCode::GATEWAY_TIMEOUT);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(counters.get_calls(), 1);
        assert_eq!(coordinator.status().next_expected_seq, 2);
        assert_eq!(coordinator.next_ledger().unwrap().sequence, 2);
    }

    #[tokio::test]
    async fn unavailable_range_hides_engine_detail() {
        let (app, _, _) = app_with(InMemoryEngine::with_chain(1, 50), None);
        prepare(&app, r#"{"from":10,"to":20}"#).await;

        let (status, body) = prepare(&app, r#"{"from":12,"to":100}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&body), ErrorCode::InvalidRange);
        let text = String::from_utf8(body).unwrap();
        assert!(!text.contains("missing"), "{text}");

        let (_, body) = send(&app, "GET", endpoints::STATUS, None).await;
        let status: StatusResponse = parse(&body);
        assert_eq!(status.prepared_range.map(|r| (r.from(), r.to())), Some((10, 20)));

        let (_, body) = next(&app).await;
        assert_eq!(parse::<NextLedgerResponse>(&body).ledger.unwrap().sequence, 10);
    }
}
