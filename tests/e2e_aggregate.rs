// logtail - tests/e2e_aggregate.rs
//
// End-to-end tests for the fan-out aggregator.
//
// Two kinds of peer: in-process stub transports for precise control over
// timing and failure, and real HTTP peers simulated with wiremock and
// reached through `HttpTransport`.

use async_trait::async_trait;
use logtail::app::aggregate::Aggregator;
use logtail::app::transport::{HttpTransport, PeerTransport};
use logtail::core::model::{LogFileInfo, PeerDescriptor, RetrievalQuery};
use logtail::util::error::PeerFailure;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// Helpers
// =============================================================================

/// Behaviour keyed by peer name: `ok`, `hang`, `malformed`, `slow-<ms>`.
struct ScriptedTransport;

#[async_trait]
impl PeerTransport for ScriptedTransport {
    async fn fetch_tail(
        &self,
        peer: &PeerDescriptor,
        _query: &RetrievalQuery,
    ) -> Result<Vec<String>, PeerFailure> {
        match peer.name.as_str() {
            "ok" => Ok(vec!["x".into(), "y".into()]),
            "hang" => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            "malformed" => Err(PeerFailure::BadResponse {
                status: Some(200),
                reason: "malformed response body".into(),
            }),
            name => match name.strip_prefix("slow-").and_then(|ms| ms.parse().ok()) {
                Some(ms) => {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    Ok(vec![format!("{name} done")])
                }
                None => Err(PeerFailure::Unreachable {
                    reason: "unknown peer".into(),
                }),
            },
        }
    }

    async fn list_files(&self, _peer: &PeerDescriptor) -> Result<Vec<LogFileInfo>, PeerFailure> {
        Ok(Vec::new())
    }

    async fn check_health(&self, _peer: &PeerDescriptor) -> Result<(), PeerFailure> {
        Ok(())
    }
}

fn peer(name: &str, url: &str) -> PeerDescriptor {
    PeerDescriptor::new(name, url)
}

fn stub_peers(names: &[&str]) -> Vec<PeerDescriptor> {
    names.iter().map(|n| peer(n, "http://stub")).collect()
}

fn query(filename: &str) -> RetrievalQuery {
    RetrievalQuery::new(filename, 10, None, 1000).unwrap()
}

// =============================================================================
// Partial failure
// =============================================================================

#[tokio::test]
async fn e2e_partial_failure_keeps_successes() {
    let aggregator = Aggregator::new(Arc::new(ScriptedTransport), Duration::from_millis(200));
    let started = Instant::now();
    let result = aggregator
        .aggregate_tail(&stub_peers(&["ok", "hang", "malformed"]), &query("app.log"))
        .await
        .unwrap();

    assert_eq!(result.len(), 3);
    assert_eq!(
        result.get("ok").unwrap().as_ref().unwrap(),
        &vec!["x".to_string(), "y".to_string()]
    );
    assert!(matches!(
        result.get("hang"),
        Some(Err(PeerFailure::Timeout { .. }))
    ));
    assert!(matches!(
        result.get("malformed"),
        Some(Err(PeerFailure::BadResponse { .. }))
    ));
    // Bounded by the per-peer timeout, not by the hanging peer.
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn e2e_peers_are_queried_concurrently() {
    let aggregator = Aggregator::new(Arc::new(ScriptedTransport), Duration::from_secs(5));
    let peers = stub_peers(&["slow-300", "slow-301", "slow-302", "slow-303"]);
    let started = Instant::now();
    let result = aggregator
        .aggregate_tail(&peers, &query("app.log"))
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(result.succeeded(), 4);
    // Sequential would be at least 1.2 s.
    assert!(elapsed < Duration::from_millis(1_000), "took {elapsed:?}");
}

#[tokio::test]
async fn e2e_slow_peer_does_not_delay_others_past_timeout() {
    let aggregator = Aggregator::new(Arc::new(ScriptedTransport), Duration::from_millis(300));
    let started = Instant::now();
    let result = aggregator
        .aggregate_tail(&stub_peers(&["ok", "slow-60000"]), &query("app.log"))
        .await
        .unwrap();

    assert!(result.get("ok").unwrap().is_ok());
    assert!(matches!(
        result.get("slow-60000"),
        Some(Err(PeerFailure::Timeout { .. }))
    ));
    assert!(started.elapsed() < Duration::from_secs(5));
}

// =============================================================================
// HTTP peers
// =============================================================================

#[tokio::test]
async fn e2e_http_transport_classifies_each_peer() {
    let good = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/logs"))
        .and(query_param("filename", "app.log"))
        .and(query_param("entries", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "filename": "app.log",
            "total_lines": -1,
            "returned_lines": 2,
            "filtered": false,
            "entries": ["2024-01-01 a", "2024-01-01 b"],
        })))
        .mount(&good)
        .await;

    let garbled = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/logs"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&garbled)
        .await;

    let failing = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/logs"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "detail": "Log file not found: app.log"
        })))
        .mount(&failing)
        .await;

    let slow = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/logs"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&slow)
        .await;

    let timeout = Duration::from_millis(500);
    let transport = HttpTransport::new(timeout).unwrap();
    let aggregator = Aggregator::new(Arc::new(transport), timeout);
    let peers = vec![
        peer("good", &good.uri()),
        peer("garbled", &garbled.uri()),
        peer("failing", &failing.uri()),
        peer("slow", &slow.uri()),
        // Nothing listens on port 1.
        peer("down", "http://127.0.0.1:1"),
    ];

    let result = aggregator
        .aggregate_tail(&peers, &query("app.log"))
        .await
        .unwrap();

    assert_eq!(result.len(), 5);
    assert_eq!(
        result.get("good").unwrap().as_ref().unwrap(),
        &vec!["2024-01-01 a".to_string(), "2024-01-01 b".to_string()]
    );
    assert!(matches!(
        result.get("garbled"),
        Some(Err(PeerFailure::BadResponse { status: Some(200), .. }))
    ));
    match result.get("failing") {
        Some(Err(PeerFailure::BadResponse { status, reason })) => {
            assert_eq!(*status, Some(404));
            assert!(reason.contains("not found"), "reason: {reason}");
        }
        other => panic!("expected BadResponse, got {other:?}"),
    }
    assert!(matches!(
        result.get("slow"),
        Some(Err(PeerFailure::Timeout { .. }))
    ));
    assert!(matches!(
        result.get("down"),
        Some(Err(PeerFailure::Unreachable { .. }))
    ));
}

#[tokio::test]
async fn e2e_http_transport_passes_keyword_and_lists_files() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/logs"))
        .and(query_param("keyword", "error"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "filename": "app.log",
            "total_lines": -1,
            "returned_lines": 1,
            "filtered": true,
            "entries": ["2024-01-01 ERROR disk"],
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/logs/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "directory": "var/log",
            "total_files": 1,
            "files": [{"filename": "app.log", "size_bytes": 10, "size_readable": "10.00 B"}],
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(Duration::from_secs(2)).unwrap();
    let node = peer("node", &server.uri());

    let q = RetrievalQuery::new("app.log", 5, Some("error".into()), 100).unwrap();
    assert_eq!(
        transport.fetch_tail(&node, &q).await.unwrap(),
        vec!["2024-01-01 ERROR disk".to_string()]
    );
    let files = transport.list_files(&node).await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].filename, "app.log");
    assert!(files[0].modified.is_none());
    transport.check_health(&node).await.unwrap();
}
