// logtail - tests/e2e_api.rs
//
// End-to-end tests for the node and primary HTTP surfaces.
//
// Routers are driven in-process with `tower::ServiceExt::oneshot`; the node
// reads real files from a temp directory, the primary talks to a stub
// transport.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use logtail::app::aggregate::Aggregator;
use logtail::app::node_api::{self, NodeState};
use logtail::app::primary_api::{self, PrimaryState};
use logtail::app::registry::PeerRegistry;
use logtail::app::transport::PeerTransport;
use logtail::core::model::{LogFileInfo, PeerDescriptor, RetrievalQuery};
use logtail::core::tail::{TailConfig, TailReader};
use logtail::util::error::PeerFailure;
use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

// =============================================================================
// Helpers
// =============================================================================

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|e| panic!("non-JSON body ({e}): {}", String::from_utf8_lossy(&bytes)))
    };
    (status, value)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Method::GET, uri, None).await
}

fn node_app(config: TailConfig) -> (tempfile::TempDir, Router) {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("abc.log"), "a\nb\nc\nd\ne\n").unwrap();
    fs::write(dir.path().join("empty.log"), "").unwrap();
    fs::create_dir(dir.path().join("apache")).unwrap();
    fs::write(
        dir.path().join("apache/access.log"),
        "GET / 200\nGET /x 404\nget /y 200\n",
    )
    .unwrap();

    let state = Arc::new(NodeState {
        reader: TailReader::new(config),
        log_dir: dir.path().to_path_buf(),
        default_lines: 100,
    });
    (dir, node_api::router(state))
}

/// Answers by peer name. `sick` fails its health check, `broken` fails
/// every tail.
struct StubTransport;

#[async_trait]
impl PeerTransport for StubTransport {
    async fn fetch_tail(
        &self,
        peer: &PeerDescriptor,
        _query: &RetrievalQuery,
    ) -> Result<Vec<String>, PeerFailure> {
        match peer.name.as_str() {
            "node-a" => Ok(vec![
                "2024-01-01 10:00:01 a error".into(),
                "2024-01-01 10:00:03 a ok".into(),
            ]),
            "node-b" => Ok(vec!["2024-01-01 10:00:02 b ERROR error".into()]),
            _ => Err(PeerFailure::Unreachable {
                reason: "connection refused".into(),
            }),
        }
    }

    async fn list_files(&self, peer: &PeerDescriptor) -> Result<Vec<LogFileInfo>, PeerFailure> {
        match peer.name.as_str() {
            "broken" => Err(PeerFailure::Unreachable {
                reason: "connection refused".into(),
            }),
            _ => Ok(vec![LogFileInfo {
                filename: "app.log".into(),
                size_bytes: 64,
                size_readable: "64.00 B".into(),
                modified: None,
            }]),
        }
    }

    async fn check_health(&self, peer: &PeerDescriptor) -> Result<(), PeerFailure> {
        match peer.name.as_str() {
            "sick" => Err(PeerFailure::BadResponse {
                status: Some(503),
                reason: "draining".into(),
            }),
            "broken" => Err(PeerFailure::Unreachable {
                reason: "connection refused".into(),
            }),
            _ => Ok(()),
        }
    }
}

fn primary_app(peers: &[&str]) -> Router {
    let peers = peers
        .iter()
        .map(|n| PeerDescriptor::new(*n, format!("http://{n}:8000")))
        .collect();
    let state = Arc::new(PrimaryState {
        registry: PeerRegistry::new(peers, 16),
        aggregator: Aggregator::new(Arc::new(StubTransport), Duration::from_secs(2)),
        health_timeout: Duration::from_secs(1),
        max_lines: 1000,
        default_lines: 50,
        search_files_per_peer: 5,
    });
    primary_api::router(state)
}

// =============================================================================
// Node surface
// =============================================================================

#[tokio::test]
async fn e2e_node_health_and_info() {
    let (_dir, app) = node_app(TailConfig::default());
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "healthy", "service": "log-monitoring"}));

    let (status, body) = get(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["endpoints"]["/logs"].is_string());
}

#[tokio::test]
async fn e2e_node_returns_last_entries() {
    let (_dir, app) = node_app(TailConfig::default());
    let (status, body) = get(&app, "/logs?filename=abc.log&entries=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "filename": "abc.log",
            "total_lines": -1,
            "returned_lines": 2,
            "filtered": false,
            "entries": ["d", "e"],
        })
    );

    let (_, body) = get(&app, "/logs?filename=apache/access.log&keyword=GET").await;
    assert_eq!(body["filtered"], json!(true));
    assert_eq!(body["returned_lines"], json!(3));

    let (status, body) = get(&app, "/logs?filename=empty.log").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"], json!([]));
}

#[tokio::test]
async fn e2e_node_error_statuses() {
    let (_dir, app) = node_app(TailConfig::default());

    let (status, body) = get(&app, "/logs?filename=../etc/passwd").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());

    let (status, _) = get(&app, "/logs?filename=/etc/passwd").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, "/logs?filename=abc.log&entries=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, "/logs?filename=abc.log&entries=10001").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get(&app, "/logs?filename=missing.log").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].as_str().unwrap().contains("not found"));

    let (status, _) = get(&app, "/logs?filename=apache").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn e2e_node_rejects_oversized_file() {
    let (_dir, app) = node_app(TailConfig {
        max_source_bytes: 4,
        ..TailConfig::default()
    });
    let (status, body) = get(&app, "/logs?filename=abc.log").await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["detail"].as_str().unwrap().contains("too large"));
}

#[tokio::test]
async fn e2e_node_lists_files() {
    let (_dir, app) = node_app(TailConfig::default());
    let (status, body) = get(&app, "/logs/list").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_files"], json!(3));
    let names: Vec<&str> = body["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["filename"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["abc.log", "apache/access.log", "empty.log"]);

    let (status, body) = get(&app, "/logs/list?directory=apache").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_files"], json!(1));

    let (status, _) = get(&app, "/logs/list?directory=../..").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn e2e_node_stream_is_newest_first_json() {
    let (_dir, app) = node_app(TailConfig::default());
    let (status, body) = get(&app, "/logs/stream?filename=abc.log&entries=3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"filename": "abc.log", "entries": ["e", "d", "c"]}));

    let (_, body) = get(&app, "/logs/stream?filename=apache/access.log&keyword=404").await;
    assert_eq!(body["entries"], json!(["GET /x 404"]));

    let (status, _) = get(&app, "/logs/stream?filename=missing.log").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Primary surface
// =============================================================================

#[tokio::test]
async fn e2e_primary_aggregates_and_reports_each_server() {
    let app = primary_app(&["node-a", "node-b", "broken"]);
    let (status, body) = get(&app, "/aggregate/logs?filename=app.log&entries=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_servers"], json!(3));
    assert_eq!(body["total_entries"], json!(3));

    let statuses: Vec<(&str, &str)> = body["servers_queried"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| (s["name"].as_str().unwrap(), s["status"].as_str().unwrap()))
        .collect();
    assert_eq!(
        statuses,
        vec![("node-a", "success"), ("node-b", "success"), ("broken", "unreachable")]
    );

    // Merged by content, newest first; the two newest survive the limit.
    assert_eq!(
        body["entries"],
        json!([
            {"server": "node-a", "content": "2024-01-01 10:00:03 a ok"},
            {"server": "node-b", "content": "2024-01-01 10:00:02 b ERROR error"},
        ])
    );
}

#[tokio::test]
async fn e2e_primary_subset_and_errors() {
    let app = primary_app(&["node-a", "node-b"]);
    let (status, body) = get(&app, "/aggregate/logs?filename=app.log&servers=node-b").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_servers"], json!(1));

    let (status, _) = get(&app, "/aggregate/logs?filename=app.log&servers=zzz").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&app, "/aggregate/logs?filename=app.log&entries=1001").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, "/aggregate/logs?filename=../secret").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let empty = primary_app(&[]);
    let (status, body) = get(&empty, "/aggregate/logs?filename=app.log").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], json!("No secondary servers registered"));
}

#[tokio::test]
async fn e2e_primary_registration_lifecycle() {
    let app = primary_app(&["node-a"]);

    let (status, body) = send(
        &app,
        Method::POST,
        "/servers/register",
        Some(json!({"name": "node-b", "url": "http://10.0.0.2:8000", "description": "web"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_servers"], json!(2));

    let (status, _) = send(
        &app,
        Method::POST,
        "/servers/register",
        Some(json!({"name": "node-b", "url": "http://10.0.0.3:8000"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::POST,
        "/servers/register",
        Some(json!({"name": "sick", "url": "http://10.0.0.4:8000"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("health check failed"));

    let (status, _) = send(
        &app,
        Method::POST,
        "/servers/register",
        Some(json!({"name": "ftp", "url": "ftp://10.0.0.5"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = get(&app, "/servers/list").await;
    assert_eq!(body["total_servers"], json!(2));
    assert_eq!(body["servers"][1]["description"], json!("web"));

    let (status, _) = send(&app, Method::DELETE, "/servers/node-b", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::DELETE, "/servers/node-b", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn e2e_primary_proxies_file_listing() {
    let app = primary_app(&["node-a", "broken"]);
    let (status, body) = get(&app, "/servers/node-a/files").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["files"][0]["filename"], json!("app.log"));

    let (status, _) = get(&app, "/servers/broken/files").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (status, _) = get(&app, "/servers/nope/files").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn e2e_primary_search_ranks_by_matches() {
    let app = primary_app(&["node-a", "node-b", "broken"]);
    let (status, body) = get(&app, "/aggregate/search?keyword=error").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_matches"], json!(2));
    assert_eq!(body["results"][0]["server"], json!("node-b"));
    assert_eq!(body["results"][0]["matches"], json!(2));
    assert_eq!(body["results"][1]["server"], json!("node-a"));
    assert_eq!(body["results"][1]["filename"], json!("app.log"));
}

#[tokio::test]
async fn e2e_primary_health_reports_each_peer() {
    let app = primary_app(&["node-a", "sick", "broken"]);
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], json!("primary-log-monitor"));
    assert_eq!(body["registered_servers"], json!(3));
    let states: Vec<&str> = body["server_health"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["status"].as_str().unwrap())
        .collect();
    assert_eq!(states, vec!["healthy", "unhealthy", "unreachable"]);
}
