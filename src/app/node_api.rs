// logtail - app/node_api.rs
//
// HTTP surface of a log node: serves tails and listings of the files under
// its log directory.
//
// Retrieval is blocking file I/O, so every handler that touches the disk
// runs it on the blocking pool. The stream endpoint drives a `TailStream`
// on a blocking worker and forwards each line through a bounded channel;
// when the client goes away the send fails and the worker stops reading.

use crate::app::api_error::ApiError;
use crate::core::listing;
use crate::core::model::{LogListing, RetrievalQuery, TailResponse};
use crate::core::path;
use crate::core::source::FileSource;
use crate::core::tail::{TailReader, TailStream};
use crate::util::constants;
use crate::util::error::TailError;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared state of a node server.
#[derive(Debug)]
pub struct NodeState {
    pub reader: TailReader,
    /// Directory every source identifier is resolved against.
    pub log_dir: PathBuf,
    /// Line count used when a request gives none.
    pub default_lines: usize,
}

impl NodeState {
    fn query(&self, params: LogsParams) -> Result<RetrievalQuery, TailError> {
        RetrievalQuery::new(
            params.filename,
            params.entries.unwrap_or(self.default_lines),
            params.keyword,
            self.reader.config().max_lines,
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct LogsParams {
    pub filename: String,
    pub entries: Option<usize>,
    pub keyword: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub directory: Option<String>,
}

pub fn router(state: Arc<NodeState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/logs", get(get_logs))
        .route("/logs/list", get(list_logs))
        .route("/logs/stream", get(stream_logs))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Log Monitoring Service",
        "version": constants::APP_VERSION,
        "endpoints": {
            "/logs": "Fetch log entries",
            "/logs/list": "List available log files",
            "/logs/stream": "Stream log entries, newest first",
            "/health": "Health check",
        }
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": constants::NODE_SERVICE_NAME,
    }))
}

async fn get_logs(
    State(state): State<Arc<NodeState>>,
    Query(params): Query<LogsParams>,
) -> Result<Json<TailResponse>, ApiError> {
    let query = state.query(params)?;
    let worker = Arc::clone(&state);
    let (query, entries) = tokio::task::spawn_blocking(move || -> Result<_, TailError> {
        let path = path::resolve_under(&worker.log_dir, query.source_identifier())?;
        let entries = worker
            .reader
            .tail(&path, query.line_limit(), query.keyword())?;
        Ok((query, entries))
    })
    .await??;

    Ok(Json(TailResponse {
        filename: query.source_identifier().to_string(),
        total_lines: -1,
        returned_lines: entries.len(),
        filtered: query.keyword().is_some(),
        entries,
    }))
}

async fn list_logs(
    State(state): State<Arc<NodeState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<LogListing>, ApiError> {
    let worker = Arc::clone(&state);
    let listing = tokio::task::spawn_blocking(move || {
        listing::list_logs(&worker.log_dir, params.directory.as_deref())
    })
    .await??;
    Ok(Json(listing))
}

async fn stream_logs(
    State(state): State<Arc<NodeState>>,
    Query(params): Query<LogsParams>,
) -> Result<Response, ApiError> {
    let query = state.query(params)?;
    let worker = Arc::clone(&state);
    let (query, stream) = tokio::task::spawn_blocking(move || -> Result<_, TailError> {
        let path = path::resolve_under(&worker.log_dir, query.source_identifier())?;
        let stream = worker
            .reader
            .stream(&path, query.line_limit(), query.keyword())?;
        Ok((query, stream))
    })
    .await??;

    let (tx, rx) = mpsc::channel(constants::STREAM_CHANNEL_CAPACITY);
    let filename = query.source_identifier().to_string();
    tokio::task::spawn_blocking(move || pump(stream, &filename, &tx));

    let chunks = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    });
    Ok((
        [(header::CONTENT_TYPE, "application/json")],
        Body::from_stream(chunks),
    )
        .into_response())
}

/// Write one JSON document, `{"filename":..,"entries":[..]}`, into `tx`
/// one line at a time.
///
/// A read error is forwarded as the final item so the response ends
/// abnormally instead of closing the array as if the scan had finished.
fn pump(
    mut stream: TailStream<FileSource>,
    filename: &str,
    tx: &mpsc::Sender<io::Result<String>>,
) {
    let header = format!(r#"{{"filename":{},"entries":["#, json_string(filename));
    if tx.blocking_send(Ok(header)).is_err() {
        return;
    }

    let mut sent = 0usize;
    for item in stream.by_ref() {
        let chunk = match item {
            Ok(line) if sent == 0 => json_string(&line),
            Ok(line) => format!(",{}", json_string(&line)),
            Err(e) => {
                tracing::warn!(file = %filename, error = %e, "Stream aborted by read error");
                let _ = tx.blocking_send(Err(e));
                return;
            }
        };
        if tx.blocking_send(Ok(chunk)).is_err() {
            tracing::debug!(file = %filename, sent, "Stream client went away");
            return;
        }
        sent += 1;
    }

    if tx.blocking_send(Ok("]}".to_string())).is_ok() {
        tracing::debug!(
            file = %filename,
            lines = sent,
            chunks = stream.chunks_read(),
            "Stream complete"
        );
    }
}

fn json_string(s: &str) -> String {
    Value::String(s.to_owned()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_string_escapes() {
        assert_eq!(json_string("a\"b"), r#""a\"b""#);
        assert_eq!(json_string("tab\there"), r#""tab\there""#);
    }

    #[test]
    fn test_query_uses_default_lines() {
        let state = NodeState {
            reader: TailReader::default(),
            log_dir: PathBuf::from("."),
            default_lines: 7,
        };
        let q = state
            .query(LogsParams {
                filename: "app.log".into(),
                entries: None,
                keyword: Some(String::new()),
            })
            .unwrap();
        assert_eq!(q.line_limit(), 7);
        assert_eq!(q.keyword(), None);
    }
}
