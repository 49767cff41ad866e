// logtail - app/primary_api.rs
//
// HTTP surface of the primary: peer registration plus the fan-out
// endpoints that merge results from every registered node.
//
// Every fan-out request works on a snapshot of the registry taken when the
// request arrives.

use crate::app::aggregate::{self, Aggregator, SearchOptions};
use crate::app::api_error::ApiError;
use crate::app::registry::PeerRegistry;
use crate::core::model::{validate_line_limit, PeerDescriptor, RetrievalQuery};
use crate::util::constants;
use crate::util::error::RegistryError;
use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared state of a primary server.
pub struct PrimaryState {
    pub registry: PeerRegistry,
    pub aggregator: Aggregator,
    /// Timeout for health checks and search listings.
    pub health_timeout: Duration,
    /// Largest `entries` accepted by the aggregate endpoints.
    pub max_lines: usize,
    pub default_lines: usize,
    pub search_files_per_peer: usize,
}

#[derive(Debug, Deserialize)]
pub struct AggregateParams {
    pub filename: String,
    pub entries: Option<usize>,
    pub keyword: Option<String>,
    /// Comma-separated peer names; all peers when absent.
    pub servers: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub keyword: String,
    pub entries: Option<usize>,
    pub servers: Option<String>,
}

#[derive(Debug, Serialize)]
struct PeerSummary {
    name: String,
    status: &'static str,
    entries_returned: usize,
    error: Option<String>,
    elapsed_ms: u64,
}

#[derive(Debug, Serialize)]
struct EntryBody {
    server: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct AggregateBody {
    total_servers: usize,
    servers_queried: Vec<PeerSummary>,
    total_entries: usize,
    keyword: Option<String>,
    entries: Vec<EntryBody>,
}

#[derive(Debug, Serialize)]
struct SearchHitBody {
    server: String,
    filename: String,
    content: String,
    matches: usize,
}

#[derive(Debug, Serialize)]
struct SearchBody {
    keyword: String,
    total_matches: usize,
    results: Vec<SearchHitBody>,
}

pub fn router(state: Arc<PrimaryState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/servers/register", post(register))
        .route("/servers/list", get(list_servers))
        .route("/servers/{name}", delete(unregister))
        .route("/servers/{name}/files", get(server_files))
        .route("/aggregate/logs", get(aggregate_logs))
        .route("/aggregate/search", get(aggregate_search))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Primary Log Monitoring Server",
        "version": constants::APP_VERSION,
        "endpoints": {
            "/servers/register": "Register a secondary server",
            "/servers/list": "List registered servers",
            "/servers/{name}/files": "List log files on a server",
            "/aggregate/logs": "Fetch logs from multiple servers",
            "/aggregate/search": "Search logs across servers",
            "/health": "Health check",
        }
    }))
}

async fn health(State(state): State<Arc<PrimaryState>>) -> Json<Value> {
    let peers = state.registry.snapshot().await;
    let checks = state
        .aggregator
        .check_health(&peers, state.health_timeout)
        .await;
    let server_health: Vec<Value> = checks
        .into_iter()
        .map(|(peer, health, failure)| {
            json!({
                "name": peer.name,
                "status": health.as_str(),
                "error": failure.map(|f| f.to_string()),
            })
        })
        .collect();

    Json(json!({
        "status": "healthy",
        "service": constants::PRIMARY_SERVICE_NAME,
        "registered_servers": peers.len(),
        "server_health": server_health,
    }))
}

async fn register(
    State(state): State<Arc<PrimaryState>>,
    Json(peer): Json<PeerDescriptor>,
) -> Result<Json<Value>, ApiError> {
    state.registry.check_admissible(&peer).await?;
    state
        .aggregator
        .check_one(&peer, state.health_timeout)
        .await
        .map_err(|failure| RegistryError::HealthCheckFailed {
            name: peer.name.clone(),
            failure,
        })?;

    let name = peer.name.clone();
    let total = state.registry.register(peer).await?;
    Ok(Json(json!({
        "message": format!("Server '{name}' registered successfully"),
        "total_servers": total,
    })))
}

async fn unregister(
    State(state): State<Arc<PrimaryState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let removed = state.registry.unregister(&name).await?;
    Ok(Json(json!({
        "message": format!("Server '{}' unregistered successfully", removed.name),
    })))
}

async fn list_servers(State(state): State<Arc<PrimaryState>>) -> Json<Value> {
    let peers = state.registry.snapshot().await;
    Json(json!({
        "total_servers": peers.len(),
        "servers": peers,
    }))
}

async fn server_files(
    State(state): State<Arc<PrimaryState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let peer = state
        .registry
        .get(&name)
        .await
        .ok_or(RegistryError::NotFound { name })?;
    let files = state.aggregator.list_files(&peer).await?;
    Ok(Json(json!({
        "server": peer.name,
        "files": files,
    })))
}

async fn aggregate_logs(
    State(state): State<Arc<PrimaryState>>,
    Query(params): Query<AggregateParams>,
) -> Result<Json<AggregateBody>, ApiError> {
    let line_limit = params.entries.unwrap_or(state.default_lines);
    let query = RetrievalQuery::new(
        params.filename,
        line_limit,
        params.keyword,
        state.max_lines,
    )?;
    let peers = aggregate::select_peers(
        &state.registry.snapshot().await,
        params.servers.as_deref(),
    )?;

    let result = state.aggregator.aggregate_tail(&peers, &query).await?;

    let servers_queried = result
        .iter()
        .map(|r| PeerSummary {
            name: r.peer.name.clone(),
            status: match &r.outcome {
                Ok(_) => "success",
                Err(failure) => failure.kind(),
            },
            entries_returned: r.outcome.as_ref().map(Vec::len).unwrap_or(0),
            error: r.outcome.as_ref().err().map(ToString::to_string),
            elapsed_ms: r.elapsed.as_millis() as u64,
        })
        .collect();
    let entries = result
        .merged_entries(line_limit)
        .into_iter()
        .map(|e| EntryBody {
            server: e.server,
            content: e.content,
        })
        .collect();

    Ok(Json(AggregateBody {
        total_servers: result.len(),
        servers_queried,
        total_entries: result.total_lines(),
        keyword: query.keyword().map(str::to_owned),
        entries,
    }))
}

async fn aggregate_search(
    State(state): State<Arc<PrimaryState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchBody>, ApiError> {
    let line_limit = params.entries.unwrap_or(state.default_lines);
    validate_line_limit(line_limit, state.max_lines)?;
    let peers = aggregate::select_peers(
        &state.registry.snapshot().await,
        params.servers.as_deref(),
    )?;

    let result = state
        .aggregator
        .search(
            &peers,
            &params.keyword,
            SearchOptions {
                line_limit,
                files_per_peer: state.search_files_per_peer,
                listing_timeout: state.health_timeout,
            },
        )
        .await?;

    Ok(Json(SearchBody {
        keyword: params.keyword,
        total_matches: result.total_matches,
        results: result
            .hits
            .into_iter()
            .map(|h| SearchHitBody {
                server: h.server,
                filename: h.filename,
                content: h.content,
                matches: h.matches,
            })
            .collect(),
    }))
}
