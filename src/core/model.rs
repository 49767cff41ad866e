// logtail - core/model.rs
//
// Core data model types. Pure data definitions with no I/O.
//
// These types are the shared vocabulary across all layers, and the serde
// shapes double as the JSON wire format between primary and nodes.

use crate::core::path;
use crate::util::error::TailError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Retrieval query
// =============================================================================

/// A validated request for the last lines of one log source.
///
/// Immutable once constructed: the constructor is the only place the line
/// limit and identifier are checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalQuery {
    source_identifier: String,
    line_limit: usize,
    keyword: Option<String>,
}

impl RetrievalQuery {
    /// Build a query, rejecting a line limit outside `1..=max_lines` and an
    /// identifier that fails the traversal check. An empty keyword means no
    /// filter.
    pub fn new(
        source_identifier: impl Into<String>,
        line_limit: usize,
        keyword: Option<String>,
        max_lines: usize,
    ) -> Result<Self, TailError> {
        let source_identifier = source_identifier.into();
        validate_line_limit(line_limit, max_lines)?;
        path::validate_identifier(&source_identifier)?;
        Ok(Self {
            source_identifier,
            line_limit,
            keyword: keyword.filter(|k| !k.is_empty()),
        })
    }

    /// Logical file reference relative to the serving node's log directory.
    pub fn source_identifier(&self) -> &str {
        &self.source_identifier
    }

    pub fn line_limit(&self) -> usize {
        self.line_limit
    }

    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref()
    }
}

/// Check a requested line count against the enforced ceiling.
pub fn validate_line_limit(line_limit: usize, max_lines: usize) -> Result<(), TailError> {
    if line_limit == 0 || line_limit > max_lines {
        return Err(TailError::invalid_query(format!(
            "entries must be between 1 and {max_lines}, got {line_limit}"
        )));
    }
    Ok(())
}

// =============================================================================
// Peers
// =============================================================================

/// A remote log server the primary can query.
///
/// Registered outside the aggregator and passed in as a plain list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerDescriptor {
    /// Unique server name; keys the aggregate result.
    pub name: String,
    /// Base URL of the peer's node surface, e.g. `http://10.0.0.5:8000`.
    pub url: String,
    /// Free-form description shown in listings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PeerDescriptor {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            description: None,
        }
    }

    /// Join `path` onto the base URL without doubling slashes.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

// =============================================================================
// Wire types
// =============================================================================

/// Body of a node's `GET /logs` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TailResponse {
    pub filename: String,
    /// Always -1: counting every line would defeat the bounded scan.
    pub total_lines: i64,
    pub returned_lines: usize,
    pub filtered: bool,
    /// Oldest-first among the returned set.
    pub entries: Vec<String>,
}

/// One file in a node's directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFileInfo {
    /// Path relative to the node's log directory, `/`-separated.
    pub filename: String,
    pub size_bytes: u64,
    pub size_readable: String,
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
}

/// Body of a node's `GET /logs/list` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogListing {
    pub directory: String,
    pub total_files: usize,
    pub files: Vec<LogFileInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_rejects_zero_and_oversized_limits() {
        assert!(RetrievalQuery::new("app.log", 0, None, 10).is_err());
        assert!(RetrievalQuery::new("app.log", 11, None, 10).is_err());
        assert!(RetrievalQuery::new("app.log", 10, None, 10).is_ok());
    }

    #[test]
    fn test_query_rejects_traversal() {
        let err = RetrievalQuery::new("../etc/passwd", 5, None, 10).unwrap_err();
        assert!(matches!(err, TailError::InvalidQuery { .. }));
    }

    #[test]
    fn test_empty_keyword_is_no_filter() {
        let q = RetrievalQuery::new("app.log", 5, Some(String::new()), 10).unwrap();
        assert_eq!(q.keyword(), None);
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let peer = PeerDescriptor::new("web-1", "http://host:8000/");
        assert_eq!(peer.endpoint("/logs"), "http://host:8000/logs");
        assert_eq!(peer.endpoint("health"), "http://host:8000/health");
    }

    #[test]
    fn test_tail_response_round_trips_wire_shape() {
        let json = r#"{"filename":"a.log","total_lines":-1,"returned_lines":1,"filtered":false,"entries":["x"]}"#;
        let resp: TailResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.entries, vec!["x".to_string()]);
        assert_eq!(resp.total_lines, -1);
    }
}
