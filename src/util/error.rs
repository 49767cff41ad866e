// logtail - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// No string-based error propagation: every failure carries the path, peer,
// or field it concerns, and the underlying cause where one exists.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for all logtail operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum LogTailError {
    /// Local tail retrieval failed.
    Tail(TailError),

    /// An aggregate request was structurally invalid.
    Aggregate(AggregateError),

    /// Peer registration bookkeeping failed.
    Registry(RegistryError),

    /// Configuration loading or validation failed.
    Config(ConfigError),

    /// I/O error with path context.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },

    /// A server could not bind or failed while serving.
    Server { addr: SocketAddr, source: io::Error },

    /// The outbound HTTP client could not be built.
    Http(reqwest::Error),

    /// The async runtime could not be started.
    Runtime(io::Error),
}

impl fmt::Display for LogTailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tail(e) => write!(f, "Tail error: {e}"),
            Self::Aggregate(e) => write!(f, "Aggregate error: {e}"),
            Self::Registry(e) => write!(f, "Registry error: {e}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                path.display()
            ),
            Self::Server { addr, source } => write!(f, "Server error on {addr}: {source}"),
            Self::Http(e) => write!(f, "HTTP client error: {e}"),
            Self::Runtime(e) => write!(f, "Failed to start async runtime: {e}"),
        }
    }
}

impl std::error::Error for LogTailError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Tail(e) => Some(e),
            Self::Aggregate(e) => Some(e),
            Self::Registry(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Io { source, .. } => Some(source),
            Self::Server { source, .. } => Some(source),
            Self::Http(e) => Some(e),
            Self::Runtime(e) => Some(e),
        }
    }
}

impl From<reqwest::Error> for LogTailError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

// ---------------------------------------------------------------------------
// Tail errors
// ---------------------------------------------------------------------------

/// Errors surfaced by the tail reader.
///
/// Malformed byte sequences are not errors: they are decoded lossily and the
/// retrieval continues.
#[derive(Debug)]
pub enum TailError {
    /// The line limit is out of range or the source identifier is unsafe.
    InvalidQuery { reason: String },

    /// The source does not exist, is not a regular file, or cannot be opened.
    SourceNotFound {
        path: PathBuf,
        source: Option<io::Error>,
    },

    /// The source exceeds the configured ceiling; rejected before any read.
    SourceTooLarge { path: PathBuf, size: u64, max: u64 },

    /// A read failed part-way through the scan.
    Io { path: PathBuf, source: io::Error },
}

impl TailError {
    /// Convenience constructor for query validation failures.
    pub fn invalid_query(reason: impl Into<String>) -> Self {
        Self::InvalidQuery {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for TailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidQuery { reason } => write!(f, "Invalid query: {reason}"),
            Self::SourceNotFound { path, source } => match source {
                Some(e) => write!(f, "Log file not found: '{}': {e}", path.display()),
                None => write!(f, "Log file not found: '{}'", path.display()),
            },
            Self::SourceTooLarge { path, size, max } => write!(
                f,
                "File too large: '{}' is {size} bytes (max: {max} bytes)",
                path.display()
            ),
            Self::Io { path, source } => {
                write!(f, "Error reading log file '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for TailError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SourceNotFound {
                source: Some(e), ..
            } => Some(e),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<TailError> for LogTailError {
    fn from(e: TailError) -> Self {
        Self::Tail(e)
    }
}

// ---------------------------------------------------------------------------
// Peer failures
// ---------------------------------------------------------------------------

/// Why a single peer produced no lines.
///
/// Recorded against the peer inside an aggregate result; never propagated out
/// of the aggregate call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerFailure {
    /// The peer did not answer within the per-peer timeout.
    Timeout { after: Duration },

    /// The connection could not be established or the request was not sent.
    Unreachable { reason: String },

    /// The peer answered with a non-success status or an undecodable body.
    BadResponse { status: Option<u16>, reason: String },
}

impl PeerFailure {
    /// Stable machine-readable label for this failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Unreachable { .. } => "unreachable",
            Self::BadResponse { .. } => "bad_response",
        }
    }
}

impl fmt::Display for PeerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { after } => {
                write!(f, "Request timed out after {} ms", after.as_millis())
            }
            Self::Unreachable { reason } => write!(f, "Peer unreachable: {reason}"),
            Self::BadResponse {
                status: Some(status),
                reason,
            } => write!(f, "HTTP {status}: {reason}"),
            Self::BadResponse {
                status: None,
                reason,
            } => write!(f, "Bad response: {reason}"),
        }
    }
}

impl std::error::Error for PeerFailure {}

// ---------------------------------------------------------------------------
// Aggregate errors
// ---------------------------------------------------------------------------

/// Structural problems that stop an aggregate call before any peer is
/// contacted. Per-peer problems are `PeerFailure`s instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    /// The peer list is empty.
    NoPeers,

    /// Two peers share a name, so outcomes could not be keyed uniquely.
    DuplicatePeer { name: String },

    /// The query itself is invalid.
    InvalidQuery { reason: String },

    /// A subset was requested but none of the names are registered.
    UnknownPeers { requested: Vec<String> },
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPeers => write!(f, "No secondary servers registered"),
            Self::DuplicatePeer { name } => {
                write!(f, "Peer '{name}' appears more than once in the request")
            }
            Self::InvalidQuery { reason } => write!(f, "Invalid query: {reason}"),
            Self::UnknownPeers { requested } => write!(
                f,
                "None of the specified servers found: {}",
                requested.join(",")
            ),
        }
    }
}

impl std::error::Error for AggregateError {}

impl From<AggregateError> for LogTailError {
    fn from(e: AggregateError) -> Self {
        Self::Aggregate(e)
    }
}

// ---------------------------------------------------------------------------
// Registry errors
// ---------------------------------------------------------------------------

/// Errors from peer registration bookkeeping.
#[derive(Debug)]
pub enum RegistryError {
    /// A peer with this name is already registered.
    AlreadyRegistered { name: String },

    /// No peer with this name is registered.
    NotFound { name: String },

    /// The base URL is not an http(s) URL.
    InvalidUrl { url: String },

    /// The registry already holds the maximum number of peers.
    Full { max: usize },

    /// The peer failed its registration health check.
    HealthCheckFailed { name: String, failure: PeerFailure },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRegistered { name } => {
                write!(f, "Server '{name}' already registered")
            }
            Self::NotFound { name } => write!(f, "Server '{name}' not found"),
            Self::InvalidUrl { url } => write!(
                f,
                "Invalid server URL '{url}': must start with http:// or https://"
            ),
            Self::Full { max } => {
                write!(f, "Registry is full ({max} servers); unregister one first")
            }
            Self::HealthCheckFailed { name, failure } => {
                write!(f, "Server '{name}' health check failed: {failure}")
            }
        }
    }
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::HealthCheckFailed { failure, .. } => Some(failure),
            _ => None,
        }
    }
}

impl From<RegistryError> for LogTailError {
    fn from(e: RegistryError) -> Self {
        Self::Registry(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// A bind address could not be parsed.
    InvalidBindAddress {
        value: String,
        source: std::net::AddrParseError,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBindAddress { value, source } => {
                write!(f, "Invalid bind address '{value}': {source}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidBindAddress { source, .. } => Some(source),
        }
    }
}

impl From<ConfigError> for LogTailError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Convenience type alias for logtail results.
pub type Result<T> = std::result::Result<T, LogTailError>;
