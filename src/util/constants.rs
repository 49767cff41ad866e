// logtail - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.
// Every configurable value has a DEFAULT and a MIN/MAX pair that the
// config loader validates against.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "logtail";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "logtail";

/// Current application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service name reported by the node surface.
pub const NODE_SERVICE_NAME: &str = "log-monitoring";

/// Service name reported by the primary surface.
pub const PRIMARY_SERVICE_NAME: &str = "primary-log-monitor";

// =============================================================================
// Tail retrieval
// =============================================================================

/// Bytes read per backward step of the chunked scan.
///
/// Balances the number of read calls against peak buffer size. Not a
/// correctness parameter: any value >= 1 yields identical output.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024; // 8 KiB

/// Smallest configurable chunk size.
pub const MIN_CHUNK_SIZE: usize = 512;

/// Largest configurable chunk size.
pub const MAX_CHUNK_SIZE: usize = 4 * 1024 * 1024; // 4 MiB

/// Files smaller than `DEFAULT_CHUNK_SIZE * SMALL_FILE_CHUNKS` bytes are read
/// in full instead of being scanned backwards.
pub const DEFAULT_SMALL_FILE_CHUNKS: usize = 10;

/// Upper bound on the small-file multiplier.
pub const MAX_SMALL_FILE_CHUNKS: usize = 1_024;

/// Sources larger than this are rejected before any read.
pub const DEFAULT_MAX_SOURCE_BYTES: u64 = 4 * 1024 * 1024 * 1024; // 4 GiB

/// Smallest configurable source ceiling.
pub const MIN_MAX_SOURCE_BYTES: u64 = 1024 * 1024; // 1 MiB

/// Largest number of lines one retrieval may request.
pub const DEFAULT_MAX_LINES: usize = 10_000;

/// Hard upper bound on the configurable line ceiling.
pub const ABSOLUTE_MAX_LINES: usize = 1_000_000;

/// Lines returned by the node surface when `entries` is omitted.
pub const DEFAULT_LINES: usize = 100;

// =============================================================================
// Aggregation
// =============================================================================

/// Per-peer timeout for one remote tail request (seconds).
pub const DEFAULT_PEER_TIMEOUT_SECS: u64 = 30;

/// Minimum configurable per-peer timeout (seconds).
pub const MIN_PEER_TIMEOUT_SECS: u64 = 1;

/// Maximum configurable per-peer timeout (seconds).
pub const MAX_PEER_TIMEOUT_SECS: u64 = 600;

/// Timeout for peer health checks and file listings (seconds).
pub const DEFAULT_HEALTH_TIMEOUT_SECS: u64 = 5;

/// Line ceiling for one aggregate request (per peer and for the merged list).
pub const DEFAULT_AGGREGATE_MAX_LINES: usize = 1_000;

/// Lines per peer when an aggregate request omits `entries`.
pub const DEFAULT_AGGREGATE_LINES: usize = 50;

/// Files searched per peer by the cross-fleet keyword search.
pub const DEFAULT_SEARCH_FILES_PER_PEER: usize = 5;

/// Upper bound on files searched per peer.
pub const MAX_SEARCH_FILES_PER_PEER: usize = 100;

/// Maximum number of peers the registry will hold.
pub const MAX_PEERS: usize = 256;

// =============================================================================
// Network
// =============================================================================

/// Default bind address of the node (local tail) surface.
pub const DEFAULT_NODE_BIND: &str = "0.0.0.0:8000";

/// Default bind address of the primary (aggregation) surface.
pub const DEFAULT_PRIMARY_BIND: &str = "0.0.0.0:8001";

/// Default log directory served by a node.
pub const DEFAULT_LOG_DIR: &str = "./var/log";

/// Capacity of the channel between the blocking stream worker and the
/// HTTP response body.
pub const STREAM_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Maximum length of a log line included in debug output.
/// Prevents accidental exposure of sensitive data in long lines.
pub const DEBUG_MAX_LINE_PREVIEW: usize = 200;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";
