// logtail - platform/config.rs
//
// Platform-specific configuration directory resolution and config.toml
// loading with startup validation.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.

use crate::core::model::PeerDescriptor;
use crate::core::tail::TailConfig;
use crate::util::constants;
use directories::ProjectDirs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Resolved platform paths for logtail configuration.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/logtail/ or %APPDATA%\logtail\config\)
    pub config_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to current directory if platform dirs cannot be determined.
    pub fn resolve() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            let config_dir = proj_dirs.config_dir().to_path_buf();
            tracing::debug!(config = %config_dir.display(), "Platform paths resolved");
            Self { config_dir }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            Self {
                config_dir: PathBuf::from("."),
            }
        }
    }

    /// Default location of config.toml.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(constants::CONFIG_FILE_NAME)
    }
}

// =============================================================================
// config.toml loading and validation
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are silently ignored for forward compatibility -- a newer
/// config file can be used with an older binary without crashing.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// `[tail]` section.
    pub tail: TailSection,
    /// `[node]` section.
    pub node: NodeSection,
    /// `[primary]` section.
    pub primary: PrimarySection,
    /// `[[peers]]` entries.
    pub peers: Vec<PeerEntry>,
    /// `[logging]` section.
    pub logging: LoggingSection,
}

/// `[tail]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct TailSection {
    pub chunk_size_bytes: Option<usize>,
    pub small_file_chunks: Option<usize>,
    pub max_source_bytes: Option<u64>,
    pub max_lines: Option<usize>,
    pub default_lines: Option<usize>,
}

/// `[node]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct NodeSection {
    pub bind: Option<String>,
    pub log_dir: Option<String>,
}

/// `[primary]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct PrimarySection {
    pub bind: Option<String>,
    pub peer_timeout_secs: Option<u64>,
    pub health_timeout_secs: Option<u64>,
    pub max_lines: Option<usize>,
    pub default_lines: Option<usize>,
    pub search_files_per_peer: Option<usize>,
}

/// One `[[peers]]` entry.
#[derive(Debug, serde::Deserialize)]
pub struct PeerEntry {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
}

/// Validated application configuration derived from `config.toml`.
///
/// All values are validated against named constants at load time.
/// Invalid values produce actionable warnings and fall back to defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // -- Tail --
    pub tail: TailConfig,
    /// Lines returned by a node when a request omits `entries`.
    pub default_lines: usize,

    // -- Node --
    pub node_bind: String,
    pub log_dir: PathBuf,

    // -- Primary --
    pub primary_bind: String,
    pub peer_timeout: Duration,
    pub health_timeout: Duration,
    pub aggregate_max_lines: usize,
    pub aggregate_default_lines: usize,
    pub search_files_per_peer: usize,
    /// Peers registered at primary start-up.
    pub peers: Vec<PeerDescriptor>,

    // -- Logging --
    pub log_level: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tail: TailConfig::default(),
            default_lines: constants::DEFAULT_LINES,
            node_bind: constants::DEFAULT_NODE_BIND.to_string(),
            log_dir: PathBuf::from(constants::DEFAULT_LOG_DIR),
            primary_bind: constants::DEFAULT_PRIMARY_BIND.to_string(),
            peer_timeout: Duration::from_secs(constants::DEFAULT_PEER_TIMEOUT_SECS),
            health_timeout: Duration::from_secs(constants::DEFAULT_HEALTH_TIMEOUT_SECS),
            aggregate_max_lines: constants::DEFAULT_AGGREGATE_MAX_LINES,
            aggregate_default_lines: constants::DEFAULT_AGGREGATE_LINES,
            search_files_per_peer: constants::DEFAULT_SEARCH_FILES_PER_PEER,
            peers: Vec::new(),
            log_level: None,
        }
    }
}

/// Load and validate the config file at `config_path`.
///
/// Returns `AppConfig` with validated values and a list of non-fatal warnings.
/// If the file does not exist, returns defaults with no warnings (first-run).
/// If the file is unparseable, returns defaults with an error warning so the
/// service still starts but the operator is informed.
pub fn load_config(config_path: &Path) -> (AppConfig, Vec<String>) {
    let mut warnings: Vec<String> = Vec::new();

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "No config.toml found; using defaults");
        return (AppConfig::default(), warnings);
    }

    let content = match std::fs::read_to_string(config_path) {
        Ok(c) => c,
        Err(e) => {
            let msg = format!(
                "Could not read config file '{}': {e}. Using defaults.",
                config_path.display()
            );
            tracing::warn!("{}", msg);
            warnings.push(msg);
            return (AppConfig::default(), warnings);
        }
    };

    let raw: RawConfig = match toml::from_str(&content) {
        Ok(r) => r,
        Err(e) => {
            let msg = format!(
                "Failed to parse config file '{}': {e}. Using defaults.",
                config_path.display()
            );
            tracing::warn!("{}", msg);
            warnings.push(msg);
            return (AppConfig::default(), warnings);
        }
    };

    tracing::info!(path = %config_path.display(), "Loaded config.toml");
    let config = validate(raw, &mut warnings);

    if !warnings.is_empty() {
        tracing::warn!(
            count = warnings.len(),
            "Config validation produced warnings"
        );
    }
    (config, warnings)
}

/// Validate each field against named constants, accumulating all problems.
pub fn validate(raw: RawConfig, warnings: &mut Vec<String>) -> AppConfig {
    let mut config = AppConfig::default();

    // -- Tail: chunk_size_bytes --
    if let Some(size) = raw.tail.chunk_size_bytes {
        if (constants::MIN_CHUNK_SIZE..=constants::MAX_CHUNK_SIZE).contains(&size) {
            config.tail.chunk_size = size;
        } else {
            warnings.push(format!(
                "[tail] chunk_size_bytes = {size} is out of range ({}-{}). Using default ({}).",
                constants::MIN_CHUNK_SIZE,
                constants::MAX_CHUNK_SIZE,
                constants::DEFAULT_CHUNK_SIZE,
            ));
        }
    }

    // -- Tail: small_file_chunks --
    if let Some(chunks) = raw.tail.small_file_chunks {
        if chunks <= constants::MAX_SMALL_FILE_CHUNKS {
            config.tail.small_file_chunks = chunks;
        } else {
            warnings.push(format!(
                "[tail] small_file_chunks = {chunks} is out of range (0-{}). Using default ({}).",
                constants::MAX_SMALL_FILE_CHUNKS,
                constants::DEFAULT_SMALL_FILE_CHUNKS,
            ));
        }
    }

    // -- Tail: max_source_bytes --
    if let Some(max) = raw.tail.max_source_bytes {
        if max >= constants::MIN_MAX_SOURCE_BYTES {
            config.tail.max_source_bytes = max;
        } else {
            warnings.push(format!(
                "[tail] max_source_bytes = {max} is below the minimum of {}. Using default ({}).",
                constants::MIN_MAX_SOURCE_BYTES,
                constants::DEFAULT_MAX_SOURCE_BYTES,
            ));
        }
    }

    // -- Tail: max_lines --
    if let Some(max) = raw.tail.max_lines {
        if (1..=constants::ABSOLUTE_MAX_LINES).contains(&max) {
            config.tail.max_lines = max;
        } else {
            warnings.push(format!(
                "[tail] max_lines = {max} is out of range (1-{}). Using default ({}).",
                constants::ABSOLUTE_MAX_LINES,
                constants::DEFAULT_MAX_LINES,
            ));
        }
    }

    // -- Tail: default_lines (checked after max_lines) --
    if let Some(lines) = raw.tail.default_lines {
        if (1..=config.tail.max_lines).contains(&lines) {
            config.default_lines = lines;
        } else {
            warnings.push(format!(
                "[tail] default_lines = {lines} is out of range (1-{}). Using default ({}).",
                config.tail.max_lines,
                constants::DEFAULT_LINES.min(config.tail.max_lines),
            ));
        }
    }
    config.default_lines = config.default_lines.min(config.tail.max_lines);

    // -- Node --
    if let Some(bind) = raw.node.bind {
        match bind.parse::<SocketAddr>() {
            Ok(_) => config.node_bind = bind,
            Err(e) => warnings.push(format!(
                "[node] bind = \"{bind}\" is not a socket address ({e}). Using default ({}).",
                constants::DEFAULT_NODE_BIND,
            )),
        }
    }
    if let Some(dir) = raw.node.log_dir.filter(|d| !d.is_empty()) {
        config.log_dir = PathBuf::from(dir);
    }

    // -- Primary --
    if let Some(bind) = raw.primary.bind {
        match bind.parse::<SocketAddr>() {
            Ok(_) => config.primary_bind = bind,
            Err(e) => warnings.push(format!(
                "[primary] bind = \"{bind}\" is not a socket address ({e}). Using default ({}).",
                constants::DEFAULT_PRIMARY_BIND,
            )),
        }
    }

    let timeout_range = constants::MIN_PEER_TIMEOUT_SECS..=constants::MAX_PEER_TIMEOUT_SECS;
    if let Some(secs) = raw.primary.peer_timeout_secs {
        if timeout_range.contains(&secs) {
            config.peer_timeout = Duration::from_secs(secs);
        } else {
            warnings.push(format!(
                "[primary] peer_timeout_secs = {secs} is out of range ({}-{}). Using default ({}).",
                constants::MIN_PEER_TIMEOUT_SECS,
                constants::MAX_PEER_TIMEOUT_SECS,
                constants::DEFAULT_PEER_TIMEOUT_SECS,
            ));
        }
    }
    if let Some(secs) = raw.primary.health_timeout_secs {
        if timeout_range.contains(&secs) {
            config.health_timeout = Duration::from_secs(secs);
        } else {
            warnings.push(format!(
                "[primary] health_timeout_secs = {secs} is out of range ({}-{}). Using default ({}).",
                constants::MIN_PEER_TIMEOUT_SECS,
                constants::MAX_PEER_TIMEOUT_SECS,
                constants::DEFAULT_HEALTH_TIMEOUT_SECS,
            ));
        }
    }

    if let Some(max) = raw.primary.max_lines {
        if (1..=config.tail.max_lines).contains(&max) {
            config.aggregate_max_lines = max;
        } else {
            warnings.push(format!(
                "[primary] max_lines = {max} is out of range (1-{}). Using default ({}).",
                config.tail.max_lines,
                constants::DEFAULT_AGGREGATE_MAX_LINES,
            ));
        }
    }
    config.aggregate_max_lines = config.aggregate_max_lines.min(config.tail.max_lines);

    if let Some(lines) = raw.primary.default_lines {
        if (1..=config.aggregate_max_lines).contains(&lines) {
            config.aggregate_default_lines = lines;
        } else {
            warnings.push(format!(
                "[primary] default_lines = {lines} is out of range (1-{}). Using default ({}).",
                config.aggregate_max_lines,
                constants::DEFAULT_AGGREGATE_LINES,
            ));
        }
    }
    config.aggregate_default_lines = config
        .aggregate_default_lines
        .min(config.aggregate_max_lines);

    if let Some(files) = raw.primary.search_files_per_peer {
        if (1..=constants::MAX_SEARCH_FILES_PER_PEER).contains(&files) {
            config.search_files_per_peer = files;
        } else {
            warnings.push(format!(
                "[primary] search_files_per_peer = {files} is out of range (1-{}). Using default ({}).",
                constants::MAX_SEARCH_FILES_PER_PEER,
                constants::DEFAULT_SEARCH_FILES_PER_PEER,
            ));
        }
    }

    // -- Peers --
    for entry in raw.peers {
        if !is_http_url(&entry.url) {
            warnings.push(format!(
                "[[peers]] '{}': url \"{}\" must start with http:// or https://. Skipped.",
                entry.name, entry.url
            ));
            continue;
        }
        if entry.name.is_empty() || config.peers.iter().any(|p| p.name == entry.name) {
            warnings.push(format!(
                "[[peers]] name \"{}\" is empty or duplicated. Skipped.",
                entry.name
            ));
            continue;
        }
        config.peers.push(PeerDescriptor {
            name: entry.name,
            url: entry.url,
            description: entry.description,
        });
    }

    // -- Logging: level --
    if let Some(ref level) = raw.logging.level {
        let valid = ["error", "warn", "info", "debug", "trace"];
        if valid.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level.clone());
        } else {
            warnings.push(format!(
                "[logging] level = \"{level}\" is not recognised. \
                 Valid values: error, warn, info, debug, trace. Using default (info).",
            ));
        }
    }

    config
}

/// Whether `url` uses an http or https scheme.
pub fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
