// logtail - main.rs
//
// Application entry point. Handles:
// 1. CLI argument parsing
// 2. Configuration loading (config.toml + CLI overrides)
// 3. Logging initialisation (debug mode support)
// 4. Dispatch to the node server, the primary server, or a one-shot tail

use clap::{Parser, Subcommand};
use logtail::app::aggregate::Aggregator;
use logtail::app::node_api::{self, NodeState};
use logtail::app::primary_api::{self, PrimaryState};
use logtail::app::registry::PeerRegistry;
use logtail::app::server;
use logtail::app::transport::HttpTransport;
use logtail::core::model::PeerDescriptor;
use logtail::core::tail::TailReader;
use logtail::platform::config::{self, AppConfig, PlatformPaths};
use logtail::util::error::{ConfigError, LogTailError, Result};
use logtail::util::{constants, logging};
use std::future::Future;
use std::io::{self, BufWriter, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Efficient tail retrieval for large log files, served per host and
/// aggregated across hosts.
#[derive(Parser, Debug)]
#[command(name = "logtail", version, about)]
struct Cli {
    /// Path to config.toml (defaults to the platform config directory).
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug", global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the log files of this host over HTTP.
    Node {
        /// Address to listen on, e.g. 0.0.0.0:8000.
        #[arg(short = 'b', long = "bind")]
        bind: Option<String>,

        /// Directory whose files are served.
        #[arg(short = 'l', long = "log-dir")]
        log_dir: Option<PathBuf>,
    },

    /// Aggregate tails across registered nodes.
    Primary {
        /// Address to listen on, e.g. 0.0.0.0:8001.
        #[arg(short = 'b', long = "bind")]
        bind: Option<String>,

        /// Pre-register a node as NAME=URL. May be repeated.
        #[arg(long = "peer", value_parser = parse_peer)]
        peers: Vec<PeerDescriptor>,
    },

    /// Print the last lines of a local file.
    Tail {
        /// File to read.
        file: PathBuf,

        /// Number of lines to print.
        #[arg(short = 'n', long = "lines")]
        lines: Option<usize>,

        /// Only count lines containing this keyword (case-insensitive).
        #[arg(short = 'k', long = "keyword")]
        keyword: Option<String>,

        /// Print lines newest-first as they are found instead of
        /// oldest-first at the end.
        #[arg(long = "stream")]
        stream: bool,
    },
}

fn parse_peer(value: &str) -> std::result::Result<PeerDescriptor, String> {
    let (name, url) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=URL, got '{value}'"))?;
    let (name, url) = (name.trim(), url.trim());
    if name.is_empty() {
        return Err("peer name must not be empty".to_string());
    }
    if !config::is_http_url(url) {
        return Err(format!("peer URL '{url}' must start with http:// or https://"));
    }
    Ok(PeerDescriptor::new(name, url))
}

fn main() {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PlatformPaths::resolve().config_file());
    let (app_config, warnings) = config::load_config(&config_path);

    logging::init(cli.debug, app_config.log_level.as_deref());
    tracing::info!(
        version = constants::APP_VERSION,
        debug = cli.debug,
        config = %config_path.display(),
        "logtail starting"
    );
    for warning in &warnings {
        tracing::warn!(warning = %warning, "Configuration warning");
    }

    let result = match cli.command {
        Command::Tail {
            file,
            lines,
            keyword,
            stream,
        } => run_tail(&app_config, &file, lines, keyword.as_deref(), stream),
        Command::Node { bind, log_dir } => block_on(run_node(app_config, bind, log_dir)),
        Command::Primary { bind, peers } => block_on(run_primary(app_config, bind, peers)),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "logtail exited with an error");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn block_on<F: Future<Output = Result<()>>>(fut: F) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(LogTailError::Runtime)?;
    runtime.block_on(fut)
}

fn parse_bind(value: &str) -> Result<SocketAddr> {
    value.parse().map_err(|source| {
        ConfigError::InvalidBindAddress {
            value: value.to_string(),
            source,
        }
        .into()
    })
}

async fn run_node(
    app_config: AppConfig,
    bind: Option<String>,
    log_dir: Option<PathBuf>,
) -> Result<()> {
    let addr = parse_bind(bind.as_deref().unwrap_or(&app_config.node_bind))?;
    let log_dir = log_dir.unwrap_or(app_config.log_dir);
    if !log_dir.is_dir() {
        tracing::warn!(
            dir = %log_dir.display(),
            "Log directory does not exist yet; requests will return 404 until it does"
        );
    }
    tracing::info!(dir = %log_dir.display(), "Serving log directory");

    let state = Arc::new(NodeState {
        reader: TailReader::new(app_config.tail),
        log_dir,
        default_lines: app_config.default_lines,
    });
    server::serve(addr, node_api::router(state), constants::NODE_SERVICE_NAME)
        .await
        .map_err(|source| LogTailError::Server { addr, source })
}

async fn run_primary(
    app_config: AppConfig,
    bind: Option<String>,
    cli_peers: Vec<PeerDescriptor>,
) -> Result<()> {
    let addr = parse_bind(bind.as_deref().unwrap_or(&app_config.primary_bind))?;

    let mut peers = app_config.peers;
    for peer in cli_peers {
        if peers.iter().any(|p| p.name == peer.name) {
            tracing::warn!(peer = %peer.name, "Ignoring --peer that repeats a configured name");
            continue;
        }
        peers.push(peer);
    }
    if peers.len() > constants::MAX_PEERS {
        tracing::warn!(
            peers = peers.len(),
            max = constants::MAX_PEERS,
            "Too many peers configured; keeping the first ones"
        );
        peers.truncate(constants::MAX_PEERS);
    }
    tracing::info!(peers = peers.len(), "Peers pre-registered");

    let transport = HttpTransport::new(app_config.peer_timeout)?;
    let state = Arc::new(PrimaryState {
        registry: PeerRegistry::new(peers, constants::MAX_PEERS),
        aggregator: Aggregator::new(Arc::new(transport), app_config.peer_timeout),
        health_timeout: app_config.health_timeout,
        max_lines: app_config.aggregate_max_lines,
        default_lines: app_config.aggregate_default_lines,
        search_files_per_peer: app_config.search_files_per_peer,
    });
    server::serve(
        addr,
        primary_api::router(state),
        constants::PRIMARY_SERVICE_NAME,
    )
    .await
    .map_err(|source| LogTailError::Server { addr, source })
}

fn run_tail(
    app_config: &AppConfig,
    file: &Path,
    lines: Option<usize>,
    keyword: Option<&str>,
    stream: bool,
) -> Result<()> {
    let reader = TailReader::new(app_config.tail.clone());
    let line_limit = lines.unwrap_or(app_config.default_lines);
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let written = if stream {
        let mut lines = reader.stream(file, line_limit, keyword)?;
        lines.try_for_each(|line| {
            let line = line?;
            writeln!(out, "{line}")?;
            out.flush()
        })
    } else {
        reader
            .tail(file, line_limit, keyword)?
            .iter()
            .try_for_each(|line| writeln!(out, "{line}"))
            .and_then(|()| out.flush())
    };

    match written {
        Ok(()) => Ok(()),
        // The reader of our output went away (e.g. `| head`); not an error.
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        Err(source) => Err(LogTailError::Io {
            path: file.to_path_buf(),
            operation: "tail",
            source,
        }),
    }
}
