//! Process configuration: `clap` flags plus an optional TOML file, flags
//! taking precedence. Config-file parsing is a daemon concern, not a
//! core-library one, so it lives entirely in this binary.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

/// Ignition Engine: a Wasm function host daemon.
#[derive(Debug, Clone, Parser)]
#[command(name = "ignition-engine", version, about)]
pub struct Cli {
    /// Path to the control-plane Unix domain socket.
    #[arg(long, env = "IGNITION_SOCKET")]
    pub socket: Option<PathBuf>,

    /// Address the public HTTP transport listens on.
    #[arg(long, env = "IGNITION_HTTP_ADDR")]
    pub http_addr: Option<SocketAddr>,

    /// Root directory for the registry's metadata DB and blob storage.
    #[arg(long, env = "IGNITION_REGISTRY_ROOT")]
    pub registry_root: Option<PathBuf>,

    /// `tracing` env-filter directive, e.g. "info" or "ignition=debug".
    #[arg(long, env = "IGNITION_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Optional TOML config file; any flag above overrides the same key
    /// read from this file.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    socket: Option<PathBuf>,
    http_addr: Option<SocketAddr>,
    registry_root: Option<PathBuf>,
    log_level: Option<String>,
}

/// The fully resolved configuration the daemon runs with.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub socket: PathBuf,
    pub http_addr: SocketAddr,
    pub registry_root: PathBuf,
    pub log_level: String,
}

impl EngineConfig {
    /// Resolves flags, environment, and an optional config file into one
    /// `EngineConfig`. Precedence: CLI flag/env > config file > built-in
    /// default.
    pub fn load(cli: Cli) -> anyhow::Result<Self> {
        let file = match &cli.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;
                toml::from_str::<FileConfig>(&raw)
                    .map_err(|e| anyhow::anyhow!("invalid config file {}: {e}", path.display()))?
            }
            None => FileConfig::default(),
        };

        Ok(Self {
            socket: cli.socket.or(file.socket).unwrap_or_else(default_socket_path),
            http_addr: cli
                .http_addr
                .or(file.http_addr)
                .unwrap_or_else(|| "0.0.0.0:8080".parse().expect("valid default address")),
            registry_root: cli
                .registry_root
                .or(file.registry_root)
                .unwrap_or_else(default_registry_root),
            log_level: cli.log_level.or(file.log_level).unwrap_or_else(|| "info".to_string()),
        })
    }
}

/// Default control-plane socket path when neither a flag nor a config file sets one.
fn default_socket_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ignition")
        .join("engine.sock")
}

fn default_registry_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ignition")
}

pub const HUMAN_LOGGING: &str = "HUMAN_LOGGING";

/// `RUST_LOG` wins over `log_level` when set; `HUMAN_LOGGING=false` switches
/// the output format from ANSI-pretty to JSON.
pub fn init_logging(log_level: &str) {
    use tracing_subscriber::filter::EnvFilter;

    let filter = match std::env::var_os("RUST_LOG") {
        Some(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        None => EnvFilter::new(log_level),
    };

    let human_logging = std::env::var_os(HUMAN_LOGGING)
        .map(|s| s.to_string_lossy() != "false")
        .unwrap_or(true);

    let sub = tracing_subscriber::fmt::Subscriber::builder()
        .with_writer(std::io::stderr)
        .with_env_filter(filter);

    if human_logging {
        sub.with_ansi(true).with_level(true).with_line_number(true).init();
    } else {
        sub.with_ansi(false)
            .with_level(true)
            .with_line_number(true)
            .json()
            .init();
    }
}
