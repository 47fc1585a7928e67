//! marketd: storage market daemon.
//!
//! # Startup
//!
//! ```text
//!   marketd pool-run --config marketd.toml
//!        │
//!        ▼
//!   parse config ─▶ CLI overrides ─▶ validate ─▶ logging / metrics
//!        │
//!        ▼
//!   ┌──────────────────────────── run_pool ────────────────────────────┐
//!   │  modules ─▶ registry ─▶ injector ─▶ start hooks                   │
//!   │                                        │                          │
//!   │                                        ▼                          │
//!   │  SIGINT/SIGTERM/Shutdown RPC ─▶ monitor ─▶ stop hooks ─▶ finish    │
//!   │                                                          │        │
//!   │  RPC router (/rpc/v0, /resource) ◀── drains on finish ◀──┘        │
//!   └──────────────────────────────────────────────────────────────────┘
//! ```

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use marketd::config::{parse_config, validate_config, ConfigError, MarketConfig, Overrides};
use marketd::observability::{logging::init_logging, metrics::init_metrics};
use marketd::{run_pool, DaemonError};

#[derive(Parser)]
#[command(name = "marketd", version)]
#[command(about = "Storage market daemon", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the market daemon in pool mode
    PoolRun(PoolRunArgs),
}

#[derive(Args)]
struct PoolRunArgs {
    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Auth service URL
    #[arg(long)]
    auth_url: Option<String>,

    /// Token presented to the auth service
    #[arg(long)]
    auth_token: Option<String>,

    /// RPC listen address
    #[arg(long)]
    listen: Option<String>,

    /// Default payment address
    #[arg(long)]
    payment_address: Option<String>,

    /// Miner address to serve (repeatable)
    #[arg(long = "miner")]
    miners: Vec<String>,
}

impl PoolRunArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            auth_url: self.auth_url.clone(),
            auth_token: self.auth_token.clone(),
            listen: self.listen.clone(),
            payment_address: self.payment_address.clone(),
            miners: self.miners.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::PoolRun(args) => pool_run(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "marketd exited with error");
            eprintln!("marketd: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn pool_run(args: PoolRunArgs) -> Result<(), DaemonError> {
    let mut config = match &args.config {
        Some(path) => parse_config(path)?,
        None => MarketConfig::default(),
    };
    args.overrides().apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "marketd starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    tracing::info!(
        mode = %config.mode,
        listen = %config.api.listen,
        namespace = %config.api.namespace,
        miners = config.miners.len(),
        "Configuration loaded"
    );

    run_pool(config).await
}
