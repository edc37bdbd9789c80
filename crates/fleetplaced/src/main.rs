//! fleetplaced — the Fleetplace daemon.
//!
//! Single binary that assembles the placement service:
//! - Task store (redb, on disk or in memory)
//! - Static fleet sampler and image locality seeded from config
//! - HTTP host scorer
//! - REST API
//!
//! # Usage
//!
//! ```text
//! fleetplaced run --config /etc/fleetplace/fleetplace.toml --data-dir /var/lib/fleetplace
//! ```

mod daemon;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fleetplace_core::SchedulerConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fleetplaced", about = "Fleetplace placement daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the placement service.
    Run {
        /// Path to fleetplace.toml. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// API listen address, overrides `[api] listen`.
        #[arg(long)]
        listen: Option<String>,

        /// Data directory for the task store, overrides `[store] data_dir`.
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,fleetplaced=debug,fleetplace=debug"));

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Run {
            config,
            listen,
            data_dir,
        } => {
            let mut config = match config {
                Some(path) => SchedulerConfig::from_file(&path)?,
                None => SchedulerConfig::default(),
            };
            if let Some(listen) = listen {
                config.api.listen = listen;
            }
            if let Some(data_dir) = data_dir {
                config.store.data_dir = Some(data_dir);
            }
            daemon::run(config).await
        }
    }
}
