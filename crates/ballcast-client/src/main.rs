use std::path::PathBuf;

use anyhow::{Context, Result};
use ballcast_core::BallcastConfig;
use ballcast_transport::{DEFAULT_HOST, DEFAULT_PORT};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod app;

#[derive(Debug, Parser)]
#[command(name = "ballcast-client", about = "Ball Position Detector - Client", version)]
struct Args {
    /// Sender address.
    #[clap(long, default_value = DEFAULT_HOST)]
    signaling_host: String,

    #[clap(long, default_value_t = DEFAULT_PORT)]
    signaling_port: u16,

    /// JSON config file; only the `session` section is used here.
    #[clap(long)]
    config: Option<PathBuf>,

    /// Overrides `session.detect_timeout_ms`.
    #[clap(long, env = "BALLCAST_DETECT_TIMEOUT_MS")]
    detect_timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_names(true)
        .init();

    let args = Args::parse();
    info!("Ballcast Client v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => BallcastConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => BallcastConfig::default(),
    };
    if let Some(ms) = args.detect_timeout_ms {
        config.session.detect_timeout_ms = ms;
    }
    config.validate().context("invalid configuration")?;

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
        } else {
            std::future::pending::<()>().await;
        }
    };

    match app::run(&args.signaling_host, args.signaling_port, &config.session, shutdown).await {
        Ok(()) => {
            info!("Ballcast Client exited cleanly.");
            Ok(())
        }
        Err(e) => {
            error!("Fatal error: {:#}", e);
            Err(e)
        }
    }
}
