//! Ballcast sender.
//!
//! Simulates the bouncing ball, streams one raw frame per tick to the
//! connected receiver, and compares every `coords:x,y` report that comes
//! back against the simulator's own ball position.
//!
//! ```text
//! BallSimulator ──frame──► PeerWriter ──TCP──► ballcast-client
//!      │                                           │
//!      └── ground truth ──► comparator ◄── coords ─┘
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use ballcast_core::BallcastConfig;
use ballcast_transport::{DEFAULT_HOST, DEFAULT_PORT};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app;

#[derive(Debug, Parser)]
#[command(name = "ballcast-server", about = "Ball Position Detector - Server", version)]
struct Args {
    /// Address to listen on for the receiver.
    #[clap(long, default_value = DEFAULT_HOST)]
    signaling_host: String,

    #[clap(long, default_value_t = DEFAULT_PORT)]
    signaling_port: u16,

    /// JSON config file (`ball` and `session` sections, all fields optional).
    #[clap(long)]
    config: Option<PathBuf>,

    /// Overrides `session.target_fps`.
    #[clap(long, env = "BALLCAST_FPS")]
    fps: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG=debug for per-packet detail
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let args = Args::parse();
    info!("Ballcast Server v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => BallcastConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => BallcastConfig::default(),
    };
    if let Some(fps) = args.fps {
        config.session.target_fps = fps;
    }
    config.validate().context("invalid configuration")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                warn!("Ctrl-C handler unavailable: {e}");
                // Keep the sender alive so receivers never see a spurious close.
                std::future::pending::<()>().await;
            }
        }
    });

    match app::run(&args.signaling_host, args.signaling_port, config, shutdown_rx).await {
        Ok(()) => {
            info!("Ballcast Server exited cleanly.");
            Ok(())
        }
        Err(e) => {
            error!("Fatal error: {:#}", e);
            Err(e)
        }
    }
}
