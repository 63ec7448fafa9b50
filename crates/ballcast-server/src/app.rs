use anyhow::{Context, Result};
use ballcast_core::{compare, report, BallConfig, BallcastConfig, ErrorStats, SessionConfig};
use ballcast_sim::BallSimulator;
use ballcast_transport::{PeerEvent, PeerListener, Transport};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Frames between periodic stats lines.
const STATS_EVERY: u64 = 300;

/// Main sender loop.
///
/// # Flow
/// 1. Bind the listening socket
/// 2. Accept one receiver and run the hello exchange
/// 3. Tick → render → send, comparing reports as they arrive
/// 4. On bye / disconnect, go back to 2 with a fresh simulator
pub async fn run(
    host: &str,
    port: u16,
    config: BallcastConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let listener = PeerListener::bind(host, port)
        .await
        .with_context(|| format!("binding {host}:{port}"))?;

    let mut session_count: u32 = 0;

    'sessions: loop {
        info!("Waiting for receiver to connect...");
        let mut conn = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    continue 'sessions;
                }
            },
            _ = shutdown_requested(shutdown.clone()) => break 'sessions,
        };

        let session = match conn.offer(config.ball.bounds, config.session.target_fps).await {
            Ok(s) => s,
            Err(e) => {
                warn!("Handshake with {} failed: {}, waiting for next receiver", conn.peer(), e);
                continue 'sessions;
            }
        };
        session_count += 1;
        info!("Session #{} ({}) streaming to {}", session_count, session.session_id, conn.peer());

        let (mut writer, events) = conn.start_recv_loop();
        let summary = run_session(
            &config.ball,
            &config.session,
            &mut writer,
            events,
            shutdown_requested(shutdown.clone()),
        )
        .await?;

        info!(
            "Session #{} complete ({:?}). frames={} reports={} malformed={} mean_error={}",
            session_count,
            summary.end,
            summary.frames_sent,
            summary.errors.count(),
            summary.malformed_reports,
            format_mean(&summary.errors),
        );

        if summary.end == SessionEnd::Shutdown {
            break 'sessions;
        }
    }

    info!("Sender loop exited after {} session(s).", session_count);
    Ok(())
}

// ── Per-session loop ──────────────────────────────────────────────────────────

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    Shutdown,
    PeerBye,
    PeerGone,
    TransportFailed(String),
}

#[derive(Debug)]
pub struct SessionSummary {
    pub end: SessionEnd,
    pub frames_sent: u64,
    pub malformed_reports: u64,
    pub errors: ErrorStats,
}

/// Runs one streaming session on an already negotiated link.
///
/// This task owns the simulator; reports are compared against its current
/// position. Recoverable problems (malformed reports) skip the message;
/// transport errors end the session. Only simulator setup errors are fatal.
pub async fn run_session<T: Transport>(
    ball: &BallConfig,
    session: &SessionConfig,
    transport: &mut T,
    mut events: mpsc::Receiver<PeerEvent>,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<SessionSummary> {
    let mut sim = BallSimulator::new(ball).context("building simulator")?;
    let mut ticker = tokio::time::interval(session.frame_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut frames_sent: u64 = 0;
    let mut malformed_reports: u64 = 0;
    let mut errors = ErrorStats::new();

    let end = loop {
        tokio::select! {
            _ = &mut shutdown => {
                if let Err(e) = transport.close().await {
                    debug!("Bye on shutdown failed: {}", e);
                }
                break SessionEnd::Shutdown;
            }

            _ = ticker.tick() => {
                let tick = sim.advance();
                match transport.send_frame(&tick.frame).await {
                    Ok(seq) => {
                        frames_sent += 1;
                        if frames_sent <= 3 {
                            debug!("Frame #{} seq={} ball=({})", tick.index, seq, tick.position);
                        }
                        if frames_sent % STATS_EVERY == 0 {
                            info!(
                                "Stats: frames={} reports={} malformed={} mean_error={} max_error={:.2}",
                                frames_sent, errors.count(), malformed_reports,
                                format_mean(&errors), errors.max()
                            );
                        }
                    }
                    Err(e) => {
                        warn!("send_frame failed at tick {}: {}", tick.index, e);
                        break SessionEnd::TransportFailed(e.to_string());
                    }
                }
            }

            event = events.recv() => match event {
                Some(PeerEvent::Data { label, payload }) => {
                    if report::is_report(&payload) {
                        match report::parse(&payload) {
                            Ok(client) => {
                                let truth = sim.position();
                                errors.record(compare(truth.x, truth.y, client.x, client.y));
                            }
                            Err(e) => {
                                malformed_reports += 1;
                                if malformed_reports <= 10 || malformed_reports % 100 == 0 {
                                    warn!("Skipping malformed report #{}: {}", malformed_reports, e);
                                }
                            }
                        }
                    } else {
                        info!("Message from channel {}: {}", label, payload);
                    }
                }
                Some(PeerEvent::Bye) => break SessionEnd::PeerBye,
                Some(PeerEvent::Frame { frame_seq, .. }) => {
                    debug!("Ignoring unexpected frame seq={} from receiver", frame_seq);
                }
                None => {
                    warn!("Receiver disconnected unexpectedly");
                    break SessionEnd::PeerGone;
                }
            },
        }
    };

    Ok(SessionSummary { end, frames_sent, malformed_reports, errors })
}

/// Resolves once shutdown has been requested. A dropped sender never
/// resolves it.
async fn shutdown_requested(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn format_mean(stats: &ErrorStats) -> String {
    stats.mean().map_or_else(|| "n/a".to_owned(), |m| format!("{m:.2}"))
}
