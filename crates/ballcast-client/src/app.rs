use std::future::Future;

use anyhow::{Context, Result};
use ballcast_core::{report, DetectionError, SessionConfig};
use ballcast_detect::{DetectionWorker, FrameDetector};
use ballcast_transport::{PeerConnection, PeerEvent, Transport, COORDS_LABEL};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Frames between periodic stats lines.
const STATS_EVERY: u64 = 300;

/// Receiver entry point: connect, accept the sender's hello, then run the
/// receive → detect → report loop until the sender says bye or goes away.
pub async fn run(
    host: &str,
    port: u16,
    session: &SessionConfig,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let mut conn = PeerConnection::connect(host, port)
        .await
        .with_context(|| format!("connecting to sender at {host}:{port}"))?;
    let info = conn.answer().await.context("session handshake")?;
    info!(
        "Session {}: expecting {} frames at {} fps",
        info.session_id, info.bounds, info.target_fps
    );

    let (mut writer, events) = conn.start_recv_loop();
    let mut worker = DetectionWorker::new(session.detect_timeout());

    let summary = run_receiver(&mut writer, events, &mut worker, shutdown).await;
    info!(
        "Receiver finished ({:?}). received={} reported={} skipped={} workers={}",
        summary.end, summary.frames_received, summary.reports_sent, summary.skipped, worker.spawned()
    );
    Ok(())
}

// ── Receive loop ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverEnd {
    Shutdown,
    PeerBye,
    PeerGone,
    TransportFailed(String),
}

#[derive(Debug)]
pub struct ReceiverSummary {
    pub end: ReceiverEnd,
    pub frames_received: u64,
    pub reports_sent: u64,
    pub skipped: u64,
}

/// One detection per frame, in arrival order. A frame whose detection fails
/// (no ball, timeout, worker crash) simply gets no report. A failed report
/// send ends the loop.
pub async fn run_receiver<T, D>(
    transport: &mut T,
    mut events: mpsc::Receiver<PeerEvent>,
    worker: &mut DetectionWorker<D>,
    shutdown: impl Future<Output = ()>,
) -> ReceiverSummary
where
    T: Transport,
    D: FrameDetector,
{
    tokio::pin!(shutdown);

    let mut frames_received: u64 = 0;
    let mut reports_sent: u64 = 0;
    let mut skipped: u64 = 0;

    let end = loop {
        tokio::select! {
            _ = &mut shutdown => {
                say_bye(transport).await;
                break ReceiverEnd::Shutdown;
            }

            event = events.recv() => match event {
                Some(PeerEvent::Frame { frame_seq, frame }) => {
                    frames_received += 1;
                    if frames_received <= 3 {
                        debug!(
                            "Frame #{} seq={} {}×{} pts={}ms",
                            frames_received, frame_seq, frame.width, frame.height, frame.timestamp_ms
                        );
                    }
                    // A stalled worker must not hold up Ctrl-C; dropping the
                    // detect future detaches its thread.
                    let detected = tokio::select! {
                        _ = &mut shutdown => {
                            say_bye(transport).await;
                            break ReceiverEnd::Shutdown;
                        }
                        result = worker.detect(frame) => result,
                    };
                    match detected {
                        Ok(pos) => {
                            if let Err(e) = transport.send_data(COORDS_LABEL, &report::encode(pos)).await {
                                warn!("Report send failed at seq={}: {}", frame_seq, e);
                                break ReceiverEnd::TransportFailed(e.to_string());
                            }
                            reports_sent += 1;
                        }
                        Err(DetectionError::Undefined) => {
                            skipped += 1;
                            debug!("No ball in frame seq={}, skipping report", frame_seq);
                        }
                        Err(e) => {
                            skipped += 1;
                            if skipped <= 10 || skipped % 100 == 0 {
                                warn!("Detection failed for seq={}: {} (skipped: {})", frame_seq, e, skipped);
                            }
                        }
                    }
                    if frames_received % STATS_EVERY == 0 {
                        info!(
                            "Stats: received={} reported={} skipped={}",
                            frames_received, reports_sent, skipped
                        );
                    }
                }
                Some(PeerEvent::Data { label, payload }) => {
                    info!("Message from channel {}: {}", label, payload);
                }
                Some(PeerEvent::Bye) => {
                    info!("Sender said bye, exiting");
                    break ReceiverEnd::PeerBye;
                }
                None => {
                    warn!("Sender disconnected unexpectedly");
                    break ReceiverEnd::PeerGone;
                }
            },
        }
    };

    ReceiverSummary { end, frames_received, reports_sent, skipped }
}

async fn say_bye<T: Transport>(transport: &mut T) {
    if let Err(e) = transport.close().await {
        debug!("Bye on shutdown failed: {}", e);
    }
}
