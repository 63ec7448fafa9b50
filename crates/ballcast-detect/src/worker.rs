//! Per-frame detection worker.
//!
//! Every call spawns one named OS thread, hands it the frame, and awaits the
//! result on a oneshot channel under a deadline. There is no pool: each
//! frame pays the thread start-up cost.
//!
//! ```text
//! recv loop ──frame──► [ballcast-detect-N thread] ──oneshot──► recv loop
//!                            (joined once the result is read)
//! ```

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use ballcast_core::{DetectionError, Frame, Position};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::{CentroidDetector, FrameDetector};

pub struct DetectionWorker<D: FrameDetector = CentroidDetector> {
    detector: Arc<D>,
    timeout: Duration,
    spawned: u64,
    timed_out: u64,
}

impl DetectionWorker<CentroidDetector> {
    pub fn new(timeout: Duration) -> Self {
        Self::with_detector(CentroidDetector::new(), timeout)
    }
}

impl<D: FrameDetector> DetectionWorker<D> {
    pub fn with_detector(detector: D, timeout: Duration) -> Self {
        Self {
            detector: Arc::new(detector),
            timeout,
            spawned: 0,
            timed_out: 0,
        }
    }

    /// Runs detection for one frame on a fresh thread.
    ///
    /// Resolves once the worker has produced its result, or with
    /// [`DetectionError::TimedOut`] when the deadline passes first. A timed
    /// out thread is detached; its late result is discarded.
    pub async fn detect(&mut self, frame: Frame) -> Result<Position, DetectionError> {
        let seq = self.spawned;
        self.spawned += 1;

        let (result_tx, result_rx) = oneshot::channel();
        let detector = Arc::clone(&self.detector);
        let handle = std::thread::Builder::new()
            .name(format!("ballcast-detect-{seq}"))
            .spawn(move || {
                let result = detector.detect(&frame);
                // Receiver is gone only after a timeout.
                let _ = result_tx.send(result);
            })
            .map_err(|e| DetectionError::WorkerFailed {
                reason: format!("spawn: {e}"),
            })?;

        match tokio::time::timeout(self.timeout, result_rx).await {
            Ok(Ok(result)) => {
                // Sending is the thread's last action, so this join is immediate.
                join(handle, seq);
                result
            }
            Ok(Err(_)) => {
                // Sender dropped without a value: the worker panicked.
                let reason = match handle.join() {
                    Err(panic) => panic_message(&panic),
                    Ok(()) => "worker exited without a result".to_owned(),
                };
                Err(DetectionError::WorkerFailed { reason })
            }
            Err(_) => {
                self.timed_out += 1;
                let ms = self.timeout.as_millis() as u64;
                if self.timed_out <= 10 || self.timed_out % 100 == 0 {
                    warn!("Detection worker #{} exceeded {}ms (timeouts: {})", seq, ms, self.timed_out);
                }
                Err(DetectionError::TimedOut { ms })
            }
        }
    }

    /// Workers spawned so far.
    pub fn spawned(&self) -> u64 {
        self.spawned
    }

    pub fn timed_out(&self) -> u64 {
        self.timed_out
    }
}

fn join(handle: JoinHandle<()>, seq: u64) {
    if handle.join().is_err() {
        debug!("Detection worker #{} panicked after sending its result", seq);
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballcast_core::{Bounds, Color, PixelFormat, Velocity};
    use ballcast_sim::{render_state, BallState};

    struct Stalled(Duration);

    impl FrameDetector for Stalled {
        fn detect(&self, _frame: &Frame) -> Result<Position, DetectionError> {
            std::thread::sleep(self.0);
            Ok(Position::default())
        }
    }

    struct Panicking;

    impl FrameDetector for Panicking {
        fn detect(&self, _frame: &Frame) -> Result<Position, DetectionError> {
            panic!("boom");
        }
    }

    fn frame_with_ball(center: Position) -> Frame {
        render_state(&BallState {
            position: center,
            velocity: Velocity::default(),
            radius: 20,
            color: Color::bgr(255, 255, 255),
            bounds: Bounds::new(200, 200),
        })
    }

    #[tokio::test]
    async fn returns_centroid_from_worker_thread() {
        let mut worker = DetectionWorker::new(Duration::from_secs(5));
        let pos = worker.detect(frame_with_ball(Position::new(120, 80))).await;
        assert_eq!(pos, Ok(Position::new(120, 80)));
        assert_eq!(worker.spawned(), 1);
    }

    #[tokio::test]
    async fn one_worker_per_frame() {
        let mut worker = DetectionWorker::new(Duration::from_secs(5));
        for i in 0..5 {
            let center = Position::new(40 + i * 20, 100);
            assert_eq!(worker.detect(frame_with_ball(center)).await, Ok(center));
        }
        assert_eq!(worker.spawned(), 5);
        assert_eq!(worker.timed_out(), 0);
    }

    #[tokio::test]
    async fn empty_frame_reports_undefined() {
        let mut worker = DetectionWorker::new(Duration::from_secs(5));
        let frame = Frame::new(vec![0u8; 30 * 30 * 3], 30, 30, PixelFormat::Bgr24);
        assert_eq!(worker.detect(frame).await, Err(DetectionError::Undefined));
    }

    #[tokio::test]
    async fn stalled_worker_times_out() {
        let mut worker = DetectionWorker::with_detector(Stalled(Duration::from_millis(500)), Duration::from_millis(20));
        let result = worker.detect(frame_with_ball(Position::new(50, 50))).await;
        assert_eq!(result, Err(DetectionError::TimedOut { ms: 20 }));
        assert_eq!(worker.timed_out(), 1);
    }

    #[tokio::test]
    async fn panicking_worker_is_a_detection_failure() {
        let mut worker = DetectionWorker::with_detector(Panicking, Duration::from_secs(5));
        match worker.detect(frame_with_ball(Position::new(50, 50))).await {
            Err(DetectionError::WorkerFailed { reason }) => assert!(reason.contains("boom"), "{reason}"),
            other => panic!("expected WorkerFailed, got {other:?}"),
        }
    }
}
