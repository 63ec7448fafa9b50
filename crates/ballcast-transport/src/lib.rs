//! ballcast-transport
//!
//! Minimal peer link between the ball sender and the detecting receiver:
//! one TCP connection per session carrying raw BCST video packets one way
//! and JSON data-channel messages both ways.
//!
//! ```text
//! ballcast-server (sender)                ballcast-client (receiver)
//! ────────────────────────                ──────────────────────────
//! BallSimulator → PeerWriter ──video────► PeerEvent::Frame → DetectionWorker
//! comparator ◄── PeerEvent::Data ◄─data── PeerWriter ◄── "coords:x,y"
//! ```
//!
//! Session negotiation is a single hello/hello_ack exchange; there is no ICE,
//! encryption or congestion control.

pub mod peer;
pub mod wire;

use async_trait::async_trait;
use ballcast_core::{Frame, TransportError};

pub use peer::{PeerConnection, PeerEvent, PeerListener, PeerWriter, SessionInfo, HANDSHAKE_TIMEOUT};

/// Default signaling endpoint, shared by both binaries.
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 1234;

/// Data-channel label for position reports.
pub const COORDS_LABEL: &str = "coords";

// MARK: - Transport trait

/// Outgoing half of a peer link.
///
/// The session loops only talk to this trait, so they can run against an
/// in-memory double in tests.
#[async_trait]
pub trait Transport: Send {
    /// Sends one raw frame. Returns the frame sequence number assigned.
    async fn send_frame(&mut self, frame: &Frame) -> Result<u32, TransportError>;

    /// Sends a text message on the data channel named `label`.
    async fn send_data(&mut self, label: &str, payload: &str) -> Result<(), TransportError>;

    /// Says bye and closes the write side. Idempotent.
    async fn close(&mut self) -> Result<(), TransportError>;
}
