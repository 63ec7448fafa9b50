//! Peer link lifecycle.
//!
//! # Lifecycle
//!
//! ```text
//! sender                                   receiver
//! ──────                                   ────────
//! PeerListener::bind + accept()  ◄──TCP──  PeerConnection::connect(host, port)
//! conn.offer(bounds, fps)  ──hello──────►  conn.answer()
//!                          ◄──hello_ack──
//! conn.start_recv_loop()                   conn.start_recv_loop()
//!   writer.send_frame(..)  ──video──────►    PeerEvent::Frame
//!   PeerEvent::Data        ◄──data───────  writer.send_data("coords", ..)
//!   writer.close()         ──bye────────►    PeerEvent::Bye
//! ```

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ballcast_core::{Bounds, Frame, TransportError};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::wire::{self, MessageType, Packet, SignalingMessage};
use crate::Transport;

/// How long either side waits for the hello exchange.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Frames buffered between the recv loop and its consumer.
const EVENT_QUEUE_DEPTH: usize = 8;

// ── Public types ──────────────────────────────────────────────────────────────

/// Negotiated session parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub session_id: String,
    pub bounds: Bounds,
    pub target_fps: u32,
}

/// Something the remote peer sent after the handshake.
#[derive(Debug, Clone)]
pub enum PeerEvent {
    Frame { frame_seq: u32, frame: Frame },
    Data { label: String, payload: String },
    Bye,
}

// ── PeerListener ──────────────────────────────────────────────────────────────

/// Sender-side listening socket. One accepted connection per session.
pub struct PeerListener {
    listener: TcpListener,
}

impl PeerListener {
    pub async fn bind(host: &str, port: u16) -> Result<Self, TransportError> {
        let listener = TcpListener::bind((host, port)).await?;
        info!("Listening for peers on {}", listener.local_addr()?);
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn accept(&self) -> Result<PeerConnection<TcpStream>, TransportError> {
        let (tcp, addr) = self.listener.accept().await?;
        tcp.set_nodelay(true)?;
        info!("Peer connected from {}", addr);
        Ok(PeerConnection::new(tcp, addr.to_string()))
    }
}

// ── PeerConnection ────────────────────────────────────────────────────────────

/// A connected, not yet split, peer link.
pub struct PeerConnection<S> {
    stream: S,
    peer: String,
}

impl PeerConnection<TcpStream> {
    /// Receiver side: connect to a listening sender.
    pub async fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        let tcp = TcpStream::connect((host, port)).await?;
        tcp.set_nodelay(true)?;
        info!("Connected to sender at {}:{}", host, port);
        Ok(Self::new(tcp, format!("{host}:{port}")))
    }
}

impl<S> PeerConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(stream: S, peer: impl Into<String>) -> Self {
        Self { stream, peer: peer.into() }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Sender side: announce the stream and wait for the receiver to accept.
    pub async fn offer(&mut self, bounds: Bounds, target_fps: u32) -> Result<SessionInfo, TransportError> {
        let session_id = uuid::Uuid::new_v4().to_string();
        wire::write_control(&mut self.stream, &SignalingMessage::hello(&session_id, bounds, target_fps)).await?;
        debug!("Sent hello (session={}) to {}", session_id, self.peer);

        let stream = &mut self.stream;
        let ack = with_deadline(async move {
            loop {
                match wire::read_packet(stream).await? {
                    Packet::Control(msg) if msg.msg_type == MessageType::HelloAck => return Ok(msg),
                    Packet::Control(msg) if msg.msg_type == MessageType::Bye => {
                        return Err(TransportError::ConnectionClosed)
                    }
                    other => debug!("Ignoring {:?} while waiting for hello_ack", packet_kind(&other)),
                }
            }
        })
        .await?;

        if !ack.accepted.unwrap_or(false) {
            warn!("Receiver {} rejected session {}", self.peer, session_id);
            return Err(TransportError::protocol("session rejected by receiver"));
        }
        info!("Session {} accepted by {}", session_id, self.peer);
        Ok(SessionInfo { session_id, bounds, target_fps })
    }

    /// Receiver side: wait for the sender's hello and accept it.
    pub async fn answer(&mut self) -> Result<SessionInfo, TransportError> {
        let stream = &mut self.stream;
        let hello = with_deadline(async move {
            loop {
                match wire::read_packet(stream).await? {
                    Packet::Control(msg) if msg.msg_type == MessageType::Hello => return Ok(msg),
                    Packet::Control(msg) if msg.msg_type == MessageType::Bye => {
                        return Err(TransportError::ConnectionClosed)
                    }
                    other => debug!("Ignoring {:?} while waiting for hello", packet_kind(&other)),
                }
            }
        })
        .await?;

        let session_id = hello.session_id.unwrap_or_default();
        let (bounds, target_fps) = match (hello.bounds, hello.target_fps) {
            (Some(b), Some(fps)) if b.width > 0 && b.height > 0 && fps > 0 => (b, fps),
            _ => {
                wire::write_control(&mut self.stream, &SignalingMessage::hello_ack(&session_id, false)).await?;
                return Err(TransportError::protocol("hello without usable bounds/fps"));
            }
        };

        wire::write_control(&mut self.stream, &SignalingMessage::hello_ack(&session_id, true)).await?;
        info!("Session {} started: {} @ {} fps", session_id, bounds, target_fps);
        Ok(SessionInfo { session_id, bounds, target_fps })
    }

    /// Consume the connection, spawning a background receive task.
    ///
    /// Returns a [`PeerWriter`] for outgoing traffic and a channel of
    /// [`PeerEvent`]s. The channel closes when the link drops.
    pub fn start_recv_loop(self) -> (PeerWriter<S>, mpsc::Receiver<PeerEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let (read_half, write_half) = tokio::io::split(self.stream);

        tokio::spawn(recv_loop(read_half, event_tx, self.peer.clone()));

        let writer = PeerWriter {
            writer: write_half,
            peer: self.peer,
            frame_seq: 0,
            started: Instant::now(),
            closed: false,
        };
        (writer, event_rx)
    }
}

async fn with_deadline<T>(
    fut: impl std::future::Future<Output = Result<T, TransportError>>,
) -> Result<T, TransportError> {
    tokio::time::timeout(HANDSHAKE_TIMEOUT, fut)
        .await
        .map_err(|_| TransportError::Timeout { ms: HANDSHAKE_TIMEOUT.as_millis() as u64 })?
}

fn packet_kind(packet: &Packet) -> &'static str {
    match packet {
        Packet::Video { .. } => "video",
        Packet::Control(msg) => match msg.msg_type {
            MessageType::Hello => "hello",
            MessageType::HelloAck => "hello_ack",
            MessageType::Data => "data",
            MessageType::Bye => "bye",
        },
    }
}

// ── Background receive loop ───────────────────────────────────────────────────

async fn recv_loop<S>(mut reader: ReadHalf<S>, event_tx: mpsc::Sender<PeerEvent>, peer: String)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    loop {
        let event = match wire::read_packet(&mut reader).await {
            Ok(Packet::Video { frame_seq, frame }) => PeerEvent::Frame { frame_seq, frame },
            Ok(Packet::Control(msg)) => match msg.msg_type {
                MessageType::Data => PeerEvent::Data {
                    label: msg.label.unwrap_or_default(),
                    payload: msg.payload.unwrap_or_default(),
                },
                MessageType::Bye => {
                    info!("Peer {} said bye", peer);
                    let _ = event_tx.send(PeerEvent::Bye).await;
                    return;
                }
                other => {
                    debug!("Recv loop: ignoring {:?} from {}", other, peer);
                    continue;
                }
            },
            Err(TransportError::ConnectionClosed) => {
                info!("Peer {} closed the connection", peer);
                return;
            }
            Err(e) => {
                warn!("Receive error from {}: {}", peer, e);
                return;
            }
        };
        if event_tx.send(event).await.is_err() {
            debug!("Event channel closed; stopping recv loop ({})", peer);
            return;
        }
    }
}

// ── PeerWriter ────────────────────────────────────────────────────────────────

/// Write-only handle returned by [`PeerConnection::start_recv_loop`].
pub struct PeerWriter<S> {
    writer: WriteHalf<S>,
    peer: String,
    frame_seq: u32,
    started: Instant,
    closed: bool,
}

impl<S> PeerWriter<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Total frames sent so far.
    pub fn frames_sent(&self) -> u32 {
        self.frame_seq
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::ConnectionClosed);
        }
        Ok(())
    }
}

#[async_trait]
impl<S> Transport for PeerWriter<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send_frame(&mut self, frame: &Frame) -> Result<u32, TransportError> {
        self.ensure_open()?;
        let seq = self.frame_seq;
        let pts_ms = self.started.elapsed().as_millis() as u32;
        wire::write_video(&mut self.writer, frame, seq, pts_ms).await?;
        self.frame_seq = self.frame_seq.wrapping_add(1);
        Ok(seq)
    }

    async fn send_data(&mut self, label: &str, payload: &str) -> Result<(), TransportError> {
        self.ensure_open()?;
        wire::write_control(&mut self.writer, &SignalingMessage::data(label, payload)).await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        wire::write_control(&mut self.writer, &SignalingMessage::bye()).await?;
        self.writer.shutdown().await?;
        debug!("Sent bye to {}", self.peer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballcast_core::PixelFormat;

    fn pair() -> (PeerConnection<tokio::io::DuplexStream>, PeerConnection<tokio::io::DuplexStream>) {
        let (a, b) = tokio::io::duplex(1 << 16);
        (PeerConnection::new(a, "receiver"), PeerConnection::new(b, "sender"))
    }

    #[tokio::test]
    async fn handshake_agrees_on_session() {
        let (mut sender, mut receiver) = pair();
        let (offered, answered) = tokio::join!(sender.offer(Bounds::new(320, 240), 25), receiver.answer());
        let offered = offered.unwrap();
        let answered = answered.unwrap();
        assert_eq!(offered, answered);
        assert_eq!(answered.bounds, Bounds::new(320, 240));
        assert_eq!(answered.target_fps, 25);
        assert!(!answered.session_id.is_empty());
    }

    #[tokio::test]
    async fn receiver_rejects_zero_fps() {
        let (mut sender, mut receiver) = pair();
        let (offered, answered) = tokio::join!(sender.offer(Bounds::new(320, 240), 0), receiver.answer());
        assert!(matches!(offered, Err(TransportError::Protocol { .. })));
        assert!(answered.is_err());
    }

    #[tokio::test]
    async fn frames_and_data_flow_both_ways() {
        let (mut sender, mut receiver) = pair();
        let (o, a) = tokio::join!(sender.offer(Bounds::new(2, 2), 30), receiver.answer());
        o.unwrap();
        a.unwrap();

        let (mut tx, mut tx_events) = sender.start_recv_loop();
        let (mut rx, mut rx_events) = receiver.start_recv_loop();

        let frame = Frame::new(vec![9u8; 12], 2, 2, PixelFormat::Bgr24);
        assert_eq!(tx.send_frame(&frame).await.unwrap(), 0);
        assert_eq!(tx.send_frame(&frame).await.unwrap(), 1);
        assert_eq!(tx.frames_sent(), 2);

        for want in 0..2 {
            match rx_events.recv().await {
                Some(PeerEvent::Frame { frame_seq, frame }) => {
                    assert_eq!(frame_seq, want);
                    assert_eq!(frame.data.len(), 12);
                }
                other => panic!("expected frame, got {other:?}"),
            }
        }

        rx.send_data("coords", "coords:1,1").await.unwrap();
        match tx_events.recv().await {
            Some(PeerEvent::Data { label, payload }) => {
                assert_eq!(label, "coords");
                assert_eq!(payload, "coords:1,1");
            }
            other => panic!("expected data, got {other:?}"),
        }

        tx.close().await.unwrap();
        assert!(matches!(rx_events.recv().await, Some(PeerEvent::Bye)));
        assert!(rx_events.recv().await.is_none());
        assert!(matches!(tx.send_frame(&frame).await, Err(TransportError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn dropped_peer_closes_event_channel() {
        let (sender, receiver) = pair();
        let (_tx, mut events) = receiver.start_recv_loop();
        drop(sender);
        assert!(events.recv().await.is_none());
    }
}
