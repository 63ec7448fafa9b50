//! BCST packet framing.
//!
//! Every message on the link starts with the same 24-byte header. Video
//! packets carry raw pixels; control packets carry a JSON
//! [`SignalingMessage`].
//!
//! ```text
//! [0..4]   magic        u32 BE  0x42435354 ("BCST")
//! [4]      kind         u8      0 = video, 1 = control
//! [5]      format       u8      PixelFormat wire tag (video only)
//! [6..8]   reserved     [u8;2]  0x00 0x00
//! [8..12]  frame_seq    u32 BE  monotonically increasing (video only)
//! [12..16] pts_ms       u32 BE  presentation timestamp (video only)
//! [16..18] width        u16 BE  (video only)
//! [18..20] height       u16 BE  (video only)
//! [20..24] payload_len  u32 BE
//! [24..]   payload
//! ```

use ballcast_core::{Bounds, Frame, PixelFormat, TransportError};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::trace;

pub const MAGIC: u32 = 0x4243_5354;
pub const HEADER_SIZE: usize = 24;

/// Upper bound for a JSON control payload.
pub const MAX_CONTROL_BYTES: usize = 1_048_576;
/// Upper bound for a raw video payload.
pub const MAX_VIDEO_BYTES: usize = ballcast_core::MAX_FRAME_BYTES;

const KIND_VIDEO: u8 = 0;
const KIND_CONTROL: u8 = 1;

// ── Signaling wire types ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Hello,
    HelloAck,
    Data,
    Bye,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SignalingMessage {
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    #[serde(rename = "sessionID", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
    #[serde(rename = "targetFPS", skip_serializing_if = "Option::is_none")]
    pub target_fps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl SignalingMessage {
    fn empty(msg_type: MessageType) -> Self {
        Self {
            msg_type,
            session_id: None,
            bounds: None,
            target_fps: None,
            accepted: None,
            label: None,
            payload: None,
        }
    }

    pub fn hello(session_id: &str, bounds: Bounds, target_fps: u32) -> Self {
        Self {
            session_id: Some(session_id.to_owned()),
            bounds: Some(bounds),
            target_fps: Some(target_fps),
            ..Self::empty(MessageType::Hello)
        }
    }

    pub fn hello_ack(session_id: &str, accepted: bool) -> Self {
        Self {
            session_id: Some(session_id.to_owned()),
            accepted: Some(accepted),
            ..Self::empty(MessageType::HelloAck)
        }
    }

    pub fn data(label: &str, payload: &str) -> Self {
        Self {
            label: Some(label.to_owned()),
            payload: Some(payload.to_owned()),
            ..Self::empty(MessageType::Data)
        }
    }

    pub fn bye() -> Self {
        Self::empty(MessageType::Bye)
    }
}

// ── Packets ───────────────────────────────────────────────────────────────────

/// One decoded message from the link.
#[derive(Debug, Clone)]
pub enum Packet {
    Video { frame_seq: u32, frame: Frame },
    Control(SignalingMessage),
}

/// Parsed fixed-size header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub kind: u8,
    pub format: u8,
    pub frame_seq: u32,
    pub pts_ms: u32,
    pub width: u16,
    pub height: u16,
    pub payload_len: u32,
}

impl PacketHeader {
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&MAGIC.to_be_bytes());
        buf[4] = self.kind;
        buf[5] = self.format;
        // [6..8] reserved
        buf[8..12].copy_from_slice(&self.frame_seq.to_be_bytes());
        buf[12..16].copy_from_slice(&self.pts_ms.to_be_bytes());
        buf[16..18].copy_from_slice(&self.width.to_be_bytes());
        buf[18..20].copy_from_slice(&self.height.to_be_bytes());
        buf[20..24].copy_from_slice(&self.payload_len.to_be_bytes());
        buf
    }

    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Result<Self, TransportError> {
        let magic = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if magic != MAGIC {
            return Err(TransportError::protocol(format!("bad magic 0x{magic:08X}")));
        }
        let header = Self {
            kind: buf[4],
            format: buf[5],
            frame_seq: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
            pts_ms: u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]),
            width: u16::from_be_bytes([buf[16], buf[17]]),
            height: u16::from_be_bytes([buf[18], buf[19]]),
            payload_len: u32::from_be_bytes([buf[20], buf[21], buf[22], buf[23]]),
        };
        header.validate()?;
        Ok(header)
    }

    fn validate(&self) -> Result<(), TransportError> {
        let len = self.payload_len as usize;
        match self.kind {
            KIND_CONTROL => {
                if len > MAX_CONTROL_BYTES {
                    return Err(TransportError::protocol(format!("control message too large: {len} bytes")));
                }
            }
            KIND_VIDEO => {
                let format = PixelFormat::from_wire(self.format)
                    .ok_or_else(|| TransportError::protocol(format!("unknown pixel format {}", self.format)))?;
                if len > MAX_VIDEO_BYTES {
                    return Err(TransportError::protocol(format!("video payload too large: {len} bytes")));
                }
                let expected = self.width as usize * self.height as usize * format.channels();
                if len != expected {
                    return Err(TransportError::protocol(format!(
                        "video payload {len} bytes, {}×{} {:?} needs {expected}",
                        self.width, self.height, format
                    )));
                }
            }
            other => return Err(TransportError::protocol(format!("unknown packet kind {other}"))),
        }
        Ok(())
    }
}

// ── Read / write ──────────────────────────────────────────────────────────────

pub async fn write_control(
    stream: &mut (impl AsyncWriteExt + Unpin),
    msg: &SignalingMessage,
) -> Result<(), TransportError> {
    let json = serde_json::to_vec(msg).map_err(|e| TransportError::SendFailed { reason: e.to_string() })?;
    if json.len() > MAX_CONTROL_BYTES {
        return Err(TransportError::protocol(format!("control message too large: {} bytes", json.len())));
    }
    let header = PacketHeader {
        kind: KIND_CONTROL,
        format: 0,
        frame_seq: 0,
        pts_ms: 0,
        width: 0,
        height: 0,
        payload_len: json.len() as u32,
    };
    stream.write_all(&header.encode()).await?;
    stream.write_all(&json).await?;
    stream.flush().await?;
    trace!("Sent {:?} ({} bytes)", msg.msg_type, json.len());
    Ok(())
}

pub async fn write_video(
    stream: &mut (impl AsyncWriteExt + Unpin),
    frame: &Frame,
    frame_seq: u32,
    pts_ms: u32,
) -> Result<(), TransportError> {
    let (width, height) = match (u16::try_from(frame.width), u16::try_from(frame.height)) {
        (Ok(w), Ok(h)) => (w, h),
        _ => {
            return Err(TransportError::SendFailed {
                reason: format!("frame {}×{} exceeds 16-bit dimensions", frame.width, frame.height),
            })
        }
    };
    if !frame.is_well_formed() || frame.data.len() > MAX_VIDEO_BYTES {
        return Err(TransportError::SendFailed {
            reason: format!("malformed frame: {} bytes for {}×{} {:?}", frame.data.len(), width, height, frame.format),
        });
    }
    let header = PacketHeader {
        kind: KIND_VIDEO,
        format: frame.format.to_wire(),
        frame_seq,
        pts_ms,
        width,
        height,
        payload_len: frame.data.len() as u32,
    };
    stream.write_all(&header.encode()).await?;
    stream.write_all(&frame.data).await?;
    stream.flush().await?;
    trace!("Sent frame seq={} pts={}ms {} bytes", frame_seq, pts_ms, frame.data.len());
    Ok(())
}

/// Reads one packet. A clean EOF before the header maps to
/// [`TransportError::ConnectionClosed`].
pub async fn read_packet(stream: &mut (impl AsyncReadExt + Unpin)) -> Result<Packet, TransportError> {
    let mut header_buf = [0u8; HEADER_SIZE];
    match stream.read_exact(&mut header_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(TransportError::ConnectionClosed),
        Err(e) => return Err(e.into()),
    }
    let header = PacketHeader::decode(&header_buf)?;

    let mut body = vec![0u8; header.payload_len as usize];
    stream
        .read_exact(&mut body)
        .await
        .map_err(|e| TransportError::ReceiveFailed { reason: format!("reading payload: {e}") })?;

    match header.kind {
        KIND_CONTROL => {
            let msg: SignalingMessage = serde_json::from_slice(&body)
                .map_err(|e| TransportError::protocol(format!("parsing signaling message: {e}")))?;
            trace!("Received {:?} ({} bytes)", msg.msg_type, body.len());
            Ok(Packet::Control(msg))
        }
        _ => {
            // validate() already rejected unknown formats.
            let format = PixelFormat::from_wire(header.format)
                .ok_or_else(|| TransportError::protocol(format!("unknown pixel format {}", header.format)))?;
            let frame = Frame::new(Bytes::from(body), header.width as u32, header.height as u32, format)
                .with_timestamp(header.pts_ms as u64);
            Ok(Packet::Video { frame_seq: header.frame_seq, frame })
        }
    }
}
