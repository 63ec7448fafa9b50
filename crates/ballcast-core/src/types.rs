use serde::{Deserialize, Serialize};

// MARK: - Bounds

/// Frame dimensions in pixels. Also the ball's bounce box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bounds {
    pub width: u32,
    pub height: u32,
}

/// Largest raw frame payload the link carries (4096×4096 BGRA).
pub const MAX_FRAME_BYTES: usize = 4096 * 4096 * 4;

impl Bounds {
    pub const DEMO: Self = Self { width: 500, height: 500 };

    /// Largest side a video packet header can describe.
    pub const MAX_SIDE: u32 = u16::MAX as u32;

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn total_pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for Bounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}×{}", self.width, self.height)
    }
}

// MARK: - Position

/// Integer pixel coordinate. Signed: the ball may overshoot the left/top
/// edge by one velocity step before it bounces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance_to(&self, other: Position) -> f64 {
        let dx = (self.x as f64) - (other.x as f64);
        let dy = (self.y as f64) - (other.y as f64);
        (dx * dx + dy * dy).sqrt()
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.x, self.y)
    }
}

// MARK: - Velocity

/// Per-tick step deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub dx: i32,
    pub dy: i32,
}

impl Velocity {
    pub fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }
}

// MARK: - Color

/// 8-bit color stored in BGR channel order, matching the frame layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Color {
    pub b: u8,
    pub g: u8,
    pub r: u8,
}

impl Color {
    pub const BLACK: Self = Self { b: 0, g: 0, r: 0 };

    pub fn bgr(b: u8, g: u8, r: u8) -> Self {
        Self { b, g, r }
    }

    pub fn to_bgr_bytes(self) -> [u8; 3] {
        [self.b, self.g, self.r]
    }
}

// MARK: - PixelFormat

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Bgr24,
    Rgb24,
    Bgra32,
    Gray8,
}

impl PixelFormat {
    pub fn channels(&self) -> usize {
        match self {
            Self::Bgr24 | Self::Rgb24 => 3,
            Self::Bgra32 => 4,
            Self::Gray8 => 1,
        }
    }

    /// Wire tag used by the frame packet header.
    pub fn to_wire(self) -> u8 {
        match self {
            Self::Bgr24 => 0,
            Self::Rgb24 => 1,
            Self::Bgra32 => 2,
            Self::Gray8 => 3,
        }
    }

    pub fn from_wire(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Bgr24),
            1 => Some(Self::Rgb24),
            2 => Some(Self::Bgra32),
            3 => Some(Self::Gray8),
            _ => None,
        }
    }
}

// MARK: - Frame

/// Raw, decoded video frame. Rows are tightly packed (no stride padding).
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: bytes::Bytes,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Presentation timestamp, stamped by the transport on emission.
    pub timestamp_ms: u64,
}

impl Frame {
    pub fn new(data: impl Into<bytes::Bytes>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            format,
            timestamp_ms: 0,
        }
    }

    pub fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.width, self.height)
    }

    /// Number of bytes a tightly packed buffer of this size and format holds.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.channels()
    }

    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.expected_len()
    }
}
