//! ballcast-detect
//!
//! Recovers the ball position from a raw frame.
//!
//! # Pipeline
//! ```text
//! BGR/RGB/BGRA/gray → BT.601 luma → binary threshold (> 127) → moments → (m10/m00, m01/m00)
//! ```
//!
//! [`CentroidDetector`] is synchronous and cheap to copy. [`DetectionWorker`]
//! runs it on a dedicated OS thread per frame so the receive loop stays
//! responsive.

pub mod worker;

use ballcast_core::{DetectionError, Frame, PixelFormat, Position};

pub use worker::DetectionWorker;

/// Fixed binarization level. Pixels strictly above it are foreground.
pub const THRESHOLD: u8 = 127;

/// Value written for foreground pixels by [`threshold`].
pub const FOREGROUND: u8 = 255;

// BT.601 luma weights in 14-bit fixed point; they sum to 1 << 14.
const LUMA_SHIFT: u32 = 14;
const LUMA_R: u32 = 4_899;
const LUMA_G: u32 = 9_617;
const LUMA_B: u32 = 1_868;

// MARK: - FrameDetector

/// Anything that can turn one frame into a position estimate.
pub trait FrameDetector: Send + Sync + 'static {
    fn detect(&self, frame: &Frame) -> Result<Position, DetectionError>;
}

// MARK: - GrayImage

/// Single-channel 8-bit image, tightly packed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y as usize * self.width as usize + x as usize).copied()
    }
}

// MARK: - Moments

/// Raw spatial moments up to first order, weighted by pixel intensity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Moments {
    pub m00: u64,
    pub m10: u64,
    pub m01: u64,
}

impl Moments {
    /// Centroid truncated toward zero. Undefined when the image is empty.
    pub fn centroid(&self) -> Result<Position, DetectionError> {
        if self.m00 == 0 {
            return Err(DetectionError::Undefined);
        }
        let x = self.m10 / self.m00;
        let y = self.m01 / self.m00;
        Ok(Position::new(x as i32, y as i32))
    }
}

// MARK: - Stages

/// Converts any supported frame to luma.
pub fn grayscale(frame: &Frame) -> Result<GrayImage, DetectionError> {
    if !frame.is_well_formed() {
        return Err(DetectionError::UnsupportedFrame {
            reason: format!(
                "{}×{} {:?} needs {} bytes, got {}",
                frame.width,
                frame.height,
                frame.format,
                frame.expected_len(),
                frame.data.len()
            ),
        });
    }

    let channels = frame.format.channels();
    let data = match frame.format {
        PixelFormat::Gray8 => frame.data.to_vec(),
        PixelFormat::Bgr24 | PixelFormat::Bgra32 => frame
            .data
            .chunks_exact(channels)
            .map(|px| luma(px[2], px[1], px[0]))
            .collect(),
        PixelFormat::Rgb24 => frame
            .data
            .chunks_exact(channels)
            .map(|px| luma(px[0], px[1], px[2]))
            .collect(),
    };

    Ok(GrayImage {
        width: frame.width,
        height: frame.height,
        data,
    })
}

#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    let weighted = r as u32 * LUMA_R + g as u32 * LUMA_G + b as u32 * LUMA_B;
    ((weighted + (1 << (LUMA_SHIFT - 1))) >> LUMA_SHIFT) as u8
}

/// Binary threshold at [`THRESHOLD`]: foreground becomes [`FOREGROUND`], the rest 0.
pub fn threshold(image: &GrayImage) -> GrayImage {
    GrayImage {
        width: image.width,
        height: image.height,
        data: image
            .data
            .iter()
            .map(|&v| if v > THRESHOLD { FOREGROUND } else { 0 })
            .collect(),
    }
}

pub fn moments(image: &GrayImage) -> Moments {
    let width = image.width as usize;
    if width == 0 {
        return Moments::default();
    }
    let mut m = Moments::default();
    for (y, row) in image.data.chunks_exact(width).enumerate() {
        for (x, &v) in row.iter().enumerate() {
            if v == 0 {
                continue;
            }
            let v = v as u64;
            m.m00 += v;
            m.m10 += v * x as u64;
            m.m01 += v * y as u64;
        }
    }
    m
}

// MARK: - CentroidDetector

/// Stateless threshold + moments detector. Frames are thresholded
/// independently; nothing carries over between calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct CentroidDetector;

impl CentroidDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn detect(&self, frame: &Frame) -> Result<Position, DetectionError> {
        let gray = grayscale(frame)?;
        let binary = threshold(&gray);
        moments(&binary).centroid()
    }
}

impl FrameDetector for CentroidDetector {
    fn detect(&self, frame: &Frame) -> Result<Position, DetectionError> {
        CentroidDetector::detect(self, frame)
    }
}
