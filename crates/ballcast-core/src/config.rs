use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::types::{Bounds, Color, PixelFormat, Position, Velocity, MAX_FRAME_BYTES};

/// Initial ball parameters for one streaming session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BallConfig {
    pub radius: u32,
    pub color: Color,
    #[serde(alias = "startPosition")]
    pub start_position: Position,
    pub velocity: Velocity,
    pub bounds: Bounds,
}

impl Default for BallConfig {
    fn default() -> Self {
        Self {
            radius: 30,
            color: Color::bgr(0, 225, 0),
            start_position: Position::new(50, 400),
            velocity: Velocity::new(10, 10),
            bounds: Bounds::DEMO,
        }
    }
}

impl BallConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.radius == 0 {
            return Err(ConfigError::invalid("radius must be positive"));
        }
        if self.bounds.width == 0 || self.bounds.height == 0 {
            return Err(ConfigError::invalid(format!("bounds must be non-empty, got {}", self.bounds)));
        }
        if self.bounds.width > Bounds::MAX_SIDE || self.bounds.height > Bounds::MAX_SIDE {
            return Err(ConfigError::invalid(format!(
                "bounds {} exceed {} px per side",
                self.bounds,
                Bounds::MAX_SIDE
            )));
        }
        let frame_bytes = self.bounds.total_pixels() * PixelFormat::Bgr24.channels() as u64;
        if frame_bytes > MAX_FRAME_BYTES as u64 {
            return Err(ConfigError::invalid(format!(
                "bounds {} need {} bytes per frame, limit is {}",
                self.bounds, frame_bytes, MAX_FRAME_BYTES
            )));
        }
        if self.radius > Bounds::MAX_SIDE {
            return Err(ConfigError::invalid(format!(
                "radius {} exceeds {}",
                self.radius,
                Bounds::MAX_SIDE
            )));
        }
        if self.velocity.dx.unsigned_abs() > Bounds::MAX_SIDE || self.velocity.dy.unsigned_abs() > Bounds::MAX_SIDE {
            return Err(ConfigError::invalid(format!(
                "velocity ({}, {}) exceeds {} px per tick",
                self.velocity.dx,
                self.velocity.dy,
                Bounds::MAX_SIDE
            )));
        }
        // Start inside the box: the ball then never leaves it by more than one step.
        let Position { x, y } = self.start_position;
        if x < 0 || y < 0 || x as u32 > self.bounds.width || y as u32 > self.bounds.height {
            return Err(ConfigError::invalid(format!(
                "start position ({}) lies outside {}",
                self.start_position, self.bounds
            )));
        }
        if self.color == Color::BLACK {
            return Err(ConfigError::invalid("ball color must differ from the black background"));
        }
        Ok(())
    }
}

/// Pacing and receiver-side limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    #[serde(alias = "targetFPS")]
    pub target_fps: u32,
    #[serde(alias = "detectTimeoutMs")]
    pub detect_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            target_fps: 30,
            detect_timeout_ms: 1_000,
        }
    }
}

impl SessionConfig {
    /// Interval between outgoing frames.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.target_fps.max(1) as u64)
    }

    pub fn detect_timeout(&self) -> Duration {
        Duration::from_millis(self.detect_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_fps == 0 || self.target_fps > 240 {
            return Err(ConfigError::invalid(format!(
                "target_fps must be within 1..=240, got {}",
                self.target_fps
            )));
        }
        if self.detect_timeout_ms == 0 {
            return Err(ConfigError::invalid("detect_timeout_ms must be positive"));
        }
        Ok(())
    }
}

/// Top-level config file layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BallcastConfig {
    pub ball: BallConfig,
    pub session: SessionConfig,
}

impl BallcastConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ball.validate()?;
        self.session.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_demo_scene() {
        let cfg = BallcastConfig::default();
        assert_eq!(cfg.ball.radius, 30);
        assert_eq!(cfg.ball.start_position, Position::new(50, 400));
        assert_eq!(cfg.ball.velocity, Velocity::new(10, 10));
        assert_eq!(cfg.ball.bounds, Bounds::new(500, 500));
        assert_eq!(cfg.session.target_fps, 30);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserializes_camel_case_fields() {
        let json = r#"{
            "ball": {"startPosition": {"x": 10, "y": 20}, "radius": 12},
            "session": {"targetFPS": 60, "detectTimeoutMs": 250}
        }"#;

        let cfg = BallcastConfig::from_json_str(json).expect("valid camelCase config");
        assert_eq!(cfg.ball.start_position, Position::new(10, 20));
        assert_eq!(cfg.ball.radius, 12);
        assert_eq!(cfg.ball.bounds, Bounds::DEMO);
        assert_eq!(cfg.session.target_fps, 60);
        assert_eq!(cfg.session.detect_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn deserializes_snake_case_fields() {
        let json = r#"{
            "ball": {"start_position": {"x": 1, "y": 2}, "velocity": {"dx": -3, "dy": 4}},
            "session": {"target_fps": 25}
        }"#;

        let cfg = BallcastConfig::from_json_str(json).expect("valid snake_case config");
        assert_eq!(cfg.ball.velocity, Velocity::new(-3, 4));
        assert_eq!(cfg.session.frame_interval(), Duration::from_millis(40));
        assert_eq!(cfg.session.detect_timeout_ms, 1_000);
    }

    #[test]
    fn rejects_zero_radius() {
        let json = r#"{"ball": {"radius": 0}}"#;
        let err = BallcastConfig::from_json_str(json).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }), "{err}");
    }

    #[test]
    fn rejects_black_ball() {
        let json = r#"{"ball": {"color": {"b": 0, "g": 0, "r": 0}}}"#;
        assert!(BallcastConfig::from_json_str(json).is_err());
    }

    #[test]
    fn rejects_radius_beyond_frame_limit() {
        let cfg = BallConfig { radius: u32::MAX, ..BallConfig::default() };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid { .. })));

        let cfg = BallConfig { radius: Bounds::MAX_SIDE, ..BallConfig::default() };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_velocity_beyond_frame_limit() {
        let fast = BallConfig { velocity: Velocity::new(i32::MAX, 10), ..BallConfig::default() };
        assert!(fast.validate().is_err());

        let min = BallConfig { velocity: Velocity::new(10, i32::MIN), ..BallConfig::default() };
        assert!(min.validate().is_err());

        let limit = Bounds::MAX_SIDE as i32;
        let edge = BallConfig { velocity: Velocity::new(-limit, limit), ..BallConfig::default() };
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn rejects_bounds_wider_than_16_bits() {
        let cfg = BallConfig {
            bounds: Bounds::new(Bounds::MAX_SIDE + 1, 10),
            ..BallConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_bounds_over_frame_byte_limit() {
        // 16-bit sides, but 3 bytes per pixel blows the payload limit.
        let cfg = BallConfig {
            bounds: Bounds::new(Bounds::MAX_SIDE, Bounds::MAX_SIDE),
            ..BallConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("bytes per frame"), "{err}");

        let cfg = BallConfig { bounds: Bounds::new(4096, 4096), ..BallConfig::default() };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_start_outside_bounds() {
        let cfg = BallConfig { start_position: Position::new(-1, 10), ..BallConfig::default() };
        assert!(cfg.validate().is_err());

        let cfg = BallConfig { start_position: Position::new(10, 501), ..BallConfig::default() };
        assert!(cfg.validate().is_err());

        let cfg = BallConfig { start_position: Position::new(500, 0), ..BallConfig::default() };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_zero_fps() {
        let json = r#"{"session": {"target_fps": 0}}"#;
        assert!(BallcastConfig::from_json_str(json).is_err());
    }
}
