//! ballcast-sim
//!
//! Deterministic bouncing-ball simulator. Each tick:
//!
//! ```text
//! bounce check (pre-update position) → position += velocity → render
//! ```
//!
//! The simulator owns the only copy of the ball state. The sender's session
//! loop holds it by value and reads ground truth from it when a report
//! arrives.

pub mod render;

use ballcast_core::{BallConfig, Bounds, Color, ConfigError, Frame, PixelFormat, Position, Velocity};
use tracing::{debug, trace};

// MARK: - BallState

/// Authoritative ball state for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct BallState {
    pub position: Position,
    pub velocity: Velocity,
    pub radius: u32,
    pub color: Color,
    pub bounds: Bounds,
}

impl BallState {
    pub fn from_config(config: &BallConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            position: config.start_position,
            velocity: config.velocity,
            radius: config.radius,
            color: config.color,
            bounds: config.bounds,
        })
    }

    /// Bounces off any edge the current position touches, then moves one step.
    pub fn step(&mut self) -> Bounce {
        let bounce = Bounce {
            x: hits_edge(self.position.x, self.bounds.width),
            y: hits_edge(self.position.y, self.bounds.height),
        };
        if bounce.x {
            self.velocity.dx = -self.velocity.dx;
        }
        if bounce.y {
            self.velocity.dy = -self.velocity.dy;
        }
        self.position.x += self.velocity.dx;
        self.position.y += self.velocity.dy;
        bounce
    }
}

/// Edge test for one axis: at or past the far edge, or at or before zero.
fn hits_edge(coord: i32, edge: u32) -> bool {
    coord as i64 >= edge as i64 || coord <= 0
}

/// Which axes reversed during a step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bounce {
    pub x: bool,
    pub y: bool,
}

impl Bounce {
    pub fn any(&self) -> bool {
        self.x || self.y
    }
}

// MARK: - Tick

/// Output of one simulator tick.
#[derive(Debug, Clone)]
pub struct Tick {
    /// 1-based tick index.
    pub index: u64,
    pub frame: Frame,
    pub position: Position,
    pub bounce: Bounce,
}

// MARK: - BallSimulator

pub struct BallSimulator {
    state: BallState,
    ticks: u64,
}

impl BallSimulator {
    pub fn new(config: &BallConfig) -> Result<Self, ConfigError> {
        let state = BallState::from_config(config)?;
        debug!(
            "Simulator ready: start=({}) velocity=({}, {}) radius={} bounds={}",
            state.position, state.velocity.dx, state.velocity.dy, state.radius, state.bounds
        );
        Ok(Self { state, ticks: 0 })
    }

    /// Advances one tick and renders the resulting frame.
    pub fn advance(&mut self) -> Tick {
        let bounce = self.step();
        Tick {
            index: self.ticks,
            frame: render_state(&self.state),
            position: self.state.position,
            bounce,
        }
    }

    /// Physics only.
    pub fn step(&mut self) -> Bounce {
        let bounce = self.state.step();
        self.ticks += 1;
        if bounce.any() {
            trace!(
                "Tick {} bounce x={} y={} → velocity ({}, {})",
                self.ticks, bounce.x, bounce.y, self.state.velocity.dx, self.state.velocity.dy
            );
        }
        bounce
    }

    pub fn state(&self) -> &BallState {
        &self.state
    }

    pub fn position(&self) -> Position {
        self.state.position
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

/// Renders `state` on a fresh black BGR canvas.
pub fn render_state(state: &BallState) -> Frame {
    let mut canvas = render::blank_canvas(state.bounds);
    render::fill_circle(&mut canvas, state.bounds, state.position, state.radius, state.color);
    Frame::new(canvas.freeze(), state.bounds.width, state.bounds.height, PixelFormat::Bgr24)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo() -> BallSimulator {
        BallSimulator::new(&BallConfig::default()).expect("default config is valid")
    }

    fn config(start: (i32, i32), velocity: (i32, i32), bounds: (u32, u32)) -> BallConfig {
        BallConfig {
            start_position: Position::new(start.0, start.1),
            velocity: Velocity::new(velocity.0, velocity.1),
            bounds: Bounds::new(bounds.0, bounds.1),
            ..BallConfig::default()
        }
    }

    #[test]
    fn first_tick_moves_by_velocity() {
        let mut sim = demo();
        let tick = sim.advance();
        assert_eq!(tick.index, 1);
        assert_eq!(tick.position, Position::new(60, 410));
        assert!(!tick.bounce.any());
        assert_eq!(sim.ticks(), 1);
    }

    #[test]
    fn position_is_previous_plus_possibly_flipped_velocity() {
        let mut sim = demo();
        for _ in 0..500 {
            let before = sim.state().clone();
            let bounce = sim.step();
            let after = sim.state();

            let dx = if bounce.x { -before.velocity.dx } else { before.velocity.dx };
            let dy = if bounce.y { -before.velocity.dy } else { before.velocity.dy };
            assert_eq!(after.velocity, Velocity::new(dx, dy));
            assert_eq!(after.position, Position::new(before.position.x + dx, before.position.y + dy));
        }
    }

    #[test]
    fn edge_contact_flips_velocity_sign() {
        let mut sim = demo();
        for _ in 0..500 {
            let before = sim.state().clone();
            sim.step();
            let after = sim.state();
            if before.position.x >= before.bounds.width as i32 || before.position.x <= 0 {
                assert_eq!(after.velocity.dx.signum(), -before.velocity.dx.signum());
            }
            if before.position.y >= before.bounds.height as i32 || before.position.y <= 0 {
                assert_eq!(after.velocity.dy.signum(), -before.velocity.dy.signum());
            }
        }
    }

    #[test]
    fn speed_never_changes() {
        let mut sim = BallSimulator::new(&config((3, 7), (7, -4), (97, 61))).unwrap();
        for _ in 0..1_000 {
            sim.step();
            assert_eq!(sim.state().velocity.dx.abs(), 7);
            assert_eq!(sim.state().velocity.dy.abs(), 4);
        }
    }

    #[test]
    fn overshoot_is_kept_not_clamped() {
        // 495 < 500 so no bounce: the ball lands 5px past the edge.
        let mut sim = BallSimulator::new(&config((495, 100), (10, 0), (500, 500))).unwrap();
        let first = sim.advance();
        assert_eq!(first.position, Position::new(505, 100));
        assert!(!first.bounce.x);

        let second = sim.advance();
        assert!(second.bounce.x);
        assert_eq!(second.position, Position::new(495, 100));
    }

    #[test]
    fn corner_contact_flips_both_axes() {
        let mut sim = BallSimulator::new(&config((500, 500), (10, 10), (500, 500))).unwrap();
        let tick = sim.advance();
        assert_eq!(tick.bounce, Bounce { x: true, y: true });
        assert_eq!(tick.position, Position::new(490, 490));
        assert_eq!(sim.state().velocity, Velocity::new(-10, -10));
    }

    #[test]
    fn zero_coordinate_counts_as_contact() {
        let mut sim = BallSimulator::new(&config((0, 250), (-10, 0), (500, 500))).unwrap();
        let tick = sim.advance();
        assert!(tick.bounce.x);
        assert_eq!(tick.position, Position::new(10, 250));
    }

    #[test]
    fn hundred_ticks_bounce_at_closed_form_indices() {
        let mut sim = demo();
        let mut x_flips = Vec::new();
        let mut y_flips = Vec::new();

        for _ in 0..100 {
            let tick = sim.advance();
            let p = tick.position;
            assert!(p.x >= -10 && p.x <= 510, "x out of range at tick {}: {}", tick.index, p.x);
            assert!(p.y >= -10 && p.y <= 510, "y out of range at tick {}: {}", tick.index, p.y);
            if tick.bounce.x {
                x_flips.push(tick.index);
            }
            if tick.bounce.y {
                y_flips.push(tick.index);
            }
        }

        // y: 400 → 500 after 10 ticks, flips on tick 11, reaches 0 after
        // tick 60 and flips on tick 61. x: 50 → 500 after 45 ticks, flips on
        // tick 46, reaches 0 after tick 95 and flips on tick 96.
        assert_eq!(y_flips, vec![11, 61]);
        assert_eq!(x_flips, vec![46, 96]);
        assert_eq!(sim.position(), Position::new(50, 400));
    }

    #[test]
    fn frame_matches_bounds_and_shows_ball() {
        let mut sim = demo();
        let tick = sim.advance();
        let frame = &tick.frame;
        assert_eq!((frame.width, frame.height), (500, 500));
        assert_eq!(frame.format, PixelFormat::Bgr24);
        assert!(frame.is_well_formed());

        let at = |x: usize, y: usize| {
            let i = (y * 500 + x) * 3;
            [frame.data[i], frame.data[i + 1], frame.data[i + 2]]
        };
        assert_eq!(at(60, 410), [0, 225, 0]);
        assert_eq!(at(0, 0), [0, 0, 0]);
    }

    #[test]
    fn each_tick_renders_a_fresh_canvas() {
        let mut sim = BallSimulator::new(&config((100, 100), (50, 0), (500, 500))).unwrap();
        sim.advance();
        let second = sim.advance();
        let i = (100 * 500 + 150) * 3;
        // Center of the previous tick's ball must be black again.
        assert_eq!(&second.frame.data[i..i + 3], &[0, 0, 0]);
    }

    #[test]
    fn rejects_invalid_config() {
        let cfg = BallConfig { radius: 0, ..BallConfig::default() };
        assert!(BallSimulator::new(&cfg).is_err());

        let cfg = BallConfig { radius: u32::MAX, ..BallConfig::default() };
        assert!(BallSimulator::new(&cfg).is_err());

        let cfg = BallConfig { velocity: Velocity::new(i32::MIN, 0), ..BallConfig::default() };
        assert!(BallSimulator::new(&cfg).is_err());
    }

    #[test]
    fn largest_accepted_config_ticks_without_overflow() {
        let limit = Bounds::MAX_SIDE as i32;
        let cfg = BallConfig {
            radius: Bounds::MAX_SIDE,
            velocity: Velocity::new(limit, -limit),
            ..config((64, 0), (0, 0), (64, 64))
        };
        let mut sim = BallSimulator::new(&cfg).unwrap();
        for _ in 0..50 {
            let tick = sim.advance();
            assert!(tick.position.x.abs() <= 64 + limit);
            assert!(tick.position.y.abs() <= 64 + limit);
            assert!(tick.frame.is_well_formed());
        }
    }
}
