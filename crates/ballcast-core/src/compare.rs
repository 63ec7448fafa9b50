use tracing::info;

use crate::types::Position;

/// Ground truth vs. reported position for one report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComparisonRecord {
    pub server: Position,
    pub client: Position,
    pub error: f64,
}

impl ComparisonRecord {
    pub fn new(server: Position, client: Position) -> Self {
        Self {
            server,
            client,
            error: server.distance_to(client),
        }
    }

    /// Emits the human-readable record.
    pub fn log(&self) {
        info!("Server Ball Coordinates: {}", self.server);
        info!("Client Ball Coordinates: {}", self.client);
        info!("Error: {:.3}", self.error);
    }
}

/// Euclidean error between the sender's ball and the receiver's estimate.
/// Logs both positions and the error; has no other side effect.
pub fn compare(server_x: i32, server_y: i32, client_x: i32, client_y: i32) -> f64 {
    let record = ComparisonRecord::new(Position::new(server_x, server_y), Position::new(client_x, client_y));
    record.log();
    record.error
}

/// Running error statistics for periodic session summaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorStats {
    count: u64,
    sum: f64,
    max: f64,
}

impl ErrorStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, error: f64) {
        self.count += 1;
        self.sum += error;
        if error > self.max {
            self.max = error;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
