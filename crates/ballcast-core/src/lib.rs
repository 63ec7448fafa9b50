pub mod compare;
pub mod config;
pub mod errors;
pub mod report;
pub mod types;

pub use compare::{compare, ComparisonRecord, ErrorStats};
pub use config::{BallConfig, BallcastConfig, SessionConfig};
pub use errors::{ConfigError, DetectionError, ReportError, TransportError};
pub use types::*;
