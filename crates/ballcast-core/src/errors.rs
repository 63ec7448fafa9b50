use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration invalid: {reason}")]
    Invalid { reason: String },

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid { reason: reason.into() }
    }
}

/// Per-frame detection failures. All of them are recoverable: the caller
/// skips the report for that frame and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectionError {
    #[error("Centroid undefined: no foreground pixels")]
    Undefined,

    #[error("Unsupported frame: {reason}")]
    UnsupportedFrame { reason: String },

    #[error("Detection worker timed out after {ms}ms")]
    TimedOut { ms: u64 },

    #[error("Detection worker failed: {reason}")]
    WorkerFailed { reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReportError {
    #[error("Not a coordinate report: {payload:?}")]
    NotAReport { payload: String },

    #[error("Expected 2 comma-separated fields, found {found}")]
    FieldCount { found: usize },

    #[error("Invalid {axis} coordinate: {value:?}")]
    InvalidCoordinate { axis: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Send failed: {reason}")]
    SendFailed { reason: String },

    #[error("Receive failed: {reason}")]
    ReceiveFailed { reason: String },

    #[error("Timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Protocol violation: {reason}")]
    Protocol { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol { reason: reason.into() }
    }

    /// True when the peer is gone and no further traffic is possible.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::ConnectionClosed => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}
