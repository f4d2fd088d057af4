//! Configuration and model errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown host id {0}")]
    UnknownHost(u32),
    #[error("invalid topology: {0}")]
    Topology(String),
    #[error("invalid vlan {0}: must be between 1 and 4095")]
    InvalidVlan(u32),
    #[error("invalid MAC address \"{0}\"")]
    InvalidMac(String),
    #[error("invalid frame: {0}")]
    Frame(#[from] FrameError),
    #[error("invalid scenario \"{scenario}\": {reason}")]
    Scenario { scenario: String, reason: String },
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,
    #[error("odd number of hex digits ({0})")]
    OddLength(usize),
    #[error("invalid hex digit '{digit}' at offset {offset}")]
    InvalidDigit { digit: char, offset: usize },
}
