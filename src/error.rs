//! Error types for the strand server

use thiserror::Error;

/// Error returned by the client API
#[derive(Error, Debug)]
pub enum Error {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Hardware strand errors
#[derive(Error, Debug)]
pub enum StrandError {
    #[error("Failed to open device {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to flush pixels to device: {0}")]
    Flush(#[source] std::io::Error),
}

/// Listener and connection errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Socket bind failed on {addr}: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection failed: {0}")]
    ConnectionFailed(#[source] std::io::Error),

    #[error("Send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    #[error("Raw frame must be {expected} bytes, got {actual}")]
    FrameSize { expected: usize, actual: usize },

    #[error("Frame scheduler is no longer receiving")]
    ChannelClosed,
}

/// Command wire protocol errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Failed to decode command: {0}")]
    Decode(#[from] bincode::Error),

    #[error("Malformed command: action {action} cannot carry a {payload} payload")]
    Malformed { action: u8, payload: &'static str },

    #[error("Unknown command action: {0}")]
    UnknownAction(u8),

    #[error("Command record exceeds {0} bytes")]
    TooLarge(u64),
}

impl ProtocolError {
    /// Whether the stream is still aligned on a record boundary after this error.
    ///
    /// Malformed and unknown records were framed correctly, so the connection can
    /// keep decoding; anything else leaves the stream position undefined.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Malformed { .. } | Self::UnknownAction(_))
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
