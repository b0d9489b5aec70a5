//! Error types for the cracking cluster

use thiserror::Error;

/// Result type alias using the runtime Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the cracking cluster
#[derive(Error, Debug)]
pub enum Error {
    // Worker errors
    #[error("Worker not found: {worker_id}")]
    WorkerNotFound { worker_id: String },

    #[error("Worker already registered: {worker_id}")]
    WorkerAlreadyRegistered { worker_id: String },

    #[error("Maximum workers ({max}) reached")]
    WorkerLimitReached { max: usize },

    #[error("Worker heartbeat timeout: {worker_id} (last seen {last_seen_ms}ms ago)")]
    WorkerHeartbeatTimeout { worker_id: String, last_seen_ms: u64 },

    // Input errors
    #[error("Malformed batch at line {line}: {reason}")]
    MalformedBatch { line: usize, reason: String },

    #[error("Unknown password record: {index}")]
    RecordNotFound { index: u32 },

    #[error("Input already exhausted, batch rejected")]
    InputClosed,

    // Transport errors
    #[error("Transport error: {0}")]
    Transport(String),

    // Configuration errors
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    // Channel errors
    #[error("Channel closed: {channel}")]
    ChannelClosed { channel: String },
}

impl Error {
    /// Returns true if this error ends the stream it came from instead of a
    /// single request
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfig { .. } | Error::Internal { .. } | Error::Io(_)
        )
    }

    /// Shorthand for a malformed batch line
    pub fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Error::MalformedBatch {
            line,
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
