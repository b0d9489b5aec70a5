//! Transport error types

use thiserror::Error;

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors raised while moving a large message
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Transport codec error: {0}")]
    Codec(String),

    #[error("Peer transport unavailable: {endpoint}")]
    PeerUnavailable { endpoint: String },

    #[error("Invalid fragment size: {0}")]
    InvalidFragmentSize(usize),
}

impl From<bincode::Error> for TransportError {
    fn from(e: bincode::Error) -> Self {
        TransportError::Codec(e.to_string())
    }
}

impl From<TransportError> for runtime_core::Error {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::InvalidFragmentSize(size) => runtime_core::Error::InvalidConfig {
                message: format!("fragment size {} is not usable", size),
            },
            other => runtime_core::Error::Transport(other.to_string()),
        }
    }
}
