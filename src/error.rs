//! Error types for oscrelay.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Result type alias for oscrelay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for oscrelay.
#[derive(Error, Debug)]
pub enum Error {
    // Connection configuration errors
    #[error("invalid connection config: {0}")]
    Config(String),

    // Transport errors
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    // Codec errors
    #[error("malformed packet: {0}")]
    Decode(String),

    #[error("packet encode failed: {0}")]
    Encode(String),

    // Registry errors
    #[error("slot {0} out of range (valid slots are 1-8)")]
    SlotOutOfRange(u8),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // General errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Transport layer errors.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("bind failed on {addr}: {reason}")]
    BindFailed { addr: SocketAddr, reason: String },

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("socket error: {0}")]
    SocketError(String),
}

impl Error {
    /// Check if this error is a configuration rejection (the connection
    /// never opened, as opposed to a socket that failed underway).
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// Check if this error is non-fatal to the connection (the socket
    /// stays open and listening continues).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Decode(_) | Error::Transport(TransportError::SendFailed(_))
        )
    }
}
