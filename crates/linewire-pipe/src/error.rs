use std::path::PathBuf;

use crate::reactor::Direction;

/// Errors that can occur in framed pipe operations.
#[derive(Debug, thiserror::Error)]
pub enum PipeError {
    /// The pipe already has endpoints; a pipe is configured at most once.
    #[error("pipe is already configured")]
    AlreadyConfigured,

    /// The direction no longer accepts work.
    #[error("{0} direction is closed")]
    Closed(Direction),

    /// Failed to bind to the specified address.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// A record could not be decoded into the requested type.
    #[error("record decode failed: {0}")]
    Codec(#[from] linewire_codec::CodecError),

    /// An I/O error occurred while configuring an endpoint.
    #[error("pipe I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipeError>;
