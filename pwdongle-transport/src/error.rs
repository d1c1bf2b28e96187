//! Transport error types

use thiserror::Error;

/// Errors that can occur on a byte channel
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Peer went away and the channel cannot reconnect
    #[error("Channel closed")]
    Closed,
}
