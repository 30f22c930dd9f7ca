use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised by the IPC endpoints, the shared frame buffer and frame ingest.
///
/// Every variant is recoverable at the cycle boundary.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to bind channel '{channel}': {source}")]
    Bind {
        channel: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to connect to channel '{channel}': {source}")]
    Connect {
        channel: String,
        #[source]
        source: io::Error,
    },

    #[error("{what} failed: {source}")]
    Io {
        what: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("{0} cancelled by exit request")]
    Cancelled(&'static str),

    #[error("{what} timed out after {after:?}")]
    TimedOut { what: &'static str, after: Duration },

    #[error("failed to open shared frame buffer {path:?}: {source}")]
    SharedMemoryOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("frame payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("frame payload is not a decodable bitmap: {0}")]
    Image(#[from] image::ImageError),

    #[error("report text has a character outside the single-byte range at offset {offset}")]
    NotByteText { offset: usize },

    #[error("malformed report payload: {0}")]
    MalformedReport(String),
}

impl BridgeError {
    pub(crate) fn io(what: &'static str, source: io::Error) -> Self {
        Self::Io { what, source }
    }

    /// True when the error came from an exit request rather than a fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, BridgeError>;
