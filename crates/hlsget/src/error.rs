use crate::hls::HlsError;
use crate::transport::TransportError;

// Top-level error type for download operations
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("HLS error: {0}")]
    Hls(#[from] HlsError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("No format available for {id} (tried: {})", tried.join(", "))]
    NoFormatAvailable { id: String, tried: Vec<String> },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DownloadError {
    /// True when the content exists but the network gave up on it.
    pub fn is_transient(&self) -> bool {
        match self {
            DownloadError::Hls(e) => e.is_transient(),
            DownloadError::Transport(e) => e.is_transient(),
            _ => false,
        }
    }

    /// True when nothing has been published at the requested location yet.
    pub fn is_nothing_published(&self) -> bool {
        match self {
            DownloadError::Hls(e) => e.is_nothing_published(),
            DownloadError::NoFormatAvailable { .. } => true,
            _ => false,
        }
    }
}
