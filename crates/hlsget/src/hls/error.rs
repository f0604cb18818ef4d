use std::sync::Arc;

use crate::transport::TransportError;

#[derive(Debug, thiserror::Error, Clone)]
pub enum HlsError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Failed to parse playlist {url}: {message}")]
    PlaylistParse { url: String, message: String },
    #[error("Playlist {url} resolved to no media playlists")]
    EmptyResolution { url: String },
    #[error("Playlist {url} has no playable segments")]
    NoPlayableContent { url: String },
    #[error("Playlist nesting exceeds {depth} levels at {url}")]
    PlaylistTooDeep { url: String, depth: usize },
    #[error("Invalid decryption key from {url}: {message}")]
    InvalidKey { url: String, message: String },
    #[error("Unsupported encryption method {method} in {url}")]
    UnsupportedEncryption { url: String, method: String },
    #[error("Playlist {url} rotates keys across segments, which is not supported")]
    KeyRotationUnsupported { url: String },
    #[error("Byte range of {url} not satisfied: {message}")]
    ByteRange { url: String, message: String },
    #[error("Decryption of {url} failed: {message}")]
    Decryption { url: String, message: String },
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: Arc<std::io::Error>,
    },
}

// Manual implementation because of the Arc wrapping.
impl From<std::io::Error> for HlsError {
    fn from(err: std::io::Error) -> Self {
        HlsError::Io {
            source: Arc::new(err),
        }
    }
}

impl HlsError {
    pub fn is_transient(&self) -> bool {
        matches!(self, HlsError::Transport(e) if e.is_transient())
    }

    /// "Nothing published yet" as opposed to "network broken".
    pub fn is_nothing_published(&self) -> bool {
        matches!(
            self,
            HlsError::EmptyResolution { .. } | HlsError::NoPlayableContent { .. }
        )
    }
}
