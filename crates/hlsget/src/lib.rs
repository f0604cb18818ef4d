//! # hlsget
//!
//! A library for acquiring on-demand HLS media and persisting it as a single
//! file. Nested variant playlists are flattened down to media playlists,
//! segments are fetched through a retrying transport, AES-128 encrypted
//! segments are decrypted, and the result is written atomically.
//!
//! ## Features
//!
//! - Bounded retry-with-delay transport over a shared connection pool
//! - Depth-first variant resolution with a recursion guard
//! - In-order segment assembly, optionally with bounded prefetch
//! - Ordered candidate sources for format fallback
//! - Broadcaster voice/video URL templates

pub mod broadcaster;
pub mod builder;
pub mod config;
pub mod error;
pub mod hls;
pub mod source;
pub mod transport;

pub use builder::TransportConfigBuilder;
pub use config::TransportConfig;
pub use error::DownloadError;

// Re-export the HLS pipeline
pub use hls::{
    DownloadResult, HlsConfig, HlsConfigBuilder, HlsDownloader, HlsError, IvPolicy,
    MediaPlaylist, PlaylistResolver, SegmentAcquirer,
};

// Re-export transport utilities
pub use transport::{RequestOptions, RequestOutcome, ResilientTransport, TransportError};

// Re-export candidate sources
pub use source::{CandidateSource, CandidateSources, SourceMatch};
