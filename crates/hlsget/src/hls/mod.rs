// HLS acquisition pipeline: resolve, acquire, assemble.

pub mod acquirer;
pub mod assembler;
pub mod config;
pub mod decryption;
pub mod error;
pub mod hls_downloader;
pub mod playlist;

// Re-exports for easier access
pub use acquirer::SegmentAcquirer;
pub use assembler::DownloadResult;
pub use config::{HlsConfig, HlsConfigBuilder, IvPolicy};
pub use error::HlsError;
pub use hls_downloader::HlsDownloader;
pub use playlist::{MediaPlaylist, PlaylistResolver};
