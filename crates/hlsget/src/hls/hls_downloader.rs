use std::path::Path;

use bytes::Bytes;
use tracing::info;

use crate::hls::acquirer::SegmentAcquirer;
use crate::hls::assembler::{Assembler, DownloadResult};
use crate::hls::config::HlsConfig;
use crate::hls::playlist::{MediaPlaylist, PlaylistResolver};
use crate::hls::HlsError;
use crate::transport::ResilientTransport;

/// Resolves, acquires and persists HLS media.
///
/// Every call starts from scratch; nothing is cached between calls.
pub struct HlsDownloader {
    config: HlsConfig,
    transport: ResilientTransport,
    resolver: PlaylistResolver,
    acquirer: SegmentAcquirer,
}

impl HlsDownloader {
    pub fn new(config: HlsConfig) -> Result<Self, HlsError> {
        let transport = ResilientTransport::new(config.transport.clone())?;
        Ok(Self::with_transport(config, transport))
    }

    /// Build on an existing transport, sharing its connection pool.
    pub fn with_transport(config: HlsConfig, transport: ResilientTransport) -> Self {
        Self {
            resolver: PlaylistResolver::new(transport.clone(), config.max_depth),
            acquirer: SegmentAcquirer::new(transport.clone(), &config),
            transport,
            config,
        }
    }

    pub fn config(&self) -> &HlsConfig {
        &self.config
    }

    pub fn transport(&self) -> &ResilientTransport {
        &self.transport
    }

    pub async fn resolve(&self, url: &str) -> Result<Vec<MediaPlaylist>, HlsError> {
        self.resolver.resolve(url).await
    }

    pub async fn acquire(&self, playlist: &MediaPlaylist) -> Result<Bytes, HlsError> {
        self.acquirer.acquire(playlist).await
    }

    /// Download everything reachable from `url` into `destination`.
    ///
    /// Playlists are acquired in resolution order and concatenated raw. No
    /// file is created or modified unless every playlist was acquired.
    pub async fn save(
        &self,
        url: &str,
        destination: impl AsRef<Path>,
    ) -> Result<DownloadResult, HlsError> {
        let destination = destination.as_ref();
        let playlists = self.resolve(url).await?;

        let segments: usize = playlists.iter().map(|p| p.segments.len()).sum();
        if segments == 0 {
            return Err(HlsError::NoPlayableContent {
                url: url.to_string(),
            });
        }

        let mut assembler = Assembler::new();
        for playlist in &playlists {
            let part = self.acquire(playlist).await?;
            assembler.push(&part);
        }

        let bytes_written = assembler.persist(destination).await?;
        info!(
            url,
            path = %destination.display(),
            playlists = playlists.len(),
            segments,
            bytes = bytes_written,
            "HLS download complete"
        );

        Ok(DownloadResult {
            path: destination.to_path_buf(),
            bytes_written,
            playlists: playlists.len(),
            segments,
        })
    }
}
