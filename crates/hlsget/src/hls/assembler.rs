// HLS Assembler: concatenates per-playlist bytes and persists them without partial output.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::{Bytes, BytesMut};
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::hls::HlsError;

/// Outcome of a successful save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadResult {
    pub path: PathBuf,
    pub bytes_written: u64,
    pub playlists: usize,
    pub segments: usize,
}

/// Buffers playlist outputs in resolution order.
///
/// The whole artifact is held in memory until [`Assembler::persist`]; fine
/// for news-length clips.
#[derive(Debug, Default)]
pub struct Assembler {
    buffer: BytesMut,
    parts: usize,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one playlist's bytes with no separator.
    pub fn push(&mut self, part: &Bytes) {
        self.buffer.extend_from_slice(part);
        self.parts += 1;
    }

    pub fn parts(&self) -> usize {
        self.parts
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Write everything to `destination` in one go.
    pub async fn persist(self, destination: &Path) -> Result<u64, HlsError> {
        write_atomically(destination, &self.buffer).await?;
        Ok(self.buffer.len() as u64)
    }
}

static STAGING_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Sibling path the artifact is staged at before the final rename.
///
/// Unique per call, so concurrent saves to one destination never share a
/// staging file.
fn staging_path(destination: &Path) -> PathBuf {
    let file_name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let sequence = STAGING_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    destination.with_file_name(format!(
        ".{file_name}.{}.{sequence}.part",
        std::process::id()
    ))
}

/// Create missing parent directories, stage `data` next to `destination`
/// and rename it into place.
///
/// Either the destination ends up holding exactly `data`, or it is left as
/// it was before the call.
pub async fn write_atomically(destination: &Path, data: &[u8]) -> Result<(), HlsError> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let staging = staging_path(destination);
    let result = async {
        let mut file = fs::File::create(&staging).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&staging, destination).await
    }
    .await;

    if let Err(e) = result {
        warn!(path = %destination.display(), error = %e, "Failed to persist output");
        if let Err(cleanup) = fs::remove_file(&staging).await {
            debug!(path = %staging.display(), error = %cleanup, "Staging file not removed");
        }
        return Err(e.into());
    }

    info!(path = %destination.display(), bytes = data.len(), "All segments merged");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_persist_creates_parents_and_concatenates() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("voices/nested/out.bin");

        let mut assembler = Assembler::new();
        assembler.push(&Bytes::from_static(&[0x01, 0x02]));
        assembler.push(&Bytes::from_static(&[0xAA]));
        assert_eq!(assembler.parts(), 2);

        let written = assembler.persist(&destination).await.unwrap();
        assert_eq!(written, 3);
        assert_eq!(std::fs::read(&destination).unwrap(), vec![0x01, 0x02, 0xAA]);

        // No staging files left behind
        let leftovers = std::fs::read_dir(destination.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn test_persist_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("out.bin");
        std::fs::write(&destination, b"old contents").unwrap();

        write_atomically(&destination, b"new").await.unwrap();
        assert_eq!(std::fs::read(&destination).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_destination_untouched() {
        let dir = tempfile::tempdir().unwrap();
        // Renaming a file over a non-empty directory fails.
        let destination = dir.path().join("taken");
        std::fs::create_dir(&destination).unwrap();
        std::fs::write(destination.join("keep"), b"x").unwrap();

        assert!(write_atomically(&destination, b"data").await.is_err());
        assert!(destination.is_dir());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_staging_paths_are_unique() {
        let destination = Path::new("/tmp/voices/k100.mp3");
        let first = staging_path(destination);
        let second = staging_path(destination);
        assert_ne!(first, second);
        assert_eq!(first.parent(), destination.parent());
    }

    #[tokio::test]
    async fn test_concurrent_writes_to_same_destination() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("out.bin");
        let first = vec![0x11u8; 256 * 1024];
        let second = vec![0x22u8; 256 * 1024];

        let (a, b) = tokio::join!(
            write_atomically(&destination, &first),
            write_atomically(&destination, &second)
        );
        a.unwrap();
        b.unwrap();

        let contents = std::fs::read(&destination).unwrap();
        assert!(contents == first || contents == second);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
