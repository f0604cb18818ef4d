// HLS Playlist Resolver: fetches playlists and flattens variant trees into media playlists.

use m3u8_rs::{ByteRange, Key, KeyMethod, parse_playlist_res};
use tracing::{debug, info, trace};
use url::Url;

use crate::hls::HlsError;
use crate::transport::ResilientTransport;

/// A reference to a sub-playlist found in a variant (master) playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantRef {
    pub url: Url,
    pub bandwidth: u64,
}

/// Inclusive byte window of a segment inside a larger resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentRange {
    pub start: u64,
    pub length: u64,
}

impl SegmentRange {
    /// Validate a range declared by `playlist_url`. Empty windows and windows
    /// ending past `u64::MAX` are rejected.
    fn checked(start: u64, length: u64, playlist_url: &Url) -> Result<Self, HlsError> {
        if length == 0 || start.checked_add(length).is_none() {
            return Err(HlsError::PlaylistParse {
                url: playlist_url.to_string(),
                message: format!("Invalid byte range {length}@{start}"),
            });
        }
        Ok(Self { start, length })
    }

    /// Offset one past the last byte.
    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.length)
    }

    /// Value for the `Range` request header.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end().saturating_sub(1))
    }
}

/// One fetchable piece of a media playlist, in output order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRef {
    /// Position in the acquisition order of the owning playlist
    pub index: usize,
    /// Media sequence number (init sections share their first segment's number)
    pub sequence: u64,
    pub url: Url,
    pub range: Option<SegmentRange>,
    /// `#EXT-X-MAP` initialization section
    pub is_init: bool,
}

/// Decryption key declared by `#EXT-X-KEY:METHOD=AES-128`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionKey {
    pub uri: Url,
    pub iv: Option<[u8; 16]>,
}

/// A flat list of segments plus the key that applies to all of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPlaylist {
    pub url: Url,
    pub media_sequence: u64,
    pub segments: Vec<SegmentRef>,
    pub key: Option<EncryptionKey>,
}

impl MediaPlaylist {
    pub fn is_encrypted(&self) -> bool {
        self.key.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Playlist {
    Variant(Vec<VariantRef>),
    Media(MediaPlaylist),
}

fn join(base: &Url, uri: &str, playlist_url: &Url) -> Result<Url, HlsError> {
    base.join(uri).map_err(|e| HlsError::PlaylistParse {
        url: playlist_url.to_string(),
        message: format!("Could not join base URL with URI {uri}: {e}"),
    })
}

fn parse_iv(iv_hex_str: &str, playlist_url: &Url) -> Result<[u8; 16], HlsError> {
    let iv_str = iv_hex_str
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    let mut iv_bytes = [0u8; 16];
    hex::decode_to_slice(iv_str, &mut iv_bytes).map_err(|e| HlsError::PlaylistParse {
        url: playlist_url.to_string(),
        message: format!("Failed to parse IV '{iv_hex_str}': {e}"),
    })?;
    Ok(iv_bytes)
}

/// Pick the single key governing a media playlist.
///
/// m3u8-rs attaches `#EXT-X-KEY` to the segment that follows it; any
/// second, different key means per-segment rotation.
fn playlist_key(
    segments: &[m3u8_rs::MediaSegment],
    base: &Url,
    playlist_url: &Url,
) -> Result<Option<EncryptionKey>, HlsError> {
    let mut declared: Vec<&Key> = Vec::new();
    for key in segments.iter().filter_map(|s| s.key.as_ref()) {
        if !declared.contains(&key) {
            declared.push(key);
        }
    }

    let key = match declared.as_slice() {
        [] => return Ok(None),
        [key] => *key,
        _ => {
            return Err(HlsError::KeyRotationUnsupported {
                url: playlist_url.to_string(),
            });
        }
    };

    match &key.method {
        KeyMethod::None => Ok(None),
        KeyMethod::AES128 => {
            let uri = key.uri.as_deref().ok_or_else(|| HlsError::PlaylistParse {
                url: playlist_url.to_string(),
                message: "AES-128 key is missing its URI".to_string(),
            })?;
            let iv = key
                .iv
                .as_deref()
                .map(|iv| parse_iv(iv, playlist_url))
                .transpose()?;
            Ok(Some(EncryptionKey {
                uri: join(base, uri, playlist_url)?,
                iv,
            }))
        }
        other => Err(HlsError::UnsupportedEncryption {
            url: playlist_url.to_string(),
            method: format!("{other:?}"),
        }),
    }
}

/// Resolve an `EXT-X-BYTERANGE`. A missing offset continues where the
/// previous range of the same resource ended.
fn segment_range(
    range: Option<&ByteRange>,
    url: &Url,
    previous: &mut Option<(Url, u64)>,
    playlist_url: &Url,
) -> Result<Option<SegmentRange>, HlsError> {
    let Some(range) = range else {
        return Ok(None);
    };
    let start = match range.offset {
        Some(offset) => offset,
        None => match previous.as_ref() {
            Some((prev_url, end)) if prev_url == url => *end,
            _ => 0,
        },
    };
    let range = SegmentRange::checked(start, range.length, playlist_url)?;
    *previous = Some((url.clone(), range.end()));
    Ok(Some(range))
}

/// Parse a playlist document fetched from `url`.
///
/// Relative URIs are joined against `url`, so callers should pass the URL the
/// document was actually served from.
pub fn parse_playlist(url: &Url, content: &[u8]) -> Result<Playlist, HlsError> {
    let playlist = parse_playlist_res(content).map_err(|e| HlsError::PlaylistParse {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    match playlist {
        m3u8_rs::Playlist::MasterPlaylist(master) => {
            let variants = master
                .variants
                .iter()
                .filter(|v| !v.is_i_frame)
                .map(|v| {
                    Ok(VariantRef {
                        url: join(url, &v.uri, url)?,
                        bandwidth: v.bandwidth,
                    })
                })
                .collect::<Result<Vec<_>, HlsError>>()?;
            Ok(Playlist::Variant(variants))
        }
        m3u8_rs::Playlist::MediaPlaylist(media) => {
            let key = playlist_key(&media.segments, url, url)?;

            let mut segments = Vec::with_capacity(media.segments.len());
            let mut last_map_url: Option<Url> = None;
            let mut previous_range: Option<(Url, u64)> = None;
            for (position, segment) in media.segments.iter().enumerate() {
                let sequence = media.media_sequence + position as u64;

                if let Some(map) = &segment.map {
                    let map_url = join(url, &map.uri, url)?;
                    if last_map_url.as_ref() != Some(&map_url) {
                        trace!("Init section {map_url} before segment {sequence}");
                        let range = map
                            .byte_range
                            .as_ref()
                            .map(|r| SegmentRange::checked(r.offset.unwrap_or(0), r.length, url))
                            .transpose()?;
                        segments.push(SegmentRef {
                            index: segments.len(),
                            sequence,
                            url: map_url.clone(),
                            range,
                            is_init: true,
                        });
                        last_map_url = Some(map_url);
                    }
                }

                let segment_url = join(url, &segment.uri, url)?;
                let range = segment_range(
                    segment.byte_range.as_ref(),
                    &segment_url,
                    &mut previous_range,
                    url,
                )?;
                segments.push(SegmentRef {
                    index: segments.len(),
                    sequence,
                    url: segment_url,
                    range,
                    is_init: false,
                });
            }

            Ok(Playlist::Media(MediaPlaylist {
                url: url.clone(),
                media_sequence: media.media_sequence,
                segments,
                key,
            }))
        }
    }
}

/// Turns one root playlist URL into an ordered, flat list of media playlists.
#[derive(Debug, Clone)]
pub struct PlaylistResolver {
    transport: ResilientTransport,
    max_depth: usize,
}

impl PlaylistResolver {
    pub fn new(transport: ResilientTransport, max_depth: usize) -> Self {
        Self {
            transport,
            max_depth,
        }
    }

    /// Fetch and parse a single playlist document.
    pub async fn fetch(&self, url: &Url) -> Result<Playlist, HlsError> {
        let outcome = self.transport.get(url.as_str()).await?.error_for_status()?;
        debug!(
            url = %outcome.final_url,
            bytes = outcome.body.len(),
            "Fetched playlist"
        );
        parse_playlist(&outcome.final_url, &outcome.body)
    }

    /// Resolve `url` depth-first, left to right.
    ///
    /// Variant entries are replaced by whatever they resolve to, in document
    /// order; media playlists are emitted as they are reached.
    pub async fn resolve(&self, url: &str) -> Result<Vec<MediaPlaylist>, HlsError> {
        let root = Url::parse(url).map_err(|e| HlsError::PlaylistParse {
            url: url.to_string(),
            message: format!("Invalid playlist URL: {e}"),
        })?;

        let mut resolved = Vec::new();
        // Explicit stack instead of recursion; children are pushed in reverse
        // so the first sub-playlist is popped first.
        let mut pending: Vec<(Url, usize)> = vec![(root, 0)];

        while let Some((playlist_url, depth)) = pending.pop() {
            if depth > self.max_depth {
                return Err(HlsError::PlaylistTooDeep {
                    url: playlist_url.to_string(),
                    depth: self.max_depth,
                });
            }

            match self.fetch(&playlist_url).await? {
                Playlist::Variant(variants) => {
                    debug!(
                        url = %playlist_url,
                        variants = variants.len(),
                        depth,
                        "Expanding variant playlist"
                    );
                    pending.extend(variants.into_iter().rev().map(|v| (v.url, depth + 1)));
                }
                Playlist::Media(media) => {
                    debug!(
                        url = %media.url,
                        segments = media.segments.len(),
                        encrypted = media.is_encrypted(),
                        "Resolved media playlist"
                    );
                    resolved.push(media);
                }
            }
        }

        if resolved.is_empty() {
            return Err(HlsError::EmptyResolution {
                url: url.to_string(),
            });
        }

        info!(url, playlists = resolved.len(), "Playlist resolution complete");
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://vod.example.com/news/abc/index.m3u8").unwrap()
    }

    #[test]
    fn test_parse_variant_joins_relative_uris() {
        let doc = b"#EXTM3U\n\
#EXT-X-STREAM-INF:BANDWIDTH=64000\n\
audio/low.m3u8\n\
#EXT-X-I-FRAME-STREAM-INF:BANDWIDTH=10000,URI=\"iframe.m3u8\"\n\
#EXT-X-STREAM-INF:BANDWIDTH=128000\n\
https://cdn.example.com/high.m3u8\n";

        let Playlist::Variant(variants) = parse_playlist(&base(), doc).unwrap() else {
            panic!("expected variant playlist");
        };
        let urls: Vec<_> = variants.iter().map(|v| v.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://vod.example.com/news/abc/audio/low.m3u8",
                "https://cdn.example.com/high.m3u8",
            ]
        );
        assert_eq!(variants[0].bandwidth, 64000);
    }

    #[test]
    fn test_parse_media_with_key() {
        let doc = b"#EXTM3U\n\
#EXT-X-TARGETDURATION:10\n\
#EXT-X-MEDIA-SEQUENCE:7\n\
#EXT-X-KEY:METHOD=AES-128,URI=\"../keys/k.bin\",IV=0x000102030405060708090a0b0c0d0e0f\n\
#EXTINF:10.0,\n\
seg0.ts\n\
#EXTINF:10.0,\n\
seg1.ts\n\
#EXT-X-ENDLIST\n";

        let Playlist::Media(media) = parse_playlist(&base(), doc).unwrap() else {
            panic!("expected media playlist");
        };
        assert_eq!(media.media_sequence, 7);
        assert_eq!(media.segments.len(), 2);
        assert_eq!(media.segments[1].index, 1);
        assert_eq!(media.segments[1].sequence, 8);
        assert_eq!(
            media.segments[0].url.as_str(),
            "https://vod.example.com/news/abc/seg0.ts"
        );

        let key = media.key.unwrap();
        assert_eq!(key.uri.as_str(), "https://vod.example.com/news/keys/k.bin");
        assert_eq!(key.iv.unwrap()[15], 0x0f);
    }

    #[test]
    fn test_parse_rejects_key_rotation() {
        let doc = b"#EXTM3U\n\
#EXT-X-TARGETDURATION:10\n\
#EXT-X-KEY:METHOD=AES-128,URI=\"k1.bin\"\n\
#EXTINF:10.0,\n\
seg0.ts\n\
#EXT-X-KEY:METHOD=AES-128,URI=\"k2.bin\"\n\
#EXTINF:10.0,\n\
seg1.ts\n";

        let err = parse_playlist(&base(), doc).unwrap_err();
        assert!(matches!(err, HlsError::KeyRotationUnsupported { .. }));
    }

    #[test]
    fn test_parse_rejects_sample_aes() {
        let doc = b"#EXTM3U\n\
#EXT-X-TARGETDURATION:10\n\
#EXT-X-KEY:METHOD=SAMPLE-AES,URI=\"k.bin\"\n\
#EXTINF:10.0,\n\
seg0.ts\n";

        let err = parse_playlist(&base(), doc).unwrap_err();
        assert!(matches!(err, HlsError::UnsupportedEncryption { .. }));
    }

    #[test]
    fn test_parse_inserts_init_section_once() {
        let doc = b"#EXTM3U\n\
#EXT-X-TARGETDURATION:6\n\
#EXT-X-MAP:URI=\"init.mp4\"\n\
#EXTINF:6.0,\n\
seg0.m4s\n\
#EXTINF:6.0,\n\
seg1.m4s\n";

        let Playlist::Media(media) = parse_playlist(&base(), doc).unwrap() else {
            panic!("expected media playlist");
        };
        let names: Vec<_> = media
            .segments
            .iter()
            .map(|s| s.url.path_segments().unwrap().next_back().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["init.mp4", "seg0.m4s", "seg1.m4s"]);
        assert!(media.segments[0].is_init);
        assert_eq!(media.segments[2].index, 2);
    }

    #[test]
    fn test_byte_ranges_continue_from_previous() {
        let doc = b"#EXTM3U\n\
#EXT-X-TARGETDURATION:10\n\
#EXTINF:10.0,\n\
#EXT-X-BYTERANGE:100@0\n\
all.ts\n\
#EXTINF:10.0,\n\
#EXT-X-BYTERANGE:50\n\
all.ts\n";

        let Playlist::Media(media) = parse_playlist(&base(), doc).unwrap() else {
            panic!("expected media playlist");
        };
        assert_eq!(media.segments[0].range.unwrap().header_value(), "bytes=0-99");
        assert_eq!(media.segments[1].range.unwrap().header_value(), "bytes=100-149");
    }

    #[test]
    fn test_overflowing_byte_range_is_parse_error() {
        let doc = b"#EXTM3U\n\
#EXT-X-TARGETDURATION:10\n\
#EXTINF:10.0,\n\
#EXT-X-BYTERANGE:18446744073709551615@10\n\
all.ts\n";

        let err = parse_playlist(&base(), doc).unwrap_err();
        assert!(matches!(err, HlsError::PlaylistParse { .. }), "{err:?}");
    }

    #[test]
    fn test_continued_byte_range_past_u64_is_parse_error() {
        let doc = b"#EXTM3U\n\
#EXT-X-TARGETDURATION:10\n\
#EXTINF:10.0,\n\
#EXT-X-BYTERANGE:18446744073709551610@0\n\
all.ts\n\
#EXTINF:10.0,\n\
#EXT-X-BYTERANGE:10\n\
all.ts\n";

        let err = parse_playlist(&base(), doc).unwrap_err();
        assert!(matches!(err, HlsError::PlaylistParse { .. }), "{err:?}");
    }

    #[test]
    fn test_parse_garbage_is_parse_error() {
        let err = parse_playlist(&base(), b"<html>not found</html>").unwrap_err();
        assert!(matches!(err, HlsError::PlaylistParse { .. }));
    }
}
