// HLS Segment Acquirer: fetches, decrypts and orders the segments of one media playlist.

use bytes::{Bytes, BytesMut};
use futures::{StreamExt, TryStreamExt, stream};
use reqwest::header::{HeaderValue, RANGE};
use reqwest::{Method, StatusCode};
use tracing::{debug, info};

use crate::hls::HlsError;
use crate::hls::config::{HlsConfig, IvPolicy};
use crate::hls::decryption::{KeyFetcher, KeyMaterial, decrypt_segment, segment_iv};
use crate::hls::playlist::{EncryptionKey, MediaPlaylist, SegmentRange, SegmentRef};
use crate::transport::{RequestOptions, ResilientTransport};

/// Key declaration paired with the bytes fetched for it.
type ActiveKey<'a> = (&'a EncryptionKey, KeyMaterial);

pub struct SegmentAcquirer {
    transport: ResilientTransport,
    key_fetcher: KeyFetcher,
    concurrency: usize,
    iv_policy: IvPolicy,
}

impl SegmentAcquirer {
    pub fn new(transport: ResilientTransport, config: &HlsConfig) -> Self {
        Self {
            key_fetcher: KeyFetcher::new(transport.clone()),
            transport,
            concurrency: config.segment_concurrency.max(1),
            iv_policy: config.iv_policy,
        }
    }

    /// Produce the ordered, decrypted byte stream of `playlist`.
    ///
    /// The key, if any, is fetched before the first segment. Up to
    /// `concurrency` segments are in flight, but bytes are appended strictly
    /// in playlist order and the first failure aborts the whole playlist.
    pub async fn acquire(&self, playlist: &MediaPlaylist) -> Result<Bytes, HlsError> {
        let key: Option<ActiveKey<'_>> = match &playlist.key {
            Some(declared) => Some((declared, self.key_fetcher.fetch_key(declared).await?)),
            None => None,
        };

        let mut output = BytesMut::new();
        let mut segments = stream::iter(&playlist.segments)
            .map(|segment| self.fetch_segment(segment, key.as_ref()))
            .buffered(self.concurrency);

        while let Some(data) = segments.try_next().await? {
            output.extend_from_slice(&data);
        }

        info!(
            url = %playlist.url,
            segments = playlist.segments.len(),
            bytes = output.len(),
            "Media playlist acquired"
        );
        Ok(output.freeze())
    }

    async fn fetch_segment(
        &self,
        segment: &SegmentRef,
        key: Option<&ActiveKey<'_>>,
    ) -> Result<Bytes, HlsError> {
        let mut options = RequestOptions::default();
        if let Some(range) = segment.range {
            let value =
                HeaderValue::from_str(&range.header_value()).map_err(|e| HlsError::PlaylistParse {
                    url: segment.url.to_string(),
                    message: format!("Invalid byte range: {e}"),
                })?;
            options.headers.insert(RANGE, value);
        }

        let outcome = self
            .transport
            .request(Method::GET, segment.url.as_str(), options)
            .await?
            .error_for_status()?;
        let data = match segment.range {
            Some(range) => range_window(outcome.status, outcome.body, range, &segment.url)?,
            None => outcome.body,
        };

        debug!(
            index = segment.index,
            url = %segment.url,
            bytes = data.len(),
            init = segment.is_init,
            "Downloaded segment"
        );

        match key {
            Some((declared, material)) => {
                let iv = segment_iv(self.iv_policy, declared, segment.sequence);
                decrypt_segment(&data, material, &iv, &segment.url)
            }
            None => Ok(data),
        }
    }
}

/// Cut the requested window out of a ranged response.
///
/// A `206` carries only the window. Servers that ignore `Range` answer `200`
/// with the whole resource, so the window is sliced out of it.
fn range_window(
    status: StatusCode,
    body: Bytes,
    range: SegmentRange,
    url: &url::Url,
) -> Result<Bytes, HlsError> {
    let (start, end) = if status == StatusCode::PARTIAL_CONTENT {
        (0, range.length)
    } else {
        (range.start, range.end())
    };

    let too_short = || HlsError::ByteRange {
        url: url.to_string(),
        message: format!(
            "{} response has {} bytes, range needs {}",
            status.as_u16(),
            body.len(),
            range.header_value()
        ),
    };
    let start = usize::try_from(start).map_err(|_| too_short())?;
    let end = usize::try_from(end).map_err(|_| too_short())?;
    if end > body.len() {
        return Err(too_short());
    }
    Ok(body.slice(start..end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> url::Url {
        url::Url::parse("https://vod.example.com/all.ts").unwrap()
    }

    #[test]
    fn test_range_window_from_partial_content() {
        let range = SegmentRange { start: 3, length: 3 };
        let data = range_window(
            StatusCode::PARTIAL_CONTENT,
            Bytes::from_static(b"def"),
            range,
            &url(),
        )
        .unwrap();
        assert_eq!(&data[..], b"def");
    }

    #[test]
    fn test_range_window_slices_full_body() {
        let range = SegmentRange { start: 3, length: 3 };
        let data = range_window(StatusCode::OK, Bytes::from_static(b"abcdefgh"), range, &url())
            .unwrap();
        assert_eq!(&data[..], b"def");
    }

    #[test]
    fn test_range_window_short_body_is_error() {
        let range = SegmentRange { start: 4, length: 4 };
        let err = range_window(StatusCode::OK, Bytes::from_static(b"abcdef"), range, &url())
            .unwrap_err();
        assert!(matches!(err, HlsError::ByteRange { .. }), "{err:?}");

        let err = range_window(
            StatusCode::PARTIAL_CONTENT,
            Bytes::from_static(b"ab"),
            range,
            &url(),
        )
        .unwrap_err();
        assert!(matches!(err, HlsError::ByteRange { .. }), "{err:?}");
    }
}
