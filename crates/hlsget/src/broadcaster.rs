//! # Broadcaster media
//!
//! URL layouts and request headers for the broadcaster's on-demand voice and
//! video streams, and the record kept for each downloaded file.
//!
//! Voice clips are published either as an m4a or an mp4 rendition, under
//! different paths; which one exists is only known by asking. Both layouts
//! are probed in order through [`CandidateSources`].

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, REFERER};
use serde::Serialize;
use tracing::info;

use crate::hls::HlsDownloader;
use crate::source::{CandidateSource, CandidateSources};
use crate::{DownloadError, TransportConfig};

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:122.0) Gecko/20100101 Firefox/122.0";
const BROWSER_ACCEPT: &str = "application/json, text/javascript, */*; q=0.01";
const REFERER_URL: &str = "https://www3.nhk.or.jp/news/easy/";

/// Rendition a voice clip may be published as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum VoiceFormat {
    M4a,
    Mp4,
}

impl VoiceFormat {
    pub fn label(&self) -> &'static str {
        match self {
            VoiceFormat::M4a => "m4a",
            VoiceFormat::Mp4 => "mp4",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Voice,
    Video,
}

/// URL templates, each with an `{id}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub voice_m4a: String,
    pub voice_mp4: String,
    pub video: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            voice_m4a: "https://vod-stream.nhk.jp/news/easy_audio/{id}/index.m3u8".to_string(),
            voice_mp4: "https://vod-stream.nhk.jp/news/easy/{id}/index.m3u8".to_string(),
            video: "https://vod-stream.nhk.jp/news/{id}/index.m3u8".to_string(),
        }
    }
}

impl Endpoints {
    /// Voice candidates, m4a first. `format` narrows the list to one.
    pub fn voice_sources(&self, format: Option<VoiceFormat>) -> CandidateSources {
        let sources = CandidateSources::new()
            .with_source(CandidateSource::new(
                VoiceFormat::M4a.label(),
                &self.voice_m4a,
                0,
            ))
            .with_source(CandidateSource::new(
                VoiceFormat::Mp4.label(),
                &self.voice_mp4,
                1,
            ));
        match format {
            Some(format) => sources.only(format.label()),
            None => sources,
        }
    }

    pub fn video_sources(&self) -> CandidateSources {
        CandidateSources::new().with_source(CandidateSource::new("video", &self.video, 0))
    }
}

/// Headers the broadcaster's CDN expects from a browser.
pub fn browser_headers() -> HeaderMap {
    let mut headers = TransportConfig::get_default_headers();
    headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
    headers.insert(REFERER, HeaderValue::from_static(REFERER_URL));
    headers
}

/// Transport defaults for talking to the broadcaster.
pub fn transport_config() -> TransportConfig {
    TransportConfig::builder()
        .with_user_agent(BROWSER_USER_AGENT)
        .with_headers(browser_headers())
        .build()
}

/// Media identifier from a published file name, e.g. `k1001_abc.m4a` -> `k1001_abc`.
pub fn media_id_from_uri(uri: &str) -> &str {
    uri.split('.').next().unwrap_or(uri)
}

/// What was downloaded, from where, and where it was written.
#[derive(Debug, Clone, Serialize)]
pub struct MediaRecord {
    pub kind: MediaKind,
    pub status: u16,
    pub id: String,
    pub url: String,
    pub format: Option<VoiceFormat>,
    pub download_time: DateTime<Local>,
    pub location: PathBuf,
}

impl MediaRecord {
    pub fn to_json(&self) -> Result<String, DownloadError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Downloads voice and video clips by identifier.
pub struct BroadcasterClient {
    downloader: HlsDownloader,
    endpoints: Endpoints,
}

impl BroadcasterClient {
    pub fn new(downloader: HlsDownloader) -> Self {
        Self::with_endpoints(downloader, Endpoints::default())
    }

    pub fn with_endpoints(downloader: HlsDownloader, endpoints: Endpoints) -> Self {
        Self {
            downloader,
            endpoints,
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Find the published rendition of `voice_id` and save it as
    /// `{voice_dir}/{voice_id}.mp3`.
    pub async fn download_voice(
        &self,
        voice_id: &str,
        voice_dir: &Path,
        format: Option<VoiceFormat>,
    ) -> Result<MediaRecord, DownloadError> {
        let sources = self.endpoints.voice_sources(format);
        let found = sources.probe(self.downloader.transport(), voice_id).await?;
        let format = match found.source.label.as_str() {
            "m4a" => Some(VoiceFormat::M4a),
            "mp4" => Some(VoiceFormat::Mp4),
            _ => None,
        };

        let path = voice_dir.join(format!("{voice_id}.mp3"));
        self.downloader.save(found.url(), &path).await?;
        info!(voice_id, format = ?format, path = %path.display(), "Voice downloaded");

        Ok(MediaRecord {
            kind: MediaKind::Voice,
            status: found.outcome.status.as_u16(),
            id: voice_id.to_string(),
            url: found.url().to_string(),
            format,
            download_time: Local::now(),
            location: path,
        })
    }

    /// Save the video stream of `video_id` as `{video_dir}/{video_id}.mp4`.
    pub async fn download_video(
        &self,
        video_id: &str,
        video_dir: &Path,
    ) -> Result<MediaRecord, DownloadError> {
        let found = self
            .endpoints
            .video_sources()
            .probe(self.downloader.transport(), video_id)
            .await?;

        let path = video_dir.join(format!("{video_id}.mp4"));
        self.downloader.save(found.url(), &path).await?;
        info!(video_id, path = %path.display(), "Video downloaded");

        Ok(MediaRecord {
            kind: MediaKind::Video,
            status: found.outcome.status.as_u16(),
            id: video_id.to_string(),
            url: found.url().to_string(),
            format: None,
            download_time: Local::now(),
            location: path,
        })
    }
}
