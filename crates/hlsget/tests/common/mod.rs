//! Local HTTP fixtures shared by the integration tests.

#![allow(dead_code)]

use std::time::Duration;

use axum::Router;
use axum::routing::{MethodRouter, get};
use hlsget_engine::{HlsConfig, HlsDownloader, TransportConfig};
use tokio::net::TcpListener;

/// axum server bound to a random localhost port, stopped on drop.
pub struct TestServer {
    base_url: String,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn new(router: Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("test listener address");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let server = axum::serve(listener, router).with_graceful_shutdown(async {
            shutdown_rx.await.ok();
        });
        tokio::spawn(async move {
            server.await.expect("run test server");
        });

        Self {
            base_url: format!("http://{addr}"),
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Absolute URL for `path`. Placeholders like `{id}` are kept verbatim.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Route answering every GET with `body`.
pub fn body(body: impl Into<Vec<u8>>) -> MethodRouter {
    let body: Vec<u8> = body.into();
    get(move || {
        let body = body.clone();
        async move { body }
    })
}

/// Route answering with `body` after `delay`.
pub fn delayed(body: impl Into<Vec<u8>>, delay: Duration) -> MethodRouter {
    let body: Vec<u8> = body.into();
    get(move || {
        let body = body.clone();
        async move {
            tokio::time::sleep(delay).await;
            body
        }
    })
}

/// VOD media playlist listing `segments` in order.
pub fn media_playlist(segments: &[&str]) -> String {
    media_playlist_with(&[], segments)
}

/// VOD media playlist with extra header tags (e.g. `#EXT-X-KEY`).
pub fn media_playlist_with(tags: &[&str], segments: &[&str]) -> String {
    let mut doc = String::from("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:10\n#EXT-X-MEDIA-SEQUENCE:0\n");
    for tag in tags {
        doc.push_str(tag);
        doc.push('\n');
    }
    for segment in segments {
        doc.push_str("#EXTINF:10.0,\n");
        doc.push_str(segment);
        doc.push('\n');
    }
    doc.push_str("#EXT-X-ENDLIST\n");
    doc
}

/// Variant playlist listing `variants` in order.
pub fn variant_playlist(variants: &[&str]) -> String {
    let mut doc = String::from("#EXTM3U\n");
    for (i, variant) in variants.iter().enumerate() {
        doc.push_str(&format!("#EXT-X-STREAM-INF:BANDWIDTH={}\n", 64_000 * (i + 1)));
        doc.push_str(variant);
        doc.push('\n');
    }
    doc
}

/// Transport settings that keep failing tests fast and off any system proxy.
pub fn transport_config() -> TransportConfig {
    TransportConfig::builder()
        .with_timeout(Duration::from_secs(5))
        .with_retry_delay(Duration::ZERO)
        .with_max_retries(2)
        .with_system_proxy(false)
        .build()
}

pub fn downloader(concurrency: usize) -> HlsDownloader {
    let config = HlsConfig::builder()
        .with_transport_config(transport_config())
        .segment_concurrency(concurrency)
        .build();
    HlsDownloader::new(config).expect("build downloader")
}
