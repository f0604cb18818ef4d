mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::http::HeaderMap;
use axum::response::Redirect;
use axum::routing::get;
use hlsget_engine::{RequestOptions, ResilientTransport, TransportConfig, TransportError};
use reqwest::Method;
use reqwest::header::{HeaderValue, REFERER};

use common::TestServer;

/// Route echoing the request's `Referer` header as the body.
fn echo_referer() -> Router {
    Router::new().route(
        "/echo",
        get(|headers: HeaderMap| async move {
            headers
                .get(REFERER)
                .map(|v| v.as_bytes().to_vec())
                .unwrap_or_default()
        }),
    )
}

#[tokio::test]
async fn test_redirect_loop_fails_after_one_attempt() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let router = Router::new().route(
        "/loop",
        get(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Redirect::temporary("/loop")
            }
        }),
    );
    let server = TestServer::new(router).await;

    let config = TransportConfig::builder()
        .with_retry_delay(Duration::ZERO)
        .with_max_retries(3)
        .with_system_proxy(false)
        .build();
    let transport = ResilientTransport::new(config).unwrap();

    let err = transport.get(&server.url("/loop")).await.unwrap_err();

    assert!(matches!(err, TransportError::Request { .. }), "{err:?}");
    assert!(!err.is_transient());
    // One attempt: the initial response plus the ten redirects followed.
    assert_eq!(hits.load(Ordering::SeqCst), 11);
}

#[tokio::test]
async fn test_default_headers_reach_server_and_can_be_overridden() {
    let server = TestServer::new(echo_referer()).await;
    let config = TransportConfig::builder()
        .with_header("Referer", "https://www3.nhk.or.jp/news/easy/")
        .with_retry_delay(Duration::ZERO)
        .with_max_retries(0)
        .with_system_proxy(false)
        .build();
    let transport = ResilientTransport::new(config).unwrap();

    let body = transport.get_bytes(&server.url("/echo")).await.unwrap();
    assert_eq!(&body[..], b"https://www3.nhk.or.jp/news/easy/");

    let mut options = RequestOptions::default();
    options
        .headers
        .insert(REFERER, HeaderValue::from_static("https://example.com/other"));
    let outcome = transport
        .request(Method::GET, &server.url("/echo"), options)
        .await
        .unwrap()
        .error_for_status()
        .unwrap();
    assert_eq!(&outcome.body[..], b"https://example.com/other");

    // The override applies to that call only.
    let body = transport.get_bytes(&server.url("/echo")).await.unwrap();
    assert_eq!(&body[..], b"https://www3.nhk.or.jp/news/easy/");
}
