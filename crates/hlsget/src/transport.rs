// Resilient Transport: one logical HTTP request, retried on transient network faults.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode};
use tracing::{debug, trace, warn};
use url::Url;

use crate::TransportConfig;

#[derive(Debug, thiserror::Error, Clone)]
pub enum TransportError {
    #[error("No response from {url} after {attempts} attempts: {source}")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        source: Arc<reqwest::Error>,
    },
    #[error("Server returned status code {status} for {url}")]
    HttpStatus { url: String, status: StatusCode },
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: Arc<reqwest::Error>,
    },
    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl TransportError {
    /// True when the failure came from the network rather than from the content.
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Exhausted { .. })
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            TransportError::HttpStatus { status, .. } => Some(*status),
            TransportError::Request { source, .. } | TransportError::Exhausted { source, .. } => {
                source.status()
            }
            _ => None,
        }
    }
}

/// Per-call overrides. Unset fields fall back to the transport's configuration.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub retry_delay: Option<Duration>,
    pub max_retries: Option<u32>,
    pub timeout: Option<Duration>,
    /// Merged over the client's default headers for this call only
    pub headers: HeaderMap,
    /// Query parameters appended to the URL
    pub params: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }
}

/// Everything a caller may want to inspect about a finished request.
///
/// Returned by value from every call, so a shared transport carries no
/// per-request state.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    /// URL as requested
    pub url: Url,
    /// URL of the final response, after redirects
    pub final_url: Url,
    pub params: Vec<(String, String)>,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Number of attempts made, including the successful one
    pub attempts: u32,
}

impl RequestOutcome {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Turn a non-2xx response into [`TransportError::HttpStatus`].
    pub fn error_for_status(self) -> Result<Self, TransportError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(TransportError::HttpStatus {
                url: self.url.to_string(),
                status: self.status,
            })
        }
    }
}

/// Create a reqwest Client with the provided configuration
pub fn create_client(config: &TransportConfig) -> Result<Client, TransportError> {
    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(5)
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    if !config.use_system_proxy {
        client_builder = client_builder.no_proxy();
        debug!("Proxy disabled");
    }

    client_builder
        .build()
        .map_err(|e| TransportError::Client(e.to_string()))
}

/// Read timeouts and connection-level failures are worth another attempt;
/// builder, redirect and decode errors are not.
fn is_retryable(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
}

/// HTTP client wrapper providing bounded retry-with-delay over a shared
/// connection pool.
#[derive(Debug, Clone)]
pub struct ResilientTransport {
    client: Client,
    config: Arc<TransportConfig>,
}

impl ResilientTransport {
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let client = create_client(&config)?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: TransportConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Perform one logical request.
    ///
    /// Transient failures are retried after a fixed delay until the retry
    /// budget is spent, at which point [`TransportError::Exhausted`] is
    /// returned. Any response, whatever its status, ends the loop.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<RequestOutcome, TransportError> {
        let parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let retry_delay = options.retry_delay.unwrap_or(self.config.retry_delay);
        let max_retries = options.max_retries.unwrap_or(self.config.max_retries);
        let timeout = options.timeout.unwrap_or(self.config.timeout);

        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            let mut builder = self.client.request(method.clone(), parsed.clone());
            if !timeout.is_zero() {
                builder = builder.timeout(timeout);
            }
            if !options.params.is_empty() {
                builder = builder.query(&options.params);
            }
            if !options.headers.is_empty() {
                builder = builder.headers(options.headers.clone());
            }

            match Self::send_once(builder).await {
                Ok((status, headers, final_url, body)) => {
                    trace!(url = %final_url, %status, attempts, "Request completed");
                    return Ok(RequestOutcome {
                        url: parsed,
                        final_url,
                        params: options.params,
                        status,
                        headers,
                        body,
                        attempts,
                    });
                }
                Err(e) if is_retryable(&e) => {
                    if attempts > max_retries {
                        return Err(TransportError::Exhausted {
                            url: parsed.to_string(),
                            attempts,
                            source: Arc::new(e),
                        });
                    }
                    warn!(url = %parsed, attempt = attempts, error = %e, "Transient failure, retrying");
                    tokio::time::sleep(retry_delay).await;
                }
                Err(e) => {
                    return Err(TransportError::Request {
                        url: parsed.to_string(),
                        source: Arc::new(e),
                    });
                }
            }
        }
    }

    async fn send_once(
        builder: reqwest::RequestBuilder,
    ) -> Result<(StatusCode, HeaderMap, Url, Bytes), reqwest::Error> {
        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let final_url = response.url().clone();
        let body = response.bytes().await?;
        Ok((status, headers, final_url, body))
    }

    /// GET with the configured defaults.
    pub async fn get(&self, url: &str) -> Result<RequestOutcome, TransportError> {
        self.request(Method::GET, url, RequestOptions::default())
            .await
    }

    /// GET that requires a 2xx response and yields only the body.
    pub async fn get_bytes(&self, url: &str) -> Result<Bytes, TransportError> {
        Ok(self.get(url).await?.error_for_status()?.body)
    }
}
