use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:122.0) Gecko/20100101 Firefox/122.0";

/// Default delay between two attempts of the same request
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 100;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);

/// Configurable options for the resilient transport
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Timeout for a single HTTP attempt, body included
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// Fixed delay slept between attempts
    pub retry_delay: Duration,

    /// Number of retries after the first attempt
    pub max_retries: u32,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Headers applied to every request unless overridden per call
    pub headers: HeaderMap,

    /// Whether to use system proxy settings if available
    pub use_system_proxy: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: Duration::from_secs(30),
            retry_delay: DEFAULT_RETRY_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: TransportConfig::get_default_headers(),
            use_system_proxy: true,
        }
    }
}

impl TransportConfig {
    pub fn builder() -> crate::builder::TransportConfigBuilder {
        crate::builder::TransportConfigBuilder::new()
    }

    /// Merge `config` on top of the default headers.
    ///
    /// Custom headers take precedence over defaults for the same fields.
    pub fn with_config(config: TransportConfig) -> Self {
        let mut headers = TransportConfig::get_default_headers();
        for (name, value) in config.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }

        Self { headers, ..config }
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::ACCEPT_ENCODING,
            HeaderValue::from_static("gzip, deflate, br"),
        );

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );

        default_headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));

        default_headers
    }
}
