use std::time::Duration;

use crate::TransportConfig;

/// Maximum variant nesting followed before giving up on a playlist tree.
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// How the initialization vector for AES-128-CBC is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum IvPolicy {
    /// All-zero IV for every segment. This is what the broadcaster's
    /// content has been observed to use.
    #[default]
    Zero,
    /// `IV=` attribute from `#EXT-X-KEY`, else the segment's media sequence
    /// number as a big-endian 128-bit integer.
    Playlist,
}

// --- Top-Level Configuration ---
#[derive(Debug, Clone)]
pub struct HlsConfig {
    /// Transport configuration shared by playlist, key and segment fetches
    pub transport: TransportConfig,
    /// Maximum variant nesting depth
    pub max_depth: usize,
    /// Segments fetched ahead of assembly. 1 means strictly sequential.
    pub segment_concurrency: usize,
    pub iv_policy: IvPolicy,
}

impl Default for HlsConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            segment_concurrency: 1,
            iv_policy: IvPolicy::default(),
        }
    }
}

impl HlsConfig {
    pub fn builder() -> HlsConfigBuilder {
        HlsConfigBuilder::new()
    }
}

/// Fluent builder for [`HlsConfig`]
#[derive(Debug, Clone, Default)]
pub struct HlsConfigBuilder {
    config: HlsConfig,
}

impl HlsConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: HlsConfig::default(),
        }
    }

    pub fn with_transport_config(mut self, transport: TransportConfig) -> Self {
        self.config.transport = transport;
        self
    }

    // --- Transport shortcuts ---

    /// Set the per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.transport.timeout = timeout;
        self
    }

    /// Set the delay between retries
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.transport.retry_delay = delay;
        self
    }

    /// Set the number of retries after the first attempt
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.transport.max_retries = max_retries;
        self
    }

    // --- HLS-specific ---

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    /// Set how many segments may be in flight at once. Zero is treated as one.
    pub fn segment_concurrency(mut self, concurrency: usize) -> Self {
        self.config.segment_concurrency = concurrency.max(1);
        self
    }

    pub fn iv_policy(mut self, policy: IvPolicy) -> Self {
        self.config.iv_policy = policy;
        self
    }

    pub fn build(self) -> HlsConfig {
        self.config
    }
}
