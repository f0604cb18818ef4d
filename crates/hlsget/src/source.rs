//! # Candidate Sources
//!
//! Some media is published under one of several URL layouts depending on its
//! encoding. This module keeps an ordered list of URL templates and probes
//! them in priority order, stopping at the first that answers `200 OK`.

use reqwest::StatusCode;
use tracing::debug;

use crate::DownloadError;
use crate::transport::{RequestOutcome, ResilientTransport, TransportError};

/// Placeholder replaced by the media identifier in a template.
pub const ID_PLACEHOLDER: &str = "{id}";

/// A URL template for one publication format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSource {
    /// Human-readable label (e.g. "m4a")
    pub label: String,
    /// URL with an `{id}` placeholder
    pub template: String,
    /// Lower number = tried earlier
    pub priority: u8,
}

impl CandidateSource {
    pub fn new(label: impl Into<String>, template: impl Into<String>, priority: u8) -> Self {
        Self {
            label: label.into(),
            template: template.into(),
            priority,
        }
    }

    pub fn url_for(&self, id: &str) -> String {
        self.template.replace(ID_PLACEHOLDER, id)
    }
}

/// The candidate that answered, with the response it gave.
#[derive(Debug, Clone)]
pub struct SourceMatch {
    pub source: CandidateSource,
    pub outcome: RequestOutcome,
}

impl SourceMatch {
    /// URL the playlist was actually served from.
    pub fn url(&self) -> &str {
        self.outcome.final_url.as_str()
    }
}

/// Ordered list of candidate sources
#[derive(Debug, Clone, Default)]
pub struct CandidateSources {
    sources: Vec<CandidateSource>,
}

impl CandidateSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source, keeping the list sorted by priority. Sources with equal
    /// priority keep insertion order.
    pub fn add_source(&mut self, source: CandidateSource) {
        self.sources.push(source);
        self.sources.sort_by_key(|s| s.priority);
    }

    pub fn with_source(mut self, source: CandidateSource) -> Self {
        self.add_source(source);
        self
    }

    /// Keep only the source with the given label.
    pub fn only(mut self, label: &str) -> Self {
        self.sources.retain(|s| s.label == label);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateSource> {
        self.sources.iter()
    }

    /// Try each candidate for `id` in order.
    ///
    /// A non-200 answer moves on to the next candidate. Running out of
    /// retries on the network is not a "format missing" signal and is
    /// returned as is.
    pub async fn probe(
        &self,
        transport: &ResilientTransport,
        id: &str,
    ) -> Result<SourceMatch, DownloadError> {
        let mut tried = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            let url = source.url_for(id);
            match transport.get(&url).await {
                Ok(outcome) if outcome.status == StatusCode::OK => {
                    debug!(label = %source.label, url = %url, "Candidate source available");
                    return Ok(SourceMatch {
                        source: source.clone(),
                        outcome,
                    });
                }
                Ok(outcome) => {
                    debug!(
                        label = %source.label,
                        url = %url,
                        status = %outcome.status,
                        "Candidate source unavailable"
                    );
                }
                Err(e @ TransportError::Exhausted { .. }) => return Err(e.into()),
                Err(e) => {
                    debug!(label = %source.label, url = %url, error = %e, "Candidate source failed");
                }
            }
            tried.push(url);
        }

        Err(DownloadError::NoFormatAvailable {
            id: id.to_string(),
            tried,
        })
    }
}
