//! Source fetching.
//!
//! - [`Fetcher`] - one HTTP retrieval per source, pluggable for tests
//! - [`HttpFetcher`] - the reqwest-backed implementation
//! - [`AcceptancePolicy`] - which fetched files may enter an archive
//! - [`dispatch`] - concurrent fan-out over many sources

use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

use crate::config::FetchConfig;
use crate::error::{Error, FetchError, Result};
use crate::types::{FetchedFile, SourceFailure};
use crate::utils::{extract_filename, resolve_mime};

pub mod dispatch;

pub use dispatch::{FanOut, dispatch};


/// Retrieves a single source.
///
/// Implementations must not special-case HTTP status codes: any response that was
/// received in full is returned, and the caller decides whether to accept it.
/// Dropping the returned future abandons the request.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch one source and derive its entry name and MIME type
    async fn fetch(&self, source: &str) -> std::result::Result<FetchedFile, FetchError>;
}

/// [`Fetcher`] backed by a shared reqwest client
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Build a fetcher from the outbound HTTP configuration
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to create HTTP client: {}", e),
                key: Some("fetch".to_string()),
            })?;

        Ok(Self {
            client,
            timeout: config.timeout,
        })
    }

    fn classify(&self, url: &str, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            tracing::debug!(source = url, timeout_secs = self.timeout.as_secs(), "fetch timed out");
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if e.is_connect() {
            FetchError::Connect {
                url: url.to_string(),
                reason: e.to_string(),
            }
        } else {
            FetchError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, source: &str) -> std::result::Result<FetchedFile, FetchError> {
        let url = Url::parse(source).map_err(|e| FetchError::InvalidUrl {
            url: source.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl {
                url: source.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(source, e))?;

        let status = response.status().as_u16();
        // Redirects may change the path the name and extension come from
        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let content = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: source.to_string(),
                }
            } else {
                FetchError::Body {
                    url: source.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let name = extract_filename(&headers, &final_url);
        let mime = resolve_mime(&headers, &final_url, &content);

        tracing::debug!(
            source,
            status,
            name = %name,
            mime = %mime,
            bytes = content.len(),
            "fetched source"
        );

        Ok(FetchedFile {
            source: source.to_string(),
            name,
            content: content.to_vec(),
            mime,
            status,
        })
    }
}

/// Decides which fetched files may be archived.
///
/// A file is accepted when the server answered with a 2xx status and its MIME type
/// is in the allow-list.
#[derive(Clone, Debug)]
pub struct AcceptancePolicy {
    allowed_mimes: HashSet<String>,
}

impl AcceptancePolicy {
    /// Create a policy from an allow-list of MIME types (matched case-insensitively)
    pub fn new<I, S>(allowed_mimes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_mimes: allowed_mimes
                .into_iter()
                .map(|m| m.as_ref().trim().to_ascii_lowercase())
                .collect(),
        }
    }

    /// Whether a MIME type is on the allow-list
    pub fn allows_mime(&self, mime: &str) -> bool {
        self.allowed_mimes.contains(&mime.to_ascii_lowercase())
    }

    /// Accept the file or explain why it was rejected
    pub fn check(&self, file: &FetchedFile) -> std::result::Result<(), SourceFailure> {
        if !(200..300).contains(&file.status) {
            return Err(SourceFailure::HttpStatus(file.status));
        }
        if !self.allows_mime(&file.mime) {
            return Err(SourceFailure::ForbiddenMime(file.mime.clone()));
        }
        Ok(())
    }
}
