//! Network access.

use async_trait::async_trait;
use thiserror::Error;

/// A failed fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fetch {url} error: {message}")]
pub struct FetchError {
    /// Requested URL.
    pub url: String,
    /// Failure reason.
    pub message: String,
}

impl FetchError {
    /// Create a fetch error.
    pub fn new(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            message: message.into(),
        }
    }
}

/// A `fetch`-compatible capability returning the response body as text.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch `url` and return its body.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

#[cfg(feature = "http")]
pub use http::HttpFetcher;

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use async_trait::async_trait;
    use tracing::debug;

    use super::{Fetch, FetchError};

    /// [`Fetch`] over HTTP(S) using `reqwest`.
    #[derive(Debug, Clone)]
    pub struct HttpFetcher {
        client: reqwest::Client,
    }

    impl HttpFetcher {
        /// Create a fetcher with a request timeout.
        ///
        /// # Errors
        ///
        /// Returns an error if the TLS backend cannot be initialised.
        pub fn new(timeout: Duration) -> Result<Self, FetchError> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| FetchError::new("", e.to_string()))?;
            Ok(Self { client })
        }
    }

    #[async_trait]
    impl Fetch for HttpFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            debug!(url, "Fetching");
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| FetchError::new(url, e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::new(url, format!("HTTP {status}")));
            }
            response
                .text()
                .await
                .map_err(|e| FetchError::new(url, e.to_string()))
        }
    }
}
