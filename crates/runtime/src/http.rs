//! Plain HTTP GET used for discovery endpoints.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Per-request timeout for [`ReqwestFetcher`].
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Fetches a URL body as text.
///
/// Implementations report refused connections and non-success statuses as
/// [`Error::Http`] so callers can retry them.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
	async fn get_text(&self, url: &str) -> Result<String>;
}

/// [`HttpFetcher`] over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
	client: reqwest::Client,
}

impl ReqwestFetcher {
	pub fn new() -> Result<Self> {
		Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
	}

	pub fn with_timeout(timeout: Duration) -> Result<Self> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.no_proxy()
			.build()
			.map_err(|e| Error::Http {
				url: String::new(),
				message: format!("failed to create HTTP client: {e}"),
			})?;
		Ok(Self { client })
	}
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
	async fn get_text(&self, url: &str) -> Result<String> {
		let http_err = |message: String| Error::Http {
			url: url.to_string(),
			message,
		};

		let response = self.client.get(url).send().await.map_err(|e| http_err(e.to_string()))?;
		let status = response.status();
		if !status.is_success() {
			return Err(http_err(format!("unexpected status {status}")));
		}
		response.text().await.map_err(|e| http_err(e.to_string()))
	}
}
