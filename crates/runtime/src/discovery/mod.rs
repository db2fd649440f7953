//! Device discovery against the proxy's `/json` endpoint.
//!
//! Right after spawn the proxy is usually not listening yet, so failed
//! requests are retried with exponential backoff until a fixed deadline.
//! Only transport failures are retried; a body that does not parse is final.
//!
//! The returned list keeps the proxy's order, and its first element is the
//! default target when no device is requested by name.

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use iosdbg_protocol::DeviceDescriptor;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::http::HttpFetcher;

/// Retry budget for discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryConfig {
	/// Total time to keep retrying before giving up.
	pub timeout: Duration,
	/// Delay after the first failed attempt.
	pub initial_backoff: Duration,
	/// Upper bound for a single delay.
	pub max_backoff: Duration,
}

impl Default for DiscoveryConfig {
	fn default() -> Self {
		Self {
			timeout: Duration::from_secs(10),
			initial_backoff: Duration::from_millis(100),
			max_backoff: Duration::from_secs(1),
		}
	}
}

/// URL of the device list served by a proxy on `port`.
pub fn discovery_url(port: u16) -> String {
	format!("http://localhost:{port}/json")
}

/// Parses a discovery response body.
pub fn parse_devices(body: &str) -> Result<Vec<DeviceDescriptor>> {
	serde_json::from_str(body).map_err(|e| Error::Discovery(format!("malformed device list: {e}")))
}

/// Queries a proxy for the devices it can reach.
#[derive(Clone)]
pub struct DiscoveryClient {
	fetcher: Arc<dyn HttpFetcher>,
	config: DiscoveryConfig,
}

impl DiscoveryClient {
	pub fn new(fetcher: Arc<dyn HttpFetcher>, config: DiscoveryConfig) -> Self {
		Self { fetcher, config }
	}

	pub fn config(&self) -> &DiscoveryConfig {
		&self.config
	}

	/// Fetches the device list from the proxy on `proxy_port`.
	///
	/// An empty list is a success. Fails with [`Error::DiscoveryTimeout`] once
	/// the retry budget is spent, [`Error::Discovery`] on a malformed body and
	/// [`Error::Cancelled`] when `cancel` fires.
	pub async fn discover(&self, proxy_port: u16, cancel: &CancellationToken) -> Result<Vec<DeviceDescriptor>> {
		let url = discovery_url(proxy_port);
		let started = Instant::now();
		let deadline = started + self.config.timeout;
		let mut delay = self.config.initial_backoff;
		let mut attempt = 0u32;

		loop {
			attempt += 1;
			let fetched = tokio::select! {
				biased;
				_ = cancel.cancelled() => return Err(Error::Cancelled),
				fetched = tokio::time::timeout_at(deadline, self.fetcher.get_text(&url)) => fetched,
			};

			let Ok(fetched) = fetched else {
				return Err(Error::DiscoveryTimeout {
					port: proxy_port,
					waited_ms: started.elapsed().as_millis() as u64,
					last_error: "request timed out".into(),
				});
			};

			let last_error = match fetched {
				Ok(body) => {
					let devices = parse_devices(&body)?;
					info!(
						target = "iosdbg",
						port = proxy_port,
						attempt,
						devices = devices.len(),
						"device list received"
					);
					return Ok(devices);
				}
				Err(e) if e.is_transient() => e.to_string(),
				Err(e) => return Err(e),
			};

			let now = Instant::now();
			if now >= deadline {
				return Err(Error::DiscoveryTimeout {
					port: proxy_port,
					waited_ms: now.duration_since(started).as_millis() as u64,
					last_error,
				});
			}

			let wait = delay.min(deadline - now);
			debug!(
				target = "iosdbg",
				port = proxy_port,
				attempt,
				retry_in_ms = wait.as_millis() as u64,
				error = %last_error,
				"discovery endpoint not ready"
			);

			tokio::select! {
				biased;
				_ = cancel.cancelled() => return Err(Error::Cancelled),
				_ = tokio::time::sleep(wait) => {}
			}

			delay = delay.saturating_mul(2).min(self.config.max_backoff);
		}
	}
}
