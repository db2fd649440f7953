//! Bounded tunnel negotiation for launch runs.

use std::time::Duration;

use iosdbg_protocol::{TunnelInfo, TunnelOptions};
use iosdbg_runtime::{Error as RuntimeError, Tunnel, TunnelEvent, TunnelProvider};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Default bound on opening a tunnel.
pub const DEFAULT_TUNNEL_TIMEOUT: Duration = Duration::from_secs(30);

/// A tunnel opened for one launch run.
pub struct TunnelHandle {
	tunnel: Box<dyn Tunnel>,
}

impl TunnelHandle {
	pub fn info(&self) -> &TunnelInfo {
		self.tunnel.info()
	}

	pub fn url(&self) -> &str {
		&self.tunnel.info().url
	}

	pub fn close(&self) {
		self.tunnel.close();
	}
}

impl std::fmt::Debug for TunnelHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TunnelHandle").field("url", &self.url()).finish()
	}
}

/// Opens a tunnel to `local_port`, giving up after `timeout`.
///
/// A listener task logs the tunnel's events for as long as it stays open.
pub async fn negotiate(
	provider: &dyn TunnelProvider,
	local_port: u16,
	options: &TunnelOptions,
	timeout: Duration,
	cancel: &CancellationToken,
) -> Result<TunnelHandle> {
	let opened = tokio::select! {
		biased;
		_ = cancel.cancelled() => return Err(Error::Cancelled),
		opened = tokio::time::timeout(timeout, provider.open(local_port, options)) => opened,
	};

	let tunnel = match opened {
		Ok(tunnel) => tunnel?,
		Err(_) => {
			return Err(RuntimeError::Tunnel(format!(
				"no tunnel for port {local_port} after {}ms",
				timeout.as_millis()
			))
			.into());
		}
	};

	spawn_listener(tunnel.as_ref());
	info!(target = "iosdbg", url = %tunnel.info().url, local_port, "tunnel ready");
	Ok(TunnelHandle { tunnel })
}

fn spawn_listener(tunnel: &dyn Tunnel) {
	let mut events = tunnel.subscribe();
	let url = tunnel.info().url.clone();
	tokio::spawn(async move {
		loop {
			match events.recv().await {
				Ok(TunnelEvent::Error(message)) => warn!(target = "iosdbg", %url, error = %message, "tunnel error"),
				Ok(TunnelEvent::Close) => {
					info!(target = "iosdbg", %url, "tunnel closed");
					break;
				}
				Err(RecvError::Lagged(skipped)) => warn!(target = "iosdbg", %url, skipped, "tunnel events dropped"),
				Err(RecvError::Closed) => break,
			}
		}
	});
}
