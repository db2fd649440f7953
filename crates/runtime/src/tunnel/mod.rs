//! Public tunnels over a localtunnel-compatible server.
//!
//! Opening a tunnel is a two-step exchange: an HTTP request asks the server
//! for an assignment (public URL, remote TCP port, connection budget), then
//! the client dials that remote port `max_conn_count` times. The server
//! forwards public requests over those idle connections, and each worker
//! pipes its connection to the local port, redialing when the server closes
//! it.


use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use iosdbg_protocol::{TunnelAssignment, TunnelInfo, TunnelOptions};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Cap on the delay between redial attempts of one worker.
const MAX_REDIAL_DELAY: Duration = Duration::from_secs(5);

/// Lifecycle notifications from an open tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunnelEvent {
	/// A worker failed to reach the remote or local side. The tunnel keeps
	/// retrying.
	Error(String),
	/// The tunnel was closed and will not forward further traffic.
	Close,
}

/// An open tunnel.
pub trait Tunnel: Send + Sync {
	fn info(&self) -> &TunnelInfo;

	/// Subscribes to lifecycle events. The first subscriber also receives
	/// events sent since the tunnel opened.
	fn subscribe(&self) -> broadcast::Receiver<TunnelEvent>;

	/// Stops forwarding and emits [`TunnelEvent::Close`]. Idempotent.
	fn close(&self);
}

/// Opens tunnels to a local port.
#[async_trait]
pub trait TunnelProvider: Send + Sync {
	async fn open(&self, local_port: u16, options: &TunnelOptions) -> Result<Box<dyn Tunnel>>;
}

/// [`TunnelProvider`] speaking the localtunnel client protocol.
#[derive(Debug, Clone)]
pub struct LocalTunnelProvider {
	client: reqwest::Client,
}

impl LocalTunnelProvider {
	pub fn new() -> Result<Self> {
		let client = reqwest::Client::builder()
			.timeout(Duration::from_secs(15))
			.build()
			.map_err(|e| Error::Tunnel(format!("failed to create HTTP client: {e}")))?;
		Ok(Self { client })
	}

	async fn request_assignment(&self, options: &TunnelOptions) -> Result<TunnelAssignment> {
		let url = assignment_url(options);
		debug!(target = "iosdbg", %url, "requesting tunnel assignment");

		let response = self
			.client
			.get(&url)
			.send()
			.await
			.map_err(|e| Error::Tunnel(format!("tunnel server {url} unreachable: {e}")))?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(Error::Tunnel(format!("tunnel server returned {status}: {body}")));
		}

		response
			.json::<TunnelAssignment>()
			.await
			.map_err(|e| Error::Tunnel(format!("invalid tunnel assignment: {e}")))
	}
}

/// Endpoint that hands out a new assignment: `<host>/?new` or `<host>/<subdomain>`.
pub fn assignment_url(options: &TunnelOptions) -> String {
	let base = options.host().trim_end_matches('/');
	match options.subdomain.as_deref().filter(|s| !s.is_empty()) {
		Some(subdomain) => format!("{base}/{subdomain}"),
		None => format!("{base}/?new"),
	}
}

/// Host the workers dial: the assignment's `ip`, else the server host.
fn remote_host(assignment: &TunnelAssignment, options: &TunnelOptions) -> Result<String> {
	if let Some(ip) = assignment.ip.as_deref().filter(|ip| !ip.is_empty()) {
		return Ok(ip.to_string());
	}
	let parsed = url::Url::parse(options.host()).map_err(|e| Error::Tunnel(format!("invalid tunnel host {}: {e}", options.host())))?;
	parsed
		.host_str()
		.map(str::to_string)
		.ok_or_else(|| Error::Tunnel(format!("tunnel host {} has no hostname", options.host())))
}

#[async_trait]
impl TunnelProvider for LocalTunnelProvider {
	async fn open(&self, local_port: u16, options: &TunnelOptions) -> Result<Box<dyn Tunnel>> {
		let assignment = self.request_assignment(options).await?;
		let remote = (remote_host(&assignment, options)?, assignment.port);
		let local = (options.local_host().to_string(), local_port);

		let tunnel = LocalTunnel::new(TunnelInfo {
			url: assignment.url.clone(),
		});

		let workers = assignment.max_conn_count.max(1);
		for worker in 0..workers {
			tokio::spawn(run_worker(
				worker,
				remote.clone(),
				local.clone(),
				tunnel.events.clone(),
				tunnel.shutdown.clone(),
			));
		}

		info!(
			target = "iosdbg",
			url = %assignment.url,
			id = %assignment.id,
			remote = %format!("{}:{}", remote.0, remote.1),
			local_port,
			workers,
			"tunnel open"
		);
		Ok(Box::new(tunnel))
	}
}

/// Tunnel handle returned by [`LocalTunnelProvider`]. Dropping it stops the
/// workers without emitting [`TunnelEvent::Close`].
pub struct LocalTunnel {
	info: TunnelInfo,
	events: broadcast::Sender<TunnelEvent>,
	/// Held from creation so worker events sent before the first subscribe
	/// are buffered.
	first_subscriber: Mutex<Option<broadcast::Receiver<TunnelEvent>>>,
	shutdown: CancellationToken,
	closed: Arc<AtomicBool>,
}

impl LocalTunnel {
	fn new(info: TunnelInfo) -> Self {
		let (events, first) = broadcast::channel(32);
		Self {
			info,
			events,
			first_subscriber: Mutex::new(Some(first)),
			shutdown: CancellationToken::new(),
			closed: Arc::new(AtomicBool::new(false)),
		}
	}
}

impl Tunnel for LocalTunnel {
	fn info(&self) -> &TunnelInfo {
		&self.info
	}

	fn subscribe(&self) -> broadcast::Receiver<TunnelEvent> {
		self.first_subscriber.lock().take().unwrap_or_else(|| self.events.subscribe())
	}

	fn close(&self) {
		if self.closed.swap(true, Ordering::SeqCst) {
			return;
		}
		self.shutdown.cancel();
		let _ = self.events.send(TunnelEvent::Close);
		info!(target = "iosdbg", url = %self.info.url, "tunnel closed");
	}
}

impl Drop for LocalTunnel {
	fn drop(&mut self) {
		self.shutdown.cancel();
	}
}

async fn run_worker(
	worker: usize,
	remote: (String, u16),
	local: (String, u16),
	events: broadcast::Sender<TunnelEvent>,
	shutdown: CancellationToken,
) {
	let mut failures: u32 = 0;

	while !shutdown.is_cancelled() {
		let dialed = tokio::select! {
			_ = shutdown.cancelled() => break,
			dialed = connect_pair(&remote, &local) => dialed,
		};

		match dialed {
			Ok((mut remote_stream, mut local_stream)) => {
				failures = 0;
				tokio::select! {
					_ = shutdown.cancelled() => break,
					piped = tokio::io::copy_bidirectional(&mut remote_stream, &mut local_stream) => {
						match piped {
							Ok((up, down)) => debug!(target = "iosdbg", worker, up, down, "tunnel connection finished"),
							Err(e) => debug!(target = "iosdbg", worker, error = %e, "tunnel connection dropped"),
						}
					}
				}
			}
			Err(message) => {
				failures = failures.saturating_add(1);
				warn!(target = "iosdbg", worker, failures, error = %message, "tunnel worker failed");
				let _ = events.send(TunnelEvent::Error(message));

				let delay = Duration::from_millis(250)
					.saturating_mul(failures)
					.min(MAX_REDIAL_DELAY);
				tokio::select! {
					_ = shutdown.cancelled() => break,
					_ = tokio::time::sleep(delay) => {}
				}
			}
		}
	}

	debug!(target = "iosdbg", worker, "tunnel worker stopped");
}

/// Dials the remote side, then the local side once the remote is up.
async fn connect_pair(remote: &(String, u16), local: &(String, u16)) -> std::result::Result<(TcpStream, TcpStream), String> {
	let remote_stream = TcpStream::connect((remote.0.as_str(), remote.1))
		.await
		.map_err(|e| format!("remote {}:{} unreachable: {e}", remote.0, remote.1))?;
	let local_stream = TcpStream::connect((local.0.as_str(), local.1))
		.await
		.map_err(|e| format!("local {}:{} unreachable: {e}", local.0, local.1))?;
	Ok((remote_stream, local_stream))
}
