//! Error types for the iosdbg runtime.

use std::path::PathBuf;

use thiserror::Error;

use crate::platform::Platform;
use crate::proxy::ProxyExit;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while locating, spawning or talking to the proxy, the tunnel
/// server or a device page.
#[derive(Debug, Error)]
pub enum Error {
	/// No bundled proxy at the platform default location.
	#[error(
		"No iOS proxy was found at {}. Install ios-webkit-debug-proxy and set `proxyExecutable` to its path.",
		path.display()
	)]
	ProxyNotFound { path: PathBuf },

	/// No proxy is bundled for this platform and none was configured.
	#[error(
		"No iOS proxy is bundled for {0}. Install ios-webkit-debug-proxy and set `proxyExecutable` to its path."
	)]
	UnsupportedPlatform(Platform),

	/// The proxy process could not be started.
	#[error("Failed to spawn proxy {}: {source}", path.display())]
	Spawn {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// The default device port range does not fit above the proxy port.
	#[error("Port {port} leaves no room for the {} device ports that follow it; choose a lower port or set `proxyArgs`", crate::proxy::DEVICE_PORT_RANGE + 1)]
	PortRange { port: u16 },

	/// The proxy exited before it began serving.
	#[error("Proxy exited before serving devices ({0})")]
	ProxyExited(ProxyExit),

	/// The discovery endpoint answered with something unusable.
	#[error("Device discovery failed: {0}")]
	Discovery(String),

	/// The discovery endpoint never answered within the retry budget.
	#[error("Device discovery on port {port} timed out after {waited_ms}ms: {last_error}")]
	DiscoveryTimeout {
		port: u16,
		waited_ms: u64,
		last_error: String,
	},

	/// HTTP request failure (connection refused, non-success status, body read).
	#[error("HTTP request to {url} failed: {message}")]
	Http { url: String, message: String },

	/// Tunnel negotiation or transport failure.
	#[error("Tunnel error: {0}")]
	Tunnel(String),

	/// WebSocket transport failure on a CDP connection.
	#[error("Transport error: {0}")]
	Transport(String),

	/// The remote end answered a CDP command with an error object.
	#[error("Protocol error from {method}: {message}")]
	Protocol { method: String, message: String },

	/// The connection closed with commands still pending.
	#[error("Connection closed")]
	ConnectionClosed,

	/// Work abandoned because the caller cancelled it.
	#[error("Cancelled")]
	Cancelled,

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Returns true for failures a retry may clear (endpoint not up yet).
	pub fn is_transient(&self) -> bool {
		matches!(self, Error::Http { .. } | Error::Io(_))
	}
}
