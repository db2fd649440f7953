//! Public tunnel settings and assignments.

use serde::{Deserialize, Serialize};

/// Default localtunnel-compatible server.
pub const DEFAULT_TUNNEL_HOST: &str = "https://localtunnel.me";

/// Caller-side tunnel settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelOptions {
	/// Tunnel server base URL, defaults to [`DEFAULT_TUNNEL_HOST`].
	#[serde(skip_serializing_if = "Option::is_none")]
	pub host: Option<String>,

	/// Requested public subdomain.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub subdomain: Option<String>,

	/// Host the tunneled traffic is forwarded to, defaults to `localhost`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub local_host: Option<String>,
}

impl TunnelOptions {
	pub fn host(&self) -> &str {
		self.host.as_deref().unwrap_or(DEFAULT_TUNNEL_HOST)
	}

	pub fn local_host(&self) -> &str {
		self.local_host.as_deref().unwrap_or("localhost")
	}
}

/// The externally reachable origin of an open tunnel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelInfo {
	pub url: String,
}

/// Assignment returned by a localtunnel server for a new client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelAssignment {
	pub id: String,
	pub url: String,
	/// Remote TCP port the client connects its workers to.
	pub port: u16,
	#[serde(default = "default_max_conn_count")]
	pub max_conn_count: usize,
	/// Remote address to dial; falls back to the server host when absent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ip: Option<String>,
}

fn default_max_conn_count() -> usize {
	1
}
