//! Orchestration errors.

use std::fmt;

use iosdbg_runtime::Error as RuntimeError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure category of a launch or attach run, one per orchestration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
	MissingPort,
	ProxyNotFound,
	UnsupportedPlatform,
	SpawnError,
	DiscoveryError,
	DiscoveryTimeout,
	TunnelError,
	AttachError,
	Cancelled,
}

impl ErrorKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			ErrorKind::MissingPort => "MISSING_PORT",
			ErrorKind::ProxyNotFound => "PROXY_NOT_FOUND",
			ErrorKind::UnsupportedPlatform => "UNSUPPORTED_PLATFORM",
			ErrorKind::SpawnError => "SPAWN_ERROR",
			ErrorKind::DiscoveryError => "DISCOVERY_ERROR",
			ErrorKind::DiscoveryTimeout => "DISCOVERY_TIMEOUT",
			ErrorKind::TunnelError => "TUNNEL_ERROR",
			ErrorKind::AttachError => "ATTACH_ERROR",
			ErrorKind::Cancelled => "CANCELLED",
		}
	}
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Error)]
pub enum Error {
	/// The request carried no proxy port. Raised before any side effect.
	#[error("The iOS proxy port is missing. Set `port` in the launch configuration.")]
	MissingPort,

	#[error(transparent)]
	Runtime(#[from] RuntimeError),

	/// The debug session refused to attach.
	#[error("Failed to attach to the device on port {port}: {source:#}")]
	Attach {
		port: u16,
		#[source]
		source: anyhow::Error,
	},

	#[error("Cancelled")]
	Cancelled,
}

impl Error {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Error::MissingPort => ErrorKind::MissingPort,
			Error::Attach { .. } => ErrorKind::AttachError,
			Error::Cancelled => ErrorKind::Cancelled,
			Error::Runtime(err) => match err {
				RuntimeError::ProxyNotFound { .. } => ErrorKind::ProxyNotFound,
				RuntimeError::UnsupportedPlatform(_) => ErrorKind::UnsupportedPlatform,
				RuntimeError::Spawn { .. } | RuntimeError::PortRange { .. } | RuntimeError::ProxyExited(_) => {
					ErrorKind::SpawnError
				}
				RuntimeError::DiscoveryTimeout { .. } => ErrorKind::DiscoveryTimeout,
				RuntimeError::Tunnel(_) => ErrorKind::TunnelError,
				RuntimeError::Cancelled => ErrorKind::Cancelled,
				// Page transport failures only arise from the session.
				RuntimeError::Transport(_) | RuntimeError::Protocol { .. } | RuntimeError::ConnectionClosed => {
					ErrorKind::AttachError
				}
				RuntimeError::Discovery(_) | RuntimeError::Http { .. } | RuntimeError::Io(_) | RuntimeError::Json(_) => {
					ErrorKind::DiscoveryError
				}
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use std::path::PathBuf;

	use iosdbg_runtime::{Platform, ProxyExit};

	use super::*;

	#[test]
	fn runtime_errors_map_to_step_kinds() {
		let cases = [
			(
				RuntimeError::ProxyNotFound {
					path: PathBuf::from("proxy.exe"),
				},
				ErrorKind::ProxyNotFound,
			),
			(RuntimeError::UnsupportedPlatform(Platform::Linux), ErrorKind::UnsupportedPlatform),
			(
				RuntimeError::ProxyExited(ProxyExit {
					code: Some(1),
					detail: None,
				}),
				ErrorKind::SpawnError,
			),
			(RuntimeError::Discovery("bad".into()), ErrorKind::DiscoveryError),
			(
				RuntimeError::DiscoveryTimeout {
					port: 9221,
					waited_ms: 10_000,
					last_error: "refused".into(),
				},
				ErrorKind::DiscoveryTimeout,
			),
			(RuntimeError::Tunnel("down".into()), ErrorKind::TunnelError),
			(RuntimeError::Cancelled, ErrorKind::Cancelled),
		];

		for (err, kind) in cases {
			assert_eq!(Error::from(err).kind(), kind);
		}
	}

	#[test]
	fn attach_error_keeps_session_message() {
		let err = Error::Attach {
			port: 9999,
			source: anyhow::anyhow!("no inspectable page"),
		};
		assert_eq!(err.kind(), ErrorKind::AttachError);
		assert!(err.to_string().contains("no inspectable page"));
		assert_eq!(ErrorKind::AttachError.to_string(), "ATTACH_ERROR");
	}
}
