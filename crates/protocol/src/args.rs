//! Launch and attach request arguments.
//!
//! These mirror the launch configuration a debugging front end hands to the
//! adapter. Field names are camelCase on the wire; anything the orchestrator
//! does not understand is kept in [`SessionOptions::extra`] and forwarded to
//! the debug session untouched.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tunnel::TunnelOptions;

/// Options passed through to the underlying debug session on attach.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOptions {
	/// Enable source map resolution in the debug session.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub source_maps: Option<bool>,

	/// Trace debug-protocol traffic.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub diagnostic_logging: Option<bool>,

	/// Session options this crate does not model.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

impl SessionOptions {
	pub fn diagnostic_logging(&self) -> bool {
		self.diagnostic_logging.unwrap_or(false)
	}
}

/// Arguments for a launch request: spawn the proxy, attach, optionally tunnel
/// and navigate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchArgs {
	/// Port the proxy serves its device list on. Required.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub port: Option<u16>,

	/// Explicit proxy executable, bypassing platform defaults.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub proxy_executable: Option<PathBuf>,

	/// Replaces the default proxy arguments when set.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub proxy_args: Option<Vec<String>>,

	/// Local port to expose through a public tunnel.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tunnel_port: Option<u16>,

	/// Tunnel server settings, only consulted when `tunnel_port` is set.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tunnel_options: Option<TunnelOptions>,

	/// Page to open once attached.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,

	/// Device to attach to; `*` or empty selects the first device.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub device_name: Option<String>,

	/// Local directory the served page maps to.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub web_root: Option<PathBuf>,

	#[serde(flatten)]
	pub session: SessionOptions,
}

impl LaunchArgs {
	/// Projects the fields shared with the attach path.
	pub fn to_attach_args(&self) -> AttachArgs {
		AttachArgs {
			port: self.port,
			proxy_executable: self.proxy_executable.clone(),
			proxy_args: self.proxy_args.clone(),
			device_name: self.device_name.clone(),
			session: self.session.clone(),
		}
	}
}

/// Arguments for an attach request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachArgs {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub port: Option<u16>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub proxy_executable: Option<PathBuf>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub proxy_args: Option<Vec<String>>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub device_name: Option<String>,

	#[serde(flatten)]
	pub session: SessionOptions,
}
