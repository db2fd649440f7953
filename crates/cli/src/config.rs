//! Launch configuration: an optional JSON file overlaid with CLI flags.

use std::path::Path;
use std::time::Duration;

use iosdbg::OrchestratorConfig;
use iosdbg::protocol::{AttachArgs, LaunchArgs, TunnelOptions};
use tracing::debug;

use crate::cli::{AttachCommand, LaunchCommand, ProxyArgs};
use crate::error::{CliError, Result};
use crate::output::{CommandInputs, EffectiveConfig};

/// Reads a launch configuration file.
pub fn load_file(path: &Path) -> Result<LaunchArgs> {
	let text = std::fs::read_to_string(path).map_err(|e| CliError::Config {
		path: path.to_path_buf(),
		message: e.to_string(),
	})?;
	let args = serde_json::from_str(&text).map_err(|e| CliError::Config {
		path: path.to_path_buf(),
		message: e.to_string(),
	})?;
	debug!(target = "iosdbg", path = %path.display(), "loaded launch configuration");
	Ok(args)
}

fn base_args(proxy: &ProxyArgs) -> Result<LaunchArgs> {
	match &proxy.config {
		Some(path) => load_file(path),
		None => Ok(LaunchArgs::default()),
	}
}

fn apply_proxy_flags(proxy: &ProxyArgs, args: &mut LaunchArgs) {
	if proxy.port.is_some() {
		args.port = proxy.port;
	}
	if proxy.proxy_executable.is_some() {
		args.proxy_executable = proxy.proxy_executable.clone();
	}
	if !proxy.proxy_args.is_empty() {
		args.proxy_args = Some(proxy.proxy_args.clone());
	}
	if proxy.device_name.is_some() {
		args.device_name = proxy.device_name.clone();
	}
	if proxy.source_maps {
		args.session.source_maps = Some(true);
	}
	if proxy.diagnostic_logging {
		args.session.diagnostic_logging = Some(true);
	}
}

/// Launch arguments for `iosdbg launch`.
pub fn launch_args(command: &LaunchCommand) -> Result<LaunchArgs> {
	let mut args = base_args(&command.proxy)?;
	apply_proxy_flags(&command.proxy, &mut args);

	if command.url.is_some() {
		args.url = command.url.clone();
	}
	if command.tunnel_port.is_some() {
		args.tunnel_port = command.tunnel_port;
	}
	if command.web_root.is_some() {
		args.web_root = command.web_root.clone();
	}
	if command.tunnel_host.is_some() || command.tunnel_subdomain.is_some() {
		let options = args.tunnel_options.get_or_insert_with(TunnelOptions::default);
		if command.tunnel_host.is_some() {
			options.host = command.tunnel_host.clone();
		}
		if command.tunnel_subdomain.is_some() {
			options.subdomain = command.tunnel_subdomain.clone();
		}
	}
	Ok(args)
}

/// Attach arguments for `iosdbg attach`. Launch-only keys in the file are
/// ignored.
pub fn attach_args(command: &AttachCommand) -> Result<AttachArgs> {
	let mut args = base_args(&command.proxy)?;
	apply_proxy_flags(&command.proxy, &mut args);
	Ok(args.to_attach_args())
}

pub fn orchestrator_config(proxy: &ProxyArgs, tunnel_timeout_ms: Option<u64>) -> OrchestratorConfig {
	let mut config = OrchestratorConfig::default();
	config.discovery.timeout = Duration::from_millis(proxy.discovery_timeout_ms);
	if let Some(ms) = tunnel_timeout_ms {
		config.tunnel_timeout = Duration::from_millis(ms);
	}
	if let Some(dir) = &proxy.bundle_dir {
		config.bundle_dir = dir.clone();
	}
	config
}

pub fn effective_config(proxy: &ProxyArgs, config: &OrchestratorConfig, tunnel: bool) -> EffectiveConfig {
	EffectiveConfig {
		discovery_timeout_ms: config.discovery.timeout.as_millis() as u64,
		tunnel_timeout_ms: tunnel.then(|| config.tunnel_timeout.as_millis() as u64),
		bundle_dir: config.bundle_dir.clone(),
		config_file: proxy.config.clone(),
	}
}

pub fn launch_inputs(args: &LaunchArgs) -> CommandInputs {
	CommandInputs {
		port: args.port,
		device_name: args.device_name.clone(),
		url: args.url.clone(),
		tunnel_port: args.tunnel_port,
		proxy_executable: args.proxy_executable.clone(),
	}
}

pub fn attach_inputs(args: &AttachArgs) -> CommandInputs {
	CommandInputs {
		port: args.port,
		device_name: args.device_name.clone(),
		proxy_executable: args.proxy_executable.clone(),
		..Default::default()
	}
}
