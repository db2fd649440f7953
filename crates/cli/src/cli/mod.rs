#[cfg(test)]
mod tests;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;
use crate::styles::cli_styles;

/// Root CLI for iosdbg.
#[derive(Parser, Debug)]
#[command(name = "iosdbg")]
#[command(about = "Debug web pages on iOS devices through ios_webkit_debug_proxy")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format: toon (default), json, ndjson, or text
	#[arg(short = 'f', long, global = true, value_enum, default_value = "toon")]
	pub format: OutputFormat,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Spawn the proxy, attach to a device and open a page.
	Launch(LaunchCommand),
	/// Spawn the proxy and attach to a device.
	Attach(AttachCommand),
}

impl Commands {
	pub fn name(&self) -> &'static str {
		match self {
			Commands::Launch(_) => "launch",
			Commands::Attach(_) => "attach",
		}
	}
}

/// Flags shared by launch and attach. Each overrides the matching key of
/// `--config`.
#[derive(Args, Debug, Clone, Default)]
pub struct ProxyArgs {
	/// Launch configuration JSON file (camelCase keys, as in launch.json)
	#[arg(short, long, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Port the proxy serves its device list on
	#[arg(short, long, value_name = "PORT")]
	pub port: Option<u16>,

	/// Proxy executable, bypassing the bundled proxy lookup
	#[arg(long, value_name = "PATH", env = "IOSDBG_PROXY_EXECUTABLE")]
	pub proxy_executable: Option<PathBuf>,

	/// Proxy argument replacing the defaults (repeatable)
	#[arg(long = "proxy-arg", value_name = "ARG", allow_hyphen_values = true)]
	pub proxy_args: Vec<String>,

	/// Device to attach to by name; `*` picks the first device
	#[arg(short, long = "device", value_name = "NAME")]
	pub device_name: Option<String>,

	/// Enable source maps in the debug session
	#[arg(long)]
	pub source_maps: bool,

	/// Trace debug-protocol messages
	#[arg(long)]
	pub diagnostic_logging: bool,

	/// How long to wait for the proxy's device list
	#[arg(long, value_name = "MS", default_value_t = 10_000)]
	pub discovery_timeout_ms: u64,

	/// How long a debug-protocol command may wait for its reply
	#[arg(long, value_name = "MS", default_value_t = 30_000)]
	pub command_timeout_ms: u64,

	/// Directory holding the bundled proxy (defaults to the executable's directory)
	#[arg(long, value_name = "DIR")]
	pub bundle_dir: Option<PathBuf>,

	/// Stay in the foreground until Ctrl-C, then disconnect
	#[arg(short, long)]
	pub wait: bool,

	/// With --wait, terminate the proxy on exit instead of leaving it running
	#[arg(long, requires = "wait")]
	pub kill_proxy: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct LaunchCommand {
	#[command(flatten)]
	pub proxy: ProxyArgs,

	/// Page to open once attached
	#[arg(short, long, value_name = "URL")]
	pub url: Option<String>,

	/// Local port to expose through a public tunnel
	#[arg(long, value_name = "PORT")]
	pub tunnel_port: Option<u16>,

	/// Tunnel server (localtunnel-compatible)
	#[arg(long, value_name = "URL")]
	pub tunnel_host: Option<String>,

	/// Public subdomain to request from the tunnel server
	#[arg(long, value_name = "NAME")]
	pub tunnel_subdomain: Option<String>,

	/// Local directory the served page maps to
	#[arg(long, value_name = "DIR")]
	pub web_root: Option<PathBuf>,

	/// How long to wait for the tunnel to open
	#[arg(long, value_name = "MS", default_value_t = 30_000)]
	pub tunnel_timeout_ms: u64,
}

#[derive(Args, Debug, Clone, Default)]
pub struct AttachCommand {
	#[command(flatten)]
	pub proxy: ProxyArgs,
}
