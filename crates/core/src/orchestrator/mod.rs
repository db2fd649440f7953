//! Launch and attach orchestration.
//!
//! A run walks a fixed sequence of steps:
//!
//! ```text
//! ValidatingArgs -> ResolvingProxy -> Spawning -> AwaitingDiscovery -> SelectingTarget
//!   -> [launch: Tunneling -> ResolvingUrl] -> Attaching -> [launch: Navigating] -> Done
//! ```
//!
//! Any step may move the run to `Failed`. Each run owns its proxy handle,
//! device list and tunnel; the [`Orchestrator`] itself only holds shared
//! collaborators and configuration, so concurrent runs do not interact.
//!
//! The proxy is detached once discovery succeeds and keeps serving after the
//! run ends. It is terminated when discovery fails or the run is cancelled.


use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use iosdbg_protocol::{AttachArgs, DeviceDescriptor, LaunchArgs, ResolvedTarget, SessionOptions, TunnelOptions};
use iosdbg_runtime::{
	DetachedProxy, DiscoveryClient, DiscoveryConfig, Error as RuntimeError, HostPlatform, HttpFetcher, LocalTunnelProvider,
	PlatformProbe, ProcessSpawner, ProxyCommand, ProxySpawner, ReqwestFetcher, TunnelProvider, default_bundle_dir,
	default_proxy_args, resolve_proxy_path,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::selector::{self, DeviceCriterion};
use crate::session::{AttachRequest, DebugSession};
use crate::tunnel::{self, DEFAULT_TUNNEL_TIMEOUT, TunnelHandle};
use crate::url;

/// Steps of a run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrchestrationState {
	Idle,
	ValidatingArgs,
	ResolvingProxy,
	Spawning,
	AwaitingDiscovery,
	SelectingTarget,
	Tunneling,
	ResolvingUrl,
	Attaching,
	Navigating,
	Done,
	Failed,
}

impl fmt::Display for OrchestrationState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(self, f)
	}
}

/// External services a run talks to.
#[derive(Clone)]
pub struct Collaborators {
	pub platform: Arc<dyn PlatformProbe>,
	pub spawner: Arc<dyn ProxySpawner>,
	pub fetcher: Arc<dyn HttpFetcher>,
	pub tunnels: Arc<dyn TunnelProvider>,
}

impl Collaborators {
	/// Real host, process, HTTP and localtunnel implementations.
	pub fn host() -> iosdbg_runtime::Result<Self> {
		Ok(Self {
			platform: Arc::new(HostPlatform),
			spawner: Arc::new(ProcessSpawner),
			fetcher: Arc::new(ReqwestFetcher::new()?),
			tunnels: Arc::new(LocalTunnelProvider::new()?),
		})
	}
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
	pub discovery: DiscoveryConfig,
	pub tunnel_timeout: Duration,
	/// Root the bundled proxy is looked up under.
	pub bundle_dir: PathBuf,
}

impl Default for OrchestratorConfig {
	fn default() -> Self {
		Self {
			discovery: DiscoveryConfig::default(),
			tunnel_timeout: DEFAULT_TUNNEL_TIMEOUT,
			bundle_dir: default_bundle_dir(),
		}
	}
}

/// Result of a successful launch.
#[derive(Debug)]
pub struct LaunchOutcome {
	target: ResolvedTarget,
	proxy: DetachedProxy,
	tunnel: Option<TunnelHandle>,
	navigated_url: Option<String>,
	navigation_error: Option<String>,
	trail: Vec<OrchestrationState>,
}

impl LaunchOutcome {
	pub fn target(&self) -> &ResolvedTarget {
		&self.target
	}

	pub fn proxy_pid(&self) -> Option<u32> {
		self.proxy.pid()
	}

	pub fn tunnel_url(&self) -> Option<&str> {
		self.tunnel.as_ref().map(TunnelHandle::url)
	}

	/// URL `Page.navigate` was issued for, whether or not it succeeded.
	pub fn navigated_url(&self) -> Option<&str> {
		self.navigated_url.as_deref()
	}

	/// Why navigation failed. Navigation failures do not fail the launch.
	pub fn navigation_error(&self) -> Option<&str> {
		self.navigation_error.as_deref()
	}

	/// States the run passed through, ending in `Done`.
	pub fn trail(&self) -> &[OrchestrationState] {
		&self.trail
	}

	/// Closes the tunnel, and kills the proxy when `terminate_proxy` is set.
	pub fn disconnect(self, terminate_proxy: bool) {
		if let Some(tunnel) = &self.tunnel {
			tunnel.close();
		}
		if terminate_proxy {
			self.proxy.terminate();
		}
	}
}

/// Result of a successful attach.
#[derive(Debug)]
pub struct AttachOutcome {
	target: ResolvedTarget,
	proxy: DetachedProxy,
	trail: Vec<OrchestrationState>,
}

impl AttachOutcome {
	pub fn target(&self) -> &ResolvedTarget {
		&self.target
	}

	pub fn proxy_pid(&self) -> Option<u32> {
		self.proxy.pid()
	}

	pub fn trail(&self) -> &[OrchestrationState] {
		&self.trail
	}

	pub fn disconnect(self, terminate_proxy: bool) {
		if terminate_proxy {
			self.proxy.terminate();
		}
	}
}

/// Drives launch and attach runs.
#[derive(Clone)]
pub struct Orchestrator {
	collaborators: Collaborators,
	config: OrchestratorConfig,
}

/// Fields shared by launch and attach.
struct ProxyRequest<'a> {
	port: u16,
	executable: Option<&'a std::path::Path>,
	args: Option<&'a [String]>,
	device_name: Option<&'a str>,
	session: &'a SessionOptions,
}

/// Proxy up, device chosen.
struct Prepared {
	proxy: DetachedProxy,
	target: ResolvedTarget,
}

/// State bookkeeping for one run.
struct Run {
	mode: &'static str,
	state: OrchestrationState,
	trail: Vec<OrchestrationState>,
}

impl Run {
	fn new(mode: &'static str) -> Self {
		Self {
			mode,
			state: OrchestrationState::Idle,
			trail: vec![OrchestrationState::Idle],
		}
	}

	fn enter(&mut self, state: OrchestrationState) {
		debug!(target = "iosdbg", mode = self.mode, from = %self.state, to = %state, "state transition");
		self.state = state;
		self.trail.push(state);
	}

	fn fail(&mut self, err: Error) -> Error {
		warn!(
			target = "iosdbg",
			mode = self.mode,
			step = %self.state,
			kind = %err.kind(),
			error = %err,
			"run failed"
		);
		self.enter(OrchestrationState::Failed);
		err
	}
}

impl Orchestrator {
	pub fn new(collaborators: Collaborators, config: OrchestratorConfig) -> Self {
		Self { collaborators, config }
	}

	pub fn config(&self) -> &OrchestratorConfig {
		&self.config
	}

	/// Spawns the proxy, attaches to the selected device and, when asked,
	/// exposes `tunnel_port` publicly and navigates the page.
	pub async fn launch(
		&self,
		args: &LaunchArgs,
		session: &dyn DebugSession,
		cancel: &CancellationToken,
	) -> Result<LaunchOutcome> {
		let mut run = Run::new("launch");

		run.enter(OrchestrationState::ValidatingArgs);
		let Some(port) = args.port else {
			return Err(run.fail(Error::MissingPort));
		};
		session.setup_logging(&args.session);

		let request = ProxyRequest {
			port,
			executable: args.proxy_executable.as_deref(),
			args: args.proxy_args.as_deref(),
			device_name: args.device_name.as_deref(),
			session: &args.session,
		};
		let Prepared { proxy, target } = self.prepare(&mut run, &request, cancel).await?;

		let tunnel = match args.tunnel_port {
			Some(tunnel_port) => {
				run.enter(OrchestrationState::Tunneling);
				let options = args.tunnel_options.clone().unwrap_or_default();
				match self.open_tunnel(tunnel_port, &options, cancel).await {
					Ok(tunnel) => Some(tunnel),
					Err(err) => {
						if err.kind() == crate::ErrorKind::Cancelled {
							proxy.terminate();
						}
						return Err(run.fail(err));
					}
				}
			}
			None => None,
		};

		run.enter(OrchestrationState::ResolvingUrl);
		let navigate_to = url::resolve(tunnel.as_ref().map(TunnelHandle::url), args.url.as_deref());

		run.enter(OrchestrationState::Attaching);
		let attach = AttachRequest::new(target.port, args.session.clone()).with_web_root(args.web_root.clone());
		if let Err(err) = attach_session(session, attach, cancel).await {
			if let Some(tunnel) = &tunnel {
				tunnel.close();
			}
			if err.kind() == crate::ErrorKind::Cancelled {
				proxy.terminate();
			}
			return Err(run.fail(err));
		}

		let mut navigation_error = None;
		if let Some(url) = &navigate_to {
			run.enter(OrchestrationState::Navigating);
			let navigated = tokio::select! {
				biased;
				_ = cancel.cancelled() => None,
				sent = session.send_message("Page.navigate", Some(json!({ "url": url }))) => Some(sent),
			};
			let Some(navigated) = navigated else {
				if let Some(tunnel) = &tunnel {
					tunnel.close();
				}
				proxy.terminate();
				return Err(run.fail(Error::Cancelled));
			};
			match navigated {
				Ok(_) => info!(target = "iosdbg", %url, "page navigated"),
				Err(e) => {
					warn!(target = "iosdbg", %url, error = %format!("{e:#}"), "navigation failed");
					navigation_error = Some(format!("{e:#}"));
				}
			}
		}

		run.enter(OrchestrationState::Done);
		info!(
			target = "iosdbg",
			port = target.port,
			device = target.device_name.as_deref().unwrap_or("<proxy>"),
			tunnel = tunnel.as_ref().map(TunnelHandle::url).unwrap_or("<none>"),
			"launch complete"
		);

		Ok(LaunchOutcome {
			target,
			proxy,
			tunnel,
			navigated_url: navigate_to,
			navigation_error,
			trail: run.trail,
		})
	}

	/// Spawns the proxy and attaches to the selected device.
	pub async fn attach(
		&self,
		args: &AttachArgs,
		session: &dyn DebugSession,
		cancel: &CancellationToken,
	) -> Result<AttachOutcome> {
		let mut run = Run::new("attach");

		run.enter(OrchestrationState::ValidatingArgs);
		let Some(port) = args.port else {
			return Err(run.fail(Error::MissingPort));
		};
		session.setup_logging(&args.session);

		let request = ProxyRequest {
			port,
			executable: args.proxy_executable.as_deref(),
			args: args.proxy_args.as_deref(),
			device_name: args.device_name.as_deref(),
			session: &args.session,
		};
		let Prepared { proxy, target } = self.prepare(&mut run, &request, cancel).await?;

		run.enter(OrchestrationState::Attaching);
		let attach = AttachRequest::new(target.port, args.session.clone());
		if let Err(err) = attach_session(session, attach, cancel).await {
			if err.kind() == crate::ErrorKind::Cancelled {
				proxy.terminate();
			}
			return Err(run.fail(err));
		}

		run.enter(OrchestrationState::Done);
		info!(
			target = "iosdbg",
			port = target.port,
			device = target.device_name.as_deref().unwrap_or("<proxy>"),
			"attach complete"
		);

		Ok(AttachOutcome {
			target,
			proxy,
			trail: run.trail,
		})
	}

	/// Resolves, spawns and discovers, then selects the target.
	async fn prepare(&self, run: &mut Run, request: &ProxyRequest<'_>, cancel: &CancellationToken) -> Result<Prepared> {
		run.enter(OrchestrationState::ResolvingProxy);
		let executable = resolve_proxy_path(
			self.collaborators.platform.as_ref(),
			request.executable,
			&self.config.bundle_dir,
		)
		.map_err(|e| run.fail(e.into()))?;

		if cancel.is_cancelled() {
			return Err(run.fail(Error::Cancelled));
		}

		run.enter(OrchestrationState::Spawning);
		let args = match request.args {
			Some(args) => args.to_vec(),
			None => default_proxy_args(request.port).map_err(|e| run.fail(e.into()))?,
		};
		let command = ProxyCommand {
			executable,
			args,
			cwd: None,
		};
		let mut proxy = self
			.collaborators
			.spawner
			.spawn(&command)
			.await
			.map_err(|e| run.fail(e.into()))?;

		run.enter(OrchestrationState::AwaitingDiscovery);
		let discovery = DiscoveryClient::new(Arc::clone(&self.collaborators.fetcher), self.config.discovery);
		let discovered: iosdbg_runtime::Result<Vec<DeviceDescriptor>> = tokio::select! {
			discovered = discovery.discover(request.port, cancel) => discovered,
			exit = proxy.exited() => Err(RuntimeError::ProxyExited(exit)),
		};

		let devices = match discovered {
			Ok(devices) => devices,
			Err(e) => {
				proxy.terminate();
				return Err(run.fail(e.into()));
			}
		};
		let proxy = proxy.detach();

		run.enter(OrchestrationState::SelectingTarget);
		let target = selector::select(&devices, DeviceCriterion::from_name(request.device_name), request.port);
		debug!(
			target = "iosdbg",
			port = target.port,
			device = ?target.device_name,
			source_maps = ?request.session.source_maps,
			"target selected"
		);

		Ok(Prepared { proxy, target })
	}

	async fn open_tunnel(&self, local_port: u16, options: &TunnelOptions, cancel: &CancellationToken) -> Result<TunnelHandle> {
		tunnel::negotiate(
			self.collaborators.tunnels.as_ref(),
			local_port,
			options,
			self.config.tunnel_timeout,
			cancel,
		)
		.await
	}
}

async fn attach_session(session: &dyn DebugSession, request: AttachRequest, cancel: &CancellationToken) -> Result<()> {
	let port = request.port;
	tokio::select! {
		biased;
		_ = cancel.cancelled() => Err(Error::Cancelled),
		attached = session.attach(request) => attached.map_err(|source| Error::Attach { port, source }),
	}
}
