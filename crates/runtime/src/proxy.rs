//! Proxy process spawning and supervision.
//!
//! The proxy is spawned detached from our process group so it keeps serving
//! the device connection after the launching process exits. A supervisor task
//! owns the child, reaps it, and publishes its exit on a watch channel so the
//! orchestrator can fail a pending discovery when the proxy dies early.

use std::fmt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Width of the device port range handed to the proxy.
pub const DEVICE_PORT_RANGE: u16 = 100;

/// Default proxy arguments: no bundled frontend, device list on `port`,
/// devices on the ports that follow it.
///
/// Fails with [`Error::PortRange`] when the device range would run past
/// port 65535.
pub fn default_proxy_args(port: u16) -> Result<Vec<String>> {
	let last = port
		.checked_add(DEVICE_PORT_RANGE + 1)
		.ok_or(Error::PortRange { port })?;
	let first = port + 1;
	Ok(vec![
		"--no-frontend".to_string(),
		format!("--config=null:{port},:{first}-{last}"),
	])
}

/// What to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyCommand {
	pub executable: PathBuf,
	pub args: Vec<String>,
	pub cwd: Option<PathBuf>,
}

/// How the proxy process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyExit {
	/// Exit code, `None` when killed by a signal or when waiting failed.
	pub code: Option<i32>,
	pub detail: Option<String>,
}

impl ProxyExit {
	fn from_wait(result: std::io::Result<ExitStatus>) -> Self {
		match result {
			Ok(status) => Self {
				code: status.code(),
				detail: None,
			},
			Err(e) => Self {
				code: None,
				detail: Some(format!("wait failed: {e}")),
			},
		}
	}
}

impl fmt::Display for ProxyExit {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match (&self.code, &self.detail) {
			(_, Some(detail)) => write!(f, "{detail}"),
			(Some(code), None) => write!(f, "exit code {code}"),
			(None, None) => write!(f, "terminated by signal"),
		}
	}
}

/// Handle to a proxy spawned for one orchestration run.
///
/// Dropping the handle neither kills nor detaches the process; call
/// [`detach`](Self::detach) once the proxy serves, or
/// [`terminate`](Self::terminate) to tear it down.
#[derive(Debug)]
pub struct ProxyHandle {
	pid: Option<u32>,
	exit: watch::Receiver<Option<ProxyExit>>,
	kill: oneshot::Sender<()>,
}

impl ProxyHandle {
	/// Assembles a handle from its supervision channels.
	///
	/// The supervisor publishes `Some(exit)` on `exit` when the process ends
	/// and kills the process when `kill` fires.
	pub fn new(pid: Option<u32>, exit: watch::Receiver<Option<ProxyExit>>, kill: oneshot::Sender<()>) -> Self {
		Self { pid, exit, kill }
	}

	pub fn pid(&self) -> Option<u32> {
		self.pid
	}

	/// Resolves when the proxy exits. Pends forever if the supervisor goes
	/// away without reporting an exit.
	pub async fn exited(&mut self) -> ProxyExit {
		loop {
			if let Some(exit) = self.exit.borrow_and_update().clone() {
				return exit;
			}
			if self.exit.changed().await.is_err() {
				if let Some(exit) = self.exit.borrow().clone() {
					return exit;
				}
				return std::future::pending().await;
			}
		}
	}

	/// Stops watching for early exit. The process keeps running.
	pub fn detach(self) -> DetachedProxy {
		debug!(target = "iosdbg", pid = ?self.pid, "proxy detached");
		DetachedProxy {
			pid: self.pid,
			kill: self.kill,
		}
	}

	/// Kills the proxy.
	pub fn terminate(self) {
		debug!(target = "iosdbg", pid = ?self.pid, "terminating proxy");
		let _ = self.kill.send(());
	}
}

/// A proxy that outlives the run that spawned it.
#[derive(Debug)]
pub struct DetachedProxy {
	pid: Option<u32>,
	kill: oneshot::Sender<()>,
}

impl DetachedProxy {
	pub fn pid(&self) -> Option<u32> {
		self.pid
	}

	/// Kills the proxy. Dropping a `DetachedProxy` instead leaves it running.
	pub fn terminate(self) {
		debug!(target = "iosdbg", pid = ?self.pid, "terminating detached proxy");
		let _ = self.kill.send(());
	}
}

/// Starts proxy processes.
#[async_trait]
pub trait ProxySpawner: Send + Sync {
	async fn spawn(&self, command: &ProxyCommand) -> Result<ProxyHandle>;
}

/// [`ProxySpawner`] backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessSpawner;

#[cfg(windows)]
const DETACHED_PROCESS: u32 = 0x0000_0008;
#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

#[async_trait]
impl ProxySpawner for ProcessSpawner {
	async fn spawn(&self, command: &ProxyCommand) -> Result<ProxyHandle> {
		let mut cmd = Command::new(&command.executable);
		cmd.args(&command.args)
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::null())
			.kill_on_drop(false);

		if let Some(cwd) = &command.cwd {
			cmd.current_dir(cwd);
		}

		// New process group so the proxy survives our exit and our Ctrl-C.
		#[cfg(unix)]
		cmd.process_group(0);

		#[cfg(windows)]
		cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);

		let child = cmd.spawn().map_err(|source| Error::Spawn {
			path: command.executable.clone(),
			source,
		})?;

		let pid = child.id();
		info!(
			target = "iosdbg",
			pid = ?pid,
			executable = %command.executable.display(),
			args = ?command.args,
			"proxy spawned"
		);

		let (exit_tx, exit_rx) = watch::channel(None);
		let (kill_tx, kill_rx) = oneshot::channel();
		supervise(child, exit_tx, kill_rx);

		Ok(ProxyHandle::new(pid, exit_rx, kill_tx))
	}
}

fn supervise(mut child: Child, exit_tx: watch::Sender<Option<ProxyExit>>, kill_rx: oneshot::Receiver<()>) {
	tokio::spawn(async move {
		let pid = child.id();

		// A dropped kill sender disables the kill branch; we then only reap.
		let exited = tokio::select! {
			status = child.wait() => Some(status),
			Ok(()) = kill_rx => None,
		};

		let exit = match exited {
			Some(status) => {
				let exit = ProxyExit::from_wait(status);
				if exit.code == Some(0) {
					info!(target = "iosdbg", pid = ?pid, "proxy exited");
				} else {
					warn!(target = "iosdbg", pid = ?pid, %exit, "proxy exited unexpectedly");
				}
				exit
			}
			None => {
				if let Err(e) = child.start_kill() {
					warn!(target = "iosdbg", pid = ?pid, error = %e, "failed to kill proxy");
				}
				let exit = ProxyExit::from_wait(child.wait().await);
				info!(target = "iosdbg", pid = ?pid, %exit, "proxy terminated");
				exit
			}
		};

		let _ = exit_tx.send(Some(exit));
	});
}
