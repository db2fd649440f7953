//! Host platform detection and default proxy location.
//!
//! Only Windows ships a bundled proxy (the `vs-libimobile` package). On macOS
//! and Linux the user installs `ios_webkit_debug_proxy` themselves and must
//! point `proxyExecutable` at it.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Location of the bundled proxy relative to the bundle root.
pub const BUNDLED_PROXY_RELATIVE_PATH: &[&str] = &["node_modules", "vs-libimobile", "lib", "ios_webkit_debug_proxy.exe"];

/// Host operating systems the adapter distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
	Windows,
	#[serde(rename = "OSX")]
	Osx,
	Linux,
}

impl Platform {
	/// Platform this binary was compiled for. Unix-likes other than macOS
	/// count as Linux.
	pub fn current() -> Self {
		if cfg!(windows) {
			Platform::Windows
		} else if cfg!(target_os = "macos") {
			Platform::Osx
		} else {
			Platform::Linux
		}
	}
}

impl fmt::Display for Platform {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Platform::Windows => write!(f, "Windows"),
			Platform::Osx => write!(f, "OSX"),
			Platform::Linux => write!(f, "Linux"),
		}
	}
}

/// Host queries the orchestrator needs.
pub trait PlatformProbe: Send + Sync {
	fn platform(&self) -> Platform;

	fn exists(&self, path: &Path) -> bool;
}

/// [`PlatformProbe`] backed by the real host.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostPlatform;

impl PlatformProbe for HostPlatform {
	fn platform(&self) -> Platform {
		Platform::current()
	}

	fn exists(&self, path: &Path) -> bool {
		path.exists()
	}
}

/// Default bundle root: the directory holding the running executable.
pub fn default_bundle_dir() -> PathBuf {
	std::env::current_exe()
		.ok()
		.and_then(|exe| exe.parent().map(Path::to_path_buf))
		.unwrap_or_else(|| PathBuf::from("."))
}

/// Path of the bundled proxy under `bundle_dir`.
pub fn bundled_proxy_path(bundle_dir: &Path) -> PathBuf {
	BUNDLED_PROXY_RELATIVE_PATH
		.iter()
		.fold(bundle_dir.to_path_buf(), |path, part| path.join(part))
}

/// Picks the proxy executable for this run.
///
/// An explicit path is returned as-is without an existence check; a bad path
/// surfaces later as a spawn failure.
pub fn resolve_proxy_path(probe: &dyn PlatformProbe, explicit: Option<&Path>, bundle_dir: &Path) -> Result<PathBuf> {
	if let Some(path) = explicit {
		debug!(target = "iosdbg", path = %path.display(), "using configured proxy executable");
		return Ok(path.to_path_buf());
	}

	match probe.platform() {
		Platform::Windows => {
			let path = bundled_proxy_path(bundle_dir);
			if probe.exists(&path) {
				debug!(target = "iosdbg", path = %path.display(), "using bundled proxy executable");
				Ok(path)
			} else {
				Err(Error::ProxyNotFound { path })
			}
		}
		platform => Err(Error::UnsupportedPlatform(platform)),
	}
}
