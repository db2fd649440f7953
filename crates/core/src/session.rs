//! The debug session the orchestrator hands the selected device to.

use std::path::PathBuf;

use async_trait::async_trait;
use iosdbg_protocol::SessionOptions;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attach parameters for [`DebugSession::attach`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachRequest {
	/// Device port chosen by the selector.
	pub port: u16,
	/// Always empty; page paths are not resolved against a local directory.
	pub cwd: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub web_root: Option<PathBuf>,
	#[serde(flatten)]
	pub options: SessionOptions,
}

impl AttachRequest {
	pub fn new(port: u16, options: SessionOptions) -> Self {
		Self {
			port,
			cwd: String::new(),
			web_root: None,
			options,
		}
	}

	pub fn with_web_root(mut self, web_root: Option<PathBuf>) -> Self {
		self.web_root = web_root;
		self
	}
}

/// Debug session consumed by the orchestrator.
///
/// Errors are opaque to the orchestrator: attach failures end the run,
/// `send_message` failures during navigation are logged and kept.
#[async_trait]
pub trait DebugSession: Send + Sync {
	/// Configures session-level logging. Called once per run, after the
	/// arguments are validated.
	fn setup_logging(&self, options: &SessionOptions);

	async fn attach(&self, request: AttachRequest) -> anyhow::Result<()>;

	/// Sends a protocol command over the attached connection.
	async fn send_message(&self, method: &str, params: Option<Value>) -> anyhow::Result<Value>;
}
