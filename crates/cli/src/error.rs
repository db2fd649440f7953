use std::path::PathBuf;

use iosdbg::ErrorKind;
use thiserror::Error;

use crate::output::{CommandError, ErrorCode};

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("invalid launch configuration {}: {message}", path.display())]
	Config { path: PathBuf, message: String },

	#[error(transparent)]
	Orchestration(#[from] iosdbg::Error),

	#[error(transparent)]
	Runtime(#[from] iosdbg::runtime::Error),
}

impl CliError {
	pub fn to_command_error(&self) -> CommandError {
		let (code, message, details) = match self {
			CliError::Config { path, message } => (
				ErrorCode::InvalidInput,
				format!("Invalid launch configuration {}: {message}", path.display()),
				Some(serde_json::json!({ "path": path })),
			),
			CliError::Orchestration(err) => {
				let kind = err.kind();
				(
					error_code(kind),
					err.to_string(),
					Some(serde_json::json!({ "kind": kind })),
				)
			}
			CliError::Runtime(err) => (ErrorCode::InternalError, err.to_string(), None),
		};

		CommandError {
			code,
			message,
			details,
		}
	}
}

fn error_code(kind: ErrorKind) -> ErrorCode {
	match kind {
		ErrorKind::MissingPort => ErrorCode::InvalidInput,
		ErrorKind::ProxyNotFound => ErrorCode::ProxyNotFound,
		ErrorKind::UnsupportedPlatform => ErrorCode::UnsupportedPlatform,
		ErrorKind::SpawnError => ErrorCode::SpawnFailed,
		ErrorKind::DiscoveryError => ErrorCode::DiscoveryFailed,
		ErrorKind::DiscoveryTimeout => ErrorCode::DiscoveryTimeout,
		ErrorKind::TunnelError => ErrorCode::TunnelFailed,
		ErrorKind::AttachError => ErrorCode::AttachFailed,
		ErrorKind::Cancelled => ErrorCode::Cancelled,
	}
}
