mod attach;
mod launch;

use std::sync::Arc;
use std::time::Duration;

use iosdbg::runtime::HttpFetcher;
use iosdbg::{Collaborators, Orchestrator, OrchestratorConfig};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::{Cli, Commands, ProxyArgs};
use crate::error::Result;
use crate::output::OutputFormat;
use crate::session::CdpDebugSession;

pub async fn dispatch(cli: Cli, format: OutputFormat) -> Result<()> {
	let cancel = cancel_on_ctrl_c();

	match cli.command {
		Commands::Launch(command) => launch::execute(command, format, &cancel).await,
		Commands::Attach(command) => attach::execute(command, format, &cancel).await,
	}
}

/// Token cancelled on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
	let cancel = CancellationToken::new();
	let trigger = cancel.clone();
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			info!(target = "iosdbg", "interrupted");
			trigger.cancel();
		}
	});
	cancel
}

/// Host collaborators plus a session sharing their HTTP client.
fn build(config: OrchestratorConfig, proxy: &ProxyArgs) -> Result<(Orchestrator, CdpDebugSession)> {
	let collaborators = Collaborators::host()?;
	let fetcher: Arc<dyn HttpFetcher> = Arc::clone(&collaborators.fetcher);
	let session = CdpDebugSession::new(fetcher).with_command_timeout(Duration::from_millis(proxy.command_timeout_ms));
	Ok((Orchestrator::new(collaborators, config), session))
}
