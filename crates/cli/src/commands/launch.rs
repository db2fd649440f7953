//! `iosdbg launch`: spawn, attach, optionally tunnel and navigate.

use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::LaunchCommand;
use crate::config;
use crate::error::{CliError, Result};
use crate::output::{DiagnosticLevel, LaunchData, OutputFormat, ResultBuilder, print_result};

pub async fn execute(command: LaunchCommand, format: OutputFormat, cancel: &CancellationToken) -> Result<()> {
	let started = Instant::now();
	let args = config::launch_args(&command)?;
	let orchestrator_config = config::orchestrator_config(&command.proxy, Some(command.tunnel_timeout_ms));
	let effective = config::effective_config(&command.proxy, &orchestrator_config, args.tunnel_port.is_some());

	let (orchestrator, session) = super::build(orchestrator_config, &command.proxy)?;
	let outcome = orchestrator.launch(&args, &session, cancel).await.map_err(CliError::from)?;

	let data = LaunchData {
		port: outcome.target().port,
		device_name: outcome.target().device_name.clone(),
		proxy_pid: outcome.proxy_pid(),
		tunnel_url: outcome.tunnel_url().map(str::to_string),
		navigated_url: outcome.navigated_url().map(str::to_string),
		navigated: outcome.navigated_url().is_some() && outcome.navigation_error().is_none(),
	};

	let mut builder = ResultBuilder::new("launch")
		.started_at(started)
		.inputs(config::launch_inputs(&args))
		.config(effective)
		.data(data);
	if let Some(err) = outcome.navigation_error() {
		builder = builder.diagnostic_with_source(DiagnosticLevel::Warning, err, "navigation");
	}
	print_result(&builder.build(), format);

	if command.proxy.wait {
		info!(target = "iosdbg", "serving until Ctrl-C");
		cancel.cancelled().await;
		outcome.disconnect(command.proxy.kill_proxy);
	}
	Ok(())
}
