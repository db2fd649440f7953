//! `iosdbg attach`: spawn the proxy and attach to a device.

use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::AttachCommand;
use crate::config;
use crate::error::{CliError, Result};
use crate::output::{AttachData, OutputFormat, ResultBuilder, print_result};

pub async fn execute(command: AttachCommand, format: OutputFormat, cancel: &CancellationToken) -> Result<()> {
	let started = Instant::now();
	let args = config::attach_args(&command)?;
	let orchestrator_config = config::orchestrator_config(&command.proxy, None);
	let effective = config::effective_config(&command.proxy, &orchestrator_config, false);

	let (orchestrator, session) = super::build(orchestrator_config, &command.proxy)?;
	let outcome = orchestrator.attach(&args, &session, cancel).await.map_err(CliError::from)?;

	let result = ResultBuilder::new("attach")
		.started_at(started)
		.inputs(config::attach_inputs(&args))
		.config(effective)
		.data(AttachData {
			port: outcome.target().port,
			device_name: outcome.target().device_name.clone(),
			proxy_pid: outcome.proxy_pid(),
		})
		.build();
	print_result(&result, format);

	if command.proxy.wait {
		info!(target = "iosdbg", "attached, waiting for Ctrl-C");
		cancel.cancelled().await;
		outcome.disconnect(command.proxy.kill_proxy);
	}
	Ok(())
}
