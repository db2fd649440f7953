use clap::Parser;

use super::*;

fn parse(args: &[&str]) -> Cli {
	Cli::try_parse_from(std::iter::once("iosdbg").chain(args.iter().copied())).unwrap()
}

#[test]
fn launch_flags() {
	let cli = parse(&[
		"launch",
		"-p",
		"9221",
		"--device",
		"iPhone",
		"--url",
		"http://localhost:8080/index.html",
		"--tunnel-port",
		"8080",
		"--source-maps",
	]);

	let Commands::Launch(command) = cli.command else {
		panic!("expected launch");
	};
	assert_eq!(command.proxy.port, Some(9221));
	assert_eq!(command.proxy.device_name.as_deref(), Some("iPhone"));
	assert_eq!(command.url.as_deref(), Some("http://localhost:8080/index.html"));
	assert_eq!(command.tunnel_port, Some(8080));
	assert!(command.proxy.source_maps);
	assert_eq!(command.tunnel_timeout_ms, 30_000);
	assert_eq!(command.proxy.discovery_timeout_ms, 10_000);
	assert_eq!(command.proxy.command_timeout_ms, 30_000);
}

#[test]
fn proxy_args_accept_hyphen_values() {
	let cli = parse(&["attach", "--port", "9221", "--proxy-arg", "--no-frontend", "--proxy-arg", "-c"]);
	let Commands::Attach(command) = cli.command else {
		panic!("expected attach");
	};
	assert_eq!(command.proxy.proxy_args, vec!["--no-frontend", "-c"]);
}

#[test]
fn global_flags_after_subcommand() {
	let cli = parse(&["attach", "-vv", "-f", "json"]);
	assert_eq!(cli.verbose, 2);
	assert_eq!(cli.format, OutputFormat::Json);
	assert_eq!(cli.command.name(), "attach");
}

#[test]
fn kill_proxy_requires_wait() {
	let err = Cli::try_parse_from(["iosdbg", "attach", "--kill-proxy"]).unwrap_err();
	assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

	let cli = parse(&["attach", "--wait", "--kill-proxy"]);
	let Commands::Attach(command) = cli.command else {
		panic!("expected attach");
	};
	assert!(command.proxy.wait && command.proxy.kill_proxy);
}

#[test]
fn launch_only_flags_rejected_on_attach() {
	assert!(Cli::try_parse_from(["iosdbg", "attach", "--url", "http://localhost/"]).is_err());
}
