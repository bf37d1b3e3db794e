use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use sshui_cli::{cli::Cli, commands, logging};
use tracing::error;

fn main() -> ExitCode {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
		Ok(runtime) => runtime,
		Err(err) => {
			error!(target = "sshui", error = %err, "failed to start runtime");
			return ExitCode::FAILURE;
		}
	};

	let result = runtime.block_on(commands::dispatch(cli));
	// A pending stdin read would otherwise hold the runtime open.
	runtime.shutdown_timeout(Duration::from_millis(100));

	match result {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			error!(target = "sshui", error = %err, "command failed");
			ExitCode::FAILURE
		}
	}
}
