mod handoff_url;
mod session;

use tracing::warn;

use crate::cli::{Cli, Commands, SessionArgs};
use crate::config::{CliConfig, Settings, is_local_endpoint};
use crate::error::Result;

pub async fn dispatch(cli: Cli) -> Result<()> {
	let file = CliConfig::load(cli.config.as_deref())?;
	let settings = Settings::resolve(&cli, file);

	if !is_local_endpoint(&settings.endpoint) {
		warn!(
			target = "sshui",
			endpoint = %settings.endpoint,
			"backend is not on localhost; key material and terminal traffic cross the network"
		);
	}

	match cli.command {
		Commands::Connect(args) => session::run_new(&settings, SessionArgs::Connect(args)).await?,
		Commands::Create(args) => session::run_new(&settings, SessionArgs::Create(args)).await?,
		Commands::Template(args) => session::run_new(&settings, SessionArgs::Template(args)).await?,
		Commands::Attach { url } => session::run_attach(&settings, &url).await?,
		Commands::HandoffUrl { command } => handoff_url::print(&settings, command)?,
	}

	Ok(())
}
