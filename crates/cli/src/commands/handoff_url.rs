use sshui::DetachCoordinator;

use crate::cli::SessionArgs;
use crate::commands::session::describe;
use crate::config::Settings;
use crate::error::Result;

/// Prints where `command` would resume if it were detached right away.
pub fn print(settings: &Settings, command: SessionArgs) -> Result<()> {
	let descriptor = describe(settings, command)?;
	let target = DetachCoordinator::new(&settings.console_url)?.build(&descriptor)?;
	println!("{target}");
	Ok(())
}
