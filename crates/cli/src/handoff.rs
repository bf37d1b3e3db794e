//! Opening handoff targets in a new window.

use std::process::{Command, Stdio};

use sshui::HandoffError;
use tracing::info;

/// Replaced by the handoff URL in launcher argv.
pub const URL_PLACEHOLDER: &str = "{url}";

/// An external command that opens a URL in a new window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launcher {
	argv: Vec<String>,
}

impl Launcher {
	pub fn new(argv: Vec<String>) -> Self {
		Self { argv }
	}

	/// The platform's URL opener.
	pub fn platform_default() -> Self {
		let argv: &[&str] = if cfg!(target_os = "macos") {
			&["open", URL_PLACEHOLDER]
		} else if cfg!(windows) {
			&["cmd", "/C", "start", "", URL_PLACEHOLDER]
		} else {
			&["xdg-open", URL_PLACEHOLDER]
		};
		Self::new(argv.iter().map(|arg| arg.to_string()).collect())
	}

	/// Program and arguments for opening `url`.
	///
	/// The URL is appended when no argument contains the placeholder.
	pub fn command_for(&self, url: &str) -> Result<(String, Vec<String>), HandoffError> {
		let (program, rest) = self
			.argv
			.split_first()
			.ok_or_else(|| HandoffError::Open("launcher command is empty".into()))?;

		let mut args: Vec<String> = rest.iter().map(|arg| arg.replace(URL_PLACEHOLDER, url)).collect();
		if !self.argv.iter().any(|arg| arg.contains(URL_PLACEHOLDER)) {
			args.push(url.to_string());
		}
		Ok((program.clone(), args))
	}

	/// Spawns the launcher without waiting for it.
	pub fn open(&self, url: &str) -> Result<(), HandoffError> {
		let (program, args) = self.command_for(url)?;
		info!(target = "sshui.detach", %program, "opening handoff window");
		Command::new(&program)
			.args(&args)
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::null())
			.spawn()
			.map(drop)
			.map_err(|e| HandoffError::Open(format!("{program}: {e}")))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn launcher(argv: &[&str]) -> Launcher {
		Launcher::new(argv.iter().map(|a| a.to_string()).collect())
	}

	#[test]
	fn placeholder_is_substituted() {
		let (program, args) = launcher(&["firefox", "--new-window", "{url}"]).command_for("http://h/?popout=true").unwrap();
		assert_eq!(program, "firefox");
		assert_eq!(args, vec!["--new-window", "http://h/?popout=true"]);
	}

	#[test]
	fn url_is_appended_without_placeholder() {
		let (program, args) = launcher(&["xdg-open"]).command_for("http://h/").unwrap();
		assert_eq!(program, "xdg-open");
		assert_eq!(args, vec!["http://h/"]);
	}

	#[test]
	fn empty_launcher_is_an_error() {
		assert!(matches!(launcher(&[]).command_for("http://h/"), Err(HandoffError::Open(_))));
	}

	#[test]
	fn missing_program_fails_to_open() {
		let err = launcher(&["/nonexistent/sshui-launcher"]).open("http://h/").unwrap_err();
		assert!(err.to_string().contains("sshui-launcher"));
	}

	#[test]
	fn platform_default_takes_the_url() {
		let (_, args) = Launcher::platform_default().command_for("http://h/").unwrap();
		assert_eq!(args.last().map(String::as_str), Some("http://h/"));
	}
}
