use std::fs;
use std::path::Path;

use sshui::{
	DetachCoordinator, HandoffLoad, HostMode, SessionCommand, SessionDescriptor, SessionOutcome, TerminalSessionController,
};
use sshui_protocol::IdentityDirectory;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cli::SessionArgs;
use crate::config::Settings;
use crate::error::{CliError, Result};
use crate::host::{CliHost, Controls};

pub fn load_identities(path: &Path) -> Result<IdentityDirectory> {
	let content = fs::read_to_string(path).map_err(|source| CliError::Read {
		path: path.to_path_buf(),
		source,
	})?;
	IdentityDirectory::from_json(&content).map_err(|e| CliError::Identities {
		path: path.to_path_buf(),
		reason: e.to_string(),
	})
}

/// Builds the descriptor for a session command, resolving identities.
pub fn describe(settings: &Settings, args: SessionArgs) -> Result<SessionDescriptor> {
	let command = match args {
		SessionArgs::Connect(args) => match (args.identity, args.identity_user) {
			(Some(uuid), Some(user)) => {
				let path = settings.identities.as_deref().ok_or(CliError::NoIdentities)?;
				let directory = load_identities(path)?;
				let identity = directory.get(&uuid).ok_or_else(|| CliError::UnknownIdentity(uuid.clone()))?;
				if identity.user(&user).is_none() {
					return Err(CliError::UnknownUser { identity: uuid, user });
				}
				let targets = identity.connect_targets();
				let host = match args.alias {
					Some(alias) if targets.contains(&alias) => alias,
					Some(alias) => return Err(CliError::UnknownAlias { identity: uuid, alias }),
					None => targets.into_iter().next().ok_or_else(|| CliError::UnknownIdentity(uuid.clone()))?,
				};
				SessionCommand::connect(user, host)
			}
			_ => SessionCommand::connect(args.user.unwrap_or_default(), args.host.unwrap_or_default()),
		},
		SessionArgs::Create(args) => SessionCommand::create(
			args.user_host,
			args.template.as_deref(),
			args.key_comment.as_deref(),
			args.legacy,
		),
		SessionArgs::Template(args) => SessionCommand::template(args.action, args.name),
	};
	Ok(SessionDescriptor::new(command))
}

/// Starts a fresh session on this terminal.
pub async fn run_new(settings: &Settings, args: SessionArgs) -> Result<()> {
	let descriptor = describe(settings, args)?;
	run(settings, descriptor, HostMode::Embedded).await
}

/// Resumes a handed-off session in terminal-only mode.
pub async fn run_attach(settings: &Settings, url: &str) -> Result<()> {
	match DetachCoordinator::recognize(url)? {
		HandoffLoad::Resume(descriptor) => run(settings, descriptor, HostMode::Handoff).await,
		HandoffLoad::Restricted => Err(CliError::NothingToResume),
		HandoffLoad::Normal => Err(CliError::NotAHandoff(url.to_string())),
	}
}

async fn run(settings: &Settings, descriptor: SessionDescriptor, mode: HostMode) -> Result<()> {
	let host = CliHost::new(settings, mode);
	let controls = host.controls();
	let mut controller = TerminalSessionController::new(host, settings.session.clone());
	if mode == HostMode::Embedded {
		controller = controller.with_detach(DetachCoordinator::new(&settings.console_url)?);
	}
	controls.bind(controller.events());

	controller.start(descriptor)?;
	let resize = watch_resize(controls);
	let outcome = controller.run().await;
	if let Some(resize) = resize {
		resize.abort();
	}

	match outcome {
		Some(SessionOutcome::Completed { refresh_required }) => {
			report_refresh(refresh_required);
			Ok(())
		}
		Some(SessionOutcome::Rejected { reason, refresh_required }) => {
			info!(target = "sshui", %reason, "backend ended the session");
			report_refresh(refresh_required);
			Ok(())
		}
		Some(SessionOutcome::Failed { error }) => Err(CliError::SessionFailed(error)),
		Some(SessionOutcome::Detached { target }) => {
			eprintln!("Session detached. Resume it with:\n  sshui attach '{target}'");
			Ok(())
		}
		Some(SessionOutcome::WindowClosed) => {
			debug!(target = "sshui", window_closed = controller.host().window_closed(), "handoff session finished");
			Ok(())
		}
		None => Ok(()),
	}
}

fn report_refresh(refresh_required: bool) {
	if refresh_required {
		eprintln!("Identity data changed on the backend; reload the identity list.");
	}
}

#[cfg(unix)]
fn watch_resize(controls: Controls) -> Option<JoinHandle<()>> {
	use tokio::signal::unix::{SignalKind, signal};

	let mut window_change = match signal(SignalKind::window_change()) {
		Ok(stream) => stream,
		Err(err) => {
			warn!(target = "sshui", error = %err, "cannot watch terminal resizes");
			return None;
		}
	};
	Some(tokio::spawn(async move {
		while window_change.recv().await.is_some() {
			if !controls.viewport_resized() {
				break;
			}
		}
	}))
}

#[cfg(not(unix))]
fn watch_resize(_controls: Controls) -> Option<JoinHandle<()>> {
	None
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use clap::Parser;
	use sshui_protocol::TemplateAction;

	use super::*;
	use crate::cli::{Cli, Commands};
	use crate::config::CliConfig;

	const IDENTITIES: &str = r#"[
		{"uuid": "0f8e", "short_uuid": "0f8e2a41", "aliases": ["db1", "db1.internal"], "users": [{"name": "deploy"}]},
		{"uuid": "77c0", "short_uuid": "77c0ffee", "aliases": [], "users": [{"name": "root"}]}
	]"#;

	fn parse(args: &[&str], identities: Option<&Path>) -> Result<SessionDescriptor> {
		let mut argv = vec!["sshui", "handoff-url"];
		argv.extend_from_slice(args);
		let cli = Cli::try_parse_from(argv).unwrap();
		let mut settings = Settings::resolve(&cli, CliConfig::default());
		settings.identities = identities.map(Path::to_path_buf);
		let Commands::HandoffUrl { command } = cli.command else {
			panic!("expected handoff-url");
		};
		describe(&settings, command)
	}

	fn identities_file() -> tempfile::NamedTempFile {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(IDENTITIES.as_bytes()).unwrap();
		file
	}

	#[test]
	fn describes_each_session_kind() {
		let connect = parse(&["connect", "bob", "h1"], None).unwrap();
		assert_eq!(connect.command(), &SessionCommand::connect("bob", "h1"));

		let create = parse(&["create", "alice@h2", "--template", "none", "--key-comment", "laptop"], None).unwrap();
		assert_eq!(create.command(), &SessionCommand::create("alice@h2", None, Some("laptop"), false));
		assert!(create.mutates_backend());

		let template = parse(&["template", "generate-keys", "team"], None).unwrap();
		assert_eq!(template.command(), &SessionCommand::template(TemplateAction::GenerateKeys, "team"));
	}

	#[test]
	fn identity_resolves_to_default_or_chosen_alias() {
		let file = identities_file();
		let default = parse(&["connect", "--identity", "0f8e", "--user", "deploy"], Some(file.path())).unwrap();
		assert_eq!(default.command(), &SessionCommand::connect("deploy", "db1"));

		let chosen = parse(
			&["connect", "--identity", "0f8e", "--user", "deploy", "--alias", "db1.internal"],
			Some(file.path()),
		)
		.unwrap();
		assert_eq!(chosen.command(), &SessionCommand::connect("deploy", "db1.internal"));

		let fallback = parse(&["connect", "--identity", "77c0", "--user", "root"], Some(file.path())).unwrap();
		assert_eq!(fallback.command(), &SessionCommand::connect("root", "77c0ffee"));
	}

	#[test]
	fn identity_lookup_errors() {
		let file = identities_file();
		assert!(matches!(
			parse(&["connect", "--identity", "0f8e", "--user", "deploy"], None),
			Err(CliError::NoIdentities)
		));
		assert!(matches!(
			parse(&["connect", "--identity", "nope", "--user", "deploy"], Some(file.path())),
			Err(CliError::UnknownIdentity(_))
		));
		assert!(matches!(
			parse(&["connect", "--identity", "0f8e", "--user", "root"], Some(file.path())),
			Err(CliError::UnknownUser { .. })
		));
		assert!(matches!(
			parse(&["connect", "--identity", "0f8e", "--user", "deploy", "--alias", "db2"], Some(file.path())),
			Err(CliError::UnknownAlias { .. })
		));
	}

	#[tokio::test]
	async fn attach_requires_a_payload() {
		let cli = Cli::try_parse_from(["sshui", "attach", "http://127.0.0.1:8080/"]).unwrap();
		let settings = Settings::resolve(&cli, CliConfig::default());
		assert!(matches!(
			run_attach(&settings, "http://127.0.0.1:8080/?popout=true").await,
			Err(CliError::NothingToResume)
		));
		assert!(matches!(
			run_attach(&settings, "http://127.0.0.1:8080/").await,
			Err(CliError::NotAHandoff(_))
		));
		assert!(matches!(
			run_attach(&settings, "http://127.0.0.1:8080/?popout=true&payload=%7B").await,
			Err(CliError::Handoff(_))
		));
	}
}
