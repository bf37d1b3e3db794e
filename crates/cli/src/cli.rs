use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use sshui_protocol::TemplateAction;
use sshui_runtime::Framing;

#[derive(Parser, Debug)]
#[command(name = "sshui")]
#[command(about = "Terminal sessions for the sshui identity console")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug, -vvv trace)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Config file (defaults to <config dir>/sshui/config.json)
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Backend endpoint, e.g. http://127.0.0.1:8080
	#[arg(short, long, global = true, value_name = "URL")]
	pub endpoint: Option<String>,

	/// Channel framing: socketio or json
	#[arg(long, global = true, value_name = "FRAMING")]
	pub framing: Option<Framing>,

	/// Backend auth token, sent as the `auth_token` cookie
	#[arg(long, global = true, env = "SSHUI_AUTH_TOKEN", hide_env_values = true)]
	pub auth_token: Option<String>,

	/// Console page that detached sessions resume at (defaults to the endpoint)
	#[arg(long, global = true, value_name = "URL")]
	pub console_url: Option<String>,

	/// Identity list (JSON) used to resolve `connect --identity`
	#[arg(long, global = true, value_name = "FILE")]
	pub identities: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Open an SSH session through the backend
	Connect(ConnectArgs),

	/// Create a new identity interactively
	Create(CreateArgs),

	/// Run a key-generation action for a template
	Template(TemplateArgs),

	/// Resume a session handed off by `detach` (Ctrl-] d)
	Attach {
		/// Handoff URL carrying the session payload
		url: String,
	},

	/// Print the handoff URL for a session without starting it
	HandoffUrl {
		#[command(subcommand)]
		command: SessionArgs,
	},
}

/// The three session kinds, shared by `handoff-url`.
#[derive(Subcommand, Debug, Clone)]
pub enum SessionArgs {
	Connect(ConnectArgs),
	Create(CreateArgs),
	Template(TemplateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
	/// Remote user
	#[arg(required_unless_present = "identity", conflicts_with = "identity")]
	pub user: Option<String>,

	/// Remote host
	#[arg(required_unless_present = "identity", conflicts_with = "identity")]
	pub host: Option<String>,

	/// Identity uuid to take the host from
	#[arg(long, value_name = "UUID", requires = "identity_user")]
	pub identity: Option<String>,

	/// Identity user to connect as
	#[arg(long = "user", id = "identity_user", value_name = "NAME", requires = "identity")]
	pub identity_user: Option<String>,

	/// Alias to target instead of the identity's default
	#[arg(long, requires = "identity")]
	pub alias: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
	/// New identity as user@host
	pub user_host: String,

	/// Template to base the identity on
	#[arg(long, short)]
	pub template: Option<String>,

	/// Comment for generated keys
	#[arg(long)]
	pub key_comment: Option<String>,

	/// Generate legacy (RSA) keys
	#[arg(long)]
	pub legacy: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TemplateArgs {
	/// generate-sk, generate-opk or generate-keys
	pub action: TemplateAction,

	/// Template name
	pub name: String,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_connect_positional() {
		let cli = Cli::try_parse_from(["sshui", "connect", "bob", "h1"]).unwrap();
		match cli.command {
			Commands::Connect(args) => {
				assert_eq!(args.user.as_deref(), Some("bob"));
				assert_eq!(args.host.as_deref(), Some("h1"));
				assert!(args.identity.is_none());
			}
			other => panic!("expected connect, got {other:?}"),
		}
	}

	#[test]
	fn parse_connect_by_identity() {
		let cli = Cli::try_parse_from(["sshui", "connect", "--identity", "0f8e", "--user", "deploy", "--alias", "db1"]).unwrap();
		match cli.command {
			Commands::Connect(args) => {
				assert_eq!(args.identity.as_deref(), Some("0f8e"));
				assert_eq!(args.identity_user.as_deref(), Some("deploy"));
				assert_eq!(args.alias.as_deref(), Some("db1"));
				assert!(args.user.is_none());
			}
			other => panic!("expected connect, got {other:?}"),
		}
	}

	#[test]
	fn connect_requires_a_target() {
		assert!(Cli::try_parse_from(["sshui", "connect"]).is_err());
		assert!(Cli::try_parse_from(["sshui", "connect", "--identity", "0f8e"]).is_err());
		assert!(Cli::try_parse_from(["sshui", "connect", "bob", "h1", "--alias", "db1"]).is_err());
	}

	#[test]
	fn parse_template_action() {
		let cli = Cli::try_parse_from(["sshui", "template", "generate-opk", "team"]).unwrap();
		match cli.command {
			Commands::Template(args) => {
				assert_eq!(args.action, TemplateAction::GenerateOpk);
				assert_eq!(args.name, "team");
			}
			other => panic!("expected template, got {other:?}"),
		}
		assert!(Cli::try_parse_from(["sshui", "template", "rotate", "team"]).is_err());
	}

	#[test]
	fn parse_global_flags_after_subcommand() {
		let cli = Cli::try_parse_from([
			"sshui",
			"handoff-url",
			"create",
			"alice@h2",
			"--legacy",
			"-vv",
			"--framing",
			"json",
			"--endpoint",
			"http://10.0.0.5:8080",
		])
		.unwrap();
		assert_eq!(cli.verbose, 2);
		assert_eq!(cli.framing, Some(Framing::Json));
		assert_eq!(cli.endpoint.as_deref(), Some("http://10.0.0.5:8080"));
		match cli.command {
			Commands::HandoffUrl {
				command: SessionArgs::Create(args),
			} => {
				assert_eq!(args.user_host, "alice@h2");
				assert!(args.legacy);
				assert!(args.template.is_none());
			}
			other => panic!("expected handoff-url create, got {other:?}"),
		}
	}
}
