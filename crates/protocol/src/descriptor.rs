//! Session descriptors: what the backend should run for a terminal session.
//!
//! A descriptor is serialized flat, with the command kind under `cmd` and
//! the correlation id under `term_id`:
//!
//! ```json
//! { "cmd": "connect", "user": "bob", "host": "h1", "term_id": "k3x9q0a1b2c3d" }
//! ```

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ProtocolError, Result};

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const GENERATED_ID_LEN: usize = 13;

/// Template value the backend treats as "no template".
pub const NO_TEMPLATE: &str = "none";

/// Opaque correlation id shared by every controller that drives one backend session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
	/// Generates a fresh random id (13 lowercase base-36 characters).
	pub fn generate() -> Self {
		let mut rng = rand::rng();
		let id = (0..GENERATED_ID_LEN)
			.map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
			.collect();
		Self(id)
	}

	/// Wraps an existing id, rejecting empty strings.
	pub fn new(id: impl Into<String>) -> Result<Self> {
		let id = id.into();
		if id.is_empty() {
			return Err(ProtocolError::EmptySessionId);
		}
		Ok(Self(id))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Missing or empty ids are replaced by a generated one, like a first construction.
fn session_id_or_generate<'de, D>(deserializer: D) -> std::result::Result<SessionId, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = Option::<String>::deserialize(deserializer)?;
	Ok(match raw {
		Some(id) if !id.is_empty() => SessionId(id),
		_ => SessionId::generate(),
	})
}

/// Key-generation actions accepted by the backend's template runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateAction {
	GenerateSk,
	GenerateOpk,
	GenerateKeys,
}

impl TemplateAction {
	pub fn as_str(&self) -> &'static str {
		match self {
			TemplateAction::GenerateSk => "generate-sk",
			TemplateAction::GenerateOpk => "generate-opk",
			TemplateAction::GenerateKeys => "generate-keys",
		}
	}
}

impl FromStr for TemplateAction {
	type Err = ProtocolError;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"generate-sk" => Ok(TemplateAction::GenerateSk),
			"generate-opk" => Ok(TemplateAction::GenerateOpk),
			"generate-keys" => Ok(TemplateAction::GenerateKeys),
			other => Err(ProtocolError::UnknownTemplateAction(other.to_string())),
		}
	}
}

impl fmt::Display for TemplateAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// The command a terminal session runs on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum SessionCommand {
	/// Open an SSH connection as `user` to `host`.
	Connect { user: String, host: String },
	/// Create a new identity for `user_host`, optionally from a key template.
	Create {
		user_host: String,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		template: Option<String>,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		key_comment: Option<String>,
		#[serde(default)]
		legacy: bool,
	},
	/// Run a key-generation action against a named template.
	Template { action: TemplateAction, name: String },
}

impl SessionCommand {
	pub fn connect(user: impl Into<String>, host: impl Into<String>) -> Self {
		SessionCommand::Connect {
			user: user.into(),
			host: host.into(),
		}
	}

	/// Builds a `create` command; a blank or `"none"` template and a blank comment are dropped.
	pub fn create(user_host: impl Into<String>, template: Option<&str>, key_comment: Option<&str>, legacy: bool) -> Self {
		let template = template.map(str::trim).filter(|t| !t.is_empty() && *t != NO_TEMPLATE).map(str::to_string);
		let key_comment = key_comment.map(str::trim).filter(|c| !c.is_empty()).map(str::to_string);
		SessionCommand::Create {
			user_host: user_host.into(),
			template,
			key_comment,
			legacy,
		}
	}

	pub fn template(action: TemplateAction, name: impl Into<String>) -> Self {
		SessionCommand::Template { action, name: name.into() }
	}

	/// Wire name of the command kind.
	pub fn kind(&self) -> &'static str {
		match self {
			SessionCommand::Connect { .. } => "connect",
			SessionCommand::Create { .. } => "create",
			SessionCommand::Template { .. } => "template",
		}
	}
}

/// Backend command run by one terminal session.
///
/// Immutable once built: the session id is fixed at first construction, or
/// carried over verbatim when the descriptor is rebuilt from a handoff payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescriptor {
	#[serde(flatten)]
	command: SessionCommand,
	#[serde(rename = "term_id", default = "SessionId::generate", deserialize_with = "session_id_or_generate")]
	session_id: SessionId,
}

impl SessionDescriptor {
	/// Creates a descriptor with a freshly generated session id.
	pub fn new(command: SessionCommand) -> Self {
		Self {
			command,
			session_id: SessionId::generate(),
		}
	}

	/// Creates a descriptor that reuses an existing session id.
	pub fn with_session_id(command: SessionCommand, session_id: SessionId) -> Self {
		Self { command, session_id }
	}

	pub fn connect(user: impl Into<String>, host: impl Into<String>) -> Self {
		Self::new(SessionCommand::connect(user, host))
	}

	pub fn command(&self) -> &SessionCommand {
		&self.command
	}

	pub fn session_id(&self) -> &SessionId {
		&self.session_id
	}

	/// Human-readable title shown above the terminal.
	pub fn title(&self) -> String {
		match &self.command {
			SessionCommand::Connect { user, host } => format!("Connect: {user}@{host}"),
			SessionCommand::Create { user_host, .. } => format!("Create Identity: {user_host}"),
			SessionCommand::Template { action, name } => format!("Template: {action} {name}"),
		}
	}

	/// Whether running this command can change identities or templates on the backend.
	pub fn mutates_backend(&self) -> bool {
		!matches!(self.command, SessionCommand::Connect { .. })
	}

	pub fn to_json(&self) -> Result<String> {
		Ok(serde_json::to_string(self)?)
	}

	pub fn from_json(json: &str) -> Result<Self> {
		Ok(serde_json::from_str(json)?)
	}
}
