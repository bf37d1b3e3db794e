use std::path::PathBuf;

use sshui::{HandoffError, SessionError};
use sshui_runtime::ChannelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("failed to read {path}: {source}")]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid config {path}: {source}")]
	Config {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error("invalid identity list {path}: {reason}")]
	Identities { path: PathBuf, reason: String },

	#[error("--identity needs an identity list (--identities or `identities` in the config)")]
	NoIdentities,

	#[error("identity `{0}` not found")]
	UnknownIdentity(String),

	#[error("identity `{identity}` has no user `{user}`")]
	UnknownUser { identity: String, user: String },

	#[error("identity `{identity}` has no alias `{alias}`")]
	UnknownAlias { identity: String, alias: String },

	#[error("`{0}` is not a handoff url")]
	NotAHandoff(String),

	#[error("handoff window has no session payload")]
	NothingToResume,

	#[error("session failed: {0}")]
	SessionFailed(ChannelError),

	#[error(transparent)]
	Session(#[from] SessionError),

	#[error(transparent)]
	Handoff(#[from] HandoffError),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;
