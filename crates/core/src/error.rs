//! Session error types.

use sshui_protocol::ProtocolError;
use sshui_runtime::ChannelError;
use thiserror::Error;

use crate::event::SessionState;

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
	/// Terminal support is not available in this host; nothing was started.
	#[error("terminal support is unavailable (terminal assets not loaded)")]
	CapabilityUnavailable,

	#[error("channel error: {0}")]
	Channel(#[from] ChannelError),

	#[error("cannot {operation} while the session is {state}")]
	InvalidState { operation: &'static str, state: SessionState },

	#[error("detach is not available in this window")]
	DetachUnavailable,

	#[error("display error: {0}")]
	Display(String),

	#[error(transparent)]
	Handoff(#[from] HandoffError),

	#[error(transparent)]
	Protocol(#[from] ProtocolError),
}

/// Failures building or reading a detach handoff.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandoffError {
	#[error("invalid handoff base `{url}`: {reason}")]
	InvalidBase { url: String, reason: String },

	#[error("invalid handoff location `{url}`: {reason}")]
	InvalidLocation { url: String, reason: String },

	#[error("handoff payload is not a session descriptor: {0}")]
	InvalidPayload(String),

	#[error("failed to serialize descriptor: {0}")]
	Serialize(String),

	#[error("failed to open handoff target: {0}")]
	Open(String),
}
