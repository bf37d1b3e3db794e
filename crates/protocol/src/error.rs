//! Errors raised while building or decoding wire types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[derive(Debug, Error)]
pub enum ProtocolError {
	#[error("session id must not be empty")]
	EmptySessionId,

	#[error("unknown template action: {0} (expected generate-sk, generate-opk or generate-keys)")]
	UnknownTemplateAction(String),

	#[error("malformed `{event}` payload: {source}")]
	MalformedPayload {
		event: String,
		#[source]
		source: serde_json::Error,
	},

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}
