//! Error types for channel bindings.

use thiserror::Error;

/// Result alias for channel operations.
pub type Result<T> = std::result::Result<T, ChannelError>;

/// Transport-level failures.
///
/// Messages are captured as strings so errors can be cloned into session
/// outcomes and compared in tests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
	#[error("channel already has a live connection")]
	AlreadyConnected,

	#[error("channel is not connected")]
	NotConnected,

	#[error("invalid endpoint `{endpoint}`: {reason}")]
	InvalidEndpoint { endpoint: String, reason: String },

	#[error("no async runtime available to drive the channel")]
	NoRuntime,

	#[error("connection failed: {0}")]
	ConnectFailed(String),

	#[error("connection lost: {0}")]
	ConnectionLost(String),

	#[error(transparent)]
	Framing(#[from] FramingError),
}

/// Wire framing failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
	#[error("empty frame")]
	Empty,

	#[error("unknown packet type `{0}`")]
	UnknownPacket(char),

	#[error("unsupported packet: {0}")]
	Unsupported(String),

	#[error("malformed event frame: {0}")]
	MalformedEvent(String),

	#[error("failed to encode `{event}`: {reason}")]
	Encode { event: String, reason: String },
}
