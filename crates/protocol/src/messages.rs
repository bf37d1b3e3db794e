//! Control messages exchanged over the terminal channel.
//!
//! Every message is a named event with a JSON payload:
//!
//! | Direction | Event              | Payload                      |
//! |-----------|--------------------|------------------------------|
//! | out       | `connect_terminal` | the full [`SessionDescriptor`] |
//! | out       | `input`            | `{"data": string}`           |
//! | out       | `resize`           | `{"cols": int, "rows": int}` |
//! | in        | `output`           | `{"data": string}`           |
//! | in        | `disconnect_msg`   | `{"data": string}`           |
//! | in        | `session_ended`    | ignored                      |

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::descriptor::SessionDescriptor;
use crate::error::{ProtocolError, Result};

pub const CONNECT_TERMINAL: &str = "connect_terminal";
pub const INPUT: &str = "input";
pub const RESIZE: &str = "resize";
pub const OUTPUT: &str = "output";
pub const DISCONNECT_MSG: &str = "disconnect_msg";
pub const SESSION_ENDED: &str = "session_ended";

/// Text carried by `input`, `output` and `disconnect_msg`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPayload {
	pub data: String,
}

/// Requested pseudo-terminal geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizePayload {
	pub cols: u16,
	pub rows: u16,
}

/// Messages the client sends to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
	ConnectTerminal(SessionDescriptor),
	Input(TextPayload),
	Resize(ResizePayload),
}

impl OutboundMessage {
	pub fn input(data: impl Into<String>) -> Self {
		OutboundMessage::Input(TextPayload { data: data.into() })
	}

	pub fn resize(cols: u16, rows: u16) -> Self {
		OutboundMessage::Resize(ResizePayload { cols, rows })
	}

	pub fn event_name(&self) -> &'static str {
		match self {
			OutboundMessage::ConnectTerminal(_) => CONNECT_TERMINAL,
			OutboundMessage::Input(_) => INPUT,
			OutboundMessage::Resize(_) => RESIZE,
		}
	}

	pub fn payload(&self) -> Result<Value> {
		let value = match self {
			OutboundMessage::ConnectTerminal(descriptor) => serde_json::to_value(descriptor)?,
			OutboundMessage::Input(text) => serde_json::to_value(text)?,
			OutboundMessage::Resize(size) => serde_json::to_value(size)?,
		};
		Ok(value)
	}
}

/// Messages the backend sends to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
	/// Terminal output to append to the display.
	Output(String),
	/// Backend is ending the session and explains why.
	DisconnectMsg(String),
	/// The backend process exited.
	SessionEnded,
}

impl InboundMessage {
	/// Event names the client subscribes to.
	pub const EVENTS: [&'static str; 3] = [OUTPUT, DISCONNECT_MSG, SESSION_ENDED];

	/// Decodes a named inbound event.
	///
	/// Returns `Ok(None)` for events this client does not understand and an
	/// error when a known event carries a payload of the wrong shape.
	pub fn decode(event: &str, payload: Value) -> Result<Option<Self>> {
		let text = |payload: Value| {
			serde_json::from_value::<TextPayload>(payload)
				.map(|p| p.data)
				.map_err(|source| ProtocolError::MalformedPayload {
					event: event.to_string(),
					source,
				})
		};

		match event {
			OUTPUT => text(payload).map(|data| Some(InboundMessage::Output(data))),
			DISCONNECT_MSG => text(payload).map(|data| Some(InboundMessage::DisconnectMsg(data))),
			SESSION_ENDED => Ok(Some(InboundMessage::SessionEnded)),
			_ => Ok(None),
		}
	}

	pub fn event_name(&self) -> &'static str {
		match self {
			InboundMessage::Output(_) => OUTPUT,
			InboundMessage::DisconnectMsg(_) => DISCONNECT_MSG,
			InboundMessage::SessionEnded => SESSION_ENDED,
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::descriptor::{SessionCommand, SessionId};

	#[test]
	fn outbound_payload_shapes() {
		assert_eq!(OutboundMessage::input("ls\r").payload().unwrap(), json!({"data": "ls\r"}));
		assert_eq!(OutboundMessage::resize(120, 40).payload().unwrap(), json!({"cols": 120, "rows": 40}));

		let desc = SessionDescriptor::with_session_id(SessionCommand::connect("bob", "h1"), SessionId::new("t1").unwrap());
		let msg = OutboundMessage::ConnectTerminal(desc);
		assert_eq!(msg.event_name(), CONNECT_TERMINAL);
		assert_eq!(msg.payload().unwrap()["term_id"], "t1");
	}

	#[test]
	fn inbound_decode_known_events() {
		assert_eq!(
			InboundMessage::decode(OUTPUT, json!({"data": "hello"})).unwrap(),
			Some(InboundMessage::Output("hello".into()))
		);
		assert_eq!(
			InboundMessage::decode(DISCONNECT_MSG, json!({"data": "bye"})).unwrap(),
			Some(InboundMessage::DisconnectMsg("bye".into()))
		);
		assert_eq!(InboundMessage::decode(SESSION_ENDED, json!({})).unwrap(), Some(InboundMessage::SessionEnded));
		assert_eq!(InboundMessage::decode(SESSION_ENDED, Value::Null).unwrap(), Some(InboundMessage::SessionEnded));
	}

	#[test]
	fn inbound_decode_unknown_event_is_ignored() {
		assert_eq!(InboundMessage::decode("heartbeat", json!({})).unwrap(), None);
	}

	#[test]
	fn inbound_decode_rejects_malformed_output() {
		let err = InboundMessage::decode(OUTPUT, json!({"text": "nope"})).unwrap_err();
		assert!(matches!(err, ProtocolError::MalformedPayload { ref event, .. } if event == OUTPUT));
	}
}
