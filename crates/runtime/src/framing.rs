//! Text framing for channel events over a WebSocket.
//!
//! # Socket.IO (Engine.IO v4)
//!
//! The backend is a Socket.IO server. Over a raw WebSocket transport every
//! frame starts with an Engine.IO packet type, and `message` packets carry a
//! Socket.IO packet:
//!
//! ```text
//! 0{"sid":"..","pingInterval":25000,..}   server open handshake
//! 2 / 3                                   ping / pong
//! 40                                      client namespace connect
//! 40{"sid":".."}                          server connect ack
//! 42["output",{"data":"..."}]             event
//! 44{"message":".."}                      connect error
//! 41                                      namespace disconnect
//! ```
//!
//! # JSON
//!
//! One text frame per event: `{"event": "output", "data": {"data": "..."}}`.
//! The connection counts as established as soon as the WebSocket opens.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use crate::error::{ChannelError, FramingError};

const SOCKET_IO_PATH: &str = "/socket.io/";

/// Wire framing used by a WebSocket binding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
	/// Socket.IO v5 packets over Engine.IO v4 (the backend's native transport).
	#[default]
	SocketIo,
	/// Plain JSON envelopes, one event per frame.
	Json,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
	Open,
	Ping,
	Pong,
	Close,
	Noop,
	Connected,
	ConnectError(String),
	Disconnected,
	Event { name: String, payload: Value },
}

impl Framing {
	/// Maps an HTTP(S) or WS(S) backend endpoint to the WebSocket URL to dial.
	pub fn websocket_url(&self, endpoint: &str) -> Result<Url, ChannelError> {
		let invalid = |reason: String| ChannelError::InvalidEndpoint {
			endpoint: endpoint.to_string(),
			reason,
		};

		let mut url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
		let scheme = match url.scheme() {
			"http" | "ws" => "ws",
			"https" | "wss" => "wss",
			other => return Err(invalid(format!("unsupported scheme `{other}`"))),
		};
		url.set_scheme(scheme).map_err(|()| invalid(format!("cannot switch scheme to `{scheme}`")))?;

		if *self == Framing::SocketIo {
			if url.path().is_empty() || url.path() == "/" {
				url.set_path(SOCKET_IO_PATH);
			}
			url.query_pairs_mut().clear().append_pair("EIO", "4").append_pair("transport", "websocket");
		}
		Ok(url)
	}

	/// Frame the client sends after the transport opens, if the framing needs one.
	pub fn connect_packet(&self) -> Option<&'static str> {
		match self {
			Framing::SocketIo => Some("40"),
			Framing::Json => None,
		}
	}

	/// Frame the client sends before a voluntary close, if any.
	pub fn disconnect_packet(&self) -> Option<&'static str> {
		match self {
			Framing::SocketIo => Some("41"),
			Framing::Json => None,
		}
	}

	pub fn pong_packet(&self) -> Option<&'static str> {
		match self {
			Framing::SocketIo => Some("3"),
			Framing::Json => None,
		}
	}

	/// Whether the connection is usable as soon as the WebSocket handshake completes.
	pub fn connects_on_open(&self) -> bool {
		*self == Framing::Json
	}

	pub fn encode_event(&self, event: &str, payload: &Value) -> Result<String, FramingError> {
		let frame = match self {
			Framing::SocketIo => json!([event, payload]),
			Framing::Json => json!({"event": event, "data": payload}),
		};
		let body = serde_json::to_string(&frame).map_err(|e| FramingError::Encode {
			event: event.to_string(),
			reason: e.to_string(),
		})?;
		Ok(match self {
			Framing::SocketIo => format!("42{body}"),
			Framing::Json => body,
		})
	}

	pub fn decode(&self, text: &str) -> Result<Frame, FramingError> {
		match self {
			Framing::SocketIo => decode_engine_packet(text),
			Framing::Json => decode_json_envelope(text),
		}
	}
}

impl FromStr for Framing {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"socketio" | "socket.io" => Ok(Framing::SocketIo),
			"json" => Ok(Framing::Json),
			_ => Err(format!("unknown framing: {s}")),
		}
	}
}

impl fmt::Display for Framing {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Framing::SocketIo => write!(f, "socketio"),
			Framing::Json => write!(f, "json"),
		}
	}
}

fn decode_engine_packet(text: &str) -> Result<Frame, FramingError> {
	let mut chars = text.chars();
	let kind = chars.next().ok_or(FramingError::Empty)?;
	match kind {
		'0' => Ok(Frame::Open),
		'1' => Ok(Frame::Close),
		'2' => Ok(Frame::Ping),
		'3' => Ok(Frame::Pong),
		'4' => decode_socket_packet(chars.as_str()),
		'5' => Err(FramingError::Unsupported("transport upgrade".into())),
		'6' => Ok(Frame::Noop),
		other => Err(FramingError::UnknownPacket(other)),
	}
}

fn decode_socket_packet(body: &str) -> Result<Frame, FramingError> {
	let mut chars = body.chars();
	let kind = chars.next().ok_or(FramingError::Empty)?;
	let rest = strip_namespace(chars.as_str());
	match kind {
		'0' => Ok(Frame::Connected),
		'1' => Ok(Frame::Disconnected),
		'2' => decode_event_array(rest.trim_start_matches(|c: char| c.is_ascii_digit())),
		'4' => {
			let message = serde_json::from_str::<Value>(rest)
				.ok()
				.and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
				.unwrap_or_else(|| rest.to_string());
			Ok(Frame::ConnectError(message))
		}
		'3' => Err(FramingError::Unsupported("ack".into())),
		'5' | '6' => Err(FramingError::Unsupported("binary packet".into())),
		other => Err(FramingError::UnknownPacket(other)),
	}
}

/// Drops a `/namespace,` prefix; the default namespace carries none.
fn strip_namespace(rest: &str) -> &str {
	if rest.starts_with('/') {
		match rest.find(',') {
			Some(idx) => &rest[idx + 1..],
			None => "",
		}
	} else {
		rest
	}
}

fn decode_event_array(body: &str) -> Result<Frame, FramingError> {
	let value: Value = serde_json::from_str(body).map_err(|e| FramingError::MalformedEvent(e.to_string()))?;
	let Value::Array(mut items) = value else {
		return Err(FramingError::MalformedEvent("event body is not an array".into()));
	};
	if items.is_empty() {
		return Err(FramingError::MalformedEvent("event array is empty".into()));
	}
	let payload = if items.len() > 1 { items.swap_remove(1) } else { Value::Null };
	let Value::String(name) = items.swap_remove(0) else {
		return Err(FramingError::MalformedEvent("event name is not a string".into()));
	};
	Ok(Frame::Event { name, payload })
}

fn decode_json_envelope(text: &str) -> Result<Frame, FramingError> {
	#[derive(Deserialize)]
	struct Envelope {
		event: String,
		#[serde(default)]
		data: Value,
	}

	let envelope: Envelope = serde_json::from_str(text).map_err(|e| FramingError::MalformedEvent(e.to_string()))?;
	Ok(Frame::Event {
		name: envelope.event,
		payload: envelope.data,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn socketio_url_targets_engine_endpoint() {
		let url = Framing::SocketIo.websocket_url("http://127.0.0.1:8080").unwrap();
		assert_eq!(url.as_str(), "ws://127.0.0.1:8080/socket.io/?EIO=4&transport=websocket");

		let url = Framing::SocketIo.websocket_url("https://console.example/ssh/").unwrap();
		assert_eq!(url.as_str(), "wss://console.example/ssh/?EIO=4&transport=websocket");
	}

	#[test]
	fn json_url_keeps_path_and_swaps_scheme() {
		let url = Framing::Json.websocket_url("http://localhost:9000/term?x=1").unwrap();
		assert_eq!(url.as_str(), "ws://localhost:9000/term?x=1");
	}

	#[test]
	fn unsupported_scheme_is_rejected() {
		let err = Framing::Json.websocket_url("ftp://host/").unwrap_err();
		assert!(matches!(err, ChannelError::InvalidEndpoint { .. }));
		assert!(Framing::Json.websocket_url("not a url").is_err());
	}

	#[test]
	fn socketio_event_encoding() {
		let frame = Framing::SocketIo.encode_event("resize", &json!({"cols": 80, "rows": 24})).unwrap();
		assert_eq!(frame, r#"42["resize",{"cols":80,"rows":24}]"#);
	}

	#[test]
	fn json_event_encoding() {
		let frame = Framing::Json.encode_event("input", &json!({"data": "a"})).unwrap();
		assert_eq!(serde_json::from_str::<Value>(&frame).unwrap(), json!({"event": "input", "data": {"data": "a"}}));
	}

	#[test]
	fn socketio_decodes_handshake_and_heartbeat() {
		let f = Framing::SocketIo;
		assert_eq!(f.decode(r#"0{"sid":"abc","pingInterval":25000}"#).unwrap(), Frame::Open);
		assert_eq!(f.decode("2").unwrap(), Frame::Ping);
		assert_eq!(f.decode(r#"40{"sid":"xyz"}"#).unwrap(), Frame::Connected);
		assert_eq!(f.decode("41").unwrap(), Frame::Disconnected);
		assert_eq!(f.decode("6").unwrap(), Frame::Noop);
	}

	#[test]
	fn socketio_decodes_events_with_namespace_and_ack_id() {
		let f = Framing::SocketIo;
		let expected = Frame::Event {
			name: "output".into(),
			payload: json!({"data": "hi"}),
		};
		assert_eq!(f.decode(r#"42["output",{"data":"hi"}]"#).unwrap(), expected);
		assert_eq!(f.decode(r#"42/term,["output",{"data":"hi"}]"#).unwrap(), expected);
		assert_eq!(f.decode(r#"4217["output",{"data":"hi"}]"#).unwrap(), expected);
		assert_eq!(
			f.decode(r#"42["session_ended"]"#).unwrap(),
			Frame::Event {
				name: "session_ended".into(),
				payload: Value::Null
			}
		);
	}

	#[test]
	fn socketio_connect_error_carries_message() {
		assert_eq!(
			Framing::SocketIo.decode(r#"44{"message":"Not authorized"}"#).unwrap(),
			Frame::ConnectError("Not authorized".into())
		);
	}

	#[test]
	fn socketio_rejects_garbage() {
		let f = Framing::SocketIo;
		assert_eq!(f.decode("").unwrap_err(), FramingError::Empty);
		assert_eq!(f.decode("9").unwrap_err(), FramingError::UnknownPacket('9'));
		assert!(matches!(f.decode("42{}").unwrap_err(), FramingError::MalformedEvent(_)));
		assert!(matches!(f.decode("42[1]").unwrap_err(), FramingError::MalformedEvent(_)));
	}

	#[test]
	fn framing_parses_from_str() {
		assert_eq!("socket.io".parse::<Framing>().unwrap(), Framing::SocketIo);
		assert_eq!("JSON".parse::<Framing>().unwrap(), Framing::Json);
		assert!("grpc".parse::<Framing>().is_err());
		assert_eq!(Framing::default().to_string(), "socketio");
	}
}
