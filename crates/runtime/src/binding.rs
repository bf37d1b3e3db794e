//! The channel binding abstraction and its handler registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::Result;

/// Dispatched once the backend accepted the connection. Payload: `{}`.
pub const CONNECT: &str = "connect";
/// Dispatched when the connection could not be established. Payload: `{"message": string}`.
pub const CONNECT_ERROR: &str = "connect_error";
/// Dispatched when an established connection is lost. Payload: `{"reason": string}`.
///
/// Not dispatched for a client-initiated [`ChannelBinding::disconnect`].
pub const DISCONNECT: &str = "disconnect";

/// Callback invoked with the payload of an inbound event.
pub type EventHandler = Box<dyn FnMut(Value) + Send + 'static>;

/// A duplex, event-based connection to the backend.
///
/// Implementations hold at most one live underlying connection. Handlers
/// registered with [`on`](Self::on) survive across the binding's lifetime and
/// receive both backend events and the lifecycle events [`CONNECT`],
/// [`CONNECT_ERROR`] and [`DISCONNECT`].
pub trait ChannelBinding {
	/// Starts connecting to `endpoint`. Completion is reported through [`CONNECT`]
	/// or [`CONNECT_ERROR`].
	fn connect(&mut self, endpoint: &str) -> Result<()>;

	/// Sends a named event. Emits are delivered in call order.
	fn emit(&mut self, event: &str, payload: Value) -> Result<()>;

	/// Registers a handler for a named event.
	fn on(&mut self, event: &str, handler: EventHandler);

	/// Tears down the live connection, if any.
	///
	/// Safe to call any number of times, including before `connect` ever
	/// succeeded. Returns `true` only when a live connection was torn down.
	fn disconnect(&mut self) -> bool;

	fn is_connected(&self) -> bool;
}

/// Shared table of event handlers, cloned into connection tasks.
///
/// Handlers run while the table is locked, so they must not register further
/// handlers.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
	handlers: Arc<Mutex<HashMap<String, Vec<EventHandler>>>>,
}

impl HandlerRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&self, event: &str, handler: EventHandler) {
		self.handlers.lock().entry(event.to_string()).or_default().push(handler);
	}

	/// Invokes every handler registered for `event`, returning how many ran.
	pub fn dispatch(&self, event: &str, payload: Value) -> usize {
		let mut handlers = self.handlers.lock();
		let Some(list) = handlers.get_mut(event) else {
			tracing::trace!(target = "sshui.channel", event, "no handler registered");
			return 0;
		};
		for handler in list.iter_mut() {
			handler(payload.clone());
		}
		list.len()
	}

	pub fn clear(&self) {
		self.handlers.lock().clear();
	}
}

/// Extracts a human-readable string from a lifecycle payload field, falling back to the raw payload.
pub fn lifecycle_text(payload: &Value, field: &str) -> String {
	match payload.get(field).and_then(Value::as_str) {
		Some(text) => text.to_string(),
		None if payload.is_null() => String::from("unknown"),
		None => payload.to_string(),
	}
}
