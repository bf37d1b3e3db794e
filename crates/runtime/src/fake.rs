//! Fake channel binding for unit-testing session logic without a backend.
//!
//! # Example
//!
//! ```ignore
//! let (channel, controller) = FakeChannelBuilder::new().build();
//! // hand `channel` to the code under test, then drive it:
//! controller.complete_connect();
//! controller.inject("output", json!({"data": "hello"}));
//! let sent = controller.take_sent();
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::binding::{CONNECT, CONNECT_ERROR, ChannelBinding, DISCONNECT, EventHandler, HandlerRegistry};
use crate::error::{ChannelError, Result};

/// Builder for fake channel instances.
#[derive(Default)]
pub struct FakeChannelBuilder {
	refuse_connect: Option<String>,
}

impl FakeChannelBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Makes `connect` fail synchronously with [`ChannelError::ConnectFailed`].
	pub fn refuse_connect(mut self, message: impl Into<String>) -> Self {
		self.refuse_connect = Some(message.into());
		self
	}

	/// Builds the binding and a controller for driving it and inspecting traffic.
	pub fn build(self) -> (FakeChannel, FakeChannelController) {
		let handlers = HandlerRegistry::new();
		let state = Arc::new(Mutex::new(FakeState::default()));

		let channel = FakeChannel {
			handlers: handlers.clone(),
			state: Arc::clone(&state),
			refuse_connect: self.refuse_connect,
		};
		let controller = FakeChannelController { handlers, state };
		(channel, controller)
	}
}

#[derive(Default)]
struct FakeState {
	endpoint: Option<String>,
	live: bool,
	connected: bool,
	sent: Vec<(String, Value)>,
	teardowns: usize,
}

/// In-memory [`ChannelBinding`]; emits are recorded instead of sent.
pub struct FakeChannel {
	handlers: HandlerRegistry,
	state: Arc<Mutex<FakeState>>,
	refuse_connect: Option<String>,
}

impl ChannelBinding for FakeChannel {
	fn connect(&mut self, endpoint: &str) -> Result<()> {
		if let Some(message) = &self.refuse_connect {
			return Err(ChannelError::ConnectFailed(message.clone()));
		}
		let mut state = self.state.lock();
		if state.live {
			return Err(ChannelError::AlreadyConnected);
		}
		state.live = true;
		state.endpoint = Some(endpoint.to_string());
		Ok(())
	}

	fn emit(&mut self, event: &str, payload: Value) -> Result<()> {
		let mut state = self.state.lock();
		if !state.live {
			return Err(ChannelError::NotConnected);
		}
		state.sent.push((event.to_string(), payload));
		Ok(())
	}

	fn on(&mut self, event: &str, handler: EventHandler) {
		self.handlers.register(event, handler);
	}

	fn disconnect(&mut self) -> bool {
		let mut state = self.state.lock();
		if !state.live {
			return false;
		}
		state.live = false;
		state.connected = false;
		state.teardowns += 1;
		true
	}

	fn is_connected(&self) -> bool {
		self.state.lock().connected
	}
}

/// Drives a [`FakeChannel`] from the backend's side.
#[derive(Clone)]
pub struct FakeChannelController {
	handlers: HandlerRegistry,
	state: Arc<Mutex<FakeState>>,
}

impl FakeChannelController {
	/// Marks the connection established and dispatches [`CONNECT`].
	pub fn complete_connect(&self) {
		self.state.lock().connected = true;
		self.handlers.dispatch(CONNECT, json!({}));
	}

	/// Dispatches [`CONNECT_ERROR`] with `message`.
	pub fn fail_connect(&self, message: &str) {
		{
			let mut state = self.state.lock();
			state.live = false;
			state.connected = false;
		}
		self.handlers.dispatch(CONNECT_ERROR, json!({ "message": message }));
	}

	/// Simulates the server side dropping the connection.
	pub fn drop_connection(&self, reason: &str) {
		{
			let mut state = self.state.lock();
			state.live = false;
			state.connected = false;
		}
		self.handlers.dispatch(DISCONNECT, json!({ "reason": reason }));
	}

	/// Injects an inbound event as if the backend sent it.
	pub fn inject(&self, event: &str, payload: Value) {
		self.handlers.dispatch(event, payload);
	}

	/// Takes all recorded emits, clearing the buffer.
	pub fn take_sent(&self) -> Vec<(String, Value)> {
		std::mem::take(&mut self.state.lock().sent)
	}

	/// Names of recorded emits, in order, without clearing.
	pub fn sent_events(&self) -> Vec<String> {
		self.state.lock().sent.iter().map(|(event, _)| event.clone()).collect()
	}

	pub fn endpoint(&self) -> Option<String> {
		self.state.lock().endpoint.clone()
	}

	/// Whether the binding holds a live connection.
	pub fn is_live(&self) -> bool {
		self.state.lock().live
	}

	/// How many times `disconnect` actually tore a connection down.
	pub fn teardown_count(&self) -> usize {
		self.state.lock().teardowns
	}
}
