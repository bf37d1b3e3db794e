//! WebSocket channel binding driven by a tokio task.
//!
//! `connect` spawns one connection task per live connection. The task owns
//! the socket: it performs the framing handshake, forwards queued outbound
//! frames in order, answers heartbeats and dispatches inbound events to the
//! shared [`HandlerRegistry`] in arrival order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tracing::{debug, trace, warn};
use url::Url;

use crate::binding::{CONNECT, CONNECT_ERROR, ChannelBinding, DISCONNECT, EventHandler, HandlerRegistry};
use crate::error::{ChannelError, Result};
use crate::framing::{Frame, Framing};

const AUTH_COOKIE: &str = "auth_token";

/// A [`ChannelBinding`] over a WebSocket connection.
pub struct WebSocketBinding {
	framing: Framing,
	auth_token: Option<String>,
	handlers: HandlerRegistry,
	live: Option<LiveConnection>,
}

struct LiveConnection {
	outbound: mpsc::UnboundedSender<String>,
	connected: Arc<AtomicBool>,
	task: JoinHandle<()>,
}

impl WebSocketBinding {
	pub fn new(framing: Framing) -> Self {
		Self {
			framing,
			auth_token: None,
			handlers: HandlerRegistry::new(),
			live: None,
		}
	}

	/// Sends `token` as the backend's auth cookie on the upgrade request.
	pub fn with_auth_token(mut self, token: Option<String>) -> Self {
		self.auth_token = token;
		self
	}

	pub fn framing(&self) -> Framing {
		self.framing
	}
}

impl ChannelBinding for WebSocketBinding {
	fn connect(&mut self, endpoint: &str) -> Result<()> {
		if self.live.is_some() {
			return Err(ChannelError::AlreadyConnected);
		}

		let url = self.framing.websocket_url(endpoint)?;
		let request = build_request(&url, self.auth_token.as_deref())?;
		let runtime = tokio::runtime::Handle::try_current().map_err(|_| ChannelError::NoRuntime)?;

		let (outbound, outbound_rx) = mpsc::unbounded_channel();
		let connected = Arc::new(AtomicBool::new(false));
		debug!(target = "sshui.channel", url = %url, framing = %self.framing, "connecting");

		let task = runtime.spawn(run_connection(
			request,
			self.framing,
			self.handlers.clone(),
			outbound_rx,
			Arc::clone(&connected),
		));

		self.live = Some(LiveConnection { outbound, connected, task });
		Ok(())
	}

	fn emit(&mut self, event: &str, payload: Value) -> Result<()> {
		let live = self.live.as_ref().ok_or(ChannelError::NotConnected)?;
		let frame = self.framing.encode_event(event, &payload)?;
		trace!(target = "sshui.channel", event, "emit");
		live.outbound
			.send(frame)
			.map_err(|_| ChannelError::ConnectionLost("connection task has ended".into()))
	}

	fn on(&mut self, event: &str, handler: EventHandler) {
		self.handlers.register(event, handler);
	}

	fn disconnect(&mut self) -> bool {
		let Some(live) = self.live.take() else {
			return false;
		};
		live.connected.store(false, Ordering::SeqCst);
		// Dropping the sender asks the task to say goodbye and close the socket.
		drop(live.outbound);
		if live.task.is_finished() {
			debug!(target = "sshui.channel", "connection task already finished");
		}
		true
	}

	fn is_connected(&self) -> bool {
		self.live.as_ref().is_some_and(|live| live.connected.load(Ordering::SeqCst))
	}
}

impl Drop for WebSocketBinding {
	fn drop(&mut self) {
		self.disconnect();
	}
}

fn build_request(url: &Url, auth_token: Option<&str>) -> Result<Request> {
	let invalid = |reason: String| ChannelError::InvalidEndpoint {
		endpoint: url.to_string(),
		reason,
	};

	let mut request = url.as_str().into_client_request().map_err(|e| invalid(e.to_string()))?;
	if let Some(token) = auth_token {
		let cookie = HeaderValue::from_str(&format!("{AUTH_COOKIE}={token}")).map_err(|e| invalid(e.to_string()))?;
		request.headers_mut().insert(COOKIE, cookie);
	}
	Ok(request)
}

/// Reports a failure through the lifecycle event matching the connection phase.
fn report_failure(handlers: &HandlerRegistry, connected: &AtomicBool, reason: String) {
	if connected.swap(false, Ordering::SeqCst) {
		handlers.dispatch(DISCONNECT, json!({ "reason": reason }));
	} else {
		handlers.dispatch(CONNECT_ERROR, json!({ "message": reason }));
	}
}

async fn run_connection(
	request: Request,
	framing: Framing,
	handlers: HandlerRegistry,
	mut outbound: mpsc::UnboundedReceiver<String>,
	connected: Arc<AtomicBool>,
) {
	let mut pending: Vec<String> = Vec::new();

	let dialing = tokio_tungstenite::connect_async(request);
	tokio::pin!(dialing);
	let socket = loop {
		tokio::select! {
			result = &mut dialing => match result {
				Ok((socket, _response)) => break socket,
				Err(err) => {
					report_failure(&handlers, &connected, err.to_string());
					return;
				}
			},
			frame = outbound.recv() => match frame {
				Some(frame) => pending.push(frame),
				None => {
					debug!(target = "sshui.channel", "disconnect requested while dialing");
					return;
				}
			},
		}
	};

	let (mut sink, mut stream) = socket.split();
	let mut established = false;

	if framing.connects_on_open() {
		established = true;
		connected.store(true, Ordering::SeqCst);
		for frame in pending.drain(..) {
			if let Err(err) = sink.send(Message::Text(frame.into())).await {
				report_failure(&handlers, &connected, err.to_string());
				return;
			}
		}
		handlers.dispatch(CONNECT, json!({}));
	}

	loop {
		tokio::select! {
			frame = outbound.recv() => match frame {
				Some(frame) if established => {
					if let Err(err) = sink.send(Message::Text(frame.into())).await {
						report_failure(&handlers, &connected, err.to_string());
						return;
					}
				}
				Some(frame) => pending.push(frame),
				None => {
					if let Some(packet) = framing.disconnect_packet() {
						let _ = sink.send(Message::Text(packet.into())).await;
					}
					let _ = sink.close().await;
					connected.store(false, Ordering::SeqCst);
					debug!(target = "sshui.channel", "closed by client");
					return;
				}
			},
			message = stream.next() => match message {
				Some(Ok(Message::Text(text))) => {
					let reply = match framing.decode(&text) {
						Ok(Frame::Open) => framing.connect_packet(),
						Ok(Frame::Ping) => framing.pong_packet(),
						Ok(Frame::Connected) => {
							established = true;
							connected.store(true, Ordering::SeqCst);
							for frame in pending.drain(..) {
								if let Err(err) = sink.send(Message::Text(frame.into())).await {
									report_failure(&handlers, &connected, err.to_string());
									return;
								}
							}
							handlers.dispatch(CONNECT, json!({}));
							None
						}
						Ok(Frame::ConnectError(message)) => {
							connected.store(false, Ordering::SeqCst);
							handlers.dispatch(CONNECT_ERROR, json!({ "message": message }));
							return;
						}
						Ok(Frame::Disconnected) | Ok(Frame::Close) => {
							report_failure(&handlers, &connected, "server disconnect".into());
							return;
						}
						Ok(Frame::Event { name, payload }) => {
							handlers.dispatch(&name, payload);
							None
						}
						Ok(Frame::Pong) | Ok(Frame::Noop) => None,
						Err(err) => {
							warn!(target = "sshui.channel", error = %err, "dropping undecodable frame");
							None
						}
					};
					if let Some(packet) = reply {
						if let Err(err) = sink.send(Message::Text(packet.into())).await {
							report_failure(&handlers, &connected, err.to_string());
							return;
						}
					}
				}
				Some(Ok(Message::Close(_))) | None => {
					report_failure(&handlers, &connected, "transport close".into());
					return;
				}
				Some(Ok(_)) => {}
				Some(Err(err)) => {
					report_failure(&handlers, &connected, format!("transport error: {err}"));
					return;
				}
			},
		}
	}
}
