//! The terminal session state machine.
//!
//! A [`TerminalSessionController`] owns at most one channel/display pair at a
//! time. Channel callbacks and display input never touch controller state
//! directly: they queue [`SessionEvent`]s tagged with the pair's generation,
//! and the controller applies them one at a time from [`handle`], [`pump`] or
//! the async [`run`](TerminalSessionController::run) driver.
//!
//! [`handle`]: TerminalSessionController::handle
//! [`pump`]: TerminalSessionController::pump

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use sshui_protocol::{InboundMessage, OutboundMessage, SessionDescriptor};
use sshui_runtime::{CONNECT, CONNECT_ERROR, ChannelBinding, ChannelError, DISCONNECT, EventHandler, lifecycle_text};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::detach::DetachCoordinator;
use crate::display::{DisplaySurface, Geometry};
use crate::error::{Result, SessionError};
use crate::event::{ChannelSignal, SessionEvent, SessionEvents, SessionOutcome, SessionState};
use crate::host::{HostMode, SessionHost};


/// Written to the display once the channel connects.
pub const CONNECTED_BANNER: &str = "\r\nConnected to backend...\r\n";

pub struct TerminalSessionController<H: SessionHost> {
	host: H,
	config: SessionConfig,
	detach: Option<DetachCoordinator>,
	state: SessionState,
	generation: u64,
	/// `generation`, shared with every [`SessionEvents`] handle.
	published: Arc<AtomicU64>,
	descriptor: Option<SessionDescriptor>,
	channel: Option<H::Channel>,
	display: Option<H::Display>,
	geometry: Option<Geometry>,
	rejection: Option<String>,
	events_tx: mpsc::UnboundedSender<SessionEvent>,
	pub(crate) events_rx: mpsc::UnboundedReceiver<SessionEvent>,
	pub(crate) settle_due: Option<Instant>,
	pub(crate) resize_due: Option<Instant>,
}

impl<H: SessionHost> TerminalSessionController<H> {
	pub fn new(host: H, config: SessionConfig) -> Self {
		let (events_tx, events_rx) = mpsc::unbounded_channel();
		Self {
			host,
			config,
			detach: None,
			state: SessionState::Idle,
			generation: 0,
			published: Arc::new(AtomicU64::new(0)),
			descriptor: None,
			channel: None,
			display: None,
			geometry: None,
			rejection: None,
			events_tx,
			events_rx,
			settle_due: None,
			resize_due: None,
		}
	}

	/// Enables [`detach`](Self::detach) using `coordinator` to build targets.
	pub fn with_detach(mut self, coordinator: DetachCoordinator) -> Self {
		self.detach = Some(coordinator);
		self
	}

	pub fn state(&self) -> SessionState {
		self.state
	}

	/// Descriptor of the live session, if any.
	pub fn descriptor(&self) -> Option<&SessionDescriptor> {
		self.descriptor.as_ref()
	}

	/// Geometry from the most recent successful fit.
	pub fn geometry(&self) -> Option<Geometry> {
		self.geometry
	}

	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	pub fn host(&self) -> &H {
		&self.host
	}

	pub fn host_mut(&mut self) -> &mut H {
		&mut self.host
	}

	/// Handle for queueing resize, close and detach requests.
	pub fn events(&self) -> SessionEvents {
		SessionEvents::new(self.events_tx.clone(), Arc::clone(&self.published))
	}

	/// Starts a session for `descriptor`.
	///
	/// Opens a new display, then connects a new channel. A session that is
	/// still live is torn down first. Nothing is created when the host cannot
	/// render a terminal.
	pub fn start(&mut self, descriptor: SessionDescriptor) -> Result<()> {
		if !self.host.terminal_available() {
			warn!(target = "sshui.session", "terminal support unavailable; not starting session");
			return Err(SessionError::CapabilityUnavailable);
		}
		if !self.state.is_at_rest() {
			debug!(target = "sshui.session", state = %self.state, "replacing live session");
			self.release();
			self.state = SessionState::Terminated;
		}

		self.generation += 1;
		self.published.store(self.generation, Ordering::SeqCst);
		self.rejection = None;
		let generation = self.generation;
		info!(
			target = "sshui.session",
			session_id = %descriptor.session_id(),
			cmd = descriptor.command().kind(),
			"starting session"
		);

		let (mut display, container) = self.host.create_display();
		let inputs = self.events_tx.clone();
		display.on_data(Box::new(move |data| {
			let _ = inputs.send(SessionEvent::Input { generation, data });
		}));
		if let Err(err) = display.open(container) {
			display.dispose();
			return Err(err);
		}
		display.set_title(&descriptor.title());
		display.focus();
		self.geometry = display.fit();

		let mut channel = self.host.create_channel();
		self.subscribe(&mut channel, generation);
		if let Err(err) = channel.connect(&self.config.endpoint) {
			warn!(target = "sshui.session", error = %err, "channel refused to connect");
			display.write(&format!("\r\nConnection error: {err}\r\n"));
			display.dispose();
			channel.disconnect();
			self.geometry = None;
			self.state = SessionState::Terminated;
			return Err(err.into());
		}

		self.display = Some(display);
		self.channel = Some(channel);
		self.descriptor = Some(descriptor);
		self.state = SessionState::Connecting;
		self.settle_due = Some(Instant::now() + self.config.settle_delay);
		Ok(())
	}

	fn subscribe(&self, channel: &mut H::Channel, generation: u64) {
		let lifecycle = |to_signal: fn(Value) -> ChannelSignal| -> EventHandler {
			let events = self.events_tx.clone();
			Box::new(move |payload| {
				let _ = events.send(SessionEvent::Channel {
					generation,
					signal: to_signal(payload),
				});
			})
		};
		channel.on(CONNECT, lifecycle(|_| ChannelSignal::Connected));
		channel.on(CONNECT_ERROR, lifecycle(|p| ChannelSignal::ConnectFailed(lifecycle_text(&p, "message"))));
		channel.on(DISCONNECT, lifecycle(|p| ChannelSignal::Lost(lifecycle_text(&p, "reason"))));

		for event in InboundMessage::EVENTS {
			let events = self.events_tx.clone();
			channel.on(
				event,
				Box::new(move |payload| {
					let signal = match InboundMessage::decode(event, payload) {
						Ok(Some(message)) => ChannelSignal::Inbound(message),
						Ok(None) => return,
						Err(err) => ChannelSignal::Malformed(err.to_string()),
					};
					let _ = events.send(SessionEvent::Channel { generation, signal });
				}),
			);
		}
	}

	/// Applies one queued event. Returns the outcome if the session ended.
	pub fn handle(&mut self, event: SessionEvent) -> Option<SessionOutcome> {
		match event {
			SessionEvent::Channel { generation, signal } => {
				if !self.is_current(generation) {
					trace!(target = "sshui.session", generation, "dropping event from a torn-down channel");
					return None;
				}
				self.on_channel(signal)
			}
			SessionEvent::Input { generation, data } => {
				if !self.is_current(generation) {
					return None;
				}
				self.forward_input(data)
			}
			SessionEvent::ViewportResized { generation } => {
				if !self.is_current(generation) {
					return None;
				}
				self.resize_due = None;
				self.sync_geometry()
			}
			SessionEvent::SettleElapsed => {
				self.settle_due = None;
				self.sync_geometry()
			}
			SessionEvent::CloseRequested { generation } => {
				if !self.is_current(generation) {
					debug!(target = "sshui.session", generation, "dropping close request for an earlier session");
					return None;
				}
				self.close()
			}
			SessionEvent::DetachRequested { generation } => {
				if !self.is_current(generation) {
					debug!(target = "sshui.session", generation, "dropping detach request for an earlier session");
					return None;
				}
				match self.detach() {
					Ok(outcome) => Some(outcome),
					Err(err) => {
						warn!(target = "sshui.session", error = %err, "detach refused");
						None
					}
				}
			}
		}
	}

	/// Generation of the current channel/display pair.
	pub(crate) fn generation(&self) -> u64 {
		self.generation
	}

	fn is_current(&self, generation: u64) -> bool {
		generation == self.generation
	}

	/// Applies every event already queued, stopping at the first outcome.
	pub fn pump(&mut self) -> Option<SessionOutcome> {
		while let Ok(event) = self.events_rx.try_recv() {
			if let Some(outcome) = self.handle(event) {
				return Some(outcome);
			}
		}
		None
	}

	fn on_channel(&mut self, signal: ChannelSignal) -> Option<SessionOutcome> {
		match signal {
			ChannelSignal::Connected => self.on_connected(),
			ChannelSignal::ConnectFailed(message) => self.fail(ChannelError::ConnectFailed(message)),
			ChannelSignal::Lost(reason) => {
				if self.state == SessionState::Closing {
					debug!(target = "sshui.session", %reason, "channel closed after backend rejection");
					return None;
				}
				self.fail(ChannelError::ConnectionLost(reason))
			}
			ChannelSignal::Inbound(InboundMessage::Output(data)) => {
				if self.state == SessionState::Active {
					if let Some(display) = self.display.as_mut() {
						display.write(&data);
					}
				}
				None
			}
			ChannelSignal::Inbound(InboundMessage::DisconnectMsg(reason)) => {
				self.on_rejected(reason);
				None
			}
			ChannelSignal::Inbound(InboundMessage::SessionEnded) => {
				debug!(target = "sshui.session", "backend session ended");
				self.close()
			}
			ChannelSignal::Malformed(err) => {
				warn!(target = "sshui.session", error = %err, "ignoring malformed backend event");
				None
			}
		}
	}

	fn on_connected(&mut self) -> Option<SessionOutcome> {
		if self.state != SessionState::Connecting {
			debug!(target = "sshui.session", state = %self.state, "ignoring connect outside connecting state");
			return None;
		}
		let Some(descriptor) = self.descriptor.clone() else {
			return None;
		};

		if let Some(display) = self.display.as_mut() {
			display.write(CONNECTED_BANNER);
		}
		if let Err(err) = self.send(OutboundMessage::ConnectTerminal(descriptor)) {
			return self.fail_with(err);
		}
		self.state = SessionState::Active;
		info!(target = "sshui.session", "session active");

		// Layout may have changed while connecting.
		self.sync_geometry()
	}

	fn on_rejected(&mut self, reason: String) {
		if !matches!(self.state, SessionState::Connecting | SessionState::Active) {
			return;
		}
		info!(target = "sshui.session", %reason, "backend ended the session");
		if let Some(display) = self.display.as_mut() {
			display.write(&format!("\r\n{reason}\r\n"));
		}
		if let Some(channel) = self.channel.as_mut() {
			channel.disconnect();
		}
		self.rejection = Some(reason);
		self.state = SessionState::Closing;
	}

	fn forward_input(&mut self, data: String) -> Option<SessionOutcome> {
		if self.state != SessionState::Active {
			trace!(target = "sshui.session", state = %self.state, "dropping input");
			return None;
		}
		match self.send(OutboundMessage::input(data)) {
			Ok(()) => None,
			Err(err) => self.fail_with(err),
		}
	}

	/// Refits the display and reports the new geometry to the backend.
	///
	/// Does nothing before the display is open. The geometry is only sent
	/// once the session is active.
	pub fn sync_geometry(&mut self) -> Option<SessionOutcome> {
		let display = self.display.as_mut()?;
		if !display.is_open() {
			return None;
		}
		let geometry = display.fit()?;
		self.geometry = Some(geometry);

		if self.state != SessionState::Active {
			return None;
		}
		trace!(target = "sshui.session", cols = geometry.cols, rows = geometry.rows, "resize");
		match self.send(OutboundMessage::resize(geometry.cols, geometry.rows)) {
			Ok(()) => None,
			Err(err) => self.fail_with(err),
		}
	}

	/// Ends the session and releases both resources.
	///
	/// Returns `None` when nothing is running. In a handoff window the window
	/// is closed as well.
	pub fn close(&mut self) -> Option<SessionOutcome> {
		if self.state.is_at_rest() {
			debug!(target = "sshui.session", state = %self.state, "close ignored");
			return None;
		}
		self.state = SessionState::Closing;
		let refresh_required = self.descriptor.as_ref().is_some_and(SessionDescriptor::mutates_backend);
		self.release();
		self.state = SessionState::Terminated;
		self.descriptor = None;

		let outcome = if self.host.mode() == HostMode::Handoff {
			self.host.close_window();
			SessionOutcome::WindowClosed
		} else if let Some(reason) = self.rejection.take() {
			SessionOutcome::Rejected { reason, refresh_required }
		} else {
			SessionOutcome::Completed { refresh_required }
		};
		info!(target = "sshui.session", refresh_required, "session closed");
		Some(outcome)
	}

	/// Moves the active session to a standalone window.
	///
	/// The new window resumes the same session id. Locally the session is
	/// torn down like [`close`](Self::close), without a refresh.
	pub fn detach(&mut self) -> Result<SessionOutcome> {
		if self.host.mode() == HostMode::Handoff {
			return Err(SessionError::DetachUnavailable);
		}
		if self.state != SessionState::Active {
			return Err(SessionError::InvalidState {
				operation: "detach",
				state: self.state,
			});
		}
		let coordinator = self.detach.as_ref().ok_or(SessionError::DetachUnavailable)?;
		let descriptor = self.descriptor.as_ref().ok_or(SessionError::InvalidState {
			operation: "detach",
			state: self.state,
		})?;

		let target = coordinator.build(descriptor)?;
		self.host.open_handoff(&target)?;
		info!(target = "sshui.session", url = %target, "session detached");

		self.release();
		self.state = SessionState::Terminated;
		self.descriptor = None;
		self.rejection = None;
		Ok(SessionOutcome::Detached { target })
	}

	fn send(&mut self, message: OutboundMessage) -> Result<()> {
		let channel = self.channel.as_mut().ok_or(ChannelError::NotConnected)?;
		let payload = message.payload()?;
		channel.emit(message.event_name(), payload)?;
		Ok(())
	}

	fn fail_with(&mut self, err: SessionError) -> Option<SessionOutcome> {
		match err {
			SessionError::Channel(error) => self.fail(error),
			other => {
				warn!(target = "sshui.session", error = %other, "failed to send to backend");
				None
			}
		}
	}

	fn fail(&mut self, error: ChannelError) -> Option<SessionOutcome> {
		if !matches!(self.state, SessionState::Connecting | SessionState::Active) {
			debug!(target = "sshui.session", state = %self.state, error = %error, "ignoring channel failure");
			return None;
		}
		warn!(target = "sshui.session", error = %error, "session failed");
		if let Some(display) = self.display.as_mut() {
			display.write(&format!("\r\nConnection error: {error}\r\n"));
		}
		self.release();
		self.state = SessionState::Terminated;
		self.descriptor = None;
		if self.host.mode() == HostMode::Handoff {
			self.host.close_window();
		}
		Some(SessionOutcome::Failed { error })
	}

	/// Drops the channel/display pair and any pending timers.
	fn release(&mut self) {
		if let Some(mut display) = self.display.take() {
			display.dispose();
		}
		if let Some(mut channel) = self.channel.take() {
			if channel.disconnect() {
				debug!(target = "sshui.session", "channel disconnected");
			}
		}
		self.geometry = None;
		self.settle_due = None;
		self.resize_due = None;
	}
}

impl<H: SessionHost> Drop for TerminalSessionController<H> {
	fn drop(&mut self) {
		self.release();
	}
}
