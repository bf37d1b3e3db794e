//! Session states, queued events and outcomes.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use sshui_protocol::InboundMessage;
use sshui_runtime::ChannelError;
use tokio::sync::mpsc;

use crate::detach::HandoffTarget;

/// Lifecycle state of a [`TerminalSessionController`](crate::TerminalSessionController).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
	#[default]
	Idle,
	/// Display open, waiting for the channel to connect.
	Connecting,
	/// Connected and attached to a backend terminal.
	Active,
	/// The backend asked to end the session; teardown is pending.
	Closing,
	Terminated,
}

impl SessionState {
	/// No channel or display is held in these states.
	pub fn is_at_rest(self) -> bool {
		matches!(self, SessionState::Idle | SessionState::Terminated)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			SessionState::Idle => "idle",
			SessionState::Connecting => "connecting",
			SessionState::Active => "active",
			SessionState::Closing => "closing",
			SessionState::Terminated => "terminated",
		}
	}
}

impl fmt::Display for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// What the channel reported, already decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSignal {
	Connected,
	ConnectFailed(String),
	Lost(String),
	Inbound(InboundMessage),
	/// A known event arrived with a payload of the wrong shape.
	Malformed(String),
}

/// An entry in the session's event queue.
///
/// Every event except the internal settle timer carries the generation of the
/// channel/display pair it was meant for; events for a pair that has since
/// been torn down are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
	Channel { generation: u64, signal: ChannelSignal },
	Input { generation: u64, data: String },
	/// The space around the display changed size.
	ViewportResized { generation: u64 },
	/// The post-open settle delay elapsed.
	SettleElapsed,
	CloseRequested { generation: u64 },
	DetachRequested { generation: u64 },
}

/// Cloneable handle for feeding host events into a session.
///
/// Requests are stamped with the generation that is live when they are
/// queued, so a handle taken before [`start`](crate::TerminalSessionController::start)
/// keeps working across sessions without reaching a later one by accident.
#[derive(Debug, Clone)]
pub struct SessionEvents {
	tx: mpsc::UnboundedSender<SessionEvent>,
	generation: Arc<AtomicU64>,
}

impl SessionEvents {
	pub(crate) fn new(tx: mpsc::UnboundedSender<SessionEvent>, generation: Arc<AtomicU64>) -> Self {
		Self { tx, generation }
	}

	/// Generation of the session requests are currently addressed to.
	pub fn generation(&self) -> u64 {
		self.generation.load(Ordering::SeqCst)
	}

	/// Queues `event`. Returns `false` once the session is gone.
	pub fn send(&self, event: SessionEvent) -> bool {
		self.tx.send(event).is_ok()
	}

	pub fn viewport_resized(&self) -> bool {
		self.send(SessionEvent::ViewportResized {
			generation: self.generation(),
		})
	}

	pub fn request_close(&self) -> bool {
		self.send(SessionEvent::CloseRequested {
			generation: self.generation(),
		})
	}

	pub fn request_detach(&self) -> bool {
		self.send(SessionEvent::DetachRequested {
			generation: self.generation(),
		})
	}
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
	/// Closed normally. `refresh_required` is set when the session could
	/// have changed backend-held identity data.
	Completed { refresh_required: bool },
	/// The backend ended the session with an explanation, which has already
	/// been written to the display.
	Rejected { reason: String, refresh_required: bool },
	/// The channel failed to connect or dropped. No refresh is requested; a
	/// handoff window is closed.
	Failed { error: ChannelError },
	/// The session moved to a standalone window.
	Detached { target: HandoffTarget },
	/// The handoff window running the session was closed.
	WindowClosed,
}

impl SessionOutcome {
	/// Whether the host should reload the identity list.
	pub fn refresh_required(&self) -> bool {
		match self {
			SessionOutcome::Completed { refresh_required } | SessionOutcome::Rejected { refresh_required, .. } => {
				*refresh_required
			}
			SessionOutcome::Failed { .. } | SessionOutcome::Detached { .. } | SessionOutcome::WindowClosed => false,
		}
	}
}
