//! Async driver for a started session.
//!
//! [`run`](TerminalSessionController::run) is the session's event loop: it
//! applies queued events in order and owns the two timers, the post-open
//! settle delay and the resize debounce.

use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tracing::debug;

use crate::controller::TerminalSessionController;
use crate::event::{SessionEvent, SessionOutcome, SessionState};
use crate::host::SessionHost;

/// Stand-in deadline for a disarmed timer branch.
fn deadline(due: Option<Instant>) -> Instant {
	due.unwrap_or_else(|| Instant::now() + Duration::from_secs(86_400))
}

impl<H: SessionHost> TerminalSessionController<H> {
	/// Drives the session until it ends and returns how it ended.
	///
	/// Returns `None` immediately when no session is running. A backend
	/// rejection is completed here with a regular close once its message has
	/// been written.
	pub async fn run(&mut self) -> Option<SessionOutcome> {
		loop {
			match self.state() {
				SessionState::Idle | SessionState::Terminated => return None,
				SessionState::Closing => return self.close(),
				SessionState::Connecting | SessionState::Active => {}
			}

			let settle = self.settle_due;
			let resize = self.resize_due;
			let outcome = tokio::select! {
				event = self.events_rx.recv() => match event {
					Some(SessionEvent::ViewportResized { generation }) if !self.config().resize_debounce.is_zero() => {
						if generation == self.generation() {
							self.resize_due = Some(Instant::now() + self.config().resize_debounce);
						}
						None
					}
					Some(event) => self.handle(event),
					None => {
						debug!(target = "sshui.session", "event queue closed");
						self.close()
					}
				},
				_ = sleep_until(deadline(settle)), if settle.is_some() => self.handle(SessionEvent::SettleElapsed),
				_ = sleep_until(deadline(resize)), if resize.is_some() => {
					let generation = self.generation();
					self.handle(SessionEvent::ViewportResized { generation })
				}
			};
			if outcome.is_some() {
				return outcome;
			}
		}
	}
}
