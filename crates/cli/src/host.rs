use std::io::{self, IsTerminal};
use std::sync::Arc;

use parking_lot::Mutex;
use sshui::{HandoffTarget, HostMode, SessionEvents, SessionHost};
use sshui_runtime::{Framing, WebSocketBinding};
use tracing::{debug, info};

use crate::config::Settings;
use crate::handoff::Launcher;
use crate::terminal::{TtyContainer, TtyDisplay};

/// Late-bound route from keyboard commands to the running session.
#[derive(Clone, Default)]
pub struct Controls {
	events: Arc<Mutex<Option<SessionEvents>>>,
}

impl Controls {
	pub fn bind(&self, events: SessionEvents) {
		*self.events.lock() = Some(events);
	}

	pub fn request_close(&self) -> bool {
		self.with(SessionEvents::request_close)
	}

	pub fn request_detach(&self) -> bool {
		self.with(SessionEvents::request_detach)
	}

	pub fn viewport_resized(&self) -> bool {
		self.with(SessionEvents::viewport_resized)
	}

	fn with(&self, send: impl FnOnce(&SessionEvents) -> bool) -> bool {
		match self.events.lock().as_ref() {
			Some(events) => send(events),
			None => {
				debug!(target = "sshui.session", "no session bound to controls");
				false
			}
		}
	}
}

/// Runs sessions on the local terminal against a WebSocket backend.
pub struct CliHost {
	mode: HostMode,
	terminal: bool,
	framing: Framing,
	auth_token: Option<String>,
	launcher: Launcher,
	controls: Controls,
	window_closed: bool,
}

impl CliHost {
	pub fn new(settings: &Settings, mode: HostMode) -> Self {
		Self {
			mode,
			terminal: io::stdin().is_terminal() && io::stdout().is_terminal(),
			framing: settings.framing,
			auth_token: settings.auth_token.clone(),
			launcher: settings.launcher.clone(),
			controls: Controls::default(),
			window_closed: false,
		}
	}

	pub fn controls(&self) -> Controls {
		self.controls.clone()
	}

	/// Set once a handoff session asked for its window to close.
	pub fn window_closed(&self) -> bool {
		self.window_closed
	}
}

impl SessionHost for CliHost {
	type Channel = WebSocketBinding;
	type Display = TtyDisplay;

	fn terminal_available(&self) -> bool {
		self.terminal
	}

	fn mode(&self) -> HostMode {
		self.mode
	}

	fn create_channel(&mut self) -> WebSocketBinding {
		WebSocketBinding::new(self.framing).with_auth_token(self.auth_token.clone())
	}

	fn create_display(&mut self) -> (TtyDisplay, TtyContainer) {
		let display = TtyDisplay::new(self.controls.clone(), self.mode == HostMode::Embedded);
		(display, TtyContainer::stdout())
	}

	fn open_handoff(&mut self, target: &HandoffTarget) -> sshui::Result<()> {
		self.launcher.open(target.as_str())?;
		Ok(())
	}

	fn close_window(&mut self) {
		info!(target = "sshui.session", "closing handoff window");
		self.window_closed = true;
	}
}
