//! In-memory host for exercising sessions without a backend or a terminal.

use std::sync::Arc;

use parking_lot::Mutex;
use sshui_runtime::fake::{FakeChannel, FakeChannelBuilder, FakeChannelController};

use crate::config::SessionConfig;
use crate::controller::TerminalSessionController;
use crate::detach::{DetachCoordinator, HandoffTarget};
use crate::display::{DisplayProbe, Geometry, MemoryDisplay};
use crate::error::{HandoffError, Result};
use crate::host::{HostMode, SessionHost};

pub(crate) const ENDPOINT: &str = "http://127.0.0.1:8080";

#[derive(Default)]
struct Recorded {
	channels: Vec<FakeChannelController>,
	displays: Vec<DisplayProbe>,
	handoffs: Vec<HandoffTarget>,
	windows_closed: usize,
}

pub(crate) struct TestHost {
	pub available: bool,
	pub mode: HostMode,
	pub viewport: Geometry,
	pub refuse_connect: Option<String>,
	pub refuse_handoff: bool,
	recorded: Arc<Mutex<Recorded>>,
}

impl TestHost {
	pub fn new() -> Self {
		Self {
			available: true,
			mode: HostMode::Embedded,
			viewport: Geometry::new(120, 40),
			refuse_connect: None,
			refuse_handoff: false,
			recorded: Arc::default(),
		}
	}

	pub fn handoff() -> Self {
		Self {
			mode: HostMode::Handoff,
			..Self::new()
		}
	}

	pub fn into_controller(self) -> TerminalSessionController<Self> {
		let coordinator = DetachCoordinator::new(&format!("{ENDPOINT}/")).unwrap();
		TerminalSessionController::new(self, SessionConfig::new(ENDPOINT)).with_detach(coordinator)
	}

	/// Backend side of the most recently created channel.
	pub fn channel(&self) -> FakeChannelController {
		self.recorded.lock().channels.last().cloned().expect("no channel created")
	}

	/// Probe for the most recently created display.
	pub fn display(&self) -> DisplayProbe {
		self.recorded.lock().displays.last().cloned().expect("no display created")
	}

	pub fn channels(&self) -> Vec<FakeChannelController> {
		self.recorded.lock().channels.clone()
	}

	pub fn displays(&self) -> Vec<DisplayProbe> {
		self.recorded.lock().displays.clone()
	}

	pub fn handoffs(&self) -> Vec<HandoffTarget> {
		self.recorded.lock().handoffs.clone()
	}

	pub fn windows_closed(&self) -> usize {
		self.recorded.lock().windows_closed
	}
}

impl SessionHost for TestHost {
	type Channel = FakeChannel;
	type Display = MemoryDisplay;

	fn terminal_available(&self) -> bool {
		self.available
	}

	fn mode(&self) -> HostMode {
		self.mode
	}

	fn create_channel(&mut self) -> FakeChannel {
		let mut builder = FakeChannelBuilder::new();
		if let Some(message) = &self.refuse_connect {
			builder = builder.refuse_connect(message.clone());
		}
		let (channel, controller) = builder.build();
		self.recorded.lock().channels.push(controller);
		channel
	}

	fn create_display(&mut self) -> (MemoryDisplay, ()) {
		let (display, probe) = MemoryDisplay::new(self.viewport);
		self.recorded.lock().displays.push(probe);
		(display, ())
	}

	fn open_handoff(&mut self, target: &HandoffTarget) -> Result<()> {
		if self.refuse_handoff {
			return Err(HandoffError::Open("popup blocked".into()).into());
		}
		self.recorded.lock().handoffs.push(target.clone());
		Ok(())
	}

	fn close_window(&mut self) {
		self.recorded.lock().windows_closed += 1;
	}
}
