//! The display surface a session renders into.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;

/// Terminal geometry in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Geometry {
	pub cols: u16,
	pub rows: u16,
}

impl Geometry {
	pub const fn new(cols: u16, rows: u16) -> Self {
		Self { cols, rows }
	}
}

impl Default for Geometry {
	fn default() -> Self {
		Self::new(80, 24)
	}
}

/// Callback receiving keystrokes typed into the display.
pub type InputHandler = Box<dyn FnMut(String) + Send + 'static>;

/// A character-cell terminal renderer.
///
/// One surface backs exactly one session and is never reused after
/// [`dispose`](Self::dispose).
pub trait DisplaySurface {
	/// Whatever the surface renders into (a DOM node, a tty, nothing).
	type Container;

	/// Attaches the surface to `container` and makes it visible.
	fn open(&mut self, container: Self::Container) -> Result<()>;

	fn is_open(&self) -> bool;

	/// Appends raw terminal text, escape sequences included.
	fn write(&mut self, data: &str);

	/// Registers the callback invoked for every chunk of user input.
	fn on_data(&mut self, handler: InputHandler);

	/// Recomputes geometry to fill the available space.
	///
	/// Returns `None` when the surface is not open or has no measurable
	/// space yet.
	fn fit(&mut self) -> Option<Geometry>;

	fn set_title(&mut self, _title: &str) {}

	fn focus(&mut self) {}

	/// Releases the surface. Further calls are no-ops.
	fn dispose(&mut self);
}

/// Headless [`DisplaySurface`] that records everything written to it.
///
/// The paired [`DisplayProbe`] stays valid after the surface has been moved
/// into a session, so callers can inspect the transcript and type input.
pub struct MemoryDisplay {
	state: Arc<Mutex<ProbeState>>,
}

struct ProbeState {
	open: bool,
	disposed: bool,
	transcript: String,
	title: Option<String>,
	viewport: Option<Geometry>,
	fits: usize,
	focused: bool,
	input: Option<InputHandler>,
}

impl MemoryDisplay {
	/// Creates a surface whose viewport measures `viewport`.
	pub fn new(viewport: Geometry) -> (Self, DisplayProbe) {
		let state = Arc::new(Mutex::new(ProbeState {
			open: false,
			disposed: false,
			transcript: String::new(),
			title: None,
			viewport: Some(viewport),
			fits: 0,
			focused: false,
			input: None,
		}));
		let probe = DisplayProbe { state: Arc::clone(&state) };
		(Self { state }, probe)
	}
}

impl DisplaySurface for MemoryDisplay {
	type Container = ();

	fn open(&mut self, _container: ()) -> Result<()> {
		let mut state = self.state.lock();
		if !state.disposed {
			state.open = true;
		}
		Ok(())
	}

	fn is_open(&self) -> bool {
		self.state.lock().open
	}

	fn write(&mut self, data: &str) {
		let mut state = self.state.lock();
		if state.open {
			state.transcript.push_str(data);
		}
	}

	fn on_data(&mut self, handler: InputHandler) {
		self.state.lock().input = Some(handler);
	}

	fn fit(&mut self) -> Option<Geometry> {
		let mut state = self.state.lock();
		if !state.open {
			return None;
		}
		state.fits += 1;
		state.viewport
	}

	fn set_title(&mut self, title: &str) {
		self.state.lock().title = Some(title.to_string());
	}

	fn focus(&mut self) {
		self.state.lock().focused = true;
	}

	fn dispose(&mut self) {
		let mut state = self.state.lock();
		state.open = false;
		state.disposed = true;
		state.input = None;
	}
}

/// Inspection handle for a [`MemoryDisplay`].
#[derive(Clone)]
pub struct DisplayProbe {
	state: Arc<Mutex<ProbeState>>,
}

impl DisplayProbe {
	pub fn transcript(&self) -> String {
		self.state.lock().transcript.clone()
	}

	pub fn is_open(&self) -> bool {
		self.state.lock().open
	}

	pub fn is_disposed(&self) -> bool {
		self.state.lock().disposed
	}

	pub fn title(&self) -> Option<String> {
		self.state.lock().title.clone()
	}

	pub fn is_focused(&self) -> bool {
		self.state.lock().focused
	}

	/// How many times `fit` measured an open surface.
	pub fn fit_count(&self) -> usize {
		self.state.lock().fits
	}

	/// Changes the measured viewport; `None` simulates a hidden container.
	pub fn set_viewport(&self, viewport: Option<Geometry>) {
		self.state.lock().viewport = viewport;
	}

	/// Types `data` into the surface. Returns `false` if nothing listens.
	pub fn type_input(&self, data: &str) -> bool {
		let handler = {
			let mut state = self.state.lock();
			if !state.open {
				return false;
			}
			state.input.take()
		};
		let Some(mut handler) = handler else {
			return false;
		};
		handler(data.to_string());

		let mut state = self.state.lock();
		if !state.disposed && state.input.is_none() {
			state.input = Some(handler);
		}
		true
	}
}
