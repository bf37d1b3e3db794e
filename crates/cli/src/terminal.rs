//! The local tty as a display surface.
//!
//! Output goes straight to stdout with the tty in raw mode, so the remote
//! side's escape sequences render as-is. Stdin is read by a background task
//! and forwarded as session input, except for the control prefix:
//!
//! | Keys         | Action                            |
//! |--------------|-----------------------------------|
//! | `Ctrl-]` `q` | close the session                 |
//! | `Ctrl-]` `d` | detach into a new window          |
//! | `Ctrl-]` `]` | send a literal `Ctrl-]`           |

use std::io::{self, Write};
use std::sync::Arc;

use crossterm::terminal::{self, SetTitle};
use crossterm::QueueableCommand;
use parking_lot::Mutex;
use sshui::{DisplaySurface, Geometry, InputHandler, SessionError};
use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::host::Controls;

/// `Ctrl-]`
pub const PREFIX_KEY: u8 = 0x1d;

/// What a chunk of keyboard input means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
	Forward(Vec<u8>),
	Close,
	Detach,
}

/// Splits raw keyboard input into session input and prefix commands.
#[derive(Debug, Clone)]
pub struct PrefixFilter {
	allow_detach: bool,
	armed: bool,
}

impl PrefixFilter {
	pub fn new(allow_detach: bool) -> Self {
		Self {
			allow_detach,
			armed: false,
		}
	}

	pub fn feed(&mut self, bytes: &[u8]) -> Vec<KeyAction> {
		let mut actions = Vec::new();
		let mut pending = Vec::new();
		for &byte in bytes {
			if !self.armed {
				if byte == PREFIX_KEY {
					self.armed = true;
				} else {
					pending.push(byte);
				}
				continue;
			}

			self.armed = false;
			let action = match byte {
				b'q' | b'Q' => Some(KeyAction::Close),
				b'd' | b'D' if self.allow_detach => Some(KeyAction::Detach),
				b']' | PREFIX_KEY => {
					pending.push(PREFIX_KEY);
					None
				}
				_ => None,
			};
			if let Some(action) = action {
				if !pending.is_empty() {
					actions.push(KeyAction::Forward(std::mem::take(&mut pending)));
				}
				actions.push(action);
			}
		}
		if !pending.is_empty() {
			actions.push(KeyAction::Forward(pending));
		}
		actions
	}
}

/// Decodes keyboard bytes as UTF-8, holding back a character split across reads.
///
/// Only bytes that can never start or continue a valid sequence are replaced
/// with U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Carry {
	pending: Vec<u8>,
}

impl Utf8Carry {
	pub fn decode(&mut self, bytes: &[u8]) -> String {
		self.pending.extend_from_slice(bytes);
		let mut text = String::new();
		let mut start = 0;
		loop {
			match std::str::from_utf8(&self.pending[start..]) {
				Ok(valid) => {
					text.push_str(valid);
					start = self.pending.len();
					break;
				}
				Err(err) => {
					let valid_end = start + err.valid_up_to();
					text.push_str(&String::from_utf8_lossy(&self.pending[start..valid_end]));
					match err.error_len() {
						Some(len) => {
							text.push(char::REPLACEMENT_CHARACTER);
							start = valid_end + len;
						}
						// Incomplete tail; wait for the rest of it.
						None => {
							start = valid_end;
							break;
						}
					}
				}
			}
		}
		self.pending.drain(..start);
		text
	}
}

/// Where a [`TtyDisplay`] renders.
pub struct TtyContainer {
	out: Box<dyn Write + Send>,
	tty: bool,
	size: Option<Geometry>,
}

impl TtyContainer {
	/// The process's own terminal: raw mode, stdin reader, real size.
	pub fn stdout() -> Self {
		Self {
			out: Box::new(io::stdout()),
			tty: true,
			size: None,
		}
	}

	/// Any writer with a fixed size; no raw mode and no stdin reader.
	pub fn writer(out: impl Write + Send + 'static, size: Geometry) -> Self {
		Self {
			out: Box::new(out),
			tty: false,
			size: Some(size),
		}
	}
}

pub struct TtyDisplay {
	controls: Controls,
	allow_detach: bool,
	input: Arc<Mutex<Option<InputHandler>>>,
	container: Option<TtyContainer>,
	reader: Option<JoinHandle<()>>,
	raw_mode: bool,
	disposed: bool,
}

impl TtyDisplay {
	pub fn new(controls: Controls, allow_detach: bool) -> Self {
		Self {
			controls,
			allow_detach,
			input: Arc::new(Mutex::new(None)),
			container: None,
			reader: None,
			raw_mode: false,
			disposed: false,
		}
	}
}

impl DisplaySurface for TtyDisplay {
	type Container = TtyContainer;

	fn open(&mut self, container: TtyContainer) -> sshui::Result<()> {
		if self.disposed {
			return Err(SessionError::Display("display already disposed".into()));
		}
		if container.tty {
			let runtime = tokio::runtime::Handle::try_current().map_err(|e| SessionError::Display(e.to_string()))?;
			terminal::enable_raw_mode().map_err(|e| SessionError::Display(format!("cannot enter raw mode: {e}")))?;
			self.raw_mode = true;
			self.reader = Some(runtime.spawn(read_keys(
				Arc::clone(&self.input),
				self.controls.clone(),
				PrefixFilter::new(self.allow_detach),
			)));
		}
		self.container = Some(container);
		Ok(())
	}

	fn is_open(&self) -> bool {
		self.container.is_some()
	}

	fn write(&mut self, data: &str) {
		let Some(container) = self.container.as_mut() else {
			return;
		};
		if let Err(err) = container.out.write_all(data.as_bytes()).and_then(|()| container.out.flush()) {
			debug!(target = "sshui.session", error = %err, "display write failed");
		}
	}

	fn on_data(&mut self, handler: InputHandler) {
		*self.input.lock() = Some(handler);
	}

	fn fit(&mut self) -> Option<Geometry> {
		let container = self.container.as_ref()?;
		if let Some(size) = container.size {
			return Some(size);
		}
		match terminal::size() {
			Ok((cols, rows)) if cols > 0 && rows > 0 => Some(Geometry::new(cols, rows)),
			Ok(_) => None,
			Err(err) => {
				trace!(target = "sshui.session", error = %err, "cannot measure terminal");
				None
			}
		}
	}

	fn set_title(&mut self, title: &str) {
		let Some(container) = self.container.as_mut() else {
			return;
		};
		if container.tty {
			let _ = container.out.queue(SetTitle(title)).and_then(|out| out.flush());
		}
	}

	fn dispose(&mut self) {
		if self.disposed {
			return;
		}
		self.disposed = true;
		self.input.lock().take();
		if let Some(reader) = self.reader.take() {
			reader.abort();
		}
		self.container = None;
		if self.raw_mode {
			self.raw_mode = false;
			if let Err(err) = terminal::disable_raw_mode() {
				warn!(target = "sshui.session", error = %err, "failed to restore terminal mode");
			}
		}
	}
}

impl Drop for TtyDisplay {
	fn drop(&mut self) {
		self.dispose();
	}
}

async fn read_keys(input: Arc<Mutex<Option<InputHandler>>>, controls: Controls, mut filter: PrefixFilter) {
	let mut stdin = tokio::io::stdin();
	let mut buf = [0u8; 4096];
	let mut utf8 = Utf8Carry::default();
	loop {
		let n = match stdin.read(&mut buf).await {
			Ok(0) => {
				debug!(target = "sshui.session", "stdin closed");
				controls.request_close();
				return;
			}
			Ok(n) => n,
			Err(err) => {
				warn!(target = "sshui.session", error = %err, "stdin read failed");
				controls.request_close();
				return;
			}
		};

		for action in filter.feed(&buf[..n]) {
			match action {
				KeyAction::Forward(bytes) => {
					let text = utf8.decode(&bytes);
					if text.is_empty() {
						continue;
					}
					if let Some(handler) = input.lock().as_mut() {
						handler(text);
					}
				}
				KeyAction::Close => {
					controls.request_close();
				}
				KeyAction::Detach => {
					controls.request_detach();
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Clone, Default)]
	struct Shared(Arc<Mutex<Vec<u8>>>);

	impl Write for Shared {
		fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
			self.0.lock().extend_from_slice(buf);
			Ok(buf.len())
		}

		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}

	#[test]
	fn plain_input_is_forwarded() {
		let mut filter = PrefixFilter::new(true);
		assert_eq!(filter.feed(b"ls -l\r"), vec![KeyAction::Forward(b"ls -l\r".to_vec())]);
	}

	#[test]
	fn prefix_commands_split_input() {
		let mut filter = PrefixFilter::new(true);
		assert_eq!(
			filter.feed(b"ab\x1dqcd"),
			vec![KeyAction::Forward(b"ab".to_vec()), KeyAction::Close, KeyAction::Forward(b"cd".to_vec())]
		);
		assert_eq!(filter.feed(b"\x1dd"), vec![KeyAction::Detach]);
	}

	#[test]
	fn prefix_survives_chunk_boundaries() {
		let mut filter = PrefixFilter::new(true);
		assert_eq!(filter.feed(b"x\x1d"), vec![KeyAction::Forward(b"x".to_vec())]);
		assert_eq!(filter.feed(b"q"), vec![KeyAction::Close]);
	}

	#[test]
	fn literal_prefix_and_unknown_keys() {
		let mut filter = PrefixFilter::new(true);
		assert_eq!(filter.feed(b"\x1d]"), vec![KeyAction::Forward(vec![PREFIX_KEY])]);
		assert_eq!(filter.feed(b"\x1dz"), Vec::<KeyAction>::new());
	}

	#[test]
	fn multibyte_input_split_across_reads_is_kept_whole() {
		let mut filter = PrefixFilter::new(true);
		let mut utf8 = Utf8Carry::default();
		let mut forwarded = String::new();
		for chunk in [&b"caf\xc3"[..], &b"\xa9 \xf0\x9f"[..], &b"\x98"[..], &b"\x80"[..]] {
			for action in filter.feed(chunk) {
				if let KeyAction::Forward(bytes) = action {
					forwarded.push_str(&utf8.decode(&bytes));
				}
			}
		}
		assert_eq!(forwarded, "café 😀");
	}

	#[test]
	fn invalid_bytes_are_replaced_without_swallowing_neighbours() {
		let mut utf8 = Utf8Carry::default();
		assert_eq!(utf8.decode(b"a\xffb"), "a\u{fffd}b");
		assert_eq!(utf8.decode(b"\xe2\x82"), "");
		assert_eq!(utf8.decode(b"x"), "\u{fffd}x");
	}

	#[test]
	fn detach_can_be_disabled() {
		let mut filter = PrefixFilter::new(false);
		assert_eq!(filter.feed(b"\x1dd"), Vec::<KeyAction>::new());
		assert_eq!(filter.feed(b"\x1dq"), vec![KeyAction::Close]);
	}

	#[test]
	fn writer_display_lifecycle() {
		let out = Shared::default();
		let mut display = TtyDisplay::new(Controls::default(), true);
		display.on_data(Box::new(|_| {}));

		display.write("before open");
		assert_eq!(display.fit(), None);

		display.open(TtyContainer::writer(out.clone(), Geometry::new(100, 30))).unwrap();
		assert!(display.is_open());
		display.set_title("Connect: bob@h1");
		display.write("hello\r\n");
		assert_eq!(display.fit(), Some(Geometry::new(100, 30)));

		display.dispose();
		display.write("after dispose");
		assert!(!display.is_open());
		assert!(display.input.lock().is_none());
		assert!(display.open(TtyContainer::writer(out.clone(), Geometry::default())).is_err());

		let written = String::from_utf8(out.0.lock().clone()).unwrap();
		assert!(written.starts_with("hello\r\n"));
		assert!(!written.contains("before open"));
		assert!(!written.contains("after dispose"));
		assert!(!written.contains("Connect: bob@h1"));
	}
}
