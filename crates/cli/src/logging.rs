use std::borrow::Cow;
use std::io::{self, IsTerminal, Write};

use crossterm::terminal;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber, writing to stderr.
///
/// `RUST_LOG` wins when set; otherwise `verbose` picks the level for sshui
/// targets while everything else stays at warn.
pub fn init_logging(verbose: u8) {
	let level = match verbose {
		0 => "warn",
		1 => "info",
		2 => "debug",
		_ => "trace",
	};
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("warn,sshui={level}")));

	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(|| TtyStderr)
		.with_ansi(io::stderr().is_terminal())
		.with_target(verbose > 1)
		.try_init();
}

/// Stderr that ends lines with `\r\n` while a session holds the tty in raw mode.
struct TtyStderr;

impl Write for TtyStderr {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		let raw = terminal::is_raw_mode_enabled().unwrap_or(false);
		let mut stderr = io::stderr().lock();
		if raw {
			stderr.write_all(&crlf(buf))?;
		} else {
			stderr.write_all(buf)?;
		}
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		io::stderr().flush()
	}
}

/// Turns bare `\n` into `\r\n`.
fn crlf(buf: &[u8]) -> Cow<'_, [u8]> {
	let bare = |i: usize| buf[i] == b'\n' && (i == 0 || buf[i - 1] != b'\r');
	if !(0..buf.len()).any(bare) {
		return Cow::Borrowed(buf);
	}
	let mut out = Vec::with_capacity(buf.len() + 8);
	for (i, &byte) in buf.iter().enumerate() {
		if bare(i) {
			out.push(b'\r');
		}
		out.push(byte);
	}
	Cow::Owned(out)
}
