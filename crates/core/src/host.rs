//! Host environment hooks for a session.

use sshui_runtime::ChannelBinding;

use crate::detach::HandoffTarget;
use crate::display::DisplaySurface;
use crate::error::Result;

/// How the hosting window was opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HostMode {
	/// The full console; sessions can be detached from it.
	#[default]
	Embedded,
	/// A standalone window opened by a detach handoff.
	///
	/// It only ever runs the session it was handed, and closing that session
	/// closes the window.
	Handoff,
}

/// Everything a session needs from the environment it runs in.
pub trait SessionHost {
	type Channel: ChannelBinding;
	type Display: DisplaySurface;

	/// Whether a terminal can be rendered at all.
	fn terminal_available(&self) -> bool;

	fn mode(&self) -> HostMode;

	/// Creates a fresh, unconnected channel.
	fn create_channel(&mut self) -> Self::Channel;

	/// Creates a fresh display together with the container it opens into.
	fn create_display(&mut self) -> (Self::Display, <Self::Display as DisplaySurface>::Container);

	/// Opens `target` in a new standalone window.
	fn open_handoff(&mut self, target: &HandoffTarget) -> Result<()>;

	/// Closes the hosting window. Only called in [`HostMode::Handoff`].
	fn close_window(&mut self);
}
