//! Terminal session lifecycle for the sshui identity console.
//!
//! The core of this crate is [`TerminalSessionController`]: it opens one
//! [`ChannelBinding`](sshui_runtime::ChannelBinding) to the backend and one
//! [`DisplaySurface`], wires input and output between them, keeps their
//! geometry in sync and tears both down on close, failure, backend request or
//! detach.
//!
//! Everything host-specific (how a channel is dialed, what renders the
//! terminal, how a new window is opened) is supplied through [`SessionHost`].
//!
//! # Example
//!
//! ```ignore
//! let mut controller = TerminalSessionController::new(host, SessionConfig::new("http://127.0.0.1:8080"))
//!     .with_detach(DetachCoordinator::new("http://127.0.0.1:8080/")?);
//! controller.start(SessionDescriptor::connect("bob", "h1"))?;
//! let outcome = controller.run().await;
//! ```

pub mod config;
pub mod controller;
pub mod detach;
pub mod display;
pub mod driver;
pub mod error;
pub mod event;
pub mod host;

#[cfg(test)]
pub(crate) mod test_host;

pub use config::SessionConfig;
pub use controller::{CONNECTED_BANNER, TerminalSessionController};
pub use detach::{DetachCoordinator, HANDOFF_MARKER, HandoffLoad, HandoffTarget, PAYLOAD_PARAM};
pub use display::{DisplayProbe, DisplaySurface, Geometry, InputHandler, MemoryDisplay};
pub use error::{HandoffError, Result, SessionError};
pub use event::{ChannelSignal, SessionEvent, SessionEvents, SessionOutcome, SessionState};
pub use host::{HostMode, SessionHost};

pub use sshui_protocol::{SessionCommand, SessionDescriptor, SessionId, TemplateAction};
