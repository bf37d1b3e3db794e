//! Duplex channel bindings for sshui terminal sessions.
//!
//! A [`ChannelBinding`] is an event-based, bidirectional connection to the
//! backend: named events go out through [`ChannelBinding::emit`], and inbound
//! events are delivered to handlers registered with [`ChannelBinding::on`].
//!
//! Two implementations live here:
//! * [`WebSocketBinding`]: a WebSocket connection driven by a tokio task,
//!   speaking either Socket.IO (Engine.IO v4) or plain JSON framing
//! * [`fake::FakeChannelBuilder`]: an in-memory binding for tests

pub mod binding;
pub mod error;
pub mod fake;
pub mod framing;
pub mod websocket;

pub use binding::{CONNECT, CONNECT_ERROR, ChannelBinding, DISCONNECT, EventHandler, HandlerRegistry, lifecycle_text};
pub use error::{ChannelError, FramingError, Result};
pub use framing::{Frame, Framing};
pub use websocket::WebSocketBinding;
