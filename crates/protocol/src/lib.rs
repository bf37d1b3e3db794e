//! Wire types for the sshui terminal channel.
//!
//! This crate contains the serde-serializable types exchanged with the
//! identity backend over the duplex terminal channel, plus the identity
//! records the host page preloads. These types represent the "protocol
//! layer": the shapes of data as they appear on the wire.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond construction, validation and serde
//! * 1:1 with the backend: Field names match what the backend reads
//! * Stable: Changes only when the wire protocol changes
//!
//! Session lifecycle logic is built on top of these types in `sshui-term`.

pub mod descriptor;
pub mod error;
pub mod identity;
pub mod messages;

pub use descriptor::*;
pub use error::{ProtocolError, Result};
pub use identity::*;
pub use messages::*;
