//! Command-line host for sshui terminal sessions.
//!
//! Renders sessions on the local terminal, reaches the backend over a
//! WebSocket and opens detached sessions through an external launcher.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod handoff;
pub mod host;
pub mod logging;
pub mod terminal;
