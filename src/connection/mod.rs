//! The connection state machine and streaming API.

#[allow(clippy::module_inception)]
mod connection;
mod hooks;
mod role;
mod state;

pub use connection::Connection;
pub use hooks::{DefaultHooks, Hooks};
pub use role::Role;
pub use state::ConnectionState;
