//! SSH module - sessions and exec channels
//!
//! This module provides the transport half of execfs using the russh library.
//!
//! # Features
//! - Password and key authentication
//! - Host key verification via ~/.ssh/known_hosts
//! - One connection per [`Session`], one short-lived channel per command
//! - Per-command deadline with guaranteed channel release

mod client;
mod config;
mod error;
pub mod exec;
mod handle_owner;
mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;
#[cfg(test)]
mod test_server;

pub use client::{ClientHandler, SshClient};
pub use config::{AuthMethod, SshConfig};
pub use error::{ConnectError, ExecError, SshError};
pub use exec::{execute, execute_with_timeout, CommandResult};
pub use handle_owner::{spawn_handle_owner_task, HandleCommand, HandleController, PingResult};
pub use session::{ConnectionState, Session};
pub use transport::{ChannelEvent, ExecChannel, Transport};

/// Open a `Connected` session to `host` as `user`.
///
/// Shorthand for [`Session::connect`] with default port and timeouts.
pub async fn connect(
    host: impl Into<String>,
    user: impl Into<String>,
    credential: AuthMethod,
) -> Result<Session, ConnectError> {
    Session::connect(SshConfig::new(host, user, credential)).await
}
