//! SSH Error types

use std::time::Duration;

use thiserror::Error;

/// Transport-level failure reported by russh or by the handle owner task.
///
/// This never escapes the crate's public operations directly; it is mapped
/// onto [`ConnectError`] or [`ExecError`] at the session boundary.
#[derive(Error, Debug)]
pub enum SshError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("Exec request rejected: {0}")]
    ExecRejected(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("SSH protocol error: {0}")]
    ProtocolError(String),

    #[error("Key error: {0}")]
    KeyError(String),

    #[error("Host key rejected: {0}")]
    HostKeyRejected(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Disconnected")]
    Disconnected,
}

impl From<russh::Error> for SshError {
    fn from(err: russh::Error) -> Self {
        SshError::ProtocolError(err.to_string())
    }
}

impl From<russh::keys::Error> for SshError {
    fn from(err: russh::keys::Error) -> Self {
        SshError::KeyError(err.to_string())
    }
}

/// Why a session could not be established.
#[derive(Error, Debug)]
pub enum ConnectError {
    /// The transport never got as far as authentication: resolution,
    /// TCP connect, key exchange, host key verification or a connect timeout.
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    /// The server (or the local key material) refused authentication.
    #[error("Authentication rejected: {0}")]
    AuthRejected(String),
}

impl From<SshError> for ConnectError {
    fn from(err: SshError) -> Self {
        match err {
            SshError::AuthenticationFailed(msg) | SshError::KeyError(msg) => {
                ConnectError::AuthRejected(msg)
            }
            other => ConnectError::HandshakeFailed(other.to_string()),
        }
    }
}

/// Why a single command execution failed before producing a result.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Session is not connected")]
    NotConnected,

    #[error("Failed to open exec channel: {0}")]
    ChannelOpenFailed(String),

    #[error("Exec request failed: {0}")]
    ExecRequestFailed(String),

    #[error("Command timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// The channel stream ended before the remote closed it
    #[error("Connection lost during command: {0}")]
    ConnectionLost(String),
}

macro_rules! serialize_as_display {
    ($($ty:ty),*) => {
        $(
            impl serde::Serialize for $ty {
                fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
                where
                    S: serde::Serializer,
                {
                    serializer.serialize_str(&self.to_string())
                }
            }
        )*
    };
}

// Errors cross into the UI layer as plain strings
serialize_as_display!(SshError, ConnectError, ExecError);
