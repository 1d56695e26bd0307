//! Remote file operation errors

use serde::Serialize;
use thiserror::Error;

use crate::ssh::ExecError;

/// Errors from moving bytes to or from the remote host
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Failed to read remote file {path}: {reason}")]
    RemoteReadFailed { path: String, reason: String },

    #[error("Failed to write remote file {path}: {reason}")]
    RemoteWriteFailed { path: String, reason: String },

    #[error("Failed to read local file {path}: {reason}")]
    LocalReadFailed { path: String, reason: String },

    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Errors from listing a remote directory
#[derive(Debug, Error)]
pub enum ListError {
    #[error("Cannot list {path} (exit {status:?}): {stderr}")]
    CommandFailed {
        path: String,
        status: Option<u32>,
        stderr: String,
    },

    /// An empty path would otherwise list `/`
    #[error("Empty directory path")]
    EmptyPath,

    #[error(transparent)]
    Exec(#[from] ExecError),
}

impl Serialize for TransferError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl Serialize for ListError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
