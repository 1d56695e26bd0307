//! Errors surfaced by the browser façade

use serde::Serialize;
use thiserror::Error;

use crate::navigation::HistoryError;
use crate::quick_actions::ActionError;
use crate::remote_fs::{ListError, TransferError};
use crate::ssh::{ConnectError, ExecError};

/// Every failure a browser caller can see, one variant per kind
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Listing(#[from] ListError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("No browser with id {0}")]
    UnknownBrowser(String),

    #[error("Failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl Serialize for BrowserError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
