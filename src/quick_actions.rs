//! User-defined named commands

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::ssh::{CommandResult, ExecError, Session};

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Unknown quick action: {0}")]
    UnknownAction(String),

    #[error("Invalid quick action: {0}")]
    InvalidAction(String),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

impl Serialize for ActionError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// A named command, run verbatim on the remote host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickAction {
    pub name: String,
    /// Sent as-is; quoting anything inside it is the author's job
    pub command: String,
}

impl QuickAction {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
        }
    }
}

/// Quick actions keyed by name, kept in name order
#[derive(Debug, Clone, Default)]
pub struct QuickActionRegistry {
    actions: BTreeMap<String, String>,
}

impl QuickActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from stored actions. Later duplicates overwrite earlier ones;
    /// invalid entries are skipped.
    pub fn from_actions<'a>(actions: impl IntoIterator<Item = &'a QuickAction>) -> Self {
        let mut registry = Self::new();
        for action in actions {
            if let Err(e) = registry.register(&action.name, &action.command) {
                debug!("Skipping stored quick action: {}", e);
            }
        }
        registry
    }

    /// Add or replace an action.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        command: impl Into<String>,
    ) -> Result<(), ActionError> {
        let name = name.into();
        let command = command.into();
        if name.trim().is_empty() {
            return Err(ActionError::InvalidAction("name is empty".to_string()));
        }
        if command.trim().is_empty() {
            return Err(ActionError::InvalidAction(format!(
                "command for '{}' is empty",
                name
            )));
        }
        if self.actions.insert(name.clone(), command).is_some() {
            debug!("Quick action '{}' redefined", name);
        }
        Ok(())
    }

    /// Remove an action; absent names are ignored.
    pub fn remove(&mut self, name: &str) {
        self.actions.remove(name);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.actions.get(name).map(String::as_str)
    }

    pub fn list(&self) -> Vec<QuickAction> {
        self.actions
            .iter()
            .map(|(name, command)| QuickAction::new(name, command))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run the named action on `session`. The command result is returned
    /// as-is, a non-zero exit included.
    pub async fn invoke(&self, session: &Session, name: &str) -> Result<CommandResult, ActionError> {
        let command = self
            .get(name)
            .ok_or_else(|| ActionError::UnknownAction(name.to_string()))?;
        info!("Running quick action '{}'", name);
        Ok(session.execute(command).await?)
    }
}
