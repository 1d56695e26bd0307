//! Back/forward history of browsed remote directories

use serde::Serialize;
use thiserror::Error;

use crate::remote_fs::path_utils::{join_remote_path, parent_remote_path};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("No previous directory")]
    NoPriorPath,

    #[error("No next directory")]
    NoNextPath,
}

impl Serialize for HistoryError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Current path plus the `visited` and `forward` stacks.
///
/// Pure state: it never checks that a path exists. Callers list a directory
/// before navigating to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationHistory {
    current: String,
    visited: Vec<String>,
    forward: Vec<String>,
}

impl NavigationHistory {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            current: root.into(),
            visited: Vec::new(),
            forward: Vec::new(),
        }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    /// Move to `path`. Clears the forward stack.
    pub fn navigate_to(&mut self, path: impl Into<String>) {
        let previous = std::mem::replace(&mut self.current, path.into());
        self.visited.push(previous);
        self.forward.clear();
    }

    pub fn back(&mut self) -> Result<&str, HistoryError> {
        let target = self.visited.pop().ok_or(HistoryError::NoPriorPath)?;
        let previous = std::mem::replace(&mut self.current, target);
        self.forward.push(previous);
        Ok(&self.current)
    }

    pub fn forward(&mut self) -> Result<&str, HistoryError> {
        let target = self.forward.pop().ok_or(HistoryError::NoNextPath)?;
        let previous = std::mem::replace(&mut self.current, target);
        self.visited.push(previous);
        Ok(&self.current)
    }

    /// Where [`back`](Self::back) would go, without moving.
    pub fn peek_back(&self) -> Result<&str, HistoryError> {
        self.visited
            .last()
            .map(String::as_str)
            .ok_or(HistoryError::NoPriorPath)
    }

    /// Where [`forward`](Self::forward) would go, without moving.
    pub fn peek_forward(&self) -> Result<&str, HistoryError> {
        self.forward
            .last()
            .map(String::as_str)
            .ok_or(HistoryError::NoNextPath)
    }

    pub fn can_go_back(&self) -> bool {
        !self.visited.is_empty()
    }

    pub fn can_go_forward(&self) -> bool {
        !self.forward.is_empty()
    }

    /// Oldest first
    pub fn visited(&self) -> &[String] {
        &self.visited
    }

    /// Top of the stack (next `forward` target) last
    pub fn forward_stack(&self) -> &[String] {
        &self.forward
    }

    pub fn child_path(&self, name: &str) -> String {
        join_remote_path(&self.current, name)
    }

    pub fn parent_path(&self) -> String {
        parent_remote_path(&self.current)
    }
}
