//! Configuration file types

use serde::{Deserialize, Serialize};

use crate::remote_fs::codec::DEFAULT_UPLOAD_CHUNK_SIZE;
use crate::quick_actions::QuickAction;
use crate::ssh::{AuthMethod, SshConfig};

/// Current config file format version
pub const CONFIG_VERSION: u32 = 1;

fn default_root() -> String {
    "/".to_string()
}

fn default_exec_timeout_secs() -> Option<u64> {
    Some(60)
}

fn default_upload_chunk_size() -> usize {
    DEFAULT_UPLOAD_CHUNK_SIZE
}

fn default_port() -> u16 {
    22
}

/// Browsing defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Directory a new browser starts in
    #[serde(default = "default_root")]
    pub root: String,

    /// Include dotfiles in listings
    #[serde(default)]
    pub show_hidden: bool,

    /// Deadline for listings and commands; `null` waits forever. Transfers
    /// never have one.
    #[serde(default = "default_exec_timeout_secs")]
    pub exec_timeout_secs: Option<u64>,

    /// Upload chunk size in base64 characters
    #[serde(default = "default_upload_chunk_size")]
    pub upload_chunk_size: usize,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            root: default_root(),
            show_hidden: false,
            exec_timeout_secs: default_exec_timeout_secs(),
            upload_chunk_size: default_upload_chunk_size(),
        }
    }
}

/// A saved connection. Passwords are never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedConnection {
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_path: Option<String>,
}

impl SavedConnection {
    /// Unnamed target for a literal host on port 22
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        let host = host.into();
        Self {
            name: host.clone(),
            host,
            port: default_port(),
            username: username.into(),
            key_path: None,
        }
    }

    /// Build an [`SshConfig`]. With a key, `secret` is its passphrase;
    /// without one it is the password. `None` when neither is available.
    pub fn to_ssh_config(&self, secret: Option<String>) -> Option<SshConfig> {
        let auth = match (&self.key_path, secret) {
            (Some(path), passphrase) => AuthMethod::key(path.clone(), passphrase),
            (None, Some(password)) => AuthMethod::password(password),
            (None, None) => return None,
        };
        let mut config = SshConfig::new(self.host.clone(), self.username.clone(), auth);
        config.port = self.port;
        Some(config)
    }
}

/// Root of `config.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecfsConfig {
    pub version: u32,

    #[serde(default)]
    pub browser: BrowserSettings,

    #[serde(default)]
    pub connections: Vec<SavedConnection>,

    #[serde(default)]
    pub quick_actions: Vec<QuickAction>,
}

impl Default for ExecfsConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            browser: BrowserSettings::default(),
            connections: Vec::new(),
            quick_actions: Vec::new(),
        }
    }
}

impl ExecfsConfig {
    pub fn find_connection(&self, name: &str) -> Option<&SavedConnection> {
        self.connections.iter().find(|c| c.name == name)
    }

    /// Add or replace a saved connection by name.
    pub fn upsert_connection(&mut self, connection: SavedConnection) {
        match self.connections.iter_mut().find(|c| c.name == connection.name) {
            Some(existing) => *existing = connection,
            None => self.connections.push(connection),
        }
    }
}
