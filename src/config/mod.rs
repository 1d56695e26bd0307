//! Configuration Management Module
//!
//! Persistent browser settings, saved connections and quick actions, plus
//! host aliases read from ~/.ssh/config.

pub mod ssh_config;
pub mod storage;
pub mod types;

pub use ssh_config::{
    default_ssh_config_path, find_host, parse_ssh_config, SshConfigError, SshConfigHost,
};
pub use storage::{config_dir, config_file, ConfigStorage, StorageError};
pub use types::{BrowserSettings, ExecfsConfig, SavedConnection, CONFIG_VERSION};
