//! ~/.ssh/config host aliases
//!
//! Only the directives an exec-only client can honour are read: HostName,
//! User, Port and IdentityFile. Anything else (ProxyJump, forwards, ...) is
//! ignored.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::fs;

use super::types::SavedConnection;

/// A `Host` block with a literal (non-wildcard) alias
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshConfigHost {
    pub alias: String,
    pub hostname: Option<String>,
    pub user: Option<String>,
    pub port: Option<u16>,
    /// Kept as written; `~` is expanded when the key is loaded
    pub identity_file: Option<String>,
}

impl SshConfigHost {
    /// HostName, or the alias itself
    pub fn effective_hostname(&self) -> &str {
        self.hostname.as_deref().unwrap_or(&self.alias)
    }

    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(22)
    }

    /// Connection target for this alias, logging in as `default_user` when
    /// the entry has no User.
    pub fn to_connection(&self, default_user: &str) -> SavedConnection {
        SavedConnection {
            name: self.alias.clone(),
            host: self.effective_hostname().to_string(),
            port: self.effective_port(),
            username: self.user.clone().unwrap_or_else(|| default_user.to_string()),
            key_path: self.identity_file.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SshConfigError {
    #[error("Failed to determine home directory")]
    NoHomeDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn default_ssh_config_path() -> Result<PathBuf, SshConfigError> {
    dirs::home_dir()
        .map(|home| home.join(".ssh").join("config"))
        .ok_or(SshConfigError::NoHomeDir)
}

/// Read and parse an ssh config file. A missing file has no hosts.
pub async fn parse_ssh_config(path: Option<PathBuf>) -> Result<Vec<SshConfigHost>, SshConfigError> {
    let path = match path {
        Some(p) => p,
        None => default_ssh_config_path()?,
    };

    match fs::read_to_string(&path).await {
        Ok(content) => Ok(parse_ssh_config_content(&content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(SshConfigError::Io(e)),
    }
}

/// Parse ssh config text. Every literal alias on a `Host` line gets its own
/// entry carrying the block's settings.
pub fn parse_ssh_config_content(content: &str) -> Vec<SshConfigHost> {
    let mut hosts: Vec<SshConfigHost> = Vec::new();
    // Index of the first entry of the current block
    let mut block_start: Option<usize> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // "Key Value" or "Key=Value"
        let (key, value) = match line.find(|c: char| c == '=' || c.is_whitespace()) {
            Some(pos) => (
                &line[..pos],
                line[pos + 1..].trim_start_matches(|c: char| c == '=' || c.is_whitespace()),
            ),
            None => continue,
        };
        let value = value.trim();

        if key.eq_ignore_ascii_case("host") {
            block_start = Some(hosts.len());
            hosts.extend(
                value
                    .split_whitespace()
                    .filter(|alias| !alias.contains('*') && !alias.contains('?'))
                    .map(|alias| SshConfigHost {
                        alias: alias.to_string(),
                        ..Default::default()
                    }),
            );
            continue;
        }
        if key.eq_ignore_ascii_case("match") {
            // Conditional blocks are not evaluated
            block_start = None;
            continue;
        }

        let Some(start) = block_start else {
            continue;
        };
        for host in &mut hosts[start..] {
            // First value wins, as in ssh(1)
            match key.to_ascii_lowercase().as_str() {
                "hostname" if host.hostname.is_none() => host.hostname = Some(value.to_string()),
                "user" if host.user.is_none() => host.user = Some(value.to_string()),
                "port" if host.port.is_none() => host.port = value.parse().ok(),
                "identityfile" if host.identity_file.is_none() => {
                    host.identity_file = Some(value.trim_matches('"').to_string())
                }
                _ => {}
            }
        }
    }

    hosts
}

/// Look up an alias.
pub fn find_host<'a>(hosts: &'a [SshConfigHost], alias: &str) -> Option<&'a SshConfigHost> {
    hosts.iter().find(|h| h.alias == alias)
}
