//! SSH Client implementation using russh

use std::net::ToSocketAddrs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use russh::keys::key::PrivateKeyWithHashAlg;
use russh::keys::PublicKey;
use russh::*;
use tracing::{debug, info, warn};

use super::config::{AuthMethod, SshConfig};
use super::error::SshError;
use super::handle_owner::{spawn_handle_owner_task, HandleController};

/// Establishes one authenticated connection and hands it to a handle owner task
pub struct SshClient {
    config: SshConfig,
}

impl SshClient {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    /// Connect, authenticate and spawn the owner task for the new handle.
    pub async fn connect(self, session_id: &str) -> Result<HandleController, SshError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!("Connecting to SSH server at {} (session {})", addr, session_id);

        let socket_addr = addr
            .to_socket_addrs()
            .map_err(|e| SshError::ConnectionFailed(format!("Failed to resolve address: {}", e)))?
            .next()
            .ok_or_else(|| SshError::ConnectionFailed("No address found".to_string()))?;

        let ssh_config = client::Config {
            inactivity_timeout: None,
            keepalive_interval: Some(Duration::from_secs(30)),
            keepalive_max: 3,
            ..Default::default()
        };

        let handler = ClientHandler::new(
            self.config.host.clone(),
            self.config.port,
            self.config.strict_host_key_checking,
        )
        .with_known_hosts_file(self.config.known_hosts_file.clone());

        let mut handle = tokio::time::timeout(
            self.config.connect_timeout(),
            client::connect(Arc::new(ssh_config), socket_addr, handler),
        )
        .await
        .map_err(|_| SshError::Timeout("Connection timed out".to_string()))?
        .map_err(|e| match e {
            rejected @ SshError::HostKeyRejected(_) => rejected,
            other => SshError::ConnectionFailed(other.to_string()),
        })?;

        debug!("SSH handshake completed");

        let authenticated = match &self.config.auth {
            AuthMethod::Password { password } => handle
                .authenticate_password(&self.config.username, password)
                .await
                .map_err(|e| SshError::AuthenticationFailed(e.to_string()))?,
            AuthMethod::Key {
                key_path,
                passphrase,
            } => {
                let key = russh::keys::load_secret_key(expand_home(key_path), passphrase.as_deref())
                    .map_err(|e| SshError::KeyError(format!("{}: {}", key_path, e)))?;

                let key_with_hash = PrivateKeyWithHashAlg::new(Arc::new(key), None);

                handle
                    .authenticate_publickey(&self.config.username, key_with_hash)
                    .await
                    .map_err(|e| SshError::AuthenticationFailed(e.to_string()))?
            }
        };

        if !authenticated.success() {
            return Err(SshError::AuthenticationFailed(
                "Authentication rejected by server".to_string(),
            ));
        }

        info!(
            "SSH authentication successful for {}@{}",
            self.config.username, self.config.host
        );

        Ok(spawn_handle_owner_task(handle, session_id.to_string()))
    }
}

/// `~/` in key paths refers to the local home directory
fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Client handler for russh callbacks
///
/// Verifies the server host key against `~/.ssh/known_hosts`, or the file
/// set with [`ClientHandler::with_known_hosts_file`].
pub struct ClientHandler {
    host: String,
    port: u16,
    /// - true: reject unknown keys
    /// - false: learn unknown keys
    ///
    /// Changed keys are rejected either way.
    strict: bool,
    known_hosts: Option<PathBuf>,
}

impl ClientHandler {
    pub fn new(host: String, port: u16, strict: bool) -> Self {
        Self {
            host,
            port,
            strict,
            known_hosts: None,
        }
    }

    pub fn with_known_hosts_file(mut self, path: Option<PathBuf>) -> Self {
        self.known_hosts = path;
        self
    }

    fn check_known(&self, key: &PublicKey) -> Result<bool, russh::keys::Error> {
        match &self.known_hosts {
            Some(path) => russh::keys::check_known_hosts_path(&self.host, self.port, key, path),
            None => russh::keys::check_known_hosts(&self.host, self.port, key),
        }
    }

    fn learn(&self, key: &PublicKey) -> Result<(), russh::keys::Error> {
        match &self.known_hosts {
            Some(path) => {
                russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, key, path)
            }
            None => russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, key),
        }
    }
}

impl client::Handler for ClientHandler {
    type Error = SshError;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        match self.check_known(server_public_key) {
            Ok(true) => {
                info!("Host key verified for {}:{}", self.host, self.port);
                Ok(true)
            }
            Ok(false) if self.strict => {
                warn!(
                    "Unknown host key for {}:{}. Strict mode enabled, rejecting.",
                    self.host, self.port
                );
                Err(SshError::HostKeyRejected(format!(
                    "unknown host {}:{}; add it to known_hosts or disable strict mode",
                    self.host, self.port
                )))
            }
            Ok(false) => {
                info!("New host {}:{}, adding to known_hosts", self.host, self.port);
                if let Err(e) = self.learn(server_public_key) {
                    warn!("Failed to save host key: {}", e);
                }
                Ok(true)
            }
            Err(russh::keys::Error::KeyChanged { line }) => {
                warn!(
                    "HOST KEY CHANGED for {}:{} (known_hosts line {})",
                    self.host, self.port, line
                );
                Err(SshError::HostKeyRejected(format!(
                    "key for {}:{} has changed (known_hosts line {})",
                    self.host, self.port, line
                )))
            }
            Err(e) if self.strict => Err(SshError::HostKeyRejected(e.to_string())),
            Err(e) => {
                // Unreadable known_hosts is not fatal outside strict mode
                warn!("Could not check known_hosts: {}", e);
                Ok(true)
            }
        }
    }
}
