//! SSH Session management
//!
//! A [`Session`] owns exactly one authenticated connection. Channels are
//! opened per command through the [`Transport`] it holds; the connection
//! itself is released on [`Session::disconnect`] or when the session is
//! dropped, whichever comes first.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::client::SshClient;
use super::config::SshConfig;
use super::error::{ConnectError, ExecError};
use super::exec::{self, CommandResult};
use super::handle_owner::PingResult;
use super::transport::Transport;

/// Connection state of a [`Session`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connected,
    /// The last connect attempt failed, or the link died underneath us
    Failed,
}

/// One authenticated connection to a remote host
pub struct Session {
    id: String,
    config: SshConfig,
    state: Mutex<ConnectionState>,
    transport: Mutex<Option<Arc<dyn Transport>>>,
    /// Held for a whole open/exec/read/close cycle; one command at a time
    exec_lock: tokio::sync::Mutex<()>,
}

impl Session {
    /// Create a session in `Disconnected` state. Nothing touches the network
    /// until [`Session::open`].
    pub fn new(config: SshConfig) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            config,
            state: Mutex::new(ConnectionState::Disconnected),
            transport: Mutex::new(None),
            exec_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Connect and authenticate, returning a `Connected` session.
    pub async fn connect(config: SshConfig) -> Result<Self, ConnectError> {
        let session = Self::new(config);
        session.open().await?;
        Ok(session)
    }

    /// Wrap an already-established transport. The session starts `Connected`.
    pub fn with_transport(config: SshConfig, transport: Arc<dyn Transport>) -> Self {
        let session = Self::new(config);
        *session.transport.lock() = Some(transport);
        *session.state.lock() = ConnectionState::Connected;
        session
    }

    /// Open the connection. A no-op when already connected.
    pub async fn open(&self) -> Result<(), ConnectError> {
        if self.is_connected() {
            return Ok(());
        }

        match SshClient::new(self.config.clone()).connect(&self.id).await {
            Ok(controller) => {
                *self.transport.lock() = Some(Arc::new(controller));
                *self.state.lock() = ConnectionState::Connected;
                info!(
                    "Session {} connected to {}@{}:{}",
                    self.id, self.config.username, self.config.host, self.config.port
                );
                Ok(())
            }
            Err(e) => {
                *self.state.lock() = ConnectionState::Failed;
                warn!("Session {} failed to connect: {}", self.id, e);
                Err(e.into())
            }
        }
    }

    /// Close the connection. Idempotent: closing a closed or never-opened
    /// session does nothing.
    pub async fn disconnect(&self) {
        let transport = self.transport.lock().take();
        *self.state.lock() = ConnectionState::Disconnected;

        if let Some(transport) = transport {
            info!("Disconnecting session {}", self.id);
            transport.shutdown().await;
        }
    }

    /// Keepalive probe. A dead link moves the session to `Failed`.
    pub async fn ping(&self) -> PingResult {
        let Ok(transport) = self.transport() else {
            return PingResult::IoError;
        };
        let result = transport.ping().await;
        if result == PingResult::IoError {
            self.mark_failed();
        }
        result
    }

    /// Run one command with the configured exec timeout.
    pub async fn execute(&self, command: &str) -> Result<CommandResult, ExecError> {
        exec::execute(self, command).await
    }

    /// Run one command with an explicit deadline (`None` waits forever).
    pub async fn execute_with_timeout(
        &self,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandResult, ExecError> {
        exec::execute_with_timeout(self, command, timeout).await
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub fn user(&self) -> &str {
        &self.config.username
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub fn exec_timeout(&self) -> Option<Duration> {
        self.config.exec_timeout()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Transport for a channel operation; only valid while `Connected`.
    pub(crate) fn transport(&self) -> Result<Arc<dyn Transport>, ExecError> {
        if self.state() != ConnectionState::Connected {
            return Err(ExecError::NotConnected);
        }
        self.transport.lock().clone().ok_or(ExecError::NotConnected)
    }

    pub(crate) async fn lock_exec(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.exec_lock.lock().await
    }

    /// The connection went away without a disconnect from our side.
    pub(crate) fn mark_failed(&self) {
        let mut state = self.state.lock();
        if *state == ConnectionState::Connected {
            warn!("Session {} lost its connection", self.id);
            *state = ConnectionState::Failed;
        }
        // Dropping the transport lets the owner task finish its cleanup
        self.transport.lock().take();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Dropping the last controller ends the owner task, which sends the
        // SSH disconnect
        if self.transport.get_mut().take().is_some() {
            debug!("Dropping connected session {}", self.id);
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("host", &self.config.host)
            .field("user", &self.config.username)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::mock::{MockReply, MockTransport};
    use crate::ssh::test_server;
    use crate::ssh::AuthMethod;

    #[tokio::test]
    async fn test_new_session_is_disconnected() {
        let session = Session::new(SshConfig::default());
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert!(matches!(
            session.execute("true").await,
            Err(ExecError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let mock = Arc::new(MockTransport::with_responses(&[]));
        let session = mock.session();
        assert!(session.is_connected());

        session.disconnect().await;
        session.disconnect().await;

        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert_eq!(mock.shutdown_count(), 1);
        assert!(matches!(
            session.execute("true").await,
            Err(ExecError::NotConnected)
        ));

        // Never-opened session
        Session::new(SshConfig::default()).disconnect().await;
    }

    #[tokio::test]
    async fn test_drop_releases_transport() {
        let mock = Arc::new(MockTransport::with_responses(&[("true", MockReply::ok(""))]));
        {
            let session = mock.session();
            session.execute("true").await.unwrap();
            assert_eq!(Arc::strong_count(&mock), 2);
        }
        assert_eq!(Arc::strong_count(&mock), 1);
    }

    #[tokio::test]
    async fn test_lost_connection_marks_failed() {
        let mock = Arc::new(MockTransport::with_responses(&[]));
        mock.set_alive(false);
        let session = mock.session();

        assert_eq!(session.ping().await, PingResult::IoError);
        assert_eq!(session.state(), ConnectionState::Failed);
        assert!(matches!(
            session.execute("true").await,
            Err(ExecError::NotConnected)
        ));
    }

    fn loopback_config(addr: std::net::SocketAddr, password: &str, known_hosts: &std::path::Path) -> SshConfig {
        let mut config = SshConfig::new("127.0.0.1", "tester", AuthMethod::password(password));
        config.port = addr.port();
        config.timeout_secs = 5;
        config.known_hosts_file = Some(known_hosts.to_path_buf());
        config
    }

    #[tokio::test]
    async fn test_connect_with_valid_password() {
        let addr = test_server::start("hunter2").await;
        let dir = tempfile::tempdir().unwrap();
        let known_hosts = dir.path().join("known_hosts");

        let session = Session::connect(loopback_config(addr, "hunter2", &known_hosts))
            .await
            .unwrap();
        assert_eq!(session.state(), ConnectionState::Connected);

        let result = session.execute("printf hi").await.unwrap();
        assert!(result.succeeded);
        assert_eq!(result.exit_status, Some(0));
        assert_eq!(result.stdout_text(), "printf hi");

        session.disconnect().await;
        assert_eq!(session.state(), ConnectionState::Disconnected);

        // The key was learned, so strict mode now accepts the host
        assert!(std::fs::read_to_string(&known_hosts)
            .unwrap()
            .contains(&format!("[127.0.0.1]:{}", addr.port())));
        let mut strict = loopback_config(addr, "hunter2", &known_hosts);
        strict.strict_host_key_checking = true;
        let session = Session::connect(strict).await.unwrap();
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn test_connect_with_wrong_password_is_auth_rejected() {
        let addr = test_server::start("hunter2").await;
        let dir = tempfile::tempdir().unwrap();

        let result =
            Session::connect(loopback_config(addr, "letmein", &dir.path().join("known_hosts"))).await;
        assert!(matches!(result, Err(ConnectError::AuthRejected(_))));
    }

    #[tokio::test]
    async fn test_connect_to_unknown_host_in_strict_mode_is_handshake_failure() {
        let addr = test_server::start("hunter2").await;
        let dir = tempfile::tempdir().unwrap();
        let known_hosts = dir.path().join("known_hosts");
        let mut config = loopback_config(addr, "hunter2", &known_hosts);
        config.strict_host_key_checking = true;

        let session = Session::new(config);
        match session.open().await {
            Err(ConnectError::HandshakeFailed(msg)) => assert!(msg.contains("unknown host")),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(session.state(), ConnectionState::Failed);
        assert!(!known_hosts.exists());
    }

    #[tokio::test]
    async fn test_connect_timeout_is_handshake_failure() {
        let addr = test_server::start_silent().await;
        let dir = tempfile::tempdir().unwrap();
        let mut config = loopback_config(addr, "hunter2", &dir.path().join("known_hosts"));
        config.timeout_secs = 1;

        let result = Session::connect(config).await;
        assert!(matches!(result, Err(ConnectError::HandshakeFailed(ref m)) if m.contains("timed out")));
    }
}
