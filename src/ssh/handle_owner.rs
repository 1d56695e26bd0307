//! Handle Owner Task
//!
//! Only one task owns the `Handle<ClientHandler>`. Everything else talks to it
//! through a [`HandleController`], which sends commands over an mpsc channel
//! and waits for the reply on a oneshot.
//!
//! This keeps `Handle` out of `Arc<Mutex<_>>`, so no lock is ever held across
//! an `.await` on the connection.
//!
//! # Lifetime
//!
//! The task ends on an explicit [`HandleController::disconnect`] or when the
//! last controller is dropped. Either way it sends an SSH disconnect before
//! exiting, so dropping the owning [`Session`](super::Session) releases the
//! connection.

use std::time::Duration;

use russh::client::{Handle, Msg};
use russh::Channel;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::client::ClientHandler;
use super::error::SshError;

const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of a keepalive probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingResult {
    Ok,
    /// No answer in time; the link may just be slow
    Timeout,
    /// The connection is gone
    IoError,
}

/// Commands sent to the Handle Owner Task
pub enum HandleCommand {
    /// Open a session channel (used for exec)
    ChannelOpenSession {
        reply_tx: oneshot::Sender<Result<Channel<Msg>, russh::Error>>,
    },

    /// Keepalive check
    Ping {
        reply_tx: oneshot::Sender<PingResult>,
    },

    /// Disconnect the SSH connection
    Disconnect,
}

/// Controller for sending commands to the Handle Owner Task
///
/// Cloning is cheap (it copies the sender). Any holder can open channels or
/// disconnect, so controllers must stay inside the process.
#[derive(Clone)]
pub struct HandleController {
    cmd_tx: mpsc::Sender<HandleCommand>,
}

impl HandleController {
    /// Wrap an existing command sender. `spawn_handle_owner_task` is the
    /// production constructor.
    pub fn new(cmd_tx: mpsc::Sender<HandleCommand>) -> Self {
        Self { cmd_tx }
    }

    /// Open a session channel
    pub async fn open_session_channel(&self) -> Result<Channel<Msg>, SshError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(HandleCommand::ChannelOpenSession { reply_tx })
            .await
            .map_err(|_| SshError::Disconnected)?;
        reply_rx
            .await
            .map_err(|_| SshError::Disconnected)?
            .map_err(|e| match e {
                russh::Error::Disconnect => SshError::Disconnected,
                other => SshError::ChannelError(other.to_string()),
            })
    }

    /// Disconnect the SSH connection. Calling it again is harmless.
    pub async fn disconnect(&self) {
        let _ = self.cmd_tx.send(HandleCommand::Disconnect).await;
    }

    /// Ping the connection (for keepalive check)
    pub async fn ping(&self) -> PingResult {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.cmd_tx.send(HandleCommand::Ping { reply_tx }).await.is_err() {
            return PingResult::IoError;
        }
        reply_rx.await.unwrap_or(PingResult::IoError)
    }

    /// Check if the Handle Owner Task is still running
    pub fn is_connected(&self) -> bool {
        !self.cmd_tx.is_closed()
    }
}

/// Spawn the Handle Owner Task
///
/// Consumes the Handle and returns a controller for it. `session_id` is only
/// used for logging.
pub fn spawn_handle_owner_task(
    handle: Handle<ClientHandler>,
    session_id: String,
) -> HandleController {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<HandleCommand>(64);

    tokio::spawn(async move {
        info!("Handle owner task started for session {}", session_id);

        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                HandleCommand::ChannelOpenSession { reply_tx } => {
                    let result = handle.channel_open_session().await;
                    if reply_tx.send(result).is_err() {
                        // Channel is dropped here and the server closes it
                        warn!("Caller dropped before receiving channel_open_session result");
                    }
                }

                HandleCommand::Ping { reply_tx } => {
                    debug!("Keepalive probe for session {}", session_id);
                    let result =
                        match tokio::time::timeout(KEEPALIVE_TIMEOUT, handle.send_keepalive(true))
                            .await
                        {
                            Ok(Ok(())) => PingResult::Ok,
                            Ok(Err(e)) => {
                                warn!("Keepalive failed for session {}: {}", session_id, e);
                                if handle.is_closed() {
                                    PingResult::IoError
                                } else {
                                    PingResult::Timeout
                                }
                            }
                            Err(_) => {
                                warn!("Keepalive timeout for session {}", session_id);
                                PingResult::Timeout
                            }
                        };
                    let _ = reply_tx.send(result);
                }

                HandleCommand::Disconnect => {
                    info!("Disconnect requested for session {}", session_id);
                    break;
                }
            }
        }

        drain_pending_commands(&mut cmd_rx);

        let _ = handle
            .disconnect(russh::Disconnect::ByApplication, "Session closed", "en")
            .await;
        info!("Handle owner task terminated for session {}", session_id);
    });

    HandleController { cmd_tx }
}

/// Close the queue and fail everything still waiting in it.
fn drain_pending_commands(cmd_rx: &mut mpsc::Receiver<HandleCommand>) {
    cmd_rx.close();

    while let Ok(cmd) = cmd_rx.try_recv() {
        match cmd {
            HandleCommand::ChannelOpenSession { reply_tx } => {
                let _ = reply_tx.send(Err(russh::Error::Disconnect));
            }
            HandleCommand::Ping { reply_tx } => {
                let _ = reply_tx.send(PingResult::IoError);
            }
            HandleCommand::Disconnect => {}
        }
    }
}
