//! Transport seams
//!
//! The exec layer only needs two capabilities from an SSH connection: open a
//! fresh session channel, and drive one command on it. Both are traits so the
//! layers above (listing, transfer, quick actions) can run against scripted
//! channels in tests.

use async_trait::async_trait;
use russh::client::Msg;
use russh::{Channel, ChannelMsg};
use tracing::debug;

use super::error::SshError;
use super::handle_owner::{HandleController, PingResult};

/// What the remote side sent on an exec channel, reduced to what the exec
/// layer cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A chunk of stdout
    Stdout(Vec<u8>),
    /// A chunk of stderr (extended data type 1)
    Stderr(Vec<u8>),
    /// The server accepted the exec request
    ExecAccepted,
    /// The server refused the exec request
    ExecRejected,
    ExitStatus(u32),
    ExitSignal(String),
    /// Remote end of output
    Eof,
    /// Channel closed by the remote
    Close,
}

/// One exec-capable channel.
#[async_trait]
pub trait ExecChannel: Send {
    /// Request execution of `command` on this channel.
    async fn exec(&mut self, command: &str) -> Result<(), SshError>;

    /// Next event, or `None` once the channel is gone.
    async fn next_event(&mut self) -> Option<ChannelEvent>;

    /// Signal end of input. Best-effort.
    async fn send_eof(&mut self);

    /// Close the channel. Best-effort.
    async fn close(&mut self);
}

/// An authenticated connection able to hand out exec channels.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open_exec_channel(&self) -> Result<Box<dyn ExecChannel>, SshError>;

    /// Keepalive probe
    async fn ping(&self) -> PingResult;

    /// Tear the connection down. Must be safe to call more than once.
    async fn shutdown(&self);

    fn is_alive(&self) -> bool;
}

#[async_trait]
impl ExecChannel for Channel<Msg> {
    async fn exec(&mut self, command: &str) -> Result<(), SshError> {
        Channel::exec(self, true, command)
            .await
            .map_err(|e| SshError::ExecRejected(e.to_string()))
    }

    async fn next_event(&mut self) -> Option<ChannelEvent> {
        loop {
            let event = match self.wait().await? {
                ChannelMsg::Data { data } => ChannelEvent::Stdout(data.to_vec()),
                ChannelMsg::ExtendedData { data, ext: 1 } => ChannelEvent::Stderr(data.to_vec()),
                ChannelMsg::Success => ChannelEvent::ExecAccepted,
                ChannelMsg::Failure => ChannelEvent::ExecRejected,
                ChannelMsg::ExitStatus { exit_status } => ChannelEvent::ExitStatus(exit_status),
                ChannelMsg::ExitSignal { signal_name, .. } => {
                    ChannelEvent::ExitSignal(format!("{:?}", signal_name))
                }
                ChannelMsg::Eof => ChannelEvent::Eof,
                ChannelMsg::Close => ChannelEvent::Close,
                _ => {
                    // WindowAdjusted and friends
                    continue;
                }
            };
            return Some(event);
        }
    }

    async fn send_eof(&mut self) {
        if let Err(e) = self.eof().await {
            debug!("EOF on exec channel not delivered: {}", e);
        }
    }

    async fn close(&mut self) {
        if let Err(e) = Channel::close(self).await {
            debug!("Close on exec channel not delivered: {}", e);
        }
    }
}

#[async_trait]
impl Transport for HandleController {
    async fn open_exec_channel(&self) -> Result<Box<dyn ExecChannel>, SshError> {
        let channel = self.open_session_channel().await?;
        Ok(Box::new(channel))
    }

    async fn ping(&self) -> PingResult {
        HandleController::ping(self).await
    }

    async fn shutdown(&self) {
        self.disconnect().await;
    }

    fn is_alive(&self) -> bool {
        self.is_connected()
    }
}
