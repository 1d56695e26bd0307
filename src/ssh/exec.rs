//! One command, one channel
//!
//! Every call opens a fresh session channel, requests exec of the exact
//! command string, sends EOF on stdin and collects everything the remote
//! writes until the channel closes. The channel is closed again before the
//! call returns, on every path.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::error::{ExecError, SshError};
use super::session::Session;
use super::transport::{ChannelEvent, ExecChannel};

/// Longest command prefix written to the debug log
const LOG_PREVIEW_LEN: usize = 160;

/// Outcome of one remote command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Exit status, if the server reported one
    pub exit_status: Option<u32>,
    /// Signal name, if the command was killed by one
    pub exit_signal: Option<String>,
    /// Every stdout chunk, concatenated in arrival order
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Exit status 0, or no status and no signal reported at all
    pub succeeded: bool,
    pub duration: Duration,
}

impl CommandResult {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

#[derive(Default)]
struct Captured {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_status: Option<u32>,
    exit_signal: Option<String>,
}

/// Run `command` with the session's configured exec timeout.
pub async fn execute(session: &Session, command: &str) -> Result<CommandResult, ExecError> {
    execute_with_timeout(session, command, session.exec_timeout()).await
}

/// Run `command`, giving up after `timeout` (if any).
///
/// The command string is sent verbatim. Anything interpolated into it must
/// already be quoted, see [`crate::remote_fs::shell`].
pub async fn execute_with_timeout(
    session: &Session,
    command: &str,
    timeout: Option<Duration>,
) -> Result<CommandResult, ExecError> {
    let transport = session.transport()?;
    let _exec_guard = session.lock_exec().await;

    // State may have changed while we queued
    if !session.is_connected() {
        return Err(ExecError::NotConnected);
    }

    debug!("exec [{}]: {}", session.id(), preview(command));

    let channel = match transport.open_exec_channel().await {
        Ok(channel) => channel,
        Err(SshError::Disconnected) => {
            session.mark_failed();
            return Err(ExecError::ChannelOpenFailed("connection closed".to_string()));
        }
        Err(e) => return Err(ExecError::ChannelOpenFailed(e.to_string())),
    };

    let started = Instant::now();
    let mut guard = ChannelGuard::new(channel);

    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, guard.run(command)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    "exec [{}] timed out after {:?}: {}",
                    session.id(),
                    limit,
                    preview(command)
                );
                Err(ExecError::Timeout(limit))
            }
        },
        None => guard.run(command).await,
    };

    guard.release().await;

    let captured = match outcome {
        Err(ExecError::ConnectionLost(reason)) => {
            session.mark_failed();
            return Err(ExecError::ConnectionLost(reason));
        }
        other => other?,
    };
    let succeeded = match (captured.exit_status, &captured.exit_signal) {
        (Some(status), _) => status == 0,
        (None, Some(_)) => false,
        (None, None) => true,
    };

    debug!(
        "exec [{}] completed: exit={:?} stdout_len={} stderr_len={}",
        session.id(),
        captured.exit_status,
        captured.stdout.len(),
        captured.stderr.len()
    );

    Ok(CommandResult {
        exit_status: captured.exit_status,
        exit_signal: captured.exit_signal,
        stdout: captured.stdout,
        stderr: captured.stderr,
        succeeded,
        duration: started.elapsed(),
    })
}

/// Owns an open channel until [`ChannelGuard::release`] sends the missing
/// EOF and closes it.
struct ChannelGuard {
    channel: Box<dyn ExecChannel>,
    eof_sent: bool,
}

impl ChannelGuard {
    fn new(channel: Box<dyn ExecChannel>) -> Self {
        Self {
            channel,
            eof_sent: false,
        }
    }

    async fn run(&mut self, command: &str) -> Result<Captured, ExecError> {
        self.channel
            .exec(command)
            .await
            .map_err(|e| ExecError::ExecRequestFailed(e.to_string()))?;

        // No stdin is ever supplied; commands that read it must see EOF
        self.channel.send_eof().await;
        self.eof_sent = true;

        let mut captured = Captured::default();
        let mut closed = false;
        while let Some(event) = self.channel.next_event().await {
            match event {
                ChannelEvent::Stdout(data) => captured.stdout.extend_from_slice(&data),
                ChannelEvent::Stderr(data) => captured.stderr.extend_from_slice(&data),
                ChannelEvent::ExecAccepted => {}
                ChannelEvent::ExecRejected => {
                    return Err(ExecError::ExecRequestFailed(
                        "server refused the exec request".to_string(),
                    ));
                }
                ChannelEvent::ExitStatus(status) => captured.exit_status = Some(status),
                ChannelEvent::ExitSignal(signal) => captured.exit_signal = Some(signal),
                // Exit status usually follows EOF, keep reading until close
                ChannelEvent::Eof => {}
                ChannelEvent::Close => {
                    closed = true;
                    break;
                }
            }
        }

        // Stream ended without a close: the connection died mid-command and
        // whatever was captured may be cut short
        if !closed {
            return Err(ExecError::ConnectionLost(format!(
                "channel ended after {} bytes of output without closing",
                captured.stdout.len() + captured.stderr.len()
            )));
        }

        Ok(captured)
    }

    async fn release(mut self) {
        if !self.eof_sent {
            self.channel.send_eof().await;
        }
        self.channel.close().await;
    }
}

fn preview(command: &str) -> String {
    if command.len() <= LOG_PREVIEW_LEN {
        return command.to_string();
    }
    let mut end = LOG_PREVIEW_LEN;
    while !command.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... ({} bytes)", &command[..end], command.len())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::ssh::mock::{MockReply, MockTransport};

    #[tokio::test]
    async fn test_captures_output_and_releases_channel() {
        let mock = Arc::new(MockTransport::with_responses(&[(
            "echo hi",
            MockReply::ok("hi\n"),
        )]));
        let session = mock.session();

        let result = session.execute("echo hi").await.unwrap();
        assert_eq!(result.stdout, b"hi\n");
        assert_eq!(result.exit_status, Some(0));
        assert!(result.succeeded);

        let logs = mock.channel_logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].command.as_deref(), Some("echo hi"));
        assert!(logs[0].eof_sent);
        assert!(logs[0].closed);
    }

    #[tokio::test]
    async fn test_large_output_is_not_truncated() {
        let payload: Vec<u8> = (0..1_000_000u32).map(|i| (i % 251) as u8).collect();
        let mock = Arc::new(
            MockTransport::with_responses(&[("dump", MockReply::ok_bytes(payload.clone()))])
                .with_chunk_size(4096),
        );
        let session = mock.session();

        let result = session.execute("dump").await.unwrap();
        assert_eq!(result.stdout.len(), payload.len());
        assert_eq!(result.stdout, payload);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_a_result_not_an_error() {
        let mock = Arc::new(MockTransport::with_responses(&[(
            "false",
            MockReply::fail(1, "nope"),
        )]));
        let session = mock.session();

        let result = session.execute("false").await.unwrap();
        assert!(!result.succeeded);
        assert_eq!(result.exit_status, Some(1));
        assert_eq!(result.stderr_text(), "nope");
    }

    #[tokio::test]
    async fn test_missing_exit_status_counts_as_success() {
        let mock = Arc::new(MockTransport::with_responses(&[(
            "legacy",
            MockReply::Output {
                stdout: b"ok".to_vec(),
                stderr: Vec::new(),
                exit_status: None,
            },
        )]));
        let result = mock.session().execute("legacy").await.unwrap();
        assert!(result.succeeded);
        assert_eq!(result.exit_status, None);
    }

    #[tokio::test]
    async fn test_channel_ending_without_close_is_an_error() {
        let mock = Arc::new(MockTransport::with_responses(&[(
            "ls -1p -- '/'",
            MockReply::Truncated {
                stdout: b"a.txt\nsu".to_vec(),
            },
        )]));
        let session = mock.session();

        assert!(matches!(
            session.execute("ls -1p -- '/'").await,
            Err(ExecError::ConnectionLost(_))
        ));
        assert_eq!(session.state(), crate::ssh::ConnectionState::Failed);
        assert!(mock.channel_logs()[0].closed);
        assert!(matches!(
            session.execute("ls -1p -- '/'").await,
            Err(ExecError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_exec_rejection_still_closes_channel() {
        let mock = Arc::new(MockTransport::with_responses(&[
            ("denied", MockReply::RejectExec),
            ("broken", MockReply::ExecError),
        ]));
        let session = mock.session();

        assert!(matches!(
            session.execute("denied").await,
            Err(ExecError::ExecRequestFailed(_))
        ));
        assert!(matches!(
            session.execute("broken").await,
            Err(ExecError::ExecRequestFailed(_))
        ));

        for log in mock.channel_logs() {
            assert!(log.eof_sent, "eof missing for {:?}", log.command);
            assert!(log.closed, "close missing for {:?}", log.command);
        }
    }

    #[tokio::test]
    async fn test_channel_open_failure() {
        let mock = Arc::new(MockTransport::with_responses(&[]));
        mock.fail_next_open(SshError::ChannelError("administratively prohibited".into()));
        let session = mock.session();

        assert!(matches!(
            session.execute("true").await,
            Err(ExecError::ChannelOpenFailed(ref m)) if m.contains("prohibited")
        ));
        assert!(session.is_connected());
        assert!(mock.channel_logs().is_empty());
    }

    #[tokio::test]
    async fn test_channel_open_on_dead_connection_fails_session() {
        let mock = Arc::new(MockTransport::with_responses(&[]));
        mock.fail_next_open(SshError::Disconnected);
        let session = mock.session();

        assert!(matches!(
            session.execute("true").await,
            Err(ExecError::ChannelOpenFailed(_))
        ));
        assert_eq!(session.state(), crate::ssh::ConnectionState::Failed);
        assert!(matches!(
            session.execute("true").await,
            Err(ExecError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_timeout_closes_channel() {
        let mock = Arc::new(MockTransport::with_responses(&[("sleep 1000", MockReply::Hang)]));
        let session = mock.session();

        let result = session
            .execute_with_timeout("sleep 1000", Some(Duration::from_millis(50)))
            .await;
        assert!(matches!(result, Err(ExecError::Timeout(d)) if d == Duration::from_millis(50)));

        let logs = mock.channel_logs();
        assert!(logs[0].eof_sent);
        assert!(logs[0].closed);
        // Session stays usable
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn test_fresh_channel_per_call() {
        let mock = Arc::new(MockTransport::with_responses(&[("true", MockReply::ok(""))]));
        let session = mock.session();
        for _ in 0..3 {
            session.execute("true").await.unwrap();
        }
        assert_eq!(mock.channel_logs().len(), 3);
        assert_eq!(mock.executed(), vec!["true", "true", "true"]);
    }

    #[tokio::test]
    async fn test_concurrent_calls_are_serialized() {
        let mock = Arc::new(
            MockTransport::with_responses(&[("work", MockReply::ok("done"))]).with_chunk_size(1),
        );
        let session = Arc::new(mock.session());

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let session = session.clone();
            tasks.push(tokio::spawn(async move { session.execute("work").await }));
        }
        for task in tasks {
            assert!(task.await.unwrap().unwrap().succeeded);
        }

        assert_eq!(mock.max_open_channels(), 1);
        assert_eq!(mock.channel_logs().len(), 8);
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let short = "ls -1p -- '/tmp'";
        assert_eq!(preview(short), short);

        let long = "é".repeat(200);
        let shown = preview(&long);
        assert!(shown.ends_with("(400 bytes)"));
        assert!(shown.len() < long.len());
    }
}
