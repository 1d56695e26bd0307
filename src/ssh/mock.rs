//! Scripted in-memory transport for tests
//!
//! Each exec channel looks up its reply by command string (or through a
//! custom responder) and records what happened to it, so tests can assert
//! on channel lifecycle as well as on output.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::config::SshConfig;
use super::error::SshError;
use super::handle_owner::PingResult;
use super::session::Session;
use super::transport::{ChannelEvent, ExecChannel, Transport};

/// What the fake server does with an exec request
#[derive(Debug, Clone)]
pub enum MockReply {
    Output {
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        exit_status: Option<u32>,
    },
    /// Server answers the exec request with `Failure`
    RejectExec,
    /// Sending the exec request itself errors
    ExecError,
    /// Never produces output or closes
    Hang,
    /// Sends some stdout, then the stream ends with no exit status or close
    Truncated { stdout: Vec<u8> },
    /// Waits before delivering the inner reply
    Delayed(Duration, Box<MockReply>),
}

impl MockReply {
    pub fn ok(stdout: &str) -> Self {
        Self::ok_bytes(stdout.as_bytes().to_vec())
    }

    pub fn ok_bytes(stdout: Vec<u8>) -> Self {
        MockReply::Output {
            stdout,
            stderr: Vec::new(),
            exit_status: Some(0),
        }
    }

    pub fn fail(status: u32, stderr: &str) -> Self {
        MockReply::Output {
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
            exit_status: Some(status),
        }
    }
}

/// Lifecycle record of one channel
#[derive(Debug, Clone, Default)]
pub struct ChannelLog {
    pub command: Option<String>,
    pub eof_sent: bool,
    pub closed: bool,
}

type Responder = dyn Fn(&str) -> MockReply + Send + Sync;

pub struct MockTransport {
    responder: Arc<Responder>,
    chunk_size: usize,
    executed: Arc<Mutex<Vec<String>>>,
    logs: Mutex<Vec<Arc<Mutex<ChannelLog>>>>,
    next_open_error: Mutex<Option<SshError>>,
    alive: AtomicBool,
    shutdowns: AtomicUsize,
    open_channels: Arc<AtomicUsize>,
    max_open_channels: Arc<AtomicUsize>,
}

impl MockTransport {
    /// Reply through a closure, for commands that embed generated names.
    pub fn new(responder: impl Fn(&str) -> MockReply + Send + Sync + 'static) -> Self {
        Self {
            responder: Arc::new(responder),
            chunk_size: 64 * 1024,
            executed: Arc::new(Mutex::new(Vec::new())),
            logs: Mutex::new(Vec::new()),
            next_open_error: Mutex::new(None),
            alive: AtomicBool::new(true),
            shutdowns: AtomicUsize::new(0),
            open_channels: Arc::new(AtomicUsize::new(0)),
            max_open_channels: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fixed replies by exact command; anything else exits 127.
    pub fn with_responses(responses: &[(&str, MockReply)]) -> Self {
        let table: HashMap<String, MockReply> = responses
            .iter()
            .map(|(cmd, reply)| (cmd.to_string(), reply.clone()))
            .collect();
        Self::new(move |cmd| {
            table
                .get(cmd)
                .cloned()
                .unwrap_or_else(|| MockReply::fail(127, "command not found"))
        })
    }

    /// Deliver stdout in chunks of this size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn session(self: &Arc<Self>) -> Session {
        let config = SshConfig::new("mock.host", "tester", super::AuthMethod::password(""));
        Session::with_transport(config, self.clone())
    }

    pub fn fail_next_open(&self, err: SshError) {
        *self.next_open_error.lock() = Some(err);
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }

    pub fn channel_logs(&self) -> Vec<ChannelLog> {
        self.logs.lock().iter().map(|log| log.lock().clone()).collect()
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    /// Highest number of channels that were open at the same time
    pub fn max_open_channels(&self) -> usize {
        self.max_open_channels.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open_exec_channel(&self) -> Result<Box<dyn ExecChannel>, SshError> {
        if let Some(err) = self.next_open_error.lock().take() {
            return Err(err);
        }
        if !self.alive.load(Ordering::SeqCst) {
            return Err(SshError::Disconnected);
        }

        let open = self.open_channels.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_open_channels.fetch_max(open, Ordering::SeqCst);

        let log = Arc::new(Mutex::new(ChannelLog::default()));
        self.logs.lock().push(log.clone());

        Ok(Box::new(MockChannel {
            responder: self.responder.clone(),
            chunk_size: self.chunk_size,
            executed: self.executed.clone(),
            log,
            open_channels: self.open_channels.clone(),
            events: VecDeque::new(),
            hang: false,
            delay: None,
            released: false,
        }))
    }

    async fn ping(&self) -> PingResult {
        if self.alive.load(Ordering::SeqCst) {
            PingResult::Ok
        } else {
            PingResult::IoError
        }
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.alive.store(false, Ordering::SeqCst);
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

struct MockChannel {
    responder: Arc<Responder>,
    chunk_size: usize,
    executed: Arc<Mutex<Vec<String>>>,
    log: Arc<Mutex<ChannelLog>>,
    open_channels: Arc<AtomicUsize>,
    events: VecDeque<ChannelEvent>,
    hang: bool,
    delay: Option<Duration>,
    released: bool,
}

impl MockChannel {
    fn script(&mut self, reply: MockReply) -> Result<(), SshError> {
        match reply {
            MockReply::Output {
                stdout,
                stderr,
                exit_status,
            } => {
                self.events.push_back(ChannelEvent::ExecAccepted);
                for chunk in stdout.chunks(self.chunk_size) {
                    self.events.push_back(ChannelEvent::Stdout(chunk.to_vec()));
                }
                if !stderr.is_empty() {
                    self.events.push_back(ChannelEvent::Stderr(stderr));
                }
                self.events.push_back(ChannelEvent::Eof);
                if let Some(status) = exit_status {
                    self.events.push_back(ChannelEvent::ExitStatus(status));
                }
                self.events.push_back(ChannelEvent::Close);
            }
            MockReply::RejectExec => self.events.push_back(ChannelEvent::ExecRejected),
            MockReply::ExecError => {
                return Err(SshError::ExecRejected("channel went away".to_string()));
            }
            MockReply::Hang => self.hang = true,
            MockReply::Truncated { stdout } => {
                self.events.push_back(ChannelEvent::ExecAccepted);
                self.events.push_back(ChannelEvent::Stdout(stdout));
            }
            MockReply::Delayed(delay, reply) => {
                self.delay = Some(delay);
                self.script(*reply)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ExecChannel for MockChannel {
    async fn exec(&mut self, command: &str) -> Result<(), SshError> {
        self.log.lock().command = Some(command.to_string());
        self.executed.lock().push(command.to_string());

        let reply = (self.responder)(command);
        self.script(reply)
    }

    async fn next_event(&mut self) -> Option<ChannelEvent> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delay.take() {
            tokio::time::sleep(delay).await;
        }
        // Let other tasks run between chunks
        tokio::task::yield_now().await;
        self.events.pop_front()
    }

    async fn send_eof(&mut self) {
        self.log.lock().eof_sent = true;
    }

    async fn close(&mut self) {
        self.log.lock().closed = true;
        if !self.released {
            self.released = true;
            self.open_channels.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
