//! Blocking wrapper around [`RemoteBrowser`]
//!
//! For callers without an async runtime. The wrapper owns a small
//! multi-threaded runtime, which keeps the connection's background task
//! alive between calls. Do not use it from inside another tokio runtime.

use std::path::Path;

use tracing::debug;

use crate::browser::{BrowserError, RemoteBrowser};
use crate::config::BrowserSettings;
use crate::navigation::NavigationHistory;
use crate::quick_actions::{QuickAction, QuickActionRegistry};
use crate::remote_fs::RemoteEntry;
use crate::ssh::{CommandResult, Session, SshConfig};

const WORKER_THREADS: usize = 2;

pub struct BlockingBrowser {
    inner: RemoteBrowser,
    runtime: tokio::runtime::Runtime,
}

fn build_runtime() -> Result<tokio::runtime::Runtime, BrowserError> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(WORKER_THREADS)
        .thread_name("execfs-worker")
        .enable_all()
        .build()
        .map_err(BrowserError::Runtime)
}

impl BlockingBrowser {
    /// Connect and list the configured root.
    pub fn connect(config: SshConfig, settings: BrowserSettings) -> Result<Self, BrowserError> {
        let runtime = build_runtime()?;
        let inner = runtime.block_on(RemoteBrowser::connect(config, settings))?;
        Ok(Self { inner, runtime })
    }

    /// Wrap an already-open session.
    pub fn with_session(session: Session, settings: BrowserSettings) -> Result<Self, BrowserError> {
        Ok(Self {
            inner: RemoteBrowser::with_session(session, settings),
            runtime: build_runtime()?,
        })
    }

    pub fn with_quick_actions<'a>(
        mut self,
        actions: impl IntoIterator<Item = &'a QuickAction>,
    ) -> Self {
        self.inner
            .set_quick_actions(QuickActionRegistry::from_actions(actions));
        self
    }

    pub fn disconnect(&mut self) {
        self.runtime.block_on(self.inner.disconnect());
    }

    pub fn session(&self) -> &Session {
        self.inner.session()
    }

    pub fn current_path(&self) -> &str {
        self.inner.current_path()
    }

    pub fn entries(&self) -> &[RemoteEntry] {
        self.inner.entries()
    }

    pub fn history(&self) -> &NavigationHistory {
        self.inner.history()
    }

    pub fn quick_actions(&self) -> &QuickActionRegistry {
        self.inner.quick_actions()
    }

    pub fn set_show_hidden(&mut self, show_hidden: bool) {
        self.inner.set_show_hidden(show_hidden);
    }

    pub fn list_directory(&self, path: &str) -> Result<Vec<RemoteEntry>, BrowserError> {
        self.runtime.block_on(self.inner.list_directory(path))
    }

    pub fn open_directory(&mut self, path: &str) -> Result<Vec<RemoteEntry>, BrowserError> {
        self.runtime.block_on(self.inner.open_directory(path)).map(<[_]>::to_vec)
    }

    pub fn refresh(&mut self) -> Result<Vec<RemoteEntry>, BrowserError> {
        self.runtime.block_on(self.inner.refresh()).map(<[_]>::to_vec)
    }

    pub fn enter(&mut self, entry: &RemoteEntry) -> Result<Vec<RemoteEntry>, BrowserError> {
        self.runtime.block_on(self.inner.enter(entry)).map(<[_]>::to_vec)
    }

    pub fn go_up(&mut self) -> Result<Vec<RemoteEntry>, BrowserError> {
        self.runtime.block_on(self.inner.go_up()).map(<[_]>::to_vec)
    }

    pub fn back(&mut self) -> Result<Vec<RemoteEntry>, BrowserError> {
        self.runtime.block_on(self.inner.back()).map(<[_]>::to_vec)
    }

    pub fn forward(&mut self) -> Result<Vec<RemoteEntry>, BrowserError> {
        self.runtime.block_on(self.inner.forward()).map(<[_]>::to_vec)
    }

    pub fn search(&self, term: &str) -> Vec<RemoteEntry> {
        self.inner.search(term).into_iter().cloned().collect()
    }

    pub fn fetch_file(&self, path: &str) -> Result<Vec<u8>, BrowserError> {
        self.runtime.block_on(self.inner.fetch_file(path))
    }

    pub fn upload_file(&self, bytes: &[u8], remote_path: &str) -> Result<(), BrowserError> {
        self.runtime.block_on(self.inner.upload_file(bytes, remote_path))
    }

    pub fn upload_local_file(
        &mut self,
        local_path: &Path,
        remote_dir: &str,
    ) -> Result<String, BrowserError> {
        self.runtime
            .block_on(self.inner.upload_local_file(local_path, remote_dir))
    }

    pub fn rename_file(&mut self, old_path: &str, new_path: &str) -> Result<(), BrowserError> {
        self.runtime.block_on(self.inner.rename_file(old_path, new_path))
    }

    pub fn rename_entry(&mut self, entry: &RemoteEntry, new_name: &str) -> Result<String, BrowserError> {
        self.runtime.block_on(self.inner.rename_entry(entry, new_name))
    }

    pub fn run_command(&self, command: &str) -> Result<CommandResult, BrowserError> {
        self.runtime.block_on(self.inner.run_command(command))
    }

    pub fn register_quick_action(&mut self, name: &str, command: &str) -> Result<(), BrowserError> {
        self.inner.register_quick_action(name, command)
    }

    pub fn remove_quick_action(&mut self, name: &str) {
        self.inner.remove_quick_action(name);
    }

    pub fn invoke_quick_action(&self, name: &str) -> Result<CommandResult, BrowserError> {
        self.runtime.block_on(self.inner.invoke_quick_action(name))
    }
}

impl Drop for BlockingBrowser {
    fn drop(&mut self) {
        // block_on panics inside another runtime; the session's own drop
        // still releases the connection there
        if tokio::runtime::Handle::try_current().is_ok() {
            return;
        }
        if self.inner.session().is_connected() {
            debug!("Disconnecting blocking browser on drop");
            self.runtime.block_on(self.inner.disconnect());
        }
    }
}
