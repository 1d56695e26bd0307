//! Remote browser façade
//!
//! A [`RemoteBrowser`] owns one [`Session`] together with its navigation
//! history, quick actions and the listing of the current directory. Moves
//! through history list the target first and only commit when the listing
//! succeeded, so the current path always names a directory that could be
//! listed.

mod error;
pub mod registry;

use std::path::Path;

use tracing::{info, warn};

pub use error::BrowserError;
pub use registry::BrowserRegistry;

use crate::config::BrowserSettings;
use crate::navigation::NavigationHistory;
use crate::quick_actions::{QuickAction, QuickActionRegistry};
use crate::remote_fs::path_utils::{join_remote_path, normalize_remote_path, parent_remote_path};
use crate::remote_fs::{self, listing, RemoteEntry, TransferError};
use crate::ssh::{CommandResult, Session, SshConfig};

pub struct RemoteBrowser {
    session: Session,
    settings: BrowserSettings,
    history: NavigationHistory,
    actions: QuickActionRegistry,
    entries: Vec<RemoteEntry>,
}

impl RemoteBrowser {
    /// Connect and list the configured root.
    ///
    /// An exec timeout in `config` takes precedence over the one in
    /// `settings`.
    pub async fn connect(
        mut config: SshConfig,
        settings: BrowserSettings,
    ) -> Result<Self, BrowserError> {
        if config.exec_timeout_secs.is_none() {
            config.exec_timeout_secs = settings.exec_timeout_secs;
        }
        let session = Session::connect(config).await?;
        let mut browser = Self::with_session(session, settings);
        browser.refresh().await?;
        Ok(browser)
    }

    /// Wrap an open session. Nothing is listed yet.
    pub fn with_session(session: Session, settings: BrowserSettings) -> Self {
        Self {
            history: NavigationHistory::new(settings.root.clone()),
            session,
            settings,
            actions: QuickActionRegistry::new(),
            entries: Vec::new(),
        }
    }

    /// Seed quick actions, typically from the config file.
    pub fn with_quick_actions<'a>(
        mut self,
        actions: impl IntoIterator<Item = &'a QuickAction>,
    ) -> Self {
        self.set_quick_actions(QuickActionRegistry::from_actions(actions));
        self
    }

    pub fn set_quick_actions(&mut self, actions: QuickActionRegistry) {
        self.actions = actions;
    }

    pub async fn disconnect(&mut self) {
        self.session.disconnect().await;
        self.entries.clear();
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn settings(&self) -> &BrowserSettings {
        &self.settings
    }

    pub fn current_path(&self) -> &str {
        self.history.current()
    }

    /// Listing of the current directory, as of the last successful listing
    pub fn entries(&self) -> &[RemoteEntry] {
        &self.entries
    }

    pub fn history(&self) -> &NavigationHistory {
        &self.history
    }

    pub fn quick_actions(&self) -> &QuickActionRegistry {
        &self.actions
    }

    pub fn set_show_hidden(&mut self, show_hidden: bool) {
        self.settings.show_hidden = show_hidden;
    }

    /// List `path` without moving there.
    pub async fn list_directory(&self, path: &str) -> Result<Vec<RemoteEntry>, BrowserError> {
        Ok(listing::list_directory(&self.session, path, self.settings.show_hidden).await?)
    }

    /// List `path` and make it the current directory.
    pub async fn open_directory(&mut self, path: &str) -> Result<&[RemoteEntry], BrowserError> {
        let entries = self.list_directory(path).await?;
        self.history.navigate_to(path);
        self.entries = entries;
        info!("Opened {}", path);
        Ok(&self.entries)
    }

    /// Re-list the current directory.
    pub async fn refresh(&mut self) -> Result<&[RemoteEntry], BrowserError> {
        self.entries = self.list_directory(self.history.current()).await?;
        Ok(&self.entries)
    }

    /// Open a directory entry of the current listing.
    pub async fn enter(&mut self, entry: &RemoteEntry) -> Result<&[RemoteEntry], BrowserError> {
        if !entry.is_directory {
            return Err(BrowserError::NotADirectory(entry.full_path.clone()));
        }
        self.open_directory(&entry.full_path).await
    }

    /// Open the parent directory. At `/` nothing moves and the current
    /// listing is returned as is.
    pub async fn go_up(&mut self) -> Result<&[RemoteEntry], BrowserError> {
        let parent = self.history.parent_path();
        if normalize_remote_path(&parent) == normalize_remote_path(self.history.current()) {
            return Ok(&self.entries);
        }
        self.open_directory(&parent).await
    }

    pub async fn back(&mut self) -> Result<&[RemoteEntry], BrowserError> {
        let target = self.history.peek_back()?.to_string();
        let entries = self.list_directory(&target).await?;
        self.history.back()?;
        self.entries = entries;
        Ok(&self.entries)
    }

    pub async fn forward(&mut self) -> Result<&[RemoteEntry], BrowserError> {
        let target = self.history.peek_forward()?.to_string();
        let entries = self.list_directory(&target).await?;
        self.history.forward()?;
        self.entries = entries;
        Ok(&self.entries)
    }

    /// Entries of the current listing whose name contains `term`
    pub fn search(&self, term: &str) -> Vec<&RemoteEntry> {
        listing::filter_entries(&self.entries, term)
    }

    pub async fn fetch_file(&self, path: &str) -> Result<Vec<u8>, BrowserError> {
        Ok(remote_fs::fetch_file(&self.session, path).await?)
    }

    pub async fn upload_file(&self, bytes: &[u8], remote_path: &str) -> Result<(), BrowserError> {
        Ok(remote_fs::upload_file_chunked(
            &self.session,
            bytes,
            remote_path,
            self.settings.upload_chunk_size,
        )
        .await?)
    }

    /// Upload a local file into `remote_dir` under its own name. Returns the
    /// remote path. The listing is refreshed when `remote_dir` is current.
    pub async fn upload_local_file(
        &mut self,
        local_path: &Path,
        remote_dir: &str,
    ) -> Result<String, BrowserError> {
        let name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| TransferError::LocalReadFailed {
                path: local_path.display().to_string(),
                reason: "path has no file name".to_string(),
            })?;
        let remote_path = join_remote_path(remote_dir, &name);

        remote_fs::upload_local_file(
            &self.session,
            local_path,
            &remote_path,
            self.settings.upload_chunk_size,
        )
        .await?;

        self.refresh_if_current(remote_dir).await;
        Ok(remote_path)
    }

    pub async fn rename_file(&mut self, old_path: &str, new_path: &str) -> Result<(), BrowserError> {
        remote_fs::rename_file(&self.session, old_path, new_path).await?;
        let old_dir = parent_remote_path(old_path);
        let new_dir = parent_remote_path(new_path);
        self.refresh_if_current(&old_dir).await;
        if new_dir != old_dir {
            self.refresh_if_current(&new_dir).await;
        }
        Ok(())
    }

    /// Rename an entry within its directory. Returns the new full path.
    pub async fn rename_entry(
        &mut self,
        entry: &RemoteEntry,
        new_name: &str,
    ) -> Result<String, BrowserError> {
        let new_path = remote_fs::rename_in_place(&self.session, &entry.full_path, new_name).await?;
        self.refresh_if_current(&parent_remote_path(&entry.full_path))
            .await;
        Ok(new_path)
    }

    /// Run an arbitrary command and hand back its result unchanged.
    pub async fn run_command(&self, command: &str) -> Result<CommandResult, BrowserError> {
        Ok(self.session.execute(command).await?)
    }

    pub fn register_quick_action(&mut self, name: &str, command: &str) -> Result<(), BrowserError> {
        Ok(self.actions.register(name, command)?)
    }

    pub fn remove_quick_action(&mut self, name: &str) {
        self.actions.remove(name);
    }

    pub async fn invoke_quick_action(&self, name: &str) -> Result<CommandResult, BrowserError> {
        Ok(self.actions.invoke(&self.session, name).await?)
    }

    /// Re-list after a change that already happened remotely. A failed
    /// listing leaves the previous entries in place.
    async fn refresh_if_current(&mut self, dir: &str) {
        if normalize_remote_path(self.history.current()) != normalize_remote_path(dir) {
            return;
        }
        if let Err(e) = self.refresh().await {
            warn!("Listing of {} is stale after change: {}", dir, e);
        }
    }
}

impl std::fmt::Debug for RemoteBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteBrowser")
            .field("session", &self.session)
            .field("current", &self.history.current())
            .field("entries", &self.entries.len())
            .finish()
    }
}
