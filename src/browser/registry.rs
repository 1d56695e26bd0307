//! Several independent browsers, one per tab
//!
//! Each browser sits behind its own async mutex, which serializes the
//! operations issued against its session. Browsers never share state, so
//! different tabs run concurrently.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::info;

use super::{BrowserError, RemoteBrowser};
use crate::config::BrowserSettings;
use crate::ssh::SshConfig;

pub type SharedBrowser = Arc<Mutex<RemoteBrowser>>;

/// Registry of open browsers, keyed by tab id
pub struct BrowserRegistry {
    browsers: DashMap<String, SharedBrowser>,
}

impl BrowserRegistry {
    pub fn new() -> Self {
        Self {
            browsers: DashMap::new(),
        }
    }

    /// Connect a new browser and return its tab id.
    pub async fn open(
        &self,
        config: SshConfig,
        settings: BrowserSettings,
    ) -> Result<String, BrowserError> {
        let browser = RemoteBrowser::connect(config, settings).await?;
        Ok(self.insert(browser))
    }

    /// Register an already-connected browser.
    pub fn insert(&self, browser: RemoteBrowser) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        info!(
            "[browser-registry] Opened tab {} for {}@{}",
            id,
            browser.session().user(),
            browser.session().host()
        );
        self.browsers.insert(id.clone(), Arc::new(Mutex::new(browser)));
        id
    }

    pub fn get(&self, id: &str) -> Result<SharedBrowser, BrowserError> {
        self.browsers
            .get(id)
            .map(|r| r.value().clone())
            .ok_or_else(|| BrowserError::UnknownBrowser(id.to_string()))
    }

    /// Remove a tab and disconnect its session, waiting for any operation
    /// in flight on it.
    pub async fn close(&self, id: &str) -> Result<(), BrowserError> {
        let (_, browser) = self
            .browsers
            .remove(id)
            .ok_or_else(|| BrowserError::UnknownBrowser(id.to_string()))?;
        browser.lock().await.disconnect().await;
        info!("[browser-registry] Closed tab {}", id);
        Ok(())
    }

    pub async fn close_all(&self) {
        let ids = self.ids();
        for id in ids {
            // Concurrent close of the same id is fine to lose
            let _ = self.close(&id).await;
        }
    }

    pub fn ids(&self) -> Vec<String> {
        self.browsers.iter().map(|r| r.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.browsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.browsers.is_empty()
    }
}

impl Default for BrowserRegistry {
    fn default() -> Self {
        Self::new()
    }
}
