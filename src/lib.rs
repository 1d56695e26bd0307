//! execfs - browse and transfer remote files over plain SSH exec channels
//!
//! No SFTP subsystem is needed on the server: listings come from `ls`,
//! downloads and uploads go through `base64`, renames through `mv`. One
//! authenticated connection serves many short-lived exec channels.

pub mod blocking;
pub mod browser;
pub mod config;
pub mod navigation;
pub mod quick_actions;
pub mod remote_fs;
pub mod ssh;

pub use blocking::BlockingBrowser;
pub use browser::{BrowserError, BrowserRegistry, RemoteBrowser};
pub use navigation::{HistoryError, NavigationHistory};
pub use quick_actions::{ActionError, QuickAction, QuickActionRegistry};
pub use remote_fs::{ListError, RemoteEntry, TransferError};
pub use ssh::{connect, AuthMethod, CommandResult, ConnectError, ExecError, Session, SshConfig};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber: `RUST_LOG` filter (default `info`) and a
/// fmt layer on stderr. Later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
