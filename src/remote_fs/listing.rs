//! Directory listings
//!
//! Listings come from `ls -1p`: one entry per line, directories marked by a
//! trailing `/`. The path is always passed with a trailing slash so a
//! symlinked directory is listed by its contents and a plain file fails.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::ListError;
use super::path_utils::join_remote_path;
use super::shell::quote;
use crate::ssh::Session;

/// Suffix `ls -p` appends to directory names
pub const DIRECTORY_MARKER: char = '/';

/// One entry of a remote directory
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntry {
    /// Name without the directory marker
    pub name: String,
    /// Parent path joined with `name`
    pub full_path: String,
    pub is_directory: bool,
}

/// Build the listing command for `path`.
pub fn listing_command(path: &str, show_hidden: bool) -> String {
    let flags = if show_hidden { "-1pA" } else { "-1p" };
    let dir = if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    };
    format!("ls {} -- {}", flags, quote(&dir))
}

/// Parse raw `ls -1p` output listed under `parent`.
///
/// Blank lines are skipped, a trailing `\r` is dropped, any other whitespace
/// is part of the name. Output order is kept.
pub fn parse_listing(raw: &[u8], parent: &str) -> Vec<RemoteEntry> {
    let text = String::from_utf8_lossy(raw);
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let (name, is_directory) = match line.strip_suffix(DIRECTORY_MARKER) {
                Some(name) => (name, true),
                None => (line, false),
            };
            if name.is_empty() {
                return None;
            }
            Some(RemoteEntry {
                name: name.to_string(),
                full_path: join_remote_path(parent, name),
                is_directory,
            })
        })
        .collect()
}

/// Entries whose name contains `term`, case-insensitively. An empty term
/// keeps everything.
pub fn filter_entries<'a>(entries: &'a [RemoteEntry], term: &str) -> Vec<&'a RemoteEntry> {
    if term.is_empty() {
        return entries.iter().collect();
    }
    let needle = term.to_lowercase();
    entries
        .iter()
        .filter(|entry| entry.name.to_lowercase().contains(&needle))
        .collect()
}

/// List `path` on the remote host.
pub async fn list_directory(
    session: &Session,
    path: &str,
    show_hidden: bool,
) -> Result<Vec<RemoteEntry>, ListError> {
    if path.is_empty() {
        return Err(ListError::EmptyPath);
    }
    let result = session.execute(&listing_command(path, show_hidden)).await?;

    if !result.succeeded {
        let stderr = result.stderr_text().trim().to_string();
        warn!("Listing {} failed: exit={:?} {}", path, result.exit_status, stderr);
        return Err(ListError::CommandFailed {
            path: path.to_string(),
            status: result.exit_status,
            stderr,
        });
    }

    let entries = parse_listing(&result.stdout, path);
    debug!("Listed {} entries under {}", entries.len(), path);
    Ok(entries)
}
