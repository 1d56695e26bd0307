//! File transfer over exec channels
//!
//! Downloads run `base64 < path` and decode the output. Uploads stream the
//! encoded payload in chunks through `base64 -d` into a temporary file next
//! to the target, then `mv` it into place. A failed upload never leaves a
//! partially written target behind.
//!
//! Transfer commands run without the session's exec deadline; their run time
//! grows with the file size.

use std::path::Path;

use tracing::{debug, info, warn};

use super::codec::{self, DEFAULT_UPLOAD_CHUNK_SIZE};
use super::error::TransferError;
use super::path_utils::{join_remote_path, parent_remote_path};
use super::shell::quote;
use crate::ssh::{CommandResult, Session};

/// Command that prints the base64 form of `path`.
pub fn fetch_command(path: &str) -> String {
    format!("base64 < {}", quote(path))
}

/// Run a transfer command with no deadline.
async fn run_unbounded(session: &Session, command: &str) -> Result<CommandResult, TransferError> {
    Ok(session.execute_with_timeout(command, None).await?)
}

/// Download a remote file's bytes.
pub async fn fetch_file(session: &Session, path: &str) -> Result<Vec<u8>, TransferError> {
    let result = run_unbounded(session, &fetch_command(path)).await?;

    if !result.succeeded {
        return Err(TransferError::RemoteReadFailed {
            path: path.to_string(),
            reason: failure_reason(&result),
        });
    }

    let bytes = codec::decode(&result.stdout).map_err(|e| TransferError::RemoteReadFailed {
        path: path.to_string(),
        reason: format!("invalid base64 from remote: {}", e),
    })?;

    debug!("Fetched {} bytes from {}", bytes.len(), path);
    Ok(bytes)
}

/// Upload `bytes` to `path`, creating or replacing it.
pub async fn upload_file(
    session: &Session,
    bytes: &[u8],
    path: &str,
) -> Result<(), TransferError> {
    upload_file_chunked(session, bytes, path, DEFAULT_UPLOAD_CHUNK_SIZE).await
}

/// Upload with an explicit chunk size (in encoded characters).
pub async fn upload_file_chunked(
    session: &Session,
    bytes: &[u8],
    path: &str,
    chunk_size: usize,
) -> Result<(), TransferError> {
    let encoded = codec::encode(bytes);
    let chunks = codec::split_encoded(&encoded, chunk_size);
    let tmp_path = temp_path_for(path);

    info!(
        "Uploading {} bytes to {} in {} chunk(s)",
        bytes.len(),
        path,
        chunks.len()
    );

    let outcome = write_chunks(session, &chunks, &tmp_path, path).await;
    if outcome.is_err() {
        remove_quietly(session, &tmp_path).await;
    }
    outcome
}

async fn write_chunks(
    session: &Session,
    chunks: &[&str],
    tmp_path: &str,
    path: &str,
) -> Result<(), TransferError> {
    for (index, chunk) in chunks.iter().enumerate() {
        let redirect = if index == 0 { ">" } else { ">>" };
        let command = format!(
            "printf '%s' {} | base64 -d {} {}",
            quote(chunk),
            redirect,
            quote(tmp_path)
        );
        let result = run_unbounded(session, &command).await?;
        if !result.succeeded {
            return Err(TransferError::RemoteWriteFailed {
                path: path.to_string(),
                reason: failure_reason(&result),
            });
        }
        debug!("Wrote chunk {}/{} of {}", index + 1, chunks.len(), path);
    }

    let result =
        run_unbounded(session, &format!("mv -f -- {} {}", quote(tmp_path), quote(path))).await?;
    if !result.succeeded {
        return Err(TransferError::RemoteWriteFailed {
            path: path.to_string(),
            reason: failure_reason(&result),
        });
    }
    Ok(())
}

async fn remove_quietly(session: &Session, tmp_path: &str) {
    if let Err(e) = run_unbounded(session, &format!("rm -f -- {}", quote(tmp_path))).await {
        warn!("Failed to remove partial upload {}: {}", tmp_path, e);
    }
}

/// Read a local file and upload it to `path`.
pub async fn upload_local_file(
    session: &Session,
    local_path: &Path,
    path: &str,
    chunk_size: usize,
) -> Result<(), TransferError> {
    let bytes = tokio::fs::read(local_path)
        .await
        .map_err(|e| TransferError::LocalReadFailed {
            path: local_path.display().to_string(),
            reason: e.to_string(),
        })?;
    upload_file_chunked(session, &bytes, path, chunk_size).await
}

/// Rename or move a remote file.
pub async fn rename_file(
    session: &Session,
    old_path: &str,
    new_path: &str,
) -> Result<(), TransferError> {
    let result =
        run_unbounded(session, &format!("mv -- {} {}", quote(old_path), quote(new_path))).await?;

    if !result.succeeded {
        return Err(TransferError::RemoteWriteFailed {
            path: new_path.to_string(),
            reason: failure_reason(&result),
        });
    }
    info!("Renamed {} -> {}", old_path, new_path);
    Ok(())
}

/// Give `path` a new name within its directory. Returns the new full path.
pub async fn rename_in_place(
    session: &Session,
    path: &str,
    new_name: &str,
) -> Result<String, TransferError> {
    if new_name.is_empty() || new_name.contains('/') || new_name == "." || new_name == ".." {
        return Err(TransferError::InvalidName(new_name.to_string()));
    }
    let new_path = join_remote_path(&parent_remote_path(path), new_name);
    rename_file(session, path, &new_path).await?;
    Ok(new_path)
}

fn temp_path_for(path: &str) -> String {
    let tag = uuid::Uuid::new_v4().simple().to_string();
    format!("{}.execfs-{}.part", path, &tag[..8])
}

fn failure_reason(result: &CommandResult) -> String {
    let stderr = result.stderr_text();
    let stderr = stderr.trim();
    match (stderr.is_empty(), result.exit_status) {
        (false, _) => stderr.to_string(),
        (true, Some(status)) => format!("exit status {}", status),
        (true, None) => match &result.exit_signal {
            Some(signal) => format!("killed by signal {}", signal),
            None => "unknown failure".to_string(),
        },
    }
}
