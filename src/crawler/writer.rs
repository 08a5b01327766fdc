//! Output file handling
//!
//! Bodies are written to a uniquely named temporary file next to the
//! destination and persisted over it with a rename, so a reader of the
//! destination path only ever sees a complete body. Two writers targeting
//! the same destination never share a temporary file.

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::Builder;

/// Suffix carried by in-progress temporary files
pub const PARTIAL_SUFFIX: &str = ".part";

/// Creates `path` and its parents; succeeds if it already exists
pub async fn ensure_output_dir(path: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(path).await
}

/// Atomically replaces `destination` with `body`
///
/// The write runs to completion on the blocking pool even if the returned
/// future is dropped: the file is either persisted or its temporary is
/// removed, never left behind.
pub async fn write_atomic(destination: &Path, body: &[u8]) -> std::io::Result<()> {
    let destination = destination.to_path_buf();
    let body = body.to_vec();

    tokio::task::spawn_blocking(move || persist_body(&destination, &body))
        .await
        .map_err(std::io::Error::other)?
}

fn persist_body(destination: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut file = Builder::new()
        .prefix(&temp_prefix(destination))
        .suffix(PARTIAL_SUFFIX)
        .tempfile_in(parent_dir(destination))?;

    file.write_all(body)?;
    file.as_file().sync_all()?;

    // On failure the temporary is dropped with the error and deleted
    file.persist(destination).map_err(|e| e.error)?;
    Ok(())
}

/// `.<file name>.` so temporaries sort next to their destination
fn temp_prefix(destination: &Path) -> String {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!(".{}.", name)
}

/// Temporaries live beside the destination so the rename stays on one filesystem
fn parent_dir(destination: &Path) -> PathBuf {
    match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Returns true for a temporary left by `write_atomic`
pub fn is_partial_file(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().ends_with(PARTIAL_SUFFIX))
        .unwrap_or(false)
}
