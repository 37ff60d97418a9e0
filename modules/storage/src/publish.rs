// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use serde::Serialize;
use std::{
    io,
    path::{Path, PathBuf},
};
use tokio::{fs, io::AsyncWriteExt};
use tracing::trace;

/// Serializes `value` as JSON and atomically replaces the file at `path` with it.
///
/// Readers see either the previous or the new document, never a partial one.
pub async fn publish_json<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let bytes = serde_json::to_vec(value)?;
    write_atomic(path, &bytes).await
}

/// Writes `bytes` to a sibling temporary file, syncs it and renames it onto `path`.
///
/// Missing parent directories are created. On failure the temporary file is removed
/// and the previous content of `path` stays untouched.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).await?;
    }
    let tmp_path = temporary_path(path);
    if let Err(e) = write_synced(&tmp_path, bytes).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(e);
    }
    fs::rename(&tmp_path, path).await?;
    trace!("Published {}", path.display());
    Ok(())
}

async fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
