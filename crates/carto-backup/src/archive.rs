//! Archive location handling.
//!
//! The portable archive is a plain directory tree; compression and
//! packaging live outside the core. This module validates target
//! locations, moves trees between staging and archive locations, and
//! reads/writes the archive manifest.

use crate::{BackupError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Manifest written at the archive root.
pub const MANIFEST_FILE: &str = "backup.json";

/// Describes a completed backup archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Engine version that produced the archive
    pub version: String,
    /// Job launch timestamp
    pub timestamp: DateTime<Utc>,
    /// Option flags the backup ran with
    pub options: Vec<String>,
}

impl Manifest {
    pub fn new(timestamp: DateTime<Utc>, options: Vec<String>) -> Self {
        Self { version: env!("CARGO_PKG_VERSION").to_string(), timestamp, options }
    }
}

pub async fn write_manifest(dir: &Path, manifest: &Manifest) -> Result<()> {
    let data = serde_json::to_vec_pretty(manifest)?;
    tokio::fs::write(dir.join(MANIFEST_FILE), data).await?;
    Ok(())
}

pub async fn read_manifest(dir: &Path) -> Result<Manifest> {
    let data = tokio::fs::read(dir.join(MANIFEST_FILE))
        .await
        .map_err(|e| BackupError::NotFound(format!("{}: {e}", dir.display())))?;
    Ok(serde_json::from_slice(&data)?)
}

/// Validates and initializes the backup target location.
///
/// The target must not exist, or may exist non-empty only with
/// `overwrite` set, in which case prior content is removed. The parent
/// directory is created when missing; failure to do so is the
/// unreachable-path condition.
pub async fn prepare_target(target: &Path, overwrite: bool) -> Result<()> {
    match tokio::fs::metadata(target).await {
        Ok(meta) => {
            let occupied = if meta.is_dir() {
                let mut entries = tokio::fs::read_dir(target).await?;
                entries.next_entry().await?.is_some()
            } else {
                true
            };
            if occupied && !overwrite {
                return Err(BackupError::ArchiveAlreadyExists(target.display().to_string()));
            }
            if occupied {
                if meta.is_dir() {
                    tokio::fs::remove_dir_all(target).await?;
                } else {
                    tokio::fs::remove_file(target).await?;
                }
                tokio::fs::create_dir_all(target).await?;
            }
        }
        Err(_) => {
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    BackupError::UnreachablePath(format!("{}: {e}", parent.display()))
                })?;
            }
            // empty placeholder marking the location as claimed
            tokio::fs::create_dir_all(target)
                .await
                .map_err(|e| BackupError::UnreachablePath(format!("{}: {e}", target.display())))?;
        }
    }
    Ok(())
}

/// Extracts an archive into a private staging directory.
pub async fn extract_to(archive: &Path, staging: &Path) -> Result<()> {
    if !tokio::fs::try_exists(archive).await.unwrap_or(false) {
        return Err(BackupError::NotFound(archive.display().to_string()));
    }
    copy_tree(archive, staging).await
}

/// Publishes the staged flat files into the archive target.
pub async fn publish(staging: &Path, target: &Path) -> Result<()> {
    copy_tree(staging, target).await
}

/// Recursively copies a directory tree. Iterative, to keep the future
/// small and avoid async recursion.
pub async fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    let mut pending: Vec<(PathBuf, PathBuf)> = vec![(src.to_path_buf(), dst.to_path_buf())];
    while let Some((from, to)) = pending.pop() {
        tokio::fs::create_dir_all(&to).await?;
        let mut entries = tokio::fs::read_dir(&from).await?;
        while let Some(entry) = entries.next_entry().await? {
            let from_child = entry.path();
            let to_child = to.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                pending.push((from_child, to_child));
            } else {
                tokio::fs::copy(&from_child, &to_child).await?;
            }
        }
    }
    Ok(())
}
