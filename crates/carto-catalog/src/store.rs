//! Hierarchical resource store abstraction.
//!
//! Paths are relative, `/`-separated and addressed against a store root,
//! mirroring the catalog hierarchy (`workspaces/<ws>/...`).

use crate::{CatalogError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};

/// A single entry returned by a directory listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEntry {
    /// Entry name without the leading directories
    pub name: String,
    /// Path relative to the store root
    pub path: String,
    pub is_dir: bool,
}

/// Predicate applied to directory listings.
pub type ResourceFilter<'a> = &'a (dyn Fn(&ResourceEntry) -> bool + Send + Sync);

/// Hierarchical file namespace consumed by the backup/restore core.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Read the full contents of a resource.
    async fn read(&self, path: &str) -> Result<Bytes>;

    /// Write a resource, creating parent directories as needed.
    async fn write(&self, path: &str, data: Bytes) -> Result<()>;

    async fn exists(&self, path: &str) -> bool;

    async fn is_dir(&self, path: &str) -> bool;

    /// Delete a resource or a directory tree.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Copy a single resource inside this store.
    async fn copy(&self, src: &str, dst: &str) -> Result<()>;

    /// List the direct children of a directory that pass `filter`.
    ///
    /// Listing a missing directory yields an empty vector.
    async fn list(&self, dir: &str, filter: ResourceFilter<'_>) -> Result<Vec<ResourceEntry>>;

    async fn create_dir(&self, path: &str) -> Result<()>;
}

/// Filter accepting every entry.
pub fn any_resource(_: &ResourceEntry) -> bool {
    true
}

/// Local filesystem implementation rooted at a base directory.
pub struct LocalResourceStore {
    base: PathBuf,
}

impl LocalResourceStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Resolves a relative path against the base, rejecting traversal.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let rel = Path::new(path);
        for component in rel.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(CatalogError::InvalidPath(path.to_string())),
            }
        }
        Ok(self.base.join(rel))
    }
}

#[async_trait]
impl ResourceStore for LocalResourceStore {
    async fn read(&self, path: &str) -> Result<Bytes> {
        let full = self.resolve(path)?;
        let data = tokio::fs::read(&full)
            .await
            .map_err(|e| CatalogError::NotFound(format!("{path}: {e}")))?;
        Ok(Bytes::from(data))
    }

    async fn write(&self, path: &str, data: Bytes) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, &data).await?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> bool {
        match self.resolve(path) {
            Ok(full) => tokio::fs::try_exists(&full).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn is_dir(&self, path: &str) -> bool {
        match self.resolve(path) {
            Ok(full) => tokio::fs::metadata(&full).await.map(|m| m.is_dir()).unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        let meta = match tokio::fs::metadata(&full).await {
            Ok(meta) => meta,
            Err(_) => return Ok(()),
        };
        if meta.is_dir() {
            tokio::fs::remove_dir_all(&full).await?;
        } else {
            tokio::fs::remove_file(&full).await?;
        }
        Ok(())
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<()> {
        let from = self.resolve(src)?;
        let to = self.resolve(dst)?;
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&from, &to).await?;
        Ok(())
    }

    async fn list(&self, dir: &str, filter: ResourceFilter<'_>) -> Result<Vec<ResourceEntry>> {
        let full = self.resolve(dir)?;
        let mut read_dir = match tokio::fs::read_dir(&full).await {
            Ok(rd) => rd,
            Err(_) => return Ok(Vec::new()),
        };
        let mut entries = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = if dir.is_empty() { name.clone() } else { format!("{dir}/{name}") };
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            let item = ResourceEntry { name, path, is_dir };
            if filter(&item) {
                entries.push(item);
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn create_dir(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        tokio::fs::create_dir_all(&full).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_read_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalResourceStore::new(tmp.path());

        store
            .write("workspaces/topo/workspace.json", Bytes::from_static(b"{}"))
            .await
            .unwrap();
        assert!(store.exists("workspaces/topo/workspace.json").await);
        assert!(store.is_dir("workspaces/topo").await);
        let data = store.read("workspaces/topo/workspace.json").await.unwrap();
        assert_eq!(&data[..], b"{}");
    }

    #[tokio::test]
    async fn test_list_applies_filter() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalResourceStore::new(tmp.path());
        store.write("logs/server.properties", Bytes::from_static(b"a")).await.unwrap();
        store.write("logs/server.log", Bytes::from_static(b"b")).await.unwrap();

        let props = store
            .list("logs", &|e: &ResourceEntry| e.name.ends_with(".properties"))
            .await
            .unwrap();
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].path, "logs/server.properties");
    }

    #[tokio::test]
    async fn test_list_missing_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalResourceStore::new(tmp.path());
        assert!(store.list("nope", &any_resource).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalResourceStore::new(tmp.path());
        let err = store.read("../outside.json").await.unwrap_err();
        assert!(matches!(err, CatalogError::InvalidPath(_)));
    }
}
