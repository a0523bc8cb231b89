//! Auxiliary resource folders stage.
//!
//! A fixed set of data-directory folders travels with every archive
//! (demo pages, images, palettes, ...). Each folder has an inclusion
//! filter applied to its top-level files; subdirectories are carried
//! whole. On restore the stage only verifies the staged folders are
//! readable, the actual copy into the live data directory happens at
//! commit time under the configuration lock.

use crate::layout::{aux_folders, AuxFilter};
use crate::pipeline::{Stage, StageContext};
use crate::Result;
use async_trait::async_trait;
use carto_catalog::{any_resource, ResourceStore};
use tracing::debug;

pub struct AuxiliaryStage;

#[async_trait]
impl Stage for AuxiliaryStage {
    fn name(&self) -> &'static str {
        "auxiliary"
    }

    async fn run(&self, ctx: &StageContext) -> Result<()> {
        if ctx.is_restore() {
            self.verify(ctx).await
        } else {
            self.backup(ctx).await
        }
    }
}

impl AuxiliaryStage {
    async fn backup(&self, ctx: &StageContext) -> Result<()> {
        let live = ctx.facade.data_store();
        for (folder, filter) in aux_folders() {
            if !live.is_dir(folder).await {
                continue;
            }
            if let Err(e) =
                copy_aux_tree(live.as_ref(), ctx.staging.as_ref(), folder, *filter).await
            {
                ctx.handle_entity_error(&format!("auxiliary folder {folder}"), e)?;
            }
        }
        debug!(execution = ctx.execution.id(), "auxiliary folders staged");
        Ok(())
    }

    /// Walks every staged auxiliary folder and reads each file once, so a
    /// truncated or unreadable archive fails before commit.
    async fn verify(&self, ctx: &StageContext) -> Result<()> {
        let staging = ctx.staging.as_ref();
        for (folder, _) in aux_folders() {
            if !staging.is_dir(folder).await {
                continue;
            }
            let mut pending = vec![folder.to_string()];
            while let Some(dir) = pending.pop() {
                for entry in staging.list(&dir, &any_resource).await? {
                    if entry.is_dir {
                        pending.push(entry.path);
                    } else if let Err(e) = staging.read(&entry.path).await {
                        ctx.handle_entity_error(
                            &format!("auxiliary file {}", entry.path),
                            e.into(),
                        )?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Copies one auxiliary folder between stores. The filter applies to the
/// folder's direct files only; nested directories are copied whole.
pub(crate) async fn copy_aux_tree(
    src: &dyn ResourceStore,
    dst: &dyn ResourceStore,
    root: &str,
    filter: AuxFilter,
) -> Result<()> {
    let mut pending: Vec<(String, bool)> = vec![(root.to_string(), true)];
    while let Some((dir, top_level)) = pending.pop() {
        for entry in src.list(&dir, &any_resource).await? {
            if entry.is_dir {
                pending.push((entry.path, false));
            } else if !top_level || filter.accept(&entry.name) {
                let data = src.read(&entry.path).await?;
                dst.write(&entry.path, data).await?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use carto_catalog::LocalResourceStore;

    #[tokio::test]
    async fn test_top_level_filter_spares_nested_files() {
        let live = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let src = LocalResourceStore::new(live.path());
        let dst = LocalResourceStore::new(staging.path());

        src.write("logs/logging.properties", Bytes::from_static(b"a")).await.unwrap();
        src.write("logs/server.log", Bytes::from_static(b"b")).await.unwrap();
        src.write("logs/archive/old.log", Bytes::from_static(b"c")).await.unwrap();

        copy_aux_tree(&src, &dst, "logs", AuxFilter::PropertiesOnly).await.unwrap();

        assert!(dst.exists("logs/logging.properties").await);
        assert!(!dst.exists("logs/server.log").await);
        // nested directories are not subject to the top-level filter
        assert!(dst.exists("logs/archive/old.log").await);
    }
}
