//! Restore lifecycle: working-state setup and commit.
//!
//! A restore never mutates the live catalog while stages run. Before the
//! job starts the lifecycle takes the configuration lock, builds a
//! detached working catalog and a fresh working configuration and hangs
//! them off the execution. After the stages finish the outcome decides
//! the commit: a hard restore rewrites the data directory and swaps the
//! working state into the live one, a dry run replays the writes against
//! a disposable directory and discards it. The lock is released when the
//! guard drops, on every path.

use crate::execution::ExecutionAdapter;
use crate::facade::BackupFacade;
use crate::layout::{
    self, aux_folders, AuxFilter, DEFAULT_NAMESPACE_FILE, DEFAULT_WORKSPACE_FILE, GLOBAL_FILE,
    LAYER_FILE, LAYER_GROUPS_DIR, LOGGING_FILE, NAMESPACE_FILE, SERVICES_DIR, SETTINGS_FILE,
    STYLES_DIR, WORKSPACES_DIR, WORKSPACE_FILE,
};
use crate::stages::copy_aux_tree;
use crate::{BackupError, Result};
use carto_catalog::{Catalog, ConfigFacade, EntityCodec, LocalResourceStore, ResourceStore};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

/// Holds the configuration lock for the span of one restore.
pub struct RestoreGuard {
    _config_lock: OwnedMutexGuard<()>,
}

/// Drives the before/after hooks around a restore job.
pub struct RestoreLifecycle {
    facade: BackupFacade,
}

impl RestoreLifecycle {
    pub fn new(facade: BackupFacade) -> Self {
        Self { facade }
    }

    /// Takes the configuration lock and attaches the detached working
    /// catalog and configuration to the execution.
    pub async fn before_job(&self, execution: &Arc<ExecutionAdapter>) -> RestoreGuard {
        let lock = self.facade.config_lock().lock_owned().await;
        let working = self.facade.catalog().detached_copy();
        let working_config = Arc::new(ConfigFacade::new());
        execution.set_working_catalog(working);
        execution.set_working_config(working_config);
        debug!(execution = execution.id(), "working catalog attached");
        RestoreGuard { _config_lock: lock }
    }

    /// Commits or discards the working state and releases the lock.
    ///
    /// `job_ok` reflects the stage outcome; a best-effort run that only
    /// collected warnings counts as successful and commits.
    pub async fn after_job(
        &self,
        execution: &Arc<ExecutionAdapter>,
        guard: RestoreGuard,
        job_ok: bool,
    ) -> Result<()> {
        let result = if !job_ok {
            debug!(execution = execution.id(), "restore failed, working state discarded");
            Ok(())
        } else if execution.options().dry_run {
            self.soft_commit(execution).await
        } else {
            self.hard_commit(execution).await
        };
        execution.clear_working_state();
        drop(guard);
        result
    }

    /// Full commit: rewrite the data directory from the working state,
    /// then swap it into the live catalog and configuration.
    async fn hard_commit(&self, execution: &Arc<ExecutionAdapter>) -> Result<()> {
        let (working, working_config) = working_state(execution)?;
        let staging = self.staging_store(execution)?;

        // the catalog directories are replaced, not merged
        let live_store = self.facade.data_store();
        for dir in [WORKSPACES_DIR, STYLES_DIR, LAYER_GROUPS_DIR, SERVICES_DIR] {
            live_store.delete(dir).await?;
        }

        write_configuration(
            &self.facade,
            &working,
            &working_config,
            staging.as_ref(),
            self.facade.data_store().as_ref(),
        )
        .await?;

        let live = self.facade.catalog();
        live.resource_pool().dispose();
        live.dispose_entities();
        self.facade.config().reload_from(&working_config);
        live.replace_contents(&working);
        live.resource_pool().reset();

        for provider in self.facade.plugins() {
            if let Err(e) = provider.reload().await {
                warn!(plugin = provider.name(), %e, "plugin reload failed");
                execution.add_warning(format!("plugin {} reload: {e}", provider.name()));
            }
        }

        info!(execution = execution.id(), "restore committed");
        Ok(())
    }

    /// Dry run commit: replay every write against a disposable directory
    /// and throw it away. The live system is untouched.
    async fn soft_commit(&self, execution: &Arc<ExecutionAdapter>) -> Result<()> {
        let (working, working_config) = working_state(execution)?;
        let staging = self.staging_store(execution)?;

        let scratch = tempfile::tempdir()?;
        let target = LocalResourceStore::new(scratch.path());
        write_configuration(&self.facade, &working, &working_config, staging.as_ref(), &target)
            .await?;

        info!(execution = execution.id(), "dry run completed, target discarded");
        Ok(())
    }

    fn staging_store(&self, execution: &Arc<ExecutionAdapter>) -> Result<Arc<dyn ResourceStore>> {
        let input = execution
            .params()
            .input_path
            .clone()
            .ok_or_else(|| BackupError::Internal("restore execution has no input path".into()))?;
        Ok(Arc::new(LocalResourceStore::new(input)))
    }
}

fn working_state(
    execution: &Arc<ExecutionAdapter>,
) -> Result<(Arc<Catalog>, Arc<ConfigFacade>)> {
    let catalog = execution
        .working_catalog()
        .ok_or_else(|| BackupError::Internal("restore execution has no working catalog".into()))?;
    let config = execution
        .working_config()
        .ok_or_else(|| BackupError::Internal("restore execution has no working config".into()))?;
    Ok((catalog, config))
}

/// Writes the full configuration tree of `catalog`/`config` into
/// `target`, pulling style definitions, plugin files and auxiliary
/// folders from the extracted archive in `staging`.
async fn write_configuration(
    facade: &BackupFacade,
    catalog: &Catalog,
    config: &ConfigFacade,
    staging: &dyn ResourceStore,
    target: &dyn ResourceStore,
) -> Result<()> {
    let codec = EntityCodec::new();

    codec.write(target, "", GLOBAL_FILE, &config.global()).await?;
    if let Some(settings) = config.settings(None) {
        codec.write(target, "", SETTINGS_FILE, &settings).await?;
    }
    codec.write(target, "", LOGGING_FILE, &config.logging()).await?;

    for loader in facade.service_loaders().loaders() {
        if let Some(service) = config.service(None, loader.type_id()) {
            loader.save(&service, target, SERVICES_DIR).await?;
        }
    }

    for ws in catalog.workspaces() {
        let ws_dir = layout::workspace_dir(&ws.name);
        codec.write(target, &ws_dir, WORKSPACE_FILE, &ws).await?;
        if let Some(ns) = catalog.namespace(&ws.name) {
            codec.write(target, &ws_dir, NAMESPACE_FILE, &ns).await?;
        }
        if let Some(settings) = config.settings(Some(&ws.name)) {
            codec.write(target, &ws_dir, SETTINGS_FILE, &settings).await?;
        }
        let services_dir = layout::workspace_services_dir(&ws.name);
        for loader in facade.service_loaders().loaders() {
            if let Some(service) = config.service(Some(&ws.name), loader.type_id()) {
                loader.save(&service, target, &services_dir).await?;
            }
        }
    }
    if let Some(ws) = catalog.default_workspace() {
        codec.write(target, WORKSPACES_DIR, DEFAULT_WORKSPACE_FILE, &ws).await?;
    }
    if let Some(ns) = catalog.default_namespace() {
        codec.write(target, WORKSPACES_DIR, DEFAULT_NAMESPACE_FILE, &ns).await?;
    }

    for store in catalog.stores() {
        let store_dir = layout::store_dir(&store.workspace, store.kind, &store.name);
        codec.write(target, &store_dir, store.kind.file_name(), &store).await?;
        for resource in catalog.resources_by_store(&store.workspace, &store.name) {
            let res_dir =
                layout::resource_dir(&store.workspace, store.kind, &store.name, &resource.name);
            codec.write(target, &res_dir, resource.kind.file_name(), &resource).await?;
            for layer in catalog.layers_by_resource(&resource.workspace, &resource.name) {
                codec.write(target, &res_dir, LAYER_FILE, &layer).await?;
            }
        }
    }

    for style in catalog.styles() {
        let dir = layout::styles_dir(style.workspace.as_deref());
        codec.write(target, &dir, &format!("{}.json", style.name), &style).await?;
        let definition = format!("{dir}/{}", style.filename);
        if staging.exists(&definition).await {
            let data = staging.read(&definition).await?;
            target.write(&definition, data).await?;
        }
    }

    for group in catalog.layer_groups() {
        let dir = layout::layer_groups_dir(group.workspace.as_deref());
        codec.write(target, &dir, &format!("{}.json", group.name), &group).await?;
    }

    for provider in facade.plugins() {
        provider.save_configuration(staging, target).await?;
    }

    for (folder, _) in aux_folders() {
        if staging.is_dir(folder).await {
            copy_aux_tree(staging, target, folder, AuxFilter::Any).await?;
        }
    }

    Ok(())
}
