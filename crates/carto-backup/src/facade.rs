//! The backup/restore facade.
//!
//! Single entry point of the subsystem. The facade owns the execution
//! registry, the admission gate and the configuration lock, and exposes
//! the two asynchronous launch operations. It is a cheap clonable handle;
//! every clone shares the same state.

use crate::archive;
use crate::execution::{ExecutionAdapter, ExecutionKind};
use crate::gate::JobGate;
use crate::job;
use crate::params::{JobParameters, RunOptions};
use crate::registry::ExecutionRegistry;
use crate::Result;
use carto_catalog::{
    Catalog, ConfigFacade, PluginConfigProvider, ResourceStore, ServiceLoader,
    ServiceLoaderRegistry,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

/// Tunables of the facade.
#[derive(Debug, Clone)]
pub struct FacadeConfig {
    /// How long a launch waits for a running job to finish before it
    /// gives up with a concurrency error.
    pub admission_wait: Duration,
}

impl Default for FacadeConfig {
    fn default() -> Self {
        Self { admission_wait: Duration::from_secs(300) }
    }
}

struct FacadeInner {
    catalog: Arc<Catalog>,
    config: Arc<ConfigFacade>,
    data_store: Arc<dyn ResourceStore>,
    service_loaders: ServiceLoaderRegistry,
    plugins: Vec<Arc<dyn PluginConfigProvider>>,
    registry: ExecutionRegistry,
    gate: Arc<JobGate>,
    config_lock: Arc<Mutex<()>>,
    settings: FacadeConfig,
}

/// Handle to the backup/restore engine. Clones share all state.
#[derive(Clone)]
pub struct BackupFacade {
    inner: Arc<FacadeInner>,
}

/// Assembles a [`BackupFacade`] from its collaborators.
pub struct BackupFacadeBuilder {
    catalog: Arc<Catalog>,
    config: Arc<ConfigFacade>,
    data_store: Arc<dyn ResourceStore>,
    service_loaders: ServiceLoaderRegistry,
    plugins: Vec<Arc<dyn PluginConfigProvider>>,
    settings: FacadeConfig,
}

impl BackupFacadeBuilder {
    pub fn new(
        catalog: Arc<Catalog>,
        config: Arc<ConfigFacade>,
        data_store: Arc<dyn ResourceStore>,
    ) -> Self {
        Self {
            catalog,
            config,
            data_store,
            service_loaders: ServiceLoaderRegistry::with_defaults(),
            plugins: Vec::new(),
            settings: FacadeConfig::default(),
        }
    }

    pub fn admission_wait(mut self, wait: Duration) -> Self {
        self.settings.admission_wait = wait;
        self
    }

    /// Registers an additional service loader next to the built-in ones.
    pub fn service_loader(mut self, loader: Arc<dyn ServiceLoader>) -> Self {
        self.service_loaders.register(loader);
        self
    }

    pub fn plugin(mut self, provider: Arc<dyn PluginConfigProvider>) -> Self {
        self.plugins.push(provider);
        self
    }

    pub fn build(self) -> BackupFacade {
        BackupFacade {
            inner: Arc::new(FacadeInner {
                catalog: self.catalog,
                config: self.config,
                data_store: self.data_store,
                service_loaders: self.service_loaders,
                plugins: self.plugins,
                registry: ExecutionRegistry::new(),
                gate: Arc::new(JobGate::new()),
                config_lock: Arc::new(Mutex::new(())),
                settings: self.settings,
            }),
        }
    }
}

impl BackupFacade {
    pub fn catalog(&self) -> Arc<Catalog> {
        Arc::clone(&self.inner.catalog)
    }

    pub fn config(&self) -> Arc<ConfigFacade> {
        Arc::clone(&self.inner.config)
    }

    pub fn data_store(&self) -> Arc<dyn ResourceStore> {
        Arc::clone(&self.inner.data_store)
    }

    pub fn service_loaders(&self) -> &ServiceLoaderRegistry {
        &self.inner.service_loaders
    }

    pub fn plugins(&self) -> &[Arc<dyn PluginConfigProvider>] {
        &self.inner.plugins
    }

    pub fn registry(&self) -> &ExecutionRegistry {
        &self.inner.registry
    }

    /// Kind of the currently running job, if any.
    pub fn running(&self) -> Option<ExecutionKind> {
        self.inner.gate.current()
    }

    pub(crate) fn config_lock(&self) -> Arc<Mutex<()>> {
        Arc::clone(&self.inner.config_lock)
    }

    /// Launches a backup of the live catalog into `target`.
    ///
    /// The target is validated and claimed before admission, the stages
    /// run on a spawned task. The returned execution is registered and
    /// can be polled for progress and outcome.
    pub async fn run_backup_async(
        &self,
        target: &Path,
        overwrite: bool,
        flags: &[String],
    ) -> Result<Arc<ExecutionAdapter>> {
        let options = RunOptions::parse(flags)?;
        // a dry run never publishes, so the target is left untouched
        if !options.dry_run {
            archive::prepare_target(target, overwrite).await?;
        }

        let staging = tempfile::tempdir()?;
        let params = JobParameters::backup(staging.path().to_path_buf(), options);

        let permit = self
            .inner
            .gate
            .clone()
            .admit(ExecutionKind::Backup, self.inner.settings.admission_wait)
            .await?;

        let id = self.inner.registry.allocate_id();
        let execution = Arc::new(ExecutionAdapter::new(
            id,
            ExecutionKind::Backup,
            target.to_path_buf(),
            overwrite,
            params,
        ));
        self.inner.registry.register(Arc::clone(&execution));
        info!(execution = id, target = %target.display(), "backup launched");

        tokio::spawn(job::run_backup_job(self.clone(), Arc::clone(&execution), permit, staging));
        Ok(execution)
    }

    /// Launches a restore from the archive at `source`.
    ///
    /// The archive is extracted into a private staging directory before
    /// admission; the stages rebuild a detached working catalog and the
    /// commit swaps it into the live one (or discards it on a dry run).
    pub async fn run_restore_async(
        &self,
        source: &Path,
        flags: &[String],
    ) -> Result<Arc<ExecutionAdapter>> {
        let options = RunOptions::parse(flags)?;

        let staging = tempfile::tempdir()?;
        archive::extract_to(source, staging.path()).await?;
        let params = JobParameters::restore(staging.path().to_path_buf(), options);

        let permit = self
            .inner
            .gate
            .clone()
            .admit(ExecutionKind::Restore, self.inner.settings.admission_wait)
            .await?;

        let id = self.inner.registry.allocate_id();
        let execution = Arc::new(ExecutionAdapter::new(
            id,
            ExecutionKind::Restore,
            source.to_path_buf(),
            false,
            params,
        ));
        self.inner.registry.register(Arc::clone(&execution));
        info!(execution = id, source = %source.display(), "restore launched");

        tokio::spawn(job::run_restore_job(self.clone(), Arc::clone(&execution), permit, staging));
        Ok(execution)
    }
}
