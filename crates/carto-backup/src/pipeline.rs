//! Step pipeline contract.
//!
//! A job is an ordered sequence of stages, each walking one logical
//! section of the hierarchy. Whether a stage works against the live
//! catalog (backup) or the detached working catalog (restore) is decided
//! once per stage, at entry, by looking the execution up in the registry;
//! the selection holds for the stage's entire run.

use crate::execution::{ExecutionAdapter, ExecutionKind};
use crate::facade::BackupFacade;
use crate::stages::{AuxiliaryStage, CatalogStage, GlobalStage, PluginStage};
use crate::{BackupError, Result};
use async_trait::async_trait;
use carto_catalog::{Catalog, ConfigFacade, EntityCodec, ResourceStore};
use std::sync::Arc;
use tracing::{error, warn};

/// One ordered unit of the pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &StageContext) -> Result<()>;
}

/// The ordered stage sequence shared by backup and restore jobs.
pub fn stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(GlobalStage),
        Box::new(CatalogStage),
        Box::new(AuxiliaryStage),
        Box::new(PluginStage),
    ]
}

/// Everything one stage run needs, resolved once at stage entry.
pub struct StageContext {
    pub facade: BackupFacade,
    pub execution: Arc<ExecutionAdapter>,
    /// Live catalog for backups, working catalog for restores
    pub catalog: Arc<Catalog>,
    /// Live configuration for backups, working configuration for restores
    pub config: Arc<ConfigFacade>,
    /// Store rooted at the staging directory (output or input)
    pub staging: Arc<dyn ResourceStore>,
    pub codec: EntityCodec,
}

impl StageContext {
    /// Resolves the context for the execution registered under
    /// `execution_id`. Restores must already carry a working catalog.
    pub fn resolve(
        facade: &BackupFacade,
        execution_id: u64,
        staging: Arc<dyn ResourceStore>,
    ) -> Result<Self> {
        let execution = facade
            .registry()
            .get(execution_id)
            .ok_or_else(|| BackupError::Internal(format!("execution {execution_id} not registered")))?;

        let (catalog, config, codec) = match execution.kind() {
            ExecutionKind::Restore => {
                let catalog = execution.working_catalog().ok_or_else(|| {
                    BackupError::Internal("restore execution has no working catalog".to_string())
                })?;
                let config = execution.working_config().ok_or_else(|| {
                    BackupError::Internal("restore execution has no working config".to_string())
                })?;
                (catalog, config, EntityCodec::new())
            }
            ExecutionKind::Backup => (
                facade.catalog(),
                facade.config(),
                // ids are stripped on backup output for determinism
                EntityCodec::new().with_exclude_ids(true),
            ),
        };

        Ok(Self { facade: facade.clone(), execution, catalog, config, staging, codec })
    }

    pub fn kind(&self) -> ExecutionKind {
        self.execution.kind()
    }

    pub fn is_restore(&self) -> bool {
        self.kind() == ExecutionKind::Restore
    }

    pub fn best_effort(&self) -> bool {
        self.execution.options().best_effort
    }

    pub fn dry_run(&self) -> bool {
        self.execution.options().dry_run
    }

    /// Uniform per-entity error handling: best-effort downgrades the
    /// error to a warning and lets the stage continue, otherwise the
    /// error aborts the stage and is recorded as a failure by the job
    /// runner.
    pub fn handle_entity_error(&self, what: &str, err: BackupError) -> Result<()> {
        if self.best_effort() {
            warn!(execution = self.execution.id(), %what, %err, "entity error downgraded");
            self.execution.add_warning(format!("{what}: {err}"));
            Ok(())
        } else {
            error!(execution = self.execution.id(), %what, %err, "entity error");
            Err(BackupError::Stage(format!("{what}: {err}")))
        }
    }
}
