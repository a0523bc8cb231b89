//! Job runners spawned by the facade.
//!
//! Each runner owns the admission permit and the staging directory for
//! the whole run; both are released when the runner returns, whatever
//! the outcome.

use crate::archive::{self, Manifest};
use crate::execution::{ExecutionAdapter, ExecutionStatus};
use crate::facade::BackupFacade;
use crate::gate::JobPermit;
use crate::lifecycle::RestoreLifecycle;
use crate::pipeline::{self, StageContext};
use crate::Result;
use carto_catalog::{LocalResourceStore, ResourceStore};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, error, info};

/// Runs every pipeline stage in order against the execution.
async fn run_stages(
    facade: &BackupFacade,
    execution: &Arc<ExecutionAdapter>,
    staging: Arc<dyn ResourceStore>,
) -> Result<()> {
    let stages = pipeline::stages();
    execution.set_total_steps(stages.len() as u32);
    for stage in &stages {
        let ctx = StageContext::resolve(facade, execution.id(), Arc::clone(&staging))?;
        debug!(execution = execution.id(), stage = stage.name(), "stage starting");
        if let Err(e) = stage.run(&ctx).await {
            execution.add_failure(format!("{}: {e}", stage.name()));
            return Err(e);
        }
        execution.complete_step();
    }
    Ok(())
}

pub(crate) async fn run_backup_job(
    facade: BackupFacade,
    execution: Arc<ExecutionAdapter>,
    permit: JobPermit,
    staging: TempDir,
) {
    execution.set_status(ExecutionStatus::Running);
    let staging_store: Arc<dyn ResourceStore> =
        Arc::new(LocalResourceStore::new(staging.path()));

    let result = async {
        run_stages(&facade, &execution, staging_store).await?;
        let manifest =
            Manifest::new(execution.params().time, execution.declared_options().to_vec());
        archive::write_manifest(staging.path(), &manifest).await?;
        if execution.options().dry_run {
            debug!(execution = execution.id(), "dry run, archive not published");
        } else {
            archive::publish(staging.path(), execution.archive()).await?;
        }
        Ok::<(), crate::BackupError>(())
    }
    .await;

    match result {
        Ok(()) => {
            info!(execution = execution.id(), archive = %execution.archive().display(), "backup completed");
            execution.set_status(ExecutionStatus::Completed);
        }
        Err(e) => {
            error!(execution = execution.id(), %e, "backup failed");
            if execution.failures().is_empty() {
                execution.add_failure(e.to_string());
            }
            execution.set_status(ExecutionStatus::Failed);
        }
    }
    drop(permit);
}

pub(crate) async fn run_restore_job(
    facade: BackupFacade,
    execution: Arc<ExecutionAdapter>,
    permit: JobPermit,
    staging: TempDir,
) {
    let lifecycle = RestoreLifecycle::new(facade.clone());
    let guard = lifecycle.before_job(&execution).await;
    execution.set_status(ExecutionStatus::Running);
    let staging_store: Arc<dyn ResourceStore> =
        Arc::new(LocalResourceStore::new(staging.path()));

    let stage_result = run_stages(&facade, &execution, staging_store).await;
    let job_ok = stage_result.is_ok();

    match lifecycle.after_job(&execution, guard, job_ok).await {
        Ok(()) if job_ok => {
            info!(execution = execution.id(), "restore completed");
            execution.set_status(ExecutionStatus::Completed);
        }
        Ok(()) => {
            error!(execution = execution.id(), "restore failed, live state untouched");
            execution.set_status(ExecutionStatus::Failed);
        }
        Err(e) => {
            error!(execution = execution.id(), %e, "restore commit failed");
            execution.add_failure(format!("restore commit: {e}"));
            execution.set_status(ExecutionStatus::Failed);
        }
    }
    drop(permit);
    drop(staging);
}
