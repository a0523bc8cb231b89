//! Per-run execution record.

use crate::params::{JobParameters, RunOptions};
use carto_catalog::{Catalog, ConfigFacade};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// The two job kinds sharing the single-active-job gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionKind {
    Backup,
    Restore,
}

impl std::fmt::Display for ExecutionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionKind::Backup => write!(f, "backup"),
            ExecutionKind::Restore => write!(f, "restore"),
        }
    }
}

/// Execution status, observed by polling clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Registered, job task not yet running
    Starting,
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }
}

struct ExecutionState {
    status: ExecutionStatus,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    failures: Vec<String>,
    warnings: Vec<String>,
}

/// Mutable record of one backup or restore run.
///
/// Failure and warning lists are append-only. A restore owns exactly one
/// working catalog for its lifetime; it is attached by the restore
/// lifecycle and never visible to other executions.
pub struct ExecutionAdapter {
    id: u64,
    kind: ExecutionKind,
    /// Target (backup) or source (restore) archive location
    archive: PathBuf,
    overwrite: bool,
    params: JobParameters,
    declared_options: Vec<String>,
    state: RwLock<ExecutionState>,
    working_catalog: RwLock<Option<Arc<Catalog>>>,
    working_config: RwLock<Option<Arc<ConfigFacade>>>,
    total_steps: AtomicU32,
    completed_steps: AtomicU32,
}

impl std::fmt::Debug for ExecutionAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionAdapter")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("archive", &self.archive)
            .field("overwrite", &self.overwrite)
            .finish_non_exhaustive()
    }
}

impl ExecutionAdapter {
    pub fn new(
        id: u64,
        kind: ExecutionKind,
        archive: PathBuf,
        overwrite: bool,
        params: JobParameters,
    ) -> Self {
        let declared_options = params.options.declared();
        Self {
            id,
            kind,
            archive,
            overwrite,
            params,
            declared_options,
            state: RwLock::new(ExecutionState {
                status: ExecutionStatus::Starting,
                started_at: Utc::now(),
                ended_at: None,
                failures: Vec::new(),
                warnings: Vec::new(),
            }),
            working_catalog: RwLock::new(None),
            working_config: RwLock::new(None),
            total_steps: AtomicU32::new(0),
            completed_steps: AtomicU32::new(0),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> ExecutionKind {
        self.kind
    }

    pub fn archive(&self) -> &Path {
        &self.archive
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    pub fn params(&self) -> &JobParameters {
        &self.params
    }

    pub fn options(&self) -> RunOptions {
        self.params.options
    }

    /// The ordered `key=value` flags the execution was launched with.
    pub fn declared_options(&self) -> &[String] {
        &self.declared_options
    }

    pub fn status(&self) -> ExecutionStatus {
        self.state.read().status
    }

    pub fn set_status(&self, status: ExecutionStatus) {
        let mut state = self.state.write();
        state.status = status;
        if status.is_terminal() {
            state.ended_at = Some(Utc::now());
        }
    }

    pub fn is_running(&self) -> bool {
        !self.status().is_terminal()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.state.read().started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().ended_at
    }

    pub fn add_failure(&self, cause: impl Into<String>) {
        self.state.write().failures.push(cause.into());
    }

    pub fn add_warning(&self, cause: impl Into<String>) {
        self.state.write().warnings.push(cause.into());
    }

    pub fn failures(&self) -> Vec<String> {
        self.state.read().failures.clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.state.read().warnings.clone()
    }

    // ---- progress ----------------------------------------------------

    pub fn set_total_steps(&self, total: u32) {
        self.total_steps.store(total, Ordering::SeqCst);
    }

    pub fn complete_step(&self) {
        self.completed_steps.fetch_add(1, Ordering::SeqCst);
    }

    /// Completed and total step counts, for progress reporting.
    pub fn progress(&self) -> (u32, u32) {
        (
            self.completed_steps.load(Ordering::SeqCst),
            self.total_steps.load(Ordering::SeqCst),
        )
    }

    // ---- restore working state ---------------------------------------

    pub fn set_working_catalog(&self, catalog: Arc<Catalog>) {
        *self.working_catalog.write() = Some(catalog);
    }

    pub fn working_catalog(&self) -> Option<Arc<Catalog>> {
        self.working_catalog.read().clone()
    }

    pub fn set_working_config(&self, config: Arc<ConfigFacade>) {
        *self.working_config.write() = Some(config);
    }

    pub fn working_config(&self) -> Option<Arc<ConfigFacade>> {
        self.working_config.read().clone()
    }

    /// Discards the detached working catalog and configuration.
    pub fn clear_working_state(&self) {
        *self.working_catalog.write() = None;
        *self.working_config.write() = None;
    }
}
