//! Backup and restore orchestration for the Carto configuration catalog.
//!
//! This crate provides:
//! - A single-active-job gate shared by backups and restores
//! - The orchestrator facade launching asynchronous jobs
//! - An execution registry tracking every run by id
//! - The sequential step pipeline walking the catalog hierarchy
//! - The restore lifecycle, with hard (in place) and dry-run modes

pub mod archive;
pub mod execution;
pub mod facade;
pub mod gate;
mod job;
pub mod layout;
pub mod lifecycle;
pub mod params;
pub mod pipeline;
pub mod registry;
pub mod stages;

pub use archive::Manifest;
pub use execution::{ExecutionAdapter, ExecutionKind, ExecutionStatus};
pub use facade::{BackupFacade, BackupFacadeBuilder, FacadeConfig};
pub use gate::{JobGate, JobPermit};
pub use params::{JobParameters, OptionFlag, RunOptions};
pub use pipeline::{Stage, StageContext};
pub use registry::ExecutionRegistry;

use carto_catalog::CatalogError;
use thiserror::Error;

/// Backup/restore error types.
#[derive(Error, Debug)]
pub enum BackupError {
    /// The target archive location exists and holds prior content
    #[error("target archive already exists, use overwrite to replace it: {0}")]
    ArchiveAlreadyExists(String),

    /// The parent path of the target archive cannot be created
    #[error("path to target archive is unreachable: {0}")]
    UnreachablePath(String),

    /// Another backup or restore execution is currently running
    #[error("concurrent execution in progress: a backup or restore job is already running")]
    ConcurrentExecution,

    /// An option flag outside the recognized set
    #[error("unrecognized option: {0}")]
    InvalidOption(String),

    /// Entity-level error raised inside a pipeline stage
    #[error("stage error: {0}")]
    Stage(String),

    /// Error during the restore lock/commit sequence
    #[error("lifecycle error: {0}")]
    Lifecycle(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, BackupError>;

impl From<std::io::Error> for BackupError {
    fn from(e: std::io::Error) -> Self {
        BackupError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for BackupError {
    fn from(e: serde_json::Error) -> Self {
        BackupError::Serialization(e.to_string())
    }
}

impl From<CatalogError> for BackupError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::NotFound(m) => BackupError::NotFound(m),
            CatalogError::Serialization(m) => BackupError::Serialization(m),
            other => BackupError::Storage(other.to_string()),
        }
    }
}
