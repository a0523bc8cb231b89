//! Job parameters and recognized option flags.

use crate::{BackupError, Result};
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Parameter key for the flat-file staging output of a backup.
pub const PARAM_OUTPUT_PATH: &str = "output.file.path";
/// Parameter key for the extracted archive input of a restore.
pub const PARAM_INPUT_PATH: &str = "input.file.path";
/// Parameter key for the job launch timestamp.
pub const PARAM_TIME: &str = "time";
/// Flag key enabling a dry run.
pub const PARAM_DRY_RUN: &str = "dry-run";
/// Flag key enabling best-effort error handling.
pub const PARAM_BEST_EFFORT: &str = "best-effort";

/// The fixed enumerated set of recognized option flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionFlag {
    /// Perform a full restore against a disposable target
    DryRun,
    /// Downgrade per-entity errors to warnings instead of aborting
    BestEffort,
}

impl OptionFlag {
    pub fn key(&self) -> &'static str {
        match self {
            OptionFlag::DryRun => PARAM_DRY_RUN,
            OptionFlag::BestEffort => PARAM_BEST_EFFORT,
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            PARAM_DRY_RUN => Some(OptionFlag::DryRun),
            PARAM_BEST_EFFORT => Some(OptionFlag::BestEffort),
            _ => None,
        }
    }
}

/// Options bag derived once per execution from the launch parameters and
/// immutable afterward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub dry_run: bool,
    pub best_effort: bool,
}

impl RunOptions {
    /// Parses `key` or `key=value` flag strings. Unknown keys and
    /// malformed values are rejected.
    pub fn parse(flags: &[String]) -> Result<Self> {
        let mut options = RunOptions::default();
        for flag in flags {
            let (key, value) = match flag.split_once('=') {
                Some((k, v)) => (k.trim(), v.trim()),
                None => (flag.trim(), "true"),
            };
            let enabled = match value {
                "true" | "TRUE" => true,
                "false" | "FALSE" => false,
                _ => return Err(BackupError::InvalidOption(flag.clone())),
            };
            match OptionFlag::from_key(key) {
                Some(OptionFlag::DryRun) => options.dry_run = enabled,
                Some(OptionFlag::BestEffort) => options.best_effort = enabled,
                None => return Err(BackupError::InvalidOption(flag.clone())),
            }
        }
        Ok(options)
    }

    /// The ordered `key=value` form recorded on the execution.
    pub fn declared(&self) -> Vec<String> {
        vec![
            format!("{}={}", OptionFlag::DryRun.key(), self.dry_run),
            format!("{}={}", OptionFlag::BestEffort.key(), self.best_effort),
        ]
    }
}

/// Parameters a job is launched with.
#[derive(Debug, Clone)]
pub struct JobParameters {
    /// Staging directory a backup writes flat files into
    pub output_path: Option<PathBuf>,
    /// Staging directory a restore reads the extracted archive from
    pub input_path: Option<PathBuf>,
    /// Launch timestamp
    pub time: DateTime<Utc>,
    pub options: RunOptions,
}

impl JobParameters {
    pub fn backup(output_path: PathBuf, options: RunOptions) -> Self {
        Self { output_path: Some(output_path), input_path: None, time: Utc::now(), options }
    }

    pub fn restore(input_path: PathBuf, options: RunOptions) -> Self {
        Self { output_path: None, input_path: Some(input_path), time: Utc::now(), options }
    }
}
