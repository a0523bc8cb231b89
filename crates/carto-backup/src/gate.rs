//! Single-active-job admission gate.
//!
//! The central correctness guarantee of the subsystem: at most one backup
//! or restore is active at any instant. Admission and the transition to
//! the running state happen under one mutex, so two launches can never
//! both observe an idle gate. Waiters park on a completion signal instead
//! of polling, re-checking on a fixed interval until a caller supplied
//! ceiling elapses.

use crate::execution::ExecutionKind;
use crate::{BackupError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Fixed re-check interval while waiting for the gate to clear.
pub const DEFAULT_RECHECK: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Idle,
    Running(ExecutionKind),
}

/// Admission control shared by both job kinds.
pub struct JobGate {
    state: Mutex<GateState>,
    completed: Notify,
}

impl Default for JobGate {
    fn default() -> Self {
        Self::new()
    }
}

impl JobGate {
    pub fn new() -> Self {
        Self { state: Mutex::new(GateState::Idle), completed: Notify::new() }
    }

    /// Kind of the currently admitted job, if any.
    pub fn current(&self) -> Option<ExecutionKind> {
        match *self.state.lock() {
            GateState::Idle => None,
            GateState::Running(kind) => Some(kind),
        }
    }

    fn try_acquire(self: &Arc<Self>, kind: ExecutionKind) -> Option<JobPermit> {
        let mut state = self.state.lock();
        if *state == GateState::Idle {
            *state = GateState::Running(kind);
            debug!(%kind, "job gate acquired");
            Some(JobPermit { gate: Arc::clone(self) })
        } else {
            None
        }
    }

    /// Admits a job of `kind`, waiting up to `ceiling` for the gate to
    /// clear. A zero ceiling fails immediately when another job is
    /// running.
    pub async fn admit(self: Arc<Self>, kind: ExecutionKind, ceiling: Duration) -> Result<JobPermit> {
        let deadline = Instant::now() + ceiling;
        loop {
            if let Some(permit) = self.try_acquire(kind) {
                return Ok(permit);
            }
            let now = Instant::now();
            if now >= deadline {
                warn!(%kind, "admission ceiling reached with a job still running");
                return Err(BackupError::ConcurrentExecution);
            }
            // Enroll in the waiter list before the second state check so
            // a release between the check and the await cannot be missed.
            // `notified()` alone only enrolls on first poll; `enable` does
            // it eagerly.
            let completed = self.completed.notified();
            tokio::pin!(completed);
            completed.as_mut().enable();
            if let Some(permit) = self.try_acquire(kind) {
                return Ok(permit);
            }
            let wait = DEFAULT_RECHECK.min(deadline - now);
            let _ = tokio::time::timeout(wait, completed).await;
        }
    }
}

/// Exclusive right to run a job; releasing it wakes waiting launches.
pub struct JobPermit {
    gate: Arc<JobGate>,
}

impl std::fmt::Debug for JobPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobPermit").finish_non_exhaustive()
    }
}

impl Drop for JobPermit {
    fn drop(&mut self) {
        *self.gate.state.lock() = GateState::Idle;
        self.gate.completed.notify_waiters();
        debug!("job gate released");
    }
}
