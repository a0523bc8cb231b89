//! Execution registry.

use crate::execution::{ExecutionAdapter, ExecutionKind};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Tracks every in-flight and completed execution by id.
///
/// Ids are monotonically increasing and never reused; entries are never
/// removed by the core, they accumulate for later inspection.
#[derive(Default)]
pub struct ExecutionRegistry {
    executions: DashMap<u64, Arc<ExecutionAdapter>>,
    next_id: AtomicU64,
}

impl ExecutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next execution id.
    pub fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn register(&self, execution: Arc<ExecutionAdapter>) {
        self.executions.insert(execution.id(), execution);
    }

    pub fn get(&self, id: u64) -> Option<Arc<ExecutionAdapter>> {
        self.executions.get(&id).map(|e| Arc::clone(e.value()))
    }

    pub fn len(&self) -> usize {
        self.executions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executions.is_empty()
    }

    /// Ids of currently running executions of the given kind.
    pub fn running_ids(&self, kind: ExecutionKind) -> Vec<u64> {
        self.executions
            .iter()
            .filter(|e| e.value().kind() == kind && e.value().is_running())
            .map(|e| *e.key())
            .collect()
    }

    /// All executions of a kind, running or terminal.
    pub fn by_kind(&self, kind: ExecutionKind) -> Vec<Arc<ExecutionAdapter>> {
        self.executions
            .iter()
            .filter(|e| e.value().kind() == kind)
            .map(|e| Arc::clone(e.value()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ExecutionStatus;
    use crate::params::{JobParameters, RunOptions};
    use std::path::PathBuf;

    fn register_one(registry: &ExecutionRegistry, kind: ExecutionKind) -> Arc<ExecutionAdapter> {
        let id = registry.allocate_id();
        let params = JobParameters::backup(PathBuf::from("/tmp/s"), RunOptions::default());
        let exec =
            Arc::new(ExecutionAdapter::new(id, kind, PathBuf::from("/tmp/a"), false, params));
        registry.register(Arc::clone(&exec));
        exec
    }

    #[test]
    fn test_ids_are_monotonic_and_unique() {
        let registry = ExecutionRegistry::new();
        let a = registry.allocate_id();
        let b = registry.allocate_id();
        assert!(b > a);
    }

    #[test]
    fn test_running_ids_excludes_terminal() {
        let registry = ExecutionRegistry::new();
        let first = register_one(&registry, ExecutionKind::Backup);
        let second = register_one(&registry, ExecutionKind::Backup);
        first.set_status(ExecutionStatus::Completed);

        let running = registry.running_ids(ExecutionKind::Backup);
        assert_eq!(running, vec![second.id()]);
        // terminal entries stay inspectable
        assert_eq!(registry.len(), 2);
        assert!(registry.get(first.id()).is_some());
    }
}
