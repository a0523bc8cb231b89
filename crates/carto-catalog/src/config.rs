//! Global configuration facade.

use crate::model::{qualified, GlobalInfo, LoggingInfo, ServiceInfo, SettingsInfo};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default, Clone)]
struct ConfigState {
    global: GlobalInfo,
    settings: SettingsInfo,
    logging: LoggingInfo,
    /// Global services keyed by type id, workspace services by "ws:type"
    services: BTreeMap<String, ServiceInfo>,
    /// Per-workspace settings keyed by workspace name
    workspace_settings: BTreeMap<String, SettingsInfo>,
}

/// Holds global info, settings, logging and service configuration for the
/// live system, plus the reload hook a hard restore re-points it through.
pub struct ConfigFacade {
    state: RwLock<ConfigState>,
    reload_generation: AtomicU64,
}

impl Default for ConfigFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigFacade {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ConfigState::default()),
            reload_generation: AtomicU64::new(0),
        }
    }

    pub fn global(&self) -> GlobalInfo {
        self.state.read().global.clone()
    }

    pub fn set_global(&self, global: GlobalInfo) {
        self.state.write().global = global;
    }

    pub fn logging(&self) -> LoggingInfo {
        self.state.read().logging.clone()
    }

    pub fn set_logging(&self, logging: LoggingInfo) {
        self.state.write().logging = logging;
    }

    /// Settings for a workspace, or the global settings when `None`.
    pub fn settings(&self, workspace: Option<&str>) -> Option<SettingsInfo> {
        let state = self.state.read();
        match workspace {
            Some(ws) => state.workspace_settings.get(ws).cloned(),
            None => Some(state.settings.clone()),
        }
    }

    pub fn set_settings(&self, settings: SettingsInfo) {
        let mut state = self.state.write();
        match settings.workspace.clone() {
            Some(ws) => {
                state.workspace_settings.insert(ws, settings);
            }
            None => state.settings = settings,
        }
    }

    /// Services for a workspace, or the global ones when `None`.
    pub fn services(&self, workspace: Option<&str>) -> Vec<ServiceInfo> {
        self.state
            .read()
            .services
            .values()
            .filter(|s| s.workspace.as_deref() == workspace)
            .cloned()
            .collect()
    }

    pub fn service(&self, workspace: Option<&str>, type_id: &str) -> Option<ServiceInfo> {
        self.state.read().services.get(&qualified(workspace, type_id)).cloned()
    }

    pub fn set_service(&self, service: ServiceInfo) {
        let key = qualified(service.workspace.as_deref(), &service.type_id);
        self.state.write().services.insert(key, service);
    }

    pub fn service_count(&self) -> usize {
        self.state.read().services.len()
    }

    /// Replaces the whole configuration with another facade's state and
    /// bumps the reload generation. This is the restore commit's
    /// re-pointing step.
    pub fn reload_from(&self, other: &ConfigFacade) {
        let snapshot = other.state.read().clone();
        *self.state.write() = snapshot;
        self.reload_generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of reloads the live configuration has gone through.
    pub fn reload_generation(&self) -> u64 {
        self.reload_generation.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_scoped_services() {
        let config = ConfigFacade::new();
        config.set_service(ServiceInfo::new("map"));
        let mut ws_service = ServiceInfo::new("map");
        ws_service.workspace = Some("topo".into());
        config.set_service(ws_service);

        assert_eq!(config.services(None).len(), 1);
        assert_eq!(config.services(Some("topo")).len(), 1);
        assert_eq!(config.service_count(), 2);
    }

    #[test]
    fn test_reload_from_bumps_generation() {
        let live = ConfigFacade::new();
        let restored = ConfigFacade::new();
        restored.set_global(GlobalInfo { update_sequence: 42, ..Default::default() });

        assert_eq!(live.reload_generation(), 0);
        live.reload_from(&restored);
        assert_eq!(live.reload_generation(), 1);
        assert_eq!(live.global().update_sequence, 42);
    }
}
