//! Thread-safe in-memory catalog.

use crate::model::{
    qualified, LayerGroupInfo, LayerInfo, NamespaceInfo, ResourceInfo, StoreInfo, StyleInfo,
    WorkspaceInfo,
};
use crate::{CatalogError, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Change notification fired by the catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogEvent {
    Added { entity_type: &'static str, name: String },
    Removed { entity_type: &'static str, name: String },
}

/// Observer of catalog changes.
pub trait CatalogListener: Send + Sync {
    fn handle(&self, event: &CatalogEvent);
}

/// Pool of live connections backing file based resources.
///
/// The working catalog of a restore shares the live pool so file-backed
/// resources resolve identically; a hard restore disposes it before the
/// swap.
#[derive(Debug, Default)]
pub struct ResourcePool {
    disposed: AtomicBool,
}

impl ResourcePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.disposed.store(false, Ordering::SeqCst);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default, Clone)]
struct CatalogData {
    workspaces: BTreeMap<String, WorkspaceInfo>,
    namespaces: BTreeMap<String, NamespaceInfo>,
    stores: BTreeMap<String, StoreInfo>,
    resources: BTreeMap<String, ResourceInfo>,
    layers: BTreeMap<String, LayerInfo>,
    styles: BTreeMap<String, StyleInfo>,
    layer_groups: BTreeMap<String, LayerGroupInfo>,
    default_workspace: Option<String>,
    default_namespace: Option<String>,
}

/// The in-memory hierarchical store of configuration entities.
///
/// Entities are keyed by name (qualified with the workspace for scoped
/// types). `detached_copy` produces the empty working catalog a restore
/// builds against: it shares the resource loader base and pool and sees
/// the same listeners, but owns none of the live entities.
pub struct Catalog {
    data: RwLock<CatalogData>,
    listeners: RwLock<Vec<Arc<dyn CatalogListener>>>,
    resource_pool: Arc<ResourcePool>,
    /// Base path of the data directory backing file resources
    resource_base: PathBuf,
}

impl Catalog {
    pub fn new(resource_base: impl Into<PathBuf>) -> Self {
        Self {
            data: RwLock::new(CatalogData::default()),
            listeners: RwLock::new(Vec::new()),
            resource_pool: Arc::new(ResourcePool::new()),
            resource_base: resource_base.into(),
        }
    }

    pub fn resource_base(&self) -> &PathBuf {
        &self.resource_base
    }

    pub fn resource_pool(&self) -> Arc<ResourcePool> {
        Arc::clone(&self.resource_pool)
    }

    pub fn add_listener(&self, listener: Arc<dyn CatalogListener>) {
        self.listeners.write().push(listener);
    }

    pub fn listeners(&self) -> Vec<Arc<dyn CatalogListener>> {
        self.listeners.read().clone()
    }

    fn notify(&self, event: CatalogEvent) {
        for listener in self.listeners.read().iter() {
            listener.handle(&event);
        }
    }

    /// An empty catalog sharing this catalog's resource base, pool and
    /// listeners, owning no entities.
    pub fn detached_copy(&self) -> Arc<Catalog> {
        let copy = Catalog {
            data: RwLock::new(CatalogData::default()),
            listeners: RwLock::new(self.listeners.read().clone()),
            resource_pool: Arc::clone(&self.resource_pool),
            resource_base: self.resource_base.clone(),
        };
        Arc::new(copy)
    }

    /// Replaces this catalog's entities with those of `other`.
    ///
    /// Used by the hard-restore commit to swap the working catalog into
    /// the live one under the configuration lock.
    pub fn replace_contents(&self, other: &Catalog) {
        let snapshot = other.data.read().clone();
        *self.data.write() = snapshot;
        debug!("catalog contents replaced");
    }

    /// Drops every entity. The resource pool is disposed separately.
    pub fn dispose_entities(&self) {
        *self.data.write() = CatalogData::default();
    }

    // ---- workspaces / namespaces -------------------------------------

    pub fn add_workspace(&self, ws: WorkspaceInfo) -> Result<()> {
        let name = ws.name.clone();
        let mut data = self.data.write();
        if data.workspaces.contains_key(&name) {
            return Err(CatalogError::AlreadyExists(format!("workspace {name}")));
        }
        if data.default_workspace.is_none() {
            data.default_workspace = Some(name.clone());
        }
        data.workspaces.insert(name.clone(), ws);
        drop(data);
        self.notify(CatalogEvent::Added { entity_type: "workspace", name });
        Ok(())
    }

    pub fn remove_workspace(&self, name: &str) -> Result<()> {
        let mut data = self.data.write();
        if data.workspaces.remove(name).is_none() {
            return Err(CatalogError::NotFound(format!("workspace {name}")));
        }
        if data.default_workspace.as_deref() == Some(name) {
            data.default_workspace = None;
        }
        drop(data);
        self.notify(CatalogEvent::Removed { entity_type: "workspace", name: name.to_string() });
        Ok(())
    }

    pub fn workspace(&self, name: &str) -> Option<WorkspaceInfo> {
        self.data.read().workspaces.get(name).cloned()
    }

    pub fn workspaces(&self) -> Vec<WorkspaceInfo> {
        self.data.read().workspaces.values().cloned().collect()
    }

    pub fn workspace_count(&self) -> usize {
        self.data.read().workspaces.len()
    }

    pub fn default_workspace(&self) -> Option<WorkspaceInfo> {
        let data = self.data.read();
        data.default_workspace.as_ref().and_then(|n| data.workspaces.get(n).cloned())
    }

    pub fn set_default_workspace(&self, name: &str) -> Result<()> {
        let mut data = self.data.write();
        if !data.workspaces.contains_key(name) {
            return Err(CatalogError::NotFound(format!("workspace {name}")));
        }
        data.default_workspace = Some(name.to_string());
        Ok(())
    }

    pub fn add_namespace(&self, ns: NamespaceInfo) -> Result<()> {
        let name = ns.prefix.clone();
        let mut data = self.data.write();
        if data.namespaces.contains_key(&name) {
            return Err(CatalogError::AlreadyExists(format!("namespace {name}")));
        }
        if data.default_namespace.is_none() {
            data.default_namespace = Some(name.clone());
        }
        data.namespaces.insert(name.clone(), ns);
        drop(data);
        self.notify(CatalogEvent::Added { entity_type: "namespace", name });
        Ok(())
    }

    pub fn remove_namespace(&self, prefix: &str) -> Result<()> {
        let mut data = self.data.write();
        if data.namespaces.remove(prefix).is_none() {
            return Err(CatalogError::NotFound(format!("namespace {prefix}")));
        }
        if data.default_namespace.as_deref() == Some(prefix) {
            data.default_namespace = None;
        }
        drop(data);
        self.notify(CatalogEvent::Removed { entity_type: "namespace", name: prefix.to_string() });
        Ok(())
    }

    pub fn namespace(&self, prefix: &str) -> Option<NamespaceInfo> {
        self.data.read().namespaces.get(prefix).cloned()
    }

    pub fn namespaces(&self) -> Vec<NamespaceInfo> {
        self.data.read().namespaces.values().cloned().collect()
    }

    pub fn namespace_count(&self) -> usize {
        self.data.read().namespaces.len()
    }

    pub fn default_namespace(&self) -> Option<NamespaceInfo> {
        let data = self.data.read();
        data.default_namespace.as_ref().and_then(|n| data.namespaces.get(n).cloned())
    }

    pub fn set_default_namespace(&self, prefix: &str) -> Result<()> {
        let mut data = self.data.write();
        if !data.namespaces.contains_key(prefix) {
            return Err(CatalogError::NotFound(format!("namespace {prefix}")));
        }
        data.default_namespace = Some(prefix.to_string());
        Ok(())
    }

    // ---- stores ------------------------------------------------------

    pub fn add_store(&self, store: StoreInfo) -> Result<()> {
        let key = qualified(Some(&store.workspace), &store.name);
        let mut data = self.data.write();
        if !data.workspaces.contains_key(&store.workspace) {
            return Err(CatalogError::UnresolvedReference(format!(
                "store {} references missing workspace {}",
                store.name, store.workspace
            )));
        }
        if data.stores.contains_key(&key) {
            return Err(CatalogError::AlreadyExists(format!("store {key}")));
        }
        data.stores.insert(key.clone(), store);
        drop(data);
        self.notify(CatalogEvent::Added { entity_type: "store", name: key });
        Ok(())
    }

    pub fn remove_store(&self, workspace: &str, name: &str) -> Result<()> {
        let key = qualified(Some(workspace), name);
        if self.data.write().stores.remove(&key).is_none() {
            return Err(CatalogError::NotFound(format!("store {key}")));
        }
        self.notify(CatalogEvent::Removed { entity_type: "store", name: key });
        Ok(())
    }

    pub fn store(&self, workspace: &str, name: &str) -> Option<StoreInfo> {
        self.data.read().stores.get(&qualified(Some(workspace), name)).cloned()
    }

    pub fn stores(&self) -> Vec<StoreInfo> {
        self.data.read().stores.values().cloned().collect()
    }

    pub fn stores_by_workspace(&self, workspace: &str) -> Vec<StoreInfo> {
        self.data
            .read()
            .stores
            .values()
            .filter(|s| s.workspace == workspace)
            .cloned()
            .collect()
    }

    pub fn store_count(&self) -> usize {
        self.data.read().stores.len()
    }

    // ---- resources ---------------------------------------------------

    pub fn add_resource(&self, resource: ResourceInfo) -> Result<()> {
        let key = qualified(Some(&resource.workspace), &resource.name);
        let store_key = qualified(Some(&resource.workspace), &resource.store);
        let mut data = self.data.write();
        if !data.stores.contains_key(&store_key) {
            return Err(CatalogError::UnresolvedReference(format!(
                "resource {} references missing store {store_key}",
                resource.name
            )));
        }
        if data.resources.contains_key(&key) {
            return Err(CatalogError::AlreadyExists(format!("resource {key}")));
        }
        data.resources.insert(key.clone(), resource);
        drop(data);
        self.notify(CatalogEvent::Added { entity_type: "resource", name: key });
        Ok(())
    }

    pub fn remove_resource(&self, workspace: &str, name: &str) -> Result<()> {
        let key = qualified(Some(workspace), name);
        if self.data.write().resources.remove(&key).is_none() {
            return Err(CatalogError::NotFound(format!("resource {key}")));
        }
        self.notify(CatalogEvent::Removed { entity_type: "resource", name: key });
        Ok(())
    }

    pub fn resource(&self, workspace: &str, name: &str) -> Option<ResourceInfo> {
        self.data.read().resources.get(&qualified(Some(workspace), name)).cloned()
    }

    pub fn resources(&self) -> Vec<ResourceInfo> {
        self.data.read().resources.values().cloned().collect()
    }

    pub fn resources_by_store(&self, workspace: &str, store: &str) -> Vec<ResourceInfo> {
        self.data
            .read()
            .resources
            .values()
            .filter(|r| r.workspace == workspace && r.store == store)
            .cloned()
            .collect()
    }

    pub fn resource_count(&self) -> usize {
        self.data.read().resources.len()
    }

    // ---- layers ------------------------------------------------------

    pub fn add_layer(&self, layer: LayerInfo) -> Result<()> {
        let key = qualified(Some(&layer.workspace), &layer.name);
        let resource_key = qualified(Some(&layer.workspace), &layer.resource);
        let mut data = self.data.write();
        if !data.resources.contains_key(&resource_key) {
            return Err(CatalogError::UnresolvedReference(format!(
                "layer {} references missing resource {resource_key}",
                layer.name
            )));
        }
        if !data.styles.contains_key(&layer.default_style)
            && !data
                .styles
                .contains_key(&qualified(Some(&layer.workspace), &layer.default_style))
        {
            return Err(CatalogError::UnresolvedReference(format!(
                "layer {} references missing style {}",
                layer.name, layer.default_style
            )));
        }
        if data.layers.contains_key(&key) {
            return Err(CatalogError::AlreadyExists(format!("layer {key}")));
        }
        data.layers.insert(key.clone(), layer);
        drop(data);
        self.notify(CatalogEvent::Added { entity_type: "layer", name: key });
        Ok(())
    }

    pub fn remove_layer(&self, workspace: &str, name: &str) -> Result<()> {
        let key = qualified(Some(workspace), name);
        if self.data.write().layers.remove(&key).is_none() {
            return Err(CatalogError::NotFound(format!("layer {key}")));
        }
        self.notify(CatalogEvent::Removed { entity_type: "layer", name: key });
        Ok(())
    }

    pub fn layer(&self, workspace: &str, name: &str) -> Option<LayerInfo> {
        self.data.read().layers.get(&qualified(Some(workspace), name)).cloned()
    }

    pub fn layers(&self) -> Vec<LayerInfo> {
        self.data.read().layers.values().cloned().collect()
    }

    pub fn layers_by_resource(&self, workspace: &str, resource: &str) -> Vec<LayerInfo> {
        self.data
            .read()
            .layers
            .values()
            .filter(|l| l.workspace == workspace && l.resource == resource)
            .cloned()
            .collect()
    }

    pub fn layer_count(&self) -> usize {
        self.data.read().layers.len()
    }

    // ---- styles ------------------------------------------------------

    pub fn add_style(&self, style: StyleInfo) -> Result<()> {
        let key = qualified(style.workspace.as_deref(), &style.name);
        let mut data = self.data.write();
        if data.styles.contains_key(&key) {
            return Err(CatalogError::AlreadyExists(format!("style {key}")));
        }
        data.styles.insert(key.clone(), style);
        drop(data);
        self.notify(CatalogEvent::Added { entity_type: "style", name: key });
        Ok(())
    }

    pub fn remove_style(&self, workspace: Option<&str>, name: &str) -> Result<()> {
        let key = qualified(workspace, name);
        if self.data.write().styles.remove(&key).is_none() {
            return Err(CatalogError::NotFound(format!("style {key}")));
        }
        self.notify(CatalogEvent::Removed { entity_type: "style", name: key });
        Ok(())
    }

    pub fn style(&self, workspace: Option<&str>, name: &str) -> Option<StyleInfo> {
        self.data.read().styles.get(&qualified(workspace, name)).cloned()
    }

    pub fn styles(&self) -> Vec<StyleInfo> {
        self.data.read().styles.values().cloned().collect()
    }

    pub fn styles_by_workspace(&self, workspace: Option<&str>) -> Vec<StyleInfo> {
        self.data
            .read()
            .styles
            .values()
            .filter(|s| s.workspace.as_deref() == workspace)
            .cloned()
            .collect()
    }

    pub fn style_count(&self) -> usize {
        self.data.read().styles.len()
    }

    // ---- layer groups ------------------------------------------------

    pub fn add_layer_group(&self, group: LayerGroupInfo) -> Result<()> {
        let key = qualified(group.workspace.as_deref(), &group.name);
        let mut data = self.data.write();
        if data.layer_groups.contains_key(&key) {
            return Err(CatalogError::AlreadyExists(format!("layer group {key}")));
        }
        data.layer_groups.insert(key.clone(), group);
        drop(data);
        self.notify(CatalogEvent::Added { entity_type: "layergroup", name: key });
        Ok(())
    }

    pub fn remove_layer_group(&self, workspace: Option<&str>, name: &str) -> Result<()> {
        let key = qualified(workspace, name);
        if self.data.write().layer_groups.remove(&key).is_none() {
            return Err(CatalogError::NotFound(format!("layer group {key}")));
        }
        self.notify(CatalogEvent::Removed { entity_type: "layergroup", name: key });
        Ok(())
    }

    pub fn layer_group(&self, workspace: Option<&str>, name: &str) -> Option<LayerGroupInfo> {
        self.data.read().layer_groups.get(&qualified(workspace, name)).cloned()
    }

    pub fn layer_groups(&self) -> Vec<LayerGroupInfo> {
        self.data.read().layer_groups.values().cloned().collect()
    }

    pub fn layer_groups_by_workspace(&self, workspace: Option<&str>) -> Vec<LayerGroupInfo> {
        self.data
            .read()
            .layer_groups
            .values()
            .filter(|g| g.workspace.as_deref() == workspace)
            .cloned()
            .collect()
    }

    pub fn layer_group_count(&self) -> usize {
        self.data.read().layer_groups.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ResourceKind, StoreKind};
    use parking_lot::Mutex;

    struct RecordingListener {
        events: Mutex<Vec<CatalogEvent>>,
    }

    impl CatalogListener for RecordingListener {
        fn handle(&self, event: &CatalogEvent) {
            self.events.lock().push(event.clone());
        }
    }

    fn seeded() -> Catalog {
        let catalog = Catalog::new("/tmp/data");
        catalog.add_workspace(WorkspaceInfo::new("topo")).unwrap();
        catalog.add_namespace(NamespaceInfo::new("topo", "http://topo")).unwrap();
        catalog
            .add_store(StoreInfo::new("rivers", "topo", StoreKind::Data))
            .unwrap();
        catalog
    }

    #[test]
    fn test_first_workspace_becomes_default() {
        let catalog = seeded();
        assert_eq!(catalog.default_workspace().unwrap().name, "topo");
        assert_eq!(catalog.default_namespace().unwrap().prefix, "topo");
    }

    #[test]
    fn test_store_requires_workspace() {
        let catalog = Catalog::new("/tmp/data");
        let err = catalog
            .add_store(StoreInfo::new("rivers", "missing", StoreKind::Data))
            .unwrap_err();
        assert!(matches!(err, CatalogError::UnresolvedReference(_)));
    }

    #[test]
    fn test_layer_requires_resource_and_style() {
        let catalog = seeded();
        catalog
            .add_resource(ResourceInfo::new("streams", "rivers", "topo", ResourceKind::FeatureType))
            .unwrap();
        let layer = LayerInfo {
            id: None,
            name: "streams".into(),
            resource: "streams".into(),
            workspace: "topo".into(),
            default_style: "blue".into(),
            styles: vec![],
            enabled: true,
        };
        assert!(matches!(
            catalog.add_layer(layer.clone()),
            Err(CatalogError::UnresolvedReference(_))
        ));
        catalog.add_style(StyleInfo::new("blue")).unwrap();
        catalog.add_layer(layer).unwrap();
        assert_eq!(catalog.layer_count(), 1);
    }

    #[test]
    fn test_detached_copy_is_empty_and_shares_pool() {
        let catalog = seeded();
        let copy = catalog.detached_copy();
        assert_eq!(copy.workspace_count(), 0);
        assert_eq!(copy.resource_base(), catalog.resource_base());
        catalog.resource_pool().dispose();
        assert!(copy.resource_pool().is_disposed());
    }

    #[test]
    fn test_detached_copy_sees_listeners() {
        let catalog = seeded();
        let listener = Arc::new(RecordingListener { events: Mutex::new(Vec::new()) });
        catalog.add_listener(listener.clone());
        let copy = catalog.detached_copy();
        copy.add_workspace(WorkspaceInfo::new("geo")).unwrap();
        let events = listener.events.lock();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_remove_notifies_and_clears_default() {
        let catalog = seeded();
        let listener = Arc::new(RecordingListener { events: Mutex::new(Vec::new()) });
        catalog.add_listener(listener.clone());

        catalog.remove_store("topo", "rivers").unwrap();
        catalog.remove_workspace("topo").unwrap();
        assert!(catalog.default_workspace().is_none());
        assert!(matches!(
            catalog.remove_workspace("topo"),
            Err(CatalogError::NotFound(_))
        ));

        let events = listener.events.lock();
        assert_eq!(
            events[0],
            CatalogEvent::Removed { entity_type: "store", name: "topo:rivers".into() }
        );
        assert_eq!(
            events[1],
            CatalogEvent::Removed { entity_type: "workspace", name: "topo".into() }
        );
    }

    #[test]
    fn test_replace_contents() {
        let live = Catalog::new("/tmp/data");
        let other = seeded();
        live.replace_contents(&other);
        assert_eq!(live.workspace_count(), 1);
        assert_eq!(live.store_count(), 1);
    }
}
