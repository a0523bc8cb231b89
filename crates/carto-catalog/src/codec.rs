//! Entity codec and service loader registry.
//!
//! Entities are persisted as JSON documents named after their role in the
//! hierarchy (`workspace.json`, `datastore.json`, ...). Cross references
//! are always written by name (the model carries no embedded sub-objects)
//! and entity ids can be stripped on output so two backups of the same
//! catalog are byte-identical.

use crate::model::ServiceInfo;
use crate::store::ResourceStore;
use crate::{CatalogError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Serializes and deserializes typed catalog entities against a
/// [`ResourceStore`].
#[derive(Debug, Clone, Default)]
pub struct EntityCodec {
    exclude_ids: bool,
    reference_by_name: bool,
}

impl EntityCodec {
    pub fn new() -> Self {
        Self { exclude_ids: false, reference_by_name: true }
    }

    /// Strip entity ids on write, for backup output determinism.
    pub fn with_exclude_ids(mut self, exclude: bool) -> Self {
        self.exclude_ids = exclude;
        self
    }

    /// Resolve cross references by name instead of embedding sub-objects.
    /// The entity model is already name-referenced, so this only guards
    /// against future embedded forms; it is on by default.
    pub fn with_reference_by_name(mut self, by_name: bool) -> Self {
        self.reference_by_name = by_name;
        self
    }

    pub fn excludes_ids(&self) -> bool {
        self.exclude_ids
    }

    pub fn references_by_name(&self) -> bool {
        self.reference_by_name
    }

    /// Serializes `entity` to `<dir>/<file>` inside `store`.
    pub async fn write<T: Serialize + Sync>(
        &self,
        store: &dyn ResourceStore,
        dir: &str,
        file: &str,
        entity: &T,
    ) -> Result<()> {
        let mut value = serde_json::to_value(entity)?;
        if self.exclude_ids {
            if let Some(obj) = value.as_object_mut() {
                obj.remove("id");
            }
        }
        let data = serde_json::to_vec_pretty(&value)?;
        store.write(&join(dir, file), Bytes::from(data)).await
    }

    /// Deserializes a typed entity from `<dir>/<file>` inside `store`.
    pub async fn read<T: DeserializeOwned>(
        &self,
        store: &dyn ResourceStore,
        dir: &str,
        file: &str,
    ) -> Result<T> {
        let path = join(dir, file);
        let data = store.read(&path).await?;
        serde_json::from_slice(&data)
            .map_err(|e| CatalogError::Serialization(format!("{path}: {e}")))
    }
}

fn join(dir: &str, file: &str) -> String {
    if dir.is_empty() {
        file.to_string()
    } else {
        format!("{dir}/{file}")
    }
}

/// Persists one service type's configuration file.
///
/// Loaders are resolved through an explicit registry keyed by service
/// type, never by runtime type inspection.
#[async_trait]
pub trait ServiceLoader: Send + Sync {
    /// Service type this loader handles (e.g. "map").
    fn type_id(&self) -> &str;

    /// Configuration file name written inside the services directory.
    fn filename(&self) -> &str;

    async fn save(
        &self,
        service: &ServiceInfo,
        store: &dyn ResourceStore,
        dir: &str,
    ) -> Result<()>;

    async fn load(&self, store: &dyn ResourceStore, dir: &str) -> Result<ServiceInfo>;
}

/// JSON-backed service loader, sufficient for any [`ServiceInfo`] shaped
/// service configuration.
pub struct JsonServiceLoader {
    type_id: String,
    filename: String,
    codec: EntityCodec,
}

impl JsonServiceLoader {
    pub fn new(type_id: impl Into<String>) -> Self {
        let type_id = type_id.into();
        Self {
            filename: format!("{type_id}.json"),
            type_id,
            codec: EntityCodec::new(),
        }
    }
}

#[async_trait]
impl ServiceLoader for JsonServiceLoader {
    fn type_id(&self) -> &str {
        &self.type_id
    }

    fn filename(&self) -> &str {
        &self.filename
    }

    async fn save(
        &self,
        service: &ServiceInfo,
        store: &dyn ResourceStore,
        dir: &str,
    ) -> Result<()> {
        self.codec.write(store, dir, &self.filename, service).await
    }

    async fn load(&self, store: &dyn ResourceStore, dir: &str) -> Result<ServiceInfo> {
        self.codec.read(store, dir, &self.filename).await
    }
}

/// Lookup table of service loaders keyed by service type.
#[derive(Default)]
pub struct ServiceLoaderRegistry {
    loaders: Vec<Arc<dyn ServiceLoader>>,
}

impl ServiceLoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in service types.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for type_id in ["map", "feature", "coverage"] {
            registry.register(Arc::new(JsonServiceLoader::new(type_id)));
        }
        registry
    }

    pub fn register(&mut self, loader: Arc<dyn ServiceLoader>) {
        self.loaders.push(loader);
    }

    pub fn by_type(&self, type_id: &str) -> Option<Arc<dyn ServiceLoader>> {
        self.loaders.iter().find(|l| l.type_id() == type_id).cloned()
    }

    pub fn by_filename(&self, filename: &str) -> Option<Arc<dyn ServiceLoader>> {
        self.loaders.iter().find(|l| l.filename() == filename).cloned()
    }

    pub fn loaders(&self) -> &[Arc<dyn ServiceLoader>] {
        &self.loaders
    }
}
