//! Catalog entity model.
//!
//! All cross references between entities are kept by name, never by
//! embedding the referenced entity. Workspace-scoped entities carry an
//! optional workspace name; a `None` workspace means the entity is global.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A workspace, the top level grouping of the catalog hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceInfo {
    /// Entity identifier, stripped on backup output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Workspace name, unique across the catalog
    pub name: String,
    /// Whether the workspace is isolated from global resources
    #[serde(default)]
    pub isolated: bool,
}

impl WorkspaceInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self { id: None, name: name.into(), isolated: false }
    }
}

/// A namespace, paired one-to-one with a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Namespace prefix, matches the owning workspace name
    pub prefix: String,
    /// Namespace URI
    pub uri: String,
}

impl NamespaceInfo {
    pub fn new(prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        Self { id: None, prefix: prefix.into(), uri: uri.into() }
    }
}

/// Kind of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Vector data store
    Data,
    /// Raster coverage store
    Coverage,
}

impl StoreKind {
    /// Directory name hosting stores of this kind inside a workspace.
    pub fn dir_name(&self) -> &'static str {
        match self {
            StoreKind::Data => "datastores",
            StoreKind::Coverage => "coveragestores",
        }
    }

    /// Serialized file name for stores of this kind.
    pub fn file_name(&self) -> &'static str {
        match self {
            StoreKind::Data => "datastore.json",
            StoreKind::Coverage => "coveragestore.json",
        }
    }
}

/// A data or coverage store, owned by a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    /// Owning workspace, by name
    pub workspace: String,
    pub kind: StoreKind,
    /// Connection parameters
    #[serde(default)]
    pub connection: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl StoreInfo {
    pub fn new(name: impl Into<String>, workspace: impl Into<String>, kind: StoreKind) -> Self {
        Self {
            id: None,
            name: name.into(),
            workspace: workspace.into(),
            kind,
            connection: BTreeMap::new(),
            enabled: true,
        }
    }
}

/// Kind of a published resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    FeatureType,
    Coverage,
}

impl ResourceKind {
    /// Serialized file name for resources of this kind.
    pub fn file_name(&self) -> &'static str {
        match self {
            ResourceKind::FeatureType => "featuretype.json",
            ResourceKind::Coverage => "coverage.json",
        }
    }
}

/// A published resource (feature type or coverage), owned by a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    /// Owning store, by name
    pub store: String,
    /// Owning workspace, by name
    pub workspace: String,
    pub kind: ResourceKind,
    /// Name of the resource in the native store
    pub native_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl ResourceInfo {
    pub fn new(
        name: impl Into<String>,
        store: impl Into<String>,
        workspace: impl Into<String>,
        kind: ResourceKind,
    ) -> Self {
        let name = name.into();
        Self {
            id: None,
            native_name: name.clone(),
            name,
            store: store.into(),
            workspace: workspace.into(),
            kind,
            title: None,
            enabled: true,
        }
    }
}

/// A layer publishing a resource with one or more styles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    /// Published resource, by name
    pub resource: String,
    /// Owning workspace, by name
    pub workspace: String,
    /// Default style, by name
    pub default_style: String,
    /// Additional styles, by name
    #[serde(default)]
    pub styles: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// A style definition reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    /// Owning workspace, `None` for global styles
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    /// Style definition file name inside the styles folder
    pub filename: String,
    #[serde(default = "default_style_format")]
    pub format: String,
}

impl StyleInfo {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: None,
            filename: format!("{name}.sld"),
            name,
            workspace: None,
            format: default_style_format(),
        }
    }
}

fn default_style_format() -> String {
    "sld".to_string()
}

/// A layer group composing multiple layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerGroupInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    /// Owning workspace, `None` for global groups
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    /// Composed layers, by name, in drawing order
    #[serde(default)]
    pub layers: Vec<String>,
    /// Styles applied per layer, by name
    #[serde(default)]
    pub styles: Vec<String>,
}

/// An OGC-style service configuration, global or workspace-local.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    /// Service type identifier, resolves the codec loader (e.g. "map")
    pub type_id: String,
    /// Owning workspace, `None` for global services
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl ServiceInfo {
    pub fn new(type_id: impl Into<String>) -> Self {
        let type_id = type_id.into();
        Self {
            id: None,
            name: type_id.clone(),
            type_id,
            workspace: None,
            title: None,
            enabled: true,
        }
    }
}

/// Per-workspace or global settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsInfo {
    /// Owning workspace, `None` for the global settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default = "default_charset")]
    pub charset: String,
    #[serde(default)]
    pub verbose: bool,
}

fn default_charset() -> String {
    "UTF-8".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingInfo {
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default = "default_true")]
    pub stdout_logging: bool,
}

impl Default for LoggingInfo {
    fn default() -> Self {
        Self { level: "INFO".to_string(), location: None, stdout_logging: true }
    }
}

/// Global server configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalInfo {
    /// Bumped on every configuration change
    #[serde(default)]
    pub update_sequence: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_contact: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Fully qualified name for workspace-scoped entities.
pub fn qualified(workspace: Option<&str>, name: &str) -> String {
    match workspace {
        Some(ws) => format!("{ws}:{name}"),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_names() {
        assert_eq!(qualified(Some("topo"), "roads"), "topo:roads");
        assert_eq!(qualified(None, "roads"), "roads");
    }

    #[test]
    fn test_store_kind_layout_names() {
        assert_eq!(StoreKind::Data.dir_name(), "datastores");
        assert_eq!(StoreKind::Coverage.dir_name(), "coveragestores");
        assert_eq!(StoreKind::Data.file_name(), "datastore.json");
    }

    #[test]
    fn test_workspace_roundtrip_skips_missing_id() {
        let ws = WorkspaceInfo::new("topo");
        let json = serde_json::to_string(&ws).unwrap();
        assert!(!json.contains("\"id\""));
        let back: WorkspaceInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ws);
    }
}
