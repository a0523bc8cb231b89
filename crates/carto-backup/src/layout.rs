//! Archive directory layout.
//!
//! The archive is a directory tree mirroring the catalog hierarchy. The
//! same helpers drive both the backup write side and the restore read
//! side, which keeps the two structurally symmetric by construction.

use carto_catalog::StoreKind;

pub const GLOBAL_FILE: &str = "global.json";
pub const SETTINGS_FILE: &str = "settings.json";
pub const LOGGING_FILE: &str = "logging.json";
pub const SERVICES_DIR: &str = "services";
pub const WORKSPACES_DIR: &str = "workspaces";
pub const STYLES_DIR: &str = "styles";
pub const LAYER_GROUPS_DIR: &str = "layergroups";
pub const WORKSPACE_FILE: &str = "workspace.json";
pub const NAMESPACE_FILE: &str = "namespace.json";
pub const DEFAULT_WORKSPACE_FILE: &str = "default.json";
pub const DEFAULT_NAMESPACE_FILE: &str = "defaultnamespace.json";
pub const LAYER_FILE: &str = "layer.json";

pub fn workspace_dir(workspace: &str) -> String {
    format!("{WORKSPACES_DIR}/{workspace}")
}

pub fn workspace_services_dir(workspace: &str) -> String {
    format!("{WORKSPACES_DIR}/{workspace}/{SERVICES_DIR}")
}

pub fn store_dir(workspace: &str, kind: StoreKind, store: &str) -> String {
    format!("{WORKSPACES_DIR}/{workspace}/{}/{store}", kind.dir_name())
}

pub fn resource_dir(workspace: &str, kind: StoreKind, store: &str, resource: &str) -> String {
    format!("{}/{resource}", store_dir(workspace, kind, store))
}

/// Styles folder, global or workspace-local.
pub fn styles_dir(workspace: Option<&str>) -> String {
    match workspace {
        Some(ws) => format!("{WORKSPACES_DIR}/{ws}/{STYLES_DIR}"),
        None => STYLES_DIR.to_string(),
    }
}

/// Layer groups folder, global or workspace-local.
pub fn layer_groups_dir(workspace: Option<&str>) -> String {
    match workspace {
        Some(ws) => format!("{WORKSPACES_DIR}/{ws}/{LAYER_GROUPS_DIR}"),
        None => LAYER_GROUPS_DIR.to_string(),
    }
}

/// Per-folder inclusion filter for auxiliary resource folders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxFilter {
    /// Include everything
    Any,
    /// Only `*.properties` files
    PropertiesOnly,
    /// Everything except serialized style documents (`*.sld`, `*.xml`)
    ExcludeStyleDocs,
}

impl AuxFilter {
    pub fn accept(&self, name: &str) -> bool {
        match self {
            AuxFilter::Any => true,
            AuxFilter::PropertiesOnly => name.ends_with(".properties"),
            AuxFilter::ExcludeStyleDocs => !name.ends_with(".sld") && !name.ends_with(".xml"),
        }
    }
}

/// Auxiliary resource folders carried alongside the catalog, each with
/// its inclusion filter.
pub fn aux_folders() -> &'static [(&'static str, AuxFilter)] {
    &[
        ("demo", AuxFilter::Any),
        ("images", AuxFilter::Any),
        ("logs", AuxFilter::PropertiesOnly),
        ("palettes", AuxFilter::Any),
        ("plugIns", AuxFilter::Any),
        ("styles", AuxFilter::ExcludeStyleDocs),
        ("user_projections", AuxFilter::Any),
        ("validation", AuxFilter::Any),
        ("www", AuxFilter::Any),
    ]
}
