//! Configuration catalog for Carto.
//!
//! This crate provides:
//! - The typed entity model (workspaces, stores, resources, layers, styles)
//! - A thread-safe in-memory catalog with change listeners
//! - The global configuration facade
//! - A hierarchical resource store abstraction over the data directory
//! - The entity codec and service loader registry
//! - The plugin configuration provider contract

pub mod catalog;
pub mod codec;
pub mod config;
pub mod model;
pub mod plugin;
pub mod store;

pub use catalog::{Catalog, CatalogEvent, CatalogListener, ResourcePool};
pub use codec::{EntityCodec, JsonServiceLoader, ServiceLoader, ServiceLoaderRegistry};
pub use config::ConfigFacade;
pub use model::{
    GlobalInfo, LayerGroupInfo, LayerInfo, LoggingInfo, NamespaceInfo, ResourceInfo, ResourceKind,
    ServiceInfo, SettingsInfo, StoreInfo, StoreKind, StyleInfo, WorkspaceInfo,
};
pub use plugin::PluginConfigProvider;
pub use store::{any_resource, LocalResourceStore, ResourceEntry, ResourceStore};

use thiserror::Error;

/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Error type for catalog, store and codec operations.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// A named entity already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// A dangling name-based cross reference
    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),

    /// Invalid relative path addressed against a resource store
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// Other errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for CatalogError {
    fn from(e: serde_json::Error) -> Self {
        CatalogError::Serialization(e.to_string())
    }
}
