//! The four ordered pipeline stages.

mod auxiliary;
mod catalog;
mod global;
mod plugins;

pub use auxiliary::AuxiliaryStage;
pub use catalog::CatalogStage;
pub use global::GlobalStage;
pub use plugins::PluginStage;

pub(crate) use auxiliary::copy_aux_tree;
