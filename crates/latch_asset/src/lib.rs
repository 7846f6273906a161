//! Latch Asset Pipeline
//!
//! Versioned asset files holding reflected objects:
//! - Header with name, class and guid (versions 0, 1, 2 and 4)
//! - JSON payload written through reflection
//! - Component factories and the loaded-asset registry

pub mod error;
pub mod factory;
pub mod file;
pub mod header;
pub mod registry;
pub mod settings;

pub use error::AssetError;
pub use factory::{ComponentFactory, ComponentFactoryRegistry};
pub use file::{load_asset, load_asset_file, save_asset, stable_class_id, AssetFile, LoadedAsset};
pub use header::{AssetFileMetaData, AssetFileVersion};
pub use registry::{AssetHandle, AssetRegistry};
pub use settings::AssetSettings;
