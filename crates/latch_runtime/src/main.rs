//! Latch Engine Runtime
//!
//! Boots the reflection registry and the asset layer. Pass an asset file path
//! to load it and print its contents.

use anyhow::{Context, Result};
use latch_asset::{load_asset_file, AssetRegistry, AssetSettings, ComponentFactoryRegistry};
use latch_meta::serialization::serialize;
use latch_meta::MetaManager;
use tracing_subscriber::EnvFilter;

const SETTINGS_ENV: &str = "LATCH_ASSET_SETTINGS";

fn load_settings() -> Result<AssetSettings> {
    match std::env::var_os(SETTINGS_ENV) {
        Some(path) => AssetSettings::load(&path)
            .with_context(|| format!("reading {SETTINGS_ENV}={}", path.to_string_lossy())),
        None => Ok(AssetSettings::default()),
    }
}

fn main() -> Result<()> {
    // RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Latch Engine v{}", latch_meta::VERSION);

    let builtins = latch_meta::reflect_builtins();
    tracing::info!(builtins, total = MetaManager::get().type_count(), "Reflection registry ready");

    let settings = load_settings()?;
    tracing::info!(
        write_version = settings.write_version.as_u32(),
        strict = settings.strict_class_check,
        "Asset settings loaded"
    );

    let factories = ComponentFactoryRegistry::from_manager();
    tracing::info!(components = factories.len(), names = ?factories.type_names(), "Component factories built");

    let mut assets = AssetRegistry::new();
    for path in std::env::args().skip(1) {
        let asset = load_asset_file(&path, &settings).with_context(|| format!("loading asset {path}"))?;
        let json = serialize(&asset.object)?;
        tracing::info!(
            asset = %asset.metadata.name,
            class = %asset.metadata.class_name,
            version = asset.metadata.version.as_u32(),
            guid = %format!("{:032x}", asset.metadata.guid),
            %json,
            "Loaded asset"
        );
        assets.register(asset);
    }

    tracing::info!(loaded = assets.len(), "Runtime initialized successfully");
    Ok(())
}
