// file.rs - Asset container: header followed by a JSON payload

use crate::error::AssetError;
use crate::header::{read_u64, AssetFileMetaData, AssetFileVersion};
use crate::settings::AssetSettings;
use latch_meta::serialization::{deserialize_new, serialize};
use latch_meta::{MetaAny, MetaManager, MetaType, TypeId};
use serde_json::Value;
use std::io::{Read, Write};
use std::path::Path;

/// Class id written into headers. Derived from the type name so it stays the
/// same across builds.
pub fn stable_class_id(ty: &MetaType) -> TypeId {
    TypeId::from_name(ty.name().as_str())
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetFile {
    pub metadata: AssetFileMetaData,
    pub payload: Value,
}

impl AssetFile {
    pub fn read_from(reader: &mut impl Read, max_payload_bytes: u64) -> Result<Self, AssetError> {
        let metadata = AssetFileMetaData::read_from(reader)?;
        let len = read_u64(reader)?;
        if len > max_payload_bytes {
            return Err(AssetError::TooLarge {
                field: "payload",
                len,
                max: max_payload_bytes,
            });
        }
        let mut bytes = Vec::new();
        reader.take(len).read_to_end(&mut bytes)?;
        if (bytes.len() as u64) < len {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        let payload = serde_json::from_slice(&bytes)?;
        Ok(Self { metadata, payload })
    }

    pub fn write_to(&self, writer: &mut impl Write, version: AssetFileVersion) -> Result<(), AssetError> {
        self.metadata.write_to(writer, version)?;
        let bytes = serde_json::to_vec(&self.payload)?;
        writer.write_all(&(bytes.len() as u64).to_le_bytes())?;
        writer.write_all(&bytes)?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct LoadedAsset {
    pub metadata: AssetFileMetaData,
    pub object: MetaAny<'static>,
}

pub fn save_asset(obj: &MetaAny<'_>, name: &str, settings: &AssetSettings) -> Result<Vec<u8>, AssetError> {
    let ty = obj
        .try_get_type()
        .ok_or_else(|| AssetError::UnknownClass(obj.type_id().to_string()))?;

    let mut metadata = AssetFileMetaData::new(name, ty.name().as_str());
    metadata.version = settings.write_version;
    metadata.class_type_id = stable_class_id(ty);
    metadata.engine_version = settings.engine_version.clone();

    let file = AssetFile {
        metadata,
        payload: serialize(obj)?,
    };
    let mut bytes = Vec::new();
    file.write_to(&mut bytes, settings.write_version)?;
    tracing::debug!(asset = name, class = %ty.name(), bytes = bytes.len(), "saved asset");
    Ok(bytes)
}

/// Finds the class by name, or by header class id when the name is unknown.
fn resolve_class(metadata: &AssetFileMetaData, settings: &AssetSettings) -> Result<&'static MetaType, AssetError> {
    let manager = MetaManager::get();
    if let Some(ty) = manager.try_get_type_by_name(&metadata.class_name) {
        let expected = stable_class_id(ty);
        if settings.strict_class_check
            && metadata.version.has_class_type_id()
            && metadata.class_type_id != expected
        {
            return Err(AssetError::ClassMismatch {
                class: metadata.class_name.clone(),
                expected,
                found: metadata.class_type_id,
            });
        }
        return Ok(ty);
    }

    if metadata.version.has_class_type_id() {
        let id = metadata.class_type_id;
        let by_id = manager.try_get_type(id).or_else(|| {
            manager
                .each_type()
                .into_iter()
                .find(|ty| stable_class_id(ty) == id)
        });
        if let Some(ty) = by_id {
            tracing::warn!(
                asset = %metadata.name,
                class = %metadata.class_name,
                found = %ty.name(),
                "asset class resolved by type id"
            );
            return Ok(ty);
        }
    }
    Err(AssetError::UnknownClass(metadata.class_name.clone()))
}

pub fn load_asset(bytes: &[u8], settings: &AssetSettings) -> Result<LoadedAsset, AssetError> {
    let mut reader = bytes;
    let file = AssetFile::read_from(&mut reader, settings.max_payload_bytes)?;
    let ty = resolve_class(&file.metadata, settings)?;
    let object = deserialize_new(ty, &file.payload)?;
    tracing::debug!(
        asset = %file.metadata.name,
        class = %ty.name(),
        version = file.metadata.version.as_u32(),
        "loaded asset"
    );
    Ok(LoadedAsset {
        metadata: file.metadata,
        object,
    })
}

pub fn load_asset_file(path: impl AsRef<Path>, settings: &AssetSettings) -> Result<LoadedAsset, AssetError> {
    load_asset(&std::fs::read(path)?, settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use latch_meta::glam::Vec3;
    use latch_meta::{MetaTypeBuilder, Reflect};
    use serde_json::json;
    use std::mem::offset_of;

    #[derive(Clone, Default, Debug, PartialEq)]
    struct Crate {
        position: Vec3,
        label: String,
        health: i32,
    }

    impl Reflect for Crate {
        fn reflect() -> MetaType {
            MetaTypeBuilder::<Crate>::new("AssetFileCrate")
                .with_default()
                .with_clone()
                .field::<Vec3>("position", offset_of!(Crate, position))
                .field::<String>("label", offset_of!(Crate, label))
                .field::<i32>("health", offset_of!(Crate, health))
                .build()
        }
    }

    fn sample() -> Crate {
        Crate {
            position: Vec3::new(4.0, 0.0, -2.0),
            label: "supplies".into(),
            health: 75,
        }
    }

    #[test]
    fn save_then_load_every_version() {
        MetaManager::get().get_type::<Crate>();
        let value = sample();
        for version in AssetFileVersion::ALL {
            let settings = AssetSettings {
                write_version: version,
                ..Default::default()
            };
            let bytes = save_asset(&MetaAny::from_ref(&value), "crate_a", &settings).unwrap();
            let loaded = load_asset(&bytes, &settings).unwrap();
            assert_eq!(loaded.metadata.version, version);
            assert_eq!(loaded.metadata.class_name, "AssetFileCrate");
            assert_eq!(loaded.object.try_get::<Crate>(), Some(&value));
        }
    }

    #[test]
    fn class_checks() {
        MetaManager::get().get_type::<Crate>();
        let settings = AssetSettings::default();

        let mut metadata = AssetFileMetaData::new("crate_b", "AssetFileCrate");
        metadata.class_type_id = TypeId::from_raw(42);
        let file = AssetFile {
            metadata,
            payload: json!({ "health": 5 }),
        };
        let mut bytes = Vec::new();
        file.write_to(&mut bytes, AssetFileVersion::V4).unwrap();

        assert!(matches!(
            load_asset(&bytes, &settings),
            Err(AssetError::ClassMismatch { .. })
        ));
        let lenient = AssetSettings {
            strict_class_check: false,
            ..Default::default()
        };
        let loaded = load_asset(&bytes, &lenient).unwrap();
        assert_eq!(loaded.object.try_get::<Crate>().map(|c| c.health), Some(5));

        // class renamed since the file was written; the id still names the old class
        let mut metadata = AssetFileMetaData::new("crate_renamed", "AssetFileCrateRenamed");
        metadata.class_type_id = TypeId::from_name("AssetFileCrate");
        let file = AssetFile {
            metadata,
            payload: json!({ "health": 8 }),
        };
        let mut bytes = Vec::new();
        file.write_to(&mut bytes, AssetFileVersion::V4).unwrap();
        let loaded = load_asset(&bytes, &settings).unwrap();
        assert_eq!(loaded.object.try_get::<Crate>().map(|c| c.health), Some(8));

        let file = AssetFile {
            metadata: AssetFileMetaData::new("ghost", "AssetFileNoSuchClass"),
            payload: json!({}),
        };
        let mut bytes = Vec::new();
        file.write_to(&mut bytes, AssetFileVersion::V0).unwrap();
        assert!(matches!(
            load_asset(&bytes, &settings),
            Err(AssetError::UnknownClass(_))
        ));
    }

    #[test]
    fn payload_limits() {
        MetaManager::get().get_type::<Crate>();
        let value = sample();
        let bytes = save_asset(&MetaAny::from_ref(&value), "crate_c", &AssetSettings::default()).unwrap();

        let tiny = AssetSettings {
            max_payload_bytes: 8,
            ..Default::default()
        };
        assert!(matches!(
            load_asset(&bytes, &tiny),
            Err(AssetError::TooLarge { field: "payload", .. })
        ));
        assert!(load_asset(&bytes[..bytes.len() - 1], &AssetSettings::default()).is_err());
    }

    #[test]
    fn loads_from_disk() {
        MetaManager::get().get_type::<Crate>();
        let value = sample();
        let bytes = save_asset(&MetaAny::from_ref(&value), "crate_d", &AssetSettings::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crate_d.asset");
        std::fs::write(&path, bytes).unwrap();

        let loaded = load_asset_file(&path, &AssetSettings::default()).unwrap();
        assert_eq!(loaded.metadata.name, "crate_d");
        assert_eq!(loaded.object.try_get::<Crate>(), Some(&value));
    }
}
