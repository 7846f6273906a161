// header.rs - Versioned asset file header
//
// Layout, little endian, strings as u32 length + UTF-8:
//   V0: magic, version, asset name, class name
//   V1: + guid (u128)
//   V2: + class type id (u32)
//   V4: + import origin (u8 present flag + string), engine version
// V3 was never shipped and is rejected.

use crate::error::AssetError;
use latch_meta::TypeId;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// "LTAS"
pub const ASSET_MAGIC: u32 = u32::from_le_bytes(*b"LTAS");

/// Longest string accepted in a header.
pub const MAX_HEADER_STRING: u32 = 64 * 1024;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum AssetFileVersion {
    V0,
    V1,
    V2,
    V4,
}

impl AssetFileVersion {
    pub const LATEST: AssetFileVersion = AssetFileVersion::V4;

    pub const ALL: [AssetFileVersion; 4] = [
        AssetFileVersion::V0,
        AssetFileVersion::V1,
        AssetFileVersion::V2,
        AssetFileVersion::V4,
    ];

    pub fn as_u32(self) -> u32 {
        match self {
            AssetFileVersion::V0 => 0,
            AssetFileVersion::V1 => 1,
            AssetFileVersion::V2 => 2,
            AssetFileVersion::V4 => 4,
        }
    }

    pub fn has_guid(self) -> bool {
        self >= AssetFileVersion::V1
    }

    pub fn has_class_type_id(self) -> bool {
        self >= AssetFileVersion::V2
    }

    pub fn has_import_info(self) -> bool {
        self >= AssetFileVersion::V4
    }
}

impl TryFrom<u32> for AssetFileVersion {
    type Error = AssetError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AssetFileVersion::V0),
            1 => Ok(AssetFileVersion::V1),
            2 => Ok(AssetFileVersion::V2),
            4 => Ok(AssetFileVersion::V4),
            other => Err(AssetError::UnsupportedVersion(other)),
        }
    }
}

impl From<AssetFileVersion> for u32 {
    fn from(version: AssetFileVersion) -> Self {
        version.as_u32()
    }
}

/// 128-bit FNV-1a of the asset name; the guid of headers older than V1.
pub const fn guid_from_name(name: &str) -> u128 {
    const OFFSET: u128 = 0x6c62272e07bb014262b821756295c58d;
    const PRIME: u128 = 0x0000000001000000000000000000013b;
    let bytes = name.as_bytes();
    let mut hash = OFFSET;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u128;
        hash = hash.wrapping_mul(PRIME);
        i += 1;
    }
    hash
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFileMetaData {
    /// Version the header was read with, or will be written with by default.
    pub version: AssetFileVersion,
    pub name: String,
    pub class_name: String,
    pub guid: u128,
    pub class_type_id: TypeId,
    pub import_origin: Option<String>,
    pub engine_version: String,
}

impl AssetFileMetaData {
    /// Header for a new asset; older-version fields get their defaults.
    pub fn new(name: impl Into<String>, class_name: impl Into<String>) -> Self {
        let name = name.into();
        let class_name = class_name.into();
        Self {
            version: AssetFileVersion::LATEST,
            guid: guid_from_name(&name),
            class_type_id: TypeId::from_name(&class_name),
            name,
            class_name,
            import_origin: None,
            engine_version: String::new(),
        }
    }

    pub fn read_from(reader: &mut impl Read) -> Result<Self, AssetError> {
        let magic = read_u32(reader)?;
        if magic != ASSET_MAGIC {
            return Err(AssetError::BadMagic(magic));
        }
        let version = AssetFileVersion::try_from(read_u32(reader)?)?;

        let name = read_string(reader, "asset name")?;
        let class_name = read_string(reader, "class name")?;
        let mut metadata = Self::new(name, class_name);
        metadata.version = version;

        if version.has_guid() {
            metadata.guid = read_u128(reader)?;
        }
        if version.has_class_type_id() {
            metadata.class_type_id = TypeId::from_raw(read_u32(reader)?);
        }
        if version.has_import_info() {
            let mut present = [0u8; 1];
            reader.read_exact(&mut present)?;
            if present[0] != 0 {
                metadata.import_origin = Some(read_string(reader, "import origin")?);
            }
            metadata.engine_version = read_string(reader, "engine version")?;
        }
        Ok(metadata)
    }

    /// Writes the header in `version`'s layout; fields that layout lacks are dropped.
    pub fn write_to(&self, writer: &mut impl Write, version: AssetFileVersion) -> Result<(), AssetError> {
        writer.write_all(&ASSET_MAGIC.to_le_bytes())?;
        writer.write_all(&version.as_u32().to_le_bytes())?;
        write_string(writer, &self.name)?;
        write_string(writer, &self.class_name)?;

        if version.has_guid() {
            writer.write_all(&self.guid.to_le_bytes())?;
        }
        if version.has_class_type_id() {
            writer.write_all(&self.class_type_id.raw().to_le_bytes())?;
        }
        if version.has_import_info() {
            match &self.import_origin {
                Some(origin) => {
                    writer.write_all(&[1])?;
                    write_string(writer, origin)?;
                }
                None => writer.write_all(&[0])?,
            }
            write_string(writer, &self.engine_version)?;
        }
        Ok(())
    }
}

pub(crate) fn read_u32(reader: &mut impl Read) -> Result<u32, AssetError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_u64(reader: &mut impl Read) -> Result<u64, AssetError> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_u128(reader: &mut impl Read) -> Result<u128, AssetError> {
    let mut buf = [0u8; 16];
    reader.read_exact(&mut buf)?;
    Ok(u128::from_le_bytes(buf))
}

fn read_string(reader: &mut impl Read, field: &'static str) -> Result<String, AssetError> {
    let len = read_u32(reader)?;
    if len > MAX_HEADER_STRING {
        return Err(AssetError::TooLarge {
            field,
            len: len.into(),
            max: MAX_HEADER_STRING.into(),
        });
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf)?;
    Ok(String::from_utf8(buf)?)
}

fn write_string(writer: &mut impl Write, value: &str) -> Result<(), AssetError> {
    let len = u32::try_from(value.len())
        .ok()
        .filter(|&len| len <= MAX_HEADER_STRING)
        .ok_or(AssetError::TooLarge {
            field: "header string",
            len: value.len() as u64,
            max: MAX_HEADER_STRING.into(),
        })?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> AssetFileMetaData {
        let mut metadata = AssetFileMetaData::new("Crate_01", "Transform");
        metadata.guid = 0x0123_4567_89ab_cdef_0011_2233_4455_6677;
        metadata.class_type_id = TypeId::from_raw(0xdead_beef);
        metadata.import_origin = Some("props/crate.gltf".into());
        metadata.engine_version = "0.1.0".into();
        metadata
    }

    fn round_trip(metadata: &AssetFileMetaData, version: AssetFileVersion) -> AssetFileMetaData {
        let mut bytes = Vec::new();
        metadata.write_to(&mut bytes, version).unwrap();
        AssetFileMetaData::read_from(&mut Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn latest_keeps_every_field() {
        let metadata = sample();
        assert_eq!(round_trip(&metadata, AssetFileVersion::V4), metadata);
    }

    #[test]
    fn older_versions_fill_defaults() {
        let metadata = sample();

        let v0 = round_trip(&metadata, AssetFileVersion::V0);
        assert_eq!(v0.version, AssetFileVersion::V0);
        assert_eq!(v0.name, "Crate_01");
        assert_eq!(v0.guid, guid_from_name("Crate_01"));
        assert_eq!(v0.class_type_id, TypeId::from_name("Transform"));
        assert_eq!(v0.import_origin, None);

        let v1 = round_trip(&metadata, AssetFileVersion::V1);
        assert_eq!(v1.guid, metadata.guid);
        assert_eq!(v1.class_type_id, TypeId::from_name("Transform"));

        let v2 = round_trip(&metadata, AssetFileVersion::V2);
        assert_eq!(v2.class_type_id, metadata.class_type_id);
        assert!(v2.engine_version.is_empty());
    }

    #[test]
    fn version_three_is_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&ASSET_MAGIC.to_le_bytes());
        bytes.extend_from_slice(&3u32.to_le_bytes());
        assert!(matches!(
            AssetFileMetaData::read_from(&mut Cursor::new(bytes)),
            Err(AssetError::UnsupportedVersion(3))
        ));
    }

    #[test]
    fn malformed_headers_fail() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"NOPE");
        assert!(matches!(
            AssetFileMetaData::read_from(&mut Cursor::new(bytes)),
            Err(AssetError::BadMagic(_))
        ));

        let mut bytes = Vec::new();
        sample().write_to(&mut bytes, AssetFileVersion::V4).unwrap();
        bytes.truncate(bytes.len() - 2);
        assert!(matches!(
            AssetFileMetaData::read_from(&mut Cursor::new(bytes)),
            Err(AssetError::Io(_))
        ));

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&ASSET_MAGIC.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&[0xff, 0xfe]);
        assert!(matches!(
            AssetFileMetaData::read_from(&mut Cursor::new(bytes)),
            Err(AssetError::InvalidUtf8(_))
        ));
    }

    #[test]
    fn version_serde_uses_numbers() {
        assert_eq!(serde_json::to_string(&AssetFileVersion::V4).unwrap(), "4");
        assert_eq!(
            serde_json::from_str::<AssetFileVersion>("2").unwrap(),
            AssetFileVersion::V2
        );
        assert!(serde_json::from_str::<AssetFileVersion>("3").is_err());
    }
}
