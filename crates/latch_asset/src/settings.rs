//! Asset settings

use crate::error::AssetError;
use crate::header::AssetFileVersion;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for saving and loading assets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetSettings {
    /// Header version written by the saver.
    pub write_version: AssetFileVersion,
    /// Stamped into V4 headers.
    pub engine_version: String,
    /// Reject assets whose header class id disagrees with the class name.
    pub strict_class_check: bool,
    pub max_payload_bytes: u64,
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            write_version: AssetFileVersion::LATEST,
            engine_version: latch_meta::VERSION.to_string(),
            strict_class_check: true,
            max_payload_bytes: 64 * 1024 * 1024,
        }
    }
}

impl AssetSettings {
    pub fn from_json(json: &str) -> Result<Self, AssetError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, AssetError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let settings = Self::from_json(&std::fs::read_to_string(path)?)?;
        tracing::debug!(path = %path.display(), ?settings, "loaded asset settings");
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_keys_use_defaults() {
        let settings = AssetSettings::from_json(r#"{ "write_version": 2 }"#).unwrap();
        assert_eq!(settings.write_version, AssetFileVersion::V2);
        assert!(settings.strict_class_check);
        assert_eq!(settings.max_payload_bytes, 64 * 1024 * 1024);
    }

    #[test]
    fn loads_from_file() {
        let settings = AssetSettings {
            strict_class_check: false,
            engine_version: "test".into(),
            ..Default::default()
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(settings.to_json().unwrap().as_bytes()).unwrap();

        assert_eq!(AssetSettings::load(file.path()).unwrap(), settings);
        assert!(AssetSettings::from_json(r#"{ "write_version": 3 }"#).is_err());
    }
}
