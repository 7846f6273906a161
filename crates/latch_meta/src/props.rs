// props.rs - Named metadata attached to types, fields and functions
//
// Values are stored as JSON text. A property can be present with no value
// (a tag); presence and value are independent.

use crate::name::Name;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;

/// Well-known property names.
pub mod names {
    /// May be used from scripts.
    pub const SCRIPTABLE: &str = "Scriptable";
    /// Not editable after construction.
    pub const READ_ONLY: &str = "ReadOnly";
    /// Hidden from editors and inspectors.
    pub const HIDDEN: &str = "Hidden";
    /// Type can be attached to entities and saved as an asset.
    pub const COMPONENT: &str = "Component";
    /// Serialization version of a type.
    pub const VERSION: &str = "Version";
    pub const DISPLAY_NAME: &str = "DisplayName";
    /// Type was declared at runtime by a script.
    pub const SCRIPTED: &str = "Scripted";
    /// JSON default value of a scripted field.
    pub const DEFAULT_VALUE: &str = "DefaultValue";
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetaProps {
    props: HashMap<Name, Option<String>>,
}

impl MetaProps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tag. An existing value is kept.
    pub fn add(&mut self, name: impl Into<Name>) -> &mut Self {
        self.props.entry(name.into()).or_insert(None);
        self
    }

    pub fn set<T: Serialize + ?Sized>(
        &mut self,
        name: impl Into<Name>,
        value: &T,
    ) -> Result<&mut Self, serde_json::Error> {
        let text = serde_json::to_string(value)?;
        self.props.insert(name.into(), Some(text));
        Ok(self)
    }

    /// Stores already serialized JSON text.
    pub fn set_raw(&mut self, name: impl Into<Name>, json: impl Into<String>) -> &mut Self {
        self.props.insert(name.into(), Some(json.into()));
        self
    }

    pub fn has(&self, name: &str) -> bool {
        self.props.contains_key(&Name::new(name))
    }

    /// `None` when the property is absent, has no value or does not decode as `T`.
    pub fn try_get_value<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let text = self.try_get_raw(name)?;
        serde_json::from_str(text).ok()
    }

    pub fn try_get_raw(&self, name: &str) -> Option<&str> {
        self.props.get(&Name::new(name))?.as_deref()
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.props.remove(&Name::new(name)).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, Option<&str>)> {
        self.props.iter().map(|(k, v)| (k, v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    /// Copies every property of `other` into `self`, overwriting on conflict.
    pub fn merge(&mut self, other: &MetaProps) {
        for (name, value) in &other.props {
            self.props.insert(name.clone(), value.clone());
        }
    }
}
