// factory.rs - Component factories built from reflected types
//
// Every registered type tagged as a component gets a factory that can
// default-construct it and move it in and out of JSON.

use crate::error::AssetError;
use latch_meta::props::names;
use latch_meta::serialization::{deserialize_into, deserialize_new, serialize};
use latch_meta::{MetaAny, MetaArgs, MetaManager, MetaType, TypeId};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct ComponentFactory {
    ty: &'static MetaType,
}

impl ComponentFactory {
    pub fn new(ty: &'static MetaType) -> Result<Self, AssetError> {
        if !ty.props().has(names::COMPONENT) {
            return Err(AssetError::NotAComponent(ty.name().to_string()));
        }
        Ok(Self { ty })
    }

    pub fn meta_type(&self) -> &'static MetaType {
        self.ty
    }

    pub fn type_name(&self) -> &str {
        self.ty.name().as_str()
    }

    pub fn construct_default(&self) -> Result<MetaAny<'static>, AssetError> {
        Ok(self.ty.construct(&mut MetaArgs::new())?)
    }

    pub fn save(&self, component: &MetaAny<'_>) -> Result<Value, AssetError> {
        if !component.is_derived_from(self.ty.type_id()) {
            return Err(AssetError::NotAComponent(format!(
                "{} value passed to the {} factory",
                MetaManager::get().type_name_or_id(component.type_id()),
                self.type_name()
            )));
        }
        Ok(serialize(component)?)
    }

    pub fn load(&self, json: &Value) -> Result<MetaAny<'static>, AssetError> {
        Ok(deserialize_new(self.ty, json)?)
    }

    /// Overwrites an existing component; keys missing from `json` keep their value.
    pub fn load_into(&self, component: &mut MetaAny<'_>, json: &Value) -> Result<(), AssetError> {
        Ok(deserialize_into(component, json)?)
    }
}

#[derive(Debug, Default)]
pub struct ComponentFactoryRegistry {
    factories: HashMap<TypeId, ComponentFactory>,
    by_name: HashMap<String, TypeId>,
}

impl ComponentFactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory for every registered component type.
    pub fn from_manager() -> Self {
        let mut registry = Self::new();
        for ty in MetaManager::get().each_type() {
            if ty.props().has(names::COMPONENT) {
                registry.insert(ComponentFactory { ty });
            }
        }
        tracing::debug!(count = registry.len(), "built component factories");
        registry
    }

    pub fn insert(&mut self, factory: ComponentFactory) {
        self.by_name
            .insert(factory.type_name().to_string(), factory.ty.type_id());
        self.factories.insert(factory.ty.type_id(), factory);
    }

    pub fn get(&self, type_id: TypeId) -> Option<&ComponentFactory> {
        self.factories.get(&type_id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&ComponentFactory> {
        self.factories.get(self.by_name.get(name)?)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Type names of every factory, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latch_meta::{MetaTypeBuilder, Reflect};
    use serde_json::json;
    use std::mem::offset_of;

    #[derive(Clone, Default, Debug, PartialEq)]
    struct Health {
        current: f32,
        max: f32,
    }

    impl Reflect for Health {
        fn reflect() -> MetaType {
            MetaTypeBuilder::<Health>::new("FactoryHealth")
                .with_default()
                .with_clone()
                .component()
                .field::<f32>("current", offset_of!(Health, current))
                .field::<f32>("max", offset_of!(Health, max))
                .build()
        }
    }

    #[derive(Clone, Default)]
    struct NotComponent;

    impl Reflect for NotComponent {
        fn reflect() -> MetaType {
            MetaTypeBuilder::<NotComponent>::new("FactoryNotComponent")
                .with_default()
                .build()
        }
    }

    #[test]
    fn collects_tagged_types() {
        let manager = MetaManager::get();
        let health = manager.get_type::<Health>();
        manager.get_type::<NotComponent>();

        let registry = ComponentFactoryRegistry::from_manager();
        assert!(registry.get(health.type_id()).is_some());
        assert!(registry.get_by_name("FactoryHealth").is_some());
        assert!(registry.get_by_name("FactoryNotComponent").is_none());
        assert!(registry.type_names().contains(&"FactoryHealth"));
        assert!(matches!(
            ComponentFactory::new(manager.get_type::<NotComponent>()),
            Err(AssetError::NotAComponent(_))
        ));
    }

    #[test]
    fn factory_round_trip() {
        let factory = ComponentFactory::new(MetaManager::get().get_type::<Health>()).unwrap();

        let fresh = factory.construct_default().unwrap();
        assert_eq!(fresh.try_get::<Health>(), Some(&Health::default()));

        let value = Health {
            current: 40.0,
            max: 100.0,
        };
        let json = factory.save(&MetaAny::from_ref(&value)).unwrap();
        assert_eq!(json, json!({ "current": 40.0, "max": 100.0 }));
        let loaded = factory.load(&json).unwrap();
        assert_eq!(loaded.try_get::<Health>(), Some(&value));

        let mut existing = factory.construct_default().unwrap();
        factory.load_into(&mut existing, &json!({ "max": 50.0 })).unwrap();
        assert_eq!(existing.try_get::<Health>().map(|h| h.max), Some(50.0));

        assert!(factory.save(&MetaAny::new(1.0f32)).is_err());
    }
}
