// manager.rs - Process-wide registry of reflected types
//
// Registered types are leaked and live for the rest of the process. The lock
// is only held for map access, never while reflecting a type or running a
// function body.

use crate::builder::Reflect;
use crate::meta_type::MetaType;
use crate::name::Name;
use crate::type_id::{type_id_of, TypeId};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("type {name} ({type_id}) is already registered")]
    DuplicateType { name: String, type_id: TypeId },

    #[error("{name} derives from {base}, which is not registered")]
    UnknownBaseClass { name: String, base: TypeId },
}

#[derive(Default)]
struct Registry {
    by_id: HashMap<TypeId, &'static MetaType>,
    by_name: HashMap<Name, TypeId>,
}

pub struct MetaManager {
    registry: RwLock<Registry>,
}

static MANAGER: Lazy<MetaManager> = Lazy::new(|| MetaManager {
    registry: RwLock::new(Registry::default()),
});

impl MetaManager {
    pub fn get() -> &'static MetaManager {
        &MANAGER
    }

    pub fn try_get_type(&self, type_id: TypeId) -> Option<&'static MetaType> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .get(&type_id)
            .copied()
    }

    pub fn try_get_type_by_name(&self, name: &str) -> Option<&'static MetaType> {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        let id = registry.by_name.get(&Name::new(name))?;
        registry.by_id.get(id).copied()
    }

    /// The registered type for `T`, reflecting it on first use.
    ///
    /// Panics if `T::reflect()` produces a type that cannot be registered,
    /// e.g. one whose name is taken by another type.
    pub fn get_type<T: Reflect>(&self) -> &'static MetaType {
        let type_id = type_id_of::<T>();
        if let Some(ty) = self.try_get_type(type_id) {
            return ty;
        }

        let ty = T::reflect();
        debug_assert_eq!(
            ty.type_id(),
            type_id,
            "{}::reflect() described another type",
            std::any::type_name::<T>()
        );
        match self.add_type(ty) {
            Ok(ty) => ty,
            // Another thread reflected T first.
            Err(err) => match self.try_get_type(type_id) {
                Some(ty) => ty,
                None => panic!("failed to reflect {}: {err}", std::any::type_name::<T>()),
            },
        }
    }

    /// Registers `ty` and links it into its base classes' derived lists.
    pub fn add_type(&self, ty: MetaType) -> Result<&'static MetaType, RegistryError> {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);

        let type_id = ty.type_id();
        if registry.by_id.contains_key(&type_id) || registry.by_name.contains_key(ty.name()) {
            return Err(RegistryError::DuplicateType {
                name: ty.name().to_string(),
                type_id,
            });
        }
        if let Some(base) = ty
            .direct_bases()
            .iter()
            .find(|base| !registry.by_id.contains_key(&base.type_id))
        {
            return Err(RegistryError::UnknownBaseClass {
                name: ty.name().to_string(),
                base: base.type_id,
            });
        }

        let ty: &'static MetaType = Box::leak(Box::new(ty));
        registry.by_id.insert(type_id, ty);
        registry.by_name.insert(ty.name().clone(), type_id);
        for base in ty.direct_bases() {
            if let Some(base_type) = registry.by_id.get(&base.type_id) {
                base_type.add_derived_class(type_id);
            }
        }

        tracing::debug!(
            name = %ty.name(),
            type_id = %type_id,
            size = ty.type_info().size,
            fields = ty.fields().len(),
            "registered type"
        );
        Ok(ty)
    }

    /// Every registered type, sorted by name.
    pub fn each_type(&self) -> Vec<&'static MetaType> {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        let mut types: Vec<_> = registry.by_id.values().copied().collect();
        drop(registry);
        types.sort_by(|a, b| a.name().as_str().cmp(b.name().as_str()));
        types
    }

    pub fn type_count(&self) -> usize {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .len()
    }

    /// Offset to add to a `from` pointer to reach its `to` base.
    pub fn upcast_offset(&self, from: TypeId, to: TypeId) -> Option<usize> {
        if from == to {
            return Some(0);
        }
        self.try_get_type(from)?.base_offset_to(to)
    }

    /// Name for log messages.
    pub fn type_name_or_id(&self, type_id: TypeId) -> String {
        if type_id.is_none() {
            return "void".to_string();
        }
        match self.try_get_type(type_id) {
            Some(ty) => ty.name().to_string(),
            None => type_id.to_string(),
        }
    }
}
