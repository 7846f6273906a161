// startup.rs - Registering a list of types when the program starts

use crate::builder::Reflect;
use crate::manager::MetaManager;
use crate::meta_type::MetaType;

pub type ReflectFn = fn() -> &'static MetaType;

/// Reflects `T` if it is not registered yet.
pub fn reflect_entry<T: Reflect>() -> &'static MetaType {
    MetaManager::get().get_type::<T>()
}

/// Runs every entry in order and returns how many types were added.
pub fn reflect_at_startup(entries: &[ReflectFn]) -> usize {
    let manager = MetaManager::get();
    let before = manager.type_count();
    for entry in entries {
        entry();
    }
    let added = manager.type_count().saturating_sub(before);
    tracing::info!(entries = entries.len(), added, "startup reflection complete");
    added
}

/// Collects reflection entries from several subsystems before running them.
#[derive(Default)]
pub struct StartupReflection {
    entries: Vec<ReflectFn>,
}

impl StartupReflection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T: Reflect>(mut self) -> Self {
        self.push::<T>();
        self
    }

    pub fn push<T: Reflect>(&mut self) {
        self.entries.push(reflect_entry::<T>);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn run(&self) -> usize {
        reflect_at_startup(&self.entries)
    }
}

/// Reflects each listed type, returning how many were newly registered.
///
/// ```ignore
/// latch_meta::reflect_types!(Transform, Health, Inventory);
/// ```
#[macro_export]
macro_rules! reflect_types {
    ($($ty:ty),* $(,)?) => {
        $crate::startup::reflect_at_startup(&[
            $($crate::startup::reflect_entry::<$ty> as $crate::startup::ReflectFn),*
        ])
    };
}
