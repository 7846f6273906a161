// registry.rs - Loaded assets addressed by handle

use crate::file::LoadedAsset;
use std::collections::HashMap;

/// Asset handle (opaque ID)
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct AssetHandle(u64);

/// Loaded assets, keyed by handle and by guid
pub struct AssetRegistry {
    next_id: u64,
    assets: HashMap<AssetHandle, LoadedAsset>,
    by_guid: HashMap<u128, AssetHandle>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            assets: HashMap::new(),
            by_guid: HashMap::new(),
        }
    }

    /// Adds `asset`. An asset with the same guid is replaced and keeps its handle.
    pub fn register(&mut self, asset: LoadedAsset) -> AssetHandle {
        let guid = asset.metadata.guid;
        if let Some(&handle) = self.by_guid.get(&guid) {
            tracing::debug!(asset = %asset.metadata.name, "replacing loaded asset");
            self.assets.insert(handle, asset);
            return handle;
        }

        let handle = AssetHandle(self.next_id);
        self.next_id += 1;
        self.by_guid.insert(guid, handle);
        self.assets.insert(handle, asset);
        handle
    }

    pub fn get(&self, handle: AssetHandle) -> Option<&LoadedAsset> {
        self.assets.get(&handle)
    }

    pub fn get_mut(&mut self, handle: AssetHandle) -> Option<&mut LoadedAsset> {
        self.assets.get_mut(&handle)
    }

    pub fn find_by_guid(&self, guid: u128) -> Option<AssetHandle> {
        self.by_guid.get(&guid).copied()
    }

    pub fn remove(&mut self, handle: AssetHandle) -> Option<LoadedAsset> {
        let asset = self.assets.remove(&handle)?;
        self.by_guid.remove(&asset.metadata.guid);
        Some(asset)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl Default for AssetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::AssetFileMetaData;
    use latch_meta::{MetaAny, MetaManager};

    fn asset(name: &str, value: i32) -> LoadedAsset {
        latch_meta::reflect_builtins();
        MetaManager::get().get_type::<i32>();
        LoadedAsset {
            metadata: AssetFileMetaData::new(name, "i32"),
            object: MetaAny::new(value),
        }
    }

    #[test]
    fn handles_are_stable_per_guid() {
        let mut registry = AssetRegistry::new();
        let a = registry.register(asset("a", 1));
        let b = registry.register(asset("b", 2));
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);

        let again = registry.register(asset("a", 3));
        assert_eq!(again, a);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(a).unwrap().object.try_get::<i32>(), Some(&3));

        let guid = registry.get(b).unwrap().metadata.guid;
        assert_eq!(registry.find_by_guid(guid), Some(b));
        assert!(registry.remove(b).is_some());
        assert!(registry.find_by_guid(guid).is_none());
        assert!(registry.get(b).is_none());
    }
}
