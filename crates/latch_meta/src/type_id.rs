// type_id.rs - Runtime type identity
//
// Native types hash their `std::any::TypeId`, which is stable for one process
// run. Script-declared types hash their name instead so the id survives across
// builds and can be written into asset headers.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Opaque 32-bit identity of a reflected (or reflectable) type.
///
/// Two values are the same type iff their ids are equal.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(u32);

impl TypeId {
    /// Identity of "no type": void returns and null handles.
    pub const NONE: TypeId = TypeId(0);

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Stable id derived from a type name. Used for script-declared types.
    pub const fn from_name(name: &str) -> Self {
        Self::non_zero(fnv1a_extend(FNV_OFFSET_BASIS, name.as_bytes()))
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    const fn non_zero(raw: u32) -> Self {
        if raw == 0 {
            Self(1)
        } else {
            Self(raw)
        }
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({:#010x})", self.0)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Id of a native Rust type. Stable for the lifetime of the process only.
pub fn type_id_of<T: ?Sized + 'static>() -> TypeId {
    let mut hasher = DefaultHasher::new();
    std::any::TypeId::of::<T>().hash(&mut hasher);
    let h = hasher.finish();
    TypeId::non_zero((h as u32) ^ ((h >> 32) as u32))
}

/// 32-bit FNV-1a over `bytes`, continuing from `hash`.
pub(crate) const fn fnv1a_extend(mut hash: u32, bytes: &[u8]) -> u32 {
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

pub(crate) const fn fnv1a(bytes: &[u8]) -> u32 {
    fnv1a_extend(FNV_OFFSET_BASIS, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_ids_are_deterministic_and_distinct() {
        assert_eq!(type_id_of::<u32>(), type_id_of::<u32>());
        assert_ne!(type_id_of::<u32>(), type_id_of::<i32>());
        assert!(!type_id_of::<String>().is_none());
    }

    #[test]
    fn name_ids_are_stable() {
        // FNV-1a("a") is a well known constant.
        assert_eq!(fnv1a(b"a"), 0xe40c_292c);
        assert_eq!(TypeId::from_name("Health"), TypeId::from_name("Health"));
        assert_ne!(TypeId::from_name("Health"), TypeId::from_name("Armor"));
    }
}
