// type_info.rs - Size, alignment and capability flags of a type
//
// Rust moves are bitwise, so every type is trivially move constructible.
// Move assignment is trivial only when the overwritten value needs no drop.

use crate::type_id::{type_id_of, TypeId};
use std::alloc::Layout;
use std::fmt;
use std::mem::{align_of, needs_drop, size_of};
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign};

/// Capability flags of a reflected type.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct TypeFlags(u16);

impl TypeFlags {
    pub const NONE: TypeFlags = TypeFlags(0);
    pub const DEFAULT_CONSTRUCTIBLE: TypeFlags = TypeFlags(1 << 0);
    pub const TRIVIALLY_DEFAULT_CONSTRUCTIBLE: TypeFlags = TypeFlags(1 << 1);
    pub const MOVE_CONSTRUCTIBLE: TypeFlags = TypeFlags(1 << 2);
    pub const TRIVIALLY_MOVE_CONSTRUCTIBLE: TypeFlags = TypeFlags(1 << 3);
    pub const COPY_CONSTRUCTIBLE: TypeFlags = TypeFlags(1 << 4);
    pub const TRIVIALLY_COPY_CONSTRUCTIBLE: TypeFlags = TypeFlags(1 << 5);
    pub const MOVE_ASSIGNABLE: TypeFlags = TypeFlags(1 << 6);
    pub const TRIVIALLY_MOVE_ASSIGNABLE: TypeFlags = TypeFlags(1 << 7);
    pub const COPY_ASSIGNABLE: TypeFlags = TypeFlags(1 << 8);
    pub const TRIVIALLY_COPY_ASSIGNABLE: TypeFlags = TypeFlags(1 << 9);
    pub const TRIVIALLY_DESTRUCTIBLE: TypeFlags = TypeFlags(1 << 10);
    pub const ALL: TypeFlags = TypeFlags((1 << 11) - 1);

    const NAMES: [(TypeFlags, &'static str); 11] = [
        (Self::DEFAULT_CONSTRUCTIBLE, "DEFAULT_CONSTRUCTIBLE"),
        (Self::TRIVIALLY_DEFAULT_CONSTRUCTIBLE, "TRIVIALLY_DEFAULT_CONSTRUCTIBLE"),
        (Self::MOVE_CONSTRUCTIBLE, "MOVE_CONSTRUCTIBLE"),
        (Self::TRIVIALLY_MOVE_CONSTRUCTIBLE, "TRIVIALLY_MOVE_CONSTRUCTIBLE"),
        (Self::COPY_CONSTRUCTIBLE, "COPY_CONSTRUCTIBLE"),
        (Self::TRIVIALLY_COPY_CONSTRUCTIBLE, "TRIVIALLY_COPY_CONSTRUCTIBLE"),
        (Self::MOVE_ASSIGNABLE, "MOVE_ASSIGNABLE"),
        (Self::TRIVIALLY_MOVE_ASSIGNABLE, "TRIVIALLY_MOVE_ASSIGNABLE"),
        (Self::COPY_ASSIGNABLE, "COPY_ASSIGNABLE"),
        (Self::TRIVIALLY_COPY_ASSIGNABLE, "TRIVIALLY_COPY_ASSIGNABLE"),
        (Self::TRIVIALLY_DESTRUCTIBLE, "TRIVIALLY_DESTRUCTIBLE"),
    ];

    #[inline]
    pub const fn bits(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn from_bits_truncate(bits: u16) -> Self {
        Self(bits & Self::ALL.0)
    }

    #[inline]
    pub const fn contains(self, other: TypeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn union(self, other: TypeFlags) -> Self {
        Self(self.0 | other.0)
    }

    #[inline]
    pub fn insert(&mut self, other: TypeFlags) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn remove(&mut self, other: TypeFlags) {
        self.0 &= !other.0;
    }

    #[inline]
    pub fn set(&mut self, other: TypeFlags, value: bool) {
        if value {
            self.insert(other);
        } else {
            self.remove(other);
        }
    }
}

impl BitAnd for TypeFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitAndAssign for TypeFlags {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl BitOr for TypeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for TypeFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for TypeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_set();
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                list.entry(&format_args!("{name}"));
            }
        }
        list.finish()
    }
}

/// Value description of a type: identity, layout and capabilities.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    pub type_id: TypeId,
    pub size: usize,
    pub align: usize,
    pub flags: TypeFlags,
}

impl TypeInfo {
    /// Description used by null handles and void returns.
    pub const VOID: TypeInfo = TypeInfo::new(TypeId::NONE, 0, 1, TypeFlags::NONE);

    pub const fn new(type_id: TypeId, size: usize, align: usize, flags: TypeFlags) -> Self {
        Self {
            type_id,
            size,
            align,
            flags,
        }
    }

    /// Layout and the capabilities Rust guarantees for every `T`.
    ///
    /// Default/copy capabilities depend on traits the type may not implement
    /// and are added by the builder.
    pub fn of<T: 'static>() -> Self {
        let mut flags = TypeFlags::MOVE_CONSTRUCTIBLE
            | TypeFlags::TRIVIALLY_MOVE_CONSTRUCTIBLE
            | TypeFlags::MOVE_ASSIGNABLE;
        if !needs_drop::<T>() {
            flags |= TypeFlags::TRIVIALLY_MOVE_ASSIGNABLE | TypeFlags::TRIVIALLY_DESTRUCTIBLE;
        }
        Self::new(type_id_of::<T>(), size_of::<T>(), align_of::<T>(), flags)
    }

    pub fn layout(&self) -> Option<Layout> {
        Layout::from_size_align(self.size, self.align).ok()
    }

    /// Uninitialized storage for one value. Zero-sized types get a dangling,
    /// well-aligned pointer.
    pub(crate) fn allocate(&self) -> *mut u8 {
        if self.size == 0 {
            return self.align.max(1) as *mut u8;
        }
        let Some(layout) = self.layout() else {
            panic!("invalid layout for {}: size {} align {}", self.type_id, self.size, self.align);
        };
        // SAFETY: layout has a non-zero size.
        let ptr = unsafe { std::alloc::alloc(layout) };
        if ptr.is_null() {
            std::alloc::handle_alloc_error(layout);
        }
        ptr
    }

    /// # Safety
    /// `ptr` must come from [`TypeInfo::allocate`] on an identical `TypeInfo`.
    pub(crate) unsafe fn deallocate(&self, ptr: *mut u8) {
        if self.size == 0 || ptr.is_null() {
            return;
        }
        if let Some(layout) = self.layout() {
            std::alloc::dealloc(ptr, layout);
        }
    }

    #[inline]
    pub fn is_default_constructible(&self) -> bool {
        self.flags.contains(TypeFlags::DEFAULT_CONSTRUCTIBLE)
    }

    #[inline]
    pub fn is_trivially_default_constructible(&self) -> bool {
        self.flags.contains(TypeFlags::TRIVIALLY_DEFAULT_CONSTRUCTIBLE)
    }

    #[inline]
    pub fn is_move_constructible(&self) -> bool {
        self.flags.contains(TypeFlags::MOVE_CONSTRUCTIBLE)
    }

    #[inline]
    pub fn is_trivially_move_constructible(&self) -> bool {
        self.flags.contains(TypeFlags::TRIVIALLY_MOVE_CONSTRUCTIBLE)
    }

    #[inline]
    pub fn is_copy_constructible(&self) -> bool {
        self.flags.contains(TypeFlags::COPY_CONSTRUCTIBLE)
    }

    #[inline]
    pub fn is_trivially_copy_constructible(&self) -> bool {
        self.flags.contains(TypeFlags::TRIVIALLY_COPY_CONSTRUCTIBLE)
    }

    #[inline]
    pub fn is_move_assignable(&self) -> bool {
        self.flags.contains(TypeFlags::MOVE_ASSIGNABLE)
    }

    #[inline]
    pub fn is_trivially_move_assignable(&self) -> bool {
        self.flags.contains(TypeFlags::TRIVIALLY_MOVE_ASSIGNABLE)
    }

    #[inline]
    pub fn is_copy_assignable(&self) -> bool {
        self.flags.contains(TypeFlags::COPY_ASSIGNABLE)
    }

    #[inline]
    pub fn is_trivially_copy_assignable(&self) -> bool {
        self.flags.contains(TypeFlags::TRIVIALLY_COPY_ASSIGNABLE)
    }

    #[inline]
    pub fn is_trivially_destructible(&self) -> bool {
        self.flags.contains(TypeFlags::TRIVIALLY_DESTRUCTIBLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_data_is_trivially_destructible() {
        let info = TypeInfo::of::<[f32; 3]>();
        assert_eq!(info.size, 12);
        assert_eq!(info.align, 4);
        assert!(info.is_trivially_destructible());
        assert!(info.is_trivially_move_assignable());
        assert!(!info.is_copy_constructible());
    }

    #[test]
    fn owning_types_need_destruction() {
        let info = TypeInfo::of::<String>();
        assert!(info.is_trivially_move_constructible());
        assert!(!info.is_trivially_destructible());
        assert!(!info.is_trivially_move_assignable());
    }

    #[test]
    fn flags_fold_with_and() {
        let a = TypeFlags::COPY_CONSTRUCTIBLE | TypeFlags::TRIVIALLY_DESTRUCTIBLE;
        let b = TypeFlags::COPY_CONSTRUCTIBLE | TypeFlags::MOVE_ASSIGNABLE;
        let folded = TypeFlags::ALL & a & b;
        assert_eq!(folded, TypeFlags::COPY_CONSTRUCTIBLE);
        assert!(!folded.contains(TypeFlags::TRIVIALLY_DESTRUCTIBLE));
    }
}
