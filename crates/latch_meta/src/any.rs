// any.rs - Type-erased value handle
//
// A MetaAny either owns a heap allocation (and destroys it through the
// registered type on drop) or borrows memory for the lifetime 'a.

use crate::func_result::FuncError;
use crate::manager::MetaManager;
use crate::meta_type::MetaType;
use crate::type_id::{type_id_of, TypeId};
use crate::type_info::TypeInfo;
use crate::Reflect;
use std::fmt;
use std::marker::PhantomData;
use std::mem::{self, ManuallyDrop};
use std::ptr;

const OWNING: u8 = 1 << 0;
const CONST: u8 = 1 << 1;

/// A value of any reflected type, owned or borrowed.
pub struct MetaAny<'a> {
    info: TypeInfo,
    data: *mut u8,
    flags: u8,
    _marker: PhantomData<&'a mut ()>,
}

impl MetaAny<'static> {
    /// Moves `value` into a new owning handle. Reflects `T` if needed.
    pub fn new<T: Reflect>(value: T) -> Self {
        let ty = MetaManager::get().get_type::<T>();
        let data = ty.malloc();
        // SAFETY: `data` was allocated with T's size and alignment.
        unsafe { ptr::write(data as *mut T, value) };
        Self {
            info: *ty.type_info(),
            data,
            flags: OWNING,
            _marker: PhantomData,
        }
    }
}

impl<'a> MetaAny<'a> {
    pub fn null() -> Self {
        Self {
            info: TypeInfo::VOID,
            data: ptr::null_mut(),
            flags: 0,
            _marker: PhantomData,
        }
    }

    /// Borrows `value` as const.
    pub fn from_ref<T: 'static>(value: &'a T) -> Self {
        Self {
            info: info_for::<T>(),
            data: value as *const T as *mut u8,
            flags: CONST,
            _marker: PhantomData,
        }
    }

    /// Borrows `value` mutably.
    pub fn from_mut<T: 'static>(value: &'a mut T) -> Self {
        Self {
            info: info_for::<T>(),
            data: value as *mut T as *mut u8,
            flags: 0,
            _marker: PhantomData,
        }
    }

    /// # Safety
    /// `data` must be null or point to a live value described by `info` that
    /// outlives `'a`. When `owning`, it must come from the registered type's
    /// `malloc` and nothing else may free it.
    pub unsafe fn from_raw_parts(info: TypeInfo, data: *mut u8, owning: bool, is_const: bool) -> Self {
        let mut flags = 0;
        if owning {
            flags |= OWNING;
        }
        if is_const {
            flags |= CONST;
        }
        Self {
            info,
            data,
            flags,
            _marker: PhantomData,
        }
    }

    /// Takes the value out of `self`, leaving a null, non-owning handle behind.
    pub fn take_handle(&mut self) -> MetaAny<'a> {
        mem::replace(self, MetaAny::null())
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.info.type_id
    }

    #[inline]
    pub fn type_info(&self) -> &TypeInfo {
        &self.info
    }

    #[inline]
    pub fn is_owner(&self) -> bool {
        self.flags & OWNING != 0
    }

    #[inline]
    pub fn is_const(&self) -> bool {
        self.flags & CONST != 0
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.data.is_null()
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.data
    }

    /// Null for const handles.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        if self.is_const() {
            ptr::null_mut()
        } else {
            self.data
        }
    }

    pub fn try_get_type(&self) -> Option<&'static MetaType> {
        MetaManager::get().try_get_type(self.info.type_id)
    }

    pub fn is_exactly(&self, type_id: TypeId) -> bool {
        self.info.type_id == type_id
    }

    pub fn is_derived_from(&self, type_id: TypeId) -> bool {
        match self.try_get_type() {
            Some(ty) => ty.is_derived_from(type_id),
            None => self.is_exactly(type_id),
        }
    }

    fn offset_to<T: 'static>(&self) -> Option<usize> {
        if self.is_null() {
            return None;
        }
        let target = type_id_of::<T>();
        if self.info.type_id == target {
            Some(0)
        } else {
            MetaManager::get().upcast_offset(self.info.type_id, target)
        }
    }

    /// Views the value as `T`, or as its base class `T`.
    pub fn try_get<T: 'static>(&self) -> Option<&T> {
        let offset = self.offset_to::<T>()?;
        // SAFETY: the type id (or the registered base offset) says a T lives there.
        unsafe { Some(&*(self.data.add(offset) as *const T)) }
    }

    /// `None` for const handles.
    pub fn try_get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        if self.is_const() {
            return None;
        }
        let offset = self.offset_to::<T>()?;
        // SAFETY: as in `try_get`, and the handle grants mutable access.
        unsafe { Some(&mut *(self.data.add(offset) as *mut T)) }
    }

    /// Moves the owned value out. Fails (returning `self`) for borrowed handles
    /// and for any type other than exactly `T`.
    pub fn take<T: 'static>(self) -> Result<T, Self> {
        if !self.is_owner() || self.is_null() || self.info.type_id != type_id_of::<T>() {
            return Err(self);
        }
        let this = ManuallyDrop::new(self);
        // SAFETY: exact type match on an owned allocation; the storage is
        // freed below without running the destructor.
        unsafe {
            let value = ptr::read(this.data as *const T);
            this.info.deallocate(this.data);
            Ok(value)
        }
    }

    /// Non-owning, const view of the same value.
    pub fn as_ref(&self) -> MetaAny<'_> {
        MetaAny {
            info: self.info,
            data: self.data,
            flags: CONST,
            _marker: PhantomData,
        }
    }

    /// Non-owning view of the same value. Stays const if `self` is const.
    pub fn as_mut(&mut self) -> MetaAny<'_> {
        MetaAny {
            info: self.info,
            data: self.data,
            flags: self.flags & CONST,
            _marker: PhantomData,
        }
    }

    /// Gives up ownership: returns the raw parts without destroying anything.
    pub fn release(self) -> (TypeInfo, *mut u8, bool) {
        let this = ManuallyDrop::new(self);
        (this.info, this.data, this.is_owner())
    }

    /// Frees the storage of a value that was moved out bitwise, without
    /// running its destructor, and leaves `self` null.
    ///
    /// # Safety
    /// The payload must already have been moved out.
    pub(crate) unsafe fn release_consumed(&mut self) {
        if self.is_owner() && !self.is_null() {
            self.info.deallocate(self.data);
        }
        let _ = ManuallyDrop::new(mem::replace(self, MetaAny::null()));
    }

    /// Copy assignment. Same type assigns in place; a different type replaces
    /// the payload, which only owning (or null) handles allow.
    pub fn assign(&mut self, other: &MetaAny<'_>) -> Result<(), FuncError> {
        if self.is_const() {
            return Err(FuncError::AssignToConst);
        }
        if !self.is_null() && !other.is_null() && self.type_id() == other.type_id() {
            let ty = self.registered_type()?;
            // SAFETY: both handles hold live values of `ty`.
            return unsafe { ty.copy_assign(self.data, other.data) };
        }
        self.assign_generic(other)
    }

    fn assign_generic(&mut self, other: &MetaAny<'_>) -> Result<(), FuncError> {
        if !self.is_null() && !self.is_owner() {
            return Err(FuncError::AssignToBorrowed);
        }
        let replacement = if other.is_null() {
            MetaAny::null()
        } else {
            let ty = other.registered_type()?;
            // SAFETY: `other` holds a live value of `ty`.
            unsafe { ty.copy_new(other.data)? }
        };
        // The old payload drops only after the copy succeeded.
        drop(mem::replace(self, replacement));
        Ok(())
    }

    /// Move assignment. A borrowed `other` is copied instead, since moving out
    /// of it would leave its owner with a moved-from value.
    pub fn assign_moved(&mut self, mut other: MetaAny<'a>) -> Result<(), FuncError> {
        if self.is_const() {
            return Err(FuncError::AssignToConst);
        }
        if !other.is_owner() {
            return self.assign(&other);
        }
        if !self.is_null() && self.type_id() == other.type_id() {
            let ty = self.registered_type()?;
            // SAFETY: both live values of `ty`; `other` is consumed right after.
            unsafe {
                ty.move_assign(self.data, other.data)?;
                other.release_consumed();
            }
            return Ok(());
        }
        if !self.is_null() && !self.is_owner() {
            return Err(FuncError::AssignToBorrowed);
        }
        drop(mem::replace(self, other));
        Ok(())
    }

    fn registered_type(&self) -> Result<&'static MetaType, FuncError> {
        self.try_get_type()
            .ok_or(FuncError::TypeNotRegistered(self.info.type_id))
    }

    fn destruct_and_free(&mut self) {
        if !self.is_owner() || self.is_null() {
            return;
        }
        match self.try_get_type() {
            // SAFETY: owned allocation from `ty.malloc()` holding a live value.
            Some(ty) => unsafe { ty.destruct(self.data, true) },
            None => tracing::error!(
                type_id = %self.info.type_id,
                size = self.info.size,
                "type of owned MetaAny is not registered, leaking its storage"
            ),
        }
    }
}

impl Drop for MetaAny<'_> {
    fn drop(&mut self) {
        self.destruct_and_free();
    }
}

impl Default for MetaAny<'_> {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Debug for MetaAny<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaAny")
            .field("type", &MetaManager::get().type_name_or_id(self.info.type_id))
            .field("data", &self.data)
            .field("owning", &self.is_owner())
            .field("const", &self.is_const())
            .finish()
    }
}

fn info_for<T: 'static>() -> TypeInfo {
    match MetaManager::get().try_get_type(type_id_of::<T>()) {
        Some(ty) => *ty.type_info(),
        None => TypeInfo::of::<T>(),
    }
}
