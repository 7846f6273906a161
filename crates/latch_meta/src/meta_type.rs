// meta_type.rs - Reflected description of one type
//
// Base and derived classes are referenced by TypeId and resolved through the
// MetaManager, so a MetaType value can be moved freely without patching links.

use crate::any::MetaAny;
use crate::field::MetaField;
use crate::func::{FuncId, MetaArgs, MetaFunc, NameOrOperator, OperatorType, RvoBuffer};
use crate::func_result::{FuncError, FuncResult};
use crate::manager::MetaManager;
use crate::name::Name;
use crate::props::MetaProps;
use crate::special_member::SpecialMember;
use crate::type_id::TypeId;
use crate::type_info::{TypeFlags, TypeInfo};
use crate::type_traits::TypeForm;
use std::collections::HashMap;
use std::fmt;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

/// A direct base class and where it lives inside the derived type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BaseClass {
    pub type_id: TypeId,
    pub offset: usize,
}

pub struct MetaType {
    info: TypeInfo,
    name: Name,
    fields: Vec<MetaField>,
    funcs: HashMap<NameOrOperator, Vec<MetaFunc>>,
    func_order: Vec<NameOrOperator>,
    bases: Vec<BaseClass>,
    derived: RwLock<Vec<TypeId>>,
    props: MetaProps,
    defined: AtomicBool,
}

impl MetaType {
    pub fn new(name: impl Into<Name>, info: TypeInfo) -> Self {
        Self {
            info,
            name: name.into(),
            fields: Vec::new(),
            funcs: HashMap::new(),
            func_order: Vec::new(),
            bases: Vec::new(),
            derived: RwLock::new(Vec::new()),
            props: MetaProps::new(),
            defined: AtomicBool::new(true),
        }
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
    pub fn name(&self) -> &Name {
        &self.name
    }

    #[inline]
    pub fn props(&self) -> &MetaProps {
        &self.props
    }

    #[inline]
    pub fn props_mut(&mut self) -> &mut MetaProps {
        &mut self.props
    }

    pub fn set_flag(&mut self, flag: TypeFlags, value: bool) {
        self.info.flags.set(flag, value);
    }

    /// False for script types between declaration and definition.
    pub fn is_defined(&self) -> bool {
        self.defined.load(Ordering::Acquire)
    }

    pub(crate) fn set_defined(&self, defined: bool) {
        self.defined.store(defined, Ordering::Release);
    }

    #[track_caller]
    fn assert_defined(&self) {
        if !self.is_defined() {
            panic!(
                "{} was declared but is not yet defined; it cannot be constructed, assigned or destroyed",
                self.name
            );
        }
    }

    // ---- Definition ----

    pub fn add_field(&mut self, field: MetaField) -> &mut MetaField {
        debug_assert!(
            self.fields.iter().all(|f| f.name() != field.name()),
            "{} already has a field named {}",
            self.name,
            field.name()
        );
        self.fields.push(field);
        let last = self.fields.len() - 1;
        &mut self.fields[last]
    }

    pub fn add_func(&mut self, func: MetaFunc) -> &mut MetaFunc {
        let key = func.name_or_op().clone();
        if !self.funcs.contains_key(&key) {
            self.func_order.push(key.clone());
        }
        let overloads = self.funcs.entry(key).or_default();
        overloads.push(func);
        let last = overloads.len() - 1;
        &mut overloads[last]
    }

    pub fn add_base_class(&mut self, base: BaseClass) {
        debug_assert!(
            self.bases.iter().all(|b| b.type_id != base.type_id),
            "{} already derives from {}",
            self.name,
            base.type_id
        );
        self.bases.push(base);
    }

    pub(crate) fn fields_mut(&mut self) -> &mut [MetaField] {
        &mut self.fields
    }

    pub(crate) fn funcs_mut(&mut self, name: &NameOrOperator) -> Option<&mut Vec<MetaFunc>> {
        self.funcs.get_mut(name)
    }

    pub(crate) fn add_derived_class(&self, derived: TypeId) {
        let mut list = self.derived.write().unwrap_or_else(PoisonError::into_inner);
        if !list.contains(&derived) {
            list.push(derived);
        }
    }

    // ---- Lookup ----

    /// Own fields, in declaration order.
    pub fn fields(&self) -> &[MetaField] {
        &self.fields
    }

    pub fn direct_bases(&self) -> &[BaseClass] {
        &self.bases
    }

    pub fn direct_derived(&self) -> Vec<TypeId> {
        self.derived
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn base_types(&self) -> impl Iterator<Item = (&BaseClass, &'static MetaType)> + '_ {
        let manager = MetaManager::get();
        self.bases.iter().filter_map(move |base| {
            let ty = manager.try_get_type(base.type_id);
            if ty.is_none() {
                tracing::warn!(
                    ty = %self.name,
                    base = %base.type_id,
                    "base class is not registered"
                );
            }
            ty.map(|ty| (base, ty))
        })
    }

    /// Own fields first, then base classes depth-first.
    pub fn try_get_field(&self, name: &str) -> Option<&MetaField> {
        if let Some(field) = self.fields.iter().find(|f| f.name() == name) {
            return Some(field);
        }
        self.base_types().find_map(|(_, base)| base.try_get_field(name))
    }

    /// First overload of `name`, searching own functions then bases.
    pub fn try_get_func(&self, name: impl Into<NameOrOperator>) -> Option<&MetaFunc> {
        self.try_get_funcs(name).into_iter().next()
    }

    /// All overloads of `name`: own first, then base classes depth-first.
    /// Constructors, assignment and destructors are never inherited.
    pub fn try_get_funcs(&self, name: impl Into<NameOrOperator>) -> Vec<&MetaFunc> {
        let name = name.into();
        let mut found = Vec::new();
        self.collect_funcs(&name, &mut found);
        found
    }

    fn collect_funcs<'s>(&'s self, name: &NameOrOperator, out: &mut Vec<&'s MetaFunc>) {
        if let Some(overloads) = self.funcs.get(name) {
            out.extend(overloads.iter());
        }
        if name.as_operator().is_some_and(OperatorType::is_special_member) {
            return;
        }
        for (_, base) in self.base_types() {
            base.collect_funcs(name, out);
        }
    }

    /// Own overloads only.
    pub fn try_get_own_funcs(&self, name: impl Into<NameOrOperator>) -> &[MetaFunc] {
        let name: NameOrOperator = name.into();
        self.funcs.get(&name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn try_get_func_by_id(&self, name: impl Into<NameOrOperator>, id: FuncId) -> Option<&MetaFunc> {
        self.try_get_funcs(name)
            .into_iter()
            .find(|f| f.func_id() == id)
    }

    pub(crate) fn try_get_own_func_by_id(&self, name: &NameOrOperator, id: FuncId) -> Option<&MetaFunc> {
        self.funcs.get(name)?.iter().find(|f| f.func_id() == id)
    }

    pub fn special_member(&self, member: SpecialMember) -> Option<&MetaFunc> {
        self.try_get_own_func_by_id(&member.operator().into(), member.func_id(self.type_id()))
    }

    /// Every field including inherited ones, base classes first, with its
    /// offset from the start of `self`.
    pub fn each_field_with_offsets(&self) -> Vec<(usize, &MetaField)> {
        let mut out = Vec::new();
        self.collect_fields(0, &mut out);
        out
    }

    fn collect_fields<'s>(&'s self, offset: usize, out: &mut Vec<(usize, &'s MetaField)>) {
        for (base, ty) in self.base_types() {
            ty.collect_fields(offset + base.offset, out);
        }
        out.extend(self.fields.iter().map(|f| (offset + f.offset(), f)));
    }

    /// Every field including inherited ones, base classes first.
    pub fn each_field(&self) -> Vec<&MetaField> {
        self.each_field_with_offsets()
            .into_iter()
            .map(|(_, f)| f)
            .collect()
    }

    /// Every function including inherited ones, base classes first. Special
    /// members of base classes are left out.
    pub fn each_func(&self) -> Vec<&MetaFunc> {
        let mut out = Vec::new();
        self.collect_all_funcs(false, &mut out);
        out
    }

    fn collect_all_funcs<'s>(&'s self, inherited: bool, out: &mut Vec<&'s MetaFunc>) {
        for (_, base) in self.base_types() {
            base.collect_all_funcs(true, out);
        }
        for key in &self.func_order {
            if inherited && key.as_operator().is_some_and(OperatorType::is_special_member) {
                continue;
            }
            if let Some(overloads) = self.funcs.get(key) {
                out.extend(overloads.iter());
            }
        }
    }

    // ---- Derivation ----

    /// Reflexive: every type derives from itself.
    pub fn is_derived_from(&self, other: TypeId) -> bool {
        self.type_id() == other
            || self
                .base_types()
                .any(|(_, base)| base.is_derived_from(other))
    }

    /// Reflexive: every type is a base class of itself.
    pub fn is_base_class_of(&self, other: TypeId) -> bool {
        if self.type_id() == other {
            return true;
        }
        let manager = MetaManager::get();
        self.direct_derived()
            .into_iter()
            .filter_map(|id| manager.try_get_type(id))
            .any(|derived| derived.is_base_class_of(other))
    }

    /// Byte offset of `target` inside `self`, if `self` derives from it.
    pub fn base_offset_to(&self, target: TypeId) -> Option<usize> {
        if self.type_id() == target {
            return Some(0);
        }
        self.base_types()
            .find_map(|(base, ty)| ty.base_offset_to(target).map(|offset| base.offset + offset))
    }

    // ---- Invocation ----

    pub fn call_function<'a>(
        &self,
        name: impl Into<NameOrOperator>,
        args: &mut MetaArgs<'a>,
    ) -> FuncResult<'a> {
        self.call_function_with_rvo(name, args, None)
    }

    /// Overload resolution: the first overload whose parameters accept `args` wins.
    pub fn call_function_with_rvo<'a>(
        &self,
        name: impl Into<NameOrOperator>,
        args: &mut MetaArgs<'a>,
        rvo: Option<RvoBuffer>,
    ) -> FuncResult<'a> {
        let name = name.into();
        let candidates = self.try_get_funcs(name.clone());
        if candidates.is_empty() {
            return Err(FuncError::FuncNotFound {
                type_name: self.name.to_string(),
                name: name.to_string(),
            });
        }

        let mut reasons = Vec::new();
        for func in &candidates {
            match func.can_invoke_with(args) {
                // SAFETY: arguments were validated against this overload.
                Ok(()) => return unsafe { func.invoke_unchecked(args, rvo) },
                Err(err) => reasons.push(err.to_string()),
            }
        }

        tracing::trace!(ty = %self.name, func = %name, "no overload matched");
        Err(FuncError::NoMatchingOverload {
            name: format!("{}::{}", self.name, name),
            candidates: candidates.len(),
            reasons,
        })
    }

    // ---- Construction and the raw special members ----

    /// Uninitialized storage for one value.
    pub fn malloc(&self) -> *mut u8 {
        self.info.allocate()
    }

    /// # Safety
    /// `ptr` must come from [`MetaType::malloc`] on this type and hold no live value.
    pub unsafe fn free(&self, ptr: *mut u8) {
        self.info.deallocate(ptr);
    }

    /// Heap-allocates a value built by the constructor matching `args`.
    pub fn construct(&self, args: &mut MetaArgs<'_>) -> Result<MetaAny<'static>, FuncError> {
        let ptr = self.malloc();
        // SAFETY: fresh storage of the right layout.
        match unsafe { self.construct_at(ptr, args) } {
            Ok(()) => Ok(unsafe { MetaAny::from_raw_parts(self.info, ptr, true, false) }),
            Err(err) => {
                unsafe { self.free(ptr) };
                Err(err)
            }
        }
    }

    /// Constructs a value in place from `args`.
    ///
    /// # Safety
    /// `addr` must be valid, aligned, uninitialized storage for this type.
    pub unsafe fn construct_at(&self, addr: *mut u8, args: &mut MetaArgs<'_>) -> Result<(), FuncError> {
        debug_assert!(
            addr as usize % self.info.align.max(1) == 0,
            "misaligned address for {}",
            self.name
        );
        self.assert_defined();

        if args.is_empty() && self.info.is_trivially_default_constructible() {
            ptr::write_bytes(addr, 0, self.info.size);
            return Ok(());
        }

        if args.len() == 1 && !args.values()[0].is_null() && args.values()[0].type_id() == self.type_id() {
            let moving = args.forms()[0] == TypeForm::RValue && args.values()[0].is_owner();
            if moving && self.info.is_trivially_move_constructible() {
                let src = &mut args.values_mut()[0];
                ptr::copy_nonoverlapping(src.as_ptr(), addr, self.info.size);
                src.release_consumed();
                return Ok(());
            }
            if !moving && self.info.is_trivially_copy_constructible() {
                ptr::copy_nonoverlapping(args.values()[0].as_ptr(), addr, self.info.size);
                return Ok(());
            }
        }

        let result = self.call_function_with_rvo(OperatorType::Constructor, args, NonNull::new(addr))?;
        self.adopt_constructed(addr, result)
    }

    /// A constructor that ignored the return buffer hands back an owned value;
    /// move it into `addr`.
    unsafe fn adopt_constructed(&self, addr: *mut u8, result: Option<MetaAny<'_>>) -> Result<(), FuncError> {
        match result {
            Some(mut value) if value.is_owner() && value.as_ptr() != addr as *const u8 => {
                if value.type_id() != self.type_id() {
                    return Err(FuncError::custom(format!(
                        "constructor of {} returned another type",
                        self.name
                    )));
                }
                ptr::copy_nonoverlapping(value.as_ptr(), addr, self.info.size);
                value.release_consumed();
                Ok(())
            }
            Some(value) if value.as_ptr() == addr as *const u8 => {
                // constructed in place; `addr` is owned by the caller
                let _ = value.release();
                Ok(())
            }
            Some(_) => Err(FuncError::custom(format!(
                "constructor of {} returned a value outside the target storage",
                self.name
            ))),
            None => Err(FuncError::NoReturnValue),
        }
    }

    fn special_call(
        &self,
        member: SpecialMember,
        args: &mut [MetaAny<'_>],
        rvo: Option<*mut u8>,
    ) -> Result<Option<MetaAny<'static>>, FuncError> {
        let func = self.special_member(member).ok_or_else(|| FuncError::NotSupported {
            type_name: self.name.to_string(),
            operation: member.name(),
        })?;
        let result = func.call_thunk(args, rvo.and_then(NonNull::new))?;
        // Results of special members never borrow from the arguments.
        Ok(result.map(|value| {
            let (info, data, owning) = value.release();
            unsafe { MetaAny::from_raw_parts(info, data, owning, false) }
        }))
    }

    fn raw_arg(&self, ptr: *const u8, is_const: bool) -> MetaAny<'static> {
        // SAFETY: callers of the raw special members guarantee `ptr` holds a
        // live value for the duration of the call.
        unsafe { MetaAny::from_raw_parts(self.info, ptr as *mut u8, false, is_const) }
    }

    /// # Safety
    /// `addr` must be valid, aligned, uninitialized storage for this type.
    pub unsafe fn default_construct_at(&self, addr: *mut u8) -> Result<(), FuncError> {
        self.assert_defined();
        if self.info.is_trivially_default_constructible() {
            ptr::write_bytes(addr, 0, self.info.size);
            return Ok(());
        }
        let result = self.special_call(SpecialMember::DefaultConstructor, &mut [], Some(addr))?;
        self.adopt_constructed(addr, result)
    }

    /// # Safety
    /// `dst` as in [`MetaType::default_construct_at`]; `src` must hold a live value.
    pub unsafe fn copy_construct_at(&self, dst: *mut u8, src: *const u8) -> Result<(), FuncError> {
        self.assert_defined();
        if self.info.is_trivially_copy_constructible() {
            ptr::copy_nonoverlapping(src, dst, self.info.size);
            return Ok(());
        }
        let result = self.special_call(
            SpecialMember::CopyConstructor,
            &mut [self.raw_arg(src, true)],
            Some(dst),
        )?;
        self.adopt_constructed(dst, result)
    }

    /// Moves the value at `src` into `dst`. Afterwards `src` is moved-from and
    /// must not be destroyed.
    ///
    /// # Safety
    /// As in [`MetaType::copy_construct_at`].
    pub unsafe fn move_construct_at(&self, dst: *mut u8, src: *mut u8) -> Result<(), FuncError> {
        self.assert_defined();
        if self.info.is_trivially_move_constructible() {
            ptr::copy_nonoverlapping(src, dst, self.info.size);
            return Ok(());
        }
        let result = self.special_call(
            SpecialMember::MoveConstructor,
            &mut [self.raw_arg(src, false)],
            Some(dst),
        )?;
        self.adopt_constructed(dst, result)
    }

    /// # Safety
    /// Both pointers must hold live values of this type.
    pub unsafe fn copy_assign(&self, dst: *mut u8, src: *const u8) -> Result<(), FuncError> {
        self.assert_defined();
        if ptr::eq(dst, src) {
            return Ok(());
        }
        if self.info.is_trivially_copy_assignable() {
            ptr::copy_nonoverlapping(src, dst, self.info.size);
            return Ok(());
        }
        self.special_call(
            SpecialMember::CopyAssign,
            &mut [self.raw_arg(dst, false), self.raw_arg(src, true)],
            None,
        )?;
        Ok(())
    }

    /// Afterwards `src` is moved-from and must not be destroyed.
    ///
    /// # Safety
    /// Both pointers must hold live values of this type.
    pub unsafe fn move_assign(&self, dst: *mut u8, src: *mut u8) -> Result<(), FuncError> {
        self.assert_defined();
        if self.info.is_trivially_move_assignable() {
            ptr::copy_nonoverlapping(src, dst, self.info.size);
            return Ok(());
        }
        self.special_call(
            SpecialMember::MoveAssign,
            &mut [self.raw_arg(dst, false), self.raw_arg(src, false)],
            None,
        )?;
        Ok(())
    }

    /// Destroys the value at `ptr` and optionally frees its storage.
    ///
    /// # Safety
    /// `ptr` must hold a live value; with `free`, it must come from `malloc`.
    pub unsafe fn destruct(&self, ptr: *mut u8, free: bool) {
        self.assert_defined();
        if !self.info.is_trivially_destructible() {
            if let Err(err) = self.special_call(SpecialMember::Destructor, &mut [self.raw_arg(ptr, false)], None) {
                tracing::error!(ty = %self.name, %err, "failed to destroy value");
            }
        }
        if free {
            self.free(ptr);
        }
    }

    /// Owned copy of the value at `src`.
    ///
    /// # Safety
    /// `src` must hold a live value of this type.
    pub unsafe fn copy_new(&self, src: *const u8) -> Result<MetaAny<'static>, FuncError> {
        let ptr = self.malloc();
        match self.copy_construct_at(ptr, src) {
            Ok(()) => Ok(MetaAny::from_raw_parts(self.info, ptr, true, false)),
            Err(err) => {
                self.free(ptr);
                Err(err)
            }
        }
    }
}

impl fmt::Debug for MetaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaType")
            .field("name", &self.name)
            .field("info", &self.info)
            .field("fields", &self.fields.len())
            .field("funcs", &self.func_order)
            .field("bases", &self.bases)
            .field("defined", &self.is_defined())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{MetaTypeBuilder, Reflect};
    use crate::func_result::FuncResultExt;
    use crate::func::MetaFuncNamedParam;
    use crate::type_traits::TypeTraits;
    use std::mem::offset_of;

    #[derive(Clone, Default, Debug, PartialEq)]
    #[repr(C)]
    struct DeriveA {
        a: u32,
    }

    #[derive(Clone, Default, Debug, PartialEq)]
    #[repr(C)]
    struct DeriveB {
        base: DeriveA,
        b: u32,
    }

    #[derive(Clone, Default, Debug, PartialEq)]
    #[repr(C)]
    struct DeriveC {
        extra: u64,
        base: DeriveB,
        c: u32,
    }

    impl Reflect for DeriveA {
        fn reflect() -> MetaType {
            MetaTypeBuilder::<DeriveA>::new("DeriveA")
                .with_default()
                .with_clone()
                .field::<u32>("a", offset_of!(DeriveA, a))
                .method("get_a", |this: &DeriveA| this.a)
                .build()
        }
    }

    impl Reflect for DeriveB {
        fn reflect() -> MetaType {
            MetaTypeBuilder::<DeriveB>::new("DeriveB")
                .with_default()
                .with_clone()
                .base::<DeriveA>(offset_of!(DeriveB, base))
                .field::<u32>("b", offset_of!(DeriveB, b))
                .build()
        }
    }

    impl Reflect for DeriveC {
        fn reflect() -> MetaType {
            MetaTypeBuilder::<DeriveC>::new("DeriveC")
                .with_default()
                .with_clone()
                .base::<DeriveB>(offset_of!(DeriveC, base))
                .field::<u32>("c", offset_of!(DeriveC, c))
                .build()
        }
    }

    #[test]
    fn derivation_is_reflexive_and_transitive() {
        let manager = MetaManager::get();
        let c = manager.get_type::<DeriveC>();
        let b = manager.get_type::<DeriveB>();
        let a = manager.get_type::<DeriveA>();

        assert!(c.is_derived_from(a.type_id()));
        assert!(c.is_derived_from(b.type_id()));
        assert!(c.is_derived_from(c.type_id()));
        assert!(!a.is_derived_from(c.type_id()));

        assert!(a.is_base_class_of(c.type_id()));
        assert!(a.is_base_class_of(a.type_id()));
        assert!(!c.is_base_class_of(a.type_id()));

        assert_eq!(b.direct_derived(), vec![c.type_id()]);
        assert_eq!(
            c.base_offset_to(a.type_id()),
            Some(offset_of!(DeriveC, base) + offset_of!(DeriveB, base))
        );
    }

    #[test]
    fn moved_type_keeps_its_links() {
        let manager = MetaManager::get();
        let a = manager.get_type::<DeriveA>();
        manager.get_type::<DeriveC>();

        let local = DeriveB::reflect();
        let moved = vec![local];
        let boxed = Box::new(moved.into_iter().next().unwrap());
        assert!(boxed.is_derived_from(a.type_id()));
        assert_eq!(boxed.base_offset_to(a.type_id()), Some(offset_of!(DeriveB, base)));
        assert!(a.is_base_class_of(manager.get_type::<DeriveC>().type_id()));
    }

    #[test]
    fn inherited_fields_come_first() {
        let c = MetaManager::get().get_type::<DeriveC>();
        let names: Vec<_> = c.each_field().iter().map(|f| f.name().to_string()).collect();
        assert_eq!(names, ["a", "b", "c"]);

        let offsets: Vec<_> = c.each_field_with_offsets().iter().map(|(o, _)| *o).collect();
        let base = offset_of!(DeriveC, base);
        assert_eq!(offsets, [base + offset_of!(DeriveB, base), base + offset_of!(DeriveB, b), offset_of!(DeriveC, c)]);
        assert!(c.try_get_field("a").is_some());
        assert!(c.try_get_field("missing").is_none());
    }

    #[test]
    fn base_methods_apply_to_derived_objects() {
        let c_type = MetaManager::get().get_type::<DeriveC>();
        let mut value = DeriveC::default();
        value.base.base.a = 11;
        let obj = MetaAny::new(value);

        let mut args = MetaArgs::new().any(obj.as_ref(), TypeForm::ConstRef);
        let a = c_type.call_function("get_a", &mut args).into_typed::<u32>().unwrap();
        assert_eq!(a, 11);

        let field = c_type.try_get_field("a").unwrap();
        assert_eq!(field.make_ref(&obj).unwrap().try_get::<u32>(), Some(&11));
        assert_eq!(obj.try_get::<DeriveA>().map(|a| a.a), Some(11));
    }

    #[test]
    fn constructors_are_not_inherited() {
        let c = MetaManager::get().get_type::<DeriveC>();
        let ctors = c.try_get_funcs(OperatorType::Constructor);
        assert!(ctors
            .iter()
            .all(|f| f.return_traits().type_id == c.type_id()));
    }

    #[test]
    fn each_func_skips_inherited_special_members() {
        let c = MetaManager::get().get_type::<DeriveC>();
        let all = c.each_func();
        let ctors = all
            .iter()
            .filter(|f| f.name_or_op().as_operator() == Some(OperatorType::Constructor))
            .count();
        assert_eq!(ctors, c.try_get_own_funcs(OperatorType::Constructor).len());
        assert!(all
            .iter()
            .filter(|f| f.name_or_op().as_operator().is_some_and(OperatorType::is_special_member))
            .all(|f| f.params().iter().any(|p| p.traits.type_id == c.type_id())
                || f.return_traits().type_id == c.type_id()));
        assert!(all.iter().any(|f| f.name_or_op().as_name().is_some_and(|n| n == "get_a")));
    }

    #[derive(Clone, Default)]
    struct StrayCtor(#[allow(dead_code)] u32);

    impl Reflect for StrayCtor {
        fn reflect() -> MetaType {
            let id = crate::type_id::type_id_of::<StrayCtor>();
            MetaTypeBuilder::<StrayCtor>::new("StrayCtor")
                .with_default()
                .raw_func(MetaFunc::new(
                    OperatorType::Constructor,
                    TypeTraits::new(id, TypeForm::Value),
                    vec![MetaFuncNamedParam::new(TypeTraits::of::<u8>(TypeForm::Value), "seed")],
                    |_, _| {
                        let elsewhere: &'static mut StrayCtor = Box::leak(Box::new(StrayCtor(5)));
                        Ok(Some(MetaAny::from_mut(elsewhere)))
                    },
                ))
                .build()
        }
    }

    #[test]
    fn constructor_result_outside_target_is_an_error() {
        let ty = MetaManager::get().get_type::<StrayCtor>();
        let mut args = MetaArgs::new().value(3u8);
        assert!(matches!(ty.construct(&mut args), Err(FuncError::Custom(_))));
    }

    #[test]
    fn unknown_function_is_reported() {
        let a = MetaManager::get().get_type::<DeriveA>();
        let mut args = MetaArgs::new();
        assert!(matches!(
            a.call_function("nope", &mut args),
            Err(FuncError::FuncNotFound { .. })
        ));
    }

    #[test]
    fn construct_and_copy() {
        let b = MetaManager::get().get_type::<DeriveB>();
        let obj = b.construct(&mut MetaArgs::new()).unwrap();
        assert_eq!(obj.try_get::<DeriveB>(), Some(&DeriveB::default()));

        let source = DeriveB {
            base: DeriveA { a: 1 },
            b: 2,
        };
        let mut args = MetaArgs::new().by_ref(&source);
        let copy = b.construct(&mut args).unwrap();
        assert_eq!(copy.try_get::<DeriveB>(), Some(&source));
    }
}
