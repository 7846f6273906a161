// field.rs - Data members of reflected types

use crate::any::MetaAny;
use crate::func_result::FuncError;
use crate::manager::MetaManager;
use crate::meta_type::MetaType;
use crate::name::Name;
use crate::props::MetaProps;
use crate::type_id::TypeId;
use crate::type_traits::TypeTraits;

/// A data member at a fixed byte offset inside its owner.
#[derive(Clone, Debug)]
pub struct MetaField {
    owner: TypeId,
    traits: TypeTraits,
    offset: usize,
    name: Name,
    props: MetaProps,
}

impl MetaField {
    pub fn new(owner: TypeId, traits: TypeTraits, offset: usize, name: impl Into<Name>) -> Self {
        Self {
            owner,
            traits,
            offset,
            name: name.into(),
            props: MetaProps::new(),
        }
    }

    #[inline]
    pub fn owner(&self) -> TypeId {
        self.owner
    }

    #[inline]
    pub fn type_traits(&self) -> TypeTraits {
        self.traits
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
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

    pub fn try_get_type(&self) -> Option<&'static MetaType> {
        MetaManager::get().try_get_type(self.traits.type_id)
    }

    /// Address of this field inside `obj`, which may be more derived than the owner.
    fn field_ptr(&self, obj: &MetaAny<'_>) -> Option<*mut u8> {
        if obj.is_null() {
            return None;
        }
        let base = if obj.type_id() == self.owner {
            0
        } else {
            MetaManager::get().upcast_offset(obj.type_id(), self.owner)?
        };
        // SAFETY: the owner (or a base at `base`) lives at `obj`, and `offset`
        // lies within the owner.
        Some(unsafe { (obj.as_ptr() as *mut u8).add(base + self.offset) })
    }

    /// Const view of the field. `None` if `obj` is null, unrelated to the
    /// owner, or the field type is not registered.
    pub fn make_ref<'b>(&self, obj: &'b MetaAny<'_>) -> Option<MetaAny<'b>> {
        let ptr = self.field_ptr(obj)?;
        let info = *self.try_get_type()?.type_info();
        // SAFETY: `ptr` points at a live field value borrowed from `obj`.
        Some(unsafe { MetaAny::from_raw_parts(info, ptr, false, true) })
    }

    /// Mutable view of the field. `None` additionally for const objects.
    pub fn make_mut<'b>(&self, obj: &'b mut MetaAny<'_>) -> Option<MetaAny<'b>> {
        if obj.is_const() {
            return None;
        }
        let ptr = self.field_ptr(obj)?;
        let info = *self.try_get_type()?.type_info();
        // SAFETY: as in `make_ref`, with mutable access granted by `obj`.
        Some(unsafe { MetaAny::from_raw_parts(info, ptr, false, false) })
    }

    /// Copy of the field value.
    pub fn get_value(&self, obj: &MetaAny<'_>) -> Result<MetaAny<'static>, FuncError> {
        let ty = self
            .try_get_type()
            .ok_or(FuncError::TypeNotRegistered(self.traits.type_id))?;
        let ptr = self.field_ptr(obj).ok_or_else(|| self.not_a_member(obj))?;
        // SAFETY: `ptr` holds a live value of the field type.
        unsafe { ty.copy_new(ptr) }
    }

    /// Copy-assigns `value` into the field.
    pub fn set_value(&self, obj: &mut MetaAny<'_>, value: &MetaAny<'_>) -> Result<(), FuncError> {
        if obj.is_const() {
            return Err(FuncError::AssignToConst);
        }
        let not_a_member = self.not_a_member(obj);
        let mut field = self.make_mut(obj).ok_or(not_a_member)?;
        field.assign(value)
    }

    fn not_a_member(&self, obj: &MetaAny<'_>) -> FuncError {
        let manager = MetaManager::get();
        FuncError::Custom(format!(
            "{} is not a field of {}",
            self.name,
            manager.type_name_or_id(obj.type_id())
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{MetaTypeBuilder, Reflect};
    use std::mem::offset_of;

    #[derive(Clone, Default, Debug, PartialEq)]
    struct FieldHolder {
        id: u32,
        label: String,
    }

    impl Reflect for FieldHolder {
        fn reflect() -> MetaType {
            MetaTypeBuilder::<FieldHolder>::new("FieldHolder")
                .with_default()
                .with_clone()
                .field::<u32>("id", offset_of!(FieldHolder, id))
                .field::<String>("label", offset_of!(FieldHolder, label))
                .build()
        }
    }

    #[test]
    fn read_and_write_through_fields() {
        let ty = MetaManager::get().get_type::<FieldHolder>();
        let mut obj = MetaAny::new(FieldHolder {
            id: 3,
            label: "before".into(),
        });

        let id = ty.try_get_field("id").unwrap();
        assert_eq!(id.make_ref(&obj).unwrap().try_get::<u32>(), Some(&3));

        let label = ty.try_get_field("label").unwrap();
        label
            .set_value(&mut obj, &MetaAny::new(String::from("after")))
            .unwrap();
        let copy = label.get_value(&obj).unwrap();
        assert_eq!(copy.try_get::<String>().map(String::as_str), Some("after"));
        assert_eq!(obj.try_get::<FieldHolder>().unwrap().label, "after");
    }

    #[test]
    fn const_objects_refuse_writes() {
        let ty = MetaManager::get().get_type::<FieldHolder>();
        let holder = FieldHolder::default();
        let mut obj = MetaAny::from_ref(&holder);
        let id = ty.try_get_field("id").unwrap();
        assert!(id.make_mut(&mut obj).is_none());
        assert!(matches!(
            id.set_value(&mut obj, &MetaAny::new(1u32)),
            Err(FuncError::AssignToConst)
        ));
    }

    #[test]
    fn wrong_value_type_is_rejected() {
        let ty = MetaManager::get().get_type::<FieldHolder>();
        let mut obj = MetaAny::new(FieldHolder::default());
        let id = ty.try_get_field("id").unwrap();
        assert!(id.set_value(&mut obj, &MetaAny::new(1.0f32)).is_err());
        assert_eq!(obj.try_get::<FieldHolder>().unwrap().id, 0);
    }
}
