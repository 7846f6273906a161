// builder.rs - Describing native Rust types
//
// A type opts into reflection by implementing `Reflect`, usually with a
// `MetaTypeBuilder` chain:
//
//     impl Reflect for Health {
//         fn reflect() -> MetaType {
//             MetaTypeBuilder::<Health>::new("Health")
//                 .with_default()
//                 .with_clone()
//                 .field::<f32>("current", offset_of!(Health, current))
//                 .method("is_dead", |h: &Health| h.current <= 0.0)
//                 .build()
//         }
//     }

use crate::field::MetaField;
use crate::func::{MetaFunc, MetaFuncNamedParam, NameOrOperator, OperatorType};
use crate::func_result::FuncError;
use crate::into_func::{FuncReturn, IntoMetaFunc, IntoMetaMethod, IntoMetaMethodMut};
use crate::manager::MetaManager;
use crate::meta_type::{BaseClass, MetaType};
use crate::name::Name;
use crate::props::names;
use crate::serialization::{DESERIALIZE_FUNC_NAME, SERIALIZE_FUNC_NAME};
use crate::special_member::SpecialMember;
use crate::type_info::{TypeFlags, TypeInfo};
use crate::type_traits::{TypeForm, TypeTraits};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::ptr;

/// A native type that can describe itself to the registry.
pub trait Reflect: 'static + Sized {
    fn reflect() -> MetaType;
}

enum LastMember {
    Type,
    Field(usize),
    Func(NameOrOperator, usize),
}

pub struct MetaTypeBuilder<T: Reflect> {
    ty: MetaType,
    last: LastMember,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Reflect> MetaTypeBuilder<T> {
    /// Starts a type with move construction, move assignment and destruction.
    pub fn new(name: impl Into<Name>) -> Self {
        let mut builder = Self {
            ty: MetaType::new(name, TypeInfo::of::<T>()),
            last: LastMember::Type,
            _marker: PhantomData,
        };
        builder.special(SpecialMember::MoveConstructor, |args, rvo| {
            let source = args
                .first_mut()
                .and_then(|arg| arg.try_get_mut::<T>())
                .ok_or(FuncError::BadArgument { index: 0 })?;
            // SAFETY: the argument is passed by move; its owner treats it as
            // moved-from afterwards.
            let value = unsafe { ptr::read(source) };
            value.into_func_result(rvo)
        });
        builder.special(SpecialMember::MoveAssign, |args, _| {
            let (this, rest) = args
                .split_first_mut()
                .ok_or(FuncError::BadArgument { index: 0 })?;
            let this = this.try_get_mut::<T>().ok_or(FuncError::BadArgument { index: 0 })?;
            let source = rest
                .first_mut()
                .and_then(|arg| arg.try_get_mut::<T>())
                .ok_or(FuncError::BadArgument { index: 1 })?;
            // SAFETY: as for the move constructor.
            *this = unsafe { ptr::read(source) };
            Ok(None)
        });
        builder.special(SpecialMember::Destructor, |args, _| {
            let this = args
                .first_mut()
                .and_then(|arg| arg.try_get_mut::<T>())
                .ok_or(FuncError::BadArgument { index: 0 })?;
            // SAFETY: the destructor runs once on a live value.
            unsafe { ptr::drop_in_place(this as *mut T) };
            Ok(None)
        });
        builder
    }

    fn special<F>(&mut self, member: SpecialMember, thunk: F)
    where
        F: for<'a, 'b> Fn(&'b mut [crate::MetaAny<'a>], Option<crate::RvoBuffer>) -> crate::FuncResult<'a>
            + Send
            + Sync
            + 'static,
    {
        let id = type_id::<T>();
        let func = MetaFunc::new(
            member.operator(),
            member.return_traits(id),
            member.params(id),
            thunk,
        );
        self.push_func(func);
    }

    fn push_func(&mut self, func: MetaFunc) {
        let key = func.name_or_op().clone();
        self.ty.add_func(func);
        let index = self.ty.try_get_own_funcs(key.clone()).len() - 1;
        self.last = LastMember::Func(key, index);
    }

    pub fn with_default(mut self) -> Self
    where
        T: Default,
    {
        self.special(SpecialMember::DefaultConstructor, |_, rvo| T::default().into_func_result(rvo));
        self.ty.set_flag(TypeFlags::DEFAULT_CONSTRUCTIBLE, true);
        self
    }

    /// Default construction as all-zero bytes, which also enables the
    /// `write_bytes` fast path.
    ///
    /// # Safety
    /// All-zero bytes must be a valid `T`.
    pub unsafe fn with_zeroed_default(mut self) -> Self {
        self.special(SpecialMember::DefaultConstructor, |_, rvo| {
            // SAFETY: guaranteed by the caller of `with_zeroed_default`.
            unsafe { std::mem::zeroed::<T>() }.into_func_result(rvo)
        });
        self.ty.set_flag(TypeFlags::DEFAULT_CONSTRUCTIBLE, true);
        self.ty.set_flag(TypeFlags::TRIVIALLY_DEFAULT_CONSTRUCTIBLE, true);
        self
    }

    pub fn with_clone(mut self) -> Self
    where
        T: Clone,
    {
        self.special(SpecialMember::CopyConstructor, |args, rvo| {
            let source = args
                .first()
                .and_then(|arg| arg.try_get::<T>())
                .ok_or(FuncError::BadArgument { index: 0 })?;
            source.clone().into_func_result(rvo)
        });
        self.special(SpecialMember::CopyAssign, |args, _| {
            let (this, rest) = args
                .split_first_mut()
                .ok_or(FuncError::BadArgument { index: 0 })?;
            let source = rest.first().ok_or(FuncError::BadArgument { index: 1 })?;
            if this.as_ptr() == source.as_ptr() {
                return Ok(None);
            }
            let source = source.try_get::<T>().ok_or(FuncError::BadArgument { index: 1 })?;
            let this = this.try_get_mut::<T>().ok_or(FuncError::BadArgument { index: 0 })?;
            this.clone_from(source);
            Ok(None)
        });
        self.ty.set_flag(TypeFlags::COPY_CONSTRUCTIBLE, true);
        self.ty.set_flag(TypeFlags::COPY_ASSIGNABLE, true);
        self
    }

    /// `with_clone` plus the `memcpy` fast paths for copies.
    pub fn with_copy(self) -> Self
    where
        T: Copy,
    {
        let mut builder = self.with_clone();
        builder.ty.set_flag(TypeFlags::TRIVIALLY_COPY_CONSTRUCTIBLE, true);
        builder.ty.set_flag(TypeFlags::TRIVIALLY_COPY_ASSIGNABLE, true);
        builder
    }

    /// Installs the functions `serialization` looks up by name.
    pub fn with_serde(mut self) -> Self
    where
        T: Serialize + DeserializeOwned,
    {
        let id = type_id::<T>();
        let json = TypeTraits::of::<serde_json::Value>(TypeForm::Value);
        self.push_func(MetaFunc::new(
            SERIALIZE_FUNC_NAME,
            json,
            vec![MetaFuncNamedParam::new(TypeTraits::new(id, TypeForm::ConstRef), "this")],
            |args, rvo| {
                let this = args
                    .first()
                    .and_then(|arg| arg.try_get::<T>())
                    .ok_or(FuncError::BadArgument { index: 0 })?;
                let value = serde_json::to_value(this).map_err(|e| FuncError::custom(e.to_string()))?;
                value.into_func_result(rvo)
            },
        ));
        self.push_func(MetaFunc::new(
            DESERIALIZE_FUNC_NAME,
            TypeTraits::VOID,
            vec![
                MetaFuncNamedParam::new(TypeTraits::new(id, TypeForm::Ref), "this"),
                MetaFuncNamedParam::new(TypeTraits::new(json.type_id, TypeForm::ConstRef), "json"),
            ],
            |args, _| {
                let (this, rest) = args
                    .split_first_mut()
                    .ok_or(FuncError::BadArgument { index: 0 })?;
                let json = rest
                    .first()
                    .and_then(|arg| arg.try_get::<serde_json::Value>())
                    .ok_or(FuncError::BadArgument { index: 1 })?;
                let value: T = serde_json::from_value(json.clone())
                    .map_err(|e| FuncError::custom(e.to_string()))?;
                let this = this.try_get_mut::<T>().ok_or(FuncError::BadArgument { index: 0 })?;
                *this = value;
                Ok(None)
            },
        ));
        self
    }

    /// Registers `==` and `!=`.
    pub fn with_eq(mut self) -> Self
    where
        T: PartialEq,
    {
        let id = type_id::<T>();
        for (op, equal) in [(OperatorType::Equal, true), (OperatorType::Inequal, false)] {
            self.push_func(MetaFunc::new(
                op,
                TypeTraits::of::<bool>(TypeForm::Value),
                vec![
                    MetaFuncNamedParam::new(TypeTraits::new(id, TypeForm::ConstRef), "this"),
                    MetaFuncNamedParam::new(TypeTraits::new(id, TypeForm::ConstRef), "other"),
                ],
                move |args, rvo| {
                    let lhs = args
                        .first()
                        .and_then(|arg| arg.try_get::<T>())
                        .ok_or(FuncError::BadArgument { index: 0 })?;
                    let rhs = args
                        .get(1)
                        .and_then(|arg| arg.try_get::<T>())
                        .ok_or(FuncError::BadArgument { index: 1 })?;
                    ((lhs == rhs) == equal).into_func_result(rvo)
                },
            ));
        }
        self
    }

    /// Declares a field of type `F` at `offset` bytes into `T`.
    pub fn field<F: Reflect>(mut self, name: impl Into<Name>, offset: usize) -> Self {
        let field_type = MetaManager::get().get_type::<F>();
        debug_assert!(
            offset + field_type.type_info().size <= self.ty.type_info().size,
            "field {} lies outside of {}",
            offset,
            self.ty.name()
        );
        self.ty.add_field(MetaField::new(
            type_id::<T>(),
            TypeTraits::new(field_type.type_id(), TypeForm::Value),
            offset,
            name,
        ));
        self.last = LastMember::Field(self.ty.fields().len() - 1);
        self
    }

    /// Declares that a `B` lives at `offset` bytes into `T`.
    pub fn base<B: Reflect>(mut self, offset: usize) -> Self {
        let base = MetaManager::get().get_type::<B>();
        self.ty.add_base_class(BaseClass {
            type_id: base.type_id(),
            offset,
        });
        self
    }

    pub fn func<M>(mut self, name: impl Into<NameOrOperator>, f: impl IntoMetaFunc<M>) -> Self {
        self.push_func(f.into_meta_func(name.into()));
        self
    }

    pub fn method<M>(mut self, name: impl Into<NameOrOperator>, f: impl IntoMetaMethod<T, M>) -> Self {
        self.push_func(f.into_meta_method(name.into()));
        self
    }

    pub fn method_mut<M>(mut self, name: impl Into<NameOrOperator>, f: impl IntoMetaMethodMut<T, M>) -> Self {
        self.push_func(f.into_meta_method_mut(name.into()));
        self
    }

    /// A hand-written function, e.g. one taking `MetaAny` parameters.
    pub fn raw_func(mut self, func: MetaFunc) -> Self {
        self.push_func(func);
        self
    }

    fn last_props(&mut self) -> Option<&mut crate::MetaProps> {
        match &self.last {
            LastMember::Type => Some(self.ty.props_mut()),
            LastMember::Field(index) => {
                let index = *index;
                self.ty.fields_mut().get_mut(index).map(MetaField::props_mut)
            }
            LastMember::Func(key, index) => {
                let (key, index) = (key.clone(), *index);
                self.ty.funcs_mut(&key)?.get_mut(index).map(MetaFunc::props_mut)
            }
        }
    }

    /// Tags the last added field or function, or the type if there is none.
    pub fn tag(mut self, name: impl Into<Name>) -> Self {
        if let Some(props) = self.last_props() {
            props.add(name);
        }
        self
    }

    /// Sets a property on the last added field or function.
    pub fn prop<V: Serialize + ?Sized>(mut self, name: impl Into<Name>, value: &V) -> Self {
        let name = name.into();
        if let Some(Err(err)) = self.last_props().map(|props| props.set(name.clone(), value).map(|_| ())) {
            tracing::warn!(prop = %name, %err, "property value could not be serialized");
        }
        self
    }

    pub fn type_tag(mut self, name: impl Into<Name>) -> Self {
        self.ty.props_mut().add(name);
        self
    }

    pub fn type_prop<V: Serialize + ?Sized>(mut self, name: impl Into<Name>, value: &V) -> Self {
        let name = name.into();
        if let Err(err) = self.ty.props_mut().set(name.clone(), value) {
            tracing::warn!(prop = %name, %err, "property value could not be serialized");
        }
        self
    }

    /// Shorthand for tagging the type as a component.
    pub fn component(self) -> Self {
        self.type_tag(names::COMPONENT)
    }

    pub fn build(self) -> MetaType {
        self.ty
    }
}

fn type_id<T: 'static>() -> crate::TypeId {
    crate::type_id::type_id_of::<T>()
}
