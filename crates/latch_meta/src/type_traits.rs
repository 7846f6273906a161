// type_traits.rs - Parameter forms and argument compatibility
//
// A parameter is a type id plus the form it is passed in. Whether an argument
// may bind to a parameter depends on both: the form table first, then null
// handling, then the type relation through the registry.

use crate::any::MetaAny;
use crate::manager::MetaManager;
use crate::type_id::{type_id_of, TypeId};
use thiserror::Error;

/// How a value is passed to or returned from a function.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeForm {
    Value,
    Ref,
    ConstRef,
    Ptr,
    ConstPtr,
    RValue,
}

impl TypeForm {
    #[inline]
    pub fn is_ref(self) -> bool {
        matches!(self, TypeForm::Ref | TypeForm::ConstRef | TypeForm::RValue)
    }

    #[inline]
    pub fn is_ptr(self) -> bool {
        matches!(self, TypeForm::Ptr | TypeForm::ConstPtr)
    }

    #[inline]
    pub fn is_const(self) -> bool {
        matches!(self, TypeForm::ConstRef | TypeForm::ConstPtr)
    }

    /// Only pointer parameters accept null.
    #[inline]
    pub fn is_nullable(self) -> bool {
        self.is_ptr()
    }

    #[inline]
    pub(crate) fn as_byte(self) -> u8 {
        match self {
            TypeForm::Value => 0,
            TypeForm::Ref => 1,
            TypeForm::ConstRef => 2,
            TypeForm::Ptr => 3,
            TypeForm::ConstPtr => 4,
            TypeForm::RValue => 5,
        }
    }
}

/// A type id with its form stripped out.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeTraits {
    pub type_id: TypeId,
    pub form: TypeForm,
}

impl TypeTraits {
    /// Return traits of a function that returns nothing.
    pub const VOID: TypeTraits = TypeTraits::new(TypeId::NONE, TypeForm::Value);

    pub const fn new(type_id: TypeId, form: TypeForm) -> Self {
        Self { type_id, form }
    }

    pub fn of<T: ?Sized + 'static>(form: TypeForm) -> Self {
        Self::new(type_id_of::<T>(), form)
    }

    #[inline]
    pub fn is_void(&self) -> bool {
        self.type_id.is_none()
    }
}

/// Id of the wildcard parameter type: a `MetaAny` parameter accepts anything.
pub fn wildcard_type_id() -> TypeId {
    type_id_of::<MetaAny<'static>>()
}

/// Why an argument cannot bind to a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgError {
    #[error("expected an L-value, but a temporary was passed")]
    ExpectedLValue,

    #[error("cannot pass a const argument to a mutable parameter")]
    ConstToMutable,

    #[error("parameter takes ownership, but the argument was not moved in")]
    NotMovedIn,

    #[error("Arg was nullptr")]
    Null,

    #[error("cannot move out of a borrowed value")]
    MovedFromBorrowed,

    #[error("argument of type {found} is not compatible with parameter type {expected}")]
    TypeMismatch { expected: TypeId, found: TypeId },
}

/// Form table only.
pub fn can_form_be_passed_into(arg: TypeForm, param: TypeForm) -> Result<(), ArgError> {
    use TypeForm::*;
    match (arg, param) {
        (Value | RValue, Ref | Ptr) => Err(ArgError::ExpectedLValue),
        (ConstRef | ConstPtr, Ref | Ptr) => Err(ArgError::ConstToMutable),
        (Value | Ref | ConstRef | Ptr | ConstPtr, RValue) => Err(ArgError::NotMovedIn),
        _ => Ok(()),
    }
}

/// Type relation only. Either side may be unregistered.
pub fn can_type_be_passed_into(arg: TypeId, param: TypeId) -> Result<(), ArgError> {
    if arg == param || param == wildcard_type_id() {
        return Ok(());
    }

    let manager = MetaManager::get();
    let compatible = if let Some(arg_type) = manager.try_get_type(arg) {
        arg_type.is_derived_from(param)
    } else if let Some(param_type) = manager.try_get_type(param) {
        param_type.is_base_class_of(arg)
    } else {
        false
    };

    if compatible {
        Ok(())
    } else {
        Err(ArgError::TypeMismatch {
            expected: param,
            found: arg,
        })
    }
}

/// Full check of one argument passed as `arg_form` into `param`.
pub fn can_arg_be_passed_into_param(
    arg: &MetaAny<'_>,
    arg_form: TypeForm,
    param: TypeTraits,
) -> Result<(), ArgError> {
    can_form_be_passed_into(arg_form, param.form)?;

    // a const handle stays const whatever form the caller declared
    if arg.is_const() && matches!(param.form, TypeForm::Ref | TypeForm::Ptr | TypeForm::RValue) {
        return Err(ArgError::ConstToMutable);
    }

    if arg.is_null() {
        return if param.form.is_nullable() {
            Ok(())
        } else {
            Err(ArgError::Null)
        };
    }

    if arg_form == TypeForm::RValue && !arg.is_owner() {
        return Err(ArgError::MovedFromBorrowed);
    }

    can_type_be_passed_into(arg.type_id(), param.type_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use TypeForm::*;

    #[test]
    fn form_table() {
        let forms = [Value, Ref, ConstRef, Ptr, ConstPtr, RValue];
        for arg in forms {
            for param in forms {
                let result = can_form_be_passed_into(arg, param);
                let expected = match (arg, param) {
                    (Value | RValue, Ref | Ptr) => Err(ArgError::ExpectedLValue),
                    (ConstRef | ConstPtr, Ref | Ptr) => Err(ArgError::ConstToMutable),
                    (a, RValue) if a != RValue => Err(ArgError::NotMovedIn),
                    _ => Ok(()),
                };
                assert_eq!(result, expected, "{arg:?} -> {param:?}");
            }
        }
    }

    #[test]
    fn value_into_const_ref_is_allowed() {
        assert!(can_form_be_passed_into(Value, ConstRef).is_ok());
        assert!(can_form_be_passed_into(RValue, Value).is_ok());
        assert!(can_form_be_passed_into(Ref, ConstPtr).is_ok());
    }

    #[test]
    fn null_only_binds_to_pointers() {
        let null = MetaAny::null();
        let param = TypeTraits::of::<u8>(Ptr);
        assert!(can_arg_be_passed_into_param(&null, Ptr, param).is_ok());

        let param = TypeTraits::of::<u8>(ConstRef);
        assert_eq!(
            can_arg_be_passed_into_param(&null, ConstRef, param),
            Err(ArgError::Null)
        );
    }

    #[test]
    fn borrowed_values_cannot_be_moved() {
        let mut value = 7u16;
        let arg = MetaAny::from_mut(&mut value);
        let param = TypeTraits::of::<u16>(RValue);
        assert_eq!(
            can_arg_be_passed_into_param(&arg, RValue, param),
            Err(ArgError::MovedFromBorrowed)
        );
    }

    #[test]
    fn unrelated_unregistered_types_mismatch() {
        struct Left;
        struct Right;
        let left = Left;
        let arg = MetaAny::from_ref(&left);
        let param = TypeTraits::of::<Right>(ConstRef);
        assert!(matches!(
            can_arg_be_passed_into_param(&arg, ConstRef, param),
            Err(ArgError::TypeMismatch { .. })
        ));

        let param = TypeTraits::of::<Left>(ConstRef);
        assert!(can_arg_be_passed_into_param(&arg, ConstRef, param).is_ok());
    }

    #[test]
    fn const_handles_never_bind_to_mutable_params() {
        let value = 11u32;
        let arg = MetaAny::from_ref(&value);
        for form in [Ref, Ptr] {
            let param = TypeTraits::of::<u32>(form);
            assert_eq!(
                can_arg_be_passed_into_param(&arg, form, param),
                Err(ArgError::ConstToMutable),
                "{form:?}"
            );
        }
        let param = TypeTraits::of::<u32>(ConstRef);
        assert!(can_arg_be_passed_into_param(&arg, Ref, param).is_ok());
        let param = TypeTraits::of::<u32>(Value);
        assert!(can_arg_be_passed_into_param(&arg, Ref, param).is_ok());
    }

    #[test]
    fn wildcard_accepts_anything() {
        let value = 3.5f64;
        let arg = MetaAny::from_ref(&value);
        let param = TypeTraits::new(wildcard_type_id(), ConstRef);
        assert!(can_arg_be_passed_into_param(&arg, ConstRef, param).is_ok());
    }
}
