// func.rs - Reflected functions and dynamic invocation
//
// Every function is stored as a type-erased thunk behind an RwLock so that a
// declared function can later be redirected to its real body.

use crate::any::MetaAny;
use crate::func_result::{FuncError, FuncResult};
use crate::name::Name;
use crate::props::MetaProps;
use crate::type_id::{fnv1a, fnv1a_extend};
use crate::type_traits::{can_arg_be_passed_into_param, TypeForm, TypeTraits};
use crate::Reflect;
use std::fmt;
use std::ptr::NonNull;
use std::sync::{Arc, PoisonError, RwLock};

/// Caller-provided storage a value-returning function constructs into.
pub type RvoBuffer = NonNull<u8>;

pub type FuncThunk = Arc<
    dyn for<'a, 'b> Fn(&'b mut [MetaAny<'a>], Option<RvoBuffer>) -> FuncResult<'a> + Send + Sync,
>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OperatorType {
    Constructor,
    Destructor,
    Assign,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    Negate,
    Equal,
    Inequal,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Not,
    Subscript,
    Call,
}

impl OperatorType {
    pub fn symbol(self) -> &'static str {
        match self {
            OperatorType::Constructor => "constructor",
            OperatorType::Destructor => "destructor",
            OperatorType::Assign => "operator=",
            OperatorType::Add => "operator+",
            OperatorType::Subtract => "operator-",
            OperatorType::Multiply => "operator*",
            OperatorType::Divide => "operator/",
            OperatorType::Modulus => "operator%",
            OperatorType::Negate => "operator-(unary)",
            OperatorType::Equal => "operator==",
            OperatorType::Inequal => "operator!=",
            OperatorType::Less => "operator<",
            OperatorType::LessOrEqual => "operator<=",
            OperatorType::Greater => "operator>",
            OperatorType::GreaterOrEqual => "operator>=",
            OperatorType::Not => "operator!",
            OperatorType::Subscript => "operator[]",
            OperatorType::Call => "operator()",
        }
    }

    /// Operators that are never inherited from base classes.
    pub fn is_special_member(self) -> bool {
        matches!(
            self,
            OperatorType::Constructor | OperatorType::Destructor | OperatorType::Assign
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NameOrOperator {
    Name(Name),
    Operator(OperatorType),
}

impl NameOrOperator {
    pub fn as_name(&self) -> Option<&Name> {
        match self {
            NameOrOperator::Name(name) => Some(name),
            NameOrOperator::Operator(_) => None,
        }
    }

    pub fn as_operator(&self) -> Option<OperatorType> {
        match self {
            NameOrOperator::Operator(op) => Some(*op),
            NameOrOperator::Name(_) => None,
        }
    }
}

impl From<&str> for NameOrOperator {
    fn from(name: &str) -> Self {
        NameOrOperator::Name(Name::new(name))
    }
}

impl From<String> for NameOrOperator {
    fn from(name: String) -> Self {
        NameOrOperator::Name(Name::new(name))
    }
}

impl From<Name> for NameOrOperator {
    fn from(name: Name) -> Self {
        NameOrOperator::Name(name)
    }
}

impl From<OperatorType> for NameOrOperator {
    fn from(op: OperatorType) -> Self {
        NameOrOperator::Operator(op)
    }
}

impl fmt::Display for NameOrOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameOrOperator::Name(name) => fmt::Display::fmt(name, f),
            NameOrOperator::Operator(op) => f.write_str(op.symbol()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetaFuncNamedParam {
    pub traits: TypeTraits,
    pub name: Name,
}

impl MetaFuncNamedParam {
    pub fn new(traits: TypeTraits, name: impl Into<Name>) -> Self {
        Self {
            traits,
            name: name.into(),
        }
    }
}

/// Identity of a signature. Parameter names do not take part.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub u32);

impl FuncId {
    pub fn of(ret: TypeTraits, params: &[TypeTraits]) -> Self {
        let mut hash = fnv1a(b"FuncId");
        for traits in std::iter::once(&ret).chain(params) {
            hash = fnv1a_extend(hash, &traits.type_id.raw().to_le_bytes());
            hash = fnv1a_extend(hash, &[traits.form.as_byte()]);
        }
        FuncId(hash)
    }
}

/// Arguments for a dynamic call: each value with the form it is passed in.
#[derive(Default, Debug)]
pub struct MetaArgs<'a> {
    values: Vec<MetaAny<'a>>,
    forms: Vec<TypeForm>,
}

impl<'a> MetaArgs<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
            forms: Vec::with_capacity(capacity),
        }
    }

    /// Moves `value` in; the callee may take ownership of it.
    pub fn value<T: Reflect>(self, value: T) -> Self {
        self.any(MetaAny::new(value), TypeForm::RValue)
    }

    pub fn by_ref<T: 'static>(self, value: &'a T) -> Self {
        self.any(MetaAny::from_ref(value), TypeForm::ConstRef)
    }

    pub fn by_mut<T: 'static>(self, value: &'a mut T) -> Self {
        self.any(MetaAny::from_mut(value), TypeForm::Ref)
    }

    pub fn any(mut self, value: MetaAny<'a>, form: TypeForm) -> Self {
        self.push(value, form);
        self
    }

    pub fn null(self, form: TypeForm) -> Self {
        self.any(MetaAny::null(), form)
    }

    pub fn push(&mut self, value: MetaAny<'a>, form: TypeForm) {
        self.values.push(value);
        self.forms.push(form);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[MetaAny<'a>] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [MetaAny<'a>] {
        &mut self.values
    }

    pub fn forms(&self) -> &[TypeForm] {
        &self.forms
    }

    pub fn into_values(self) -> Vec<MetaAny<'a>> {
        self.values
    }
}

pub struct MetaFunc {
    name_or_op: NameOrOperator,
    ret: TypeTraits,
    params: Vec<MetaFuncNamedParam>,
    func_id: FuncId,
    props: MetaProps,
    thunk: RwLock<FuncThunk>,
}

impl MetaFunc {
    pub fn new<F>(
        name_or_op: impl Into<NameOrOperator>,
        ret: TypeTraits,
        params: Vec<MetaFuncNamedParam>,
        thunk: F,
    ) -> Self
    where
        F: for<'a, 'b> Fn(&'b mut [MetaAny<'a>], Option<RvoBuffer>) -> FuncResult<'a>
            + Send
            + Sync
            + 'static,
    {
        let param_traits: Vec<TypeTraits> = params.iter().map(|p| p.traits).collect();
        Self {
            name_or_op: name_or_op.into(),
            func_id: FuncId::of(ret, &param_traits),
            ret,
            params,
            props: MetaProps::new(),
            thunk: RwLock::new(Arc::new(thunk)),
        }
    }

    #[inline]
    pub fn name_or_op(&self) -> &NameOrOperator {
        &self.name_or_op
    }

    #[inline]
    pub fn return_traits(&self) -> TypeTraits {
        self.ret
    }

    #[inline]
    pub fn params(&self) -> &[MetaFuncNamedParam] {
        &self.params
    }

    #[inline]
    pub fn func_id(&self) -> FuncId {
        self.func_id
    }

    #[inline]
    pub fn props(&self) -> &MetaProps {
        &self.props
    }

    #[inline]
    pub fn props_mut(&mut self) -> &mut MetaProps {
        &mut self.props
    }

    /// Replaces the body. The signature stays the same.
    pub fn redirect_function<F>(&self, thunk: F)
    where
        F: for<'a, 'b> Fn(&'b mut [MetaAny<'a>], Option<RvoBuffer>) -> FuncResult<'a>
            + Send
            + Sync
            + 'static,
    {
        *self.thunk.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(thunk);
    }

    pub fn can_invoke_with(&self, args: &MetaArgs<'_>) -> Result<(), FuncError> {
        if args.len() != self.params.len() {
            return Err(FuncError::ArgCount {
                expected: self.params.len(),
                found: args.len(),
            });
        }
        for (index, ((value, form), param)) in args
            .values()
            .iter()
            .zip(args.forms())
            .zip(&self.params)
            .enumerate()
        {
            can_arg_be_passed_into_param(value, *form, param.traits).map_err(|source| {
                FuncError::ArgMismatch {
                    index,
                    param: param.name.clone(),
                    source,
                }
            })?;
        }
        Ok(())
    }

    /// Validates the arguments, then invokes. Nothing runs when validation fails.
    pub fn invoke_checked<'a>(&self, args: &mut MetaArgs<'a>, rvo: Option<RvoBuffer>) -> FuncResult<'a> {
        self.can_invoke_with(args)?;
        // SAFETY: the arguments were just validated.
        unsafe { self.invoke_unchecked(args, rvo) }
    }

    /// Invokes without validation. On success, arguments bound to by-move
    /// parameters are consumed and left null.
    ///
    /// # Safety
    /// `args` must pass [`MetaFunc::can_invoke_with`], and `rvo`, if given,
    /// must point to uninitialized storage for the return type.
    pub unsafe fn invoke_unchecked<'a>(&self, args: &mut MetaArgs<'a>, rvo: Option<RvoBuffer>) -> FuncResult<'a> {
        debug_assert!(
            self.can_invoke_with(args).is_ok(),
            "invalid arguments for {}",
            self.name_or_op
        );
        let result = self.call_thunk(args.values_mut(), rvo);
        if result.is_ok() {
            for (value, param) in args.values_mut().iter_mut().zip(&self.params) {
                if param.traits.form == TypeForm::RValue && value.is_owner() {
                    value.release_consumed();
                }
            }
        }
        result
    }

    /// Raw call. No validation and no consumption of moved arguments.
    pub(crate) fn call_thunk<'a>(&self, args: &mut [MetaAny<'a>], rvo: Option<RvoBuffer>) -> FuncResult<'a> {
        let thunk = self
            .thunk
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        thunk(args, rvo)
    }
}

impl fmt::Debug for MetaFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaFunc")
            .field("name", &self.name_or_op)
            .field("ret", &self.ret)
            .field("params", &self.params)
            .field("func_id", &self.func_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::func_result::FuncResultExt;
    use crate::type_traits::ArgError;

    fn add_i32() -> MetaFunc {
        MetaFunc::new(
            "add",
            TypeTraits::of::<i32>(TypeForm::Value),
            vec![
                MetaFuncNamedParam::new(TypeTraits::of::<i32>(TypeForm::ConstRef), "a"),
                MetaFuncNamedParam::new(TypeTraits::of::<i32>(TypeForm::ConstRef), "b"),
            ],
            |args, _rvo| {
                let a = *args[0].try_get::<i32>().ok_or(FuncError::BadArgument { index: 0 })?;
                let b = *args[1].try_get::<i32>().ok_or(FuncError::BadArgument { index: 1 })?;
                Ok(Some(MetaAny::new(a + b)))
            },
        )
    }

    #[test]
    fn checked_invocation() {
        let func = add_i32();
        let (x, y) = (2, 40);
        let mut args = MetaArgs::new().by_ref(&x).by_ref(&y);
        assert_eq!(func.invoke_checked(&mut args, None).into_typed::<i32>().unwrap(), 42);
    }

    #[test]
    fn wrong_count_or_type_does_not_invoke() {
        let func = add_i32();
        let mut args = MetaArgs::new().value(1i32);
        assert!(matches!(
            func.invoke_checked(&mut args, None),
            Err(FuncError::ArgCount { expected: 2, found: 1 })
        ));

        let mut args = MetaArgs::new().value(1i32).value(2.0f32);
        match func.invoke_checked(&mut args, None) {
            Err(FuncError::ArgMismatch { index, param, source }) => {
                assert_eq!(index, 1);
                assert_eq!(param, "b");
                assert!(matches!(source, ArgError::TypeMismatch { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn func_id_ignores_names() {
        let a = FuncId::of(
            TypeTraits::VOID,
            &[TypeTraits::of::<u8>(TypeForm::Ref)],
        );
        let b = FuncId::of(
            TypeTraits::VOID,
            &[TypeTraits::of::<u8>(TypeForm::ConstRef)],
        );
        assert_ne!(a, b);
        assert_eq!(add_i32().func_id(), add_i32().func_id());
    }

    #[test]
    fn redirect_replaces_body() {
        let func = MetaFunc::new("answer", TypeTraits::of::<u32>(TypeForm::Value), vec![], |_, _| {
            Ok(Some(MetaAny::new(1u32)))
        });
        func.redirect_function(|_, _| Ok(Some(MetaAny::new(2u32))));
        let mut args = MetaArgs::new();
        assert_eq!(func.invoke_checked(&mut args, None).into_typed::<u32>().unwrap(), 2);
    }

    #[test]
    fn moved_arguments_are_consumed() {
        let func = MetaFunc::new(
            "sink",
            TypeTraits::VOID,
            vec![MetaFuncNamedParam::new(
                TypeTraits::of::<String>(TypeForm::RValue),
                "value",
            )],
            |args, _| {
                let value = args[0].try_get_mut::<String>().ok_or(FuncError::BadArgument { index: 0 })?;
                // SAFETY: the parameter is by-move; the handle is consumed afterwards.
                let owned = unsafe { std::ptr::read(value) };
                assert_eq!(owned, "moved");
                Ok(None)
            },
        );
        let mut args = MetaArgs::new().value(String::from("moved"));
        assert!(func.invoke_checked(&mut args, None).unwrap().is_none());
        assert!(args.values()[0].is_null());

        let text = String::from("borrowed");
        let mut args = MetaArgs::new().any(MetaAny::from_ref(&text), TypeForm::RValue);
        assert!(func.invoke_checked(&mut args, None).is_err());
    }
}
