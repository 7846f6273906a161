// into_func.rs - Typed Rust closures as reflected functions
//
// Parameters are declared by const reference and cloned out of the argument
// handles. Results are returned by value, or written into the caller's return
// buffer when one is provided.

use crate::any::MetaAny;
use crate::func::{MetaFunc, MetaFuncNamedParam, NameOrOperator, RvoBuffer};
use crate::func_result::{FuncError, FuncResult};
use crate::manager::MetaManager;
use crate::type_traits::{TypeForm, TypeTraits};
use crate::Reflect;
use std::ptr;

/// A value a reflected function can return.
pub trait FuncReturn: 'static {
    fn return_traits() -> TypeTraits;

    fn into_func_result<'a>(self, rvo: Option<RvoBuffer>) -> FuncResult<'a>;
}

impl FuncReturn for () {
    fn return_traits() -> TypeTraits {
        TypeTraits::VOID
    }

    fn into_func_result<'a>(self, _rvo: Option<RvoBuffer>) -> FuncResult<'a> {
        Ok(None)
    }
}

impl<T: Reflect> FuncReturn for T {
    fn return_traits() -> TypeTraits {
        TypeTraits::of::<T>(TypeForm::Value)
    }

    fn into_func_result<'a>(self, rvo: Option<RvoBuffer>) -> FuncResult<'a> {
        match rvo {
            Some(buffer) => {
                let info = *MetaManager::get().get_type::<T>().type_info();
                let data = buffer.as_ptr();
                // SAFETY: the caller provides uninitialized storage for a T and
                // owns it; the returned handle only borrows it.
                unsafe {
                    ptr::write(data as *mut T, self);
                    Ok(Some(MetaAny::from_raw_parts(info, data, false, false)))
                }
            }
            None => Ok(Some(MetaAny::new(self))),
        }
    }
}

fn param_of<A: 'static>(index: usize) -> MetaFuncNamedParam {
    MetaFuncNamedParam::new(
        TypeTraits::of::<A>(TypeForm::ConstRef),
        format!("arg{index}"),
    )
}

fn this_param<T: 'static>(form: TypeForm) -> MetaFuncNamedParam {
    MetaFuncNamedParam::new(TypeTraits::of::<T>(form), "this")
}

/// Clones argument `index` of `args` out as `A`. Errors report `index + first`.
fn arg_value<A: Clone + 'static>(args: &[MetaAny<'_>], index: usize, first: usize) -> Result<A, FuncError> {
    args.get(index)
        .and_then(|arg| arg.try_get::<A>())
        .cloned()
        .ok_or(FuncError::BadArgument {
            index: index + first,
        })
}

/// Free functions and closures: `Fn(A0, A1, ..) -> R`.
pub trait IntoMetaFunc<Marker>: Send + Sync + 'static {
    fn into_meta_func(self, name: NameOrOperator) -> MetaFunc;
}

/// Methods taking `&T` as receiver.
pub trait IntoMetaMethod<T, Marker>: Send + Sync + 'static {
    fn into_meta_method(self, name: NameOrOperator) -> MetaFunc;
}

/// Methods taking `&mut T` as receiver.
pub trait IntoMetaMethodMut<T, Marker>: Send + Sync + 'static {
    fn into_meta_method_mut(self, name: NameOrOperator) -> MetaFunc;
}

macro_rules! impl_into_meta_func {
    ($($arg:ident $idx:tt),*) => {
        impl<Func, Ret, $($arg,)*> IntoMetaFunc<fn($($arg,)*) -> Ret> for Func
        where
            Func: Fn($($arg),*) -> Ret + Send + Sync + 'static,
            Ret: FuncReturn,
            $($arg: Reflect + Clone,)*
        {
            #[allow(unused_variables)]
            fn into_meta_func(self, name: NameOrOperator) -> MetaFunc {
                let params = vec![$(param_of::<$arg>($idx),)*];
                MetaFunc::new(name, Ret::return_traits(), params, move |args, rvo| {
                    let result = (self)($(arg_value::<$arg>(args, $idx, 0)?),*);
                    result.into_func_result(rvo)
                })
            }
        }

        impl<T, Func, Ret, $($arg,)*> IntoMetaMethod<T, fn($($arg,)*) -> Ret> for Func
        where
            T: 'static,
            Func: Fn(&T, $($arg),*) -> Ret + Send + Sync + 'static,
            Ret: FuncReturn,
            $($arg: Reflect + Clone,)*
        {
            #[allow(unused_variables)]
            fn into_meta_method(self, name: NameOrOperator) -> MetaFunc {
                let params = vec![this_param::<T>(TypeForm::ConstRef), $(param_of::<$arg>($idx),)*];
                MetaFunc::new(name, Ret::return_traits(), params, move |args, rvo| {
                    let (this, rest) = args
                        .split_first()
                        .ok_or(FuncError::BadArgument { index: 0 })?;
                    let this = this.try_get::<T>().ok_or(FuncError::BadArgument { index: 0 })?;
                    let result = (self)(this, $(arg_value::<$arg>(rest, $idx, 1)?),*);
                    result.into_func_result(rvo)
                })
            }
        }

        impl<T, Func, Ret, $($arg,)*> IntoMetaMethodMut<T, fn($($arg,)*) -> Ret> for Func
        where
            T: 'static,
            Func: Fn(&mut T, $($arg),*) -> Ret + Send + Sync + 'static,
            Ret: FuncReturn,
            $($arg: Reflect + Clone,)*
        {
            #[allow(unused_variables)]
            fn into_meta_method_mut(self, name: NameOrOperator) -> MetaFunc {
                let params = vec![this_param::<T>(TypeForm::Ref), $(param_of::<$arg>($idx),)*];
                MetaFunc::new(name, Ret::return_traits(), params, move |args, rvo| {
                    let (this, rest) = args
                        .split_first_mut()
                        .ok_or(FuncError::BadArgument { index: 0 })?;
                    let this = this.try_get_mut::<T>().ok_or(FuncError::BadArgument { index: 0 })?;
                    let result = (self)(this, $(arg_value::<$arg>(rest, $idx, 1)?),*);
                    result.into_func_result(rvo)
                })
            }
        }
    };
}

impl_into_meta_func!();
impl_into_meta_func!(A0 0);
impl_into_meta_func!(A0 0, A1 1);
impl_into_meta_func!(A0 0, A1 1, A2 2);
impl_into_meta_func!(A0 0, A1 1, A2 2, A3 3);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::func::MetaArgs;
    use crate::func_result::FuncResultExt;
    use crate::type_traits::TypeForm;

    #[derive(Clone, Debug, PartialEq)]
    struct Counter {
        count: u32,
    }

    impl Reflect for Counter {
        fn reflect() -> crate::MetaType {
            crate::MetaTypeBuilder::<Counter>::new("IntoFuncCounter").with_clone().build()
        }
    }

    #[test]
    fn closure_signature_is_reflected() {
        let func = (|a: f64, b: f64| a * b).into_meta_func("mul".into());
        assert_eq!(func.return_traits(), TypeTraits::of::<f64>(TypeForm::Value));
        assert_eq!(func.params().len(), 2);
        assert_eq!(func.params()[1].name, "arg1");

        let mut args = MetaArgs::new().value(3.0f64).value(0.5f64);
        assert_eq!(func.invoke_checked(&mut args, None).into_typed::<f64>().unwrap(), 1.5);
    }

    #[test]
    fn unit_return_is_void() {
        let func = (|| ()).into_meta_func("noop".into());
        assert!(func.return_traits().is_void());
        assert!(func.invoke_checked(&mut MetaArgs::new(), None).unwrap().is_none());
    }

    #[test]
    fn methods_receive_the_object() {
        let get = (|c: &Counter| c.count).into_meta_method("get".into());
        let add = (|c: &mut Counter, n: u32| c.count += n).into_meta_method_mut("add".into());
        assert_eq!(add.params()[0].traits.form, TypeForm::Ref);

        let mut counter = Counter { count: 1 };
        let mut args = MetaArgs::new().by_mut(&mut counter).value(4u32);
        add.invoke_checked(&mut args, None).unwrap();
        drop(args);
        assert_eq!(counter.count, 5);

        let mut args = MetaArgs::new().by_ref(&counter);
        assert_eq!(get.invoke_checked(&mut args, None).into_typed::<u32>().unwrap(), 5);

        // A const receiver cannot bind to `&mut self`.
        let mut args = MetaArgs::new().by_ref(&counter).value(1u32);
        assert!(add.invoke_checked(&mut args, None).is_err());
    }

    #[test]
    fn return_buffer_receives_the_result() {
        let make = (|| Counter { count: 7 }).into_meta_func("make".into());
        let mut slot = std::mem::MaybeUninit::<Counter>::uninit();
        let buffer = RvoBuffer::new(slot.as_mut_ptr() as *mut u8);
        let handle = make
            .invoke_checked(&mut MetaArgs::new(), buffer)
            .into_return_value()
            .unwrap();
        assert!(!handle.is_owner());
        drop(handle);
        // SAFETY: the function constructed a Counter in the buffer.
        let counter = unsafe { slot.assume_init() };
        assert_eq!(counter, Counter { count: 7 });
    }
}
