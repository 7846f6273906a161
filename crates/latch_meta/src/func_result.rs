// func_result.rs - Outcome of a dynamic invocation

use crate::any::MetaAny;
use crate::name::Name;
use crate::type_id::TypeId;
use crate::type_traits::ArgError;
use thiserror::Error;

/// `Ok(None)`: no return value. `Ok(Some(_))`: a return value.
pub type FuncResult<'a> = Result<Option<MetaAny<'a>>, FuncError>;

#[derive(Debug, Error)]
pub enum FuncError {
    #[error("expected {expected} arguments, but {found} were provided")]
    ArgCount { expected: usize, found: usize },

    #[error("argument {index} ({param}): {source}")]
    ArgMismatch {
        index: usize,
        param: Name,
        #[source]
        source: ArgError,
    },

    #[error("argument {index} could not be read as its parameter type")]
    BadArgument { index: usize },

    #[error(
        "no overload of {name} accepts these arguments ({candidates} candidates rejected: {})",
        .reasons.join("; ")
    )]
    NoMatchingOverload {
        name: String,
        candidates: usize,
        reasons: Vec<String>,
    },

    #[error("{type_name} has no function named {name}")]
    FuncNotFound { type_name: String, name: String },

    #[error("type {0} is not registered")]
    TypeNotRegistered(TypeId),

    #[error("{type_name} does not support {operation}")]
    NotSupported {
        type_name: String,
        operation: &'static str,
    },

    #[error("cannot assign to a const value")]
    AssignToConst,

    #[error("cannot change the type of a borrowed value")]
    AssignToBorrowed,

    #[error("function returned no value")]
    NoReturnValue,

    #[error("{0}")]
    Custom(String),
}

impl FuncError {
    pub fn custom(message: impl Into<String>) -> Self {
        FuncError::Custom(message.into())
    }
}

/// Helpers for reading a [`FuncResult`].
pub trait FuncResultExt<'a> {
    /// The return value, or `NoReturnValue` if there was none.
    fn into_return_value(self) -> Result<MetaAny<'a>, FuncError>;

    /// The return value moved out as `T`.
    fn into_typed<T: 'static>(self) -> Result<T, FuncError>;
}

impl<'a> FuncResultExt<'a> for FuncResult<'a> {
    fn into_return_value(self) -> Result<MetaAny<'a>, FuncError> {
        self?.ok_or(FuncError::NoReturnValue)
    }

    fn into_typed<T: 'static>(self) -> Result<T, FuncError> {
        let value = self.into_return_value()?;
        let type_id = value.type_id();
        value.take::<T>().map_err(|_| FuncError::Custom(format!(
            "return value of type {type_id} is not an owned {}",
            std::any::type_name::<T>()
        )))
    }
}
