//! Latch Meta
//!
//! Runtime reflection for the engine:
//! - Type registry with fields, functions, bases and properties
//! - Type-erased values and checked function invocation
//! - Reflection-driven JSON serialization
//! - Types declared at runtime by scripts

pub mod any;
pub mod builder;
pub mod builtin;
pub mod field;
pub mod func;
pub mod func_result;
pub mod into_func;
pub mod manager;
pub mod meta_type;
pub mod name;
pub mod props;
pub mod script_type;
pub mod serialization;
pub mod special_member;
pub mod startup;
pub mod type_id;
pub mod type_info;
pub mod type_traits;

pub use any::MetaAny;
pub use builder::{MetaTypeBuilder, Reflect};
pub use builtin::reflect_builtins;
pub use field::MetaField;
pub use func::{FuncId, MetaArgs, MetaFunc, MetaFuncNamedParam, NameOrOperator, OperatorType, RvoBuffer};
pub use func_result::{FuncError, FuncResult, FuncResultExt};
pub use manager::{MetaManager, RegistryError};
pub use meta_type::{BaseClass, MetaType};
pub use name::Name;
pub use props::MetaProps;
pub use serialization::SerializeError;
pub use special_member::SpecialMember;
pub use startup::StartupReflection;
pub use type_id::{type_id_of, TypeId};
pub use type_info::{TypeFlags, TypeInfo};
pub use type_traits::{ArgError, TypeForm, TypeTraits};

pub use glam;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
