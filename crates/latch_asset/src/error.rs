// error.rs - Asset loading and saving errors

use latch_meta::serialization::SerializeError;
use latch_meta::{FuncError, TypeId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not an asset file (magic {0:#010x})")]
    BadMagic(u32),

    #[error("unsupported asset file version {0}")]
    UnsupportedVersion(u32),

    #[error("string in asset header is not UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("{field} is {len} bytes, more than the {max} allowed")]
    TooLarge {
        field: &'static str,
        len: u64,
        max: u64,
    },

    #[error("unknown asset class {0}")]
    UnknownClass(String),

    #[error("class {class} has type id {found} but {expected} is registered under that name")]
    ClassMismatch {
        class: String,
        expected: TypeId,
        found: TypeId,
    },

    #[error("{0} is not a component")]
    NotAComponent(String),

    #[error("invalid asset payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Serialize(#[from] SerializeError),

    #[error(transparent)]
    Func(#[from] FuncError),
}
