// serialization.rs - JSON (de)serialization driven by reflection
//
// A type that registers the fixed-name serialize/deserialize functions (see
// `MetaTypeBuilder::with_serde`) is written by them. Everything else is
// written as an object keyed by field name, inherited fields first.

use crate::any::MetaAny;
use crate::func::MetaArgs;
use crate::func_result::FuncError;
use crate::meta_type::MetaType;
use crate::type_id::TypeId;
use crate::type_traits::TypeForm;
use serde_json::{Map, Value};
use thiserror::Error;

pub const SERIALIZE_FUNC_NAME: &str = "__Serialize";
pub const DESERIALIZE_FUNC_NAME: &str = "__Deserialize";

#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("type {0} is not registered")]
    TypeNotRegistered(TypeId),

    #[error("cannot serialize a null value")]
    Null,

    #[error("cannot deserialize into a const value")]
    ReadOnly,

    #[error("{type_name} expects a JSON object")]
    ExpectedObject { type_name: String },

    #[error("field {field} of {type_name} is not accessible")]
    FieldAccess { type_name: String, field: String },

    #[error("serialize function of {type_name} returned no value")]
    NoReturnValue { type_name: String },

    #[error(transparent)]
    Func(#[from] FuncError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn registered_type(obj: &MetaAny<'_>) -> Result<&'static MetaType, SerializeError> {
    if obj.is_null() {
        return Err(SerializeError::Null);
    }
    obj.try_get_type()
        .ok_or(SerializeError::TypeNotRegistered(obj.type_id()))
}

pub fn serialize(obj: &MetaAny<'_>) -> Result<Value, SerializeError> {
    let ty = registered_type(obj)?;

    if let Some(func) = ty.try_get_own_funcs(SERIALIZE_FUNC_NAME).first() {
        let mut args = MetaArgs::new().any(obj.as_ref(), TypeForm::ConstRef);
        let result = func
            .invoke_checked(&mut args, None)?
            .ok_or_else(|| SerializeError::NoReturnValue {
                type_name: ty.name().to_string(),
            })?;
        return result.take::<Value>().map_err(|_| SerializeError::NoReturnValue {
            type_name: ty.name().to_string(),
        });
    }

    let mut map = Map::new();
    for field in ty.each_field() {
        let value = field
            .make_ref(obj)
            .ok_or_else(|| SerializeError::FieldAccess {
                type_name: ty.name().to_string(),
                field: field.name().to_string(),
            })?;
        map.insert(field.name().to_string(), serialize(&value)?);
    }
    Ok(Value::Object(map))
}

/// Overwrites `obj` from `json`. Field-wise deserialization keeps the current
/// value of fields missing from `json`.
pub fn deserialize_into(obj: &mut MetaAny<'_>, json: &Value) -> Result<(), SerializeError> {
    let ty = registered_type(obj)?;
    if obj.is_const() {
        return Err(SerializeError::ReadOnly);
    }

    if let Some(func) = ty.try_get_own_funcs(DESERIALIZE_FUNC_NAME).first() {
        let mut args = MetaArgs::new()
            .any(obj.as_mut(), TypeForm::Ref)
            .by_ref(json);
        func.invoke_checked(&mut args, None)?;
        return Ok(());
    }

    let Value::Object(map) = json else {
        return Err(SerializeError::ExpectedObject {
            type_name: ty.name().to_string(),
        });
    };
    for field in ty.each_field() {
        let Some(value) = map.get(field.name().as_str()) else {
            continue;
        };
        let mut target = field
            .make_mut(obj)
            .ok_or_else(|| SerializeError::FieldAccess {
                type_name: ty.name().to_string(),
                field: field.name().to_string(),
            })?;
        deserialize_into(&mut target, value)?;
    }
    Ok(())
}

/// Default-constructs a `ty` and deserializes `json` into it.
pub fn deserialize_new(ty: &MetaType, json: &Value) -> Result<MetaAny<'static>, SerializeError> {
    let mut obj = ty.construct(&mut MetaArgs::new())?;
    deserialize_into(&mut obj, json)?;
    Ok(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{MetaTypeBuilder, Reflect};
    use crate::manager::MetaManager;
    use glam::Vec3;
    use serde_json::json;
    use std::mem::offset_of;

    #[derive(Clone, Default, Debug, PartialEq)]
    struct Transformish {
        position: Vec3,
        name: String,
        layer: u8,
    }

    impl Reflect for Transformish {
        fn reflect() -> MetaType {
            MetaTypeBuilder::<Transformish>::new("SerializationTransformish")
                .with_default()
                .with_clone()
                .field::<Vec3>("position", offset_of!(Transformish, position))
                .field::<String>("name", offset_of!(Transformish, name))
                .field::<u8>("layer", offset_of!(Transformish, layer))
                .build()
        }
    }

    #[test]
    fn field_wise_object() {
        let ty = MetaManager::get().get_type::<Transformish>();
        let value = Transformish {
            position: Vec3::new(1.0, 2.0, 3.0),
            name: "crate".into(),
            layer: 2,
        };
        let json = serialize(&MetaAny::from_ref(&value)).unwrap();
        assert_eq!(
            json,
            json!({ "position": [1.0, 2.0, 3.0], "name": "crate", "layer": 2 })
        );

        let restored = deserialize_new(ty, &json).unwrap();
        assert_eq!(restored.try_get::<Transformish>(), Some(&value));
    }

    #[test]
    fn missing_keys_keep_their_value() {
        MetaManager::get().get_type::<Transformish>();
        let mut value = Transformish {
            layer: 7,
            ..Default::default()
        };
        let mut obj = MetaAny::from_mut(&mut value);
        deserialize_into(&mut obj, &json!({ "name": "renamed" })).unwrap();
        drop(obj);
        assert_eq!(value.name, "renamed");
        assert_eq!(value.layer, 7);
    }

    #[test]
    fn errors_are_reported() {
        MetaManager::get().get_type::<Transformish>();
        let mut value = Transformish::default();
        let mut obj = MetaAny::from_mut(&mut value);
        assert!(matches!(
            deserialize_into(&mut obj, &json!([1, 2])),
            Err(SerializeError::ExpectedObject { .. })
        ));
        assert!(deserialize_into(&mut obj, &json!({ "layer": "high" })).is_err());

        let frozen = Transformish::default();
        let mut obj = MetaAny::from_ref(&frozen);
        assert!(matches!(
            deserialize_into(&mut obj, &json!({})),
            Err(SerializeError::ReadOnly)
        ));
        assert!(matches!(serialize(&MetaAny::null()), Err(SerializeError::Null)));
    }
}
