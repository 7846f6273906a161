// builtin.rs - Reflection of primitives, strings and the engine math types

use crate::builder::{MetaTypeBuilder, Reflect};
use crate::func::OperatorType;
use crate::manager::MetaManager;
use crate::meta_type::MetaType;
use glam::{Quat, Vec2, Vec3, Vec4};
use std::mem::offset_of;

/// Copy, zeroed default, serde and equality.
macro_rules! primitive_builder {
    ($ty:ty, $name:literal) => {{
        let builder = MetaTypeBuilder::<$ty>::new($name).with_copy();
        // SAFETY: all-zero bytes are a valid value of every primitive.
        let builder = unsafe { builder.with_zeroed_default() };
        builder.with_serde().with_eq()
    }};
}

macro_rules! reflect_comparisons {
    ($builder:expr, $ty:ty) => {
        $builder
            .func(OperatorType::Less, |a: $ty, b: $ty| a < b)
            .func(OperatorType::LessOrEqual, |a: $ty, b: $ty| a <= b)
            .func(OperatorType::Greater, |a: $ty, b: $ty| a > b)
            .func(OperatorType::GreaterOrEqual, |a: $ty, b: $ty| a >= b)
    };
}

macro_rules! reflect_integers {
    ($($ty:ty => $name:literal),* $(,)?) => {$(
        impl Reflect for $ty {
            fn reflect() -> MetaType {
                let builder = primitive_builder!($ty, $name)
                    .func(OperatorType::Add, |a: $ty, b: $ty| a.wrapping_add(b))
                    .func(OperatorType::Subtract, |a: $ty, b: $ty| a.wrapping_sub(b))
                    .func(OperatorType::Multiply, |a: $ty, b: $ty| a.wrapping_mul(b));
                reflect_comparisons!(builder, $ty).build()
            }
        }
    )*};
}

macro_rules! reflect_floats {
    ($($ty:ty => $name:literal),* $(,)?) => {$(
        impl Reflect for $ty {
            fn reflect() -> MetaType {
                let builder = primitive_builder!($ty, $name)
                    .func(OperatorType::Add, |a: $ty, b: $ty| a + b)
                    .func(OperatorType::Subtract, |a: $ty, b: $ty| a - b)
                    .func(OperatorType::Multiply, |a: $ty, b: $ty| a * b)
                    .func(OperatorType::Divide, |a: $ty, b: $ty| a / b)
                    .func(OperatorType::Negate, |a: $ty| -a);
                reflect_comparisons!(builder, $ty).build()
            }
        }
    )*};
}

reflect_integers! {
    i8 => "i8", i16 => "i16", i32 => "i32", i64 => "i64", isize => "isize",
    u8 => "u8", u16 => "u16", u32 => "u32", u64 => "u64", usize => "usize",
}

reflect_floats! {
    f32 => "f32", f64 => "f64",
}

impl Reflect for bool {
    fn reflect() -> MetaType {
        primitive_builder!(bool, "bool")
            .func(OperatorType::Not, |a: bool| !a)
            .build()
    }
}

impl Reflect for char {
    fn reflect() -> MetaType {
        reflect_comparisons!(primitive_builder!(char, "char"), char).build()
    }
}

impl Reflect for String {
    fn reflect() -> MetaType {
        MetaTypeBuilder::<String>::new("String")
            .with_default()
            .with_clone()
            .with_serde()
            .with_eq()
            .func(OperatorType::Add, |a: String, b: String| a + &b)
            .method("len", |s: &String| s.len())
            .method("is_empty", |s: &String| s.is_empty())
            .build()
    }
}

impl Reflect for serde_json::Value {
    fn reflect() -> MetaType {
        MetaTypeBuilder::<serde_json::Value>::new("JsonValue")
            .with_default()
            .with_clone()
            .with_serde()
            .with_eq()
            .build()
    }
}

impl Reflect for Vec2 {
    fn reflect() -> MetaType {
        let builder = MetaTypeBuilder::<Vec2>::new("Vec2").with_copy();
        // SAFETY: zero is a valid vector.
        let builder = unsafe { builder.with_zeroed_default() };
        builder
            .with_serde()
            .with_eq()
            .field::<f32>("x", offset_of!(Vec2, x))
            .field::<f32>("y", offset_of!(Vec2, y))
            .func(OperatorType::Add, |a: Vec2, b: Vec2| a + b)
            .func(OperatorType::Subtract, |a: Vec2, b: Vec2| a - b)
            .func(OperatorType::Multiply, |a: Vec2, b: Vec2| a * b)
            .func(OperatorType::Multiply, |a: Vec2, b: f32| a * b)
            .func(OperatorType::Divide, |a: Vec2, b: f32| a / b)
            .func(OperatorType::Negate, |a: Vec2| -a)
            .method("length", |v: &Vec2| v.length())
            .method("dot", |v: &Vec2, other: Vec2| v.dot(other))
            .method("normalize_or_zero", |v: &Vec2| v.normalize_or_zero())
            .build()
    }
}

impl Reflect for Vec3 {
    fn reflect() -> MetaType {
        let builder = MetaTypeBuilder::<Vec3>::new("Vec3").with_copy();
        // SAFETY: zero is a valid vector.
        let builder = unsafe { builder.with_zeroed_default() };
        builder
            .with_serde()
            .with_eq()
            .field::<f32>("x", offset_of!(Vec3, x))
            .field::<f32>("y", offset_of!(Vec3, y))
            .field::<f32>("z", offset_of!(Vec3, z))
            .func(OperatorType::Add, |a: Vec3, b: Vec3| a + b)
            .func(OperatorType::Subtract, |a: Vec3, b: Vec3| a - b)
            .func(OperatorType::Multiply, |a: Vec3, b: Vec3| a * b)
            .func(OperatorType::Multiply, |a: Vec3, b: f32| a * b)
            .func(OperatorType::Divide, |a: Vec3, b: f32| a / b)
            .func(OperatorType::Negate, |a: Vec3| -a)
            .method("length", |v: &Vec3| v.length())
            .method("dot", |v: &Vec3, other: Vec3| v.dot(other))
            .method("cross", |v: &Vec3, other: Vec3| v.cross(other))
            .method("normalize_or_zero", |v: &Vec3| v.normalize_or_zero())
            .build()
    }
}

// Vec4 and Quat are SIMD-backed on most targets and expose no addressable
// fields, so components are reached through methods only.

impl Reflect for Vec4 {
    fn reflect() -> MetaType {
        let builder = MetaTypeBuilder::<Vec4>::new("Vec4").with_copy();
        // SAFETY: zero is a valid vector.
        let builder = unsafe { builder.with_zeroed_default() };
        builder
            .with_serde()
            .with_eq()
            .func(OperatorType::Add, |a: Vec4, b: Vec4| a + b)
            .func(OperatorType::Subtract, |a: Vec4, b: Vec4| a - b)
            .func(OperatorType::Multiply, |a: Vec4, b: f32| a * b)
            .func(OperatorType::Negate, |a: Vec4| -a)
            .method("x", |v: &Vec4| v.x)
            .method("y", |v: &Vec4| v.y)
            .method("z", |v: &Vec4| v.z)
            .method("w", |v: &Vec4| v.w)
            .method("length", |v: &Vec4| v.length())
            .method("dot", |v: &Vec4, other: Vec4| v.dot(other))
            .build()
    }
}

impl Reflect for Quat {
    fn reflect() -> MetaType {
        MetaTypeBuilder::<Quat>::new("Quat")
            .with_default()
            .with_copy()
            .with_serde()
            .with_eq()
            .func(OperatorType::Multiply, |a: Quat, b: Quat| a * b)
            .func("from_axis_angle", |axis: Vec3, angle: f32| Quat::from_axis_angle(axis, angle))
            .method("rotate", |q: &Quat, v: Vec3| *q * v)
            .method("inverse", |q: &Quat| q.inverse())
            .method("normalize", |q: &Quat| q.normalize())
            .build()
    }
}

/// Registers every builtin type. Returns how many there are.
pub fn reflect_builtins() -> usize {
    let manager = MetaManager::get();
    let types = [
        manager.get_type::<bool>(),
        manager.get_type::<char>(),
        manager.get_type::<i8>(),
        manager.get_type::<i16>(),
        manager.get_type::<i32>(),
        manager.get_type::<i64>(),
        manager.get_type::<isize>(),
        manager.get_type::<u8>(),
        manager.get_type::<u16>(),
        manager.get_type::<u32>(),
        manager.get_type::<u64>(),
        manager.get_type::<usize>(),
        manager.get_type::<f32>(),
        manager.get_type::<f64>(),
        manager.get_type::<String>(),
        manager.get_type::<serde_json::Value>(),
        manager.get_type::<Vec2>(),
        manager.get_type::<Vec3>(),
        manager.get_type::<Vec4>(),
        manager.get_type::<Quat>(),
    ];
    tracing::debug!(count = types.len(), "reflected builtin types");
    types.len()
}
