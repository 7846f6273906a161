// script_type.rs - Types declared at runtime by scripts
//
// Script types are created in two phases. `declare_meta_type` registers the
// layout and signatures so other types can refer to it; its special members
// panic until `define_meta_type` redirects them to field-wise bodies.

use crate::any::MetaAny;
use crate::func::{MetaFunc, RvoBuffer};
use crate::func_result::{FuncError, FuncResult};
use crate::manager::{MetaManager, RegistryError};
use crate::meta_type::MetaType;
use crate::field::MetaField;
use crate::props::{names, MetaProps};
use crate::serialization::deserialize_into;
use crate::special_member::SpecialMember;
use crate::type_id::TypeId;
use crate::type_info::{TypeFlags, TypeInfo};
use crate::type_traits::{TypeForm, TypeTraits};
use serde_json::Value;
use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct ScriptFieldDecl {
    pub name: String,
    pub type_id: TypeId,
    /// Overrides the field type's default construction.
    pub default_value: Option<Value>,
    pub props: MetaProps,
}

impl ScriptFieldDecl {
    pub fn new(name: impl Into<String>, type_id: TypeId) -> Self {
        Self {
            name: name.into(),
            type_id,
            default_value: None,
            props: MetaProps::new(),
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }
}

#[derive(Clone, Debug)]
pub struct ScriptTypeDecl {
    pub name: String,
    pub fields: Vec<ScriptFieldDecl>,
    pub props: MetaProps,
}

impl ScriptTypeDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            props: MetaProps::new(),
        }
    }

    pub fn field(mut self, field: ScriptFieldDecl) -> Self {
        self.fields.push(field);
        self
    }
}

#[derive(Debug, Error)]
pub enum ScriptTypeError {
    #[error("field {field} of {type_name} has unregistered type {type_id}")]
    UnknownFieldType {
        type_name: String,
        field: String,
        type_id: TypeId,
    },

    #[error("{type_name} declares field {field} twice")]
    DuplicateField { type_name: String, field: String },

    #[error("{0} is not a script type")]
    NotScripted(String),

    #[error("{0} is already defined")]
    AlreadyDefined(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Byte offsets for members of the given sizes and alignments, plus the
/// resulting size and alignment. Larger members are placed first; members of
/// equal size keep their declaration order.
pub fn compute_layout(members: &[(usize, usize)]) -> (Vec<usize>, usize, usize) {
    let mut order: Vec<usize> = (0..members.len()).collect();
    order.sort_by_key(|&i| Reverse(members[i].0));

    let mut offsets = vec![0; members.len()];
    let mut cursor = 0;
    let mut align = 1;
    for i in order {
        let (size, member_align) = members[i];
        let member_align = member_align.max(1);
        cursor = align_up(cursor, member_align);
        offsets[i] = cursor;
        cursor += size;
        align = align.max(member_align);
    }
    (offsets, align_up(cursor, align), align)
}

fn align_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

/// Registers a script type whose special members are not usable yet.
pub fn declare_meta_type(decl: &ScriptTypeDecl) -> Result<&'static MetaType, ScriptTypeError> {
    let manager = MetaManager::get();
    let type_id = TypeId::from_name(&decl.name);

    let mut seen = HashSet::new();
    let mut member_types = Vec::with_capacity(decl.fields.len());
    for field in &decl.fields {
        if !seen.insert(field.name.as_str()) {
            return Err(ScriptTypeError::DuplicateField {
                type_name: decl.name.clone(),
                field: field.name.clone(),
            });
        }
        let ty = manager
            .try_get_type(field.type_id)
            .ok_or_else(|| ScriptTypeError::UnknownFieldType {
                type_name: decl.name.clone(),
                field: field.name.clone(),
                type_id: field.type_id,
            })?;
        member_types.push(ty);
    }

    let mut flags = TypeFlags::ALL;
    for ty in &member_types {
        flags &= ty.type_info().flags;
    }
    if decl.fields.iter().any(|f| f.default_value.is_some()) {
        flags.remove(TypeFlags::TRIVIALLY_DEFAULT_CONSTRUCTIBLE);
    }

    let layouts: Vec<(usize, usize)> = member_types
        .iter()
        .map(|ty| (ty.type_info().size, ty.type_info().align))
        .collect();
    let (offsets, size, align) = compute_layout(&layouts);

    let mut ty = MetaType::new(decl.name.as_str(), TypeInfo::new(type_id, size, align, flags));
    for ((field, member), offset) in decl.fields.iter().zip(&member_types).zip(offsets) {
        let meta_field = ty.add_field(MetaField::new(
            type_id,
            TypeTraits::new(member.type_id(), TypeForm::Value),
            offset,
            field.name.as_str(),
        ));
        meta_field.props_mut().merge(&field.props);
        if let Some(default) = &field.default_value {
            meta_field
                .props_mut()
                .set_raw(names::DEFAULT_VALUE, default.to_string());
        }
    }

    for member in SpecialMember::ALL {
        let supported = match member {
            SpecialMember::DefaultConstructor => flags.contains(TypeFlags::DEFAULT_CONSTRUCTIBLE),
            SpecialMember::CopyConstructor => flags.contains(TypeFlags::COPY_CONSTRUCTIBLE),
            SpecialMember::CopyAssign => flags.contains(TypeFlags::COPY_ASSIGNABLE),
            _ => true,
        };
        if !supported {
            continue;
        }
        let type_name = decl.name.clone();
        ty.add_func(MetaFunc::new(
            member.operator(),
            member.return_traits(type_id),
            member.params(type_id),
            move |_, _| {
                panic!(
                    "{} of {type_name} was invoked before the type was defined",
                    member.name()
                )
            },
        ));
    }

    ty.props_mut().merge(&decl.props);
    ty.props_mut().add(names::SCRIPTED);
    ty.set_defined(false);

    let ty = manager.add_type(ty)?;
    tracing::debug!(name = %decl.name, size, align, fields = decl.fields.len(), "declared script type");
    Ok(ty)
}

#[derive(Clone)]
struct ScriptMember {
    offset: usize,
    ty: &'static MetaType,
    default_value: Option<Value>,
}

/// Gives a declared script type its field-wise special members.
pub fn define_meta_type(ty: &'static MetaType) -> Result<(), ScriptTypeError> {
    if !ty.props().has(names::SCRIPTED) {
        return Err(ScriptTypeError::NotScripted(ty.name().to_string()));
    }
    if ty.is_defined() {
        return Err(ScriptTypeError::AlreadyDefined(ty.name().to_string()));
    }

    let manager = MetaManager::get();
    let mut members = Vec::with_capacity(ty.fields().len());
    for field in ty.fields() {
        let field_type = manager
            .try_get_type(field.type_traits().type_id)
            .ok_or_else(|| ScriptTypeError::UnknownFieldType {
                type_name: ty.name().to_string(),
                field: field.name().to_string(),
                type_id: field.type_traits().type_id,
            })?;
        members.push(ScriptMember {
            offset: field.offset(),
            ty: field_type,
            default_value: field
                .props()
                .try_get_raw(names::DEFAULT_VALUE)
                .and_then(|raw| serde_json::from_str(raw).ok()),
        });
    }
    let members: Arc<[ScriptMember]> = members.into();

    for member in SpecialMember::ALL {
        let Some(func) = ty.special_member(member) else {
            continue;
        };
        let m = Arc::clone(&members);
        match member {
            SpecialMember::DefaultConstructor => func.redirect_function(move |_, rvo| {
                with_return_buffer(ty, rvo, |dst| unsafe { default_construct_members(&m, dst) })
            }),
            SpecialMember::CopyConstructor => func.redirect_function(move |args, rvo| {
                let src = arg_ptr(args, 0)?;
                with_return_buffer(ty, rvo, |dst| unsafe {
                    construct_members(&m, dst, |member, dst| member.ty.copy_construct_at(dst, src.add(member.offset)))
                })
            }),
            SpecialMember::MoveConstructor => func.redirect_function(move |args, rvo| {
                let src = arg_ptr(args, 0)? as *mut u8;
                with_return_buffer(ty, rvo, |dst| unsafe {
                    construct_members(&m, dst, |member, dst| member.ty.move_construct_at(dst, src.add(member.offset)))
                })
            }),
            SpecialMember::CopyAssign => func.redirect_function(move |args, _| {
                let (dst, src) = (arg_ptr(args, 0)? as *mut u8, arg_ptr(args, 1)?);
                for member in m.iter() {
                    unsafe { member.ty.copy_assign(dst.add(member.offset), src.add(member.offset))? };
                }
                Ok(None)
            }),
            SpecialMember::MoveAssign => func.redirect_function(move |args, _| {
                let (dst, src) = (arg_ptr(args, 0)? as *mut u8, arg_ptr(args, 1)? as *mut u8);
                for member in m.iter() {
                    unsafe { member.ty.move_assign(dst.add(member.offset), src.add(member.offset))? };
                }
                Ok(None)
            }),
            SpecialMember::Destructor => func.redirect_function(move |args, _| {
                let this = arg_ptr(args, 0)? as *mut u8;
                for member in m.iter().rev() {
                    unsafe { member.ty.destruct(this.add(member.offset), false) };
                }
                Ok(None)
            }),
        }
    }

    ty.set_defined(true);
    tracing::debug!(name = %ty.name(), "defined script type");
    Ok(())
}

fn arg_ptr(args: &[MetaAny<'_>], index: usize) -> Result<*const u8, FuncError> {
    match args.get(index) {
        Some(arg) if !arg.is_null() => Ok(arg.as_ptr()),
        _ => Err(FuncError::BadArgument { index }),
    }
}

/// Runs `construct` on the caller's return buffer, or on fresh storage that
/// is returned as an owned value.
fn with_return_buffer(
    ty: &'static MetaType,
    rvo: Option<RvoBuffer>,
    construct: impl FnOnce(*mut u8) -> Result<(), FuncError>,
) -> FuncResult<'static> {
    let (dst, owning) = match rvo {
        Some(buffer) => (buffer.as_ptr(), false),
        None => (ty.malloc(), true),
    };
    match construct(dst) {
        // SAFETY: `dst` now holds a fully constructed value.
        Ok(()) => Ok(Some(unsafe { MetaAny::from_raw_parts(*ty.type_info(), dst, owning, false) })),
        Err(err) => {
            if owning {
                // SAFETY: nothing was left constructed in `dst`.
                unsafe { ty.free(dst) };
            }
            Err(err)
        }
    }
}

/// Constructs each member with `construct`; on failure destroys the members
/// already built, in reverse order.
unsafe fn construct_members(
    members: &[ScriptMember],
    dst: *mut u8,
    construct: impl Fn(&ScriptMember, *mut u8) -> Result<(), FuncError>,
) -> Result<(), FuncError> {
    for (built, member) in members.iter().enumerate() {
        if let Err(err) = construct(member, dst.add(member.offset)) {
            for done in members[..built].iter().rev() {
                done.ty.destruct(dst.add(done.offset), false);
            }
            return Err(err);
        }
    }
    Ok(())
}

unsafe fn default_construct_members(members: &[ScriptMember], dst: *mut u8) -> Result<(), FuncError> {
    construct_members(members, dst, |member, addr| {
        member.ty.default_construct_at(addr)?;
        let Some(default) = &member.default_value else {
            return Ok(());
        };
        let mut view = MetaAny::from_raw_parts(*member.ty.type_info(), addr, false, false);
        if let Err(err) = deserialize_into(&mut view, default) {
            member.ty.destruct(addr, false);
            return Err(FuncError::custom(format!("invalid default value: {err}")));
        }
        Ok(())
    })
}
