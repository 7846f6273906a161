// special_member.rs - Signatures of the construction, assignment and
// destruction functions every type may carry

use crate::func::{FuncId, MetaFuncNamedParam, OperatorType};
use crate::type_id::TypeId;
use crate::type_traits::{TypeForm, TypeTraits};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SpecialMember {
    DefaultConstructor,
    CopyConstructor,
    MoveConstructor,
    CopyAssign,
    MoveAssign,
    Destructor,
}

impl SpecialMember {
    pub const ALL: [SpecialMember; 6] = [
        SpecialMember::DefaultConstructor,
        SpecialMember::CopyConstructor,
        SpecialMember::MoveConstructor,
        SpecialMember::CopyAssign,
        SpecialMember::MoveAssign,
        SpecialMember::Destructor,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SpecialMember::DefaultConstructor => "default construction",
            SpecialMember::CopyConstructor => "copy construction",
            SpecialMember::MoveConstructor => "move construction",
            SpecialMember::CopyAssign => "copy assignment",
            SpecialMember::MoveAssign => "move assignment",
            SpecialMember::Destructor => "destruction",
        }
    }

    pub fn operator(self) -> OperatorType {
        match self {
            SpecialMember::DefaultConstructor
            | SpecialMember::CopyConstructor
            | SpecialMember::MoveConstructor => OperatorType::Constructor,
            SpecialMember::CopyAssign | SpecialMember::MoveAssign => OperatorType::Assign,
            SpecialMember::Destructor => OperatorType::Destructor,
        }
    }

    pub fn return_traits(self, owner: TypeId) -> TypeTraits {
        match self {
            SpecialMember::DefaultConstructor
            | SpecialMember::CopyConstructor
            | SpecialMember::MoveConstructor => TypeTraits::new(owner, TypeForm::Value),
            _ => TypeTraits::VOID,
        }
    }

    pub fn params(self, owner: TypeId) -> Vec<MetaFuncNamedParam> {
        let this = |form| MetaFuncNamedParam::new(TypeTraits::new(owner, form), "this");
        let other = |form| MetaFuncNamedParam::new(TypeTraits::new(owner, form), "other");
        match self {
            SpecialMember::DefaultConstructor => vec![],
            SpecialMember::CopyConstructor => vec![other(TypeForm::ConstRef)],
            SpecialMember::MoveConstructor => vec![other(TypeForm::RValue)],
            SpecialMember::CopyAssign => vec![this(TypeForm::Ref), other(TypeForm::ConstRef)],
            SpecialMember::MoveAssign => vec![this(TypeForm::Ref), other(TypeForm::RValue)],
            SpecialMember::Destructor => vec![this(TypeForm::Ref)],
        }
    }

    pub fn func_id(self, owner: TypeId) -> FuncId {
        let params: Vec<TypeTraits> = self.params(owner).iter().map(|p| p.traits).collect();
        FuncId::of(self.return_traits(owner), &params)
    }
}
