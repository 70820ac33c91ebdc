use serde::{Deserialize, Serialize};

use crate::ir::{FieldReference, MethodReference, TypeReference};

/// Abstract object flowing into a call argument, as seen by the points-to layer.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceKey {
    /// A single compile-time-known object.
    Constant(ConstantKey),
    /// Objects allocated at one site of the analyzed program.
    Allocation { declared_type: TypeReference, index: u32 },
    /// Anything the points-to layer could not pin down to one object.
    Unknown,
}

/// Statically-constant values the modeling cares about.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstantKey {
    /// A class literal such as `C.class`.
    Class(TypeReference),
    Constructor(MethodReference),
    Method(MethodReference),
    Field(FieldReference),
    Parameter { method: MethodReference, index: u32 },
}

impl InstanceKey {
    pub fn constant_class(&self) -> Option<&TypeReference> {
        match self {
            InstanceKey::Constant(ConstantKey::Class(class)) => Some(class),
            _ => None,
        }
    }

    pub fn constant_constructor(&self) -> Option<&MethodReference> {
        match self {
            InstanceKey::Constant(ConstantKey::Constructor(constructor)) => Some(constructor),
            _ => None,
        }
    }

    pub fn constant_method(&self) -> Option<&MethodReference> {
        match self {
            InstanceKey::Constant(ConstantKey::Method(method)) => Some(method),
            _ => None,
        }
    }
}
