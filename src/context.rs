use std::fmt;

use crate::ir::{MethodReference, TypeReference};
use crate::reflection::GetAnnotationContext;

/// Static approximation of the runtime types a program location may hold.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum TypeAbstraction {
    /// Exactly one concrete class.
    Exact(TypeReference),
    /// A reflective member object (constructor or method) standing for itself.
    Member(MethodReference),
    /// The class or any of its subtypes.
    Cone(TypeReference),
}

impl TypeAbstraction {
    pub fn exact_class(&self) -> Option<&TypeReference> {
        match self {
            TypeAbstraction::Exact(class) => Some(class),
            TypeAbstraction::Member(_) | TypeAbstraction::Cone(_) => None,
        }
    }
}

impl fmt::Display for TypeAbstraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeAbstraction::Exact(class) => write!(f, "point<{class}>"),
            TypeAbstraction::Member(member) => write!(f, "member<{member}>"),
            TypeAbstraction::Cone(class) => write!(f, "cone<{class}>"),
        }
    }
}

/// Keys of the attribute map every context answers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ContextKey {
    Receiver,
    Parameter(usize),
    Caller,
}

/// Restricts a parameter slot to instances of exactly one class.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SingleClassFilter {
    pub concrete_type: TypeReference,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum ContextItem {
    Type(TypeAbstraction),
    Filter(SingleClassFilter),
}

/// Immutable attribute bag parameterizing how a call-graph node is analyzed.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Context {
    /// Default context: one node per method.
    Everywhere,
    GetAnnotation(GetAnnotationContext),
}

impl Context {
    pub fn get(&self, key: ContextKey) -> Option<ContextItem> {
        match self {
            Context::Everywhere => None,
            Context::GetAnnotation(context) => context.get(key),
        }
    }

    pub fn as_get_annotation(&self) -> Option<&GetAnnotationContext> {
        match self {
            Context::GetAnnotation(context) => Some(context),
            Context::Everywhere => None,
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Context::Everywhere => f.write_str("Everywhere"),
            Context::GetAnnotation(context) => write!(f, "{context}"),
        }
    }
}
