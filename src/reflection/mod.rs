//! Modeling of `getAnnotation` lookups on reflective objects.
//!
//! Calls whose receiver and annotation class are statically known get a
//! [`GetAnnotationContext`]; call-graph nodes under that context are given a
//! synthesized body that allocates and populates an object standing in for
//! the annotation instance.

mod context;
mod interpreter;
mod selector;
mod synthetic;

pub use context::GetAnnotationContext;
pub use interpreter::GetAnnotationContextInterpreter;
pub use selector::GetAnnotationContextSelector;
pub use synthetic::{
    SYNTHETIC_ANNOTATION_PACKAGE, build_annotation_class, field_type_for,
    synthetic_annotation_class_name,
};

use crate::ir::MethodReference;

const GET_ANNOTATION: &str = "getAnnotation";
const GET_ANNOTATION_DESCRIPTOR: &str = "(Ljava/lang/Class;)Ljava/lang/annotation/Annotation;";

/// The `getAnnotation` operations the selector recognizes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ReflectiveOperation {
    ClassGetAnnotation,
    ConstructorGetAnnotation,
    MethodGetAnnotation,
    FieldGetAnnotation,
    ParameterGetAnnotation,
}

impl ReflectiveOperation {
    pub const ALL: [ReflectiveOperation; 5] = [
        ReflectiveOperation::ClassGetAnnotation,
        ReflectiveOperation::ConstructorGetAnnotation,
        ReflectiveOperation::MethodGetAnnotation,
        ReflectiveOperation::FieldGetAnnotation,
        ReflectiveOperation::ParameterGetAnnotation,
    ];

    /// Class declaring the operation.
    pub fn owner(self) -> &'static str {
        match self {
            ReflectiveOperation::ClassGetAnnotation => "java/lang/Class",
            ReflectiveOperation::ConstructorGetAnnotation => "java/lang/reflect/Constructor",
            ReflectiveOperation::MethodGetAnnotation => "java/lang/reflect/Method",
            ReflectiveOperation::FieldGetAnnotation => "java/lang/reflect/Field",
            ReflectiveOperation::ParameterGetAnnotation => "java/lang/reflect/Parameter",
        }
    }

    pub fn method_reference(self) -> MethodReference {
        MethodReference::new(self.owner(), GET_ANNOTATION, GET_ANNOTATION_DESCRIPTOR)
    }

    pub fn from_method(method: &MethodReference) -> Option<Self> {
        if method.name != GET_ANNOTATION || method.descriptor != GET_ANNOTATION_DESCRIPTOR {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|operation| method.owner.name() == operation.owner())
    }

    /// Whether the selector builds a context for this operation.
    pub fn selects_context(self) -> bool {
        match self {
            ReflectiveOperation::ClassGetAnnotation
            | ReflectiveOperation::ConstructorGetAnnotation
            | ReflectiveOperation::MethodGetAnnotation => true,
            // Subjects for these are not modeled yet.
            ReflectiveOperation::FieldGetAnnotation
            | ReflectiveOperation::ParameterGetAnnotation => false,
        }
    }

    /// Whether the interpreter synthesizes a body for this operation.
    pub fn is_modeled(self) -> bool {
        match self {
            ReflectiveOperation::ClassGetAnnotation => true,
            ReflectiveOperation::ConstructorGetAnnotation
            | ReflectiveOperation::MethodGetAnnotation
            | ReflectiveOperation::FieldGetAnnotation
            | ReflectiveOperation::ParameterGetAnnotation => false,
        }
    }
}
