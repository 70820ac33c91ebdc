use std::fmt;
use std::hash::{Hash, Hasher};

use crate::context::{ContextItem, ContextKey, SingleClassFilter, TypeAbstraction};

/// Context for a `getAnnotation` callee whose subject and annotation class
/// are statically known.
///
/// Equality and hashing only consider the subject type, so callees queried
/// on the same subject share one call-graph node.
#[derive(Clone, Debug)]
pub struct GetAnnotationContext {
    subject_type: TypeAbstraction,
    annotation_type: TypeAbstraction,
}

impl GetAnnotationContext {
    pub fn new(subject_type: TypeAbstraction, annotation_type: TypeAbstraction) -> Self {
        Self {
            subject_type,
            annotation_type,
        }
    }

    pub fn subject_type(&self) -> &TypeAbstraction {
        &self.subject_type
    }

    pub fn annotation_type(&self) -> &TypeAbstraction {
        &self.annotation_type
    }

    pub fn get(&self, key: ContextKey) -> Option<ContextItem> {
        match key {
            ContextKey::Receiver => Some(ContextItem::Type(self.subject_type.clone())),
            ContextKey::Parameter(0) => single_class_filter(&self.subject_type),
            ContextKey::Parameter(1) => single_class_filter(&self.annotation_type),
            ContextKey::Parameter(_) | ContextKey::Caller => None,
        }
    }
}

fn single_class_filter(abstraction: &TypeAbstraction) -> Option<ContextItem> {
    abstraction.exact_class().map(|class| {
        ContextItem::Filter(SingleClassFilter {
            concrete_type: class.clone(),
        })
    })
}

impl PartialEq for GetAnnotationContext {
    fn eq(&self, other: &Self) -> bool {
        self.subject_type == other.subject_type
    }
}

impl Eq for GetAnnotationContext {}

impl Hash for GetAnnotationContext {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.subject_type.hash(state);
    }
}

impl fmt::Display for GetAnnotationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GetAnnotationContext<{}>", self.subject_type)
    }
}
