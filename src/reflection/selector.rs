use std::collections::BTreeSet;
use std::rc::Rc;

use tracing::trace;

use crate::callgraph::{CallGraphNode, ContextSelector};
use crate::context::{Context, TypeAbstraction};
use crate::hierarchy::ClassHierarchy;
use crate::ir::{CallSite, MethodReference};
use crate::pointsto::InstanceKey;
use crate::reflection::{GetAnnotationContext, ReflectiveOperation};

/// Receiver and annotation-class argument slots.
const RELEVANT_PARAMETERS: [usize; 2] = [0, 1];

/// [`ContextSelector`] intercepting `getAnnotation` calls whose subject and
/// annotation class are compile-time constants.
pub struct GetAnnotationContextSelector {
    cha: Rc<dyn ClassHierarchy>,
}

impl GetAnnotationContextSelector {
    pub fn new(cha: Rc<dyn ClassHierarchy>) -> Self {
        Self { cha }
    }

    fn targeted_operation(&self, site: &CallSite) -> Option<ReflectiveOperation> {
        let resolved = self.cha.resolve_method(&site.declared_target())?;
        ReflectiveOperation::from_method(&resolved)
    }
}

impl ContextSelector for GetAnnotationContextSelector {
    fn callee_target(
        &self,
        _caller: &CallGraphNode,
        site: &CallSite,
        _callee: &MethodReference,
        arguments: &[InstanceKey],
    ) -> Option<Context> {
        let operation = self.targeted_operation(site)?;
        if !operation.selects_context() {
            trace!(?operation, "getAnnotation subject kind is not modeled");
            return None;
        }
        let (Some(subject), Some(annotation)) = (arguments.first(), arguments.get(1)) else {
            trace!(?operation, "missing getAnnotation arguments");
            return None;
        };
        let Some(annotation_type) = annotation.constant_class() else {
            trace!(?operation, "annotation class is not a constant");
            return None;
        };

        let subject_type = match operation {
            ReflectiveOperation::ClassGetAnnotation => {
                subject.constant_class().cloned().map(TypeAbstraction::Exact)
            }
            ReflectiveOperation::ConstructorGetAnnotation => subject
                .constant_constructor()
                .cloned()
                .map(TypeAbstraction::Member),
            ReflectiveOperation::MethodGetAnnotation => {
                subject.constant_method().cloned().map(TypeAbstraction::Member)
            }
            ReflectiveOperation::FieldGetAnnotation
            | ReflectiveOperation::ParameterGetAnnotation => None,
        };
        let Some(subject_type) = subject_type else {
            trace!(?operation, "no context for getAnnotation subject");
            return None;
        };

        Some(Context::GetAnnotation(GetAnnotationContext::new(
            subject_type,
            TypeAbstraction::Exact(annotation_type.clone()),
        )))
    }

    fn relevant_parameters(&self, _caller: &CallGraphNode, site: &CallSite) -> BTreeSet<usize> {
        if self.targeted_operation(site).is_some() {
            RELEVANT_PARAMETERS.into_iter().collect()
        } else {
            BTreeSet::new()
        }
    }
}
