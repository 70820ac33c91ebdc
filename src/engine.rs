use std::rc::Rc;

use anyhow::{Context as _, Result};
use tracing::debug;

use crate::callgraph::{
    CallEdge, CallGraphBuilder, DelegatingContextSelector, EverywhereContextSelector,
};
use crate::context::TypeAbstraction;
use crate::hierarchy::{ClassHierarchy, ClassTable};
use crate::ir::{Class, MethodReference};
use crate::reflection::{GetAnnotationContextInterpreter, GetAnnotationContextSelector};
use crate::ssa::SyntheticIr;

/// A `getAnnotation` call whose callee got a synthesized body.
#[derive(Debug)]
pub struct ModeledCall {
    pub caller: MethodReference,
    pub offset: u32,
    pub subject: TypeAbstraction,
    pub annotation: TypeAbstraction,
    pub ir: Rc<SyntheticIr>,
}

/// Result of building the call graph for one program.
#[derive(Debug)]
pub struct AnalysisOutput {
    pub modeled_calls: Vec<ModeledCall>,
    pub class_count: usize,
    pub node_count: usize,
    pub edge_count: usize,
    pub synthetic_class_count: usize,
}

/// Build the call graph of the analysis-target classes, modeling
/// `getAnnotation` calls on constant subjects.
pub fn analyze(classes: Vec<Class>) -> Result<AnalysisOutput> {
    let table = Rc::new(ClassTable::new(classes));
    let cha: Rc<dyn ClassHierarchy> = table.clone();
    let selector = DelegatingContextSelector::new(
        GetAnnotationContextSelector::new(Rc::clone(&cha)),
        EverywhereContextSelector,
    );
    let interpreter = GetAnnotationContextInterpreter::new(Rc::clone(&cha));
    let mut builder = CallGraphBuilder::new(cha, selector, interpreter);

    let mut class_count = 0;
    for class in table.classes().filter(|class| class.analysis_target) {
        class_count += 1;
        for method in &class.methods {
            let caller = builder.add_entrypoint(MethodReference::new(
                &class.name,
                &method.name,
                &method.descriptor,
            ));
            for site in &method.calls {
                builder.visit_call(caller, site)?;
            }
        }
    }

    let edges: Vec<CallEdge> = builder.graph().edges().copied().collect();
    let mut modeled_calls = Vec::new();
    for edge in &edges {
        let Some(ir) = builder.ir_for(edge.callee)? else {
            continue;
        };
        let caller = builder
            .graph()
            .node(edge.caller)
            .map(|node| node.method.clone())
            .with_context(|| format!("missing caller node {:?}", edge.caller))?;
        let context = ir
            .context
            .as_get_annotation()
            .with_context(|| format!("body of {} lacks a get-annotation context", ir.method))?;
        modeled_calls.push(ModeledCall {
            caller,
            offset: edge.offset,
            subject: context.subject_type().clone(),
            annotation: context.annotation_type().clone(),
            ir: Rc::clone(&ir),
        });
    }

    let output = AnalysisOutput {
        modeled_calls,
        class_count,
        node_count: builder.graph().len(),
        edge_count: edges.len(),
        synthetic_class_count: builder.interpreter().synthetic_class_count(),
    };
    debug!(
        classes = output.class_count,
        nodes = output.node_count,
        edges = output.edge_count,
        modeled = output.modeled_calls.len(),
        "call graph built"
    );
    Ok(output)
}
