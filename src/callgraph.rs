use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;

use anyhow::{Context as _, Result};
use tracing::{debug, trace};

use crate::context::Context;
use crate::hierarchy::ClassHierarchy;
use crate::ir::{
    CallSite, ControlFlowGraph, FieldReference, MethodReference, NewSiteReference, TypeReference,
};
use crate::pointsto::InstanceKey;
use crate::ssa::{DefUse, SyntheticIr};

/// A method analyzed under one context.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct CallGraphNode {
    pub method: MethodReference,
    pub context: Context,
}

impl fmt::Display for CallGraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node: {} Context: {}", self.method, self.context)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeId(usize);

/// Edge from a call site in the caller to a callee node.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct CallEdge {
    pub caller: NodeId,
    pub offset: u32,
    pub callee: NodeId,
}

/// Context-sensitive call graph with nodes deduplicated by (method, context).
#[derive(Debug, Default)]
pub struct CallGraph {
    nodes: Vec<CallGraphNode>,
    index: HashMap<CallGraphNode, NodeId>,
    edges: BTreeSet<CallEdge>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_or_create_node(&mut self, method: MethodReference, context: Context) -> NodeId {
        let node = CallGraphNode { method, context };
        if let Some(id) = self.index.get(&node) {
            return *id;
        }
        let id = NodeId(self.nodes.len());
        trace!(node = %node, "new call graph node");
        self.nodes.push(node.clone());
        self.index.insert(node, id);
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&CallGraphNode> {
        self.nodes.get(id.0)
    }

    pub fn add_edge(&mut self, caller: NodeId, offset: u32, callee: NodeId) {
        self.edges.insert(CallEdge {
            caller,
            offset,
            callee,
        });
    }

    pub fn edges(&self) -> impl Iterator<Item = &CallEdge> {
        self.edges.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Chooses the context a callee is analyzed under at a call site.
pub trait ContextSelector {
    /// Context for `callee` at `site`, or `None` to leave the choice to
    /// another selector.
    fn callee_target(
        &self,
        caller: &CallGraphNode,
        site: &CallSite,
        callee: &MethodReference,
        arguments: &[InstanceKey],
    ) -> Option<Context>;

    /// Argument slots whose values must be tracked precisely at `site`.
    fn relevant_parameters(&self, caller: &CallGraphNode, site: &CallSite) -> BTreeSet<usize>;
}

/// Fallback selector analyzing every callee once.
#[derive(Clone, Copy, Debug, Default)]
pub struct EverywhereContextSelector;

impl ContextSelector for EverywhereContextSelector {
    fn callee_target(
        &self,
        _caller: &CallGraphNode,
        _site: &CallSite,
        _callee: &MethodReference,
        _arguments: &[InstanceKey],
    ) -> Option<Context> {
        Some(Context::Everywhere)
    }

    fn relevant_parameters(&self, _caller: &CallGraphNode, _site: &CallSite) -> BTreeSet<usize> {
        BTreeSet::new()
    }
}

/// Asks `primary` first and falls back to `fallback` when it declines.
#[derive(Debug)]
pub struct DelegatingContextSelector<A, B> {
    primary: A,
    fallback: B,
}

impl<A, B> DelegatingContextSelector<A, B> {
    pub fn new(primary: A, fallback: B) -> Self {
        Self { primary, fallback }
    }
}

impl<A: ContextSelector, B: ContextSelector> ContextSelector for DelegatingContextSelector<A, B> {
    fn callee_target(
        &self,
        caller: &CallGraphNode,
        site: &CallSite,
        callee: &MethodReference,
        arguments: &[InstanceKey],
    ) -> Option<Context> {
        self.primary
            .callee_target(caller, site, callee, arguments)
            .or_else(|| self.fallback.callee_target(caller, site, callee, arguments))
    }

    fn relevant_parameters(&self, caller: &CallGraphNode, site: &CallSite) -> BTreeSet<usize> {
        let mut slots = self.primary.relevant_parameters(caller, site);
        slots.extend(self.fallback.relevant_parameters(caller, site));
        slots
    }
}

/// Supplies instructions and summaries for the call-graph nodes it understands.
///
/// Only [`understands`](ContextInterpreter::understands) may be asked about
/// arbitrary nodes; the body queries fail for nodes it does not understand.
pub trait ContextInterpreter {
    fn understands(&self, node: &CallGraphNode) -> bool;

    fn ir(&mut self, node: &CallGraphNode) -> Result<Rc<SyntheticIr>>;

    fn number_of_statements(&mut self, node: &CallGraphNode) -> Result<usize> {
        Ok(self.ir(node)?.instructions.len())
    }

    fn cfg(&mut self, node: &CallGraphNode) -> Result<ControlFlowGraph> {
        Ok(self.ir(node)?.cfg.clone())
    }

    /// Def-use chains, computed afresh on every call.
    fn def_use(&mut self, node: &CallGraphNode) -> Result<DefUse> {
        let ir = self.ir(node)?;
        Ok(DefUse::new(&ir))
    }

    fn new_sites(&mut self, node: &CallGraphNode) -> Result<Vec<NewSiteReference>>;

    fn call_sites(&mut self, node: &CallGraphNode) -> Result<Vec<CallSite>>;

    fn fields_read(&mut self, node: &CallGraphNode) -> Result<Vec<FieldReference>>;

    fn fields_written(&mut self, node: &CallGraphNode) -> Result<Vec<FieldReference>>;

    fn record_factory_type(&mut self, node: &CallGraphNode, class: &TypeReference) -> bool;
}

/// Call-graph construction driver wiring a selector and an interpreter.
pub struct CallGraphBuilder<S, I> {
    cha: Rc<dyn ClassHierarchy>,
    selector: S,
    interpreter: I,
    graph: CallGraph,
}

impl<S: ContextSelector, I: ContextInterpreter> CallGraphBuilder<S, I> {
    pub fn new(cha: Rc<dyn ClassHierarchy>, selector: S, interpreter: I) -> Self {
        Self {
            cha,
            selector,
            interpreter,
            graph: CallGraph::new(),
        }
    }

    pub fn add_entrypoint(&mut self, method: MethodReference) -> NodeId {
        self.graph.find_or_create_node(method, Context::Everywhere)
    }

    /// Add the edge for `site` in `caller`; returns the callee node, or
    /// `None` when the declared target does not resolve.
    pub fn visit_call(&mut self, caller: NodeId, site: &CallSite) -> Result<Option<NodeId>> {
        let caller_node = self
            .graph
            .node(caller)
            .cloned()
            .with_context(|| format!("unknown caller node {caller:?}"))?;
        let target = site.declared_target();
        let Some(callee) = self.cha.resolve_method(&target) else {
            debug!(caller = %caller_node, target = %target, "skipping unresolved call");
            return Ok(None);
        };

        let relevant = self.selector.relevant_parameters(&caller_node, site);
        let arguments: Vec<InstanceKey> = site
            .arguments
            .iter()
            .enumerate()
            .map(|(slot, key)| {
                if relevant.contains(&slot) {
                    key.clone()
                } else {
                    InstanceKey::Unknown
                }
            })
            .collect();
        let context = self
            .selector
            .callee_target(&caller_node, site, &callee, &arguments)
            .unwrap_or(Context::Everywhere);
        let node = self.graph.find_or_create_node(callee, context);
        self.graph.add_edge(caller, site.offset, node);
        Ok(Some(node))
    }

    /// Synthesized body for `node`, if the interpreter understands it.
    pub fn ir_for(&mut self, node: NodeId) -> Result<Option<Rc<SyntheticIr>>> {
        let node = self
            .graph
            .node(node)
            .cloned()
            .with_context(|| format!("unknown node {node:?}"))?;
        if !self.interpreter.understands(&node) {
            return Ok(None);
        }
        self.interpreter.ir(&node).map(Some)
    }

    pub fn graph(&self) -> &CallGraph {
        &self.graph
    }

    pub fn interpreter(&self) -> &I {
        &self.interpreter
    }
}
