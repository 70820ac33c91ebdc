use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use anyhow::{Context as _, Result};
use tracing::{debug, trace, warn};

use crate::callgraph::{CallGraphNode, ContextInterpreter};
use crate::cfg::induced_cfg;
use crate::context::{Context, ContextItem, ContextKey};
use crate::descriptor::method_param_count;
use crate::hierarchy::ClassHierarchy;
use crate::ir::{
    Annotation, CallSite, Class, FieldReference, Instruction, MethodReference, NewSiteReference,
    TypeReference, ValueNumber,
};
use crate::reflection::{GetAnnotationContext, ReflectiveOperation, build_annotation_class};
use crate::ssa::{ConstantValue, SyntheticIr};

/// [`ContextInterpreter`] synthesizing `Class.getAnnotation` bodies under a
/// [`GetAnnotationContext`].
///
/// Bodies and synthetic annotation classes are cached for the lifetime of
/// the interpreter, which is one analysis run.
pub struct GetAnnotationContextInterpreter {
    cha: Rc<dyn ClassHierarchy>,
    cache: HashMap<String, Rc<SyntheticIr>>,
    annotation_cache: HashMap<(TypeReference, TypeReference), Rc<Class>>,
}

impl GetAnnotationContextInterpreter {
    pub fn new(cha: Rc<dyn ClassHierarchy>) -> Self {
        Self {
            cha,
            cache: HashMap::new(),
            annotation_cache: HashMap::new(),
        }
    }

    /// Number of synthetic annotation classes created so far.
    pub fn synthetic_class_count(&self) -> usize {
        self.annotation_cache.len()
    }

    fn make_ir(
        &mut self,
        method: &MethodReference,
        context: &Context,
        annotation_context: &GetAnnotationContext,
    ) -> Result<SyntheticIr> {
        let mut constants = BTreeMap::new();
        let instructions = self.make_statements(method, annotation_context, &mut constants)?;
        let cfg = induced_cfg(&instructions);
        Ok(SyntheticIr {
            method: method.clone(),
            context: context.clone(),
            instructions,
            constants,
            cfg,
        })
    }

    fn make_statements(
        &mut self,
        method: &MethodReference,
        context: &GetAnnotationContext,
        constants: &mut BTreeMap<ValueNumber, ConstantValue>,
    ) -> Result<Vec<Instruction>> {
        let subject = filtered_class(context, 0)?;
        let annotation_type = filtered_class(context, 1)?;

        let Some(subject_class) = self.cha.lookup_class(&subject) else {
            warn!(class = %subject, "getAnnotation subject class not found");
            return Ok(Vec::new());
        };
        if self.cha.lookup_class(&annotation_type).is_none() {
            warn!(class = %annotation_type, "getAnnotation annotation class not found");
            return Ok(Vec::new());
        }
        let Some(annotation) = subject_class
            .annotations
            .iter()
            .find(|annotation| annotation.type_name == annotation_type)
        else {
            debug!(
                subject = %subject,
                annotation = %annotation_type,
                "no matching annotation; synthesizing empty body"
            );
            return Ok(Vec::new());
        };

        let synthetic = self.annotation_class(&subject, annotation);
        let mut next_value = self.first_free_value(method)?;
        let result = next_value;
        next_value += 1;

        let mut statements = Vec::with_capacity(annotation.named_arguments.len() + 2);
        let mut index = 0u32;
        statements.push(Instruction::new_object(
            index,
            result,
            NewSiteReference {
                index,
                declared_type: synthetic.type_reference(),
            },
        ));
        index += 1;

        for (name, value) in &annotation.named_arguments {
            let field = synthetic
                .find_field(name)
                .map(|field| synthetic.field_reference(field))
                .with_context(|| {
                    format!("synthetic class {} has no field {name}", synthetic.name)
                })?;
            constants.insert(next_value, ConstantValue(value.to_string()));
            statements.push(Instruction::put_field(index, result, next_value, field));
            index += 1;
            next_value += 1;
        }

        statements.push(Instruction::return_value(index, result));
        Ok(statements)
    }

    fn annotation_class(&mut self, subject: &TypeReference, annotation: &Annotation) -> Rc<Class> {
        let key = (subject.clone(), annotation.type_name.clone());
        if let Some(class) = self.annotation_cache.get(&key) {
            return Rc::clone(class);
        }
        let class = self
            .cha
            .synthetic_loader()
            .register_or_fetch(build_annotation_class(subject, annotation));
        self.annotation_cache.insert(key, Rc::clone(&class));
        class
    }

    /// First value number not taken by the receiver and declared parameters.
    fn first_free_value(&self, method: &MethodReference) -> Result<ValueNumber> {
        let params = method_param_count(&method.descriptor)?;
        let is_static = self
            .cha
            .lookup_method(method)
            .is_some_and(|method| method.access.is_static);
        let receiver = if is_static { 0 } else { 1 };
        Ok(1 + receiver + params as ValueNumber)
    }

    fn annotation_context<'a>(&self, node: &'a CallGraphNode) -> Result<&'a GetAnnotationContext> {
        if !self.understands(node) {
            anyhow::bail!("get-annotation interpreter does not understand {node}");
        }
        node.context
            .as_get_annotation()
            .with_context(|| format!("{node} has no get-annotation context"))
    }
}

fn filtered_class(context: &GetAnnotationContext, slot: usize) -> Result<TypeReference> {
    match context.get(ContextKey::Parameter(slot)) {
        Some(ContextItem::Filter(filter)) => Ok(filter.concrete_type),
        _ => anyhow::bail!("{context} does not pin parameter {slot} to a single class"),
    }
}

fn cache_key(method: &MethodReference, context: &GetAnnotationContext) -> String {
    // The context renders only its subject; the annotation type keeps bodies
    // for different annotations of one subject apart.
    format!("{method}@{context}#{}", context.annotation_type())
}

impl ContextInterpreter for GetAnnotationContextInterpreter {
    fn understands(&self, node: &CallGraphNode) -> bool {
        node.context.as_get_annotation().is_some()
            && ReflectiveOperation::from_method(&node.method)
                .is_some_and(ReflectiveOperation::is_modeled)
    }

    fn ir(&mut self, node: &CallGraphNode) -> Result<Rc<SyntheticIr>> {
        let annotation_context = self.annotation_context(node)?;
        let key = cache_key(&node.method, annotation_context);
        if let Some(ir) = self.cache.get(&key) {
            trace!(node = %node, "reusing synthesized body");
            return Ok(Rc::clone(ir));
        }

        debug!(node = %node, "synthesizing getAnnotation body");
        let ir = Rc::new(self.make_ir(&node.method, &node.context, annotation_context)?);
        self.cache.insert(key, Rc::clone(&ir));
        Ok(ir)
    }

    fn new_sites(&mut self, node: &CallGraphNode) -> Result<Vec<NewSiteReference>> {
        self.annotation_context(node)?;
        Ok(Vec::new())
    }

    fn call_sites(&mut self, node: &CallGraphNode) -> Result<Vec<CallSite>> {
        self.annotation_context(node)?;
        Ok(Vec::new())
    }

    fn fields_read(&mut self, node: &CallGraphNode) -> Result<Vec<FieldReference>> {
        self.annotation_context(node)?;
        Ok(Vec::new())
    }

    /// Reports no fields even though the body writes the synthetic class's
    /// fields; the writes are only visible in the instruction stream.
    fn fields_written(&mut self, node: &CallGraphNode) -> Result<Vec<FieldReference>> {
        self.annotation_context(node)?;
        Ok(Vec::new())
    }

    fn record_factory_type(&mut self, _node: &CallGraphNode, _class: &TypeReference) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TypeAbstraction;
    use crate::hierarchy::ClassTable;
    use crate::ir::{ConstValue, ElementValue, InstructionKind};

    const SUBJECT: &str = "reflection/Reflect26$Marvel";
    const ANNOTATION: &str = "reflection/Reflect26$MarvelAnnotation";

    fn string(value: &str) -> ElementValue {
        ElementValue::Const(ConstValue::String(value.to_string()))
    }

    fn annotation_with(type_name: &str, arguments: Vec<(&str, ElementValue)>) -> Annotation {
        Annotation {
            type_name: TypeReference::new(type_name),
            named_arguments: arguments
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        }
    }

    fn class_with(name: &str, annotations: Vec<Annotation>) -> Class {
        Class {
            name: name.to_string(),
            super_name: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            annotations,
            fields: Vec::new(),
            methods: Vec::new(),
            analysis_target: true,
        }
    }

    fn marvel_classes(annotations: Vec<Annotation>) -> Vec<Class> {
        vec![
            class_with(SUBJECT, annotations),
            class_with(ANNOTATION, Vec::new()),
            class_with("reflection/Reflect26$Other", Vec::new()),
        ]
    }

    fn leader_annotation() -> Annotation {
        annotation_with(
            ANNOTATION,
            vec![("key", string("AvengersLeader")), ("value", string("CaptainAmerica"))],
        )
    }

    fn setup(classes: Vec<Class>) -> (Rc<ClassTable>, GetAnnotationContextInterpreter) {
        let table = Rc::new(ClassTable::new(classes));
        let cha: Rc<dyn ClassHierarchy> = table.clone();
        (table, GetAnnotationContextInterpreter::new(cha))
    }

    fn node_for(method: MethodReference, subject: &str, annotation: &str) -> CallGraphNode {
        CallGraphNode {
            method,
            context: Context::GetAnnotation(GetAnnotationContext::new(
                TypeAbstraction::Exact(TypeReference::new(subject)),
                TypeAbstraction::Exact(TypeReference::new(annotation)),
            )),
        }
    }

    fn class_query(subject: &str, annotation: &str) -> CallGraphNode {
        node_for(
            ReflectiveOperation::ClassGetAnnotation.method_reference(),
            subject,
            annotation,
        )
    }

    #[test]
    fn understands_only_class_get_annotation_under_its_context() {
        let (_, interpreter) = setup(Vec::new());

        assert!(interpreter.understands(&class_query(SUBJECT, ANNOTATION)));
        for operation in [
            ReflectiveOperation::ConstructorGetAnnotation,
            ReflectiveOperation::MethodGetAnnotation,
            ReflectiveOperation::FieldGetAnnotation,
            ReflectiveOperation::ParameterGetAnnotation,
        ] {
            let node = node_for(operation.method_reference(), SUBJECT, ANNOTATION);
            assert!(!interpreter.understands(&node), "{operation:?}");
        }
        let everywhere = CallGraphNode {
            method: ReflectiveOperation::ClassGetAnnotation.method_reference(),
            context: Context::Everywhere,
        };
        assert!(!interpreter.understands(&everywhere));
    }

    #[test]
    fn matching_annotation_yields_allocate_populate_return() {
        let (_, mut interpreter) = setup(marvel_classes(vec![leader_annotation()]));
        let node = class_query(SUBJECT, ANNOTATION);

        let ir = interpreter.ir(&node).expect("synthesized body");

        assert_eq!(4, ir.instructions.len());
        let InstructionKind::New { result, site } = &ir.instructions[0].kind else {
            panic!("expected allocation, got {:?}", ir.instructions[0]);
        };
        assert_eq!(3, *result);
        assert_eq!(
            "synthetic/annotation/reflection_0Reflect26_2Marvel$\
             reflection_0Reflect26_2MarvelAnnotation",
            site.declared_type.name()
        );
        let writes: Vec<(String, String)> = ir.instructions[1..3]
            .iter()
            .map(|inst| match &inst.kind {
                InstructionKind::PutField {
                    object,
                    value,
                    field,
                } => {
                    assert_eq!(3, *object);
                    let constant = ir.constant(*value).expect("constant operand");
                    (field.name.clone(), constant.0.clone())
                }
                other => panic!("expected field write, got {other:?}"),
            })
            .collect();
        assert_eq!(
            vec![
                ("key".to_string(), "AvengersLeader".to_string()),
                ("value".to_string(), "CaptainAmerica".to_string()),
            ],
            writes
        );
        assert_eq!(
            InstructionKind::Return { value: Some(3) },
            ir.instructions[3].kind
        );
        let indices: Vec<u32> = ir.instructions.iter().map(|inst| inst.index).collect();
        assert_eq!(vec![0, 1, 2, 3], indices);
        assert_eq!(2, ir.constants.len());
        assert_eq!(vec![4, 5], ir.constants.keys().copied().collect::<Vec<_>>());
        assert_eq!(1, ir.cfg.blocks.len());
        assert_eq!(1, ir.cfg.exit_blocks().count());
    }

    #[test]
    fn missing_annotation_yields_empty_body() {
        let (table, mut interpreter) = setup(marvel_classes(Vec::new()));
        let node = class_query(SUBJECT, ANNOTATION);

        let ir = interpreter.ir(&node).expect("synthesized body");

        assert!(ir.instructions.is_empty());
        assert!(ir.constants.is_empty());
        assert!(ir.cfg.blocks.is_empty());
        assert_eq!(0, interpreter.number_of_statements(&node).expect("count"));
        assert!(table.synthetic_loader().is_empty());
    }

    #[test]
    fn other_annotation_types_do_not_match() {
        let other = annotation_with("reflection/Reflect26$Other", vec![("key", string("x"))]);
        let (_, mut interpreter) = setup(marvel_classes(vec![other]));

        let ir = interpreter
            .ir(&class_query(SUBJECT, ANNOTATION))
            .expect("synthesized body");

        assert!(ir.instructions.is_empty());
    }

    #[test]
    fn unknown_subject_class_yields_empty_body() {
        let (_, mut interpreter) = setup(marvel_classes(vec![leader_annotation()]));

        let ir = interpreter
            .ir(&class_query("reflection/Missing", ANNOTATION))
            .expect("synthesized body");

        assert!(ir.instructions.is_empty());
    }

    #[test]
    fn repeated_requests_return_the_cached_body() {
        let (table, mut interpreter) = setup(marvel_classes(vec![leader_annotation()]));
        let node = class_query(SUBJECT, ANNOTATION);

        let first = interpreter.ir(&node).expect("first body");
        let second = interpreter.ir(&node).expect("second body");
        let statements = interpreter.number_of_statements(&node).expect("count");

        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(4, statements);
        assert_eq!(1, table.synthetic_loader().len());
        assert_eq!(1, interpreter.synthetic_class_count());
    }

    #[test]
    fn distinct_subjects_get_distinct_synthetic_classes() {
        let mut classes = marvel_classes(vec![leader_annotation()]);
        classes.push(class_with(
            "reflection/Reflect26$Dc",
            vec![annotation_with(
                ANNOTATION,
                vec![("count", ElementValue::Const(ConstValue::Int(7)))],
            )],
        ));
        let (table, mut interpreter) = setup(classes);

        let marvel = interpreter
            .ir(&class_query(SUBJECT, ANNOTATION))
            .expect("marvel body");
        let dc = interpreter
            .ir(&class_query("reflection/Reflect26$Dc", ANNOTATION))
            .expect("dc body");

        assert_eq!(2, table.synthetic_loader().len());
        assert_eq!(4, marvel.instructions.len());
        assert_eq!(3, dc.instructions.len());
        let InstructionKind::PutField { field, value, .. } = &dc.instructions[1].kind else {
            panic!("expected field write");
        };
        assert_eq!(TypeReference::integer(), field.field_type);
        assert_eq!(Some("7"), dc.constant(*value).map(|constant| constant.0.as_str()));
        let synthetic = table
            .lookup_class(&field.owner)
            .expect("registered synthetic class");
        assert_eq!(vec![ANNOTATION.to_string()], synthetic.interfaces);
    }

    #[test]
    fn subjects_whose_names_differ_only_by_separator_stay_apart() {
        let classes = vec![
            class_with("p/C", vec![annotation_with("q/A", vec![("key", string("k"))])]),
            class_with("p_C", vec![annotation_with("q/A", vec![("value", string("v"))])]),
            class_with("q/A", Vec::new()),
        ];
        let (table, mut interpreter) = setup(classes);

        let slashed = interpreter
            .ir(&class_query("p/C", "q/A"))
            .expect("p/C body");
        let underscored = interpreter
            .ir(&class_query("p_C", "q/A"))
            .expect("p_C body");

        assert_eq!(2, table.synthetic_loader().len());
        let written = |ir: &Rc<SyntheticIr>| match &ir.instructions[1].kind {
            InstructionKind::PutField { field, .. } => field.clone(),
            other => panic!("expected field write, got {other:?}"),
        };
        assert_eq!("key", written(&slashed).name);
        assert_eq!("value", written(&underscored).name);
        assert_ne!(written(&slashed).owner, written(&underscored).owner);
    }

    #[test]
    fn missing_annotation_class_yields_empty_body() {
        let (table, mut interpreter) = setup(vec![class_with(SUBJECT, vec![leader_annotation()])]);

        let ir = interpreter
            .ir(&class_query(SUBJECT, ANNOTATION))
            .expect("synthesized body");

        assert!(ir.instructions.is_empty());
        assert!(ir.constants.is_empty());
        assert!(table.synthetic_loader().is_empty());
    }

    #[test]
    fn summaries_are_empty_and_def_use_is_fresh() {
        let (_, mut interpreter) = setup(marvel_classes(vec![leader_annotation()]));
        let node = class_query(SUBJECT, ANNOTATION);

        assert!(interpreter.new_sites(&node).expect("new sites").is_empty());
        assert!(interpreter.call_sites(&node).expect("call sites").is_empty());
        assert!(interpreter.fields_read(&node).expect("fields read").is_empty());
        assert!(
            interpreter
                .fields_written(&node)
                .expect("fields written")
                .is_empty()
        );
        assert!(!interpreter.record_factory_type(&node, &TypeReference::class()));

        let du = interpreter.def_use(&node).expect("def use");
        assert_eq!(Some(0), du.def(3));
        assert_eq!(3, du.use_count(3));
        let cfg = interpreter.cfg(&node).expect("cfg");
        assert_eq!(4, cfg.blocks[0].instructions.len());
    }

    #[test]
    fn body_queries_reject_foreign_nodes() {
        let (_, mut interpreter) = setup(Vec::new());
        let node = CallGraphNode {
            method: MethodReference::new("com/example/App", "run", "()V"),
            context: Context::Everywhere,
        };

        assert!(interpreter.ir(&node).is_err());
        assert!(interpreter.new_sites(&node).is_err());
        assert!(interpreter.fields_written(&node).is_err());
    }

    #[test]
    fn inexact_subject_is_an_error() {
        let (_, mut interpreter) = setup(Vec::new());
        let node = CallGraphNode {
            method: ReflectiveOperation::ClassGetAnnotation.method_reference(),
            context: Context::GetAnnotation(GetAnnotationContext::new(
                TypeAbstraction::Cone(TypeReference::new(SUBJECT)),
                TypeAbstraction::Exact(TypeReference::new(ANNOTATION)),
            )),
        };

        assert!(interpreter.ir(&node).is_err());
    }
}
