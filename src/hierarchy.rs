use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::debug;

use crate::ir::{
    Class, JAVA_LANG_ANNOTATION, JAVA_LANG_BOOLEAN, JAVA_LANG_ENUM, JAVA_LANG_INTEGER,
    JAVA_LANG_OBJECT, JAVA_LANG_STRING, Method, MethodAccess, MethodReference, TypeReference,
};
use crate::reflection::ReflectiveOperation;

/// Type universe queries the modeling relies on.
pub trait ClassHierarchy {
    /// Resolve a declared call target to the method that implements it.
    fn resolve_method(&self, target: &MethodReference) -> Option<MethodReference>;

    /// Look up a class, including classes registered by the synthetic loader.
    fn lookup_class(&self, name: &TypeReference) -> Option<Rc<Class>>;

    /// Namespace for fabricated classes.
    fn synthetic_loader(&self) -> &SyntheticClassLoader;

    fn lookup_method(&self, method: &MethodReference) -> Option<Method> {
        self.lookup_class(&method.owner)?
            .find_method(&method.name, &method.descriptor)
            .cloned()
    }
}

/// Registry of classes fabricated during one analysis run.
#[derive(Debug, Default)]
pub struct SyntheticClassLoader {
    classes: RefCell<BTreeMap<TypeReference, Rc<Class>>>,
}

impl SyntheticClassLoader {
    /// Register `class` unless a class of the same name is already present;
    /// either way return the registered descriptor.
    pub fn register_or_fetch(&self, class: Class) -> Rc<Class> {
        let name = class.type_reference();
        let mut classes = self.classes.borrow_mut();
        if let Some(existing) = classes.get(&name) {
            debug!(class = %name, "synthetic class already registered");
            return Rc::clone(existing);
        }
        debug!(class = %name, fields = class.fields.len(), "registering synthetic class");
        let class = Rc::new(class);
        classes.insert(name, Rc::clone(&class));
        class
    }

    pub fn lookup(&self, name: &TypeReference) -> Option<Rc<Class>> {
        self.classes.borrow().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.classes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.borrow().is_empty()
    }
}

/// In-memory class hierarchy built from the classes of a program manifest.
#[derive(Debug, Default)]
pub struct ClassTable {
    classes: BTreeMap<TypeReference, Rc<Class>>,
    synthetic: SyntheticClassLoader,
}

impl ClassTable {
    /// Build a table from program classes, adding platform stubs that are missing.
    pub fn new(classes: Vec<Class>) -> Self {
        let mut table = ClassTable::default();
        for class in classes {
            table.classes.insert(class.type_reference(), Rc::new(class));
        }
        for stub in platform_classes() {
            table
                .classes
                .entry(stub.type_reference())
                .or_insert_with(|| Rc::new(stub));
        }
        table
    }

    /// Program classes in name order.
    pub fn classes(&self) -> impl Iterator<Item = &Rc<Class>> {
        self.classes.values()
    }

    fn super_class(&self, class: &Class) -> Option<Rc<Class>> {
        let super_name = class.super_name.as_deref()?;
        self.lookup_class(&TypeReference::new(super_name))
    }
}

impl ClassHierarchy for ClassTable {
    fn resolve_method(&self, target: &MethodReference) -> Option<MethodReference> {
        let mut current = self.lookup_class(&target.owner);
        // Guard against cyclic super chains in malformed inputs.
        let mut remaining = self.classes.len() + self.synthetic.len();
        while let Some(class) = current {
            if class.find_method(&target.name, &target.descriptor).is_some() {
                return Some(MethodReference {
                    owner: class.type_reference(),
                    name: target.name.clone(),
                    descriptor: target.descriptor.clone(),
                });
            }
            if remaining == 0 {
                break;
            }
            remaining -= 1;
            current = self.super_class(&class);
        }
        debug!(target = %target, "unresolved method");
        None
    }

    fn lookup_class(&self, name: &TypeReference) -> Option<Rc<Class>> {
        self.classes
            .get(name)
            .cloned()
            .or_else(|| self.synthetic.lookup(name))
    }

    fn synthetic_loader(&self) -> &SyntheticClassLoader {
        &self.synthetic
    }
}

fn platform_classes() -> Vec<Class> {
    let mut stubs = vec![
        stub(JAVA_LANG_OBJECT, None, Vec::new()),
        stub(JAVA_LANG_STRING, Some(JAVA_LANG_OBJECT), Vec::new()),
        stub(JAVA_LANG_INTEGER, Some(JAVA_LANG_OBJECT), Vec::new()),
        stub(JAVA_LANG_BOOLEAN, Some(JAVA_LANG_OBJECT), Vec::new()),
        stub(JAVA_LANG_ENUM, Some(JAVA_LANG_OBJECT), Vec::new()),
        stub(JAVA_LANG_ANNOTATION, None, Vec::new()),
    ];
    let mut owners: BTreeMap<&str, Vec<Method>> = BTreeMap::new();
    for operation in ReflectiveOperation::ALL {
        let reference = operation.method_reference();
        owners.entry(operation.owner()).or_default().push(Method {
            name: reference.name,
            descriptor: reference.descriptor,
            access: MethodAccess {
                is_public: true,
                is_static: false,
                is_abstract: false,
            },
            calls: Vec::new(),
        });
    }
    for (owner, methods) in owners {
        stubs.push(stub(owner, Some(JAVA_LANG_OBJECT), methods));
    }
    stubs
}

fn stub(name: &str, super_name: Option<&str>, methods: Vec<Method>) -> Class {
    Class {
        name: name.to_string(),
        super_name: super_name.map(str::to_string),
        interfaces: Vec::new(),
        annotations: Vec::new(),
        fields: Vec::new(),
        methods,
        analysis_target: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_with(name: &str, super_name: Option<&str>, methods: Vec<Method>) -> Class {
        Class {
            name: name.to_string(),
            super_name: super_name.map(str::to_string),
            interfaces: Vec::new(),
            annotations: Vec::new(),
            fields: Vec::new(),
            methods,
            analysis_target: true,
        }
    }

    fn method_with(name: &str, descriptor: &str) -> Method {
        Method {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access: MethodAccess::default(),
            calls: Vec::new(),
        }
    }

    #[test]
    fn platform_stubs_declare_every_get_annotation_operation() {
        let table = ClassTable::new(Vec::new());

        for operation in ReflectiveOperation::ALL {
            let reference = operation.method_reference();
            assert_eq!(Some(reference.clone()), table.resolve_method(&reference));
        }
        assert!(table.lookup_class(&TypeReference::string()).is_some());
        assert!(table.classes().all(|class| !class.analysis_target));
    }

    #[test]
    fn program_classes_take_precedence_over_stubs() {
        let table = ClassTable::new(vec![class_with(JAVA_LANG_STRING, None, Vec::new())]);

        let class = table
            .lookup_class(&TypeReference::string())
            .expect("string class");

        assert!(class.analysis_target);
    }

    #[test]
    fn resolve_method_walks_super_classes() {
        let table = ClassTable::new(vec![
            class_with("com/example/Base", None, vec![method_with("run", "()V")]),
            class_with("com/example/Derived", Some("com/example/Base"), Vec::new()),
        ]);

        let resolved = table
            .resolve_method(&MethodReference::new("com/example/Derived", "run", "()V"))
            .expect("resolved");

        assert_eq!(TypeReference::new("com/example/Base"), resolved.owner);
        assert!(
            table
                .resolve_method(&MethodReference::new("com/example/Derived", "stop", "()V"))
                .is_none()
        );
        assert!(
            table
                .resolve_method(&MethodReference::new("com/example/Missing", "run", "()V"))
                .is_none()
        );
    }

    #[test]
    fn resolve_method_stops_on_cyclic_super_chain() {
        let table = ClassTable::new(vec![
            class_with("com/example/A", Some("com/example/B"), Vec::new()),
            class_with("com/example/B", Some("com/example/A"), Vec::new()),
        ]);

        assert!(
            table
                .resolve_method(&MethodReference::new("com/example/A", "run", "()V"))
                .is_none()
        );
    }

    #[test]
    fn synthetic_registration_is_idempotent() {
        let table = ClassTable::new(Vec::new());
        let loader = table.synthetic_loader();

        let first = loader.register_or_fetch(class_with("synthetic/X", None, Vec::new()));
        let second = loader.register_or_fetch(class_with(
            "synthetic/X",
            None,
            vec![method_with("other", "()V")],
        ));

        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(1, loader.len());
        assert!(second.methods.is_empty());
        let found = table
            .lookup_class(&TypeReference::new("synthetic/X"))
            .expect("registered class");
        assert!(Rc::ptr_eq(&first, &found));
    }
}
