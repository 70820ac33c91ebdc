use crate::ir::{
    Annotation, Class, ConstValue, ElementValue, Field, JAVA_LANG_OBJECT, TypeReference,
};

pub const SYNTHETIC_ANNOTATION_PACKAGE: &str = "synthetic/annotation";

/// Name under which the stand-in class for `annotation` as found on
/// `subject` is registered.
pub fn synthetic_annotation_class_name(
    subject: &TypeReference,
    annotation: &TypeReference,
) -> TypeReference {
    TypeReference::new(format!(
        "{SYNTHETIC_ANNOTATION_PACKAGE}/{}${}",
        mangle(subject),
        mangle(annotation)
    ))
}

// `_` only ever starts a two-character escape, so distinct names never
// collide and the `$` separator cannot occur inside a mangled name.
fn mangle(name: &TypeReference) -> String {
    let mut mangled = String::with_capacity(name.name().len());
    for ch in name.name().chars() {
        match ch {
            '/' => mangled.push_str("_0"),
            '_' => mangled.push_str("_1"),
            '$' => mangled.push_str("_2"),
            other => mangled.push(other),
        }
    }
    mangled
}

/// Declared type of the field holding an element value.
pub fn field_type_for(value: &ElementValue) -> TypeReference {
    match value {
        ElementValue::Const(ConstValue::String(_)) => TypeReference::string(),
        ElementValue::Const(ConstValue::Int(_)) => TypeReference::integer(),
        ElementValue::Const(ConstValue::Boolean(_)) => TypeReference::boolean(),
        ElementValue::Enum { .. } => TypeReference::enumeration(),
        // Heterogeneous arrays are typed after their first element.
        ElementValue::Array(values) => match values.first() {
            Some(first) => field_type_for(first),
            None => TypeReference::class(),
        },
        ElementValue::Const(_) | ElementValue::Class(_) | ElementValue::Annotation(_) => {
            TypeReference::class()
        }
    }
}

/// Class standing in for `annotation` as attached to `subject`: one field
/// per named argument, implementing the annotation interface.
pub fn build_annotation_class(subject: &TypeReference, annotation: &Annotation) -> Class {
    let name = synthetic_annotation_class_name(subject, &annotation.type_name);
    let mut class = Class {
        name: name.name().to_string(),
        super_name: Some(JAVA_LANG_OBJECT.to_string()),
        interfaces: vec![annotation.type_name.name().to_string()],
        annotations: Vec::new(),
        fields: Vec::new(),
        methods: Vec::new(),
        analysis_target: false,
    };
    for (key, value) in &annotation.named_arguments {
        if class.find_field(key).is_none() {
            class.fields.push(Field {
                name: key.clone(),
                field_type: field_type_for(value),
            });
        }
    }
    class
}
