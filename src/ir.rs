use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pointsto::InstanceKey;

pub const JAVA_LANG_OBJECT: &str = "java/lang/Object";
pub const JAVA_LANG_CLASS: &str = "java/lang/Class";
pub const JAVA_LANG_STRING: &str = "java/lang/String";
pub const JAVA_LANG_INTEGER: &str = "java/lang/Integer";
pub const JAVA_LANG_BOOLEAN: &str = "java/lang/Boolean";
pub const JAVA_LANG_ENUM: &str = "java/lang/Enum";
pub const JAVA_LANG_ANNOTATION: &str = "java/lang/annotation/Annotation";

/// Internal (slash separated) name of a JVM class.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeReference(String);

impl TypeReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn string() -> Self {
        Self::new(JAVA_LANG_STRING)
    }

    pub fn integer() -> Self {
        Self::new(JAVA_LANG_INTEGER)
    }

    pub fn boolean() -> Self {
        Self::new(JAVA_LANG_BOOLEAN)
    }

    pub fn enumeration() -> Self {
        Self::new(JAVA_LANG_ENUM)
    }

    pub fn class() -> Self {
        Self::new(JAVA_LANG_CLASS)
    }
}

impl fmt::Display for TypeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Symbolic reference to a method: declaring class, name and descriptor.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct MethodReference {
    pub owner: TypeReference,
    pub name: String,
    pub descriptor: String,
}

impl MethodReference {
    pub fn new(owner: &str, name: &str, descriptor: &str) -> Self {
        Self {
            owner: TypeReference::new(owner),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }
}

impl fmt::Display for MethodReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.owner, self.name, self.descriptor)
    }
}

/// Symbolic reference to a field together with its declared type.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct FieldReference {
    pub owner: TypeReference,
    pub name: String,
    pub field_type: TypeReference,
}

impl fmt::Display for FieldReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.owner, self.name, self.field_type)
    }
}

/// Intermediate representation for classes of the analyzed program.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Class {
    pub name: String,
    #[serde(default)]
    pub super_name: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub methods: Vec<Method>,
    #[serde(default = "default_analysis_target")]
    pub analysis_target: bool,
}

fn default_analysis_target() -> bool {
    true
}

impl Class {
    pub fn type_reference(&self) -> TypeReference {
        TypeReference::new(self.name.as_str())
    }

    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<&Method> {
        self.methods
            .iter()
            .find(|method| method.name == name && method.descriptor == descriptor)
    }

    pub fn find_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn field_reference(&self, field: &Field) -> FieldReference {
        FieldReference {
            owner: self.type_reference(),
            name: field.name.clone(),
            field_type: field.field_type.clone(),
        }
    }
}

/// Field declared by a class.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub field_type: TypeReference,
}

/// Intermediate representation for a method and the call sites it contains.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    pub descriptor: String,
    #[serde(default)]
    pub access: MethodAccess,
    #[serde(default)]
    pub calls: Vec<CallSite>,
}

/// Method access flags used when numbering values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodAccess {
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_abstract: bool,
}

/// Annotation instance attached to a class.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub type_name: TypeReference,
    #[serde(default)]
    pub named_arguments: BTreeMap<String, ElementValue>,
}

/// One argument value of an annotation instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementValue {
    Const(ConstValue),
    Enum {
        type_name: TypeReference,
        const_name: String,
    },
    Class(TypeReference),
    Annotation(Box<Annotation>),
    Array(Vec<ElementValue>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstValue {
    Byte(i8),
    Char(char),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    String(String),
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Byte(value) => write!(f, "{value}"),
            ConstValue::Char(value) => write!(f, "{value}"),
            ConstValue::Short(value) => write!(f, "{value}"),
            ConstValue::Int(value) => write!(f, "{value}"),
            ConstValue::Long(value) => write!(f, "{value}"),
            ConstValue::Float(value) => write_jvm_floating(f, *value),
            ConstValue::Double(value) => write_jvm_floating(f, *value),
            ConstValue::Boolean(value) => write!(f, "{value}"),
            ConstValue::String(value) => f.write_str(value),
        }
    }
}

/// Renders a floating-point constant in the JVM's textual form: decimal
/// with at least one fractional digit inside `[1e-3, 1e7)`, otherwise
/// `d.dddE<n>`.
fn write_jvm_floating<T>(f: &mut fmt::Formatter<'_>, value: T) -> fmt::Result
where
    T: Copy + fmt::Display + fmt::LowerExp + Into<f64>,
{
    let wide: f64 = value.into();
    if wide.is_nan() {
        return f.write_str("NaN");
    }
    if wide.is_infinite() {
        return f.write_str(if wide > 0.0 { "Infinity" } else { "-Infinity" });
    }
    let magnitude = wide.abs();
    if magnitude == 0.0 || (1e-3..1e7).contains(&magnitude) {
        let plain = value.to_string();
        if plain.contains('.') {
            f.write_str(&plain)
        } else {
            write!(f, "{plain}.0")
        }
    } else {
        let scientific = format!("{value:e}");
        let (mantissa, exponent) = scientific
            .split_once('e')
            .unwrap_or((scientific.as_str(), "0"));
        if mantissa.contains('.') {
            write!(f, "{mantissa}E{exponent}")
        } else {
            write!(f, "{mantissa}.0E{exponent}")
        }
    }
}

impl fmt::Display for ElementValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementValue::Const(value) => write!(f, "{value}"),
            ElementValue::Enum {
                type_name,
                const_name,
            } => write!(f, "{type_name}.{const_name}"),
            ElementValue::Class(type_name) => write!(f, "{type_name}"),
            ElementValue::Annotation(annotation) => write!(f, "@{}", annotation.type_name),
            ElementValue::Array(values) => {
                f.write_str("[")?;
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Call site extracted from a method body, with the argument values the
/// points-to layer proved for it (slot 0 is the receiver).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallSite {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub kind: CallKind,
    pub offset: u32,
    #[serde(default)]
    pub arguments: Vec<InstanceKey>,
}

impl CallSite {
    pub fn declared_target(&self) -> MethodReference {
        MethodReference::new(&self.owner, &self.name, &self.descriptor)
    }
}

/// Call opcode classification used by CHA.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Virtual,
    Interface,
    Special,
    Static,
}

/// Allocation site of a synthesized `new`.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NewSiteReference {
    pub index: u32,
    pub declared_type: TypeReference,
}

/// SSA value number.
pub type ValueNumber = u32;

/// Instruction of a synthesized method body.
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub index: u32,
    pub kind: InstructionKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum InstructionKind {
    New {
        result: ValueNumber,
        site: NewSiteReference,
    },
    PutField {
        object: ValueNumber,
        value: ValueNumber,
        field: FieldReference,
    },
    Return {
        value: Option<ValueNumber>,
    },
}

impl Instruction {
    pub fn new_object(index: u32, result: ValueNumber, site: NewSiteReference) -> Self {
        Self {
            index,
            kind: InstructionKind::New { result, site },
        }
    }

    pub fn put_field(
        index: u32,
        object: ValueNumber,
        value: ValueNumber,
        field: FieldReference,
    ) -> Self {
        Self {
            index,
            kind: InstructionKind::PutField {
                object,
                value,
                field,
            },
        }
    }

    pub fn return_value(index: u32, value: ValueNumber) -> Self {
        Self {
            index,
            kind: InstructionKind::Return { value: Some(value) },
        }
    }

    /// Value defined by this instruction, if any.
    pub fn def(&self) -> Option<ValueNumber> {
        match &self.kind {
            InstructionKind::New { result, .. } => Some(*result),
            InstructionKind::PutField { .. } | InstructionKind::Return { .. } => None,
        }
    }

    /// Values read by this instruction, in operand order.
    pub fn uses(&self) -> Vec<ValueNumber> {
        match &self.kind {
            InstructionKind::New { .. } => Vec::new(),
            InstructionKind::PutField { object, value, .. } => vec![*object, *value],
            InstructionKind::Return { value } => value.iter().copied().collect(),
        }
    }

    pub fn is_exit(&self) -> bool {
        matches!(self.kind, InstructionKind::Return { .. })
    }
}

/// Basic block graph for a synthesized body.
#[derive(Clone, Debug, PartialEq)]
pub struct ControlFlowGraph {
    pub blocks: Vec<BasicBlock>,
    pub edges: Vec<FlowEdge>,
}

impl ControlFlowGraph {
    /// Blocks whose last instruction leaves the method.
    pub fn exit_blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.iter().filter(|block| {
            block
                .instructions
                .last()
                .is_some_and(|inst| inst.is_exit())
        })
    }
}

/// Basic block covering a range of instruction indices.
#[derive(Clone, Debug, PartialEq)]
pub struct BasicBlock {
    pub start_index: u32,
    pub end_index: u32,
    pub instructions: Vec<Instruction>,
}

/// Fall-through edge between basic blocks, identified by start index.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FlowEdge {
    pub from: u32,
    pub to: u32,
}
