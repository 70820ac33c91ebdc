use std::collections::BTreeMap;
use std::fmt;

use crate::context::Context;
use crate::ir::{ControlFlowGraph, Instruction, MethodReference, ValueNumber};

/// Literal held by a constant-pool slot, kept in its rendered form.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConstantValue(pub String);

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fabricated method body standing in for a real implementation.
#[derive(Debug)]
pub struct SyntheticIr {
    pub method: MethodReference,
    pub context: Context,
    pub instructions: Vec<Instruction>,
    pub constants: BTreeMap<ValueNumber, ConstantValue>,
    pub cfg: ControlFlowGraph,
}

impl SyntheticIr {
    pub fn constant(&self, value: ValueNumber) -> Option<&ConstantValue> {
        self.constants.get(&value)
    }
}

/// Definition and use chains of the values in one body.
#[derive(Debug)]
pub struct DefUse {
    defs: BTreeMap<ValueNumber, usize>,
    uses: BTreeMap<ValueNumber, Vec<usize>>,
}

impl DefUse {
    pub fn new(ir: &SyntheticIr) -> Self {
        let mut defs = BTreeMap::new();
        let mut uses: BTreeMap<ValueNumber, Vec<usize>> = BTreeMap::new();
        for (position, inst) in ir.instructions.iter().enumerate() {
            if let Some(value) = inst.def() {
                defs.insert(value, position);
            }
            for value in inst.uses() {
                let users = uses.entry(value).or_default();
                if !users.contains(&position) {
                    users.push(position);
                }
            }
        }
        Self { defs, uses }
    }

    /// Position of the instruction defining `value`; constants and
    /// parameters have none.
    pub fn def(&self, value: ValueNumber) -> Option<usize> {
        self.defs.get(&value).copied()
    }

    pub fn uses(&self, value: ValueNumber) -> &[usize] {
        self.uses.get(&value).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn use_count(&self, value: ValueNumber) -> usize {
        self.uses(value).len()
    }
}
