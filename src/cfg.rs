use std::collections::BTreeSet;

use crate::ir::{BasicBlock, ControlFlowGraph, FlowEdge, Instruction};

/// Build a control flow graph induced by a flat, branch-free instruction array.
pub fn induced_cfg(instructions: &[Instruction]) -> ControlFlowGraph {
    let len = instructions.len() as u32;
    let mut leaders = BTreeSet::new();
    leaders.insert(0u32);
    for (position, inst) in instructions.iter().enumerate() {
        if inst.is_exit() {
            leaders.insert(position as u32 + 1);
        }
    }

    let mut leader_list: Vec<u32> = leaders.into_iter().collect();
    leader_list.retain(|index| *index < len);

    let mut blocks = Vec::new();
    for (position, start) in leader_list.iter().copied().enumerate() {
        let end = leader_list.get(position + 1).copied().unwrap_or(len);
        blocks.push(BasicBlock {
            start_index: start,
            end_index: end,
            instructions: instructions[start as usize..end as usize].to_vec(),
        });
    }

    let mut edges = Vec::new();
    for block in &blocks {
        let Some(last_inst) = block.instructions.last() else {
            continue;
        };
        if last_inst.is_exit() {
            continue;
        }
        if let Some(next) = next_block_start(&blocks, block.end_index) {
            edges.push(FlowEdge {
                from: block.start_index,
                to: next,
            });
        }
    }

    ControlFlowGraph { blocks, edges }
}

fn next_block_start(blocks: &[BasicBlock], index: u32) -> Option<u32> {
    blocks
        .iter()
        .find(|block| block.start_index == index)
        .map(|block| block.start_index)
}
