//! Control-flow cleanup.
//!
//! Two simplifications per body, in order: unreferenced NOPs are deleted
//! outright, then branch plumbing is flattened. Flattening first
//! collapses chains of unconditional branches so every branch operand
//! points at its final destination, then drops unconditional branches
//! whose target is the physically next instruction. A branch that is
//! itself a branch target cannot be deleted; it degrades to a NOP and a
//! later run picks it up.

use std::collections::{HashMap, HashSet};

use super::{Pass, PassResult};
use crate::bytecode::{BytecodeModule, InstrId, MethodBody, OpCode, Operand};

/// Map every unconditional branch's id to its immediate target.
fn branch_targets(body: &MethodBody) -> HashMap<InstrId, InstrId> {
    let mut map = HashMap::new();
    for instr in &body.instructions {
        if instr.opcode == OpCode::Branch {
            if let Operand::Target(target) = instr.operand {
                map.insert(instr.id, target);
            }
        }
    }
    map
}

/// Follow a chain of unconditional branches to its final destination.
/// A visited set bounds the walk so branch cycles terminate.
fn final_target(start: InstrId, chains: &HashMap<InstrId, InstrId>) -> InstrId {
    let mut current = start;
    let mut visited = HashSet::new();
    while let Some(next) = chains.get(&current) {
        if !visited.insert(current) {
            break;
        }
        current = *next;
    }
    current
}

fn collapse_branch_chains(body: &mut MethodBody) {
    let chains = branch_targets(body);
    for instr in &mut body.instructions {
        match &mut instr.operand {
            Operand::Target(target) => {
                *target = final_target(*target, &chains);
            }
            Operand::Switch(targets) => {
                for target in targets {
                    *target = final_target(*target, &chains);
                }
            }
            _ => {}
        }
    }
}

/// Drop (or degrade) unconditional branches that jump to the instruction
/// physically following them.
fn remove_branches_to_next(body: &mut MethodBody) {
    let referenced = body.referenced_ids();
    let mut index = 0;
    while index + 1 < body.instructions.len() {
        let falls_through = {
            let instr = &body.instructions[index];
            instr.opcode == OpCode::Branch
                && matches!(
                    instr.operand,
                    Operand::Target(t) if t == body.instructions[index + 1].id
                )
        };
        if falls_through {
            let id = body.instructions[index].id;
            if referenced.contains(&id) {
                let instr = &mut body.instructions[index];
                instr.opcode = OpCode::Nop;
                instr.operand = Operand::None;
                index += 1;
            } else {
                body.instructions.remove(index);
            }
        } else {
            index += 1;
        }
    }
}

pub struct ControlFlowDeobfuscator;

impl Pass for ControlFlowDeobfuscator {
    fn name(&self) -> &'static str {
        "Control Flow"
    }

    fn apply(&self, module: &mut BytecodeModule) -> PassResult {
        let mut changes = 0;
        for ty in &mut module.types {
            for method in &mut ty.methods {
                let Some(body) = method.body.as_mut() else {
                    continue;
                };
                let referenced = body.referenced_ids();
                let before = body.instructions.len();
                body.instructions
                    .retain(|i| i.opcode != OpCode::Nop || referenced.contains(&i.id));
                changes += before - body.instructions.len();

                // The simplifier reports by instruction-count delta:
                // retargets and degraded branches keep the count stable
                // and are picked up by the next run's NOP sweep.
                let before = body.instructions.len();
                collapse_branch_chains(body);
                remove_branches_to_next(body);
                changes += before - body.instructions.len();
            }
        }

        let note = if changes == 0 {
            "No control flow simplifications applied."
        } else {
            "Simplified branches and removed dead NOPs."
        };
        PassResult::new(self.name(), changes, note)
    }
}
