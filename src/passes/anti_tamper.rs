//! Anti-tamper guard removal.
//!
//! Protectors commonly install an integrity check through a single
//! `AntiTamper*::Initialize*` call injected into module startup. Every
//! call whose resolved target matches that shape is degraded to a no-op;
//! the instruction keeps its id so branch targets stay valid.

use super::{contains_ignore_case, Pass, PassResult};
use crate::bytecode::{BytecodeModule, OpCode, Operand};

pub struct AntiTamperRemover;

impl Pass for AntiTamperRemover {
    fn name(&self) -> &'static str {
        "Anti-Tamper"
    }

    fn apply(&self, module: &mut BytecodeModule) -> PassResult {
        let mut sites = Vec::new();
        for (ti, ty) in module.types.iter().enumerate() {
            for (mi, method) in ty.methods.iter().enumerate() {
                let Some(body) = &method.body else { continue };
                for (ii, instr) in body.instructions.iter().enumerate() {
                    if !matches!(instr.opcode, OpCode::Call | OpCode::CallVirt) {
                        continue;
                    }
                    let Operand::Callee(callee) = &instr.operand else {
                        continue;
                    };
                    let Some(info) = module.callee_info(callee) else {
                        continue;
                    };
                    if contains_ignore_case(&info.name, "initialize")
                        && contains_ignore_case(&info.declaring_type, "antitamper")
                    {
                        sites.push((ti, mi, ii));
                    }
                }
            }
        }

        let changes = sites.len();
        for (ti, mi, ii) in sites {
            if let Some(body) = module.types[ti].methods[mi].body.as_mut() {
                let instr = &mut body.instructions[ii];
                instr.opcode = OpCode::Nop;
                instr.operand = Operand::None;
            }
        }

        let note = if changes == 0 {
            "No anti-tamper markers removed."
        } else {
            "Replaced anti-tamper calls with NOPs."
        };
        PassResult::new(self.name(), changes, note)
    }
}
