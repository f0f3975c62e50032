//! Debugger-probe neutralization.
//!
//! Calls into the known debugger-detection surface are replaced with a
//! constant-false push, so guarded branches fall through to the
//! not-debugged path.

use super::{Pass, PassResult};
use crate::bytecode::{BytecodeModule, OpCode, Operand};

/// Fully-qualified-name fragments that identify debugger probes.
/// Matched case-insensitively against `DeclaringType::Name`.
pub(crate) const DEBUG_PROBE_SIGNATURES: [&str; 3] = [
    "system.diagnostics.debugger::get_isattached",
    "checkremotedebuggerpresent",
    "isdebuggerpresent",
];

pub(crate) fn is_debug_probe(full_name: &str) -> bool {
    let lowered = full_name.to_lowercase();
    DEBUG_PROBE_SIGNATURES
        .iter()
        .any(|sig| lowered.contains(sig))
}

pub struct AntiDebugRemover;

impl Pass for AntiDebugRemover {
    fn name(&self) -> &'static str {
        "Anti-Debug"
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
                    if is_debug_probe(&info.full_name()) {
                        sites.push((ti, mi, ii));
                    }
                }
            }
        }

        let changes = sites.len();
        for (ti, mi, ii) in sites {
            if let Some(body) = module.types[ti].methods[mi].body.as_mut() {
                let instr = &mut body.instructions[ii];
                instr.opcode = OpCode::LoadConstI32;
                instr.operand = Operand::Int32(0);
            }
        }

        let note = if changes == 0 {
            "No anti-debug calls replaced."
        } else {
            "Replaced anti-debug calls with constant false."
        };
        PassResult::new(self.name(), changes, note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{MemberRef, MethodBody, MethodDef, TypeDef};

    #[test]
    fn probe_calls_become_constant_false() {
        let mut module = BytecodeModule::new("sample");
        let probe = module.push_member_ref(MemberRef {
            name: "get_IsAttached".to_string(),
            declaring_type: "System.Diagnostics.Debugger".to_string(),
            param_count: 0,
            has_this: false,
            is_virtual: false,
        });
        let benign = module.push_member_ref(MemberRef {
            name: "WriteLine".to_string(),
            declaring_type: "System.Console".to_string(),
            param_count: 0,
            has_this: false,
            is_virtual: false,
        });
        let mut body = MethodBody::new();
        body.push(OpCode::Call, Operand::Callee(probe));
        body.push(OpCode::Call, Operand::Callee(benign));
        body.push(OpCode::Ret, Operand::None);
        let mut method = MethodDef::new("Main");
        method.body = Some(body);
        let mut ty = TypeDef::new("App", "Program");
        ty.methods.push(method);
        module.push_type(ty);

        let result = AntiDebugRemover.apply(&mut module);
        assert_eq!(result.changes, 1);
        let body = module.types[0].methods[0].body.as_ref().unwrap();
        assert_eq!(body.instructions[0].opcode, OpCode::LoadConstI32);
        assert_eq!(body.instructions[0].operand, Operand::Int32(0));
        assert_eq!(body.instructions[1].opcode, OpCode::Call);

        assert_eq!(AntiDebugRemover.apply(&mut module).changes, 0);
    }

    #[test]
    fn signature_set_matches_win32_probes() {
        assert!(is_debug_probe("kernel32::IsDebuggerPresent"));
        assert!(is_debug_probe("kernel32::CheckRemoteDebuggerPresent"));
        assert!(!is_debug_probe("System.Console::WriteLine"));
    }
}
