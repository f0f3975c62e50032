//! Proxy-call inlining.
//!
//! Call-hiding obfuscation routes every interesting call through a tiny
//! forwarder method whose body is exactly `ldarg.0 .. ldarg.N-1; call
//! target; ret`. Each such forwarder is identified by shape, then every
//! call to it is redirected at the real target with the matching
//! dispatch opcode. The forwarder bodies themselves are left in place;
//! once nothing calls them they are ordinary dead code.

use std::collections::HashMap;

use super::{Pass, PassResult};
use crate::bytecode::{BytecodeModule, Callee, MethodId, OpCode, Operand};

/// A forwarder's real target plus the dispatch to use at redirected sites.
struct ProxyTarget {
    callee: Callee,
    is_virtual: bool,
}

/// Check whether one method body is a pure argument forwarder.
///
/// The shape is strict: N sequential `ldarg` pushes (N counts the hidden
/// `this` for instance methods), one call, one `ret`, nothing else but
/// NOPs. The forwarded target must agree with the forwarder on explicit
/// parameter count and `this`-ness, otherwise arguments would not line up.
fn proxy_target(module: &BytecodeModule, id: MethodId) -> Option<ProxyTarget> {
    let method = module.method(id)?;
    let body = method.body.as_ref()?;
    let instrs: Vec<_> = body
        .instructions
        .iter()
        .filter(|i| i.opcode != OpCode::Nop)
        .collect();
    if instrs.len() < 3 {
        return None;
    }
    if instrs[instrs.len() - 1].opcode != OpCode::Ret {
        return None;
    }
    let call = instrs[instrs.len() - 2];
    if !matches!(call.opcode, OpCode::Call | OpCode::CallVirt) {
        return None;
    }
    let Operand::Callee(callee) = &call.operand else {
        return None;
    };

    let arg_count = method.params.len() + usize::from(method.has_this);
    if instrs.len() != arg_count + 2 {
        return None;
    }
    for (index, instr) in instrs[..arg_count].iter().enumerate() {
        if instr.opcode != OpCode::LoadArg || instr.operand != Operand::Int32(index as i32) {
            return None;
        }
    }

    let info = module.callee_info(callee)?;
    if info.param_count != method.params.len() || info.has_this != method.has_this {
        return None;
    }
    Some(ProxyTarget {
        callee: *callee,
        is_virtual: info.is_virtual,
    })
}

fn build_proxy_map(module: &BytecodeModule) -> HashMap<MethodId, ProxyTarget> {
    let mut map = HashMap::new();
    for (ti, ty) in module.types.iter().enumerate() {
        for mi in 0..ty.methods.len() {
            let id = MethodId {
                type_index: ti,
                method_index: mi,
            };
            if let Some(target) = proxy_target(module, id) {
                map.insert(id, target);
            }
        }
    }
    map
}

pub struct ProxyCallResolver;

impl Pass for ProxyCallResolver {
    fn name(&self) -> &'static str {
        "Proxy Calls"
    }

    fn apply(&self, module: &mut BytecodeModule) -> PassResult {
        let map = build_proxy_map(module);
        if map.is_empty() {
            return PassResult::new(self.name(), 0, "No proxy methods identified.");
        }

        let mut sites = Vec::new();
        for (ti, ty) in module.types.iter().enumerate() {
            for (mi, method) in ty.methods.iter().enumerate() {
                let Some(body) = &method.body else { continue };
                for (ii, instr) in body.instructions.iter().enumerate() {
                    if !matches!(instr.opcode, OpCode::Call | OpCode::CallVirt) {
                        continue;
                    }
                    if let Operand::Callee(Callee::Def(id)) = &instr.operand {
                        if map.contains_key(id) {
                            sites.push((ti, mi, ii, *id));
                        }
                    }
                }
            }
        }

        let changes = sites.len();
        for (ti, mi, ii, id) in sites {
            let target = &map[&id];
            if let Some(body) = module.types[ti].methods[mi].body.as_mut() {
                let instr = &mut body.instructions[ii];
                instr.opcode = if target.is_virtual {
                    OpCode::CallVirt
                } else {
                    OpCode::Call
                };
                instr.operand = Operand::Callee(target.callee);
            }
        }

        let note = if changes == 0 {
            "No proxy calls resolved.".to_string()
        } else {
            format!("Inlined calls through {} proxy method(s).", map.len())
        };
        PassResult::new(self.name(), changes, note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{MemberRef, MethodBody, MethodDef, Param, TypeDef};

    fn forwarder(target: Callee) -> MethodDef {
        let mut body = MethodBody::new();
        body.push(OpCode::LoadArg, Operand::Int32(0));
        body.push(OpCode::LoadArg, Operand::Int32(1));
        body.push(OpCode::Call, Operand::Callee(target));
        body.push(OpCode::Ret, Operand::None);
        let mut method = MethodDef::new("p_0");
        method.params.push(Param {
            name: "a".to_string(),
        });
        method.params.push(Param {
            name: "b".to_string(),
        });
        method.body = Some(body);
        method
    }

    fn external_add(module: &mut BytecodeModule) -> Callee {
        module.push_member_ref(MemberRef {
            name: "Add".to_string(),
            declaring_type: "Lib.Math".to_string(),
            param_count: 2,
            has_this: false,
            is_virtual: false,
        })
    }

    #[test]
    fn caller_is_redirected_at_the_real_target() {
        let mut module = BytecodeModule::new("sample");
        let target = external_add(&mut module);
        let proxy = forwarder(target);

        let proxy_id = MethodId {
            type_index: 0,
            method_index: 0,
        };
        let mut caller_body = MethodBody::new();
        caller_body.push(OpCode::LoadConstI32, Operand::Int32(1));
        caller_body.push(OpCode::LoadConstI32, Operand::Int32(2));
        caller_body.push(OpCode::Call, Operand::Callee(Callee::Def(proxy_id)));
        caller_body.push(OpCode::Ret, Operand::None);
        let mut caller = MethodDef::new("Main");
        caller.body = Some(caller_body);

        let mut ty = TypeDef::new("App", "Program");
        ty.methods.push(proxy);
        ty.methods.push(caller);
        module.push_type(ty);

        let result = ProxyCallResolver.apply(&mut module);
        assert_eq!(result.changes, 1);
        assert_eq!(result.note, "Inlined calls through 1 proxy method(s).");
        let body = module.types[0].methods[1].body.as_ref().unwrap();
        assert_eq!(body.instructions[2].opcode, OpCode::Call);
        assert_eq!(body.instructions[2].operand, Operand::Callee(target));
    }

    #[test]
    fn extra_instruction_disqualifies_a_forwarder() {
        let mut module = BytecodeModule::new("sample");
        let target = external_add(&mut module);
        let mut proxy = forwarder(target);
        // An extra constant push breaks the pure-forwarder shape.
        let body = proxy.body.as_mut().unwrap();
        let extra_id = body.push(OpCode::LoadConstI32, Operand::Int32(7));
        let extra = body.instructions.pop().unwrap();
        assert_eq!(extra.id, extra_id);
        body.instructions.insert(2, extra);
        let mut ty = TypeDef::new("App", "Program");
        ty.methods.push(proxy);
        module.push_type(ty);

        let result = ProxyCallResolver.apply(&mut module);
        assert_eq!(result.note, "No proxy methods identified.");
    }

    #[test]
    fn parameter_count_mismatch_disqualifies() {
        let mut module = BytecodeModule::new("sample");
        let target = module.push_member_ref(MemberRef {
            name: "Add".to_string(),
            declaring_type: "Lib.Math".to_string(),
            param_count: 3,
            has_this: false,
            is_virtual: false,
        });
        let proxy = forwarder(target);
        let mut ty = TypeDef::new("App", "Program");
        ty.methods.push(proxy);
        module.push_type(ty);

        let result = ProxyCallResolver.apply(&mut module);
        assert_eq!(result.note, "No proxy methods identified.");
    }

    #[test]
    fn virtual_target_switches_dispatch() {
        let mut module = BytecodeModule::new("sample");
        let target = module.push_member_ref(MemberRef {
            name: "Render".to_string(),
            declaring_type: "Lib.View".to_string(),
            param_count: 2,
            has_this: false,
            is_virtual: true,
        });
        let proxy = forwarder(target);
        let proxy_id = MethodId {
            type_index: 0,
            method_index: 0,
        };
        let mut caller_body = MethodBody::new();
        caller_body.push(OpCode::Call, Operand::Callee(Callee::Def(proxy_id)));
        caller_body.push(OpCode::Ret, Operand::None);
        let mut caller = MethodDef::new("Main");
        caller.body = Some(caller_body);
        let mut ty = TypeDef::new("App", "Program");
        ty.methods.push(proxy);
        ty.methods.push(caller);
        module.push_type(ty);

        ProxyCallResolver.apply(&mut module);
        let body = module.types[0].methods[1].body.as_ref().unwrap();
        assert_eq!(body.instructions[0].opcode, OpCode::CallVirt);
    }
}
