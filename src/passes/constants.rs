//! Constant folding.
//!
//! Obfuscators split plain constants into `ldc; ldc; op` arithmetic.
//! Each such window folds into a single constant load followed by two
//! NOPs, keeping all three instruction ids alive for any branch that
//! lands inside the window. One linear sweep; folded results can seed
//! further folds on the next pipeline run.

use super::{Pass, PassResult};
use crate::bytecode::{BytecodeModule, OpCode, Operand};

fn fold(op: &OpCode, a: i32, b: i32) -> Option<i32> {
    match op {
        OpCode::Add => Some(a.wrapping_add(b)),
        OpCode::Sub => Some(a.wrapping_sub(b)),
        OpCode::Mul => Some(a.wrapping_mul(b)),
        OpCode::Xor => Some(a ^ b),
        OpCode::And => Some(a & b),
        OpCode::Or => Some(a | b),
        _ => None,
    }
}

pub struct ConstantFolder;

impl Pass for ConstantFolder {
    fn name(&self) -> &'static str {
        "Constant Folder"
    }

    fn apply(&self, module: &mut BytecodeModule) -> PassResult {
        let mut changes = 0;
        for ty in &mut module.types {
            for method in &mut ty.methods {
                let Some(body) = method.body.as_mut() else {
                    continue;
                };
                let mut index = 0;
                while index + 2 < body.instructions.len() {
                    let window = &body.instructions[index..index + 3];
                    let folded = match (&window[0].opcode, &window[0].operand) {
                        (OpCode::LoadConstI32, Operand::Int32(a)) => {
                            match (&window[1].opcode, &window[1].operand) {
                                (OpCode::LoadConstI32, Operand::Int32(b)) => {
                                    fold(&window[2].opcode, *a, *b)
                                }
                                _ => None,
                            }
                        }
                        _ => None,
                    };
                    if let Some(value) = folded {
                        body.instructions[index].operand = Operand::Int32(value);
                        for slot in &mut body.instructions[index + 1..index + 3] {
                            slot.opcode = OpCode::Nop;
                            slot.operand = Operand::None;
                        }
                        changes += 1;
                    }
                    index += 1;
                }
            }
        }

        let note = if changes == 0 {
            "No constant expressions folded."
        } else {
            "Folded constant arithmetic into single loads."
        };
        PassResult::new(self.name(), changes, note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{MethodBody, MethodDef, TypeDef};

    fn module_with_body(body: MethodBody) -> BytecodeModule {
        let mut module = BytecodeModule::new("sample");
        let mut method = MethodDef::new("Main");
        method.body = Some(body);
        let mut ty = TypeDef::new("App", "Program");
        ty.methods.push(method);
        module.push_type(ty);
        module
    }

    fn opcodes(module: &BytecodeModule) -> Vec<OpCode> {
        module.types[0].methods[0]
            .body
            .as_ref()
            .unwrap()
            .instructions
            .iter()
            .map(|i| i.opcode.clone())
            .collect()
    }

    #[test]
    fn add_window_folds_to_one_load_and_nops() {
        let mut body = MethodBody::new();
        body.push(OpCode::LoadConstI32, Operand::Int32(2));
        body.push(OpCode::LoadConstI32, Operand::Int32(3));
        body.push(OpCode::Add, Operand::None);
        body.push(OpCode::Ret, Operand::None);
        let mut module = module_with_body(body);

        let result = ConstantFolder.apply(&mut module);
        assert_eq!(result.changes, 1);
        assert_eq!(
            opcodes(&module),
            [OpCode::LoadConstI32, OpCode::Nop, OpCode::Nop, OpCode::Ret]
        );
        let body = module.types[0].methods[0].body.as_ref().unwrap();
        assert_eq!(body.instructions[0].operand, Operand::Int32(5));
    }

    #[test]
    fn wrapping_semantics_match_integer_overflow() {
        let mut body = MethodBody::new();
        body.push(OpCode::LoadConstI32, Operand::Int32(i32::MAX));
        body.push(OpCode::LoadConstI32, Operand::Int32(1));
        body.push(OpCode::Add, Operand::None);
        let mut module = module_with_body(body);

        ConstantFolder.apply(&mut module);
        let body = module.types[0].methods[0].body.as_ref().unwrap();
        assert_eq!(body.instructions[0].operand, Operand::Int32(i32::MIN));
    }

    #[test]
    fn xor_splitting_folds_and_interleaved_code_does_not() {
        let mut body = MethodBody::new();
        body.push(OpCode::LoadConstI32, Operand::Int32(0x55AA));
        body.push(OpCode::LoadConstI32, Operand::Int32(0x00FF));
        body.push(OpCode::Xor, Operand::None);
        // A stray NOP between the loads and the op blocks folding.
        body.push(OpCode::LoadConstI32, Operand::Int32(1));
        body.push(OpCode::LoadConstI32, Operand::Int32(2));
        body.push(OpCode::Nop, Operand::None);
        body.push(OpCode::Add, Operand::None);
        body.push(OpCode::Ret, Operand::None);
        let mut module = module_with_body(body);

        let result = ConstantFolder.apply(&mut module);
        assert_eq!(result.changes, 1);
        let body = module.types[0].methods[0].body.as_ref().unwrap();
        assert_eq!(body.instructions[0].operand, Operand::Int32(0x55AA ^ 0x00FF));
        // The interleaved window stays as written.
        assert_eq!(body.instructions[3].operand, Operand::Int32(1));
        assert_eq!(body.instructions[6].opcode, OpCode::Add);
    }
}
