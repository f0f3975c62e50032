//! Encoded-string recovery.
//!
//! The cheapest string obfuscation is Base64 over the literal pool.
//! Every string-load operand that decodes cleanly to mostly-printable
//! text is replaced in place with the decoded value. The gate is
//! deliberately conservative: short literals and anything that decodes
//! to binary noise are left alone, so an already-clean module passes
//! through unchanged.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::{Pass, PassResult};
use crate::bytecode::{BytecodeModule, OpCode, Operand};
use crate::entropy::PRINTABLE_RATIO;

/// Decode a candidate literal, or `None` when it is not convincingly an
/// encoded string.
fn decode_printable(value: &str) -> Option<String> {
    if value.len() < 8 || value.len() % 4 != 0 {
        return None;
    }
    let bytes = STANDARD.decode(value).ok()?;
    let decoded = String::from_utf8_lossy(&bytes).into_owned();
    if decoded.trim().is_empty() {
        return None;
    }
    let printable = decoded.chars().filter(|ch| !ch.is_control()).count();
    if (printable as f64) / (decoded.chars().count() as f64) < PRINTABLE_RATIO {
        return None;
    }
    Some(decoded)
}

pub struct StringDecryptor;

impl Pass for StringDecryptor {
    fn name(&self) -> &'static str {
        "String Decryptor"
    }

    fn apply(&self, module: &mut BytecodeModule) -> PassResult {
        let mut changes = 0;
        for ty in &mut module.types {
            for method in &mut ty.methods {
                let Some(body) = method.body.as_mut() else {
                    continue;
                };
                for instr in &mut body.instructions {
                    if instr.opcode != OpCode::LoadString {
                        continue;
                    }
                    let Operand::Str(value) = &instr.operand else {
                        continue;
                    };
                    if let Some(decoded) = decode_printable(value) {
                        instr.operand = Operand::Str(decoded);
                        changes += 1;
                    }
                }
            }
        }

        let note = if changes == 0 {
            "No Base64 strings replaced."
        } else {
            "Replaced Base64-encoded literals with decoded strings."
        };
        PassResult::new(self.name(), changes, note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{MethodBody, MethodDef, TypeDef};

    fn module_with_literal(value: &str) -> BytecodeModule {
        let mut module = BytecodeModule::new("sample");
        let mut body = MethodBody::new();
        body.push(OpCode::LoadString, Operand::Str(value.to_string()));
        body.push(OpCode::Ret, Operand::None);
        let mut method = MethodDef::new("Main");
        method.body = Some(body);
        let mut ty = TypeDef::new("App", "Program");
        ty.methods.push(method);
        module.push_type(ty);
        module
    }

    fn literal_of(module: &BytecodeModule) -> &str {
        let body = module.types[0].methods[0].body.as_ref().unwrap();
        match &body.instructions[0].operand {
            Operand::Str(s) => s,
            other => panic!("unexpected operand: {other:?}"),
        }
    }

    #[test]
    fn base64_literal_is_decoded_once() {
        let mut module = module_with_literal("SGVsbG8sIFdvcmxkIQ==");
        let result = StringDecryptor.apply(&mut module);
        assert_eq!(result.changes, 1);
        assert_eq!(literal_of(&module), "Hello, World!");

        // The decoded text no longer looks encoded; a second run is a no-op.
        assert_eq!(StringDecryptor.apply(&mut module).changes, 0);
        assert_eq!(literal_of(&module), "Hello, World!");
    }

    #[test]
    fn short_and_unpadded_literals_are_kept() {
        for value in ["abcd", "not base64!!", "SGVsbG8"] {
            let mut module = module_with_literal(value);
            assert_eq!(StringDecryptor.apply(&mut module).changes, 0);
            assert_eq!(literal_of(&module), value);
        }
    }

    #[test]
    fn binary_payloads_are_kept() {
        // Valid Base64, but the bytes are noise rather than text.
        let noise = STANDARD.encode([0x01u8, 0x02, 0x03, 0x9C, 0x07, 0x1B, 0x00, 0x10, 0x7F]);
        let mut module = module_with_literal(&noise);
        assert_eq!(StringDecryptor.apply(&mut module).changes, 0);
    }
}
