//! Invalid-metadata repair.
//!
//! Obfuscators inject control characters and U+FFFD into identifier names
//! to break decompilers. Every type, namespace, method, parameter, field,
//! property, and event name is stripped of those characters; names that
//! become empty fall back to a role placeholder, except namespaces and
//! parameter names, which may legitimately be empty.

use super::{Pass, PassResult};
use crate::bytecode::BytecodeModule;

fn sanitize(value: &str, fallback: &str, allow_empty: bool) -> String {
    let cleaned: String = value
        .chars()
        .filter(|ch| !ch.is_control() && *ch != '\u{FFFD}')
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        if allow_empty {
            String::new()
        } else {
            fallback.to_string()
        }
    } else {
        cleaned.to_string()
    }
}

/// Apply `sanitize` in place, counting the rename if anything changed.
fn fix(name: &mut String, fallback: &str, allow_empty: bool, changes: &mut usize) {
    let sanitized = sanitize(name, fallback, allow_empty);
    if sanitized != *name {
        *name = sanitized;
        *changes += 1;
    }
}

pub struct InvalidMetadataFixer;

impl Pass for InvalidMetadataFixer {
    fn name(&self) -> &'static str {
        "Invalid Metadata"
    }

    fn apply(&self, module: &mut BytecodeModule) -> PassResult {
        let mut changes = 0;
        for ty in &mut module.types {
            fix(&mut ty.name, "Type", false, &mut changes);
            fix(&mut ty.namespace, "", true, &mut changes);
            for method in &mut ty.methods {
                fix(&mut method.name, "Method", false, &mut changes);
                for param in &mut method.params {
                    fix(&mut param.name, "param", true, &mut changes);
                }
            }
            for field in &mut ty.fields {
                fix(&mut field.name, "Field", false, &mut changes);
            }
            for property in &mut ty.properties {
                fix(&mut property.name, "Property", false, &mut changes);
            }
            for event in &mut ty.events {
                fix(&mut event.name, "Event", false, &mut changes);
            }
        }

        let note = if changes == 0 {
            "No invalid metadata identifiers sanitized."
        } else {
            "Sanitized invalid metadata identifiers."
        };
        PassResult::new(self.name(), changes, note)
    }
}
