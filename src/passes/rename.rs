//! Obfuscated-identifier renaming.
//!
//! Names that are clearly machine-generated (one or two characters,
//! non-ASCII glyphs, or pure `_`/`$` filler) get stable readable
//! replacements: `Class001`, `Class002`, ... in module order, and one
//! continuous `Method001`, ... sequence across all types. The global
//! `<Module>` type and constructors keep their names; both carry
//! structural meaning the runtime depends on.

use super::{Pass, PassResult};
use crate::bytecode::BytecodeModule;

fn is_obfuscated(name: &str) -> bool {
    if name.trim().is_empty() {
        return false;
    }
    name.chars().count() <= 2
        || name.chars().any(|ch| ch as u32 > 0x7F)
        || name.chars().all(|ch| ch == '_' || ch == '$')
}

pub struct RenameMapper;

impl Pass for RenameMapper {
    fn name(&self) -> &'static str {
        "Rename Mapper"
    }

    fn apply(&self, module: &mut BytecodeModule) -> PassResult {
        let mut changes = 0;
        let mut next_type = 1usize;
        let mut next_method = 1usize;
        for ty in &mut module.types {
            if ty.is_global {
                continue;
            }
            if is_obfuscated(&ty.name) {
                ty.name = format!("Class{next_type:03}");
                next_type += 1;
                changes += 1;
            }
            for method in &mut ty.methods {
                if method.is_constructor() {
                    continue;
                }
                if is_obfuscated(&method.name) {
                    method.name = format!("Method{next_method:03}");
                    next_method += 1;
                    changes += 1;
                }
            }
        }

        let note = if changes == 0 {
            "No obfuscated identifiers renamed."
        } else {
            "Renamed obfuscated types and methods."
        };
        PassResult::new(self.name(), changes, note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{MethodDef, MethodKind, TypeDef};

    #[test]
    fn short_and_unicode_names_are_detected() {
        assert!(is_obfuscated("a"));
        assert!(is_obfuscated("aB"));
        assert!(is_obfuscated("\u{202E}evil"));
        assert!(is_obfuscated("____"));
        assert!(is_obfuscated("$$"));
        assert!(!is_obfuscated("Program"));
        assert!(!is_obfuscated("Run"));
        assert!(!is_obfuscated("   "));
    }

    #[test]
    fn counters_run_in_module_order_and_skip_exemptions() {
        let mut module = BytecodeModule::new("sample");

        let mut global = TypeDef::new("", "<Module>");
        global.is_global = true;
        module.push_type(global);

        let mut a = TypeDef::new("App", "a");
        let mut ctor = MethodDef::new(".ctor");
        ctor.kind = MethodKind::Ctor;
        a.methods.push(ctor);
        a.methods.push(MethodDef::new("x"));
        module.push_type(a);

        let mut b = TypeDef::new("App", "\u{3042}");
        b.methods.push(MethodDef::new("y"));
        b.methods.push(MethodDef::new("Run"));
        module.push_type(b);

        let result = RenameMapper.apply(&mut module);
        assert_eq!(result.changes, 4);
        assert_eq!(module.types[0].name, "<Module>");
        assert_eq!(module.types[1].name, "Class001");
        assert_eq!(module.types[1].methods[0].name, ".ctor");
        assert_eq!(module.types[1].methods[1].name, "Method001");
        assert_eq!(module.types[2].name, "Class002");
        // Method numbering continues across types.
        assert_eq!(module.types[2].methods[0].name, "Method002");
        assert_eq!(module.types[2].methods[1].name, "Run");

        // The replacement names are readable, so a rerun changes nothing.
        assert_eq!(RenameMapper.apply(&mut module).changes, 0);
    }
}
