//! Bytecode transformation passes.
//!
//! Two fixed pipelines mutate a [`BytecodeModule`] in place: the
//! anti-anti-analysis pipeline (tamper guards, debugger probes, invalid
//! metadata, proxy calls, control flow) and the data-deobfuscation
//! pipeline (encoded strings, obfuscated identifiers, compressed
//! resources, folded constants). Pass order is fixed — later passes
//! assume the postconditions of earlier ones — and every pass runs to
//! completion over one exclusively borrowed module.

mod anti_debug;
mod anti_tamper;
mod constants;
mod control_flow;
mod metadata;
mod proxy;
mod rename;
mod resources;
mod strings;

pub use anti_debug::AntiDebugRemover;
pub(crate) use anti_debug::is_debug_probe;
pub use anti_tamper::AntiTamperRemover;
pub use constants::ConstantFolder;
pub use control_flow::ControlFlowDeobfuscator;
pub use metadata::InvalidMetadataFixer;
pub use proxy::ProxyCallResolver;
pub use rename::RenameMapper;
pub use resources::ResourceDecryptor;
pub use strings::StringDecryptor;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bytecode::BytecodeModule;

/// Outcome of one pass execution. Append-only: one per run, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassResult {
    pub name: String,
    pub changes: usize,
    pub note: String,
}

impl PassResult {
    pub fn new(name: &str, changes: usize, note: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            changes,
            note: note.into(),
        }
    }
}

/// One transformation capability: a name and an in-place application.
pub trait Pass {
    fn name(&self) -> &'static str;
    fn apply(&self, module: &mut BytecodeModule) -> PassResult;
}

/// The five anti-anti-analysis passes in their fixed order.
pub fn anti_anti_passes() -> Vec<Box<dyn Pass>> {
    vec![
        Box::new(AntiTamperRemover),
        Box::new(AntiDebugRemover),
        Box::new(InvalidMetadataFixer),
        Box::new(ProxyCallResolver),
        Box::new(ControlFlowDeobfuscator),
    ]
}

/// The four data-deobfuscation passes in their fixed order.
pub fn deobfuscation_passes() -> Vec<Box<dyn Pass>> {
    vec![
        Box::new(StringDecryptor),
        Box::new(RenameMapper),
        Box::new(ResourceDecryptor),
        Box::new(ConstantFolder),
    ]
}

/// Run passes strictly in order, collecting one result per pass.
pub fn run_pipeline(module: &mut BytecodeModule, passes: &[Box<dyn Pass>]) -> Vec<PassResult> {
    passes
        .iter()
        .map(|pass| {
            let result = pass.apply(module);
            debug!(
                pass = result.name.as_str(),
                changes = result.changes,
                "pass complete"
            );
            result
        })
        .collect()
}

pub(crate) fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
