//! Managed-module triage verdict.
//!
//! A read-only scan over a parsed module plus its raw bytes, producing a
//! summary, a list of findings, and a single obfuscation verdict. Runs
//! before any pass so the findings describe the module as shipped.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bytecode::{BytecodeModule, OpCode, Operand};
use crate::entropy::{entropy_rounded, HIGH_ENTROPY_FILE};
use crate::passes::is_debug_probe;

/// Known protector markers, checked in order; the first hit names the
/// product. `ConfusedBy` is the attribute ConfuserEx stamps on output.
const PROTECTOR_MARKERS: [(&str, &str); 6] = [
    ("ConfuserEx", "ConfuserEx"),
    ("ConfusedBy", "ConfuserEx"),
    ("Eziriz", ".NET Reactor"),
    ("Dotfuscator", "Dotfuscator"),
    ("Babel", "Babel Obfuscator"),
    ("AgileDotNet", "Agile.NET"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Clean,
    Warning,
    Obfuscated,
}

/// One observation about the module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub title: String,
    pub details: String,
    pub severity: Severity,
}

impl Finding {
    fn new(title: &str, details: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.to_string(),
            details: details.into(),
            severity,
        }
    }
}

/// Headline facts about the module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSummary {
    pub name: String,
    pub runtime_version: String,
    pub type_count: usize,
    pub method_count: usize,
    pub file_size: usize,
    pub entropy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageReport {
    pub summary: ModuleSummary,
    pub findings: Vec<Finding>,
    pub obfuscation_detected: bool,
}

fn has_non_ascii(value: &str) -> bool {
    value.chars().any(|ch| ch as u32 > 0x7F)
}

/// Names with characters outside printable ASCII, a decompiler-breaking
/// trick no mainstream compiler emits.
fn unicode_identifiers(module: &BytecodeModule) -> Vec<String> {
    let mut names = Vec::new();
    for ty in &module.types {
        if has_non_ascii(&ty.name) || has_non_ascii(&ty.namespace) {
            names.push(ty.full_name());
        }
        for method in &ty.methods {
            if has_non_ascii(&method.name) {
                names.push(format!("{}::{}", ty.full_name(), method.name));
            }
        }
    }
    names
}

fn debug_probe_count(module: &BytecodeModule) -> usize {
    let mut count = 0;
    for ty in &module.types {
        for method in &ty.methods {
            let Some(body) = &method.body else { continue };
            for instr in &body.instructions {
                if !matches!(instr.opcode, OpCode::Call | OpCode::CallVirt) {
                    continue;
                }
                let Operand::Callee(callee) = &instr.operand else {
                    continue;
                };
                if let Some(info) = module.callee_info(callee) {
                    if is_debug_probe(&info.full_name()) {
                        count += 1;
                    }
                }
            }
        }
    }
    count
}

/// Scan identity strings, attribute names, resource names, and type names
/// for the first known protector marker.
fn protector_marker(module: &BytecodeModule) -> Option<&'static str> {
    let mut haystacks = vec![module.assembly_full_name.to_lowercase()];
    haystacks.extend(module.attribute_type_names.iter().map(|n| n.to_lowercase()));
    haystacks.extend(module.resources.iter().map(|r| r.name.to_lowercase()));
    haystacks.extend(module.types.iter().map(|t| t.full_name().to_lowercase()));

    for (marker, product) in PROTECTOR_MARKERS {
        let needle = marker.to_lowercase();
        if haystacks.iter().any(|hay| hay.contains(&needle)) {
            return Some(product);
        }
    }
    None
}

/// Triage a parsed module against its on-disk bytes.
pub fn analyze(module: &BytecodeModule, file_bytes: &[u8]) -> TriageReport {
    let entropy = entropy_rounded(file_bytes);
    let summary = ModuleSummary {
        name: module.name.clone(),
        runtime_version: module.runtime_version.clone(),
        type_count: module.types.len(),
        method_count: module.method_count(),
        file_size: file_bytes.len(),
        entropy,
    };

    let mut findings = Vec::new();

    if entropy >= HIGH_ENTROPY_FILE {
        findings.push(Finding::new(
            "High entropy",
            format!("Whole-file entropy is {entropy:.3}; packed or encrypted data likely."),
            Severity::Warning,
        ));
    }

    let unicode = unicode_identifiers(module);
    if !unicode.is_empty() {
        findings.push(Finding::new(
            "Unicode identifiers",
            format!("{} identifier(s) use non-ASCII characters.", unicode.len()),
            Severity::Warning,
        ));
    }

    let probes = debug_probe_count(module);
    if probes > 0 {
        findings.push(Finding::new(
            "Anti-debug checks",
            format!("{probes} call site(s) query debugger state."),
            Severity::Obfuscated,
        ));
    }

    if let Some(product) = protector_marker(module) {
        findings.push(Finding::new(
            "Protector signature",
            format!("Detected markers for {product}."),
            Severity::Obfuscated,
        ));
    }

    let obfuscation_detected = findings.iter().any(|f| f.severity != Severity::Clean);
    debug!(
        module = summary.name.as_str(),
        findings = findings.len(),
        obfuscation_detected,
        "triage complete"
    );

    TriageReport {
        summary,
        findings,
        obfuscation_detected,
    }
}
