//! Native PE structural and heuristic analysis.
//!
//! Read-only: the image is parsed with goblin, summarized (sections with
//! entropy, imports, exports, resource table, strings), the entry point
//! is disassembled for a short preview, and toolchain/packer hints are
//! collected. Individual missing structures degrade to empty fields;
//! only an unreadable path or a non-PE buffer is an error.

mod hints;
mod resources;
mod strings;

pub use resources::ResourceTypeInfo;
pub use strings::extract_strings;

use std::path::Path;

use goblin::pe::PE;
use iced_x86::{Decoder, DecoderOptions, Formatter, IntelFormatter};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entropy::entropy_rounded;
use crate::error::{Error, Result};

/// Bytes fetched at the entry point for the disassembly preview.
const ENTRY_PREVIEW_BYTES: usize = 64;

/// Maximum instructions in the disassembly preview.
const ENTRY_PREVIEW_INSTRUCTIONS: usize = 12;

/// One section row: identity, sizes, and entropy over the raw bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionInfo {
    pub name: String,
    pub virtual_size: u32,
    pub raw_size: u32,
    pub entropy: f64,
}

/// Full structural summary of one native PE image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeImage {
    pub file_name: String,
    pub architecture: String,
    pub entry_point: String,
    pub file_size: usize,
    pub sections: Vec<SectionInfo>,
    pub imports: Vec<String>,
    pub exports: Vec<String>,
    pub resources: Vec<ResourceTypeInfo>,
    pub strings: Vec<String>,
    pub disassembly: Vec<String>,
    pub compiler_hints: Vec<String>,
    pub packer_hints: Vec<String>,
}

fn architecture_name(machine: u16) -> String {
    match machine {
        0x14c => "x86".to_string(),
        0x8664 => "x86_64".to_string(),
        0xAA64 => "arm64".to_string(),
        0x1c0 => "arm".to_string(),
        other => format!("{other:#x}"),
    }
}

fn section_name(raw: &[u8; 8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches('\0')
        .to_string()
}

/// Map an RVA to a file offset through the section table.
fn rva_to_offset(pe: &PE, data_len: usize, rva: usize) -> Option<usize> {
    for section in &pe.sections {
        let start = section.virtual_address as usize;
        let span = section.virtual_size.max(section.size_of_raw_data) as usize;
        if rva >= start && rva < start + span {
            let offset = rva - start + section.pointer_to_raw_data as usize;
            if offset < data_len {
                return Some(offset);
            }
        }
    }
    None
}

fn collect_sections(pe: &PE, data: &[u8]) -> Vec<SectionInfo> {
    pe.sections
        .iter()
        .map(|section| {
            let start = section.pointer_to_raw_data as usize;
            let size = section.size_of_raw_data as usize;
            let entropy = match data.get(start..start + size) {
                Some(raw) if size > 0 => entropy_rounded(raw),
                _ => 0.0,
            };
            SectionInfo {
                name: section_name(&section.name),
                virtual_size: section.virtual_size,
                raw_size: section.size_of_raw_data,
                entropy,
            }
        })
        .collect()
}

fn collect_imports(pe: &PE) -> Vec<String> {
    let mut imports: Vec<String> = pe
        .imports
        .iter()
        .map(|import| format!("{}!{}", import.dll, import.name))
        .collect();
    imports.sort_by(|a, b| a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase()));
    imports.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
    imports
}

fn collect_exports(pe: &PE) -> Vec<String> {
    let mut exports: Vec<String> = pe
        .exports
        .iter()
        .map(|export| match export.name {
            Some(name) => name.to_string(),
            None => format!("Rva:0x{:X}", export.rva),
        })
        .collect();
    exports.sort_by(|a, b| a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase()));
    exports.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
    exports
}

/// Disassemble a short preview at the entry point.
fn entry_disassembly(pe: &PE, data: &[u8]) -> Vec<String> {
    if pe.entry == 0 {
        return Vec::new();
    }
    let Some(offset) = rva_to_offset(pe, data.len(), pe.entry) else {
        return Vec::new();
    };
    let end = (offset + ENTRY_PREVIEW_BYTES).min(data.len());
    let code = &data[offset..end];

    let bitness = if pe.is_64 { 64 } else { 32 };
    let mut decoder = Decoder::with_ip(bitness, code, pe.entry as u64, DecoderOptions::NONE);
    let mut formatter = IntelFormatter::new();
    let mut lines = Vec::new();
    while decoder.can_decode() && lines.len() < ENTRY_PREVIEW_INSTRUCTIONS {
        let instruction = decoder.decode();
        if instruction.is_invalid() {
            break;
        }
        let mut text = String::new();
        formatter.format(&instruction, &mut text);
        lines.push(format!("0x{:08X}  {}", instruction.ip(), text));
    }
    lines
}

fn collect_resources(pe: &PE, data: &[u8]) -> Vec<ResourceTypeInfo> {
    let Some(optional) = pe.header.optional_header.as_ref() else {
        return Vec::new();
    };
    let dir = match optional.data_directories.get_resource_table() {
        Some(dir) if dir.virtual_address != 0 && dir.size != 0 => dir,
        _ => return Vec::new(),
    };
    let Some(offset) = rva_to_offset(pe, data.len(), dir.virtual_address as usize) else {
        return Vec::new();
    };
    resources::summarize(&data[offset..])
}

/// Analyze the native PE at `path`.
pub fn analyze(path: &Path) -> Result<NativeImage> {
    if !path.exists() {
        return Err(Error::NotFound(path.display().to_string()));
    }
    let data = std::fs::read(path)?;
    analyze_bytes(&data, path)
}

/// Analyze already-loaded PE bytes; `path` supplies the reported name.
pub fn analyze_bytes(data: &[u8], path: &Path) -> Result<NativeImage> {
    let pe = PE::parse(data)
        .map_err(|e| Error::InvalidFormat(format!("{}: {e}", path.display())))?;

    let sections = collect_sections(&pe, data);
    let imports = collect_imports(&pe);
    let lowered = data.to_ascii_lowercase();

    let image = NativeImage {
        file_name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        architecture: architecture_name(pe.header.coff_header.machine),
        entry_point: format!("0x{:08X}", pe.entry),
        file_size: data.len(),
        imports: imports.clone(),
        exports: collect_exports(&pe),
        resources: collect_resources(&pe, data),
        strings: extract_strings(data),
        disassembly: entry_disassembly(&pe, data),
        compiler_hints: hints::compiler_hints(&lowered, &sections, &imports),
        packer_hints: hints::packer_hints(&lowered, &sections, &imports),
        sections,
    };
    debug!(
        file = image.file_name.as_str(),
        arch = image.architecture.as_str(),
        sections = image.sections.len(),
        "native analysis complete"
    );
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn architecture_names_cover_common_machines() {
        assert_eq!(architecture_name(0x14c), "x86");
        assert_eq!(architecture_name(0x8664), "x86_64");
        assert_eq!(architecture_name(0xAA64), "arm64");
        assert_eq!(architecture_name(0x1c0), "arm");
        assert_eq!(architecture_name(0x5032), "0x5032");
    }

    #[test]
    fn section_names_are_nul_trimmed() {
        assert_eq!(section_name(b".text\0\0\0"), ".text");
        assert_eq!(section_name(b".gopclnt"), ".gopclnt");
    }

    #[test]
    fn analyze_missing_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.exe");
        assert!(matches!(analyze(&missing), Err(Error::NotFound(_))));
    }

    #[test]
    fn analyze_bytes_rejects_non_pe() {
        let err = analyze_bytes(b"not a pe image at all", Path::new("junk.exe")).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }
}
