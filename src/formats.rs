//! Shallow structural analysis for non-PE formats.
//!
//! One report shape for every format the sniffer recognizes: a metadata
//! key/value table, free-form notes, and (where it applies) sample text
//! or container entry names. Each analyzer reads only its fixed header
//! fields; a buffer shorter than the header produces a note, never an
//! error.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::sniff::{FileFormat, FormatClassification};

/// How many central-directory entry names a ZIP listing includes.
const ZIP_ENTRY_LIMIT: usize = 50;

/// Shallow report for one recognized format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatReport {
    pub format: String,
    pub file_name: String,
    pub file_size: usize,
    pub metadata: Vec<(String, String)>,
    pub notes: Vec<String>,
    pub strings: Vec<String>,
    pub entries: Vec<String>,
}

fn read_u16_at(data: &[u8], offset: usize, big: bool) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    let pair = [bytes[0], bytes[1]];
    Some(if big {
        u16::from_be_bytes(pair)
    } else {
        u16::from_le_bytes(pair)
    })
}

fn read_u32_at(data: &[u8], offset: usize, big: bool) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    let quad = [bytes[0], bytes[1], bytes[2], bytes[3]];
    Some(if big {
        u32::from_be_bytes(quad)
    } else {
        u32::from_le_bytes(quad)
    })
}

fn read_u64_at(data: &[u8], offset: usize, big: bool) -> Option<u64> {
    let bytes = data.get(offset..offset + 8)?;
    let mut octet = [0u8; 8];
    octet.copy_from_slice(bytes);
    Some(if big {
        u64::from_be_bytes(octet)
    } else {
        u64::from_le_bytes(octet)
    })
}

fn meta(report: &mut FormatReport, key: &str, value: impl Into<String>) {
    report.metadata.push((key.to_string(), value.into()));
}

fn analyze_elf(data: &[u8], report: &mut FormatReport) {
    if data.len() < 0x20 {
        report.notes.push("ELF header too small.".to_string());
        return;
    }
    let is_64 = data[4] == 2;
    let big = data[5] == 2;
    meta(report, "Class", if is_64 { "ELF64" } else { "ELF32" });
    meta(report, "Endian", if big { "Big" } else { "Little" });
    meta(report, "OSABI", format!("{}", data[7]));
    if let Some(e_type) = read_u16_at(data, 16, big) {
        meta(report, "Type", format!("{e_type}"));
    }
    if let Some(machine) = read_u16_at(data, 18, big) {
        meta(report, "Machine", format!("{machine}"));
    }
    let entry = if is_64 {
        read_u64_at(data, 24, big)
    } else {
        read_u32_at(data, 24, big).map(u64::from)
    };
    if let Some(entry) = entry {
        meta(report, "Entry", format!("0x{entry:X}"));
    }
    let (phnum_off, shnum_off) = if is_64 { (56, 60) } else { (44, 48) };
    if let Some(phnum) = read_u16_at(data, phnum_off, big) {
        meta(report, "ProgramHeaders", format!("{phnum}"));
    }
    if let Some(shnum) = read_u16_at(data, shnum_off, big) {
        meta(report, "SectionHeaders", format!("{shnum}"));
    }
}

fn analyze_macho(data: &[u8], report: &mut FormatReport) {
    if data.len() < 28 {
        report.notes.push("Mach-O header too small.".to_string());
        return;
    }
    let magic = read_u32_at(data, 0, true).unwrap_or(0);
    let is_64 = matches!(magic, 0xFEED_FACF | 0xCFFA_EDFE);
    let big = matches!(magic, 0xFEED_FACE | 0xFEED_FACF);
    meta(report, "Magic", format!("0x{magic:08X}"));
    meta(report, "Bits", if is_64 { "64" } else { "32" });
    for (key, offset) in [("CPUType", 4), ("CPUSubType", 8), ("FileType", 12), ("Commands", 16)] {
        if let Some(value) = read_u32_at(data, offset, big) {
            meta(report, key, format!("{value}"));
        }
    }
}

fn analyze_macho_fat(data: &[u8], report: &mut FormatReport) {
    if data.len() < 8 {
        report.notes.push("Mach-O fat header too small.".to_string());
        return;
    }
    let magic = read_u32_at(data, 0, true).unwrap_or(0);
    meta(report, "Magic", format!("0x{magic:08X}"));
    let big = magic == 0xCAFE_BABE;
    if let Some(arch_count) = read_u32_at(data, 4, big) {
        meta(report, "Architectures", format!("{arch_count}"));
    }
}

fn analyze_wasm(data: &[u8], report: &mut FormatReport) {
    if let Some(version) = read_u32_at(data, 4, false) {
        meta(report, "Version", format!("{version}"));
    }
}

fn analyze_java_class(data: &[u8], report: &mut FormatReport) {
    if data.len() < 10 {
        report.notes.push("Class file header too small.".to_string());
        return;
    }
    let minor = read_u16_at(data, 4, true).unwrap_or(0);
    let major = read_u16_at(data, 6, true).unwrap_or(0);
    let constant_pool = read_u16_at(data, 8, true).unwrap_or(0);
    meta(report, "Version", format!("{major}.{minor}"));
    meta(report, "ConstantPoolCount", format!("{constant_pool}"));
}

fn analyze_dex(data: &[u8], report: &mut FormatReport) {
    let magic: String = data
        .iter()
        .take(8)
        .map(|&b| if (0x20..=0x7E).contains(&b) { b as char } else { '.' })
        .collect();
    meta(report, "Magic", magic.trim_end_matches('.').to_string());
}

/// End-of-central-directory scan plus a bounded central-directory walk.
fn analyze_zip(data: &[u8], report: &mut FormatReport) {
    // The EOCD record sits in the last ~66 KB (comment can be 64 KB).
    let tail_start = data.len().saturating_sub(66_000);
    let eocd = (tail_start..data.len().saturating_sub(3))
        .rev()
        .find(|&i| data[i..].starts_with(b"PK\x05\x06"));
    let Some(eocd) = eocd else {
        report
            .notes
            .push("No end-of-central-directory record found.".to_string());
        return;
    };

    let total = read_u16_at(data, eocd + 10, false).unwrap_or(0);
    meta(report, "Entries", format!("{total}"));
    let Some(cd_offset) = read_u32_at(data, eocd + 16, false) else {
        return;
    };

    let mut cursor = cd_offset as usize;
    let mut listed = 0usize;
    while listed < total as usize
        && data
            .get(cursor..)
            .is_some_and(|rest| rest.starts_with(b"PK\x01\x02"))
    {
        let Some(name_len) = read_u16_at(data, cursor + 28, false) else {
            break;
        };
        let Some(extra_len) = read_u16_at(data, cursor + 30, false) else {
            break;
        };
        let Some(comment_len) = read_u16_at(data, cursor + 32, false) else {
            break;
        };
        let Some(name) = data.get(cursor + 46..cursor + 46 + name_len as usize) else {
            break;
        };
        if listed < ZIP_ENTRY_LIMIT {
            report
                .entries
                .push(String::from_utf8_lossy(name).into_owned());
        }
        listed += 1;
        cursor += 46 + name_len as usize + extra_len as usize + comment_len as usize;
        if cursor + 4 > data.len() {
            break;
        }
    }
    if total as usize > ZIP_ENTRY_LIMIT {
        report
            .entries
            .push(format!("... {} more", total as usize - ZIP_ENTRY_LIMIT));
    }
}

fn analyze_asar(data: &[u8], report: &mut FormatReport) {
    if data.len() < 8 {
        report.notes.push("ASAR header too small.".to_string());
        return;
    }
    if let Some(header_size) = read_u32_at(data, 0, false) {
        meta(report, "HeaderSize", format!("{header_size}"));
    }
    let sample_end = data.len().min(8 + 32);
    if sample_end > 8 {
        let sample = String::from_utf8_lossy(&data[8..sample_end]);
        meta(report, "HeaderSample", format!("{sample}..."));
    } else {
        report.notes.push("ASAR header truncated.".to_string());
    }
}

fn analyze_script(data: &[u8], report: &mut FormatReport) {
    meta(report, "Encoding", "Text");
    let head = &data[..data.len().min(256)];
    report
        .strings
        .push(String::from_utf8_lossy(head).into_owned());
}

/// Analyze the file at `path` according to an existing classification.
pub fn analyze(path: &Path, classification: &FormatClassification) -> Result<FormatReport> {
    if !path.exists() {
        return Err(Error::NotFound(path.display().to_string()));
    }
    let data = std::fs::read(path)?;
    Ok(analyze_bytes(&data, path, classification))
}

/// Analyze already-loaded bytes; total for every classification.
pub fn analyze_bytes(
    data: &[u8],
    path: &Path,
    classification: &FormatClassification,
) -> FormatReport {
    let mut report = FormatReport {
        format: classification.description.clone(),
        file_name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        file_size: data.len(),
        ..FormatReport::default()
    };

    match classification.format {
        FileFormat::Elf => analyze_elf(data, &mut report),
        FileFormat::MachO => analyze_macho(data, &mut report),
        FileFormat::MachOFat => analyze_macho_fat(data, &mut report),
        FileFormat::Wasm => analyze_wasm(data, &mut report),
        FileFormat::JavaClass => analyze_java_class(data, &mut report),
        FileFormat::Dex => analyze_dex(data, &mut report),
        FileFormat::Jar | FileFormat::Apk => analyze_zip(data, &mut report),
        FileFormat::Asar => analyze_asar(data, &mut report),
        FileFormat::Script => analyze_script(data, &mut report),
        FileFormat::Managed | FileFormat::NativePe | FileFormat::Unknown => {
            meta(&mut report, "Description", classification.description.clone());
        }
    }

    debug!(
        file = report.file_name.as_str(),
        format = report.format.as_str(),
        "format analysis complete"
    );
    report
}
