//! Magic- and extension-based format classification.
//!
//! A deterministic precedence cascade over the first bytes of a file plus
//! its extension. The sniffer is total: short buffers simply fail each
//! magic check, ambiguous magics are resolved by extension, and anything
//! unrecognized classifies as [`FileFormat::Unknown`]. The only error a
//! caller can see is a missing input path.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Number of leading bytes the magic cascade examines.
pub const SNIFF_PREFIX: usize = 4096;

/// Extensions classified as scripts without examining content.
const SCRIPT_EXTENSIONS: [&str; 10] = [
    "ps1", "psm1", "vbs", "js", "jse", "wsf", "hta", "au3", "bat", "cmd",
];

/// Recognized top-level file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileFormat {
    /// PE image carrying a CLR metadata header.
    Managed,
    NativePe,
    Elf,
    MachO,
    MachOFat,
    Wasm,
    JavaClass,
    Jar,
    Apk,
    Dex,
    Asar,
    Script,
    Unknown,
}

/// Outcome of a sniff: the format tag plus a human-readable description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatClassification {
    pub format: FileFormat,
    pub description: String,
}

impl FormatClassification {
    fn new(format: FileFormat, description: &str) -> Self {
        Self {
            format,
            description: description.to_string(),
        }
    }
}

/// Classify the file at `path`.
///
/// Reads the file and applies [`classify_bytes`] with the lowercased
/// extension. Errors only when the path is missing or unreadable.
pub fn sniff_path(path: &Path) -> Result<FormatClassification> {
    if !path.exists() {
        return Err(Error::NotFound(path.display().to_string()));
    }
    let data = std::fs::read(path)?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let classification = classify_bytes(&data, &ext);
    debug!(
        path = %path.display(),
        format = ?classification.format,
        "sniffed format"
    );
    Ok(classification)
}

/// Classify raw bytes plus a lowercase extension (without the dot).
///
/// Total: never fails, regardless of buffer length or extension. First
/// match in the cascade wins.
pub fn classify_bytes(data: &[u8], ext: &str) -> FormatClassification {
    if SCRIPT_EXTENSIONS.contains(&ext) {
        return FormatClassification::new(FileFormat::Script, "Script file");
    }

    let head = &data[..data.len().min(SNIFF_PREFIX)];

    if head.starts_with(b"MZ") {
        return classify_pe(data);
    }

    if head.starts_with(b"\x7fELF") {
        return FormatClassification::new(FileFormat::Elf, "ELF binary");
    }

    if let Some(magic) = read_u32_be(head, 0) {
        if matches!(magic, 0xFEED_FACE | 0xFEED_FACF | 0xCEFA_EDFE | 0xCFFA_EDFE) {
            return FormatClassification::new(FileFormat::MachO, "Mach-O binary");
        }

        // 0xCAFEBABE is shared between fat Mach-O and Java class files;
        // only the extension can break the tie.
        if matches!(magic, 0xCAFE_BABE | 0xBEBA_FECA) {
            if ext == "class" {
                return FormatClassification::new(FileFormat::JavaClass, "Java class file");
            }
            return FormatClassification::new(FileFormat::MachOFat, "Mach-O fat binary");
        }
    }

    if head.starts_with(b"\0asm") {
        return FormatClassification::new(FileFormat::Wasm, "WebAssembly module");
    }

    if head.starts_with(b"PK") {
        return match ext {
            "apk" => FormatClassification::new(FileFormat::Apk, "Android APK (ZIP container)"),
            "jar" => FormatClassification::new(FileFormat::Jar, "Java JAR (ZIP container)"),
            "asar" => FormatClassification::new(FileFormat::Asar, "Electron ASAR container"),
            _ => FormatClassification::new(FileFormat::Jar, "ZIP container (treated as JAR)"),
        };
    }

    if head.len() >= 8 && head.starts_with(b"dex\n") {
        return FormatClassification::new(FileFormat::Dex, "Android DEX bytecode");
    }

    if ext == "asar" {
        return FormatClassification::new(FileFormat::Asar, "Electron ASAR container");
    }

    FormatClassification::new(FileFormat::Unknown, "Unknown format")
}

/// PE sub-check: DOS header, PE header, then the CLR runtime header.
///
/// Anything starting with `MZ` lands here; a buffer goblin rejects is
/// still reported as a native PE rather than an error.
fn classify_pe(data: &[u8]) -> FormatClassification {
    match goblin::pe::PE::parse(data) {
        Ok(pe) => {
            let managed = pe
                .header
                .optional_header
                .as_ref()
                .and_then(|oh| oh.data_directories.get_clr_runtime_header())
                .map(|dir| dir.virtual_address != 0 && dir.size != 0)
                .unwrap_or(false);
            if managed {
                FormatClassification::new(FileFormat::Managed, ".NET assembly")
            } else {
                FormatClassification::new(FileFormat::NativePe, "Native PE")
            }
        }
        Err(_) => FormatClassification::new(FileFormat::NativePe, "Not a valid PE image"),
    }
}

fn read_u32_be(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn script_extension_wins_over_content() {
        // Content looks like ELF, but the extension is in the script set.
        let c = classify_bytes(b"\x7fELF\x02\x01\x01", "ps1");
        assert_eq!(c.format, FileFormat::Script);
    }

    #[test]
    fn elf_magic() {
        let c = classify_bytes(b"\x7fELF\x02\x01\x01\x00", "bin");
        assert_eq!(c.format, FileFormat::Elf);
    }

    #[test]
    fn mz_routes_through_pe_check_regardless_of_extension() {
        // Junk after MZ: not parseable as PE, still classified as a PE.
        let c = classify_bytes(b"MZ\x00\x01\x02", "class");
        assert_eq!(c.format, FileFormat::NativePe);
    }

    #[test]
    fn macho_thin_magics() {
        for magic in [0xFEED_FACEu32, 0xFEED_FACF, 0xCEFA_EDFE, 0xCFFA_EDFE] {
            let c = classify_bytes(&magic.to_be_bytes(), "");
            assert_eq!(c.format, FileFormat::MachO, "magic {magic:#x}");
        }
    }

    #[test]
    fn cafebabe_collision_resolved_by_extension() {
        let magic = 0xCAFE_BABEu32.to_be_bytes();
        assert_eq!(
            classify_bytes(&magic, "class").format,
            FileFormat::JavaClass
        );
        assert_eq!(classify_bytes(&magic, "").format, FileFormat::MachOFat);
        assert_eq!(
            classify_bytes(&0xBEBA_FECAu32.to_be_bytes(), "bin").format,
            FileFormat::MachOFat
        );
    }

    #[test]
    fn wasm_magic() {
        let c = classify_bytes(b"\0asm\x01\x00\x00\x00", "wasm");
        assert_eq!(c.format, FileFormat::Wasm);
    }

    #[test]
    fn zip_disambiguated_by_extension() {
        let zip = b"PK\x03\x04rest";
        assert_eq!(classify_bytes(zip, "apk").format, FileFormat::Apk);
        assert_eq!(classify_bytes(zip, "jar").format, FileFormat::Jar);
        assert_eq!(classify_bytes(zip, "asar").format, FileFormat::Asar);
        let generic = classify_bytes(zip, "zip");
        assert_eq!(generic.format, FileFormat::Jar);
        assert_eq!(generic.description, "ZIP container (treated as JAR)");
    }

    #[test]
    fn dex_magic_regardless_of_extension() {
        let c = classify_bytes(b"dex\n035\0", "exe2");
        assert_eq!(c.format, FileFormat::Dex);
        // Shorter than 8 bytes never matches.
        let c = classify_bytes(b"dex\n", "dex");
        assert_eq!(c.format, FileFormat::Unknown);
    }

    #[test]
    fn asar_extension_fallback_without_zip_shape() {
        let c = classify_bytes(b"\x04\x00\x00\x00json", "asar");
        assert_eq!(c.format, FileFormat::Asar);
    }

    #[test]
    fn total_over_short_and_empty_buffers() {
        assert_eq!(classify_bytes(&[], "").format, FileFormat::Unknown);
        assert_eq!(classify_bytes(b"P", "").format, FileFormat::Unknown);
        assert_eq!(classify_bytes(b"\x7fEL", "").format, FileFormat::Unknown);
    }

    #[test]
    fn sniff_path_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.exe");
        let err = sniff_path(&missing).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn sniff_path_reads_and_classifies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classes.dex");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"dex\n035\0more bytes").unwrap();
        drop(f);
        let c = sniff_path(&path).unwrap();
        assert_eq!(c.format, FileFormat::Dex);
    }
}
