//! Compiler and packer fingerprinting over a parsed native image.
//!
//! All checks are substring probes against a lowercased copy of the
//! image plus the already-extracted section names and imports. They are
//! hints, not proofs; each produces at most one line in the report.

use memchr::memmem;

use crate::entropy::HIGH_ENTROPY_SECTION;

use super::SectionInfo;

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Toolchain markers: runtime import names plus in-image signatures.
pub fn compiler_hints(
    lowered: &[u8],
    sections: &[SectionInfo],
    imports: &[String],
) -> Vec<String> {
    let mut hints = Vec::new();
    let has = |needle: &str| memmem::find(lowered, needle.as_bytes()).is_some();
    let imports_ci = |needle: &str| imports.iter().any(|i| contains_ci(i, needle));

    if imports_ci("msvcrt") || imports_ci("vcruntime") {
        hints.push("MSVC runtime detected".to_string());
    }
    if imports_ci("libgcc") || imports_ci("libstdc++") {
        hints.push("GCC/MinGW runtime detected".to_string());
    }
    if has("go build id") || sections.iter().any(|s| s.name == ".gopclntab") {
        hints.push("Go toolchain detected".to_string());
    }
    if has("rust_eh_personality") {
        hints.push("Rust toolchain detected".to_string());
    }
    if has("readytorun") {
        hints.push(".NET ReadyToRun image detected".to_string());
    }
    if has("nativeaot") {
        hints.push(".NET NativeAOT markers detected".to_string());
    }
    if has("native image") || has(".ni.dll") {
        hints.push(".NET NGen native image detected".to_string());
    }
    if has("delphi") || imports_ci("rtl") {
        hints.push("Delphi runtime detected".to_string());
    }
    hints
}

/// Packer and protector markers, plus the entropy heuristic.
pub fn packer_hints(
    lowered: &[u8],
    sections: &[SectionInfo],
    imports: &[String],
) -> Vec<String> {
    let mut hints = Vec::new();
    let has = |needle: &str| memmem::find(lowered, needle.as_bytes()).is_some();
    let section_names: Vec<String> = sections.iter().map(|s| s.name.to_lowercase()).collect();

    if section_names.iter().any(|n| n.starts_with("upx")) || has("upx!") {
        hints.push("UPX packer detected".to_string());
    }
    if section_names.iter().any(|n| n.contains(".vmp")) || has("vmprotect") {
        hints.push("VMProtect detected".to_string());
    }
    if has("themida") {
        hints.push("Themida detected".to_string());
    }
    if has("obsidium") {
        hints.push("Obsidium detected".to_string());
    }
    if has("pyinstaller") || has("meipass") {
        hints.push("PyInstaller packer detected".to_string());
    }
    if has("electron") || has("asar") {
        hints.push("Electron app detected".to_string());
    }
    if has("autoit") {
        hints.push("AutoIt packaging detected".to_string());
    }
    if sections.iter().any(|s| s.entropy >= HIGH_ENTROPY_SECTION) {
        hints.push("High-entropy sections (possible packing)".to_string());
    }
    let imports_ci = |needle: &str| imports.iter().any(|i| contains_ci(i, needle));
    if imports_ci("virtualalloc") && imports_ci("virtualprotect") {
        hints.push("Runtime unpacking patterns (VirtualAlloc/VirtualProtect)".to_string());
    }
    hints
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(name: &str, entropy: f64) -> SectionInfo {
        SectionInfo {
            name: name.to_string(),
            virtual_size: 0x1000,
            raw_size: 0x1000,
            entropy,
        }
    }

    #[test]
    fn msvc_runtime_from_imports() {
        let hints = compiler_hints(b"", &[], &["VCRUNTIME140.dll!memcpy".to_string()]);
        assert!(hints.contains(&"MSVC runtime detected".to_string()));
    }

    #[test]
    fn go_toolchain_from_section_name() {
        let sections = [section(".gopclntab", 5.0)];
        let hints = compiler_hints(b"", &sections, &[]);
        assert!(hints.contains(&"Go toolchain detected".to_string()));
    }

    #[test]
    fn rust_marker_in_image_bytes() {
        let hints = compiler_hints(b"...rust_eh_personality...", &[], &[]);
        assert!(hints.contains(&"Rust toolchain detected".to_string()));
    }

    #[test]
    fn upx_from_section_prefix() {
        let sections = [section("UPX0", 6.0)];
        let lowered = b"".to_vec();
        let hints = packer_hints(&lowered, &sections, &[]);
        assert!(hints.contains(&"UPX packer detected".to_string()));
    }

    #[test]
    fn high_entropy_sections_flagged() {
        let sections = [section(".text", 7.9)];
        let hints = packer_hints(b"", &sections, &[]);
        assert!(hints.contains(&"High-entropy sections (possible packing)".to_string()));
    }

    #[test]
    fn unpacking_needs_both_virtual_imports() {
        let alloc_only = ["KERNEL32.dll!VirtualAlloc".to_string()];
        assert!(!packer_hints(b"", &[], &alloc_only)
            .iter()
            .any(|h| h.starts_with("Runtime unpacking")));

        let both = [
            "KERNEL32.dll!VirtualAlloc".to_string(),
            "KERNEL32.dll!VirtualProtect".to_string(),
        ];
        assert!(packer_hints(b"", &[], &both)
            .iter()
            .any(|h| h.starts_with("Runtime unpacking")));
    }

    #[test]
    fn clean_image_yields_no_hints() {
        let sections = [section(".text", 6.1), section(".data", 3.2)];
        let imports = ["KERNEL32.dll!ExitProcess".to_string()];
        assert!(compiler_hints(b"plain bytes", &sections, &imports).is_empty());
        assert!(packer_hints(b"plain bytes", &sections, &imports).is_empty());
    }
}
