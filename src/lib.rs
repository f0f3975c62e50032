//! Ancalagon — static triage and transformation of compiled binaries.
//!
//! The crate classifies a binary's format, fingerprints obfuscation and
//! protection markers, and, for managed bytecode modules, runs two fixed
//! pipelines of in-place transformations: an anti-anti-analysis pipeline
//! (tamper guards, debugger probes, broken metadata, proxy calls, control
//! flow) followed by a data-deobfuscation pipeline (encoded strings,
//! obfuscated identifiers, compressed resources, folded constants).
//! Native executables and other recognized container formats are analyzed
//! read-only.
//!
//! Parsing and serializing real CIL metadata is delegated to an external
//! [`bytecode::MetadataCodec`] implementation; everything in this crate
//! operates on the mutable [`bytecode::BytecodeModule`] model.

pub mod bytecode;
pub mod engine;
pub mod entropy;
pub mod error;
pub mod formats;
pub mod logging;
pub mod native;
pub mod passes;
pub mod sniff;
pub mod unpack;
pub mod verdict;

pub use engine::{Engine, PipelineReport};
pub use error::{Error, Result};
pub use sniff::{FileFormat, FormatClassification};
