//! Metadata codec seam.
//!
//! Parsing CIL metadata tables and emitting a valid image back are large,
//! independently specified subsystems; this crate treats them as an opaque
//! collaborator behind one trait. A codec must preserve the identity of
//! branch-target and exception-handler references across a read/write
//! round trip, and must normalize encoding variants (short-form loads and
//! branches) into the semantic [`OpCode`](super::OpCode) set on read.

use super::BytecodeModule;
use crate::error::Result;

/// Lossless bytes <-> [`BytecodeModule`] conversion.
pub trait MetadataCodec {
    /// Parse a managed image. Failure here is fatal for the managed path:
    /// every downstream pass assumes a valid module.
    fn read(&self, data: &[u8]) -> Result<BytecodeModule>;

    /// Serialize the (possibly rewritten) module to a new image.
    fn write(&self, module: &BytecodeModule) -> Result<Vec<u8>>;
}
