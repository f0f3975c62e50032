//! Error types for the Ancalagon triage and deobfuscation engine.
//!
//! Structured errors via thiserror. Most structural read failures are
//! handled locally by the analyzers (degrading to zeroed or omitted
//! fields); only the conditions below surface to callers.

use thiserror::Error;

/// Main error type for Ancalagon operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Input path does not exist.
    #[error("File not found: {0}")]
    NotFound(String),

    /// Bytes do not parse as the claimed format. Fatal for the managed
    /// metadata load; the sniffer never raises it and degrades to Unknown.
    #[error("Invalid binary format: {0}")]
    InvalidFormat(String),

    /// A structural read would exceed the buffer.
    #[error("Read of {requested} bytes at offset {offset:#x} exceeds buffer of {available} bytes")]
    Bounds {
        offset: usize,
        requested: usize,
        available: usize,
    },

    /// A single unit (resource, instruction) failed to decode.
    #[error("Decode failure: {0}")]
    Decode(String),

    /// File I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Ancalagon operations.
pub type Result<T> = std::result::Result<T, Error>;
