//! Embedded-payload extraction.
//!
//! Loader stubs for packed managed binaries carry the real module as an
//! embedded resource, conventionally named after the packer. The first
//! resource whose name matches is extracted; gzip payloads are inflated,
//! anything else is returned as-is.

use std::io::Read;

use flate2::read::GzDecoder;
use tracing::debug;

use crate::bytecode::BytecodeModule;

/// Resource-name fragments that mark an embedded payload.
const PAYLOAD_MARKERS: [&str; 2] = ["payload", "confuser"];

/// A payload lifted out of a loader stub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPayload {
    pub resource_name: String,
    pub data: Vec<u8>,
    pub was_compressed: bool,
}

/// Extract the first embedded payload resource, if any.
pub fn extract_embedded_payload(module: &BytecodeModule) -> Option<ExtractedPayload> {
    let resource = module.resources.iter().find(|r| {
        let lowered = r.name.to_lowercase();
        PAYLOAD_MARKERS.iter().any(|m| lowered.contains(m))
    })?;

    let mut inflated = Vec::new();
    let payload = if resource.data.starts_with(&[0x1F, 0x8B])
        && GzDecoder::new(resource.data.as_slice())
            .read_to_end(&mut inflated)
            .is_ok()
    {
        ExtractedPayload {
            resource_name: resource.name.clone(),
            data: inflated,
            was_compressed: true,
        }
    } else {
        ExtractedPayload {
            resource_name: resource.name.clone(),
            data: resource.data.clone(),
            was_compressed: false,
        }
    };
    debug!(
        resource = payload.resource_name.as_str(),
        bytes = payload.data.len(),
        compressed = payload.was_compressed,
        "extracted embedded payload"
    );
    Some(payload)
}
