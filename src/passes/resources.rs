//! Compressed-resource expansion.
//!
//! Resources whose payload starts with the gzip magic are inflated in
//! place; the resource keeps its name. A payload that carries the magic
//! but fails to inflate is left untouched rather than corrupted.

use std::io::Read;

use flate2::read::GzDecoder;

use super::{Pass, PassResult};
use crate::bytecode::BytecodeModule;

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

pub struct ResourceDecryptor;

impl Pass for ResourceDecryptor {
    fn name(&self) -> &'static str {
        "Resource Decryptor"
    }

    fn apply(&self, module: &mut BytecodeModule) -> PassResult {
        let mut changes = 0;
        for resource in &mut module.resources {
            if !resource.data.starts_with(&GZIP_MAGIC) {
                continue;
            }
            let mut inflated = Vec::new();
            match GzDecoder::new(resource.data.as_slice()).read_to_end(&mut inflated) {
                Ok(_) => {
                    resource.data = inflated;
                    changes += 1;
                }
                Err(_) => continue,
            }
        }

        let note = if changes == 0 {
            "No compressed resources expanded."
        } else {
            "Expanded gzip-compressed resources in place."
        };
        PassResult::new(self.name(), changes, note)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::write::GzEncoder;
    use flate2::Compression;

    use super::*;
    use crate::bytecode::Resource;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn gzip_resources_are_inflated_in_place() {
        let mut module = BytecodeModule::new("sample");
        module.resources.push(Resource {
            name: "config".to_string(),
            data: gzip(b"key=value"),
        });
        module.resources.push(Resource {
            name: "plain".to_string(),
            data: b"untouched".to_vec(),
        });

        let result = ResourceDecryptor.apply(&mut module);
        assert_eq!(result.changes, 1);
        assert_eq!(module.resources[0].name, "config");
        assert_eq!(module.resources[0].data, b"key=value");
        assert_eq!(module.resources[1].data, b"untouched");

        // Inflated data no longer carries the magic.
        assert_eq!(ResourceDecryptor.apply(&mut module).changes, 0);
    }

    #[test]
    fn truncated_gzip_is_left_untouched() {
        let mut truncated = gzip(b"payload bytes that will be cut");
        truncated.truncate(6);
        let mut module = BytecodeModule::new("sample");
        module.resources.push(Resource {
            name: "broken".to_string(),
            data: truncated.clone(),
        });

        assert_eq!(ResourceDecryptor.apply(&mut module).changes, 0);
        assert_eq!(module.resources[0].data, truncated);
    }
}
