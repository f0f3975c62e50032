//! Pipeline orchestration over managed modules.
//!
//! An [`Engine`] owns the two pass pipelines and runs them in order:
//! anti-anti-analysis first, so data recovery operates on a module with
//! its defenses already stripped. File-level entry points read and write
//! through a caller-supplied [`MetadataCodec`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, info_span};

use crate::bytecode::{BytecodeModule, MetadataCodec};
use crate::error::{Error, Result};
use crate::passes::{anti_anti_passes, deobfuscation_passes, run_pipeline, Pass, PassResult};

/// Results of a full engine run, one entry per pass in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub anti_anti: Vec<PassResult>,
    pub deobfuscation: Vec<PassResult>,
}

impl PipelineReport {
    /// Total changes across both pipelines.
    pub fn total_changes(&self) -> usize {
        self.anti_anti
            .iter()
            .chain(&self.deobfuscation)
            .map(|r| r.changes)
            .sum()
    }
}

/// The two fixed pipelines, boxed so callers can inspect or rebuild them.
pub struct Engine {
    anti_anti: Vec<Box<dyn Pass>>,
    deobfuscators: Vec<Box<dyn Pass>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            anti_anti: anti_anti_passes(),
            deobfuscators: deobfuscation_passes(),
        }
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run only the anti-anti-analysis pipeline.
    pub fn run_anti_anti(&self, module: &mut BytecodeModule) -> Vec<PassResult> {
        let span = info_span!("anti_anti", module = module.name.as_str());
        let _guard = span.enter();
        run_pipeline(module, &self.anti_anti)
    }

    /// Run only the data-deobfuscation pipeline.
    pub fn run_deobfuscators(&self, module: &mut BytecodeModule) -> Vec<PassResult> {
        let span = info_span!("deobfuscation", module = module.name.as_str());
        let _guard = span.enter();
        run_pipeline(module, &self.deobfuscators)
    }

    /// Run both pipelines in their fixed order.
    pub fn run(&self, module: &mut BytecodeModule) -> PipelineReport {
        let report = PipelineReport {
            anti_anti: self.run_anti_anti(module),
            deobfuscation: self.run_deobfuscators(module),
        };
        info!(
            module = module.name.as_str(),
            changes = report.total_changes(),
            "pipelines complete"
        );
        report
    }

    /// Parse, transform, and re-serialize a managed image.
    pub fn rewrite(
        &self,
        codec: &dyn MetadataCodec,
        data: &[u8],
    ) -> Result<(Vec<u8>, PipelineReport)> {
        let mut module = codec.read(data)?;
        let report = self.run(&mut module);
        let rewritten = codec.write(&module)?;
        Ok((rewritten, report))
    }

    /// File-level [`rewrite`](Self::rewrite).
    pub fn rewrite_file(
        &self,
        codec: &dyn MetadataCodec,
        input: &Path,
        output: &Path,
    ) -> Result<PipelineReport> {
        if !input.exists() {
            return Err(Error::NotFound(input.display().to_string()));
        }
        let data = std::fs::read(input)?;
        let (rewritten, report) = self.rewrite(codec, &data)?;
        std::fs::write(output, rewritten)?;
        Ok(report)
    }
}
