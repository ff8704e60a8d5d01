//! Sequencing of one packing run.
//!
//! `Init -> ToolReady -> Cleaned -> Compressed -> Renamed -> Sorted -> Hashed
//! -> ScriptGenerated -> Done`; the first failing step aborts the run and is
//! reported with the error. Nothing is retried and partial artifacts are
//! left on disk.

use crate::command::{build_command, CompressorCommand};
use crate::compressor::Compressor;
use crate::digest::{digest_files, DigestAlgorithm};
use crate::error::PackError;
use crate::manifest::PackManifest;
use crate::script::{generate_unpack_kit, ScriptFlavor, UnpackKit};
use crate::template::Template;
use crate::tool::ToolLocator;
use crate::volume::{cleanup_stale, rename_volumes, sort_volumes, CleanupPolicy, VolumeSet};
use std::fmt;
use std::path::PathBuf;
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    ToolReady,
    Cleaned,
    Compressed,
    Renamed,
    Sorted,
    Hashed,
    ScriptGenerated,
    Done,
    Aborted,
}

/// The step that was running when a run aborted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Tool,
    Cleanup,
    Compression,
    Rename,
    Hashing,
    Generation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Tool => "tool",
            Stage::Cleanup => "cleanup",
            Stage::Compression => "compression",
            Stage::Rename => "rename",
            Stage::Hashing => "hashing",
            Stage::Generation => "generation",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed: {error}")]
pub struct StageFailure {
    pub stage: Stage,
    /// Last state reached before the failure.
    pub reached: PipelineState,
    #[source]
    pub error: PackError,
}

/// What to pack and where. Built by the CLI; never modified by the run.
#[derive(Clone, Debug)]
pub struct PackingRequest {
    pub inputs: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub archive_name: String,
    pub volume_size_kb: u64,
}

#[derive(Clone, Debug, Default)]
pub struct PackOptions {
    pub algorithm: DigestAlgorithm,
    pub flavor: Option<ScriptFlavor>,
    pub cleanup: CleanupPolicy,
    /// Custom template file; the flavor's built-in template otherwise.
    pub template: Option<PathBuf>,
    pub write_manifest: bool,
}

#[derive(Clone, Debug)]
pub struct PackReport {
    pub command: CompressorCommand,
    pub deleted: Vec<PathBuf>,
    pub volumes: VolumeSet,
    pub kit: UnpackKit,
    pub manifest: Option<PathBuf>,
}

pub struct Pipeline<C: Compressor> {
    compressor: C,
    locator: ToolLocator,
    options: PackOptions,
}

struct Run {
    state: PipelineState,
}

impl Run {
    fn advance(&mut self, next: PipelineState) {
        info!(from = ?self.state, to = ?next, "pipeline state");
        self.state = next;
    }

    fn fail(&mut self, stage: Stage, error: PackError) -> StageFailure {
        let reached = self.state;
        self.state = PipelineState::Aborted;
        StageFailure { stage, reached, error }
    }
}

impl<C: Compressor> Pipeline<C> {
    pub fn new(compressor: C, locator: ToolLocator, options: PackOptions) -> Self {
        Self { compressor, locator, options }
    }

    pub fn run(&self, req: &PackingRequest) -> Result<PackReport, StageFailure> {
        let mut run = Run { state: PipelineState::Init };
        let base = req.archive_name.as_str();
        let dir = req.output_dir.as_path();

        let tool = self.locator.locate().map_err(|e| run.fail(Stage::Tool, e))?;
        run.advance(PipelineState::ToolReady);

        let deleted =
            cleanup_stale(dir, base, self.options.cleanup).map_err(|e| run.fail(Stage::Cleanup, e))?;
        run.advance(PipelineState::Cleaned);

        let command = build_command(&tool, dir, base, &req.inputs, req.volume_size_kb);
        self.compressor.run(&command).map_err(|e| run.fail(Stage::Compression, e))?;
        run.advance(PipelineState::Compressed);

        let mut paths = rename_volumes(dir, base).map_err(|e| run.fail(Stage::Rename, e))?;
        run.advance(PipelineState::Renamed);

        sort_volumes(&mut paths);
        run.advance(PipelineState::Sorted);

        let digests =
            digest_files(&paths, self.options.algorithm).map_err(|e| run.fail(Stage::Hashing, e))?;
        let volumes = VolumeSet::from_sorted(paths.into_iter().zip(digests));
        run.advance(PipelineState::Hashed);

        let (kit, manifest) = self
            .generate(req, &volumes, &tool)
            .map_err(|e| run.fail(Stage::Generation, e))?;
        run.advance(PipelineState::ScriptGenerated);

        run.advance(PipelineState::Done);
        Ok(PackReport { command, deleted, volumes, kit, manifest })
    }

    fn generate(
        &self,
        req: &PackingRequest,
        volumes: &VolumeSet,
        tool: &std::path::Path,
    ) -> crate::Result<(UnpackKit, Option<PathBuf>)> {
        let flavor = self.options.flavor.unwrap_or_else(ScriptFlavor::native);
        let template = match &self.options.template {
            Some(p) => Template::load(p)?,
            None => flavor.builtin_template(self.options.algorithm)?,
        };
        let kit = generate_unpack_kit(&req.output_dir, volumes, &template, flavor, Some(tool))?;
        let manifest = if self.options.write_manifest {
            let mf = PackManifest::new(
                &req.archive_name,
                self.options.algorithm,
                req.volume_size_kb,
                flavor.file_name(),
                volumes,
            )?;
            Some(mf.write(&req.output_dir)?)
        } else {
            None
        };
        Ok((kit, manifest))
    }
}
