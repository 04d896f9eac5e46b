use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use flate2::read::GzDecoder;
use tracing::info;

use topicprep_core::{EngineConfig, ModelKind, PathContext, PipelineConfig, Result};

use crate::paths::RunPaths;
use crate::process::{run_command_blocking, EngineCommand};
use crate::stage::{invalidate_after, run_stage, Stage, StageOutcome};

/// An external topic model run over a prepared working directory.
pub trait TopicEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Run the engine and return the path of the uncompressed sampling-state
    /// file, in the layout matching `params.model`.
    fn run(&self, paths: &RunPaths, params: &EngineConfig) -> Result<PathBuf>;
}

/// MALLET driven through its command-line launcher.
#[derive(Debug, Clone)]
pub struct MalletEngine {
    program: PathBuf,
}

impl MalletEngine {
    /// The corpus input is already reduced to vocabulary ids, so the importer
    /// only has to split on whitespace.
    pub const TOKEN_REGEX: &'static str = r"[\S]+";

    pub fn new(program: impl Into<PathBuf>) -> Self { Self { program: program.into() } }

    pub fn from_config(config: &PipelineConfig, base: &Path) -> Self { Self::new(config.paths.mallet_program(base)) }

    pub fn program(&self) -> &Path { &self.program }

    pub fn import_command(&self, paths: &RunPaths, params: &EngineConfig) -> EngineCommand {
        EngineCommand::new(&self.program, "import-file")
            .arg("import-file")
            .arg("--input")
            .arg(&paths.corpus_input)
            .arg("--output")
            .arg(&paths.imported_data)
            .arg("--token-regex")
            .arg(Self::TOKEN_REGEX)
            .arg("--keep-sequence")
            .arg("--set-source-by-name")
            .output(&paths.imported_data)
            .timeout(deadline(params))
    }

    pub fn train_command(&self, paths: &RunPaths, params: &EngineConfig) -> EngineCommand {
        EngineCommand::new(&self.program, "train-topics")
            .arg("train-topics")
            .arg("--input")
            .arg(&paths.imported_data)
            .arg("--optimize-interval")
            .arg(params.optimize_interval.to_string())
            .arg("--num-iterations")
            .arg(params.num_iterations.to_string())
            .arg("--num-topics")
            .arg(params.num_topics.to_string())
            .arg("--output-state")
            .arg(&paths.output_state_gz)
            .arg("--output-doc-topics")
            .arg(&paths.doc_topics)
            .output(&paths.output_state_gz)
            .output(&paths.doc_topics)
            .timeout(deadline(params))
    }

    pub fn hlda_command(&self, paths: &RunPaths, params: &EngineConfig) -> EngineCommand {
        EngineCommand::new(&self.program, "hlda")
            .arg("hlda")
            .arg("--input")
            .arg(&paths.imported_data)
            .arg("--num-levels")
            .arg(params.num_levels.to_string())
            .arg("--output-state")
            .arg(&paths.output_state)
            .output(&paths.output_state)
            .timeout(deadline(params))
    }
}

fn deadline(params: &EngineConfig) -> Option<Duration> { params.timeout_secs.map(Duration::from_secs) }

impl TopicEngine for MalletEngine {
    fn name(&self) -> &str { "mallet" }

    fn run(&self, paths: &RunPaths, params: &EngineConfig) -> Result<PathBuf> {
        let import = self.import_command(paths, params);
        let imported = run_stage(paths, Stage::Import, &[paths.imported_data.clone()], || {
            run_command_blocking(&import).map(drop)
        })?;
        if imported == StageOutcome::Completed {
            invalidate_after(paths, Stage::Import);
        }

        match params.model {
            ModelKind::Lda => {
                let train = self.train_command(paths, params);
                let trained = run_stage(paths, Stage::Train, &train.outputs, || run_command_blocking(&train).map(drop))?;
                if trained == StageOutcome::Completed {
                    invalidate_after(paths, Stage::Train);
                }
                run_stage(paths, Stage::Decompress, &[paths.output_state.clone()], || {
                    decompress(&paths.output_state_gz, &paths.output_state)
                })?;
            }
            ModelKind::Hlda => {
                let hlda = self.hlda_command(paths, params);
                run_stage(paths, Stage::Train, &hlda.outputs, || run_command_blocking(&hlda).map(drop))?;
            }
        }
        Ok(paths.output_state.clone())
    }
}

/// Inflate a gzipped state file.
pub fn decompress(src: &Path, dest: &Path) -> Result<()> {
    let mut decoder = GzDecoder::new(BufReader::new(File::open(src).at(src)?));
    let mut out = BufWriter::new(File::create(dest).at(dest)?);
    let bytes = io::copy(&mut decoder, &mut out).at(src)?;
    out.flush().at(dest)?;
    info!(src = %src.display(), dest = %dest.display(), bytes, "state decompressed");
    Ok(())
}
