//! The single entry point: prepare a corpus, run an engine over it and hand
//! back a lazy stream of token assignments.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use topicprep_core::config::{BigramConfig, TokenConfig};
use topicprep_core::{
    resolve_with_base, Capabilities, Corpus, EmptyCorpus, EngineConfig, PathContext, PipelineConfig, Result,
    SegmentationConfig, TokenTopicAssignment,
};
use topicprep_text::{strategy_for, Analyzer, Vocabulary};

use crate::engine::TopicEngine;
use crate::hierarchy::TopicHierarchy;
use crate::paths::RunPaths;
use crate::reader::{AssignmentReader, ReassemblyTables};
use crate::stage::{digest_file, invalidate_after, run_stage_with_settings, settings_digest, Stage, StageOutcome};
use crate::state::{StateLayout, StateReader};
use crate::writer::{CorpusWriter, PreparedCorpus};

/// Written to `analysis.json` so a working directory describes itself.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisInfo<'a> {
    pub name: String,
    pub readable_name: String,
    pub description: &'static str,
    pub capabilities: Capabilities,
    pub params: &'a EngineConfig,
}

/// Every setting that shapes the prepared corpus. A prepared working
/// directory is reused only under identical settings.
#[derive(Debug, Serialize)]
struct PrepareSettings<'a> {
    tokens: &'a TokenConfig,
    /// blake3 of the stop-words file contents.
    stopwords_file: Option<String>,
    bigrams: &'a BigramConfig,
    stemming: bool,
    segmentation: &'a SegmentationConfig,
}

pub struct Pipeline {
    config: PipelineConfig,
    base: PathBuf,
    paths: RunPaths,
}

impl Pipeline {
    /// Relative paths in `config` resolve against `base`.
    pub fn new(config: PipelineConfig, base: &Path) -> Result<Self> {
        config.validate()?;
        let paths = RunPaths::from_config(&config, base);
        Ok(Self { config, base: base.to_path_buf(), paths })
    }

    pub fn config(&self) -> &PipelineConfig { &self.config }

    pub fn paths(&self) -> &RunPaths { &self.paths }

    pub fn info(&self) -> AnalysisInfo<'_> {
        let engine = &self.config.engine;
        AnalysisInfo {
            name: engine.analysis_name(),
            readable_name: engine.readable_name(),
            description: engine.description(),
            capabilities: self.config.capabilities(),
            params: engine,
        }
    }

    /// Digest of the text settings recorded with the prepare stage.
    pub fn prepare_settings(&self) -> Result<String> {
        let config = &self.config;
        let stopwords_file = match &config.tokens.stopwords_file {
            Some(file) => {
                let path = resolve_with_base(&self.base, file);
                Some(digest_file(&path, &self.base)?.blake3)
            }
            None => None,
        };
        settings_digest(&PrepareSettings {
            tokens: &config.tokens,
            stopwords_file,
            bigrams: &config.bigrams,
            stemming: config.stemming,
            segmentation: &config.segmentation,
        })
    }

    /// Encode the corpus into the working directory. An earlier run is
    /// reused when its artifacts are intact and were written under the same
    /// text settings.
    pub fn prepare<C>(&self, corpus: &C) -> Result<PreparedCorpus>
    where
        C: Corpus + ?Sized,
    {
        let paths = &self.paths;
        paths.ensure_working_dir()?;
        info!(working_dir = %paths.working_dir.display(), documents = corpus.len(), "preparing corpus");

        let settings = self.prepare_settings()?;
        let mut prepared = None;
        let outcome = run_stage_with_settings(paths, Stage::Prepare, Some(&settings), &paths.prepare_artifacts(), || {
            let analyzer = Analyzer::build(&self.config, &self.base, corpus)?;
            let strategy = strategy_for(&self.config.segmentation);
            let writer = CorpusWriter::new(paths, strategy.as_ref()).show_progress(self.config.show_progress);
            prepared = Some(writer.write(corpus, &analyzer)?);
            Ok(())
        })?;
        if outcome == StageOutcome::Completed {
            invalidate_after(paths, Stage::Prepare);
        }
        match prepared {
            Some(prepared) => Ok(prepared),
            None => PreparedCorpus::load(paths),
        }
    }

    /// Prepare, run `engine` and open the assignment stream. An empty corpus
    /// is not an error here: the run comes back with its `empty` note set and
    /// the engine is never started.
    pub fn run<C, E>(&self, corpus: &C, engine: &E) -> Result<AnalysisRun>
    where
        C: Corpus + ?Sized,
        E: TopicEngine + ?Sized,
    {
        let prepared = self.prepare(corpus)?;
        let json = serde_json::to_vec_pretty(&self.info()).at(&self.paths.analysis_info)?;
        fs::write(&self.paths.analysis_info, json).at(&self.paths.analysis_info)?;

        let tables = ReassemblyTables::load(&self.paths)?;
        let vocabulary = Arc::clone(&tables.vocabulary);
        if let Some(empty) = prepared.empty {
            warn!(condition = %empty, "nothing to model, engine not started");
            return Ok(AnalysisRun { prepared, paths: self.paths.clone(), vocabulary, reader: None });
        }

        info!(engine = engine.name(), analysis = %self.paths.analysis_name, "running topic engine");
        let state_file = engine.run(&self.paths, &self.config.engine)?;
        let layout = if self.config.capabilities().is_hierarchical { StateLayout::Hierarchical } else { StateLayout::Flat };
        let records = StateReader::new(BufReader::new(File::open(&state_file).at(&state_file)?), layout, &state_file);
        let offsets = BufReader::new(File::open(&self.paths.token_offsets).at(&self.paths.token_offsets)?);
        let reader = AssignmentReader::new(records, offsets, &self.paths.token_offsets, tables);

        Ok(AnalysisRun { prepared, paths: self.paths.clone(), vocabulary, reader: Some(reader) })
    }
}

type FileReader = AssignmentReader<BufReader<File>, BufReader<File>>;

/// The result of one pipeline run. Assignments can be consumed once.
pub struct AnalysisRun {
    pub prepared: PreparedCorpus,
    pub paths: RunPaths,
    vocabulary: Arc<Vocabulary>,
    reader: Option<FileReader>,
}

impl AnalysisRun {
    pub fn empty(&self) -> Option<EmptyCorpus> { self.prepared.empty }

    pub fn vocabulary(&self) -> &Vocabulary { &self.vocabulary }

    /// Assignments in engine output order. Stops at the first error.
    pub fn assignments(&mut self) -> impl Iterator<Item = Result<TokenTopicAssignment>> + '_ {
        self.reader.as_mut().into_iter().flatten()
    }

    /// Parent→child edges for hierarchical models, complete once the
    /// assignments have been drained.
    pub fn hierarchy(&self) -> Option<&TopicHierarchy> { self.reader.as_ref().and_then(AssignmentReader::hierarchy) }
}
