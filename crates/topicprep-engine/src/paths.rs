//! Every file a run reads or writes, derived once from the configuration.

use std::fs;
use std::path::{Path, PathBuf};

use topicprep_core::{PathContext, PipelineConfig, Result};

use crate::stage::Stage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub analysis_name: String,
    pub working_dir: PathBuf,
    pub corpus_input: PathBuf,
    pub token_offsets: PathBuf,
    pub subdocuments: PathBuf,
    pub vocabulary: PathBuf,
    pub excluded_words: PathBuf,
    pub stopwords: PathBuf,
    pub analysis_info: PathBuf,
    pub imported_data: PathBuf,
    pub output_state_gz: PathBuf,
    pub output_state: PathBuf,
    pub doc_topics: PathBuf,
}

impl RunPaths {
    pub fn new(working_dir: &Path, analysis_name: &str) -> Self {
        let at = |file: &str| working_dir.join(file);
        Self {
            analysis_name: analysis_name.to_string(),
            working_dir: working_dir.to_path_buf(),
            corpus_input: at("corpus_input.txt"),
            token_offsets: at("token_offsets.jsonl"),
            subdocuments: at("subdocuments.json"),
            vocabulary: at("vocabulary.json"),
            excluded_words: at("excluded_words.json"),
            stopwords: at("stopwords.txt"),
            analysis_info: at("analysis.json"),
            imported_data: at("imported_data.mallet"),
            output_state_gz: at(&format!("{analysis_name}.outputstate.gz")),
            output_state: at(&format!("{analysis_name}.outputstate")),
            doc_topics: at(&format!("{analysis_name}.doctopics")),
        }
    }

    /// Working dir defaults to `<dataset_dir>/analyses/<analysis name>`;
    /// relative config paths resolve against `base`.
    pub fn from_config(config: &PipelineConfig, base: &Path) -> Self {
        let name = config.engine.analysis_name();
        Self::new(&config.paths.working_dir(base, &name), &name)
    }

    pub fn marker(&self, stage: Stage) -> PathBuf { self.working_dir.join(format!(".stage-{}.json", stage.as_str())) }

    pub fn prepare_artifacts(&self) -> Vec<PathBuf> {
        vec![
            self.corpus_input.clone(),
            self.token_offsets.clone(),
            self.subdocuments.clone(),
            self.vocabulary.clone(),
            self.excluded_words.clone(),
            self.stopwords.clone(),
        ]
    }

    pub fn ensure_working_dir(&self) -> Result<()> { fs::create_dir_all(&self.working_dir).at(&self.working_dir) }
}
