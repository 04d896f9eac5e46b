//! Lightweight configuration loader, typed pipeline settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nested keys, e.g. `APP_PIPELINE__ENGINE__NUM_TOPICS=40`).
//! The `[pipeline]` section deserializes into [`PipelineConfig`], which is built
//! once per run and handed to every stage.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Token pattern used by the importer: runs of word characters that may be
/// joined by a single hyphen, apostrophe or comma.
pub const DEFAULT_TOKEN_PATTERN: &str = r"(([^\W])+([-'’,])?)+([^\W])+";

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> { Self::load_in(Path::new(".")) }

    /// Load `config.toml` and its environment overlay from `dir`.
    pub fn load_in(dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Like [`Config::get`], but an absent key yields `T::default()`.
    pub fn get_or_default<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        if self.figment.contains(key) { self.get(key) } else { Ok(T::default()) }
    }

    /// The validated `[pipeline]` section.
    pub fn pipeline(&self) -> anyhow::Result<PipelineConfig> {
        let pipeline: PipelineConfig = self.get_or_default("pipeline")?;
        pipeline.validate()?;
        Ok(pipeline)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub tokens: TokenConfig,
    pub bigrams: BigramConfig,
    pub stemming: bool,
    pub segmentation: SegmentationConfig,
    pub engine: EngineConfig,
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            tokens: TokenConfig::default(),
            bigrams: BigramConfig::default(),
            stemming: false,
            segmentation: SegmentationConfig::default(),
            engine: EngineConfig::default(),
            show_progress: true,
        }
    }
}

impl PipelineConfig {
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            needs_bigram_detection: self.bigrams.enabled,
            needs_stemming: self.stemming,
            is_hierarchical: self.engine.model == ModelKind::Hlda,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.tokens.pattern.is_empty() {
            return Err(Error::InvalidConfig("tokens.pattern must not be empty".into()));
        }
        if self.bigrams.separator.is_whitespace() {
            return Err(Error::InvalidConfig("bigrams.separator must not be whitespace".into()));
        }
        if self.bigrams.infrequency_ratio.is_nan() || self.bigrams.infrequency_ratio <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "bigrams.infrequency_ratio must be positive, got {}",
                self.bigrams.infrequency_ratio
            )));
        }
        if let SegmentationConfig::Lines { delimiter, .. } = &self.segmentation {
            if delimiter.is_empty() {
                return Err(Error::InvalidConfig("segmentation.delimiter must not be empty".into()));
            }
        }
        match self.engine.model {
            ModelKind::Lda if self.engine.num_topics == 0 => {
                Err(Error::InvalidConfig("engine.num_topics must be at least 1".into()))
            }
            ModelKind::Hlda if self.engine.num_levels < 2 => {
                Err(Error::InvalidConfig("engine.num_levels must be at least 2".into()))
            }
            _ => Ok(()),
        }
    }
}

/// The small capability set that selects pipeline behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub needs_bigram_detection: bool,
    pub needs_stemming: bool,
    pub is_hierarchical: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub dataset_dir: String,
    /// Overrides `<dataset_dir>/analyses/<analysis name>`.
    pub working_dir: Option<String>,
    pub mallet_path: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self { dataset_dir: ".".into(), working_dir: None, mallet_path: "mallet".into() }
    }
}

impl PathsConfig {
    pub fn dataset_dir(&self, base: &Path) -> PathBuf { resolve_with_base(base, &self.dataset_dir) }

    pub fn working_dir(&self, base: &Path, analysis_name: &str) -> PathBuf {
        match &self.working_dir {
            Some(dir) => resolve_with_base(base, dir),
            None => self.dataset_dir(base).join("analyses").join(analysis_name),
        }
    }

    /// A bare program name is left for `PATH` lookup; anything with a
    /// separator is resolved like the other paths.
    pub fn mallet_program(&self, base: &Path) -> PathBuf {
        let expanded = expand_path(&self.mallet_path);
        if expanded.components().count() > 1 { resolve_with_base(base, &self.mallet_path) } else { expanded }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    pub pattern: String,
    pub stopwords: Vec<String>,
    pub stopwords_file: Option<String>,
    pub use_default_stopwords: bool,
    pub remove_singletons: bool,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_TOKEN_PATTERN.into(),
            stopwords: Vec::new(),
            stopwords_file: None,
            use_default_stopwords: true,
            remove_singletons: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BigramConfig {
    pub enabled: bool,
    pub doc_count_threshold: usize,
    pub infrequency_ratio: f64,
    pub bigram_limit: usize,
    pub separator: char,
}

impl Default for BigramConfig {
    fn default() -> Self {
        Self { enabled: false, doc_count_threshold: 5, infrequency_ratio: 10.0, bigram_limit: 500, separator: '_' }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum SegmentationConfig {
    /// One subdocument per document.
    #[default]
    Whole,
    Lines {
        #[serde(default = "default_delimiter")]
        delimiter: String,
        #[serde(default = "default_min_chars")]
        min_chars: usize,
    },
}

fn default_delimiter() -> String { "\n".into() }
fn default_min_chars() -> usize { 1000 }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    #[default]
    Lda,
    Hlda,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub model: ModelKind,
    pub num_topics: u32,
    pub num_iterations: u32,
    pub optimize_interval: u32,
    pub num_levels: u32,
    /// Deadline for each engine stage; none means wait indefinitely.
    pub timeout_secs: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { model: ModelKind::Lda, num_topics: 20, num_iterations: 10, optimize_interval: 10, num_levels: 2, timeout_secs: None }
    }
}

impl EngineConfig {
    pub fn analysis_name(&self) -> String {
        match self.model {
            ModelKind::Lda => format!("lda{}topics", self.num_topics),
            ModelKind::Hlda => format!("hlda{}levels", self.num_levels),
        }
    }

    pub fn readable_name(&self) -> String {
        match self.model {
            ModelKind::Lda => format!("LDA with {} Topics", self.num_topics),
            ModelKind::Hlda => format!("HLDA with {} Levels", self.num_levels),
        }
    }

    pub fn description(&self) -> &'static str {
        match self.model {
            ModelKind::Lda => "Mallet LDA topic modeling with hyperparameter optimization.",
            ModelKind::Hlda => "Mallet hierarchical LDA over a fixed-depth topic tree.",
        }
    }
}
