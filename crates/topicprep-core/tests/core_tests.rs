use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use topicprep_core::config::DEFAULT_TOKEN_PATTERN;
use topicprep_core::{documents_from_texts, Config, Corpus, DirectoryCorpus, Error, ModelKind, PipelineConfig, SegmentationConfig};

fn fixture_dir() -> PathBuf { Path::new(env!("CARGO_MANIFEST_DIR")).join("../../test_data/txt") }

#[test]
fn directory_corpus_lists_txt_files_in_sorted_order() {
    let corpus = DirectoryCorpus::open(&fixture_dir()).expect("open fixtures");
    assert_eq!(corpus.len(), 4);

    let docs: Vec<_> = corpus.documents().collect::<Result<_, _>>().expect("read");
    let names: Vec<&str> = docs.iter().map(|d| d.name()).collect();
    assert_eq!(names, ["cats", "dogs", "new_york", "readme"]);
    for (i, doc) in docs.iter().enumerate() {
        assert_eq!(doc.index(), i, "indices follow iteration order");
    }
    assert_eq!(docs[0].metadata()["category"], "animals");
    assert_eq!(docs[3].metadata()["category"], "misc");
}

#[test]
fn directory_corpus_is_reiterable_and_skips_other_extensions() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("b.txt"), "bravo").unwrap();
    fs::write(tmp.path().join("a.txt"), "alpha").unwrap();
    fs::write(tmp.path().join("notes.md"), "ignored").unwrap();

    let corpus = DirectoryCorpus::open(tmp.path()).unwrap();
    let first: Vec<String> = corpus.documents().map(|d| d.unwrap().content().to_string()).collect();
    let second: Vec<String> = corpus.documents().map(|d| d.unwrap().content().to_string()).collect();
    assert_eq!(first, ["alpha", "bravo"]);
    assert_eq!(first, second);
}

#[test]
fn directory_corpus_reads_invalid_utf8_lossily() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("bad.txt"), [b'o', b'k', 0xff, b'!']).unwrap();

    let corpus = DirectoryCorpus::open(tmp.path()).unwrap();
    let doc = corpus.documents().next().unwrap().unwrap();
    assert!(doc.content().starts_with("ok"));
    assert!(doc.content().ends_with('!'));
}

#[test]
fn directory_corpus_limited_and_missing_root() {
    let corpus = DirectoryCorpus::open_limited(&fixture_dir(), 2).unwrap();
    assert_eq!(corpus.len(), 2);

    let tmp = TempDir::new().unwrap();
    let err = DirectoryCorpus::open(&tmp.path().join("nope")).unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
}

#[test]
fn directory_corpus_can_exclude_analysis_output() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("analyses/lda20topics")).unwrap();
    fs::write(tmp.path().join("doc.txt"), "text").unwrap();
    fs::write(tmp.path().join("analyses/lda20topics/corpus_input.txt"), "0 all 0").unwrap();

    let corpus = DirectoryCorpus::open(tmp.path()).unwrap();
    assert_eq!(corpus.len(), 2);
    let corpus = corpus.exclude(&tmp.path().join("analyses"));
    assert_eq!(corpus.files(), [tmp.path().join("doc.txt")]);
}

#[test]
fn in_memory_corpus_assigns_dense_indices() {
    let docs = documents_from_texts(["one", "", "three"]);
    assert_eq!(Corpus::len(&docs), 3);
    assert_eq!(docs[1].index(), 1);
    assert_eq!(docs[1].content(), "");
}

#[test]
fn pipeline_config_defaults_when_section_missing() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[other]\nvalue = 1\n").unwrap();

    let config = Config::load_in(tmp.path()).unwrap();
    let pipeline = config.pipeline().unwrap();
    assert_eq!(pipeline.tokens.pattern, DEFAULT_TOKEN_PATTERN);
    assert_eq!(pipeline.bigrams.doc_count_threshold, 5);
    assert_eq!(pipeline.bigrams.bigram_limit, 500);
    assert_eq!(pipeline.segmentation, SegmentationConfig::Whole);
    assert_eq!(pipeline.engine.analysis_name(), "lda20topics");
}

#[test]
fn pipeline_config_reads_nested_sections() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("config.toml"),
        r#"
[pipeline]
stemming = true
show_progress = false

[pipeline.bigrams]
enabled = true
infrequency_ratio = 12.0
separator = "+"

[pipeline.segmentation]
strategy = "lines"
min_chars = 40

[pipeline.engine]
model = "hlda"
num_levels = 3
"#,
    )
    .unwrap();

    let pipeline = Config::load_in(tmp.path()).unwrap().pipeline().unwrap();
    let caps = pipeline.capabilities();
    assert!(caps.needs_bigram_detection && caps.needs_stemming && caps.is_hierarchical);
    assert_eq!(pipeline.bigrams.separator, '+');
    assert_eq!(pipeline.segmentation, SegmentationConfig::Lines { delimiter: "\n".into(), min_chars: 40 });
    assert_eq!(pipeline.engine.model, ModelKind::Hlda);
    assert_eq!(pipeline.engine.analysis_name(), "hlda3levels");
    assert_eq!(pipeline.engine.readable_name(), "HLDA with 3 Levels");
}

#[test]
fn validate_rejects_bad_values() {
    let mut pipeline = PipelineConfig::default();
    pipeline.bigrams.separator = ' ';
    assert!(matches!(pipeline.validate(), Err(Error::InvalidConfig(_))));

    let mut pipeline = PipelineConfig::default();
    pipeline.engine.model = ModelKind::Hlda;
    pipeline.engine.num_levels = 1;
    assert!(matches!(pipeline.validate(), Err(Error::InvalidConfig(_))));

    let mut pipeline = PipelineConfig::default();
    pipeline.bigrams.infrequency_ratio = 0.0;
    assert!(pipeline.validate().is_err());
}

#[test]
fn working_dir_defaults_under_dataset_analyses() {
    let pipeline = PipelineConfig::default();
    let base = Path::new("/data/run");
    assert_eq!(pipeline.paths.working_dir(base, "lda20topics"), PathBuf::from("/data/run/analyses/lda20topics"));

    let mut paths = pipeline.paths.clone();
    paths.working_dir = Some("/tmp/out".into());
    assert_eq!(paths.working_dir(base, "lda20topics"), PathBuf::from("/tmp/out"));
    assert_eq!(paths.mallet_program(base), PathBuf::from("mallet"));
    paths.mallet_path = "bin/mallet".into();
    assert_eq!(paths.mallet_program(base), PathBuf::from("/data/run/bin/mallet"));
}
