use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::io::{self, BufWriter, Write};

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use topicprep_core::{Config, DirectoryCorpus};
use topicprep_engine::{MalletEngine, Pipeline, WithTokenIndex};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let mut settings = config.pipeline()?;

    let args: Vec<String> = env::args().skip(1).collect();
    let mut data_dir = None; let mut limit = None; let mut dump = false;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--dump" => dump = true,
            "--limit" => {
                let Some(n) = args.get(i + 1).and_then(|v| v.parse::<usize>().ok()) else {
                    eprintln!("Error: --limit requires a number"); std::process::exit(2);
                };
                limit = Some(n); i += 1;
            }
            s if s.starts_with('-') => { eprintln!("Unknown flag: {}", s); std::process::exit(2); }
            s => data_dir = Some(s.to_string()),
        }
        i += 1;
    }

    let base = env::current_dir().context("cannot read the current directory")?;
    if let Some(dir) = data_dir {
        settings.paths.dataset_dir = dir;
    }
    let dataset_dir = settings.paths.dataset_dir(&base);
    let engine = MalletEngine::from_config(&settings, &base);
    let pipeline = Pipeline::new(settings, &base)?;

    let mut corpus = DirectoryCorpus::open(&dataset_dir)?
        .exclude(&dataset_dir.join("analyses"))
        .exclude(&pipeline.paths().working_dir);
    if let Some(n) = limit {
        corpus = corpus.limited(n);
    }

    let analysis = pipeline.info();
    eprintln!("topicprep: {}\n==========", analysis.readable_name);
    eprintln!("Data directory   : {}", dataset_dir.display());
    eprintln!("Working directory: {}", pipeline.paths().working_dir.display());
    eprintln!("Engine           : {}", engine.program().display());

    let mut run = pipeline.run(&corpus, &engine)?;
    run.prepared.require_tokens().context("nothing to model")?;

    let mut per_topic: BTreeMap<u32, usize> = BTreeMap::new();
    let mut documents = BTreeSet::new();
    let mut tokens = 0usize;
    let mut out = BufWriter::new(io::stdout().lock());
    for item in run.assignments().with_token_index() {
        let item = item?;
        tokens += 1;
        documents.insert(item.assignment.doc_index);
        if let Some(leaf) = item.assignment.leaf_topic() {
            *per_topic.entry(leaf).or_default() += 1;
        }
        if dump {
            serde_json::to_writer(&mut out, &item)?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    info!(tokens, documents = documents.len(), "assignments read");

    eprintln!("\n✅ {} tokens across {} documents", tokens, documents.len());
    eprintln!("📊 Vocabulary: {} surface forms, {} abstractions", run.prepared.surfaces, run.prepared.abstractions);
    let mut ranked: Vec<(u32, usize)> = per_topic.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    for (topic, count) in ranked.iter().take(10) {
        eprintln!("  topic {:>3}: {} tokens", topic, count);
    }
    if let Some(hierarchy) = run.hierarchy() {
        eprintln!("🌳 Topic hierarchy: {} edges", hierarchy.len());
    }
    Ok(())
}
