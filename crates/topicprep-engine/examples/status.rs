use std::env;
use std::path::Path;

use topicprep_core::Config;
use topicprep_engine::stage::read_marker;
use topicprep_engine::{is_complete, is_current, Pipeline, RunPaths, Stage};

// Show which stages of the configured analysis are complete.
// Usage:
//   cargo run -p topicprep-engine --example status -- [working_dir]
// Without an argument the working directory is derived from config.toml at the workspace root.

fn main() -> anyhow::Result<()> {
    let ws_root = Path::new(env!("CARGO_MANIFEST_DIR")).ancestors().nth(2).unwrap_or(Path::new("."));
    let settings = Config::load_in(ws_root)?.pipeline()?;
    let pipeline = Pipeline::new(settings, ws_root)?;
    let mut paths = pipeline.paths().clone();
    if let Some(dir) = env::args().nth(1) {
        paths = RunPaths::new(Path::new(&dir), &paths.analysis_name);
    }
    let text_settings = pipeline.prepare_settings()?;

    println!("{}\n{}", pipeline.info().readable_name, "=".repeat(24));
    println!("Working dir: {}", paths.working_dir.display());
    for stage in Stage::ALL {
        let done = match stage {
            Stage::Prepare => is_current(&paths, stage, Some(&text_settings)),
            _ => is_complete(&paths, stage),
        };
        let state = match read_marker(&paths, stage) {
            Some(marker) if done => format!("complete ({})", marker.completed_at),
            Some(_) => "stale".to_string(),
            None => "pending".to_string(),
        };
        println!("  {:<10} {}", stage.as_str(), state);
    }
    Ok(())
}
