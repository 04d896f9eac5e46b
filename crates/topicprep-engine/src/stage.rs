//! Stage completion markers.
//!
//! A stage is complete when its `.stage-<name>.json` marker exists and every
//! artifact it lists still has the recorded blake3 digest. Stages whose
//! output depends on settings also record a settings digest, and a marker
//! written under different settings does not count. The marker is
//! written only after all artifacts are in place; a failing stage removes
//! whatever it may have partially written before the error propagates.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use topicprep_core::{EngineFailure, Error, PathContext, Result};

use crate::paths::RunPaths;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Prepare,
    Import,
    Train,
    Decompress,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Prepare, Stage::Import, Stage::Train, Stage::Decompress];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Prepare => "prepare",
            Stage::Import => "import",
            Stage::Train => "train",
            Stage::Decompress => "decompress",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDigest {
    /// Path relative to the working directory.
    pub file: String,
    pub bytes: u64,
    pub blake3: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageMarker {
    pub stage: Stage,
    pub completed_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<String>,
    pub artifacts: Vec<ArtifactDigest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Skipped,
    Completed,
}

pub fn digest_file(path: &Path, relative_to: &Path) -> Result<ArtifactDigest> {
    let mut file = File::open(path).at(path)?;
    let mut hasher = blake3::Hasher::new();
    let bytes = io::copy(&mut file, &mut hasher).at(path)?;
    let file = path.strip_prefix(relative_to).unwrap_or(path).to_string_lossy().into_owned();
    Ok(ArtifactDigest { file, bytes, blake3: hasher.finalize().to_hex().to_string() })
}

/// blake3 digest of the JSON form of `settings`.
pub fn settings_digest<T: Serialize + ?Sized>(settings: &T) -> Result<String> {
    let json = serde_json::to_vec(settings).map_err(|e| Error::InvalidConfig(format!("settings not serializable: {e}")))?;
    Ok(blake3::hash(&json).to_hex().to_string())
}

pub fn read_marker(paths: &RunPaths, stage: Stage) -> Option<StageMarker> {
    let text = fs::read_to_string(paths.marker(stage)).ok()?;
    serde_json::from_str(&text).ok()
}

pub fn is_complete(paths: &RunPaths, stage: Stage) -> bool {
    read_marker(paths, stage).is_some_and(|marker| artifacts_intact(paths, &marker))
}

/// Like [`is_complete`], and the marker was written under `settings`.
pub fn is_current(paths: &RunPaths, stage: Stage, settings: Option<&str>) -> bool {
    let Some(marker) = read_marker(paths, stage) else { return false };
    if marker.settings.as_deref() != settings {
        debug!(stage = stage.as_str(), "settings changed since stage completed");
        return false;
    }
    artifacts_intact(paths, &marker)
}

fn artifacts_intact(paths: &RunPaths, marker: &StageMarker) -> bool {
    let stage = marker.stage;
    marker.artifacts.iter().all(|recorded| {
        let path = paths.working_dir.join(&recorded.file);
        match digest_file(&path, &paths.working_dir) {
            Ok(current) if current == *recorded => true,
            Ok(_) => {
                debug!(stage = stage.as_str(), file = %recorded.file, "artifact changed since stage completed");
                false
            }
            Err(e) => {
                debug!(stage = stage.as_str(), file = %recorded.file, error = %e, "artifact unreadable");
                false
            }
        }
    })
}

pub fn mark_complete(paths: &RunPaths, stage: Stage, artifacts: &[PathBuf]) -> Result<()> {
    write_marker(paths, stage, None, artifacts)
}

fn write_marker(paths: &RunPaths, stage: Stage, settings: Option<&str>, artifacts: &[PathBuf]) -> Result<()> {
    let artifacts = artifacts
        .iter()
        .map(|a| digest_file(a, &paths.working_dir))
        .collect::<Result<Vec<_>>>()?;
    let marker = StageMarker { stage, completed_at: Utc::now().to_rfc3339(), settings: settings.map(str::to_string), artifacts };
    let path = paths.marker(stage);
    let json = serde_json::to_vec_pretty(&marker).at(&path)?;
    fs::write(&path, json).at(&path)
}

/// Delete the stage marker and any of the given artifacts that exist.
pub fn clear(paths: &RunPaths, stage: Stage, artifacts: &[PathBuf]) {
    let marker = paths.marker(stage);
    for path in std::iter::once(&marker).chain(artifacts) {
        match fs::remove_file(path) {
            Ok(()) => debug!(stage = stage.as_str(), path = %path.display(), "removed artifact"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(stage = stage.as_str(), path = %path.display(), error = %e, "could not remove artifact"),
        }
    }
}

/// Drop the markers of every stage after `stage`, forcing them to rerun
/// against fresh upstream artifacts.
pub fn invalidate_after(paths: &RunPaths, stage: Stage) {
    for later in Stage::ALL.iter().skip_while(|s| **s != stage).skip(1) {
        clear(paths, *later, &[]);
    }
}

/// Run `work` unless the stage is already complete. On success every
/// artifact must exist; the marker is written last.
pub fn run_stage<F>(paths: &RunPaths, stage: Stage, artifacts: &[PathBuf], work: F) -> Result<StageOutcome>
where
    F: FnOnce() -> Result<()>,
{
    run_stage_with_settings(paths, stage, None, artifacts, work)
}

/// [`run_stage`] for a stage whose output depends on settings; `settings` is
/// a digest from [`settings_digest`].
pub fn run_stage_with_settings<F>(
    paths: &RunPaths,
    stage: Stage,
    settings: Option<&str>,
    artifacts: &[PathBuf],
    work: F,
) -> Result<StageOutcome>
where
    F: FnOnce() -> Result<()>,
{
    if is_current(paths, stage, settings) {
        info!(stage = stage.as_str(), "stage already complete, skipping");
        return Ok(StageOutcome::Skipped);
    }
    clear(paths, stage, artifacts);

    let started = Instant::now();
    if let Err(e) = work() {
        clear(paths, stage, artifacts);
        warn!(stage = stage.as_str(), error = %e, "stage failed, partial artifacts removed");
        return Err(e);
    }
    if let Some(missing) = artifacts.iter().find(|a| !a.exists()) {
        let err = Error::Engine(EngineFailure::MissingOutput { stage: stage.as_str().to_string(), path: missing.clone() });
        clear(paths, stage, artifacts);
        return Err(err);
    }
    write_marker(paths, stage, settings, artifacts)?;
    info!(stage = stage.as_str(), duration_ms = started.elapsed().as_millis() as u64, "stage complete");
    Ok(StageOutcome::Completed)
}
