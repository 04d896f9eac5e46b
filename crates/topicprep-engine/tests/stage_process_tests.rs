use std::fs::{self, File};
use std::io::Write;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::TempDir;

use topicprep_core::{EngineFailure, Error, PathContext};
use topicprep_engine::stage::{invalidate_after, mark_complete, read_marker};
use topicprep_engine::{
    decompress, is_complete, is_current, run_stage, run_stage_with_settings, settings_digest, RunPaths, Stage, StageOutcome,
};

fn run_paths(tmp: &TempDir) -> RunPaths {
    let paths = RunPaths::new(&tmp.path().join("work"), "lda3topics");
    paths.ensure_working_dir().unwrap();
    paths
}

#[test]
fn completed_stage_is_skipped_until_an_artifact_changes() {
    let tmp = TempDir::new().unwrap();
    let paths = run_paths(&tmp);
    let artifacts = vec![paths.corpus_input.clone()];
    let mut runs = 0;

    let mut write_input = || {
        runs += 1;
        fs::write(&paths.corpus_input, "0 all 0 1\n").at(&paths.corpus_input)
    };
    assert_eq!(run_stage(&paths, Stage::Prepare, &artifacts, &mut write_input).unwrap(), StageOutcome::Completed);
    assert!(is_complete(&paths, Stage::Prepare));
    assert_eq!(run_stage(&paths, Stage::Prepare, &artifacts, &mut write_input).unwrap(), StageOutcome::Skipped);

    let marker = read_marker(&paths, Stage::Prepare).expect("marker written");
    assert_eq!(marker.artifacts.len(), 1);
    assert_eq!(marker.artifacts[0].file, "corpus_input.txt");
    assert_eq!(marker.artifacts[0].bytes, 10);

    fs::write(&paths.corpus_input, "tampered").unwrap();
    assert!(!is_complete(&paths, Stage::Prepare));
    assert_eq!(run_stage(&paths, Stage::Prepare, &artifacts, &mut write_input).unwrap(), StageOutcome::Completed);
    drop(write_input);
    assert_eq!(runs, 2);
}

#[test]
fn stage_written_under_other_settings_runs_again() {
    let tmp = TempDir::new().unwrap();
    let paths = run_paths(&tmp);
    let artifacts = vec![paths.corpus_input.clone()];
    let plain = settings_digest(&serde_json::json!({ "stemming": false })).unwrap();
    let stemmed = settings_digest(&serde_json::json!({ "stemming": true })).unwrap();
    assert_ne!(plain, stemmed);

    let input = paths.corpus_input.clone();
    let run = |settings: &str, text: &'static str| {
        run_stage_with_settings(&paths, Stage::Prepare, Some(settings), &artifacts, || fs::write(&input, text).at(&input))
    };

    assert_eq!(run(&plain, "0 all 0\n").unwrap(), StageOutcome::Completed);
    assert_eq!(run(&plain, "0 all 0\n").unwrap(), StageOutcome::Skipped);
    assert!(is_current(&paths, Stage::Prepare, Some(&plain)));
    assert!(!is_current(&paths, Stage::Prepare, Some(&stemmed)));
    assert!(!is_current(&paths, Stage::Prepare, None));

    assert_eq!(run(&stemmed, "0 all 1\n").unwrap(), StageOutcome::Completed);
    assert_eq!(fs::read_to_string(&paths.corpus_input).unwrap(), "0 all 1\n");
    assert_eq!(read_marker(&paths, Stage::Prepare).unwrap().settings, Some(stemmed));
    assert!(is_complete(&paths, Stage::Prepare));
}

#[test]
fn failing_stage_leaves_nothing_behind() {
    let tmp = TempDir::new().unwrap();
    let paths = run_paths(&tmp);
    let artifacts = paths.prepare_artifacts();

    let err = run_stage(&paths, Stage::Prepare, &artifacts, || {
        fs::write(&paths.corpus_input, "0 all 0").at(&paths.corpus_input)?;
        Err(Error::InvalidConfig("interrupted".into()))
    })
    .unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
    assert!(!paths.corpus_input.exists());
    assert!(!paths.marker(Stage::Prepare).exists());
}

#[test]
fn stage_without_its_artifacts_fails_with_missing_output() {
    let tmp = TempDir::new().unwrap();
    let paths = run_paths(&tmp);

    let err = run_stage(&paths, Stage::Import, &[paths.imported_data.clone()], || Ok(())).unwrap_err();
    match err {
        Error::Engine(EngineFailure::MissingOutput { stage, path }) => {
            assert_eq!(stage, "import");
            assert_eq!(path, paths.imported_data);
        }
        other => panic!("expected missing output, got {other}"),
    }
    assert!(!is_complete(&paths, Stage::Import));
}

#[test]
fn upstream_completion_invalidates_later_stages() {
    let tmp = TempDir::new().unwrap();
    let paths = run_paths(&tmp);
    fs::write(&paths.imported_data, "imported").unwrap();
    mark_complete(&paths, Stage::Import, &[paths.imported_data.clone()]).unwrap();
    mark_complete(&paths, Stage::Train, &[]).unwrap();
    assert!(is_complete(&paths, Stage::Import) && is_complete(&paths, Stage::Train));

    invalidate_after(&paths, Stage::Import);
    assert!(is_complete(&paths, Stage::Import));
    assert!(!is_complete(&paths, Stage::Train));
    assert!(paths.imported_data.exists(), "only markers are dropped");
}

#[test]
fn gzipped_state_is_inflated() {
    let tmp = TempDir::new().unwrap();
    let gz = tmp.path().join("lda3topics.outputstate.gz");
    let plain = tmp.path().join("lda3topics.outputstate");
    let state = "#doc source pos typeindex type topic\n0 0 0 0 0 2\n";

    let mut encoder = GzEncoder::new(File::create(&gz).unwrap(), Compression::default());
    encoder.write_all(state.as_bytes()).unwrap();
    encoder.finish().unwrap();

    decompress(&gz, &plain).unwrap();
    assert_eq!(fs::read_to_string(&plain).unwrap(), state);
}

#[cfg(unix)]
mod process {
    use super::*;
    use topicprep_engine::{run_command, run_command_blocking, EngineCommand};

    fn sh(stage: &str, script: String) -> EngineCommand { EngineCommand::new("sh", stage).arg("-c").arg(script) }

    #[tokio::test]
    async fn successful_command_reports_exit_code() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("imported_data.mallet");
        let cmd = sh("import-file", format!("echo progress; echo done > '{}'", out.display())).output(&out);

        let report = run_command(&cmd).await.unwrap();
        assert_eq!(report.exit_code, Some(0));
        assert!(report.stderr_tail.is_empty());
        assert!(out.exists());
    }

    #[tokio::test]
    async fn failing_command_removes_outputs_and_keeps_stderr_tail() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("partial.gz");
        let script = format!("echo half > '{}'; echo first >&2; echo boom >&2; exit 3", out.display());
        let cmd = sh("train-topics", script).output(&out);

        match run_command(&cmd).await.unwrap_err() {
            Error::Engine(EngineFailure::NonZeroExit { stage, status, stderr_tail, .. }) => {
                assert_eq!(stage, "train-topics");
                assert!(status.contains('3'), "{status}");
                assert_eq!(stderr_tail, "first\nboom");
            }
            other => panic!("expected non-zero exit, got {other}"),
        }
        assert!(!out.exists(), "partial output must be removed");
    }

    #[tokio::test]
    async fn command_past_its_deadline_is_killed_and_cleaned_up() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("slow.state");
        let cmd = sh("hlda", format!("echo half > '{}'; exec sleep 30", out.display()))
            .output(&out)
            .timeout(Some(Duration::from_millis(300)));

        let err = run_command(&cmd).await.unwrap_err();
        assert!(matches!(err, Error::Engine(EngineFailure::Timeout { .. })), "{err}");
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn missing_output_and_missing_program_are_engine_failures() {
        let tmp = TempDir::new().unwrap();
        let cmd = sh("import-file", "true".to_string()).output(tmp.path().join("never.mallet"));
        assert!(matches!(
            run_command(&cmd).await,
            Err(Error::Engine(EngineFailure::MissingOutput { .. }))
        ));

        let cmd = EngineCommand::new(tmp.path().join("no-such-mallet"), "import-file");
        assert!(matches!(run_command(&cmd).await, Err(Error::Engine(EngineFailure::Spawn { .. }))));
    }

    #[test]
    fn blocking_wrapper_runs_outside_a_runtime() {
        let report = run_command_blocking(&sh("import-file", "echo warn >&2".to_string())).unwrap();
        assert_eq!(report.exit_code, Some(0));
        assert_eq!(report.stderr_tail, ["warn"]);
    }
}
