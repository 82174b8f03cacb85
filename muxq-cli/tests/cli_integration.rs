use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use std::error::Error;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

// Helper function to get the path to the compiled binary
fn muxq_cmd() -> Command {
    Command::cargo_bin("muxq").expect("Failed to find muxq binary")
}

#[test]
fn test_help_lists_subcommands() {
    muxq_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("run"))
        .stdout(contains("plan"));
}

#[test]
fn test_plan_from_manifest() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let manifest = dir.path().join("batch.json");
    fs::write(
        &manifest,
        r#"{
            "output_dir": "out",
            "jobs": [
                { "video": "show.mp4", "audio": "show.m4a", "title": "Show: One", "duration": 120 },
                { "audio": "podcast.m4a", "title": "Podcast" }
            ]
        }"#,
    )?;

    muxq_cmd()
        .args(["plan", "--worker", "/opt/ffmpeg", "--format", "mkv", "--manifest"])
        .arg(&manifest)
        .assert()
        .success()
        .stdout(contains("/opt/ffmpeg -i "))
        .stdout(contains("-c:v copy -c:a copy -f matroska -y "))
        .stdout(contains("Show_ One.mkv"))
        .stdout(contains("Podcast.mkv"));

    Ok(())
}

#[test]
fn test_plan_rejects_unknown_format() {
    muxq_cmd()
        .args(["plan", "--video", "a.mp4", "--format", "mov"])
        .assert()
        .failure();
}

#[test]
fn test_run_without_jobs_fails() {
    muxq_cmd()
        .arg("run")
        .assert()
        .failure()
        .stderr(contains("No jobs given"));
}

#[test]
fn test_run_missing_source_fails_before_submission() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let output = dir.path().join("out");

    muxq_cmd()
        .args(["run", "--video"])
        .arg(dir.path().join("missing.mp4"))
        .arg("--output")
        .arg(&output)
        .arg("--error-log")
        .arg(dir.path().join("errors.log"))
        .assert()
        .failure()
        .stderr(contains("Missing or empty source"))
        .stderr(contains("missing.mp4"));

    assert!(!dir.path().join("errors.log").exists());
    Ok(())
}

#[test]
fn test_run_reports_missing_worker() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let video = dir.path().join("clip.mp4");
    fs::write(&video, b"video")?;
    let error_log = dir.path().join("errors.log");

    muxq_cmd()
        .args(["run", "--title", "Clip", "--video"])
        .arg(&video)
        .arg("--output")
        .arg(dir.path().join("out"))
        .arg("--worker")
        .arg(dir.path().join("no-such-ffmpeg"))
        .arg("--error-log")
        .arg(&error_log)
        .assert()
        .code(1)
        .stderr(contains("Worker binary missing"))
        .stderr(contains("no-such-ffmpeg"));

    assert!(fs::read_to_string(&error_log)?.starts_with("Error: Worker binary not found"));
    Ok(())
}

#[cfg(unix)]
fn write_worker(dir: &Path, body: &str) -> Result<std::path::PathBuf, Box<dyn Error>> {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-ffmpeg.sh");
    // `muxq run` checks the worker with `-version` before submitting
    fs::write(&path, format!("#!/bin/sh\n[ \"$1\" = -version ] && exit 0\n{body}\n"))?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    Ok(path)
}

#[cfg(unix)]
#[test]
fn test_run_success_with_script_worker() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let worker = write_worker(
        dir.path(),
        r#"for last; do :; done
echo "frame=10 time=00:00:05.00 bitrate=1k" >&2
echo remuxed > "$last"
exit 0"#,
    )?;
    let video = dir.path().join("clip.mp4");
    fs::write(&video, b"video")?;
    let output = dir.path().join("out");

    muxq_cmd()
        .args(["run", "--title", "Clip", "--duration", "10", "--video"])
        .arg(&video)
        .arg("--output")
        .arg(&output)
        .env("MUXQ_WORKER", &worker)
        .env("MUXQ_ERROR_LOG", dir.path().join("errors.log"))
        .assert()
        .success()
        .stdout(contains("1 succeeded, 0 failed (1 total)"));

    assert_eq!(fs::read_to_string(output.join("Clip.mp4"))?, "remuxed\n");
    let logs: Vec<_> = fs::read_dir(output.join("logs"))?.collect();
    assert_eq!(logs.len(), 1);
    assert!(!dir.path().join("errors.log").exists());
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_run_json_reports_failure() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let worker = write_worker(dir.path(), "echo 'Invalid data found' >&2\nexit 2")?;
    let audio = dir.path().join("track.m4a");
    fs::write(&audio, b"audio")?;
    let error_log = dir.path().join("errors.log");

    muxq_cmd()
        .args(["run", "--json", "--title", "Track", "--audio"])
        .arg(&audio)
        .arg("--output")
        .arg(dir.path().join("out"))
        .arg("--log-dir")
        .arg(dir.path().join("logs"))
        .arg("--worker")
        .arg(&worker)
        .arg("--error-log")
        .arg(&error_log)
        .assert()
        .code(1)
        .stdout(contains(r#""type":"batch_started""#))
        .stdout(contains(r#""type":"job_finished""#))
        .stdout(contains(r#""type":"batch_finished""#))
        .stdout(contains(r#""failed":1"#))
        .stdout(contains("Summary").not());

    let record = fs::read_to_string(&error_log)?;
    assert!(record.starts_with("Exit code: 2\n"));
    assert!(record.contains("-f mp4 -y "));
    assert!(record.contains("Invalid data found"));
    Ok(())
}
