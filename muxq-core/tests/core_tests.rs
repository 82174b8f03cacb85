use muxq_core::external::{OutputFormat, build_invocation, sanitize_title};
use muxq_core::*;
use std::path::Path;

#[test]
fn test_progress_reading_is_not_failure() {
    // A chunk without a marker leaves progress alone
    assert_eq!(parse_progress("Stream mapping:", 100), ProgressReading::NoUpdate);
    assert_eq!(parse_progress("time=00:00:50.00", 100), ProgressReading::Percent(50));
}

#[test]
fn test_progress_domain() {
    let mut job = Job::new(JobSpec::new(Some("a.mp4"), None, "a", 10));
    assert_eq!(job.progress(), 0);
    assert!(job.start());
    assert!(job.record_progress(100));
    assert_eq!(job.progress(), 100);
    assert!(job.fail(FailureReason::NonZeroExit(1)));
    assert_eq!(job.progress(), PROGRESS_FAILED);
    assert!(!job.record_progress(10));
    assert_eq!(job.progress(), PROGRESS_FAILED);
}

#[test]
fn test_sanitize_examples() {
    assert_eq!(sanitize_title("What? Why: Now!"), "What_ Why_ Now!");
    assert_eq!(sanitize_title(&sanitize_title("<a|b>")), "_a_b_");
}

#[test]
fn test_invocation_for_each_format() {
    let spec = JobSpec::new(Some("v.mp4"), Some("a.m4a"), "Show", 0);
    for (format, container) in [
        (OutputFormat::Mp4, "mp4"),
        (OutputFormat::Mkv, "matroska"),
        (OutputFormat::Webm, "webm"),
        (OutputFormat::Avi, "avi"),
    ] {
        let invocation = build_invocation(Path::new("ffmpeg"), &spec, Path::new("out"), format);
        let args: Vec<String> = invocation
            .args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let f = args.iter().position(|a| a == "-f").unwrap();
        assert_eq!(args[f + 1], container);
        assert_eq!(args[f + 2], "-y");
        assert_eq!(
            invocation.destination,
            Path::new("out").join(format!("Show.{}", format.extension()))
        );
    }
}

#[test]
fn test_parse_ffmpeg_time() {
    assert_eq!(parse_ffmpeg_time("00:01:05.50"), Some(65));
    assert_eq!(parse_ffmpeg_time("N/A"), None);
}
