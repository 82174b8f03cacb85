// ============================================================================
// muxq-core/src/external/command.rs
// ============================================================================
//
// WORKER INVOCATION: Argument Vector Construction
//
// Builds the exact argument vector handed to the worker for one job:
//
//     [-i <video>] [-i <audio>] -c:v copy -c:a copy -f <container> -y <dest>
//
// Streams are copied, never re-encoded. The destination is
// `<output_dir>/<sanitized title>.<extension>`.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::job::JobSpec;

/// Characters that are not allowed in output file names.
const FORBIDDEN_TITLE_CHARS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Mp4,
    Mkv,
    Webm,
    Avi,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Mp4,
        OutputFormat::Mkv,
        OutputFormat::Webm,
        OutputFormat::Avi,
    ];

    /// File extension of the destination file.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Mkv => "mkv",
            OutputFormat::Webm => "webm",
            OutputFormat::Avi => "avi",
        }
    }

    /// Value passed to the worker's `-f` flag.
    #[must_use]
    pub fn container(self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Mkv => "matroska",
            OutputFormat::Webm => "webm",
            OutputFormat::Avi => "avi",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().trim_start_matches('.');
        OutputFormat::ALL
            .into_iter()
            .find(|format| format.extension().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                CoreError::Config(format!(
                    "unsupported output format '{s}' (expected mp4, mkv, webm or avi)"
                ))
            })
    }
}

/// Replaces every character that is invalid in file names with `_`.
///
/// Idempotent: sanitizing an already sanitized title changes nothing.
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| if FORBIDDEN_TITLE_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// A fully resolved worker command for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerInvocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub destination: PathBuf,
}

impl WorkerInvocation {
    /// Number of `-i` inputs in the argument vector.
    #[must_use]
    pub fn input_count(&self) -> usize {
        self.args.iter().filter(|arg| *arg == "-i").count()
    }

    /// Space-joined command line, for logs and diagnostic records.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Builds the invocation for `spec`, writing into `output_dir`.
#[must_use]
pub fn build_invocation(
    program: &Path,
    spec: &JobSpec,
    output_dir: &Path,
    format: OutputFormat,
) -> WorkerInvocation {
    let destination =
        output_dir.join(format!("{}.{}", sanitize_title(&spec.title), format.extension()));

    let mut args: Vec<OsString> = Vec::new();
    for source in spec.sources() {
        args.push("-i".into());
        args.push(source.as_os_str().to_owned());
    }
    args.extend(
        ["-c:v", "copy", "-c:a", "copy", "-f", format.container(), "-y"]
            .into_iter()
            .map(OsString::from),
    );
    args.push(destination.as_os_str().to_owned());

    WorkerInvocation {
        program: program.to_path_buf(),
        args,
        destination,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_of(invocation: &WorkerInvocation) -> Vec<String> {
        invocation
            .args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_sanitize_replaces_forbidden() {
        assert_eq!(sanitize_title(r#"a\b/c:d*e?f"g<h>i|j"#), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_title("Episode 1 - Pilot (2019)"), "Episode 1 - Pilot (2019)");
        assert_eq!(sanitize_title("日本語: タイトル"), "日本語_ タイトル");
    }

    #[test]
    fn test_sanitize_idempotent() {
        for title in ["a:b", "<<>>", "plain", "", "x/y\\z|"] {
            let once = sanitize_title(title);
            assert_eq!(sanitize_title(&once), once);
        }
    }

    #[test]
    fn test_output_format_mapping() {
        assert_eq!(OutputFormat::Mkv.container(), "matroska");
        assert_eq!(OutputFormat::Mkv.extension(), "mkv");
        assert_eq!(OutputFormat::Webm.container(), "webm");
        assert_eq!(OutputFormat::Avi.container(), "avi");
        assert_eq!(OutputFormat::default(), OutputFormat::Mp4);
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("MKV".parse::<OutputFormat>().unwrap(), OutputFormat::Mkv);
        assert_eq!(".webm".parse::<OutputFormat>().unwrap(), OutputFormat::Webm);
        assert!("mov".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_build_invocation_both_sources() {
        let spec = JobSpec::new(Some("/in/v.mp4"), Some("/in/a.m4a"), "Show: Part 1", 60);
        let invocation =
            build_invocation(Path::new("ffmpeg"), &spec, Path::new("/out"), OutputFormat::Mkv);

        assert_eq!(
            args_of(&invocation),
            vec![
                "-i", "/in/v.mp4", "-i", "/in/a.m4a", "-c:v", "copy", "-c:a", "copy", "-f",
                "matroska", "-y", "/out/Show_ Part 1.mkv",
            ]
        );
        assert_eq!(invocation.destination, PathBuf::from("/out/Show_ Part 1.mkv"));
        assert_eq!(invocation.input_count(), 2);
    }

    #[test]
    fn test_build_invocation_audio_only() {
        let spec = JobSpec::new(Some(""), Some("/in/a.m4a"), "Audio", 0);
        let invocation =
            build_invocation(Path::new("ffmpeg"), &spec, Path::new("/out"), OutputFormat::Mp4);

        let args = args_of(&invocation);
        assert_eq!(invocation.input_count(), 1);
        assert_eq!(&args[..2], ["-i", "/in/a.m4a"]);
        assert_eq!(args.last().unwrap(), "/out/Audio.mp4");
    }

    #[test]
    fn test_command_line() {
        let spec = JobSpec::new(Some("v.mp4"), None, "t", 0);
        let invocation =
            build_invocation(Path::new("ffmpeg"), &spec, Path::new("out"), OutputFormat::Mp4);
        assert_eq!(
            invocation.command_line(),
            format!(
                "ffmpeg -i v.mp4 -c:v copy -c:a copy -f mp4 -y {}",
                Path::new("out").join("t.mp4").display()
            )
        );
    }
}
