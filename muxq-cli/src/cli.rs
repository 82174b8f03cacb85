// muxq-cli/src/cli.rs
//
// Defines the command-line argument structures using clap.

use clap::{ArgAction, Args, Parser, Subcommand};
use muxq_core::OutputFormat;
use std::path::PathBuf;

// --- CLI Argument Definition ---

#[derive(Parser, Debug)]
#[command(
    author,
    version, // Reads from Cargo.toml via "cargo" feature in clap
    about = "muxq: batch remux orchestrator",
    long_about = "Runs batches of stream-copy remux jobs through ffmpeg, with bounded concurrency, progress tracking and timeout escalation."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase console log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Runs a batch of remux jobs
    Run(RunArgs),
    /// Prints the worker command line for every job without running anything
    Plan(PlanArgs),
}

/// Where the jobs come from and how the engine is configured.
#[derive(Args, Debug, Clone, Default)]
pub struct BatchArgs {
    /// JSON manifest describing the batch
    #[arg(short, long, value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    // --- Single job (added after any manifest jobs) ---
    /// Video source of a single job
    #[arg(long, value_name = "FILE")]
    pub video: Option<PathBuf>,

    /// Audio source of a single job
    #[arg(long, value_name = "FILE")]
    pub audio: Option<PathBuf>,

    /// Title of the single job (default: source name plus timestamp)
    #[arg(long, value_name = "TITLE", default_value = "")]
    pub title: String,

    /// Expected duration of the single job in seconds (0 = unknown)
    #[arg(long, value_name = "SECONDS", default_value_t = 0)]
    pub duration: u64,

    /// Output directory (overrides the manifest's)
    #[arg(short, long = "output", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Fill unknown durations with ffprobe
    #[arg(long)]
    pub probe: bool,

    // --- Engine configuration ---
    /// JSON configuration file
    #[arg(long, value_name = "FILE", env = "MUXQ_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the ffmpeg binary (default: next to muxq)
    #[arg(long, value_name = "PATH", env = "MUXQ_WORKER")]
    pub worker: Option<PathBuf>,

    /// Maximum number of workers running at once
    #[arg(long, value_name = "N", env = "MUXQ_MAX_CONCURRENT")]
    pub max_concurrent: Option<usize>,

    /// Seconds before a worker is asked to terminate
    #[arg(long = "timeout", value_name = "SECONDS", env = "MUXQ_TIMEOUT")]
    pub timeout_secs: Option<u64>,

    /// Seconds between the terminate request and the kill
    #[arg(long = "kill-grace", value_name = "SECONDS", env = "MUXQ_KILL_GRACE")]
    pub kill_grace_secs: Option<u64>,

    /// Output container: mp4, mkv, webm or avi
    #[arg(short, long, value_name = "FORMAT", env = "MUXQ_FORMAT")]
    pub format: Option<OutputFormat>,

    /// File that failure records are appended to
    #[arg(long, value_name = "FILE", env = "MUXQ_ERROR_LOG")]
    pub error_log: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    /// Print events as JSON lines on stdout instead of progress bars
    #[arg(long)]
    pub json: bool,

    /// Directory for the run log (default: OUTPUT_DIR/logs)
    #[arg(short, long, value_name = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub batch: BatchArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_single_job() {
        let cli = Cli::parse_from([
            "muxq", "run", "--video", "in.mp4", "--audio", "in.m4a", "--title", "Show",
            "--duration", "90", "-o", "out",
        ]);

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.batch.video, Some(PathBuf::from("in.mp4")));
                assert_eq!(args.batch.audio, Some(PathBuf::from("in.m4a")));
                assert_eq!(args.batch.title, "Show");
                assert_eq!(args.batch.duration, 90);
                assert_eq!(args.batch.output_dir, Some(PathBuf::from("out")));
                assert!(!args.json);
            }
            Commands::Plan(_) => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_parse_engine_overrides() {
        let cli = Cli::parse_from([
            "muxq", "-vv", "plan", "--manifest", "batch.json", "--max-concurrent", "1",
            "--timeout", "60", "--format", "MKV",
        ]);

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Plan(args) => {
                assert_eq!(args.batch.manifest, Some(PathBuf::from("batch.json")));
                assert_eq!(args.batch.max_concurrent, Some(1));
                assert_eq!(args.batch.timeout_secs, Some(60));
                assert_eq!(args.batch.format, Some(OutputFormat::Mkv));
            }
            Commands::Run(_) => panic!("Expected Plan command"),
        }
    }

    #[test]
    fn test_rejects_unknown_format() {
        let result = Cli::try_parse_from(["muxq", "plan", "--format", "mov"]);
        assert!(result.is_err());
    }
}
