// muxq-cli/src/manifest.rs
//
// Batch manifests and job resolution.
//
// A manifest is a JSON file:
//
//     { "output_dir": "out", "jobs": [ { "video": "a.mp4", "audio": "a.m4a",
//       "title": "Episode 1", "duration": 120 } ] }
//
// Relative paths inside it resolve against the manifest's own directory. A
// single job given by flags is appended after the manifest's jobs.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use muxq_core::{JobSpec, probe_duration};
use serde::{Deserialize, Serialize};

use crate::cli::BatchArgs;
use crate::error::{CliErrorContext, CliResult};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    #[serde(default)]
    pub jobs: Vec<JobSpec>,
}

impl Manifest {
    /// Reads a manifest and anchors its relative paths at the file's directory.
    pub fn load(path: &Path) -> CliResult<Self> {
        let text = fs::read_to_string(path)
            .cli_with_context(|| format!("Failed to read manifest {}", path.display()))?;
        let mut manifest: Manifest = serde_json::from_str(&text)
            .cli_with_context(|| format!("Invalid manifest {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        manifest.output_dir = manifest.output_dir.map(|dir| anchor(base, dir));
        for job in &mut manifest.jobs {
            job.video = job.video.take().map(|p| anchor(base, p));
            job.audio = job.audio.take().map(|p| anchor(base, p));
        }

        debug!("Loaded {} job(s) from {}", manifest.jobs.len(), path.display());
        Ok(manifest)
    }
}

fn anchor(base: &Path, path: PathBuf) -> PathBuf {
    // Empty means "no input" and must stay empty.
    if path.as_os_str().is_empty() || path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// The jobs and output directory a command operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBatch {
    /// May be empty; the engine reports that per job.
    pub output_dir: PathBuf,
    pub jobs: Vec<JobSpec>,
}

/// Collects the batch from the manifest and the single-job flags.
///
/// Durations are left as given; `fill_durations` probes the unknown ones.
pub fn resolve_batch(args: &BatchArgs) -> CliResult<ResolvedBatch> {
    let manifest = match &args.manifest {
        Some(path) => Manifest::load(path)?,
        None => Manifest::default(),
    };

    let mut jobs = manifest.jobs;
    if args.video.is_some() || args.audio.is_some() {
        jobs.push(JobSpec::new(
            args.video.clone(),
            args.audio.clone(),
            args.title.clone(),
            args.duration,
        ));
    }
    if jobs.is_empty() {
        return Err(crate::cli_error!(
            "No jobs given: pass --manifest or --video/--audio"
        ));
    }

    let output_dir = args
        .output_dir
        .clone()
        .or(manifest.output_dir)
        .unwrap_or_default();

    Ok(ResolvedBatch { output_dir, jobs })
}

/// Fills unknown durations from the first source. Probe failures keep 0.
pub fn fill_durations(jobs: &mut [JobSpec]) {
    for job in jobs.iter_mut().filter(|job| job.expected_duration == 0) {
        let Some(source) = job.sources().next().map(Path::to_path_buf) else {
            continue;
        };
        match probe_duration(&source) {
            Ok(secs) => {
                info!("Probed {}: {}s", source.display(), secs);
                job.expected_duration = secs;
            }
            Err(e) => warn!("Could not probe duration of {}: {}", source.display(), e),
        }
    }
}

/// Fails if any job names a source that is missing or empty.
pub fn check_sources(jobs: &[JobSpec]) -> CliResult<()> {
    let missing: Vec<String> = jobs
        .iter()
        .flat_map(|job| job.missing_sources())
        .map(|path| path.display().to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(crate::cli_error!(
            "Missing or empty source file(s): {}",
            missing.join(", ")
        ))
    }
}
