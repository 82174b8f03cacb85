// ============================================================================
// muxq-core/src/config.rs
// ============================================================================
//
// CONFIGURATION: Core Configuration Structures and Constants
//
// `CoreConfig` carries every tunable of the engine: where the worker binary
// lives, how many workers may run at once, the timeout escalation policy,
// the output container and where failure records are appended.
//
// Instances are built by consumers (like muxq-cli), either through
// `CoreConfigBuilder`, by deserializing a JSON file with `CoreConfig::load`,
// or from `CoreConfig::default()`, and are validated before the queue starts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::external::{self, OutputFormat};

pub mod builder;

pub use builder::CoreConfigBuilder;

// ============================================================================
// DEFAULT CONSTANTS
// ============================================================================

/// Default maximum number of workers running at the same time.
pub const DEFAULT_MAX_CONCURRENT: usize = 3;

/// Default wall-clock limit for a single worker, in seconds.
pub const DEFAULT_WORKER_TIMEOUT_SECS: u64 = 300;

/// Default grace period between the terminate request and the forced kill.
pub const DEFAULT_KILL_GRACE_SECS: u64 = 5;

/// File name of the diagnostic log, placed next to the executable.
pub const DEFAULT_DIAGNOSTIC_LOG_NAME: &str = "ffmpeg_error.log";

// ============================================================================
// CORE CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Path to the external worker binary.
    pub worker_path: PathBuf,

    /// Concurrency cap. 1 runs jobs strictly one after another.
    pub max_concurrent: usize,

    pub worker_timeout_secs: u64,

    pub kill_grace_secs: u64,

    pub output_format: OutputFormat,

    /// Append-only failure log.
    pub diagnostic_log: PathBuf,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            worker_path: external::default_worker_path(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            worker_timeout_secs: DEFAULT_WORKER_TIMEOUT_SECS,
            kill_grace_secs: DEFAULT_KILL_GRACE_SECS,
            output_format: OutputFormat::default(),
            diagnostic_log: default_diagnostic_log(),
        }
    }
}

impl CoreConfig {
    /// Reads a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: CoreConfig = serde_json::from_str(&text)?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.worker_path.as_os_str().is_empty() {
            return Err(CoreError::Config("worker path must not be empty".to_string()));
        }
        if self.max_concurrent == 0 {
            return Err(CoreError::Config(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.worker_timeout_secs == 0 {
            return Err(CoreError::Config(
                "worker_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn worker_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_timeout_secs)
    }

    #[must_use]
    pub fn kill_grace(&self) -> Duration {
        Duration::from_secs(self.kill_grace_secs)
    }
}

/// `ffmpeg_error.log` in the directory of the running executable, falling
/// back to the current directory.
#[must_use]
pub fn default_diagnostic_log() -> PathBuf {
    external::executable_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_DIAGNOSTIC_LOG_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.max_concurrent, 3);
        assert_eq!(config.worker_timeout(), Duration::from_secs(300));
        assert_eq!(config.kill_grace(), Duration::from_secs(5));
        assert_eq!(config.output_format, OutputFormat::Mp4);
        assert!(config.diagnostic_log.ends_with("ffmpeg_error.log"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_cap() {
        let config = CoreConfig {
            max_concurrent: 0,
            ..CoreConfig::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_timeout_and_empty_worker() {
        let config = CoreConfig {
            worker_timeout_secs: 0,
            ..CoreConfig::default()
        };
        assert!(config.validate().is_err());

        let config = CoreConfig {
            worker_path: PathBuf::new(),
            ..CoreConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("muxq.json");
        std::fs::write(&path, r#"{ "max_concurrent": 1, "output_format": "mkv" }"#).unwrap();

        let config = CoreConfig::load(&path).unwrap();
        assert_eq!(config.max_concurrent, 1);
        assert_eq!(config.output_format, OutputFormat::Mkv);
        assert_eq!(config.worker_timeout_secs, DEFAULT_WORKER_TIMEOUT_SECS);
    }

    #[test]
    fn test_load_missing_file() {
        let err = CoreConfig::load(Path::new("/nonexistent/muxq.json")).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }
}
