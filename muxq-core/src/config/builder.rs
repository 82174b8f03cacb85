// ============================================================================
// muxq-core/src/config/builder.rs
// ============================================================================
//
// CONFIGURATION BUILDER: Builder Pattern for CoreConfig
//
// Fluent construction of `CoreConfig`. Unset fields keep their defaults and
// `build` validates the result.

use std::path::PathBuf;

use super::CoreConfig;
use crate::error::CoreResult;
use crate::external::OutputFormat;

/// Builder for creating CoreConfig instances.
///
/// # Examples
///
/// ```rust
/// use muxq_core::config::CoreConfigBuilder;
/// use muxq_core::external::OutputFormat;
///
/// let config = CoreConfigBuilder::new()
///     .worker_path("/usr/bin/ffmpeg")
///     .max_concurrent(1)
///     .output_format(OutputFormat::Mkv)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_concurrent, 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CoreConfigBuilder {
    config: CoreConfig,
}

impl CoreConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration, e.g. one loaded from a file.
    #[must_use]
    pub fn from_config(config: CoreConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn worker_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.worker_path = path.into();
        self
    }

    #[must_use]
    pub fn max_concurrent(mut self, cap: usize) -> Self {
        self.config.max_concurrent = cap;
        self
    }

    #[must_use]
    pub fn worker_timeout_secs(mut self, secs: u64) -> Self {
        self.config.worker_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn kill_grace_secs(mut self, secs: u64) -> Self {
        self.config.kill_grace_secs = secs;
        self
    }

    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    #[must_use]
    pub fn diagnostic_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.diagnostic_log = path.into();
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> CoreResult<CoreConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
