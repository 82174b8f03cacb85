// muxq-cli/src/config.rs
//
// Builds the engine configuration for a CLI invocation. Values come from the
// JSON file named by --config (or the built-in defaults), then every flag
// given on the command line or through its environment variable overrides
// the matching field.

use log::debug;
use muxq_core::{CoreConfig, CoreConfigBuilder};

use crate::cli::BatchArgs;
use crate::error::{CliErrorContext, CliResult};

/// Resolves the `CoreConfig` for a batch command. The result is validated.
pub fn build_core_config(args: &BatchArgs) -> CliResult<CoreConfig> {
    let base = match &args.config {
        Some(path) => CoreConfig::load(path)
            .cli_with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => CoreConfig::default(),
    };

    let mut builder = CoreConfigBuilder::from_config(base);
    if let Some(worker) = &args.worker {
        builder = builder.worker_path(worker);
    }
    if let Some(cap) = args.max_concurrent {
        builder = builder.max_concurrent(cap);
    }
    if let Some(secs) = args.timeout_secs {
        builder = builder.worker_timeout_secs(secs);
    }
    if let Some(secs) = args.kill_grace_secs {
        builder = builder.kill_grace_secs(secs);
    }
    if let Some(format) = args.format {
        builder = builder.output_format(format);
    }
    if let Some(log) = &args.error_log {
        builder = builder.diagnostic_log(log);
    }

    let config = builder.build()?;
    debug!("Effective configuration: {config:?}");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use muxq_core::{CoreError, OutputFormat};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_without_flags() {
        let config = build_core_config(&BatchArgs::default()).unwrap();
        assert_eq!(config, CoreConfig::default());
    }

    #[test]
    fn test_flags_override_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("muxq.json");
        fs::write(
            &path,
            r#"{ "max_concurrent": 8, "worker_timeout_secs": 60, "output_format": "webm" }"#,
        )
        .unwrap();

        let args = BatchArgs {
            config: Some(path),
            max_concurrent: Some(2),
            worker: Some(PathBuf::from("/usr/bin/ffmpeg")),
            ..BatchArgs::default()
        };
        let config = build_core_config(&args).unwrap();

        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.worker_timeout_secs, 60);
        assert_eq!(config.output_format, OutputFormat::Webm);
        assert_eq!(config.worker_path, PathBuf::from("/usr/bin/ffmpeg"));
    }

    #[test]
    fn test_invalid_override_rejected() {
        let args = BatchArgs {
            max_concurrent: Some(0),
            ..BatchArgs::default()
        };
        assert!(matches!(build_core_config(&args), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_missing_config_file() {
        let args = BatchArgs {
            config: Some(PathBuf::from("/nonexistent/muxq.json")),
            ..BatchArgs::default()
        };
        let err = build_core_config(&args).unwrap_err();
        assert!(err.to_string().contains("Failed to load configuration"));
    }
}
