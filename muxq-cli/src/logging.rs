// ============================================================================
// muxq-cli/src/logging.rs
// ============================================================================
//
// LOGGING SETUP: fern Dispatch for Console and Run Log
//
// Console output goes to stderr at a level chosen by -v flags. Lines are
// printed through `MultiProgress::suspend` so they land above the progress
// bars instead of tearing them. The `run` command also writes a DEBUG-level
// log file, `muxq_run_<timestamp>.log`, in its log directory.

use std::fs;
use std::path::{Path, PathBuf};

use indicatif::MultiProgress;
use log::LevelFilter;
use muxq_core::utils::timestamp;

use crate::error::{CliErrorContext, CliResult};

/// Console level for the number of -v flags.
pub fn console_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Installs the global logger. Returns the run log path, if one was opened.
pub fn init(verbose: u8, log_dir: Option<&Path>, multi: &MultiProgress) -> CliResult<Option<PathBuf>> {
    let console_multi = multi.clone();
    let console = fern::Dispatch::new()
        .level(console_level(verbose))
        .format(|out, message, record| {
            out.finish(format_args!("[{}] {}", record.level(), message))
        })
        .chain(fern::Output::call(move |record| {
            let line = record.args().to_string();
            console_multi.suspend(|| eprintln!("{line}"));
        }));

    let mut root = fern::Dispatch::new().level(LevelFilter::Trace).chain(console);

    let log_path = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .cli_with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let path = dir.join(format!("muxq_run_{}.log", timestamp()));
            let file = fern::log_file(&path)
                .cli_with_context(|| format!("Failed to open log file {}", path.display()))?;
            root = root.chain(
                fern::Dispatch::new()
                    .level(LevelFilter::Debug)
                    .format(|out, message, record| {
                        out.finish(format_args!(
                            "{} [{}] {}: {}",
                            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                            record.level(),
                            record.target(),
                            message
                        ))
                    })
                    .chain(file),
            );
            Some(path)
        }
        None => None,
    };

    root.apply()
        .map_err(|e| crate::cli_error!("Failed to initialize logging: {}", e))?;
    Ok(log_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_level() {
        assert_eq!(console_level(0), LevelFilter::Warn);
        assert_eq!(console_level(1), LevelFilter::Info);
        assert_eq!(console_level(2), LevelFilter::Debug);
        assert_eq!(console_level(7), LevelFilter::Trace);
    }
}
