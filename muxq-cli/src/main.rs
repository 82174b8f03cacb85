// muxq-cli/src/main.rs
//
// Entry point for the `muxq` binary.
//
// Responsibilities:
// - Parsing the command line.
// - Setting up console logging (and the per-run log file for `run`).
// - Dispatching to the command implementations in the library.
// - Printing errors and mapping the outcome to the exit code: 0 when every
//   job succeeded, 1 on any job failure or error.

use clap::Parser;
use console::style;
use muxq_cli::manifest::resolve_batch;
use muxq_cli::progress::multi_progress;
use muxq_cli::{Cli, CliResult, Commands, log_dir_for, logging, run_batch, run_plan};
use std::process;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => process::exit(0),
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            process::exit(1);
        }
    }
}

/// Runs the selected command. `Ok(false)` means some job failed.
async fn run(cli: Cli) -> CliResult<bool> {
    let multi = multi_progress();

    match cli.command {
        Commands::Run(args) => {
            let batch = resolve_batch(&args.batch)?;
            let log_dir = log_dir_for(&args, &batch);
            if let Some(path) = logging::init(cli.verbose, log_dir.as_deref(), &multi)? {
                log::info!("Logging to {}", path.display());
            }
            let summary = run_batch(&args, batch, multi).await?;
            Ok(summary.all_succeeded())
        }
        Commands::Plan(args) => {
            logging::init(cli.verbose, None, &multi)?;
            let mut stdout = std::io::stdout();
            run_plan(&args, &mut stdout)?;
            Ok(true)
        }
    }
}
