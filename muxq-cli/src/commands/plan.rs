//! Implementation of the 'plan' subcommand.
//!
//! Resolves the batch exactly as `run` would and prints one worker command
//! line per job, in submission order.

use std::io::Write;

use muxq_core::external::build_invocation;

use crate::cli::PlanArgs;
use crate::config::build_core_config;
use crate::error::{CliErrorContext, CliResult};
use crate::manifest::resolve_batch;

/// Writes the planned command lines to `out`. Returns the number of jobs.
pub fn run_plan(args: &PlanArgs, out: &mut dyn Write) -> CliResult<usize> {
    let config = build_core_config(&args.batch)?;
    let batch = resolve_batch(&args.batch)?;

    for spec in &batch.jobs {
        spec.validate()?;
        let mut spec = spec.clone();
        spec.ensure_title();
        let invocation =
            build_invocation(&config.worker_path, &spec, &batch.output_dir, config.output_format);
        writeln!(out, "{}", invocation.command_line()).cli_context("Failed to write plan")?;
    }

    Ok(batch.jobs.len())
}
