//! Implementation of the 'run' subcommand.
//!
//! Builds the engine configuration, submits the resolved batch to a fresh
//! `BatchQueue` and follows its events until the batch finishes. Ctrl-C
//! cancels the batch; the command still waits for the final tally.

use std::path::PathBuf;

use indicatif::MultiProgress;
use log::{debug, info, warn};
use muxq_core::events::json_handler::JsonEventWriter;
use muxq_core::{
    BatchEvent, BatchEvents, BatchQueue, BatchSummary, CancelOutcome, SubmitOutcome, check_worker,
};

use crate::cli::RunArgs;
use crate::config::build_core_config;
use crate::error::{CliErrorContext, CliResult};
use crate::manifest::{ResolvedBatch, check_sources, fill_durations};
use crate::progress::{ProgressRenderer, print_summary};

/// Log directory for a run: `--log-dir`, else `<output_dir>/logs`.
pub fn log_dir_for(args: &RunArgs, batch: &ResolvedBatch) -> Option<PathBuf> {
    args.log_dir.clone().or_else(|| {
        (!batch.output_dir.as_os_str().is_empty()).then(|| batch.output_dir.join("logs"))
    })
}

/// Runs the batch to completion and returns its tally.
pub async fn run_batch(
    args: &RunArgs,
    mut batch: ResolvedBatch,
    multi: MultiProgress,
) -> CliResult<BatchSummary> {
    let config = build_core_config(&args.batch)?;

    if args.batch.probe {
        fill_durations(&mut batch.jobs);
    }
    check_sources(&batch.jobs)?;

    // Not fatal: each job still fails on its own with a launch failure
    if let Err(e) = check_worker(&config.worker_path) {
        warn!("Worker binary missing: {}", e);
    }

    info!(
        "Running {} job(s) with {} (max {} at once, timeout {}s)",
        batch.jobs.len(),
        config.worker_path.display(),
        config.max_concurrent,
        config.worker_timeout_secs
    );

    let (queue, events) = BatchQueue::start(config)?;

    match queue.submit(batch.jobs, batch.output_dir).await? {
        SubmitOutcome::Accepted { batch, jobs } => {
            debug!("Batch {} accepted with job ids {:?}", batch, jobs);
        }
        SubmitOutcome::Busy => return Err(crate::cli_error!("Batch queue is busy")),
    }

    let interrupt = tokio::spawn(cancel_on_ctrl_c(queue.clone()));
    let result = follow_events(events, args.json, multi).await;
    interrupt.abort();

    let summary = result?;
    if !args.json {
        print_summary(&summary);
    }
    Ok(summary)
}

async fn cancel_on_ctrl_c(queue: BatchQueue) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for Ctrl-C: {}", e);
        return;
    }
    warn!("Interrupted, cancelling batch");
    match queue.cancel().await {
        Ok(CancelOutcome::Cancelling {
            drained,
            terminating,
        }) => info!("Cancelled {drained} pending job(s), terminating {terminating} worker(s)"),
        Ok(CancelOutcome::Idle) => {}
        Err(e) => warn!("Cancel failed: {}", e),
    }
}

/// Consumes events until `BatchFinished`, rendering them as bars or JSON.
async fn follow_events(
    mut events: BatchEvents,
    json: bool,
    multi: MultiProgress,
) -> CliResult<BatchSummary> {
    let mut writer = json.then(JsonEventWriter::new);
    let mut renderer = (!json).then(|| ProgressRenderer::new(multi));

    while let Some(event) = events.recv().await {
        debug!("Event: {:?}", event);

        let finished = match (&mut writer, &mut renderer) {
            (Some(writer), _) => {
                writer.write(&event).cli_context("Failed to write event")?;
                match event {
                    BatchEvent::BatchFinished { summary, .. } => Some(summary),
                    _ => None,
                }
            }
            (None, Some(renderer)) => renderer.handle(&event),
            (None, None) => None,
        };

        if let Some(summary) = finished {
            info!("Batch finished: {}", summary);
            return Ok(summary);
        }
    }

    if let Some(renderer) = renderer.as_mut() {
        renderer.clear();
    }
    Err(muxq_core::CoreError::QueueClosed)
}
