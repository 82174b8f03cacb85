// ============================================================================
// muxq-cli/src/progress.rs
// ============================================================================
//
// PROGRESS RENDERING: Terminal View of a Running Batch
//
// `ProgressRenderer` turns engine events into indicatif bars: one overall bar
// counting finished jobs, plus one bar per running job. Finished jobs and
// engine Info messages are printed above the bars via `MultiProgress::println`.
//
// Error events are not printed: every failure also arrives as a JobFinished
// event, which is rendered with its reason.

use std::collections::HashMap;
use std::time::Duration;

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use muxq_core::{BatchEvent, BatchSummary, JobId, JobOutcome};

const JOB_TEMPLATE: &str = "  {prefix:<24!} [{bar:30}] {pos:>3}%";
const OVERALL_TEMPLATE: &str = "{spinner} Batch [{bar:30}] {pos}/{len} done | running avg {msg}";

pub struct ProgressRenderer {
    multi: MultiProgress,
    overall: Option<ProgressBar>,
    jobs: HashMap<JobId, ProgressBar>,
}

impl ProgressRenderer {
    pub fn new(multi: MultiProgress) -> Self {
        Self {
            multi,
            overall: None,
            jobs: HashMap::new(),
        }
    }

    /// Renders one event. Returns the summary once the batch has finished.
    pub fn handle(&mut self, event: &BatchEvent) -> Option<BatchSummary> {
        match event {
            BatchEvent::BatchStarted {
                total, output_dir, ..
            } => {
                self.println(format!(
                    "{} {} job(s) into {}",
                    style("»").cyan(),
                    total,
                    output_dir.display()
                ));
                let bar = self.multi.add(ProgressBar::new(*total as u64));
                bar.set_style(bar_style(OVERALL_TEMPLATE));
                bar.set_message("0%");
                bar.enable_steady_tick(Duration::from_millis(120));
                self.overall = Some(bar);
            }
            BatchEvent::JobStarted { job, title, .. } => {
                let bar = match &self.overall {
                    Some(overall) => self.multi.insert_before(overall, ProgressBar::new(100)),
                    None => self.multi.add(ProgressBar::new(100)),
                };
                bar.set_style(bar_style(JOB_TEMPLATE));
                bar.set_prefix(title.clone());
                self.jobs.insert(*job, bar);
            }
            BatchEvent::JobProgress { job, percent } => {
                if let Some(bar) = self.jobs.get(job) {
                    bar.set_position(u64::from(*percent));
                }
            }
            BatchEvent::AggregateProgress { percent } => {
                if let Some(overall) = &self.overall {
                    overall.set_message(format!("{percent}%"));
                }
            }
            BatchEvent::JobFinished {
                job,
                title,
                outcome,
            } => {
                if let Some(bar) = self.jobs.remove(job) {
                    bar.finish_and_clear();
                    self.multi.remove(&bar);
                }
                if let Some(overall) = &self.overall {
                    overall.inc(1);
                }
                self.println(finished_line(title, outcome));
            }
            BatchEvent::Info { message } => {
                self.println(format!("  {}", style(message).dim()));
            }
            BatchEvent::Error { .. } => {}
            BatchEvent::BatchFinished { summary, .. } => {
                self.clear();
                return Some(*summary);
            }
        }
        None
    }

    /// Removes every bar, e.g. when the event stream ends early.
    pub fn clear(&mut self) {
        for (_, bar) in self.jobs.drain() {
            bar.finish_and_clear();
        }
        if let Some(overall) = self.overall.take() {
            overall.finish_and_clear();
        }
        let _ = self.multi.clear();
    }

    fn println(&self, line: String) {
        // println is a no-op while the draw target is hidden
        if self.multi.is_hidden() {
            eprintln!("{line}");
        } else {
            let _ = self.multi.println(line);
        }
    }
}

/// A MultiProgress that only draws when stderr is a terminal.
pub fn multi_progress() -> MultiProgress {
    let multi = MultiProgress::new();
    if !console::Term::stderr().is_term() {
        multi.set_draw_target(ProgressDrawTarget::hidden());
    }
    multi
}

fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##.")
}

fn finished_line(title: &str, outcome: &JobOutcome) -> String {
    match outcome {
        JobOutcome::Succeeded => format!("{} {}", style("✓").green().bold(), title),
        JobOutcome::Failed { reason } => format!(
            "{} {}: {}",
            style("✗").red().bold(),
            title,
            style(reason).red()
        ),
    }
}

/// Prints the final tally.
pub fn print_summary(summary: &BatchSummary) {
    println!();
    println!("{}", style("===== Summary =====").bold().cyan());
    let line = summary.to_string();
    if summary.all_succeeded() {
        println!("  {}", style(line).green().bold());
    } else {
        println!("  {}", style(line).red().bold());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muxq_core::{BatchId, FailureReason};
    use std::path::PathBuf;

    fn hidden_renderer() -> ProgressRenderer {
        ProgressRenderer::new(MultiProgress::with_draw_target(ProgressDrawTarget::hidden()))
    }

    #[test]
    fn test_tracks_job_bars() {
        let mut renderer = hidden_renderer();
        renderer.handle(&BatchEvent::BatchStarted {
            batch: BatchId(1),
            total: 2,
            output_dir: PathBuf::from("out"),
        });
        renderer.handle(&BatchEvent::JobStarted {
            job: JobId(1),
            title: "One".to_string(),
            command: "ffmpeg".to_string(),
        });
        renderer.handle(&BatchEvent::JobProgress { job: JobId(1), percent: 40 });
        assert_eq!(renderer.jobs[&JobId(1)].position(), 40);

        renderer.handle(&BatchEvent::JobFinished {
            job: JobId(1),
            title: "One".to_string(),
            outcome: JobOutcome::Succeeded,
        });
        assert!(renderer.jobs.is_empty());
        assert_eq!(renderer.overall.as_ref().map(ProgressBar::position), Some(1));
    }

    #[test]
    fn test_returns_summary_on_finish() {
        let mut renderer = hidden_renderer();
        let summary = BatchSummary { total: 1, succeeded: 0, failed: 1 };
        assert!(renderer.handle(&BatchEvent::Info { message: "hi".to_string() }).is_none());
        let finished = renderer.handle(&BatchEvent::BatchFinished { batch: BatchId(1), summary });
        assert_eq!(finished, Some(summary));
        assert!(renderer.overall.is_none());
    }

    #[test]
    fn test_finished_line_mentions_reason() {
        console::set_colors_enabled(false);
        let line = finished_line(
            "Show",
            &JobOutcome::Failed { reason: FailureReason::NonZeroExit(2) },
        );
        assert_eq!(line, "✗ Show: exited with code 2");
    }
}
