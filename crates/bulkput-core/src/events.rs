//! Progress events emitted during a run
//!
//! The core never renders anything itself. It hands discrete [`RunEvent`]s
//! to a [`ProgressSink`], which may be called from several transfer units
//! at the same time.

use crate::coordinator::RunReport;
use crate::transfer::Outcome;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub enum RunEvent {
    ScanStarted,
    /// A configured root does not exist and contributes no tasks
    FolderSkipped { name: String },
    ScanCompleted { count: usize },
    /// Batched scheduling only: group `index` (0-based) of `size` units starts
    BatchStarted { index: usize, size: usize },
    /// A transfer unit reached its terminal outcome
    ItemCompleted { key: String, outcome: Outcome },
    RunCompleted(RunReport),
}

/// Receiver of run events. Must tolerate concurrent calls.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: &RunEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn emit(&self, _event: &RunEvent) {}
}

/// Writes events as log lines.
///
/// Skipped roots and failed files are already reported at `warn`/`error`
/// where they happen, so those events are only echoed at `debug`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn emit(&self, event: &RunEvent) {
        match event {
            RunEvent::ScanStarted => info!("Scanning root folders"),
            RunEvent::FolderSkipped { name } => debug!(folder = %name, "Folder skipped"),
            RunEvent::ScanCompleted { count } => info!(files = count, "Scan complete"),
            RunEvent::BatchStarted { index, size } => {
                info!(batch = index + 1, size = size, "Starting batch")
            }
            RunEvent::ItemCompleted { key, outcome } => match outcome {
                Outcome::Success { bytes } => info!(key = %key, bytes = bytes, "Uploaded"),
                Outcome::Failure(reason) => {
                    debug!(key = %key, reason = %reason, "Upload settled as failed")
                }
            },
            RunEvent::RunCompleted(report) => info!(
                total = report.total,
                uploaded = report.uploaded,
                failed = report.failed,
                duration_secs = report.duration_secs,
                files_per_sec = report.throughput,
                "Run complete"
            ),
        }
    }
}
