//! Run coordination: scan, schedule, summarize

use crate::config::RunConfig;
use crate::events::{ProgressSink, RunEvent};
use crate::scanner::TreeScanner;
use crate::scheduler::{BatchScheduler, CounterSnapshot, RunCounters};
use crate::sink::ObjectSink;
use crate::error::PathError;
use crate::transfer::{Outcome, TransferUnit, UploadTask};
use crate::{Error, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Final result of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub total: u64,
    pub uploaded: u64,
    pub failed: u64,
    pub bytes_uploaded: u64,
    pub duration_secs: f64,
    /// Uploaded files per second; `0.0` when no time elapsed
    pub throughput: f64,
    /// A few uploaded keys, for printing example URLs
    pub sample_keys: Vec<String>,
}

impl RunReport {
    /// Report for a run that found nothing to upload
    pub fn empty() -> Self {
        Self::from_counters(CounterSnapshot::default(), Vec::new(), Duration::ZERO)
    }

    pub fn from_counters(
        snapshot: CounterSnapshot,
        sample_keys: Vec<String>,
        elapsed: Duration,
    ) -> Self {
        let duration_secs = elapsed.as_secs_f64();
        let throughput = if duration_secs > 0.0 {
            snapshot.uploaded as f64 / duration_secs
        } else {
            0.0
        };

        Self {
            total: snapshot.total,
            uploaded: snapshot.uploaded,
            failed: snapshot.failed,
            bytes_uploaded: snapshot.bytes_uploaded,
            duration_secs,
            throughput,
            sample_keys,
        }
    }

    /// Every discovered file reached a terminal outcome
    pub fn is_complete(&self) -> bool {
        self.uploaded + self.failed == self.total
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Single entry point for a run.
pub struct Coordinator {
    config: RunConfig,
    sink: Arc<dyn ObjectSink>,
    progress: Arc<dyn ProgressSink>,
}

impl Coordinator {
    pub fn new(
        config: RunConfig,
        sink: Arc<dyn ObjectSink>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            config,
            sink,
            progress,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub async fn execute(&self) -> Result<RunReport> {
        self.config.validate()?;

        let scanner = TreeScanner::new(&self.config.base_dir).with_filter(self.config.filter.clone());
        if !self.config.roots.iter().any(|root| scanner.root_exists(root)) {
            return Err(Error::NoRoots {
                roots: self.config.roots.clone(),
            });
        }

        info!(
            base_dir = ?self.config.base_dir,
            roots = ?self.config.roots,
            "Starting run"
        );

        let roots = self.config.roots.clone();
        let progress = Arc::clone(&self.progress);
        let paths = tokio::task::spawn_blocking(move || scanner.scan(&roots, progress.as_ref()))
            .await
            .map_err(|e| Error::Fatal(format!("Directory scan did not complete: {}", e)))?;

        let counters = Arc::new(RunCounters::new());
        let mut tasks = Vec::with_capacity(paths.len());
        for path in paths {
            match UploadTask::from_path(&self.config.base_dir, &path, self.config.prefix.as_deref()) {
                Ok(task) => tasks.push(task),
                Err(e) => self.reject(&counters, &path, e),
            }
        }

        if tasks.is_empty() && counters.snapshot().total == 0 {
            info!("No files found, nothing to upload");
            let report = RunReport::empty();
            self.progress.emit(&RunEvent::RunCompleted(report.clone()));
            return Ok(report);
        }

        let unit = TransferUnit::new(Arc::clone(&self.sink), self.config.retry)
            .with_put_timeout(self.config.put_timeout);
        let scheduler = BatchScheduler::new(
            unit,
            self.config.concurrency,
            self.config.scheduling,
            Arc::clone(&self.progress),
        );

        let started = Instant::now();
        let snapshot = scheduler.run(tasks, Arc::clone(&counters)).await?;
        let report = RunReport::from_counters(snapshot, counters.sample_keys(), started.elapsed());

        info!(
            total = report.total,
            uploaded = report.uploaded,
            failed = report.failed,
            duration_secs = report.duration_secs,
            "Run finished"
        );
        self.progress.emit(&RunEvent::RunCompleted(report.clone()));
        Ok(report)
    }

    /// Count a discovered file that has no valid object key as failed.
    fn reject(&self, counters: &RunCounters, path: &Path, err: PathError) {
        let label = path
            .strip_prefix(&self.config.base_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned();
        error!(path = ?path, error = %err, "Cannot derive object key, file not uploaded");

        let outcome = Outcome::Failure(err.to_string());
        counters.add_total(1);
        counters.record(&label, &outcome);
        self.progress.emit(&RunEvent::ItemCompleted {
            key: label,
            outcome,
        });
    }
}
