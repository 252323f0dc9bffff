//! Bounded-concurrency dispatch of transfer units
//!
//! Two strategies share the same accounting:
//! - [`SchedulingMode::Batched`]: tasks are cut into consecutive groups of
//!   `concurrency`; a group must fully settle before the next one starts.
//! - [`SchedulingMode::Pool`]: a semaphore with `concurrency` permits; the
//!   next unit starts as soon as any running one settles.
//!
//! Every unit runs in its own tokio task, so a panic inside one unit is
//! observed as a `JoinError` and recorded as a failure for that unit only.

use crate::config::SchedulingMode;
use crate::events::{ProgressSink, RunEvent};
use crate::transfer::{Outcome, TransferUnit, UploadTask};
use crate::SAMPLE_KEY_LIMIT;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinError;
use tracing::{debug, error, info};

/// Shared run counters. Updated concurrently, read once at the end.
#[derive(Debug, Default)]
pub struct RunCounters {
    total: AtomicU64,
    uploaded: AtomicU64,
    failed: AtomicU64,
    bytes_uploaded: AtomicU64,
    sample_keys: Mutex<Vec<String>>,
}

/// Point-in-time copy of [`RunCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub total: u64,
    pub uploaded: u64,
    pub failed: u64,
    pub bytes_uploaded: u64,
}

impl CounterSnapshot {
    pub fn settled(&self) -> u64 {
        self.uploaded + self.failed
    }
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_total(&self, n: u64) {
        self.total.fetch_add(n, Ordering::SeqCst);
    }

    /// Account for one terminal outcome.
    pub fn record(&self, key: &str, outcome: &Outcome) {
        match outcome {
            Outcome::Success { bytes } => {
                self.uploaded.fetch_add(1, Ordering::SeqCst);
                self.bytes_uploaded.fetch_add(*bytes, Ordering::SeqCst);
                let mut samples = self.sample_keys.lock();
                if samples.len() < SAMPLE_KEY_LIMIT {
                    samples.push(key.to_string());
                }
            }
            Outcome::Failure(_) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            total: self.total.load(Ordering::SeqCst),
            uploaded: self.uploaded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            bytes_uploaded: self.bytes_uploaded.load(Ordering::SeqCst),
        }
    }

    /// Keys of the first few successful uploads
    pub fn sample_keys(&self) -> Vec<String> {
        self.sample_keys.lock().clone()
    }
}

type Settled = (String, Result<Outcome, JoinError>);

/// Drives transfer units under a concurrency bound.
pub struct BatchScheduler {
    unit: TransferUnit,
    concurrency: usize,
    mode: SchedulingMode,
    progress: Arc<dyn ProgressSink>,
}

impl BatchScheduler {
    pub fn new(
        unit: TransferUnit,
        concurrency: usize,
        mode: SchedulingMode,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            unit,
            concurrency,
            mode,
            progress,
        }
    }

    /// Upload every task. Per-file failures end up in `counters`; only a
    /// scheduling fault returns an error.
    pub async fn run(
        &self,
        tasks: Vec<UploadTask>,
        counters: Arc<RunCounters>,
    ) -> crate::Result<CounterSnapshot> {
        if self.concurrency == 0 {
            return Err(crate::Error::Configuration(
                "Concurrency must be at least 1".into(),
            ));
        }

        counters.add_total(tasks.len() as u64);
        info!(
            tasks = tasks.len(),
            concurrency = self.concurrency,
            mode = ?self.mode,
            "Starting uploads"
        );

        match self.mode {
            SchedulingMode::Batched => self.run_batched(tasks, &counters).await,
            SchedulingMode::Pool => self.run_pool(tasks, &counters).await?,
        }

        Ok(counters.snapshot())
    }

    async fn run_batched(&self, tasks: Vec<UploadTask>, counters: &RunCounters) {
        let mut remaining = tasks.into_iter();
        let mut index = 0;

        loop {
            let group: Vec<UploadTask> = remaining.by_ref().take(self.concurrency).collect();
            if group.is_empty() {
                break;
            }

            debug!(batch = index + 1, size = group.len(), "Dispatching batch");
            self.progress.emit(&RunEvent::BatchStarted {
                index,
                size: group.len(),
            });

            let mut in_flight: FuturesUnordered<BoxFuture<'static, Settled>> = group
                .into_iter()
                .map(|task| self.dispatch(task, None))
                .collect();

            // Barrier: the whole group settles before the next is cut
            while let Some((key, joined)) = in_flight.next().await {
                self.settle(counters, key, joined);
            }
            index += 1;
        }
    }

    async fn run_pool(&self, tasks: Vec<UploadTask>, counters: &RunCounters) -> crate::Result<()> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut in_flight: FuturesUnordered<BoxFuture<'static, Settled>> =
            FuturesUnordered::new();

        for task in tasks {
            let permit = loop {
                tokio::select! {
                    biased;
                    Some((key, joined)) = in_flight.next(), if !in_flight.is_empty() => {
                        self.settle(counters, key, joined);
                    }
                    permit = semaphore.clone().acquire_owned() => {
                        break permit.map_err(|e| {
                            crate::Error::Fatal(format!("Upload slots unavailable: {}", e))
                        })?;
                    }
                }
            };
            in_flight.push(self.dispatch(task, Some(permit)));
        }

        while let Some((key, joined)) = in_flight.next().await {
            self.settle(counters, key, joined);
        }
        Ok(())
    }

    fn dispatch(
        &self,
        task: UploadTask,
        permit: Option<OwnedSemaphorePermit>,
    ) -> BoxFuture<'static, Settled> {
        let key = task.key.clone();
        let unit = self.unit.clone();
        let handle = tokio::spawn(async move {
            let _permit = permit;
            unit.upload(&task).await
        });
        async move { (key, handle.await) }.boxed()
    }

    fn settle(&self, counters: &RunCounters, key: String, joined: Result<Outcome, JoinError>) {
        let outcome = joined.unwrap_or_else(|e| {
            error!(key = %key, error = %e, "Transfer unit aborted");
            Outcome::Failure(format!("transfer aborted: {}", e))
        });
        counters.record(&key, &outcome);
        self.progress.emit(&RunEvent::ItemCompleted { key, outcome });
    }
}
