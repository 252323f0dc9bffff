//! Test doubles shared by the unit tests

use crate::error::SinkError;
use crate::events::{ProgressSink, RunEvent};
use crate::sink::ObjectSink;
use crate::transfer::{Outcome, UploadTask};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Create `files` (relative path, content) below `base`.
pub(crate) fn write_tree(base: &Path, files: &[(&str, &str)]) {
    for (relative, content) in files {
        let path = base.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }
}

/// Write `files` and return one task per file, in the given order.
pub(crate) fn tasks_for(base: &Path, files: &[(&str, &str)]) -> Vec<UploadTask> {
    write_tree(base, files);
    files
        .iter()
        .map(|(relative, _)| UploadTask::from_path(base, base.join(relative), None).unwrap())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SinkLog {
    Start(String),
    End(String),
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Scriptable in-memory object sink.
#[derive(Default)]
pub(crate) struct FakeSink {
    latency: Duration,
    failures: HashMap<String, usize>,
    hangs: HashMap<String, (usize, Duration)>,
    panic_on: Option<String>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    attempts: Mutex<HashMap<String, usize>>,
    stored: Mutex<Vec<(String, String, usize)>>,
    log: Mutex<Vec<SinkLog>>,
}

impl FakeSink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// The first `times` calls for `key` fail.
    pub(crate) fn failing(mut self, key: &str, times: usize) -> Self {
        self.failures.insert(key.to_string(), times);
        self
    }

    pub(crate) fn always_failing(self, key: &str) -> Self {
        self.failing(key, usize::MAX)
    }

    /// The first `times` calls for `key` sleep for `duration` before answering.
    pub(crate) fn hanging(mut self, key: &str, times: usize, duration: Duration) -> Self {
        self.hangs.insert(key.to_string(), (times, duration));
        self
    }

    pub(crate) fn panicking(mut self, key: &str) -> Self {
        self.panic_on = Some(key.to_string());
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn stored(&self) -> Vec<(String, String, usize)> {
        self.stored.lock().clone()
    }

    pub(crate) fn log(&self) -> Vec<SinkLog> {
        self.log.lock().clone()
    }
}

#[async_trait]
impl ObjectSink for FakeSink {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), SinkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);
        self.log.lock().push(SinkLog::Start(key.to_string()));

        let attempt = {
            let mut attempts = self.attempts.lock();
            let n = attempts.entry(key.to_string()).or_insert(0);
            *n += 1;
            *n
        };

        if self.panic_on.as_deref() == Some(key) {
            panic!("scripted panic for {}", key);
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some((times, duration)) = self.hangs.get(key) {
            if attempt <= *times {
                tokio::time::sleep(*duration).await;
            }
        }

        self.log.lock().push(SinkLog::End(key.to_string()));

        if let Some(times) = self.failures.get(key) {
            if attempt <= *times {
                return Err(SinkError::Backend(format!(
                    "scripted failure {} for {}",
                    attempt, key
                )));
            }
        }

        self.stored
            .lock()
            .push((key.to_string(), content_type.to_string(), body.len()));
        Ok(())
    }
}

/// Keeps every event it receives.
#[derive(Default)]
pub(crate) struct RecordingProgress {
    events: Mutex<Vec<RunEvent>>,
}

impl RecordingProgress {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn events(&self) -> Vec<RunEvent> {
        self.events.lock().clone()
    }

    pub(crate) fn skipped(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RunEvent::FolderSkipped { name } => Some(name),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn scan_count(&self) -> Option<usize> {
        self.events().into_iter().find_map(|e| match e {
            RunEvent::ScanCompleted { count } => Some(count),
            _ => None,
        })
    }

    pub(crate) fn batch_sizes(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RunEvent::BatchStarted { size, .. } => Some(size),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn completed(&self) -> Vec<(String, Outcome)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RunEvent::ItemCompleted { key, outcome } => Some((key, outcome)),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingProgress {
    fn emit(&self, event: &RunEvent) {
        self.events.lock().push(event.clone());
    }
}
