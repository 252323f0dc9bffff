//! Bulkput Core Library
//!
//! Discovers files under a set of local directories and pushes them to an
//! object store through a bounded-concurrency scheduler with per-file retry.
//!
//! The pipeline is `Coordinator` -> `TreeScanner` -> `BatchScheduler` ->
//! `TransferUnit` -> `ObjectSink`. Storage and display are reached only
//! through the [`ObjectSink`] and [`ProgressSink`] traits.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod resolve;
pub mod scanner;
pub mod scheduler;
pub mod sink;
pub mod transfer;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{RetryPolicy, RunConfig, SchedulingMode};
pub use coordinator::{Coordinator, RunReport};
pub use error::{Error, PathError, Result, SinkError, TransferError};
pub use events::{NullProgress, ProgressSink, RunEvent, TracingProgress};
pub use scanner::{PathFilter, TreeScanner};
pub use scheduler::{BatchScheduler, CounterSnapshot, RunCounters};
pub use sink::ObjectSink;
pub use transfer::{Outcome, TransferUnit, UploadTask};

/// Bulkput version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default number of transfers in flight
pub const DEFAULT_CONCURRENCY: usize = 20;

/// Default number of retries after the first failed attempt
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Default delay between attempts (milliseconds)
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Content type used when the extension is missing or unknown
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Maximum number of uploaded keys kept on the report as examples
pub const SAMPLE_KEY_LIMIT: usize = 3;
