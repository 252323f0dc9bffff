//! Run configuration

use crate::scanner::PathFilter;
use crate::{DEFAULT_CONCURRENCY, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY_MS};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// How transfer units are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulingMode {
    /// Fixed-size groups with a barrier between consecutive groups
    #[default]
    Batched,
    /// Refilling pool: a new unit starts as soon as a slot frees up
    Pool,
}

impl std::str::FromStr for SchedulingMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "batched" | "batch" => Ok(Self::Batched),
            "pool" => Ok(Self::Pool),
            other => Err(crate::Error::Configuration(format!(
                "Unknown scheduling mode '{}' (expected 'batched' or 'pool')",
                other
            ))),
        }
    }
}

/// Constant-delay retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; a unit makes at most `attempts + 1` calls
    pub attempts: u32,
    /// Pause between two attempts of the same unit
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay_ms: u64) -> Self {
        Self {
            attempts,
            delay: Duration::from_millis(delay_ms),
        }
    }

    /// No retries at all
    pub fn none() -> Self {
        Self::new(0, 0)
    }
}

/// Immutable settings for one run. Built once at start-up.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Root folder names, resolved against `base_dir`, in upload order
    pub roots: Vec<String>,
    /// Directory object keys are computed relative to
    pub base_dir: PathBuf,
    pub concurrency: usize,
    pub retry: RetryPolicy,
    pub scheduling: SchedulingMode,
    /// Upper bound for a single sink call
    pub put_timeout: Option<Duration>,
    /// Prepended to every object key
    pub prefix: Option<String>,
    pub filter: PathFilter,
}

impl RunConfig {
    pub fn new(base_dir: impl Into<PathBuf>, roots: Vec<String>) -> Self {
        Self {
            roots,
            base_dir: base_dir.into(),
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
            scheduling: SchedulingMode::default(),
            put_timeout: None,
            prefix: None,
            filter: PathFilter::default(),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_scheduling(mut self, scheduling: SchedulingMode) -> Self {
        self.scheduling = scheduling;
        self
    }

    pub fn with_put_timeout(mut self, timeout: Duration) -> Self {
        self.put_timeout = Some(timeout);
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_filter(mut self, filter: PathFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.roots.is_empty() {
            return Err(crate::Error::Configuration(
                "No root folders configured. Set BULKPUT_ROOTS or 'roots' in the config file".into(),
            ));
        }
        if self.roots.iter().any(|r| r.trim().is_empty()) {
            return Err(crate::Error::Configuration(
                "Root folder names must not be empty".into(),
            ));
        }
        if let Some(root) = self.roots.iter().find(|r| !is_plain_relative(r)) {
            return Err(crate::Error::Configuration(format!(
                "Root folder '{}' must be a relative path inside the base directory",
                root
            )));
        }
        if self.concurrency == 0 {
            return Err(crate::Error::Configuration(
                "Concurrency must be at least 1. Set BULKPUT_CONCURRENCY".into(),
            ));
        }
        if matches!(self.put_timeout, Some(t) if t.is_zero()) {
            return Err(crate::Error::Configuration(
                "Upload timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

fn is_plain_relative(root: &str) -> bool {
    Path::new(root)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_config_defaults() {
        let config = RunConfig::new("/srv/site", vec!["public".to_string()]);
        assert_eq!(config.concurrency, 20);
        assert_eq!(config.retry.attempts, 3);
        assert_eq!(config.retry.delay, Duration::from_millis(1000));
        assert_eq!(config.scheduling, SchedulingMode::Batched);
        assert!(config.put_timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = RunConfig::new("/srv", vec![]);
        assert!(matches!(
            config.validate(),
            Err(crate::Error::Configuration(_))
        ));

        let config = RunConfig::new("/srv", vec!["a".into()]).with_concurrency(0);
        assert!(config.validate().is_err());

        let config = RunConfig::new("/srv", vec!["  ".into()]);
        assert!(config.validate().is_err());

        let config =
            RunConfig::new("/srv", vec!["a".into()]).with_put_timeout(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = RunConfig::new("/srv", vec!["../outside".into()]);
        assert!(config.validate().is_err());

        let config = RunConfig::new("/srv", vec!["/etc".into()]);
        assert!(config.validate().is_err());

        let config = RunConfig::new("/srv", vec!["site/public".into()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_scheduling_mode_parse() {
        assert_eq!("batched".parse::<SchedulingMode>().unwrap(), SchedulingMode::Batched);
        assert_eq!("POOL".parse::<SchedulingMode>().unwrap(), SchedulingMode::Pool);
        assert!("fifo".parse::<SchedulingMode>().is_err());
    }
}
