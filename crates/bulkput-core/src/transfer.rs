//! Single-file upload with retry

use crate::config::RetryPolicy;
use crate::error::{PathError, TransferError};
use crate::resolve::{join_key, resolve_content_type, resolve_key};
use crate::sink::ObjectSink;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// One file queued for transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    pub path: PathBuf,
    pub key: String,
    pub content_type: String,
}

impl UploadTask {
    /// Build a task for a discovered file. The key is the path relative to
    /// `base_dir`, behind `prefix` when one is given.
    pub fn from_path(
        base_dir: &Path,
        path: impl Into<PathBuf>,
        prefix: Option<&str>,
    ) -> Result<Self, PathError> {
        let path = path.into();
        let key = join_key(prefix, &resolve_key(base_dir, &path)?);
        let content_type = resolve_content_type(&path).to_string();
        Ok(Self {
            path,
            key,
            content_type,
        })
    }
}

/// Terminal result of a transfer unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success { bytes: u64 },
    Failure(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

/// Uploads one task at a time, retrying failed attempts with a constant delay.
#[derive(Clone)]
pub struct TransferUnit {
    sink: Arc<dyn ObjectSink>,
    retry: RetryPolicy,
    put_timeout: Option<Duration>,
}

impl TransferUnit {
    pub fn new(sink: Arc<dyn ObjectSink>, retry: RetryPolicy) -> Self {
        Self {
            sink,
            retry,
            put_timeout: None,
        }
    }

    pub fn with_put_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.put_timeout = timeout;
        self
    }

    /// Upload `task`, making at most `retry.attempts + 1` attempts in sequence.
    pub async fn upload(&self, task: &UploadTask) -> Outcome {
        let mut attempt: u32 = 0;
        loop {
            match self.attempt(task).await {
                Ok(bytes) => {
                    debug!(key = %task.key, bytes = bytes, attempt = attempt + 1, "Uploaded");
                    return Outcome::Success { bytes };
                }
                Err(e) if attempt < self.retry.attempts => {
                    warn!(
                        key = %task.key,
                        attempt = attempt + 1,
                        max_attempts = self.retry.attempts + 1,
                        error = %e,
                        "Upload attempt failed, retrying in {:?}",
                        self.retry.delay
                    );
                    if !self.retry.delay.is_zero() {
                        tokio::time::sleep(self.retry.delay).await;
                    }
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        path = ?task.path,
                        key = %task.key,
                        attempts = attempt + 1,
                        error = %e,
                        "Upload failed"
                    );
                    return Outcome::Failure(e.to_string());
                }
            }
        }
    }

    async fn attempt(&self, task: &UploadTask) -> Result<u64, TransferError> {
        let body = tokio::fs::read(&task.path)
            .await
            .map_err(|source| TransferError::Read {
                path: task.path.clone(),
                source,
            })?;
        let len = body.len() as u64;

        let put = self.sink.put(&task.key, Bytes::from(body), &task.content_type);
        match self.put_timeout {
            Some(limit) => tokio::time::timeout(limit, put)
                .await
                .map_err(|_| TransferError::Timeout(limit))??,
            None => put.await?,
        }

        Ok(len)
    }
}
