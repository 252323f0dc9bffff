//! Configuration management for the bulkput CLI
//!
//! Sources, later ones win:
//! 1. config file (`--config`, else `./bulkput.toml`, else `~/.bulkput/config.toml`)
//! 2. environment variables (`BULKPUT_*`, with `AWS_*` fallbacks for the connection)
//!
//! Example config:
//! ```toml
//! bucket = "assets-prod"
//! region = "eu-west-1"
//! roots = ["public", "downloads"]
//! concurrency = 20
//! retry_attempts = 3
//! retry_delay_ms = 1000
//! exclude = ["*.map", "**/.DS_Store"]
//! ```

use anyhow::{Context, Result};
use bulkput_core::{
    PathFilter, RetryPolicy, RunConfig, SchedulingMode, DEFAULT_CONCURRENCY,
    DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY_MS,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "bulkput.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Target bucket
    pub bucket: Option<String>,

    #[serde(default = "default_region")]
    pub region: String,

    /// Custom S3-compatible endpoint URL
    pub endpoint: Option<String>,

    /// Path style access (use path instead of virtual hosted style)
    #[serde(default)]
    pub path_style: bool,

    pub access_key: Option<String>,

    pub secret_key: Option<String>,

    /// Host used for public object URLs, `s3.<region>.amazonaws.com` when unset
    pub public_domain: Option<String>,

    /// Folders to upload, relative to `base_dir`
    #[serde(default)]
    pub roots: Vec<String>,

    /// Defaults to the working directory
    pub base_dir: Option<PathBuf>,

    pub prefix: Option<String>,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default)]
    pub scheduling: SchedulingMode,

    /// Per-request timeout in seconds
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_retry_attempts() -> u32 {
    DEFAULT_RETRY_ATTEMPTS
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bucket: None,
            region: default_region(),
            endpoint: None,
            path_style: false,
            access_key: None,
            secret_key: None,
            public_domain: None,
            roots: Vec::new(),
            base_dir: None,
            prefix: None,
            concurrency: default_concurrency(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            scheduling: SchedulingMode::default(),
            timeout_secs: None,
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

impl Config {
    /// Get the per-user config file path
    pub fn user_config_path() -> Option<PathBuf> {
        directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(".bulkput").join("config.toml"))
    }

    /// Load configuration from file and process environment
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let candidates = [Some(PathBuf::from(LOCAL_CONFIG_FILE)), Self::user_config_path()];
                match candidates.into_iter().flatten().find(|p| p.is_file()) {
                    Some(path) => Self::from_file(&path)?,
                    None => Config::default(),
                }
            }
        };

        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Override fields with environment variables resolved through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| names.iter().find_map(|n| lookup(n).filter(|v| !v.is_empty()));

        if let Some(bucket) = first(&["BULKPUT_BUCKET"]) {
            self.bucket = Some(bucket);
        }
        if let Some(region) = first(&["BULKPUT_REGION", "AWS_REGION"]) {
            self.region = region;
        }
        if let Some(endpoint) = first(&["BULKPUT_ENDPOINT", "AWS_ENDPOINT_URL"]) {
            self.endpoint = Some(endpoint);
        }
        if let Some(path_style) = first(&["BULKPUT_PATH_STYLE"]) {
            self.path_style = parse_env("BULKPUT_PATH_STYLE", &path_style)?;
        }
        if let Some(access_key) = first(&["BULKPUT_ACCESS_KEY", "AWS_ACCESS_KEY_ID"]) {
            self.access_key = Some(access_key);
        }
        if let Some(secret_key) = first(&["BULKPUT_SECRET_KEY", "AWS_SECRET_ACCESS_KEY"]) {
            self.secret_key = Some(secret_key);
        }
        if let Some(domain) = first(&["BULKPUT_PUBLIC_DOMAIN"]) {
            self.public_domain = Some(domain);
        }
        if let Some(roots) = first(&["BULKPUT_ROOTS"]) {
            self.roots = split_list(&roots);
        }
        if let Some(dir) = first(&["BULKPUT_BASE_DIR"]) {
            self.base_dir = Some(PathBuf::from(dir));
        }
        if let Some(prefix) = first(&["BULKPUT_PREFIX"]) {
            self.prefix = Some(prefix);
        }
        if let Some(value) = first(&["BULKPUT_CONCURRENCY"]) {
            self.concurrency = parse_env("BULKPUT_CONCURRENCY", &value)?;
        }
        if let Some(value) = first(&["BULKPUT_RETRY_ATTEMPTS"]) {
            self.retry_attempts = parse_env("BULKPUT_RETRY_ATTEMPTS", &value)?;
        }
        if let Some(value) = first(&["BULKPUT_RETRY_DELAY_MS"]) {
            self.retry_delay_ms = parse_env("BULKPUT_RETRY_DELAY_MS", &value)?;
        }
        if let Some(value) = first(&["BULKPUT_SCHEDULING"]) {
            self.scheduling = value.parse()?;
        }
        if let Some(value) = first(&["BULKPUT_TIMEOUT_SECS"]) {
            self.timeout_secs = Some(parse_env("BULKPUT_TIMEOUT_SECS", &value)?);
        }
        if let Some(value) = first(&["BULKPUT_INCLUDE"]) {
            self.include = split_list(&value);
        }
        if let Some(value) = first(&["BULKPUT_EXCLUDE"]) {
            self.exclude = split_list(&value);
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.bucket.as_deref().map_or(true, str::is_empty) {
            anyhow::bail!("Bucket not configured. Set BULKPUT_BUCKET or 'bucket' in {}", LOCAL_CONFIG_FILE);
        }

        if self.roots.is_empty() {
            anyhow::bail!(
                "No folders to upload. Set BULKPUT_ROOTS (comma separated) or 'roots' in {}",
                LOCAL_CONFIG_FILE
            );
        }

        if self.concurrency == 0 {
            anyhow::bail!("Concurrency must be at least 1. Check BULKPUT_CONCURRENCY");
        }

        if let Some(endpoint) = &self.endpoint {
            url::Url::parse(endpoint)
                .with_context(|| format!("Invalid endpoint URL '{}'. Check BULKPUT_ENDPOINT", endpoint))?;
        }

        if self.access_key.is_some() != self.secret_key.is_some() {
            anyhow::bail!(
                "Access key and secret key must be set together. Set both BULKPUT_ACCESS_KEY and BULKPUT_SECRET_KEY, or neither to use the default AWS credential chain"
            );
        }

        if self.timeout_secs == Some(0) {
            anyhow::bail!("Timeout must be greater than zero. Check BULKPUT_TIMEOUT_SECS");
        }

        Ok(())
    }

    pub fn bucket(&self) -> &str {
        self.bucket.as_deref().unwrap_or_default()
    }

    /// Build the engine configuration. `cwd` is used when no base dir is set.
    pub fn to_run_config(&self, cwd: &Path) -> Result<RunConfig> {
        let base_dir = match &self.base_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => cwd.join(dir),
            None => cwd.to_path_buf(),
        };

        let filter = PathFilter::new(&self.include, &self.exclude)?;

        let mut run = RunConfig::new(base_dir, self.roots.clone())
            .with_concurrency(self.concurrency)
            .with_retry(RetryPolicy::new(self.retry_attempts, self.retry_delay_ms))
            .with_scheduling(self.scheduling)
            .with_filter(filter);

        if let Some(secs) = self.timeout_secs {
            run = run.with_put_timeout(Duration::from_secs(secs));
        }
        if let Some(prefix) = self.prefix.as_deref().filter(|p| !p.is_empty()) {
            run = run.with_prefix(prefix);
        }

        run.validate()?;
        Ok(run)
    }

    /// Public URL of an uploaded object
    pub fn public_url(&self, key: &str) -> String {
        match (&self.endpoint, self.path_style) {
            (Some(endpoint), true) => {
                format!("{}/{}/{}", endpoint.trim_end_matches('/'), self.bucket(), key)
            }
            _ => {
                let domain = self
                    .public_domain
                    .clone()
                    .unwrap_or_else(|| format!("s3.{}.amazonaws.com", self.region));
                format!("https://{}.{}/{}", self.bucket(), domain, key)
            }
        }
    }
}

fn parse_env<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value '{}' for {}", value, name))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
