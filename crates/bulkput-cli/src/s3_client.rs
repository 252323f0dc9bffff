//! S3 client creation and object sinks

use crate::config::Config;
use anyhow::Result;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::put_object::PutObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;
use bulkput_core::{ObjectSink, SinkError};
use bytes::Bytes;
use tracing::{debug, info};

/// Create an S3 client from configuration.
///
/// Static credentials are used when configured, otherwise the default AWS
/// provider chain.
pub async fn create_client(config: &Config) -> Result<Client> {
    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));

    if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
        let credentials = Credentials::new(access_key, secret_key, None, None, "bulkput-cli");
        loader = loader.credentials_provider(credentials);
    }

    let shared = loader.load().await;
    let mut builder = aws_sdk_s3::config::Builder::from(&shared).force_path_style(config.path_style);

    if let Some(endpoint) = &config.endpoint {
        builder = builder.endpoint_url(endpoint);
    }

    Ok(Client::from_conf(builder.build()))
}

/// Uploads objects to a bucket with a public-read ACL.
pub struct S3Sink {
    client: Client,
    bucket: String,
}

impl S3Sink {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectSink for S3Sink {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), SinkError> {
        let size = body.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(sink_error)?;

        debug!(bucket = %self.bucket, key = %key, size = size, "Object stored");
        Ok(())
    }
}

fn sink_error(err: SdkError<PutObjectError, HttpResponse>) -> SinkError {
    let message = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::ServiceError(service) => SinkError::Rejected {
            status: service.raw().status().as_u16(),
            message,
        },
        _ => SinkError::Backend(message),
    }
}

/// Accepts every object without contacting the bucket.
///
/// With `echo` set, each object is printed to stdout as a
/// `(dryrun) upload:` line.
pub struct DryRunSink {
    bucket: String,
    echo: bool,
}

impl DryRunSink {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            echo: false,
        }
    }

    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn describe(&self, key: &str, content_type: &str, size: usize) -> String {
        format!(
            "(dryrun) upload: s3://{}/{} ({}, {} bytes)",
            self.bucket, key, content_type, size
        )
    }
}

#[async_trait]
impl ObjectSink for DryRunSink {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), SinkError> {
        let line = self.describe(key, content_type, body.len());
        if self.echo {
            println!("{}", line);
        }
        info!("{}", line);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dry_run_accepts_everything() {
        let sink = DryRunSink::new("assets");
        let result = sink
            .put("public/index.html", Bytes::from_static(b"<html>"), "text/html")
            .await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_dry_run_line() {
        let sink = DryRunSink::new("assets").with_echo(true);
        assert!(sink.echo);
        assert_eq!(
            sink.describe("public/index.html", "text/html", 6),
            "(dryrun) upload: s3://assets/public/index.html (text/html, 6 bytes)"
        );
        assert!(!DryRunSink::new("assets").echo);
    }

    #[tokio::test]
    async fn test_create_client_with_static_credentials() {
        let config = Config {
            bucket: Some("assets".to_string()),
            endpoint: Some("http://localhost:9000".to_string()),
            path_style: true,
            access_key: Some("minio".to_string()),
            secret_key: Some("minio123".to_string()),
            ..Config::default()
        };

        let client = create_client(&config).await.unwrap();
        assert_eq!(
            client.config().region().map(|r| r.as_ref()),
            Some("us-east-1")
        );
    }
}
