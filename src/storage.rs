//! Blob storage for uploaded document files.
//!
//! Paths are chosen by the caller; the store only moves bytes. The S3
//! implementation also serves MinIO and other path-style endpoints.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder as S3ConfigBuilder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

use crate::config::AppConfig;

#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: Option<String>) -> Result<()>;

    async fn get(&self, path: &str) -> Result<Vec<u8>>;

    async fn delete(&self, path: &str) -> Result<()>;

    /// Time-limited link that downloads the blob as `download_name`.
    async fn temporary_url(
        &self,
        path: &str,
        download_name: &str,
        expires_in: Duration,
    ) -> Result<String>;
}

pub struct S3Storage {
    client: S3Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let client = build_client(config).await?;
        Ok(Self::new(client, config.s3_bucket.clone()))
    }
}

#[async_trait]
impl BlobStore for S3Storage {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: Option<String>) -> Result<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(ByteStream::from(bytes));

        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }

        request
            .send()
            .await
            .with_context(|| format!("failed to write blob {path}"))?;
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .with_context(|| format!("failed to read blob {path}"))?;

        let bytes = response
            .body
            .collect()
            .await
            .context("failed to read blob stream")?
            .into_bytes()
            .to_vec();
        Ok(bytes)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .with_context(|| format!("failed to delete blob {path}"))?;
        Ok(())
    }

    async fn temporary_url(
        &self,
        path: &str,
        download_name: &str,
        expires_in: Duration,
    ) -> Result<String> {
        let presign_config = PresigningConfig::builder()
            .expires_in(expires_in)
            .build()
            .context("failed to build presigning config")?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .set_response_content_disposition(attachment_disposition(download_name))
            .presigned(presign_config)
            .await
            .with_context(|| format!("failed to presign blob {path}"))?;
        Ok(presigned.uri().to_string())
    }
}

fn attachment_disposition(filename: &str) -> Option<String> {
    if filename.is_empty() {
        return None;
    }

    let sanitized: String = filename
        .chars()
        .map(|ch| match ch {
            '"' | '\\' => '_',
            _ => ch,
        })
        .collect();

    let encoded =
        percent_encoding::utf8_percent_encode(&sanitized, percent_encoding::NON_ALPHANUMERIC);
    Some(format!(
        "attachment; filename=\"{sanitized}\"; filename*=UTF-8''{encoded}"
    ))
}

pub async fn build_client(config: &AppConfig) -> Result<S3Client> {
    let region = Region::new(config.aws_region.clone());
    let region_provider = RegionProviderChain::first_try(Some(region))
        .or_default_provider()
        .or_else("us-east-1");

    #[allow(deprecated)]
    let mut loader = aws_config::from_env().region(region_provider);

    if let Some(endpoint) = &config.aws_endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }

    if let (Some(access_key), Some(secret_key)) = (
        config.aws_access_key_id.clone(),
        config.aws_secret_access_key.clone(),
    ) {
        let credentials = Credentials::new(access_key, secret_key, None, None, "env-static");
        loader = loader.credentials_provider(credentials);
    }

    let shared = loader.load().await;
    let s3_config = S3ConfigBuilder::from(&shared).force_path_style(true).build();
    Ok(S3Client::from_conf(s3_config))
}
