//! Backblaze B2 uploads through the bucket's S3-compatible endpoint.
//!
//! The store is built and the bucket checked once when the relay starts;
//! every invocation reuses it.

use std::path::Path;
use std::time::Instant;

use bytes::Bytes;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStoreExt, PutPayload, RetryConfig};

use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};

/// A file that landed in the bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub bucket_name: String,
    pub e_tag: Option<String>,
    pub content_length: u64,
}

/// Result of an upload. Failures are reported, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded(UploadedFile),
    Failed(String),
}

/// Handle on one B2 bucket.
pub struct B2Bucket {
    store: AmazonS3,
    config: StorageConfig,
}

impl B2Bucket {
    /// Builds the S3 client from the B2 key pair and checks that the key can
    /// list the named bucket.
    pub async fn connect(config: StorageConfig) -> StorageResult<Self> {
        // Uploads are attempted once; a failure is reported to the caller.
        let retry = RetryConfig {
            max_retries: 0,
            ..Default::default()
        };

        let store = AmazonS3Builder::new()
            .with_endpoint(config.endpoint.clone())
            .with_allow_http(config.endpoint.starts_with("http://"))
            .with_region(config.region.clone())
            .with_bucket_name(config.bucket_name.clone())
            .with_access_key_id(config.account_id.clone())
            .with_secret_access_key(config.application_key.clone())
            .with_retry(retry)
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        object_store::ObjectStore::list_with_delimiter(&store, None)
            .await
            .map_err(|e| match e {
                ObjectStoreError::NotFound { .. } => {
                    StorageError::BucketNotFound(config.bucket_name.clone())
                }
                other => StorageError::BackendError(other.to_string()),
            })?;

        tracing::info!(
            bucket = %config.bucket_name,
            endpoint = %config.endpoint,
            "Connected to B2 bucket"
        );

        Ok(Self { store, config })
    }

    pub fn name(&self) -> &str {
        &self.config.bucket_name
    }

    /// Public download URL of an uploaded file.
    pub fn public_url(&self, file: &UploadedFile) -> String {
        format!(
            "{}/file/{}/{}",
            self.config.public_url_base, file.bucket_name, file.file_name
        )
    }

    /// Uploads the file at `path`. The object name is the file's base name
    /// unless `file_name` overrides it.
    pub async fn upload_file(&self, path: &Path, file_name: Option<&str>) -> UploadOutcome {
        let file_name = match file_name.or_else(|| path.file_name().and_then(|n| n.to_str())) {
            Some(name) => name.to_string(),
            None => {
                let reason = format!("no usable file name for {}", path.display());
                tracing::error!(path = %path.display(), "Failed to upload to B2: {}", reason);
                return UploadOutcome::Failed(reason);
            }
        };

        tracing::info!(file_name = %file_name, bucket = %self.name(), "Uploading to B2");

        match self.try_upload(path, &file_name).await {
            Ok(file) => UploadOutcome::Uploaded(file),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    file_name = %file_name,
                    bucket = %self.name(),
                    "Failed to upload to B2"
                );
                UploadOutcome::Failed(e.to_string())
            }
        }
    }

    async fn try_upload(&self, path: &Path, file_name: &str) -> StorageResult<UploadedFile> {
        let data = tokio::fs::read(path).await?;
        let size = data.len() as u64;
        let location = ObjectPath::from(file_name);
        let start = Instant::now();

        let result = self
            .store
            .put(&location, PutPayload::from(Bytes::from(data)))
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        tracing::info!(
            bucket = %self.name(),
            key = %location,
            size_bytes = size,
            duration = ?start.elapsed(),
            "Upload successful"
        );

        Ok(UploadedFile {
            file_name: file_name.to_string(),
            bucket_name: self.config.bucket_name.clone(),
            e_tag: result.e_tag,
            content_length: size,
        })
    }
}
