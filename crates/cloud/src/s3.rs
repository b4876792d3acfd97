//! S3-compatible implementation of [`ArtifactUploader`].
//!
//! Works against AWS S3 and S3-compatible endpoints (R2, MinIO, ...) by
//! forcing path-style addressing on the configured endpoint. The returned
//! URL is a presigned `GET` for the uploaded object.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use comfyrun_core::config::BucketCredentials;

use crate::uploader::{content_type_for, object_key, ArtifactUploader, UploadError};

/// Lifetime of the presigned download URL (7 days, the SigV4 maximum).
pub const PRESIGNED_URL_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Provider name attached to the static credentials.
const CREDENTIALS_PROVIDER: &str = "comfyrun-bucket-env";

/// Uploads artifacts with `PutObject` and hands back a presigned URL.
#[derive(Debug, Clone)]
pub struct S3Uploader {
    url_ttl: Duration,
}

impl Default for S3Uploader {
    fn default() -> Self {
        Self {
            url_ttl: PRESIGNED_URL_TTL,
        }
    }
}

impl S3Uploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an S3 client for the given bucket credentials.
    pub async fn client_for(credentials: &BucketCredentials) -> aws_sdk_s3::Client {
        let static_credentials = Credentials::new(
            credentials.access_id.clone(),
            credentials.access_secret.clone(),
            None,
            None,
            CREDENTIALS_PROVIDER,
        );

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(credentials.region.clone()))
            .endpoint_url(credentials.endpoint_url.clone())
            .credentials_provider(static_credentials)
            .load()
            .await;

        let config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(true)
            .build();

        aws_sdk_s3::Client::from_conf(config)
    }

    /// Presigned `GET` URL for an object.
    pub async fn presign_get(
        &self,
        client: &aws_sdk_s3::Client,
        bucket_name: &str,
        key: &str,
    ) -> Result<String, UploadError> {
        let presigning = PresigningConfig::expires_in(self.url_ttl).map_err(|e| {
            UploadError::Presign {
                key: key.to_string(),
                reason: e.to_string(),
            }
        })?;

        let request = client
            .get_object()
            .bucket(bucket_name)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| UploadError::Presign {
                key: key.to_string(),
                reason: DisplayErrorContext(e).to_string(),
            })?;

        Ok(request.uri().to_string())
    }
}

#[async_trait]
impl ArtifactUploader for S3Uploader {
    async fn upload_file(
        &self,
        file_name: &str,
        file_path: &Path,
        credentials: &BucketCredentials,
        bucket_name: &str,
        prefix: &str,
    ) -> Result<String, UploadError> {
        let key = object_key(prefix, file_name);
        let client = Self::client_for(credentials).await;

        let body = ByteStream::from_path(file_path)
            .await
            .map_err(|e| UploadError::Read {
                path: file_path.display().to_string(),
                reason: e.to_string(),
            })?;

        client
            .put_object()
            .bucket(bucket_name)
            .key(&key)
            .content_type(content_type_for(file_name))
            .body(body)
            .send()
            .await
            .map_err(|e| UploadError::PutObject {
                key: key.clone(),
                reason: DisplayErrorContext(e).to_string(),
            })?;

        tracing::info!(
            bucket = bucket_name,
            key = %key,
            endpoint_url = %credentials.endpoint_url,
            "Uploaded artifact to bucket",
        );

        self.presign_get(&client, bucket_name, &key).await
    }
}
