use std::path::Path;

use async_trait::async_trait;
use comfyrun_core::config::BucketCredentials;

/// Errors from an upload attempt.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Upload of {key} failed: {reason}")]
    PutObject { key: String, reason: String },

    #[error("Failed to sign URL for {key}: {reason}")]
    Presign { key: String, reason: String },
}

/// Uploads a local file to object storage and returns a URL for it.
#[async_trait]
pub trait ArtifactUploader: Send + Sync {
    /// Upload `file_path` as `{prefix}/{file_name}` into `bucket_name`.
    async fn upload_file(
        &self,
        file_name: &str,
        file_path: &Path,
        credentials: &BucketCredentials,
        bucket_name: &str,
        prefix: &str,
    ) -> Result<String, UploadError>;
}

/// Object key for an uploaded artifact. An empty prefix stores the file
/// at the bucket root.
pub fn object_key(prefix: &str, file_name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        file_name.to_string()
    } else {
        format!("{prefix}/{file_name}")
    }
}

/// Content type inferred from the file extension.
pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}
