//! Artifact retrieval and delivery for a finished prompt.
//!
//! Reads the prompt's history record, downloads every referenced file via
//! `/view` and turns each into an [`OutputRecord`]: base64 inline when no
//! bucket is configured, otherwise an uploaded-object URL.

use std::io::Write;

use base64::Engine;
use comfyrun_cloud::ArtifactUploader;
use comfyrun_comfyui::api::ComfyUIApi;
use comfyrun_comfyui::history::{extract_artifacts, ArtifactDescriptor};
use comfyrun_core::config::BucketCredentials;
use comfyrun_core::error::JobError;
use comfyrun_core::types::{JobOutput, OutputKind, OutputRecord};

/// Collects and delivers the artifacts of one finished prompt.
pub struct ArtifactCollector<'a> {
    api: &'a ComfyUIApi,
    bucket: Option<&'a BucketCredentials>,
    uploader: &'a dyn ArtifactUploader,
}

impl<'a> ArtifactCollector<'a> {
    /// `bucket` selects the delivery mode for every artifact of the job.
    pub fn new(
        api: &'a ComfyUIApi,
        bucket: Option<&'a BucketCredentials>,
        uploader: &'a dyn ArtifactUploader,
    ) -> Self {
        Self {
            api,
            bucket,
            uploader,
        }
    }

    /// Fetch and deliver every artifact of `prompt_id`, in discovery order.
    pub async fn collect(&self, job_id: &str, prompt_id: &str) -> Result<JobOutput, JobError> {
        let history = self
            .api
            .get_history(prompt_id)
            .await
            .map_err(|e| {
                tracing::error!(job_id, prompt_id, error = %e, "History request failed");
                JobError::HistoryNotFound {
                    prompt_id: prompt_id.to_string(),
                }
            })?;

        let artifacts =
            extract_artifacts(&history, prompt_id).ok_or_else(|| JobError::HistoryNotFound {
                prompt_id: prompt_id.to_string(),
            })?;

        if artifacts.is_empty() {
            tracing::warn!(job_id, prompt_id, "Prompt finished without producing artifacts");
        }

        let mut images = Vec::with_capacity(artifacts.len());
        for artifact in &artifacts {
            let bytes = self
                .api
                .view(artifact)
                .await
                .map_err(|e| JobError::ArtifactFetch {
                    filename: artifact.filename.clone(),
                    reason: e.to_string(),
                })?;

            tracing::debug!(
                job_id,
                filename = %artifact.filename,
                size = bytes.len(),
                "Fetched artifact",
            );

            images.push(self.deliver(job_id, artifact, &bytes).await?);
        }

        tracing::info!(job_id, prompt_id, count = images.len(), "Collected artifacts");
        Ok(JobOutput { images })
    }

    async fn deliver(
        &self,
        job_id: &str,
        artifact: &ArtifactDescriptor,
        bytes: &[u8],
    ) -> Result<OutputRecord, JobError> {
        match self.bucket {
            Some(credentials) => {
                let url = self.upload(job_id, artifact, bytes, credentials).await?;
                Ok(OutputRecord {
                    filename: artifact.filename.clone(),
                    kind: OutputKind::S3Url,
                    data: url,
                })
            }
            None => Ok(OutputRecord {
                filename: artifact.filename.clone(),
                kind: OutputKind::Base64,
                data: base64::engine::general_purpose::STANDARD.encode(bytes),
            }),
        }
    }

    /// Stage the bytes in a temporary file and hand it to the uploader.
    ///
    /// The temporary file is removed whether or not the upload succeeds.
    async fn upload(
        &self,
        job_id: &str,
        artifact: &ArtifactDescriptor,
        bytes: &[u8],
        credentials: &BucketCredentials,
    ) -> Result<String, JobError> {
        let upload_error = |reason: String| JobError::ArtifactUpload {
            filename: artifact.filename.clone(),
            reason,
        };

        let suffix = artifact
            .filename
            .rsplit_once('.')
            .map(|(_, ext)| format!(".{ext}"))
            .unwrap_or_default();

        let mut staged = tempfile::Builder::new()
            .prefix("comfyrun-")
            .suffix(&suffix)
            .tempfile()
            .map_err(|e| upload_error(format!("failed to create temporary file: {e}")))?;
        staged
            .write_all(bytes)
            .and_then(|()| staged.flush())
            .map_err(|e| upload_error(format!("failed to write temporary file: {e}")))?;

        let result = self
            .uploader
            .upload_file(
                &artifact.filename,
                staged.path(),
                credentials,
                &credentials.bucket_name,
                job_id,
            )
            .await;

        if let Err(e) = staged.close() {
            tracing::warn!(job_id, filename = %artifact.filename, error = %e, "Failed to remove temporary file");
        }

        result.map_err(|e| {
            tracing::error!(job_id, filename = %artifact.filename, error = %e, "Artifact upload failed");
            upload_error(e.to_string())
        })
    }
}
