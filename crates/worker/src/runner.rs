//! Per-job orchestration.
//!
//! [`JobRunner::run`] drives one job through readiness, WebSocket
//! connect, submission, completion watch and artifact collection,
//! stopping at the first failing stage.

use std::sync::Arc;

use comfyrun_cloud::ArtifactUploader;
use comfyrun_comfyui::api::{ComfyUIApi, ComfyUIApiError};
use comfyrun_comfyui::client::ComfyUIClient;
use comfyrun_comfyui::readiness::wait_until_ready;
use comfyrun_comfyui::watcher::{CompletionWatcher, WatchError};
use comfyrun_core::config::WorkerConfig;
use comfyrun_core::error::JobError;
use comfyrun_core::types::{Job, JobOutput};

use crate::collector::ArtifactCollector;

/// Runs jobs against one ComfyUI server.
///
/// Holds no per-job state; a single runner can serve any number of jobs.
pub struct JobRunner {
    config: WorkerConfig,
    api: ComfyUIApi,
    client: ComfyUIClient,
    uploader: Arc<dyn ArtifactUploader>,
}

impl JobRunner {
    pub fn new(
        config: WorkerConfig,
        uploader: Arc<dyn ArtifactUploader>,
    ) -> Result<Self, ComfyUIApiError> {
        let api = ComfyUIApi::new(config.api_url(), config.http_timeout)?
            .with_download_timeout(config.download_timeout);
        let client = ComfyUIClient::new(config.ws_url());
        Ok(Self {
            config,
            api,
            client,
            uploader,
        })
    }

    /// Run one job to completion.
    pub async fn run(&self, job: &Job) -> Result<JobOutput, JobError> {
        tracing::info!(job_id = %job.id, "Job received");
        validate_input(job)?;

        if !wait_until_ready(&self.api, self.config.ready_interval, self.config.ready_timeout).await
        {
            return Err(JobError::ReadinessTimeout {
                host: self.config.comfy_host.clone(),
                waited_secs: self.config.ready_timeout.as_secs_f64(),
            });
        }

        // Connect before submitting so the completion message cannot be missed.
        let client_id = uuid::Uuid::new_v4().to_string();
        let mut conn = self
            .client
            .connect(&client_id)
            .await
            .map_err(|e| JobError::WatchConnection(e.to_string()))?;

        let queued = match self.api.submit_workflow(&job.input.workflow, &client_id).await {
            Ok(queued) => queued,
            Err(e) => {
                tracing::error!(job_id = %job.id, client_id = %client_id, error = %e, "Workflow submission failed");
                conn.close().await;
                return Err(JobError::Submission(e.to_string()));
            }
        };

        tracing::info!(
            job_id = %job.id,
            client_id = %client_id,
            prompt_id = %queued.prompt_id,
            queue_number = ?queued.number,
            "Workflow submitted to ComfyUI",
        );

        let mut watcher = CompletionWatcher::new(queued.prompt_id.clone());
        let watched = watcher
            .watch(&mut conn.ws_stream, self.config.watch_timeout)
            .await;
        conn.close().await;

        watched.map_err(|e| match e {
            WatchError::Timeout(waited) => JobError::WatchTimeout {
                prompt_id: queued.prompt_id.clone(),
                waited_secs: waited.as_secs_f64(),
            },
            other => JobError::WatchConnection(other.to_string()),
        })?;

        if let Some(message) = watcher.execution_error() {
            tracing::warn!(
                job_id = %job.id,
                prompt_id = %queued.prompt_id,
                error_message = message,
                "Prompt finished after an execution error; collecting whatever was produced",
            );
        }

        let collector = ArtifactCollector::new(
            &self.api,
            self.config.bucket.as_ref(),
            self.uploader.as_ref(),
        );
        let output = collector.collect(&job.id, &queued.prompt_id).await?;

        tracing::info!(job_id = %job.id, artifacts = output.images.len(), "Job completed");
        Ok(output)
    }
}

/// The workflow must be a non-empty JSON object of nodes.
fn validate_input(job: &Job) -> Result<(), JobError> {
    match job.input.workflow.as_object() {
        Some(nodes) if !nodes.is_empty() => Ok(()),
        Some(_) => Err(JobError::InvalidInput("workflow has no nodes".into())),
        None if job.input.workflow.is_null() => {
            Err(JobError::InvalidInput("missing 'workflow' parameter".into()))
        }
        None => Err(JobError::InvalidInput("'workflow' must be a JSON object".into())),
    }
}
