//! `comfyrun-worker` -- run one ComfyUI job and print its result.
//!
//! Reads a job document (`{"id": ..., "input": {"workflow": {...}}}`)
//! from the file named by the first argument, or from stdin, and writes
//! the JSON response to stdout. Logs go to stderr.
//!
//! # Environment variables
//!
//! | Variable                      | Required | Default          | Description                      |
//! |-------------------------------|----------|------------------|----------------------------------|
//! | `COMFY_HOST`                  | no       | `127.0.0.1:8188` | ComfyUI `host:port`              |
//! | `COMFY_READY_TIMEOUT_SECS`    | no       | `30`             | Readiness wait budget            |
//! | `COMFY_WATCH_TIMEOUT_SECS`    | no       | `600`            | Completion wait budget           |
//! | `COMFY_HTTP_TIMEOUT_SECS`     | no       | `30`             | Timeout for ComfyUI API calls    |
//! | `COMFY_DOWNLOAD_TIMEOUT_SECS` | no       | `600`            | Timeout for one `/view` download |
//! | `BUCKET_ENDPOINT_URL`         | no       | --               | Enables upload delivery when set |

use std::sync::Arc;

use comfyrun_cloud::S3Uploader;
use comfyrun_core::config::WorkerConfig;
use comfyrun_core::types::Job;
use comfyrun_worker::response::JobResponse;
use comfyrun_worker::runner::JobRunner;
use tokio::io::AsyncReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "comfyrun_worker=info,comfyrun_comfyui=info,comfyrun_cloud=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = WorkerConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });

    tracing::info!(
        comfy_host = %config.comfy_host,
        upload_mode = config.bucket.is_some(),
        "Loaded worker configuration",
    );

    let runner = JobRunner::new(config, Arc::new(S3Uploader::new())).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build ComfyUI client");
        std::process::exit(1);
    });

    let raw = read_job_document().await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to read job document");
        std::process::exit(1);
    });

    let job: Job = serde_json::from_str(&raw).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Job document is not valid JSON");
        std::process::exit(1);
    });

    let response = JobResponse::from(runner.run(&job).await);
    if response.is_error() {
        tracing::warn!(job_id = %job.id, "Job finished with an error response");
    }

    match serde_json::to_string(&response) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize response");
            std::process::exit(1);
        }
    }
}

/// First CLI argument is a path to the job JSON; otherwise read stdin.
async fn read_job_document() -> std::io::Result<String> {
    match std::env::args().nth(1) {
        Some(path) => tokio::fs::read_to_string(path).await,
        None => {
            let mut raw = String::new();
            tokio::io::stdin().read_to_string(&mut raw).await?;
            Ok(raw)
        }
    }
}
