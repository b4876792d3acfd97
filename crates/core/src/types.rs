//! Inbound job contract and per-artifact output records.

use serde::{Deserialize, Serialize};

/// A single job handed to the worker by the hosting platform.
#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    /// Platform-assigned job identifier. Used as the upload prefix.
    pub id: String,
    pub input: JobInput,
}

/// Job payload. Only the workflow is consumed.
#[derive(Debug, Clone, Deserialize)]
pub struct JobInput {
    /// ComfyUI API-format workflow graph. Missing or `null` is rejected
    /// by the runner before anything is sent to the server.
    #[serde(default)]
    pub workflow: serde_json::Value,
}

/// How the artifact bytes are carried in an [`OutputRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputKind {
    /// `data` holds the standard base64 encoding of the artifact bytes.
    #[serde(rename = "base64")]
    Base64,
    /// `data` holds a URL to the uploaded object.
    #[serde(rename = "s3_url")]
    S3Url,
}

/// One produced artifact, as returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub filename: String,
    #[serde(rename = "type")]
    pub kind: OutputKind,
    pub data: String,
}

/// Successful job result.
///
/// The `images` field carries video artifacts too.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutput {
    pub images: Vec<OutputRecord>,
}
