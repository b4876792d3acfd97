//! Wire shape returned to the hosting platform.

use comfyrun_core::error::JobError;
use comfyrun_core::types::JobOutput;
use serde::Serialize;

/// Either `{"images": [...]}` or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum JobResponse {
    Success(JobOutput),
    Failure { error: String },
}

impl From<Result<JobOutput, JobError>> for JobResponse {
    fn from(result: Result<JobOutput, JobError>) -> Self {
        match result {
            Ok(output) => Self::Success(output),
            Err(e) => Self::Failure {
                error: e.to_string(),
            },
        }
    }
}

impl JobResponse {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }
}

#[cfg(test)]
mod tests {
    use comfyrun_core::types::{OutputKind, OutputRecord};

    use super::*;

    #[test]
    fn success_serializes_as_images_list() {
        let response = JobResponse::from(Ok(JobOutput {
            images: vec![OutputRecord {
                filename: "clip.mp4".into(),
                kind: OutputKind::Base64,
                data: "Ynl0ZXM=".into(),
            }],
        }));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({"images": [{"filename": "clip.mp4", "type": "base64", "data": "Ynl0ZXM="}]})
        );
    }

    #[test]
    fn failure_serializes_as_flat_error() {
        let response = JobResponse::from(Err(JobError::HistoryNotFound {
            prompt_id: "p1".into(),
        }));
        assert!(response.is_error());
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({"error": "History for prompt p1 not found"})
        );
    }
}
