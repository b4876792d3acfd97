/// Job-level failure taxonomy.
///
/// Every stage of a job reports through one of these variants. The
/// `Display` text is what the caller sees in the `{"error": ...}` body.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Invalid job input: {0}")]
    InvalidInput(String),

    #[error("ComfyUI server at {host} not reachable after {waited_secs:.1}s")]
    ReadinessTimeout { host: String, waited_secs: f64 },

    #[error("Workflow submission failed: {0}")]
    Submission(String),

    #[error("No completion signal for prompt {prompt_id} within {waited_secs:.1}s")]
    WatchTimeout { prompt_id: String, waited_secs: f64 },

    #[error("WebSocket connection failed: {0}")]
    WatchConnection(String),

    #[error("History for prompt {prompt_id} not found")]
    HistoryNotFound { prompt_id: String },

    #[error("Failed to fetch artifact {filename}: {reason}")]
    ArtifactFetch { filename: String, reason: String },

    #[error("Failed to upload artifact {filename}: {reason}")]
    ArtifactUpload { filename: String, reason: String },
}
