//! ComfyUI WebSocket message types and parser.
//!
//! Text frames have the shape `{"type": "<kind>", "data": {...}}`.
//! Only the kinds the completion watcher reacts to are modelled.

use serde::Deserialize;

/// Known ComfyUI WebSocket message kinds.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ComfyUIMessage {
    /// Server status broadcast (queue depth).
    #[serde(rename = "status")]
    Status(StatusData),

    /// A prompt has started executing.
    #[serde(rename = "execution_start")]
    ExecutionStart(PromptRef),

    /// Some nodes were skipped because their outputs are cached.
    #[serde(rename = "execution_cached")]
    ExecutionCached(ExecutionCachedData),

    /// A node is executing, or the prompt finished when `node` is `None`.
    #[serde(rename = "executing")]
    Executing(ExecutingData),

    /// Step progress from a long-running node (e.g. KSampler).
    #[serde(rename = "progress")]
    Progress(ProgressData),

    /// A node finished and produced output.
    #[serde(rename = "executed")]
    Executed(ExecutedData),

    /// Execution failed inside a node.
    #[serde(rename = "execution_error")]
    ExecutionError(ErrorData),
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusData {
    pub status: QueueStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueStatus {
    pub exec_info: ExecInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecInfo {
    pub queue_remaining: i32,
}

/// Payload carrying only the prompt id.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptRef {
    pub prompt_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionCachedData {
    pub prompt_id: String,
    #[serde(default)]
    pub nodes: Vec<String>,
}

/// Payload for `executing` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutingData {
    pub node: Option<String>,
    #[serde(default)]
    pub prompt_id: Option<String>,
}

impl ExecutingData {
    /// True when this message reports that `prompt_id` has no nodes left.
    pub fn is_finished_for(&self, prompt_id: &str) -> bool {
        self.node.is_none() && self.prompt_id.as_deref() == Some(prompt_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgressData {
    pub value: i32,
    pub max: i32,
    #[serde(default)]
    pub prompt_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutedData {
    pub node: String,
    pub output: serde_json::Value,
    pub prompt_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorData {
    pub prompt_id: String,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub exception_message: String,
    #[serde(default)]
    pub exception_type: String,
}

/// Parse a ComfyUI WebSocket text message into a typed enum.
///
/// Returns `Err` for malformed JSON or kinds not listed above
/// (custom-node broadcasts, `progress_state`, ...).
pub fn parse_message(text: &str) -> Result<ComfyUIMessage, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_with_empty_queue() {
        let json = r#"{"type":"status","data":{"status":{"exec_info":{"queue_remaining":0}},"sid":"abc"}}"#;
        match parse_message(json).unwrap() {
            ComfyUIMessage::Status(data) => assert_eq!(data.status.exec_info.queue_remaining, 0),
            other => panic!("Expected Status, got {other:?}"),
        }
    }

    #[test]
    fn executing_null_node_is_finished_only_for_its_prompt() {
        let json = r#"{"type":"executing","data":{"node":null,"display_node":null,"prompt_id":"p1"}}"#;
        match parse_message(json).unwrap() {
            ComfyUIMessage::Executing(data) => {
                assert!(data.is_finished_for("p1"));
                assert!(!data.is_finished_for("p2"));
            }
            other => panic!("Expected Executing, got {other:?}"),
        }
    }

    #[test]
    fn executing_a_node_is_not_finished() {
        let json = r#"{"type":"executing","data":{"node":"42","prompt_id":"p1"}}"#;
        match parse_message(json).unwrap() {
            ComfyUIMessage::Executing(data) => {
                assert_eq!(data.node.as_deref(), Some("42"));
                assert!(!data.is_finished_for("p1"));
            }
            other => panic!("Expected Executing, got {other:?}"),
        }
    }

    #[test]
    fn executing_without_prompt_id_never_finishes() {
        let json = r#"{"type":"executing","data":{"node":null}}"#;
        match parse_message(json).unwrap() {
            ComfyUIMessage::Executing(data) => assert!(!data.is_finished_for("p1")),
            other => panic!("Expected Executing, got {other:?}"),
        }
    }

    #[test]
    fn progress_and_cached_messages() {
        let json = r#"{"type":"progress","data":{"value":5,"max":20,"prompt_id":"p1","node":"3"}}"#;
        match parse_message(json).unwrap() {
            ComfyUIMessage::Progress(data) => assert_eq!((data.value, data.max), (5, 20)),
            other => panic!("Expected Progress, got {other:?}"),
        }

        let json = r#"{"type":"execution_cached","data":{"prompt_id":"p1"}}"#;
        match parse_message(json).unwrap() {
            ComfyUIMessage::ExecutionCached(data) => assert!(data.nodes.is_empty()),
            other => panic!("Expected ExecutionCached, got {other:?}"),
        }
    }

    #[test]
    fn execution_error_fields() {
        let json = r#"{"type":"execution_error","data":{"prompt_id":"p1","node_id":"5","node_type":"KSampler","exception_message":"out of memory","exception_type":"RuntimeError","traceback":[]}}"#;
        match parse_message(json).unwrap() {
            ComfyUIMessage::ExecutionError(data) => {
                assert_eq!(data.prompt_id, "p1");
                assert_eq!(data.node_id.as_deref(), Some("5"));
                assert_eq!(data.exception_message, "out of memory");
            }
            other => panic!("Expected ExecutionError, got {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_and_garbage_are_errors() {
        assert!(parse_message(r#"{"type":"crystools.monitor","data":{}}"#).is_err());
        assert!(parse_message("not json at all").is_err());
    }
}
