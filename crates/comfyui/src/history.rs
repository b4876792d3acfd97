//! Artifact discovery in ComfyUI history records.
//!
//! `GET /history/{prompt_id}` returns
//! `{"<prompt_id>": {"outputs": {"<node_id>": {"images": [...], "gifs": [...]}}}}`.
//! Every entry in those lists references one produced file.

use serde::{Deserialize, Serialize};

/// Output categories scanned per node, in this order.
///
/// `images` holds still images; `gifs` and `videos` are where the
/// video-combine style nodes report animated or video outputs.
pub const ARTIFACT_CATEGORIES: &[&str] = &["images", "gifs", "videos"];

/// Reference to one file produced by a ComfyUI node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    /// Storage area on the server (`output`, `temp`, `input`).
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
}

fn default_kind() -> String {
    "output".to_string()
}

/// Collect every artifact referenced by the history record of `prompt_id`.
///
/// Returns `None` when the history body has no record for the prompt.
/// Nodes are visited in document order and, within a node, categories
/// in [`ARTIFACT_CATEGORIES`] order. Entries that do not describe a file
/// are skipped.
pub fn extract_artifacts(
    history: &serde_json::Value,
    prompt_id: &str,
) -> Option<Vec<ArtifactDescriptor>> {
    let record = history.get(prompt_id)?;

    let Some(outputs) = record.get("outputs").and_then(|o| o.as_object()) else {
        return Some(Vec::new());
    };

    let mut artifacts = Vec::new();
    for (node_id, node_output) in outputs {
        for category in ARTIFACT_CATEGORIES {
            let Some(entries) = node_output.get(*category).and_then(|e| e.as_array()) else {
                continue;
            };
            for entry in entries {
                match ArtifactDescriptor::deserialize(entry) {
                    Ok(descriptor) => artifacts.push(descriptor),
                    Err(e) => {
                        tracing::warn!(
                            prompt_id,
                            node_id = %node_id,
                            category,
                            error = %e,
                            "Skipping malformed output entry",
                        );
                    }
                }
            }
        }
    }

    Some(artifacts)
}
