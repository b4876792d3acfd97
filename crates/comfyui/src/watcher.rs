//! Completion detection over a ComfyUI WebSocket.
//!
//! [`CompletionWatcher`] tracks a single prompt. It stays in
//! [`WatchState::Waiting`] until an `executing` message with no node
//! arrives for that prompt, then moves to [`WatchState::Finished`].
//! An empty queue in a `status` broadcast does not finish the wait.

use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio_tungstenite::tungstenite::{self, Message};

use crate::messages::{parse_message, ComfyUIMessage};

/// Watcher state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Waiting,
    Finished,
}

/// Errors that end a watch before the prompt finished.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("no completion message within {:.1}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("WebSocket closed before the prompt finished")]
    Closed,

    #[error("WebSocket receive error: {0}")]
    Receive(String),
}

/// Tracks one prompt until ComfyUI reports it finished.
#[derive(Debug)]
pub struct CompletionWatcher {
    prompt_id: String,
    state: WatchState,
    execution_error: Option<String>,
}

impl CompletionWatcher {
    pub fn new(prompt_id: impl Into<String>) -> Self {
        Self {
            prompt_id: prompt_id.into(),
            state: WatchState::Waiting,
            execution_error: None,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    /// Exception message of an `execution_error` seen for this prompt.
    pub fn execution_error(&self) -> Option<&str> {
        self.execution_error.as_deref()
    }

    /// Apply one parsed message and return the resulting state.
    pub fn handle_message(&mut self, msg: &ComfyUIMessage) -> WatchState {
        if self.state == WatchState::Finished {
            return self.state;
        }

        match msg {
            ComfyUIMessage::Status(data) => {
                // An empty queue says nothing about whether our outputs are written.
                tracing::debug!(
                    prompt_id = %self.prompt_id,
                    queue_remaining = data.status.exec_info.queue_remaining,
                    "ComfyUI queue status",
                );
            }
            ComfyUIMessage::Executing(data) => {
                if data.is_finished_for(&self.prompt_id) {
                    tracing::info!(prompt_id = %self.prompt_id, "Execution completed (all nodes done)");
                    self.state = WatchState::Finished;
                } else if let Some(node) = data.node.as_deref() {
                    tracing::debug!(prompt_id = ?data.prompt_id, node, "Executing node");
                }
            }
            ComfyUIMessage::ExecutionStart(data) if data.prompt_id == self.prompt_id => {
                tracing::info!(prompt_id = %self.prompt_id, "Execution started");
            }
            ComfyUIMessage::ExecutionCached(data) if data.prompt_id == self.prompt_id => {
                tracing::debug!(
                    prompt_id = %self.prompt_id,
                    cached_nodes = data.nodes.len(),
                    "Execution used cache",
                );
            }
            ComfyUIMessage::Progress(data) => {
                let percent = if data.max > 0 {
                    ((data.value as f64 / data.max as f64) * 100.0) as i16
                } else {
                    0
                };
                tracing::debug!(value = data.value, max = data.max, percent, "Generation progress");
            }
            ComfyUIMessage::Executed(data) if data.prompt_id == self.prompt_id => {
                tracing::debug!(prompt_id = %self.prompt_id, node = %data.node, "Node executed with output");
            }
            ComfyUIMessage::ExecutionError(data) if data.prompt_id == self.prompt_id => {
                tracing::error!(
                    prompt_id = %self.prompt_id,
                    node_id = ?data.node_id,
                    error_type = %data.exception_type,
                    error_message = %data.exception_message,
                    "Execution error",
                );
                self.execution_error = Some(data.exception_message.clone());
            }
            _ => {}
        }

        self.state
    }

    /// Parse and apply one text frame. Unknown kinds are ignored.
    pub fn handle_text(&mut self, text: &str) -> WatchState {
        match parse_message(text) {
            Ok(msg) => self.handle_message(&msg),
            Err(e) => {
                tracing::debug!(error = %e, raw_message = %text, "Ignoring unrecognised ComfyUI message");
                self.state
            }
        }
    }

    /// Read frames from `stream` until the prompt finishes.
    ///
    /// Binary frames (preview images) are skipped. The whole read is
    /// bounded by `max_wait`.
    pub async fn watch<S>(&mut self, stream: &mut S, max_wait: Duration) -> Result<(), WatchError>
    where
        S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    {
        let outcome = tokio::time::timeout(max_wait, self.read_until_finished(stream)).await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    prompt_id = %self.prompt_id,
                    max_wait_ms = max_wait.as_millis() as u64,
                    "Gave up waiting for completion message",
                );
                Err(WatchError::Timeout(max_wait))
            }
        }
    }

    async fn read_until_finished<S>(&mut self, stream: &mut S) -> Result<(), WatchError>
    where
        S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    {
        while let Some(msg_result) = stream.next().await {
            match msg_result {
                Ok(Message::Text(text)) => {
                    if self.handle_text(&text) == WatchState::Finished {
                        return Ok(());
                    }
                }
                Ok(Message::Binary(_)) => {
                    tracing::trace!(prompt_id = %self.prompt_id, "Ignoring binary message (preview image)");
                }
                Ok(Message::Ping(_) | Message::Pong(_)) => {
                    // Handled automatically by tungstenite.
                }
                Ok(Message::Close(frame)) => {
                    tracing::warn!(prompt_id = %self.prompt_id, ?frame, "ComfyUI WebSocket closed");
                    return Err(WatchError::Closed);
                }
                Ok(Message::Frame(_)) => {}
                Err(e) => {
                    tracing::error!(prompt_id = %self.prompt_id, error = %e, "WebSocket receive error");
                    return Err(WatchError::Receive(e.to_string()));
                }
            }
        }

        Err(WatchError::Closed)
    }
}
