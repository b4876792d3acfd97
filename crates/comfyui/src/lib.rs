//! ComfyUI WebSocket and REST client library.
//!
//! Provides the HTTP API wrapper, the WebSocket connection, typed
//! message parsing, the readiness check, the completion watcher and
//! history output parsing used to run one workflow to completion.

pub mod api;
pub mod client;
pub mod history;
pub mod messages;
pub mod readiness;
pub mod watcher;
