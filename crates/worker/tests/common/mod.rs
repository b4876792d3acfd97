//! In-process fake ComfyUI server and recording uploaders for the
//! job runner integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use comfyrun_cloud::{ArtifactUploader, UploadError};
use comfyrun_core::config::{BucketCredentials, WorkerConfig};
use comfyrun_core::types::Job;
use comfyrun_worker::runner::JobRunner;
use tokio::sync::Notify;

pub const QUEUE_EMPTY: &str =
    r#"{"type":"status","data":{"status":{"exec_info":{"queue_remaining":0}}}}"#;

pub fn finished(prompt_id: &str) -> String {
    format!(r#"{{"type":"executing","data":{{"node":null,"prompt_id":"{prompt_id}"}}}}"#)
}

/// A frame the fake server pushes after the workflow is submitted.
#[derive(Clone)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// Scripted behaviour of the fake server.
pub struct Script {
    pub prompt_status: StatusCode,
    pub prompt_body: serde_json::Value,
    pub frames: Vec<Frame>,
    pub history_status: StatusCode,
    pub history: serde_json::Value,
    pub files: HashMap<String, Vec<u8>>,
}

impl Script {
    /// Happy path: `p1` finishes after a queue-empty status message.
    pub fn completing(history: serde_json::Value, files: &[(&str, &[u8])]) -> Self {
        Self {
            prompt_status: StatusCode::OK,
            prompt_body: serde_json::json!({"prompt_id": "p1", "number": 0, "node_errors": {}}),
            frames: vec![Frame::Text(QUEUE_EMPTY.into()), Frame::Text(finished("p1"))],
            history_status: StatusCode::OK,
            history,
            files: files
                .iter()
                .map(|(name, data)| (name.to_string(), data.to_vec()))
                .collect(),
        }
    }
}

/// Observations made by the fake server.
#[derive(Default)]
pub struct Seen {
    pub ws_client_ids: Mutex<Vec<String>>,
    pub prompt_bodies: Mutex<Vec<serde_json::Value>>,
    pub history_requests: AtomicUsize,
    pub view_queries: Mutex<Vec<HashMap<String, String>>>,
}

struct FakeState {
    script: Script,
    seen: Arc<Seen>,
    submitted: Notify,
}

pub struct FakeComfy {
    pub host: String,
    pub seen: Arc<Seen>,
}

impl FakeComfy {
    pub async fn start(script: Script) -> Self {
        let seen = Arc::new(Seen::default());
        let state = Arc::new(FakeState {
            script,
            seen: Arc::clone(&seen),
            submitted: Notify::new(),
        });

        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .route("/prompt", post(submit))
            .route("/history/{prompt_id}", get(history))
            .route("/view", get(view))
            .route("/ws", get(ws_upgrade))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            host: addr.to_string(),
            seen,
        }
    }

    pub fn history_requests(&self) -> usize {
        self.seen.history_requests.load(Ordering::SeqCst)
    }
}

async fn submit(
    State(state): State<Arc<FakeState>>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    state.seen.prompt_bodies.lock().unwrap().push(body);
    state.submitted.notify_one();
    (state.script.prompt_status, Json(state.script.prompt_body.clone())).into_response()
}

async fn history(
    State(state): State<Arc<FakeState>>,
    UrlPath(_prompt_id): UrlPath<String>,
) -> Response {
    state.seen.history_requests.fetch_add(1, Ordering::SeqCst);
    (state.script.history_status, Json(state.script.history.clone())).into_response()
}

async fn view(
    State(state): State<Arc<FakeState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let file = query
        .get("filename")
        .and_then(|name| state.script.files.get(name))
        .cloned();
    state.seen.view_queries.lock().unwrap().push(query);
    match file {
        Some(bytes) => bytes.into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<FakeState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Some(client_id) = query.get("clientId") {
        state.seen.ws_client_ids.lock().unwrap().push(client_id.clone());
    }
    ws.on_upgrade(move |socket| push_frames(socket, state))
}

async fn push_frames(mut socket: WebSocket, state: Arc<FakeState>) {
    state.submitted.notified().await;
    for frame in &state.script.frames {
        let msg = match frame {
            Frame::Text(text) => Message::Text(text.clone().into()),
            Frame::Binary(bytes) => Message::Binary(bytes.clone().into()),
        };
        if socket.send(msg).await.is_err() {
            return;
        }
    }
    while let Some(Ok(_)) = socket.recv().await {}
}

/// Runner configuration pointing at `host` with short test timeouts.
pub fn test_config(host: &str, bucket: Option<BucketCredentials>) -> WorkerConfig {
    WorkerConfig {
        comfy_host: host.to_string(),
        ready_interval: Duration::from_millis(10),
        ready_timeout: Duration::from_secs(2),
        watch_timeout: Duration::from_secs(2),
        http_timeout: Duration::from_secs(5),
        download_timeout: Duration::from_secs(5),
        bucket,
    }
}

pub fn test_bucket() -> BucketCredentials {
    BucketCredentials {
        endpoint_url: "https://test-bucket-url".into(),
        access_id: "test-key".into(),
        access_secret: "test-secret".into(),
        bucket_name: "test-bucket".into(),
        region: "us-east-1".into(),
    }
}

pub fn runner(config: WorkerConfig, uploader: Arc<dyn ArtifactUploader>) -> JobRunner {
    JobRunner::new(config, uploader).unwrap()
}

pub fn job(id: &str) -> Job {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "input": {"workflow": {"3": {"class_type": "KSampler", "inputs": {"seed": 1}}}}
    }))
    .unwrap()
}

/// One observed upload call.
#[derive(Debug, Clone)]
pub struct UploadCall {
    pub file_name: String,
    pub file_path: PathBuf,
    pub contents: Vec<u8>,
    pub credentials: BucketCredentials,
    pub bucket_name: String,
    pub prefix: String,
}

/// Uploader that records each call and returns a path-style URL.
#[derive(Default)]
pub struct RecordingUploader {
    pub calls: Mutex<Vec<UploadCall>>,
    pub fail: bool,
}

impl RecordingUploader {
    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn calls(&self) -> Vec<UploadCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactUploader for RecordingUploader {
    async fn upload_file(
        &self,
        file_name: &str,
        file_path: &Path,
        credentials: &BucketCredentials,
        bucket_name: &str,
        prefix: &str,
    ) -> Result<String, UploadError> {
        let contents = std::fs::read(file_path).expect("staged file should exist during upload");
        self.calls.lock().unwrap().push(UploadCall {
            file_name: file_name.to_string(),
            file_path: file_path.to_path_buf(),
            contents,
            credentials: credentials.clone(),
            bucket_name: bucket_name.to_string(),
            prefix: prefix.to_string(),
        });

        if self.fail {
            return Err(UploadError::PutObject {
                key: format!("{prefix}/{file_name}"),
                reason: "access denied".into(),
            });
        }

        Ok(format!(
            "{}/{bucket_name}/{prefix}/{file_name}",
            credentials.endpoint_url
        ))
    }
}
