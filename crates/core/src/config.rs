//! Worker configuration loaded once from environment variables.

use std::time::Duration;

/// Default ComfyUI `host:port`.
pub const DEFAULT_COMFY_HOST: &str = "127.0.0.1:8188";

/// Default delay between readiness checks (milliseconds).
pub const DEFAULT_READY_INTERVAL_MS: u64 = 50;

/// Default upper bound on the readiness wait (seconds).
pub const DEFAULT_READY_TIMEOUT_SECS: u64 = 30;

/// Default upper bound on waiting for the completion message (seconds).
pub const DEFAULT_WATCH_TIMEOUT_SECS: u64 = 600;

/// Default per-request HTTP timeout (seconds).
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Default timeout for one whole `/view` artifact download (seconds).
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 600;

/// Region passed to the S3 client when `BUCKET_REGION` is unset.
pub const DEFAULT_BUCKET_REGION: &str = "us-east-1";

/// Object-storage settings. Present only when `BUCKET_ENDPOINT_URL` is
/// set to a non-empty value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketCredentials {
    pub endpoint_url: String,
    pub access_id: String,
    pub access_secret: String,
    pub bucket_name: String,
    pub region: String,
}

/// Process-wide worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// ComfyUI `host:port`, without scheme.
    pub comfy_host: String,
    pub ready_interval: Duration,
    pub ready_timeout: Duration,
    pub watch_timeout: Duration,
    /// Bounds API calls other than artifact downloads.
    pub http_timeout: Duration,
    /// Bounds each `/view` download, body included.
    pub download_timeout: Duration,
    /// `None` selects inline base64 delivery.
    pub bucket: Option<BucketCredentials>,
}

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a non-negative integer, got '{value}'")]
    Invalid { name: &'static str, value: String },
}

impl WorkerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                       | Default          |
    /// |-------------------------------|------------------|
    /// | `COMFY_HOST`                  | `127.0.0.1:8188` |
    /// | `COMFY_READY_INTERVAL_MS`     | `50`             |
    /// | `COMFY_READY_TIMEOUT_SECS`    | `30`             |
    /// | `COMFY_WATCH_TIMEOUT_SECS`    | `600`            |
    /// | `COMFY_HTTP_TIMEOUT_SECS`     | `30`             |
    /// | `COMFY_DOWNLOAD_TIMEOUT_SECS` | `600`            |
    /// | `BUCKET_ENDPOINT_URL`         | unset            |
    /// | `BUCKET_ACCESS_KEY_ID`        | empty            |
    /// | `BUCKET_SECRET_ACCESS_KEY`    | empty            |
    /// | `BUCKET_NAME`                 | empty            |
    /// | `BUCKET_REGION`               | `us-east-1`      |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let comfy_host = lookup("COMFY_HOST")
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| DEFAULT_COMFY_HOST.to_string());

        let ready_interval = Duration::from_millis(parse_u64(
            &lookup,
            "COMFY_READY_INTERVAL_MS",
            DEFAULT_READY_INTERVAL_MS,
        )?);
        let ready_timeout = Duration::from_secs(parse_u64(
            &lookup,
            "COMFY_READY_TIMEOUT_SECS",
            DEFAULT_READY_TIMEOUT_SECS,
        )?);
        let watch_timeout = Duration::from_secs(parse_u64(
            &lookup,
            "COMFY_WATCH_TIMEOUT_SECS",
            DEFAULT_WATCH_TIMEOUT_SECS,
        )?);
        let http_timeout = Duration::from_secs(parse_u64(
            &lookup,
            "COMFY_HTTP_TIMEOUT_SECS",
            DEFAULT_HTTP_TIMEOUT_SECS,
        )?);
        let download_timeout = Duration::from_secs(parse_u64(
            &lookup,
            "COMFY_DOWNLOAD_TIMEOUT_SECS",
            DEFAULT_DOWNLOAD_TIMEOUT_SECS,
        )?);

        let bucket = bucket_from_lookup(&lookup);

        Ok(Self {
            comfy_host,
            ready_interval,
            ready_timeout,
            watch_timeout,
            http_timeout,
            download_timeout,
            bucket,
        })
    }

    /// Base HTTP URL of the ComfyUI server, e.g. `http://127.0.0.1:8188`.
    pub fn api_url(&self) -> String {
        format!("http://{}", self.comfy_host)
    }

    /// Base WebSocket URL of the ComfyUI server, e.g. `ws://127.0.0.1:8188`.
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.comfy_host)
    }
}

fn parse_u64<F>(lookup: &F, name: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}

fn bucket_from_lookup<F>(lookup: &F) -> Option<BucketCredentials>
where
    F: Fn(&str) -> Option<String>,
{
    let endpoint_url = lookup("BUCKET_ENDPOINT_URL")
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())?;

    let field = |name: &str| lookup(name).unwrap_or_default();
    let credentials = BucketCredentials {
        endpoint_url,
        access_id: field("BUCKET_ACCESS_KEY_ID"),
        access_secret: field("BUCKET_SECRET_ACCESS_KEY"),
        bucket_name: field("BUCKET_NAME"),
        region: lookup("BUCKET_REGION")
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BUCKET_REGION.to_string()),
    };

    if credentials.access_id.is_empty()
        || credentials.access_secret.is_empty()
        || credentials.bucket_name.is_empty()
    {
        tracing::warn!(
            endpoint_url = %credentials.endpoint_url,
            "BUCKET_ENDPOINT_URL is set but access key, secret or bucket name is empty",
        );
    }

    Some(credentials)
}
