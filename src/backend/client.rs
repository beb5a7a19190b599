use std::time::Duration;

use reqwest::multipart::{Form, Part};
use thiserror::Error;
use tokio::time::{sleep, timeout, Instant};

use crate::models::UploadResponse;
use crate::survey::InstrumentHeight;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Upper bound for one `GET /api/health` request.
const HEALTH_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Upload failed: HTTP {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("Backend response could not be read: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Backend did not become ready within {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `true` when `GET /api/health` answers with a success status.
    pub async fn health(&self) -> Result<bool, BackendError> {
        let response = self
            .http
            .get(self.url("/api/health"))
            .timeout(HEALTH_REQUEST_TIMEOUT)
            .send()
            .await?;
        Ok(response.status().is_success())
    }

    /// Polls the health endpoint every `retry` until it succeeds or `timeout`
    /// elapses. Connection errors and probes cut off by the deadline count as
    /// "not ready yet".
    pub async fn wait_until_ready(&self, limit: Duration, retry: Duration) -> Result<(), BackendError> {
        let deadline = Instant::now() + limit;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match timeout(remaining, self.health()).await {
                Ok(Ok(true)) => {
                    log_info!("backend ready at {}", self.base_url);
                    return Ok(());
                }
                Ok(Ok(false)) => log_debug!("backend at {} not ready yet", self.base_url),
                Ok(Err(err)) => log_debug!("health probe failed: {}", err),
                Err(_) => log_debug!("health probe to {} hit the deadline", self.base_url),
            }
            if Instant::now() + retry > deadline {
                log_warn!("backend at {} not ready after {:?}", self.base_url, limit);
                return Err(BackendError::Timeout(limit));
            }
            sleep(retry).await;
        }
    }

    /// Sends a survey file to `POST /api/upload`. The backend applies the
    /// instrument height when it computes thickness.
    pub async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        height: InstrumentHeight,
    ) -> Result<UploadResponse, BackendError> {
        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name.to_string()));
        let response = self
            .http
            .post(self.url("/api/upload"))
            .query(&[("inst_height", height.meters())])
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Absolute tile URL for a template that may be relative to the backend.
    pub fn tile_url(&self, template: &str, z: u32, x: u32, y: u32) -> String {
        let url = tile_url(template, z, x, y);
        if url.starts_with('/') {
            self.url(&url)
        } else {
            url
        }
    }
}

/// Fills `{z}`, `{x}` and `{y}` in a tile URL template.
pub fn tile_url(template: &str, z: u32, x: u32, y: u32) -> String {
    template
        .replace("{z}", &z.to_string())
        .replace("{x}", &x.to_string())
        .replace("{y}", &y.to_string())
}

/// The backend reports failures as `{"detail": ...}`; fall back to the raw body.
fn error_detail(body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").cloned())
        .map(|d| match d {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });
    match detail {
        Some(d) => d,
        None if body.trim().is_empty() => "no details".to_string(),
        None => body.trim().to_string(),
    }
}
