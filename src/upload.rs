//! Upload round-trip: send the survey file, then replace the dataset in one
//! step. A newer upload supersedes the one in flight; a failed or superseded
//! upload never touches the current dataset.

use std::path::Path;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;

use crate::backend::BackendClient;
use crate::error::SyncError;
use crate::models::{LineSummary, SurveyHeader, UploadResponse};
use crate::survey::InstrumentHeight;
use crate::sync::ViewSynchronizer;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UploadStatus {
    Idle,
    Uploading { file_name: String },
    Loaded { file_name: String, readings: usize },
    Failed { message: String },
}

/// Header and per-line counts of the survey that was just loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurveySummary {
    pub header: SurveyHeader,
    pub lines: Vec<LineSummary>,
    pub readings: usize,
}

impl SurveySummary {
    fn from_response(response: &UploadResponse, readings: usize) -> Self {
        Self {
            header: response.header.clone(),
            lines: response.lines.clone(),
            readings,
        }
    }

    pub fn file_info(&self) -> String {
        format!(
            "File: {} · Version: {}",
            self.header.file_name.as_deref().unwrap_or("unknown"),
            self.header.version.as_deref().unwrap_or("?")
        )
    }

    /// Program, survey mode and one line per survey line.
    pub fn describe(&self) -> Vec<String> {
        let mut out = vec![
            format!(
                "Program: {} {}",
                self.header.program.as_deref().unwrap_or("?"),
                self.header.version.as_deref().unwrap_or("")
            )
            .trim_end()
            .to_string(),
            format!("Mode: {}", self.header.survey_type.as_deref().unwrap_or("?")),
        ];
        out.extend(self.lines.iter().map(|l| {
            format!(
                "{}: {} readings, {} GPS",
                l.line_name.as_deref().unwrap_or("?"),
                l.readings,
                l.gps_points
            )
        }));
        out
    }
}

struct InFlight {
    generation: u64,
    cancel: CancellationToken,
}

#[derive(Clone)]
pub struct UploadController {
    client: BackendClient,
    sync: ViewSynchronizer,
    in_flight: Arc<Mutex<Option<InFlight>>>,
    generation: Arc<AtomicU64>,
    status: Arc<watch::Sender<UploadStatus>>,
}

impl UploadController {
    pub fn new(client: BackendClient, sync: ViewSynchronizer) -> Self {
        let (status, _) = watch::channel(UploadStatus::Idle);
        Self {
            client,
            sync,
            in_flight: Arc::new(Mutex::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
            status: Arc::new(status),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> UploadStatus {
        self.status.borrow().clone()
    }

    pub async fn upload_file(&self, path: &Path, height: InstrumentHeight) -> Result<Option<SurveySummary>> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "survey".to_string());
        self.upload_bytes(&file_name, bytes, height).await
    }

    /// Uploads and, on success, replaces the dataset. Returns `Ok(None)` when a
    /// newer upload superseded this one.
    pub async fn upload_bytes(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        height: InstrumentHeight,
    ) -> Result<Option<SurveySummary>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(previous) = in_flight.replace(InFlight {
                generation,
                cancel: cancel.clone(),
            }) {
                log_info!("upload #{} superseded by #{}", previous.generation, generation);
                previous.cancel.cancel();
            }
        }
        self.status.send_replace(UploadStatus::Uploading {
            file_name: file_name.to_string(),
        });
        log_info!("uploading {} ({} bytes, instrument height {} m)", file_name, bytes.len(), height.meters());

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            result = self.client.upload(file_name, bytes, height) => result,
        };

        let mut in_flight = self.in_flight.lock().await;
        if cancel.is_cancelled() || in_flight.as_ref().map(|f| f.generation) != Some(generation) {
            return Ok(None);
        }
        *in_flight = None;

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                log_warn!("upload of {} failed: {}", file_name, err);
                self.status.send_replace(UploadStatus::Failed {
                    message: err.to_string(),
                });
                return Err(anyhow!(err));
            }
        };

        let Some(readings) = self.sync.load_dataset(&response.geojson, height) else {
            self.status.send_replace(UploadStatus::Failed {
                message: SyncError::Busy.to_string(),
            });
            return Err(anyhow!(SyncError::Busy));
        };
        self.status.send_replace(UploadStatus::Loaded {
            file_name: file_name.to_string(),
            readings,
        });
        Ok(Some(SurveySummary::from_response(&response, readings)))
    }
}
