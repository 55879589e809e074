use crate::error::AppError;
use crate::models::fs_types::{CandidateFile, PreviewImage};
use crate::models::predict_types::PredictionResult;
use crate::services::api::ApiClient;
use crate::services::preview;
use crate::services::registry::ModelRegistry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const PNG_MEDIA_TYPE: &str = "image/png";

/// Result plus the model version it was produced under. A stale stamp means
/// the active model has changed since, and the result must not be shown.
#[derive(Debug, Clone)]
struct StampedResult {
    result: PredictionResult,
    preview: Option<PreviewImage>,
    model_version: u64,
}

/// Single-image inspection flow: strict media-type validation, one in-flight
/// request at a time, whole replacement of the previous result.
#[derive(Clone)]
pub struct SingleItemInspector {
    registry: ModelRegistry,
    file: Arc<Mutex<Option<CandidateFile>>>,
    result: Arc<Mutex<Option<StampedResult>>>,
    busy: Arc<AtomicBool>,
    error: Arc<Mutex<Option<String>>>,
}

impl SingleItemInspector {
    pub fn new(registry: ModelRegistry) -> Self {
        Self {
            registry,
            file: Arc::new(Mutex::new(None)),
            result: Arc::new(Mutex::new(None)),
            busy: Arc::new(AtomicBool::new(false)),
            error: Arc::new(Mutex::new(None)),
        }
    }

    /// Accept the file iff its declared media type is exactly PNG. This is an
    /// allow-list over the declared type, not an extension sniff. Rejection
    /// clears any previously held file and result.
    pub async fn validate(&self, file: CandidateFile) -> Result<(), AppError> {
        if file.media_type != PNG_MEDIA_TYPE {
            let reason = format!(
                "Only PNG images are allowed (got {} for {}).",
                file.media_type, file.name
            );
            *self.file.lock().await = None;
            *self.result.lock().await = None;
            *self.error.lock().await = Some(reason.clone());
            return Err(reason.into());
        }

        *self.file.lock().await = Some(file);
        *self.error.lock().await = None;
        Ok(())
    }

    /// Submit the held file for inference. At most one request may be
    /// outstanding; while it runs the flow reports busy and re-submission is
    /// rejected. The outcome replaces the flow's error message either way.
    pub async fn submit(&self, api: &ApiClient) -> Result<PredictionResult, AppError> {
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err("A prediction is already running.".into());
        }

        let result = self.do_submit(api).await;
        self.busy.store(false, Ordering::SeqCst);

        match &result {
            Ok(_) => *self.error.lock().await = None,
            Err(e) => *self.error.lock().await = Some(e.message.clone()),
        }

        result
    }

    async fn do_submit(&self, api: &ApiClient) -> Result<PredictionResult, AppError> {
        let file = self
            .file
            .lock()
            .await
            .clone()
            .ok_or_else(|| AppError::from("No file selected."))?;

        let prediction = api.predict(&file).await?;
        let preview = preview::bind(&prediction, std::slice::from_ref(&file));

        // Replace wholesale; the previous result and its preview drop here.
        *self.result.lock().await = Some(StampedResult {
            result: prediction.clone(),
            preview,
            model_version: self.registry.version(),
        });

        Ok(prediction)
    }

    /// The current result, hidden once the active model has moved on.
    pub async fn result(&self) -> Option<PredictionResult> {
        self.result
            .lock()
            .await
            .as_ref()
            .filter(|s| s.model_version == self.registry.version())
            .map(|s| s.result.clone())
    }

    pub async fn preview(&self) -> Option<PreviewImage> {
        self.result
            .lock()
            .await
            .as_ref()
            .filter(|s| s.model_version == self.registry.version())
            .and_then(|s| s.preview.clone())
    }

    pub async fn file(&self) -> Option<CandidateFile> {
        self.file.lock().await.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub async fn error(&self) -> Option<String> {
        self.error.lock().await.clone()
    }

    /// Drop file, result, preview and error. Called on model switch.
    pub async fn clear(&self) {
        *self.file.lock().await = None;
        *self.result.lock().await = None;
        *self.error.lock().await = None;
    }
}
