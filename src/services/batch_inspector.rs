use crate::error::AppError;
use crate::models::fs_types::CandidateFile;
use crate::models::predict_types::{BatchRow, PredictionResult};
use crate::services::api::ApiClient;
use crate::services::preview;
use crate::services::registry::ModelRegistry;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct StampedRows {
    rows: Vec<BatchRow>,
    model_version: u64,
}

/// Folder-scoped batch inspection flow.
///
/// Results appear only as one atomically-replaced sequence: either a batch
/// submission produces the whole row set or the previous rows stay. Row
/// expansion is presentation state keyed by the row's result filename (a
/// stable key, unlike the raw position), exposed behind an index-based
/// toggle; the set is cleared whenever the rows are replaced.
#[derive(Clone)]
pub struct BatchInspector {
    registry: ModelRegistry,
    candidates: Arc<Mutex<Vec<CandidateFile>>>,
    rows: Arc<Mutex<Option<StampedRows>>>,
    expanded: Arc<Mutex<HashSet<String>>>,
    busy: Arc<AtomicBool>,
    error: Arc<Mutex<Option<String>>>,
}

impl BatchInspector {
    pub fn new(registry: ModelRegistry) -> Self {
        Self {
            registry,
            candidates: Arc::new(Mutex::new(Vec::new())),
            rows: Arc::new(Mutex::new(None)),
            expanded: Arc::new(Mutex::new(HashSet::new())),
            busy: Arc::new(AtomicBool::new(false)),
            error: Arc::new(Mutex::new(None)),
        }
    }

    /// Filter an arbitrary selection down to files whose name ends in the
    /// PNG extension, case-insensitively. A weaker check than the single
    /// flow's media-type allow-list, matching folder-picker behavior.
    /// Selecting always starts a fresh session: prior rows, expansion state
    /// and error are discarded.
    pub async fn select_candidates(&self, files: Vec<CandidateFile>) -> Vec<CandidateFile> {
        let filtered: Vec<CandidateFile> = files
            .into_iter()
            .filter(|f| f.name.to_ascii_lowercase().ends_with(".png"))
            .collect();

        *self.candidates.lock().await = filtered.clone();
        *self.rows.lock().await = None;
        self.expanded.lock().await.clear();
        *self.error.lock().await = None;

        filtered
    }

    pub async fn candidates(&self) -> Vec<CandidateFile> {
        self.candidates.lock().await.clone()
    }

    /// Submit every candidate as one multi-file request. All-or-nothing:
    /// on any failure the previous rows stay untouched.
    pub async fn submit_batch(&self, api: &ApiClient) -> Result<Vec<PredictionResult>, AppError> {
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err("A batch is already running.".into());
        }

        let result = self.do_submit(api).await;
        self.busy.store(false, Ordering::SeqCst);

        match &result {
            Ok(_) => *self.error.lock().await = None,
            Err(e) => *self.error.lock().await = Some(e.message.clone()),
        }

        result
    }

    async fn do_submit(&self, api: &ApiClient) -> Result<Vec<PredictionResult>, AppError> {
        let files = self.candidates.lock().await.clone();
        if files.is_empty() {
            return Err("No PNG files selected.".into());
        }

        let results = api.predict_batch(&files).await?;

        // Reconcile off the async thread: each row gets its thumbnail bound
        // by filename, independent of the server's processing order.
        let to_reconcile = results.clone();
        let rows = tokio::task::spawn_blocking(move || {
            to_reconcile
                .into_iter()
                .map(|r| {
                    let preview = preview::bind(&r, &files);
                    BatchRow { result: r, preview }
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| AppError {
            message: format!("Reconciliation task failed: {}", e),
        })?;

        // Atomic replacement; previous rows and previews drop here, and the
        // expansion set must not outlive the rows it referred to.
        *self.rows.lock().await = Some(StampedRows {
            rows,
            model_version: self.registry.version(),
        });
        self.expanded.lock().await.clear();

        Ok(results)
    }

    /// Current rows, or empty when none exist or the active model has moved
    /// on since they were produced.
    pub async fn rows(&self) -> Vec<BatchRow> {
        self.rows
            .lock()
            .await
            .as_ref()
            .filter(|s| s.model_version == self.registry.version())
            .map(|s| s.rows.clone())
            .unwrap_or_default()
    }

    /// Flip the expansion state of one row. Out-of-range indices are a
    /// no-op. Pure presentation: nothing is refetched or recomputed.
    ///
    /// Keys are result filenames, so rows that share a filename (duplicate
    /// basenames across subfolders) share one key and toggle together —
    /// the same ambiguity the filename-based reconciliation carries.
    pub async fn toggle_row(&self, index: usize) {
        let key = match self.rows.lock().await.as_ref() {
            Some(s) => match s.rows.get(index) {
                Some(row) => row.result.filename.clone(),
                None => return,
            },
            None => return,
        };

        let mut expanded = self.expanded.lock().await;
        if !expanded.remove(&key) {
            expanded.insert(key);
        }
    }

    pub async fn is_expanded(&self, index: usize) -> bool {
        let key = match self.rows.lock().await.as_ref() {
            Some(s) => match s.rows.get(index) {
                Some(row) => row.result.filename.clone(),
                None => return false,
            },
            None => return false,
        };

        self.expanded.lock().await.contains(&key)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub async fn error(&self) -> Option<String> {
        self.error.lock().await.clone()
    }

    /// Drop rows, previews and expansion state. Called on model switch; the
    /// candidate selection itself stays valid.
    pub async fn clear_results(&self) {
        *self.rows.lock().await = None;
        self.expanded.lock().await.clear();
    }
}
