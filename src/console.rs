use crate::error::AppError;
use crate::models::fs_types::CandidateFile;
use crate::models::predict_types::{BatchRow, BatchStats, PredictionResult};
use crate::services::api::{ApiClient, HealthStatus};
use crate::services::batch_inspector::BatchInspector;
use crate::services::fs_service;
use crate::services::registry::ModelRegistry;
use crate::services::report::{self, ReportExporter, TabularFormat};
use crate::services::single_inspector::SingleItemInspector;
use std::path::{Path, PathBuf};

/// Composition root for the operator console.
///
/// Owns the shared model registry and both inspection flows. Switching the
/// active model goes through here and nowhere else: on success both flows'
/// results are cleared before the call returns, so a result can never be
/// shown against a model that did not produce it. On failure nothing
/// changes.
pub struct InspectionConsole {
    api: ApiClient,
    registry: ModelRegistry,
    single: SingleItemInspector,
    batch: BatchInspector,
    exporter: ReportExporter,
}

impl InspectionConsole {
    pub fn new(base_url: &str) -> Self {
        let api = ApiClient::new(base_url);
        let registry = ModelRegistry::new();
        let single = SingleItemInspector::new(registry.clone());
        let batch = BatchInspector::new(registry.clone());

        Self {
            api,
            registry,
            single,
            batch,
            exporter: ReportExporter::new(),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn single(&self) -> &SingleItemInspector {
        &self.single
    }

    pub fn batch(&self) -> &BatchInspector {
        &self.batch
    }

    pub fn exporter(&self) -> &ReportExporter {
        &self.exporter
    }

    /// Best-effort registry refresh; failures only go to the log.
    pub async fn refresh_models(&self) {
        self.registry.refresh(&self.api).await;
    }

    /// Activate another model version. Hard stop on failure; the caller is
    /// expected to surface the error prominently, since acting on the wrong
    /// model is incorrect rather than merely suboptimal.
    pub async fn switch_model(&self, name: &str) -> Result<(), AppError> {
        self.registry.switch(&self.api, name).await?;

        // Only reached on success: drop both flows' results and previews
        // before the new current model becomes observable to the operator.
        self.single.clear().await;
        self.batch.clear_results().await;
        Ok(())
    }

    /// Single-item flow: open, validate, submit.
    pub async fn inspect_file(&self, path: &Path) -> Result<PredictionResult, AppError> {
        let file = fs_service::open_file(path)?;
        self.single.validate(file).await?;
        self.single.submit(&self.api).await
    }

    /// Batch flow: scan a folder and select the PNG candidates.
    pub async fn load_folder(&self, path: &Path) -> Result<Vec<CandidateFile>, AppError> {
        let files = fs_service::scan_folder(path)?;
        Ok(self.batch.select_candidates(files).await)
    }

    pub async fn run_batch(&self) -> Result<Vec<PredictionResult>, AppError> {
        self.batch.submit_batch(&self.api).await
    }

    pub async fn batch_stats(&self) -> BatchStats {
        report::compute_stats(&self.batch.rows().await)
    }

    pub async fn export_tabular(
        &self,
        format: TabularFormat,
        out_dir: &Path,
    ) -> Result<PathBuf, AppError> {
        let rows = self.current_rows().await?;
        self.exporter
            .export_tabular(&self.api, &rows, format, out_dir)
            .await
    }

    pub async fn export_visual_report(&self, out_dir: &Path) -> Result<PathBuf, AppError> {
        let rows = self.current_rows().await?;
        let candidates = self.batch.candidates().await;
        let model = self
            .registry
            .current()
            .await
            .unwrap_or_else(|| "unknown".to_string());

        self.exporter
            .export_visual(&rows, &candidates, &model, out_dir)
            .await
    }

    async fn current_rows(&self) -> Result<Vec<BatchRow>, AppError> {
        let rows = self.batch.rows().await;
        if rows.is_empty() {
            return Err("No results to export.".into());
        }
        Ok(rows)
    }

    pub async fn health(&self) -> Result<HealthStatus, AppError> {
        self.api.health().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failed_switch_changes_nothing() {
        let console = InspectionConsole::new("http://127.0.0.1:1");
        assert!(console.switch_model("14_telltale_v2").await.is_err());
        assert_eq!(console.registry().current().await, None);
        assert_eq!(console.registry().version(), 0);
    }

    #[tokio::test]
    async fn exports_require_results() {
        let console = InspectionConsole::new("http://127.0.0.1:1");

        let err = console
            .export_tabular(TabularFormat::Csv, Path::new("/tmp"))
            .await
            .unwrap_err();
        assert_eq!(err.message, "No results to export.");

        let err = console
            .export_visual_report(Path::new("/tmp"))
            .await
            .unwrap_err();
        assert_eq!(err.message, "No results to export.");
    }

    #[tokio::test]
    async fn clearing_empty_sessions_is_idempotent() {
        let console = InspectionConsole::new("http://127.0.0.1:1");
        console.single().clear().await;
        console.single().clear().await;
        console.batch().clear_results().await;
        console.batch().clear_results().await;

        assert_eq!(console.single().result().await, None);
        assert!(console.batch().rows().await.is_empty());
    }
}
