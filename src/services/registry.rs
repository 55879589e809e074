use crate::error::AppError;
use crate::services::api::ApiClient;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Owned store for the shared model-version state.
///
/// `switch` is the single mutation entry point. Every successful switch bumps
/// `version`; inspectors stamp their results with the version they were
/// produced under and hide them once the stamp goes stale, so a result can
/// never be displayed against a model that did not produce it.
#[derive(Clone)]
pub struct ModelRegistry {
    available: Arc<Mutex<Vec<String>>>,
    current: Arc<Mutex<Option<String>>>,
    switching: Arc<AtomicBool>,
    version: Arc<AtomicU64>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            available: Arc::new(Mutex::new(Vec::new())),
            current: Arc::new(Mutex::new(None)),
            switching: Arc::new(AtomicBool::new(false)),
            version: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    pub async fn current(&self) -> Option<String> {
        self.current.lock().await.clone()
    }

    pub async fn available(&self) -> Vec<String> {
        self.available.lock().await.clone()
    }

    pub fn is_switching(&self) -> bool {
        self.switching.load(Ordering::SeqCst)
    }

    /// Fetch the model registry. Best-effort: on any failure the cached
    /// state is left unchanged and the error only goes to the log.
    pub async fn refresh(&self, api: &ApiClient) {
        match api.list_models().await {
            Ok(snapshot) => {
                *self.available.lock().await = snapshot.models;
                *self.current.lock().await = Some(snapshot.current);
            }
            Err(e) => {
                eprintln!("Model listing failed: {}", e);
            }
        }
    }

    /// Request activation of `name`. Rejects while another switch is in
    /// flight. On failure nothing changes and the error is returned for the
    /// caller to surface as a hard stop.
    pub async fn switch(&self, api: &ApiClient, name: &str) -> Result<(), AppError> {
        if self.switching.swap(true, Ordering::SeqCst) {
            return Err("A model switch is already in flight.".into());
        }

        let result = api.switch_model(name).await;
        if result.is_ok() {
            self.commit(name).await;
        }
        self.switching.store(false, Ordering::SeqCst);

        result
    }

    async fn commit(&self, name: &str) {
        *self.current.lock().await = Some(name.to_string());
        self.version.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_empty_at_version_zero() {
        let registry = ModelRegistry::new();
        assert_eq!(registry.version(), 0);
        assert_eq!(registry.current().await, None);
        assert!(registry.available().await.is_empty());
        assert!(!registry.is_switching());
    }

    #[tokio::test]
    async fn commit_updates_current_and_bumps_version() {
        let registry = ModelRegistry::new();
        registry.commit("14_telltale_v2").await;
        assert_eq!(registry.current().await.as_deref(), Some("14_telltale_v2"));
        assert_eq!(registry.version(), 1);
    }

    #[tokio::test]
    async fn failed_switch_leaves_state_unchanged() {
        let registry = ModelRegistry::new();
        registry.commit("14_telltale_v1").await;

        let api = ApiClient::new("http://127.0.0.1:1");
        let err = registry.switch(&api, "14_telltale_v2").await.unwrap_err();
        assert!(!err.message.is_empty());

        assert_eq!(registry.current().await.as_deref(), Some("14_telltale_v1"));
        assert_eq!(registry.version(), 1);
        assert!(!registry.is_switching());
    }

    #[tokio::test]
    async fn concurrent_switches_are_rejected() {
        let registry = ModelRegistry::new();
        registry.switching.store(true, Ordering::SeqCst);

        let api = ApiClient::new("http://127.0.0.1:1");
        let err = registry.switch(&api, "other").await.unwrap_err();
        assert_eq!(err.message, "A model switch is already in flight.");
    }

    #[tokio::test]
    async fn refresh_failure_keeps_cached_snapshot() {
        let registry = ModelRegistry::new();
        registry.commit("cached").await;

        let api = ApiClient::new("http://127.0.0.1:1");
        registry.refresh(&api).await;

        assert_eq!(registry.current().await.as_deref(), Some("cached"));
    }
}
