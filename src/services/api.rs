use crate::error::AppError;
use crate::models::fs_types::CandidateFile;
use crate::models::predict_types::{PredictionResult, RegistrySnapshot};
use reqwest::multipart::{Form, Part};

/// Shown whenever the server cannot be reached or rejects a request without
/// a usable reason of its own.
pub const UNREACHABLE_MESSAGE: &str = "Could not reach the prediction server.";

#[derive(Debug, serde::Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub model_loaded: bool,
    #[serde(default)]
    pub version: Option<String>,
}

/// HTTP client for the telltale prediction backend.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn list_models(&self) -> Result<RegistrySnapshot, AppError> {
        let response = self
            .http
            .get(self.url("/models"))
            .send()
            .await
            .map_err(|_| AppError::from(UNREACHABLE_MESSAGE))?;

        if !response.status().is_success() {
            return Err(rejection_message(response).await);
        }

        Ok(response.json::<RegistrySnapshot>().await?)
    }

    pub async fn switch_model(&self, name: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(self.url("/switch-model"))
            .query(&[("name", name)])
            .send()
            .await
            .map_err(|_| AppError::from(UNREACHABLE_MESSAGE))?;

        if !response.status().is_success() {
            return Err(rejection_message(response).await);
        }

        Ok(())
    }

    pub async fn predict(&self, file: &CandidateFile) -> Result<PredictionResult, AppError> {
        let bytes = read_file(file).await?;
        let part = Part::bytes(bytes)
            .file_name(file.name.clone())
            .mime_str(&file.media_type)?;
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(self.url("/predict"))
            .multipart(form)
            .send()
            .await
            .map_err(|_| AppError::from(UNREACHABLE_MESSAGE))?;

        if !response.status().is_success() {
            return Err(rejection_message(response).await);
        }

        Ok(response.json::<PredictionResult>().await?)
    }

    pub async fn predict_batch(
        &self,
        files: &[CandidateFile],
    ) -> Result<Vec<PredictionResult>, AppError> {
        let mut form = Form::new();
        for file in files {
            let bytes = read_file(file).await?;
            let part = Part::bytes(bytes)
                .file_name(file.upload_name().to_string())
                .mime_str(&file.media_type)?;
            form = form.part("files", part);
        }

        let response = self
            .http
            .post(self.url("/predict-batch"))
            .multipart(form)
            .send()
            .await
            .map_err(|_| AppError::from(UNREACHABLE_MESSAGE))?;

        if !response.status().is_success() {
            return Err(rejection_message(response).await);
        }

        Ok(response.json::<Vec<PredictionResult>>().await?)
    }

    /// Request a backend-rendered tabular artifact. The caller streams the
    /// returned response body to disk.
    pub async fn export_report(
        &self,
        results: &[PredictionResult],
        format: &str,
    ) -> Result<reqwest::Response, AppError> {
        let response = self
            .http
            .post(self.url("/export-report"))
            .query(&[("format", format)])
            .json(results)
            .send()
            .await
            .map_err(|_| AppError::from(UNREACHABLE_MESSAGE))?;

        if !response.status().is_success() {
            return Err(rejection_message(response).await);
        }

        Ok(response)
    }

    pub async fn health(&self) -> Result<HealthStatus, AppError> {
        let response = self
            .http
            .get(self.url("/health"))
            .send()
            .await
            .map_err(|_| AppError::from(UNREACHABLE_MESSAGE))?;

        if !response.status().is_success() {
            return Err(rejection_message(response).await);
        }

        Ok(response.json::<HealthStatus>().await?)
    }
}

/// The backend reports rejections as `{"detail": "..."}`. Surface the detail
/// verbatim when present, otherwise fall back to the generic message.
async fn rejection_message(response: reqwest::Response) -> AppError {
    let detail = response
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|v| {
            v.get("detail")
                .and_then(|d| d.as_str())
                .map(str::to_string)
        });

    AppError {
        message: detail.unwrap_or_else(|| UNREACHABLE_MESSAGE.to_string()),
    }
}

async fn read_file(file: &CandidateFile) -> Result<Vec<u8>, AppError> {
    tokio::fs::read(&file.path).await.map_err(|e| AppError {
        message: format!("Failed to read {}: {}", file.path.display(), e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let api = ApiClient::new("http://localhost:8000/");
        assert_eq!(api.base_url(), "http://localhost:8000");
        assert_eq!(api.url("/predict"), "http://localhost:8000/predict");
    }

    #[tokio::test]
    async fn unreachable_server_maps_to_generic_message() {
        // Nothing listens on this port; the connection is refused locally.
        let api = ApiClient::new("http://127.0.0.1:1");
        let err = api.list_models().await.unwrap_err();
        assert_eq!(err.message, UNREACHABLE_MESSAGE);
    }
}
