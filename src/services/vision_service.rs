use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::models::face::{FaceAttributes, FaceMatch};
use crate::services::metrics_service::{endpoint_tags, MetricsService};

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("vision service returned error status: {0}")]
    Status(reqwest::StatusCode),
}

/// Face detection and comparison primitives of the external vision service.
#[async_trait]
pub trait VisionGateway: Send + Sync {
    async fn detect_faces(&self, image: &[u8]) -> Result<Vec<FaceAttributes>, VisionError>;

    /// Faces in `target` that resemble the face in `source` with at least
    /// `min_similarity`.
    async fn compare_faces(
        &self,
        source: &[u8],
        target: &[u8],
        min_similarity: f64,
    ) -> Result<Vec<FaceMatch>, VisionError>;
}

#[derive(Debug, Deserialize)]
struct DetectFacesResponse {
    #[serde(default)]
    faces: Vec<FaceAttributes>,
}

#[derive(Debug, Deserialize)]
struct CompareFacesResponse {
    #[serde(default)]
    face_matches: Vec<FaceMatch>,
}

#[derive(Clone)]
pub struct HttpVisionGateway {
    client: reqwest::Client,
    base_url: String,
    metrics: MetricsService,
}

impl HttpVisionGateway {
    pub fn new(base_url: String, timeout_millis: u64, metrics: MetricsService) -> Result<Self, VisionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_millis))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            metrics,
        })
    }

    async fn post<T: DeserializeOwned + Send>(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<T, VisionError> {
        let start = std::time::Instant::now();
        let tags = endpoint_tags(endpoint);
        let url = format!("{}/{}", self.base_url, endpoint);

        let result = self.send::<T>(&url, &body).await;

        match &result {
            Ok(_) => self.metrics.increment("vision.success", Some(tags.clone())),
            Err(e) => {
                tracing::warn!(endpoint, error = %e, "vision request failed");
                self.metrics.increment("vision.error", Some(tags.clone()));
            }
        }
        self.metrics.timing("vision.duration", start.elapsed(), Some(tags));

        result
    }

    async fn send<T: DeserializeOwned>(&self, url: &str, body: &serde_json::Value) -> Result<T, VisionError> {
        let response = self.client.post(url).json(body).send().await?;
        if !response.status().is_success() {
            return Err(VisionError::Status(response.status()));
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl VisionGateway for HttpVisionGateway {
    async fn detect_faces(&self, image: &[u8]) -> Result<Vec<FaceAttributes>, VisionError> {
        let body = json!({ "image": STANDARD.encode(image) });
        let response: DetectFacesResponse = self.post("detect-faces", body).await?;
        Ok(response.faces)
    }

    async fn compare_faces(
        &self,
        source: &[u8],
        target: &[u8],
        min_similarity: f64,
    ) -> Result<Vec<FaceMatch>, VisionError> {
        let body = json!({
            "source_image": STANDARD.encode(source),
            "target_image": STANDARD.encode(target),
            "similarity_threshold": min_similarity,
        });
        let response: CompareFacesResponse = self.post("compare-faces", body).await?;
        Ok(response.face_matches)
    }
}
