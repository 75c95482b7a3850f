//! Detection service HTTP client.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use falcon_models::{DetectionBatch, Frame};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use tracing::{debug, warn};

use crate::detector::Detector;
use crate::error::{TransportError, TransportResult};
use crate::types::{Base64Request, DetectResponse, HealthResponse, UploadResponse};

/// Configuration for the detection client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the detection service
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("FALCON_API_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            timeout: Duration::from_millis(
                std::env::var("FALCON_API_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10_000),
            ),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Client for the remote detection service.
///
/// Sends one request per call and never retries: a failed frame is dropped
/// and the next capture tick naturally recovers.
#[derive(Clone)]
pub struct DetectionClient {
    http: Client,
    config: ClientConfig,
}

impl DetectionClient {
    /// Create a new detection client.
    pub fn new(config: ClientConfig) -> TransportResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(TransportError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> TransportResult<Self> {
        Self::new(ClientConfig::from_env())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Check if the detection service is up with its model loaded.
    pub async fn health_check(&self) -> TransportResult<bool> {
        let url = self.config.url("/health");

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.is_healthy())
            }
            Ok(response) => {
                warn!("Detection service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Detection service health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// Send one frame to `/predict/base64`.
    pub async fn send(&self, frame: &Frame) -> TransportResult<DetectionBatch> {
        let url = self.config.url("/predict/base64");
        let body = Base64Request {
            image: frame.to_data_url(),
        };

        let response = self.http.post(&url).json(&body).send().await?;
        let response = ensure_success(response).await?;

        let parsed: DetectResponse = parse_json(response).await?;
        if let Some(ms) = parsed.inference_time_ms {
            debug!(
                detections = parsed.detections.len(),
                inference_ms = ms,
                "Detection response received"
            );
        }
        Ok(parsed.into_batch())
    }

    /// Upload an image file to `/predict/image`.
    pub async fn detect_file(&self, path: impl AsRef<Path>) -> TransportResult<UploadResponse> {
        let path = path.as_ref();
        let url = self.config.url("/predict/image");

        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.jpg".to_string());
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime_for(path))?;
        let form = Form::new().part("file", part);

        debug!("Uploading {} to {}", path.display(), url);

        let response = self.http.post(&url).multipart(form).send().await?;
        let response = ensure_success(response).await?;
        parse_json(response).await
    }

    /// Fetch the service's aggregate usage stats (opaque).
    pub async fn stats(&self) -> TransportResult<serde_json::Value> {
        let url = self.config.url("/stats");
        let response = self.http.get(&url).send().await?;
        let response = ensure_success(response).await?;
        parse_json(response).await
    }
}

#[async_trait]
impl Detector for DetectionClient {
    async fn detect(&self, frame: &Frame) -> TransportResult<DetectionBatch> {
        self.send(frame).await
    }

    async fn stats(&self) -> TransportResult<Option<serde_json::Value>> {
        DetectionClient::stats(self).await.map(Some)
    }
}

async fn ensure_success(response: Response) -> TransportResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Status { status, body })
}

/// Read the body as text first so malformed payloads surface as JSON errors.
async fn parse_json<T: serde::de::DeserializeOwned>(response: Response) -> TransportResult<T> {
    let text = response.text().await?;
    if text.trim().is_empty() {
        return Err(TransportError::invalid_response("empty body"));
    }
    Ok(serde_json::from_str(&text)?)
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("bmp") => "image/bmp",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn frame() -> Frame {
        Frame::new(vec![0xFF, 0xD8, 0xFF], 640, 480)
    }

    async fn client_for(server: &MockServer) -> DetectionClient {
        DetectionClient::new(ClientConfig::default().with_base_url(server.uri())).unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_url_joining() {
        let config = ClientConfig::default().with_base_url("http://host:9000/");
        assert_eq!(config.url("/health"), "http://host:9000/health");
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for(Path::new("a.PNG")), "image/png");
        assert_eq!(mime_for(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(mime_for(Path::new("noext")), "image/jpeg");
    }

    #[tokio::test]
    async fn test_send_frame_parses_detections() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict/base64"))
            .and(body_partial_json(json!({"image": "data:image/jpeg;base64,/9j/"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "num_detections": 2,
                "inference_time_ms": 12.5,
                "detections": [
                    {"class": "Oxygen_Tank", "class_id": 0, "confidence": 0.91,
                     "bbox": {"x1": 1.0, "y1": 2.0, "x2": 30.0, "y2": 40.0}},
                    {"class": "Fire_Alarm", "class_id": 3, "confidence": 0.55,
                     "bbox": {"x1": 100.0, "y1": 50.0, "x2": 140.0, "y2": 90.0}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let batch = client_for(&server).await.send(&frame()).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.as_slice()[0].class_label, "Oxygen_Tank");
        assert_eq!(batch.as_slice()[1].class_id, 3);
    }

    #[tokio::test]
    async fn test_server_error_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict/base64"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Model not loaded"))
            .mount(&server)
            .await;

        let err = client_for(&server).await.send(&frame()).await.unwrap_err();
        assert!(err.is_service_unavailable());
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let client =
            DetectionClient::new(ClientConfig::default().with_base_url("http://127.0.0.1:9")).unwrap();
        let err = tokio_test::assert_err!(client.send(&frame()).await);
        assert!(matches!(err, TransportError::Network(_)));
        assert!(!tokio_test::assert_ok!(client.health_check().await));
    }

    #[tokio::test]
    async fn test_malformed_body_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict/base64"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"detections\": 4"))
            .mount(&server)
            .await;

        let err = client_for(&server).await.send(&frame()).await.unwrap_err();
        assert!(matches!(err, TransportError::Json(_)));
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "healthy",
                "model_loaded": true,
                "timestamp": "2025-10-04T12:00:00"
            })))
            .mount(&server)
            .await;

        assert!(client_for(&server).await.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_health_check_model_not_loaded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "healthy",
                "model_loaded": false
            })))
            .mount(&server)
            .await;

        assert!(!client_for(&server).await.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_stats_is_opaque() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_sessions": 3,
                "most_detected": "Fire Alarm"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let stats = Detector::stats(&client).await.unwrap().unwrap();
        assert_eq!(stats["total_sessions"], 3);
    }

    #[tokio::test]
    async fn test_detect_file_upload() {
        use std::io::Write;

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict/image"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "detections": [
                    {"class": "Emergency_Phone", "class_id": 5, "confidence": 0.7,
                     "bbox": {"x1": 0.0, "y1": 0.0, "x2": 10.0, "y2": 10.0}}
                ],
                "image": {"annotated": "data:image/jpeg;base64,AAAA"}
            })))
            .mount(&server)
            .await;

        let mut file = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
        file.write_all(&[0xFF, 0xD8, 0xFF, 0xD9]).unwrap();

        let response = client_for(&server).await.detect_file(file.path()).await.unwrap();
        assert_eq!(response.detections.len(), 1);
        assert!(response.image.annotated.starts_with("data:image/jpeg"));
    }
}
