//! Client for the remote face detection service, and the shapes of
//! its requests and responses.

use crate::conf::Settings;
use crate::storage::FetchedImage;
use crate::trigger::ImageReference;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64ct::{Base64Unpadded, Encoding};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// The only feature requested from the service.
pub const FACE_DETECTION_FEATURE: &str = "FACE_DETECTION";

/// A bounding box corner. The service sends coordinates as strings
/// and omits zero values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    #[serde(default)]
    pub x: String,
    #[serde(default)]
    pub y: String,
}

/// The vertices enclosing a detected face.
pub type Polygon = Vec<Vertex>;

/// The body returned by the service for a batch analyze request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResponse {
    #[serde(default)]
    pub results: Vec<ResultGroup>,
}

/// Results for one analyze spec.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultGroup {
    #[serde(default)]
    pub results: Vec<FeatureResult>,
}

/// Results for one requested feature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureResult {
    #[serde(default, rename = "faceDetection")]
    pub face_detection: FaceDetection,
}

/// The faces found by the face detection feature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    #[serde(default)]
    pub faces: Vec<Face>,
}

/// A single detected face.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Face {
    #[serde(default, rename = "boundingBox")]
    pub bounding_box: BoundingBox,
}

/// The polygon enclosing a face.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    #[serde(default)]
    pub vertices: Polygon,
}

/// A batch analyze request carrying exactly one image.
#[derive(Debug, Serialize)]
pub struct AnalyzeRequest<'a> {
    /// The folder the request is billed and authorized against.
    #[serde(rename = "folderId")]
    pub folder_id: &'a str,
    pub analyze_specs: Vec<AnalyzeSpec>,
}

/// One image and the features requested for it.
#[derive(Debug, Serialize)]
pub struct AnalyzeSpec {
    /// The image, base64 encoded without padding.
    pub content: String,
    pub features: Vec<Feature>,
}

/// A requested analysis feature.
#[derive(Debug, Serialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl<'a> AnalyzeRequest<'a> {
    /// Build a face detection request for a single image.
    pub fn face_detection(folder_id: &'a str, content: &[u8]) -> Self {
        Self {
            folder_id,
            analyze_specs: vec![AnalyzeSpec {
                content: Base64Unpadded::encode_string(content),
                features: vec![Feature {
                    kind: FACE_DETECTION_FEATURE,
                }],
            }],
        }
    }
}

/// Anything that can find faces in an image.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    /// Finds the faces in an encoded image.
    async fn detect(&self, content: &[u8]) -> Result<DetectionResponse>;
}

/// An image reference together with the detection results for it.
#[derive(Debug, Clone)]
pub struct AnalyzedImage {
    pub reference: ImageReference,
    pub response: DetectionResponse,
}

/// HTTPS client of the face detection endpoint.
pub struct VisionClient {
    http: reqwest::Client,
    url: String,
    token: String,
    folder_id: String,
}

impl VisionClient {
    /// Initialize a client for the given endpoint and credential.
    pub fn new(http: reqwest::Client, url: String, token: String, folder_id: String) -> Self {
        Self {
            http,
            url,
            token,
            folder_id,
        }
    }

    /// Build a client with the endpoint, credential and timeout given
    /// in the settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = settings.vision_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .context("Failed to build the vision HTTP client")?;
        Ok(Self::new(
            http,
            settings.vision_url.clone(),
            settings.aws_session_token.clone(),
            settings.folder_id.clone(),
        ))
    }
}

#[async_trait]
impl FaceDetector for VisionClient {
    async fn detect(&self, content: &[u8]) -> Result<DetectionResponse> {
        let request = AnalyzeRequest::face_detection(&self.folder_id, content);
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to send analyze request to {:?}", self.url))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Vision service returned unexpected status {}: {}", status, body);
        }
        // Decoding consumes the response and releases its body
        response
            .json::<DetectionResponse>()
            .await
            .context("Failed to decode the vision service response")
    }
}

/// Runs face detection on every image, keeping at most `concurrency`
/// calls in flight. Results keep the order of `images`. The first
/// failure stops the whole operation and nothing after it is sent.
#[instrument(skip(detector, images), fields(images = images.len()))]
pub async fn analyze_all(
    detector: &dyn FaceDetector,
    images: Vec<FetchedImage>,
    concurrency: usize,
) -> Result<Vec<AnalyzedImage>> {
    stream::iter(images)
        .map(|image| async move {
            let response = detector
                .detect(&image.content)
                .await
                .with_context(|| format!("Failed to detect faces in image {}", image.reference))?;
            debug!(image = %image.reference, groups = response.results.len(), "Analyzed image");
            Ok::<_, anyhow::Error>(AnalyzedImage {
                reference: image.reference,
                response,
            })
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::serve_once;
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    /// Serves a canned vision response and returns the endpoint URL.
    async fn vision_endpoint(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::sync::oneshot::Receiver<String>) {
        let (base, request) = serve_once(status, "application/json", body).await;
        (format!("{}/vision/v1/batchAnalyze", base), request)
    }

    fn client(url: String) -> VisionClient {
        VisionClient::new(
            reqwest::Client::new(),
            url,
            "secret".to_string(),
            "folder-1".to_string(),
        )
    }

    const TWO_FACES: &str = r#"{"results":[{"results":[{"faceDetection":{"faces":[
        {"boundingBox":{"vertices":[
            {"x":"1","y":"2"},{"x":"1","y":"9"},{"x":"7","y":"9"},{"x":"7","y":"2"}
        ]}},
        {"boundingBox":{"vertices":[{"y":"5"},{"x":"3","y":"8"}]}}
    ]}}]}]}"#;

    #[test]
    fn test_request_body_shape() {
        let request = AnalyzeRequest::face_detection("folder-1", b"hi!?");
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "folderId": "folder-1",
                "analyze_specs": [{
                    "content": "aGkhPw",
                    "features": [{"type": "FACE_DETECTION"}]
                }]
            })
        );
    }

    #[test]
    fn test_decode_response_with_missing_fields() {
        let response: DetectionResponse = serde_json::from_str(TWO_FACES).unwrap();
        let faces = &response.results[0].results[0].face_detection.faces;
        assert_eq!(faces.len(), 2);
        assert_eq!(
            faces[1].bounding_box.vertices[0],
            Vertex {
                x: String::new(),
                y: "5".to_string()
            }
        );

        let empty: DetectionResponse =
            serde_json::from_str(r#"{"results":[{"results":[{"faceDetection":{}}]}]}"#).unwrap();
        assert!(empty.results[0].results[0].face_detection.faces.is_empty());
        let bare: DetectionResponse = serde_json::from_str("{}").unwrap();
        assert!(bare.results.is_empty());
    }

    #[tokio::test]
    async fn test_detect_sends_credential_and_image() {
        let (url, request) = vision_endpoint("200 OK", TWO_FACES).await;
        let response = client(url).detect(b"image bytes").await.unwrap();
        assert_eq!(response.results[0].results[0].face_detection.faces.len(), 2);

        let request = request.await.unwrap();
        assert!(request.starts_with("POST /vision/v1/batchAnalyze "));
        assert!(request
            .to_lowercase()
            .contains("authorization: bearer secret"));
        let body_start = request.find("\r\n\r\n").unwrap() + 4;
        let body: Value = serde_json::from_str(&request[body_start..]).unwrap();
        assert_eq!(body["folderId"], "folder-1");
        assert_eq!(
            body["analyze_specs"][0]["content"],
            Base64Unpadded::encode_string(b"image bytes")
        );
        assert_eq!(
            body["analyze_specs"][0]["features"][0]["type"],
            "FACE_DETECTION"
        );
    }

    #[tokio::test]
    async fn test_detect_rejects_unsuccessful_status() {
        let (url, _request) = vision_endpoint("403 Forbidden", r#"{"message":"denied"}"#).await;
        let err = client(url).detect(b"image").await.unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("403"));
        assert!(message.contains("denied"));
    }

    #[tokio::test]
    async fn test_detect_rejects_malformed_body() {
        let (url, _request) = vision_endpoint("200 OK", r#"{"results": "nope"}"#).await;
        let err = client(url).detect(b"image").await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to decode"));
    }

    #[tokio::test]
    async fn test_detect_transport_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);
        assert!(client(url).detect(b"image").await.is_err());
    }
}
