//! End-to-end tests for the inference endpoints
//!
//! These spin up the real router on a local port, backed by small
//! deterministic classifiers in place of the ONNX models.

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use kavach_ai::{Batch, Classifier, Device, ImageProcessor, InferenceError, TensorData};
use kavach_core::LabelMap;
use kavach_server::{AppContext, ServerConfig};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// Brightness detector: bright images are "Fake", dark ones "Real".
struct Brightness {
    processor: ImageProcessor,
    labels: LabelMap,
}

impl Brightness {
    fn new() -> Self {
        Self {
            processor: ImageProcessor::default(),
            labels: LabelMap::new(vec!["Real".into(), "Fake".into()]),
        }
    }
}

impl Classifier for Brightness {
    type Input = DynamicImage;

    fn preprocess(&self, input: &DynamicImage) -> Result<Batch, InferenceError> {
        Ok(self.processor.preprocess(input))
    }

    fn forward(&self, batch: Batch) -> Result<Vec<f32>, InferenceError> {
        let Some(TensorData::F32(pixels)) = batch.get("pixel_values").map(|t| &t.data) else {
            return Err(InferenceError::Shape("missing pixel_values".into()));
        };
        let mean = pixels.iter().sum::<f32>() / pixels.len() as f32;
        Ok(vec![-mean, mean])
    }

    fn labels(&self) -> &LabelMap {
        &self.labels
    }
}

/// Keyword counter over three crime categories.
struct Keywords {
    labels: LabelMap,
}

impl Keywords {
    const VOCAB: [&'static str; 3] = ["stole", "hit", "scam"];

    fn new() -> Self {
        Self {
            labels: LabelMap::new(vec!["Theft".into(), "Assault".into(), "Fraud".into()]),
        }
    }
}

impl Classifier for Keywords {
    type Input = str;

    fn preprocess(&self, input: &str) -> Result<Batch, InferenceError> {
        let lower = input.to_lowercase();
        let counts: Vec<f32> = Self::VOCAB
            .iter()
            .map(|word| lower.matches(word).count() as f32)
            .collect();
        Ok(Batch::new().with_f32("counts", vec![1, 3], counts))
    }

    fn forward(&self, batch: Batch) -> Result<Vec<f32>, InferenceError> {
        match batch.get("counts").map(|t| &t.data) {
            Some(TensorData::F32(counts)) => Ok(counts.clone()),
            _ => Err(InferenceError::Shape("missing counts".into())),
        }
    }

    fn labels(&self) -> &LabelMap {
        &self.labels
    }
}

/// Always fails in the forward pass.
struct Broken {
    labels: LabelMap,
}

impl Classifier for Broken {
    type Input = str;

    fn preprocess(&self, _input: &str) -> Result<Batch, InferenceError> {
        Ok(Batch::new())
    }

    fn forward(&self, _batch: Batch) -> Result<Vec<f32>, InferenceError> {
        Err(InferenceError::Runtime("device lost".into()))
    }

    fn labels(&self) -> &LabelMap {
        &self.labels
    }
}

/// Test server helper
struct TestServer {
    addr: SocketAddr,
    client: Client,
}

impl TestServer {
    async fn new() -> Self {
        Self::with(mock_context(), ServerConfig::default()).await
    }

    async fn with(ctx: AppContext, config: ServerConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let router = kavach_server::router(ctx, &config);
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        Self { addr, client }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn upload(&self, form: Form) -> (StatusCode, Value) {
        let resp = self
            .client
            .post(self.url("/deepfake"))
            .multipart(form)
            .send()
            .await
            .unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }

    async fn classify(&self, body: impl Into<reqwest::Body>) -> (StatusCode, Value) {
        let resp = self
            .client
            .post(self.url("/classify-crime"))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }
}

fn mock_context() -> AppContext {
    AppContext::new(
        Device::Cpu,
        Arc::new(Brightness::new()),
        Arc::new(Keywords::new()),
    )
}

fn png(color: [u8; 3], size: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(size, size, Rgb(color)));
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

fn image_form(bytes: Vec<u8>, filename: &str) -> Form {
    Form::new().part("image", Part::bytes(bytes).file_name(filename.to_string()))
}

// =============================================================================
// /deepfake
// =============================================================================

#[tokio::test]
async fn deepfake_classifies_upload() {
    let server = TestServer::new().await;

    let (status, body) = server.upload(image_form(png([255, 255, 255], 32), "white.png")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "Fake");
    assert_eq!(body["is_fake"], true);

    let confidence = body["confidence"].as_f64().unwrap();
    assert!((50.0..=100.0).contains(&confidence), "{confidence}");

    let (status, body) = server.upload(image_form(png([0, 0, 0], 32), "black.png")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "Real");
    assert_eq!(body["is_fake"], false);
}

#[tokio::test]
async fn deepfake_is_deterministic() {
    let server = TestServer::new().await;
    let bytes = png([200, 40, 90], 48);

    let (_, first) = server.upload(image_form(bytes.clone(), "a.png")).await;
    let (_, second) = server.upload(image_form(bytes, "a.png")).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn deepfake_requires_image_field() {
    let server = TestServer::new().await;

    let form = Form::new().part("file", Part::bytes(png([1, 2, 3], 8)).file_name("x.png"));
    let (status, body) = server.upload(form).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "No image provided"}));
}

#[tokio::test]
async fn deepfake_ignores_image_part_without_filename() {
    let server = TestServer::new().await;

    let form = Form::new().text("image", "not a file");
    let (status, body) = server.upload(form).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "No image provided"}));
}

#[tokio::test]
async fn deepfake_rejects_empty_filename() {
    let server = TestServer::new().await;

    let (status, body) = server.upload(image_form(Vec::new(), "")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "No image selected"}));
}

#[tokio::test]
async fn deepfake_rejects_non_multipart_body() {
    let server = TestServer::new().await;

    let resp = server
        .client
        .post(server.url("/deepfake"))
        .json(&json!({"image": "abc"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"error": "No image provided"}));
}

#[tokio::test]
async fn deepfake_reports_undecodable_image() {
    let server = TestServer::new().await;

    let (status, body) = server
        .upload(image_form(b"this is not a png".to_vec(), "fake.png"))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("decode"), "{message}");
}

#[tokio::test]
async fn deepfake_enforces_body_limit() {
    let config = ServerConfig {
        max_upload_bytes: 1024,
        ..Default::default()
    };
    let server = TestServer::with(mock_context(), config).await;

    let (status, body) = server.upload(image_form(vec![0u8; 8 * 1024], "big.png")).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["error"].is_string());
}

// =============================================================================
// /classify-crime
// =============================================================================

#[tokio::test]
async fn crime_classifies_text() {
    let server = TestServer::new().await;

    let (status, body) = server
        .classify(json!({"text": "someone stole my bike, they stole it twice"}).to_string())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["crime_type"], "Theft");

    let confidence = body["confidence"].as_f64().unwrap();
    assert!((0.0..=100.0).contains(&confidence), "{confidence}");

    let (_, body) = server
        .classify(json!({"text": "phone scam asking for gift cards"}).to_string())
        .await;
    assert_eq!(body["crime_type"], "Fraud");
}

#[tokio::test]
async fn crime_accepts_empty_text() {
    let server = TestServer::new().await;

    // All-zero scores: the first label wins with a uniform distribution.
    let (status, body) = server.classify(json!({"text": ""}).to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["crime_type"], "Theft");
    assert_eq!(body["confidence"].as_f64().unwrap(), 33.33);
}

#[tokio::test]
async fn crime_requires_text_field() {
    let server = TestServer::new().await;

    for body in ["{}", r#"{"txt": "hi"}"#, "not json", ""] {
        let (status, resp) = server.classify(body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body:?}");
        assert_eq!(resp, json!({"error": "No text provided"}));
    }
}

#[tokio::test]
async fn crime_rejects_non_string_text() {
    let server = TestServer::new().await;

    let (status, body) = server.classify(r#"{"text": 42}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Field 'text' must be a string"}));
}

#[tokio::test]
async fn crime_is_deterministic() {
    let server = TestServer::new().await;
    let body = json!({"text": "he hit me and then stole my wallet"}).to_string();

    let (status, first) = server.classify(body.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let (_, second) = server.classify(body).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn crime_enforces_body_limit() {
    let config = ServerConfig {
        max_upload_bytes: 1024,
        ..Default::default()
    };
    let server = TestServer::with(mock_context(), config).await;

    let text = "stole ".repeat(1000);
    let resp = server
        .client
        .post(server.url("/classify-crime"))
        .header("content-type", "application/json")
        .body(json!({"text": text}).to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
        resp.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string(), "{body}");
}

#[tokio::test]
async fn crime_reports_inference_failure() {
    let ctx = AppContext::new(
        Device::Cpu,
        Arc::new(Brightness::new()),
        Arc::new(Broken {
            labels: LabelMap::new(vec!["Theft".into()]),
        }),
    );
    let server = TestServer::with(ctx, ServerConfig::default()).await;

    let (status, body) = server.classify(json!({"text": "anything"}).to_string()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("device lost"), "{message}");
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let server = TestServer::new().await;

    let resp = server
        .client
        .post(server.url("/predict"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
