//! Inference endpoints
//!
//! - `POST /deepfake` - multipart `image` upload, real/fake classification
//! - `POST /classify-crime` - JSON `{"text": ...}`, crime category

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        DefaultBodyLimit, Multipart, State, multipart::MultipartRejection,
        rejection::BytesRejection,
    },
    http::StatusCode,
    routing::post,
};
use kavach_ai::InferenceError;
use kavach_core::Prediction;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::AppContext;
use crate::error::{ApiError, ApiResult};

pub const NO_IMAGE_PROVIDED: &str = "No image provided";
pub const NO_IMAGE_SELECTED: &str = "No image selected";
pub const NO_TEXT_PROVIDED: &str = "No text provided";
pub const TEXT_NOT_A_STRING: &str = "Field 'text' must be a string";

/// Create the inference routes
pub fn routes(ctx: AppContext, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/deepfake", post(detect_deepfake))
        .route("/classify-crime", post(classify_crime))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(ctx)
}

/// Response for `/deepfake`
#[derive(Debug, Serialize, Deserialize)]
pub struct DeepfakeResponse {
    pub result: String,
    pub confidence: f64,
    pub is_fake: bool,
}

impl From<Prediction> for DeepfakeResponse {
    fn from(prediction: Prediction) -> Self {
        Self {
            is_fake: prediction.is_fake(),
            result: prediction.label,
            confidence: prediction.confidence,
        }
    }
}

/// Response for `/classify-crime`
#[derive(Debug, Serialize, Deserialize)]
pub struct CrimeResponse {
    pub crime_type: String,
    pub confidence: f64,
}

impl From<Prediction> for CrimeResponse {
    fn from(prediction: Prediction) -> Self {
        Self {
            crime_type: prediction.label,
            confidence: prediction.confidence,
        }
    }
}

/// Classify an uploaded image as real or fake
async fn detect_deepfake(
    State(ctx): State<AppContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<DeepfakeResponse>> {
    let bytes = read_image_field(multipart).await?;
    debug!(bytes = bytes.len(), "received image upload");

    let model = Arc::clone(&ctx.deepfake);
    let prediction = tokio::task::spawn_blocking(move || -> Result<Prediction, InferenceError> {
        let image = image::load_from_memory(&bytes)?;
        model.classify(&image)
    })
    .await??;

    Ok(Json(prediction.into()))
}

/// Classify free text into a crime category
async fn classify_crime(
    State(ctx): State<AppContext>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<Json<CrimeResponse>> {
    let body = body.map_err(body_error)?;
    let text = extract_text(&body)?;
    debug!(chars = text.chars().count(), "received text");

    let model = Arc::clone(&ctx.crime);
    let prediction = tokio::task::spawn_blocking(move || model.classify(&text)).await??;

    Ok(Json(prediction.into()))
}

/// Pull the bytes of the `image` file field out of a multipart body.
///
/// Parts named `image` without a filename are not file uploads and are skipped.
async fn read_image_field(multipart: Result<Multipart, MultipartRejection>) -> ApiResult<Bytes> {
    let mut multipart = multipart.map_err(|_| ApiError::Validation(NO_IMAGE_PROVIDED.into()))?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("image") {
            continue;
        }
        match field.file_name() {
            None => continue,
            Some("") => return Err(ApiError::Validation(NO_IMAGE_SELECTED.into())),
            Some(_) => {}
        }
        return field.bytes().await.map_err(multipart_error);
    }

    Err(ApiError::Validation(NO_IMAGE_PROVIDED.into()))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::Validation(format!("invalid multipart body: {}", err.body_text()))
    }
}

fn body_error(err: BytesRejection) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::Validation(format!("invalid request body: {}", err.body_text()))
    }
}

/// Read the `text` string from a JSON body.
fn extract_text(body: &[u8]) -> ApiResult<String> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|_| ApiError::Validation(NO_TEXT_PROVIDED.into()))?;

    match value.get("text") {
        Some(serde_json::Value::String(text)) => Ok(text.clone()),
        Some(_) => Err(ApiError::Validation(TEXT_NOT_A_STRING.into())),
        None => Err(ApiError::Validation(NO_TEXT_PROVIDED.into())),
    }
}
