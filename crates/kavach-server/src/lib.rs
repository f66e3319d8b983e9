//! # kavach-server: HTTP inference service
//!
//! Exposes two pretrained classifiers:
//! - `POST /deepfake` - multipart `image` upload → `{"result", "confidence", "is_fake"}`
//! - `POST /classify-crime` - `{"text": ...}` → `{"crime_type", "confidence"}`
//!
//! Models and the compute device are loaded once into an [`AppContext`] before
//! the listener binds, then shared read-only with every handler.

pub mod error;
pub mod routes;

pub use error::{ApiError, ApiResult};
pub use routes::{CrimeResponse, DeepfakeResponse};

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use image::DynamicImage;
use kavach_ai::{Classifier, Device, DevicePreference};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

pub const DEFAULT_IMAGE_MODEL: &str = "Wvolf/ViT_Deepfake_Detection";
pub const DEFAULT_TEXT_MODEL: &str = "PDG/gpt2_for_crime_classification";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Image classifier handle as held by the service.
pub type ImageClassifier = dyn Classifier<Input = DynamicImage>;

/// Text classifier handle as held by the service.
pub type TextClassifier = dyn Classifier<Input = str>;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server
    pub bind_addr: SocketAddr,

    /// Directory searched for model identifiers
    pub models_dir: PathBuf,

    /// Image model identifier or directory
    pub image_model: String,

    /// Text model identifier or directory
    pub text_model: String,

    /// Requested compute device
    pub device: DevicePreference,

    /// Download missing model files from the hub
    pub fetch: bool,

    /// Largest accepted request body
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            models_dir: PathBuf::from("models"),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            device: DevicePreference::Auto,
            fetch: false,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Process-lifetime state shared by the handlers.
#[derive(Clone)]
pub struct AppContext {
    pub device: Device,
    pub deepfake: Arc<ImageClassifier>,
    pub crime: Arc<TextClassifier>,
}

impl AppContext {
    pub fn new(device: Device, deepfake: Arc<ImageClassifier>, crime: Arc<TextClassifier>) -> Self {
        Self {
            device,
            deepfake,
            crime,
        }
    }

    /// Select the device and load both ONNX models.
    ///
    /// Any failure here is fatal: the service must not start half-loaded.
    #[cfg(feature = "onnx")]
    pub async fn load(config: &ServerConfig) -> anyhow::Result<Self> {
        use anyhow::Context;
        use kavach_ai::hub::{IMAGE_MODEL_FILES, TEXT_MODEL_FILES, resolve_model_dir};
        use kavach_ai::{ImageModel, TextModel};

        let device = Device::select(config.device);

        let image_dir = resolve_model_dir(
            &config.image_model,
            &config.models_dir,
            IMAGE_MODEL_FILES,
            config.fetch,
        )
        .await
        .with_context(|| format!("resolving image model {}", config.image_model))?;
        let text_dir = resolve_model_dir(
            &config.text_model,
            &config.models_dir,
            TEXT_MODEL_FILES,
            config.fetch,
        )
        .await
        .with_context(|| format!("resolving text model {}", config.text_model))?;

        let deepfake = tokio::task::spawn_blocking(move || ImageModel::load(&image_dir, device))
            .await?
            .context("loading image model")?;
        let crime = tokio::task::spawn_blocking(move || TextModel::load(&text_dir, device))
            .await?
            .context("loading text model")?;

        Ok(Self::new(device, Arc::new(deepfake), Arc::new(crime)))
    }
}

/// Build the router
pub fn router(ctx: AppContext, config: &ServerConfig) -> Router {
    routes::routes(ctx, config.max_upload_bytes).layer(TraceLayer::new_for_http())
}

/// Bind and serve until the process exits
pub async fn serve(ctx: AppContext, config: &ServerConfig) -> anyhow::Result<()> {
    let device = ctx.device;
    let router = router(ctx, config);

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, %device, "Starting kavach inference server");
    axum::serve(listener, router).await?;

    Ok(())
}
