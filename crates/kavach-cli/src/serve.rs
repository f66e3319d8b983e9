//! `kavach serve`: load both models, then serve the inference endpoints.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use kavach_ai::DevicePreference;
use kavach_server::{
    AppContext, DEFAULT_IMAGE_MODEL, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_TEXT_MODEL, ServerConfig,
};

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Interface to bind
    #[arg(long, env = "KAVACH_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "KAVACH_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Directory holding exported model directories
    #[arg(long, env = "KAVACH_MODELS_DIR", default_value = "models")]
    pub models_dir: PathBuf,

    /// Deepfake detector: hub identifier or local directory
    #[arg(long, env = "KAVACH_IMAGE_MODEL", default_value = DEFAULT_IMAGE_MODEL)]
    pub image_model: String,

    /// Crime classifier: hub identifier or local directory
    #[arg(long, env = "KAVACH_TEXT_MODEL", default_value = DEFAULT_TEXT_MODEL)]
    pub text_model: String,

    /// Compute device: auto, cpu or cuda
    #[arg(long, env = "KAVACH_DEVICE", default_value = "auto")]
    pub device: DevicePreference,

    /// Download missing model files from the hub
    #[arg(long, env = "KAVACH_FETCH")]
    pub fetch: bool,

    /// Largest accepted request body in bytes
    #[arg(long, env = "KAVACH_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    /// Enable debug logging
    #[arg(long, env = "KAVACH_DEBUG")]
    pub debug: bool,
}

impl From<ServeArgs> for ServerConfig {
    fn from(args: ServeArgs) -> Self {
        Self {
            bind_addr: SocketAddr::new(args.host, args.port),
            models_dir: args.models_dir,
            image_model: args.image_model,
            text_model: args.text_model,
            device: args.device,
            fetch: args.fetch,
            max_upload_bytes: args.max_upload_bytes,
        }
    }
}

pub fn run(args: ServeArgs) -> anyhow::Result<()> {
    let config = ServerConfig::from(args);
    let runtime = tokio::runtime::Runtime::new().context("starting tokio runtime")?;

    runtime.block_on(async {
        let ctx = AppContext::load(&config).await.context("loading models")?;
        kavach_server::serve(ctx, &config).await
    })
}
