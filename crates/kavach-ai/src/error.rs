use kavach_core::PostprocessError;
use thiserror::Error;

/// Per-request failures between payload decoding and postprocessing.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("cannot decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("preprocessing failed: {0}")]
    Preprocess(String),

    #[error("inference failed: {0}")]
    Runtime(String),

    #[error("unexpected model output: {0}")]
    Shape(String),

    #[error("model session lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Postprocess(#[from] PostprocessError),
}
