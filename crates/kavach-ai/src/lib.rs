//! Model layer: ONNX Runtime image/text classification, device selection,
//! model resolution, and the classical TF-IDF urgency classifier.

mod batch;
pub mod device;
mod error;
mod handle;
pub mod hub;
pub mod urgency;
pub mod vision;

pub use batch::{Batch, InputTensor, TensorData};
pub use device::{Device, DevicePreference};
pub use error::InferenceError;
pub use handle::Classifier;
pub use vision::{ImageProcessor, ImageProcessorConfig};

#[cfg(feature = "onnx")]
mod onnx;
#[cfg(feature = "onnx")]
pub mod text;
#[cfg(feature = "onnx")]
pub use onnx::{ImageModel, OnnxModel, TextModel};
#[cfg(feature = "onnx")]
pub use text::TextPreprocessor;
