//! ONNX Runtime sequence/image classification.
//!
//! A model directory holds `model.onnx`, `config.json` (for `id2label`), and
//! either `preprocessor_config.json` or `tokenizer.json`. HuggingFace
//! checkpoints can be exported with `optimum-cli export onnx`.

use std::path::Path;
use std::sync::Mutex;

use image::DynamicImage;
use kavach_core::LabelMap;
use ort::session::Session;
use ort::value::{DynValue, Tensor};
use tracing::{debug, info};

use crate::hub::{CONFIG_FILE, MODEL_FILE, PREPROCESSOR_FILE, TOKENIZER_FILE};
use crate::text::MAX_TEXT_TOKENS;
use crate::{Batch, Classifier, Device, ImageProcessor, InferenceError, TensorData, TextPreprocessor};

/// An ONNX classification graph bound to a device.
///
/// `Session::run` needs `&mut`, so the session sits behind a mutex; requests
/// against the same model run one at a time.
pub struct OnnxModel {
    session: Mutex<Session>,
    input_names: Vec<String>,
    labels: LabelMap,
    device: Device,
}

impl OnnxModel {
    /// Load `model.onnx` and `config.json` from a model directory.
    pub fn load(model_dir: &Path, device: Device) -> anyhow::Result<Self> {
        let model_path = model_dir.join(MODEL_FILE);
        let config_path = model_dir.join(CONFIG_FILE);

        anyhow::ensure!(model_path.exists(), "{MODEL_FILE} not found in {model_dir:?}");
        anyhow::ensure!(config_path.exists(), "{CONFIG_FILE} not found in {model_dir:?}");

        let config = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("read {}: {e}", config_path.display()))?;
        let labels = LabelMap::from_model_config(&config)?;

        let session = Session::builder()?
            .with_execution_providers(device.execution_providers())?
            .commit_from_file(&model_path)?;

        let input_names: Vec<String> = session
            .inputs()
            .iter()
            .map(|input| input.name().to_string())
            .collect();

        // Check the classification head against the label map when the graph
        // has a static class dimension.
        let output = session
            .outputs()
            .first()
            .ok_or_else(|| anyhow::anyhow!("{MODEL_FILE} declares no outputs"))?;
        if let Some(classes) = infer_classes(output.dtype()) {
            anyhow::ensure!(
                classes == labels.len(),
                "model has {classes} output classes but config.json lists {} labels",
                labels.len()
            );
        }

        debug!(inputs = ?input_names, model = %model_path.display(), "session ready");
        Ok(Self {
            session: Mutex::new(session),
            input_names,
            labels,
            device,
        })
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    /// Place a preprocessed batch on the model's device.
    ///
    /// Builds runtime tensors for every input the graph declares; the session's
    /// execution provider copies them onto the accelerator when one is bound.
    pub fn place(&self, batch: Batch) -> Result<Vec<(String, DynValue)>, InferenceError> {
        let mut inputs = Vec::with_capacity(self.input_names.len());

        for (name, tensor) in batch.into_inputs() {
            if !self.input_names.contains(&name) {
                continue;
            }
            let value = match tensor.data {
                TensorData::F32(data) => {
                    Tensor::from_array((tensor.shape, data.into_boxed_slice())).map(|t| t.into_dyn())
                }
                TensorData::I64(data) => {
                    Tensor::from_array((tensor.shape, data.into_boxed_slice())).map(|t| t.into_dyn())
                }
            }
            .map_err(|e| InferenceError::Preprocess(format!("build tensor {name}: {e}")))?;
            inputs.push((name, value));
        }

        if let Some(missing) = self
            .input_names
            .iter()
            .find(|declared| !inputs.iter().any(|(name, _)| name == *declared))
        {
            return Err(InferenceError::Preprocess(format!(
                "model input {missing:?} was not produced by preprocessing"
            )));
        }

        Ok(inputs)
    }

    /// Run one forward pass and return the first row of `logits`.
    pub fn run(&self, batch: Batch) -> Result<Vec<f32>, InferenceError> {
        let inputs = self.place(batch)?;
        debug!(device = %self.device, inputs = inputs.len(), "running session");

        let mut session = self.session.lock().map_err(|_| InferenceError::Poisoned)?;
        let outputs = session
            .run(inputs)
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;

        let (output_shape, output_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;
        let dims: &[i64] = output_shape;

        let classes = match dims.last() {
            Some(&n) if n > 0 && n as usize <= output_data.len() => n as usize,
            _ => {
                return Err(InferenceError::Shape(format!(
                    "logits shape {dims:?} has no class dimension"
                )));
            }
        };

        Ok(output_data[..classes].to_vec())
    }
}

/// Static size of the last output dimension, if the graph declares one.
fn infer_classes(output_type: &ort::value::ValueType) -> Option<usize> {
    match output_type {
        ort::value::ValueType::Tensor { shape, .. } => shape
            .last()
            .and_then(|&d| if d > 0 { Some(d as usize) } else { None }),
        _ => None,
    }
}

/// Image authenticity classifier (e.g. a ViT deepfake detector).
pub struct ImageModel {
    processor: ImageProcessor,
    model: OnnxModel,
}

impl ImageModel {
    pub fn load(model_dir: &Path, device: Device) -> anyhow::Result<Self> {
        let processor = ImageProcessor::from_file(&model_dir.join(PREPROCESSOR_FILE))?;
        let model = OnnxModel::load(model_dir, device)?;

        info!(
            labels = model.labels().len(),
            model = %model_dir.display(),
            %device,
            "loaded image model"
        );
        Ok(Self { processor, model })
    }
}

impl Classifier for ImageModel {
    type Input = DynamicImage;

    fn preprocess(&self, input: &DynamicImage) -> Result<Batch, InferenceError> {
        Ok(self.processor.preprocess(input))
    }

    fn forward(&self, batch: Batch) -> Result<Vec<f32>, InferenceError> {
        self.model.run(batch)
    }

    fn labels(&self) -> &LabelMap {
        self.model.labels()
    }
}

/// Text sequence classifier (e.g. a GPT-2 crime-category head).
pub struct TextModel {
    preprocessor: TextPreprocessor,
    model: OnnxModel,
}

impl TextModel {
    pub fn load(model_dir: &Path, device: Device) -> anyhow::Result<Self> {
        let preprocessor =
            TextPreprocessor::from_file(&model_dir.join(TOKENIZER_FILE), MAX_TEXT_TOKENS)?;
        let model = OnnxModel::load(model_dir, device)?;

        info!(
            labels = model.labels().len(),
            max_tokens = preprocessor.max_length(),
            model = %model_dir.display(),
            %device,
            "loaded text model"
        );
        Ok(Self {
            preprocessor,
            model,
        })
    }
}

impl Classifier for TextModel {
    type Input = str;

    fn preprocess(&self, input: &str) -> Result<Batch, InferenceError> {
        self.preprocessor.encode(input)
    }

    fn forward(&self, batch: Batch) -> Result<Vec<f32>, InferenceError> {
        self.model.run(batch)
    }

    fn labels(&self) -> &LabelMap {
        self.model.labels()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn model_dir(identifier: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("models")
            .join(identifier)
    }

    #[test]
    fn load_fails_without_model_files() {
        let dir = tempfile::tempdir().unwrap();
        let err = OnnxModel::load(dir.path(), Device::Cpu).err().unwrap();
        assert!(err.to_string().contains("model.onnx not found"), "{err}");
    }

    #[test]
    fn image_model_requires_preprocessor_config() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ImageModel::load(dir.path(), Device::Cpu).is_err());
    }

    #[test]
    #[ignore = "needs the exported deepfake model under models/"]
    fn deepfake_model_classifies_an_image() {
        let model = ImageModel::load(&model_dir("Wvolf/ViT_Deepfake_Detection"), Device::Cpu).unwrap();
        let image = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            256,
            256,
            image::Rgb([120, 100, 90]),
        ));

        let first = model.classify(&image).unwrap();
        let second = model.classify(&image).unwrap();
        assert!((0.0..=100.0).contains(&first.confidence));
        assert_eq!(model.labels().get(first.index), Some(first.label.as_str()));
        assert_eq!(first, second);
    }

    #[test]
    #[ignore = "needs the exported crime model under models/"]
    fn crime_model_truncates_long_text() {
        let model =
            TextModel::load(&model_dir("PDG/gpt2_for_crime_classification"), Device::Cpu).unwrap();

        let long = "someone broke into the shop at night and took the till ".repeat(60);
        let prediction = model.classify(&long).unwrap();
        assert_eq!(
            model.labels().get(prediction.index),
            Some(prediction.label.as_str())
        );
        assert!((0.0..=100.0).contains(&prediction.confidence));
    }
}
