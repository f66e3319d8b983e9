use kavach_core::{LabelMap, Prediction};

use crate::{Batch, InferenceError};

/// A loaded model paired with its preprocessor, bound to a compute device.
///
/// Implementations are loaded once at startup and shared read-only across
/// requests, so every operation takes `&self`.
pub trait Classifier: Send + Sync {
    /// Raw payload accepted by [`preprocess`](Self::preprocess).
    type Input: ?Sized;

    /// Turn a payload into model inputs.
    fn preprocess(&self, input: &Self::Input) -> Result<Batch, InferenceError>;

    /// Run one forward pass and return the class scores for the single example.
    fn forward(&self, batch: Batch) -> Result<Vec<f32>, InferenceError>;

    fn labels(&self) -> &LabelMap;

    /// Preprocess, run, and reduce to the top-1 prediction.
    fn classify(&self, input: &Self::Input) -> Result<Prediction, InferenceError> {
        let batch = self.preprocess(input)?;
        let logits = self.forward(batch)?;
        Ok(Prediction::from_logits(&logits, self.labels())?)
    }
}
