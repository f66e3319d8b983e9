pub mod labels;
pub mod prediction;

pub use labels::{LabelError, LabelMap};
pub use prediction::{PostprocessError, Prediction, argmax, round_percent, softmax};
