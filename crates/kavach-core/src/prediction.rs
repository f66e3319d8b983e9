//! Logits postprocessing: argmax, softmax, and percentage confidence.

use serde::Serialize;
use thiserror::Error;

use crate::labels::LabelMap;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PostprocessError {
    #[error("model returned no class scores")]
    EmptyLogits,

    #[error("predicted class {index} is outside the label map ({len} labels)")]
    UnknownLabel { index: usize, len: usize },
}

/// Top-1 classification for a single input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    pub index: usize,
    /// Softmax probability of `label`, as a percentage rounded to 2 decimals.
    pub confidence: f64,
}

impl Prediction {
    /// Pick the highest-scoring class and attach its softmax confidence.
    pub fn from_logits(logits: &[f32], labels: &LabelMap) -> Result<Self, PostprocessError> {
        let index = argmax(logits).ok_or(PostprocessError::EmptyLogits)?;
        let label = labels
            .get(index)
            .ok_or(PostprocessError::UnknownLabel {
                index,
                len: labels.len(),
            })?
            .to_string();

        let probabilities = softmax(logits);
        let confidence = round_percent(f64::from(probabilities[index]));

        Ok(Self {
            label,
            index,
            confidence,
        })
    }

    /// True when the label reads "fake", ignoring case.
    pub fn is_fake(&self) -> bool {
        self.label.to_lowercase() == "fake"
    }
}

/// Index of the largest score. The first maximum wins on ties.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    if scores.is_empty() {
        return None;
    }
    let mut best = 0;
    for (i, &score) in scores.iter().enumerate().skip(1) {
        if score > scores[best] || (scores[best].is_nan() && !score.is_nan()) {
            best = i;
        }
    }
    Some(best)
}

/// Numerically stable softmax.
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|&s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum > 0.0 {
        exps.into_iter().map(|e| e / sum).collect()
    } else {
        exps
    }
}

/// Scale a probability to a percentage rounded to two decimal places.
pub fn round_percent(probability: f64) -> f64 {
    (probability * 100.0 * 100.0).round() / 100.0
}
