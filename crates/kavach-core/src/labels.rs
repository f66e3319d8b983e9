//! Class label maps read from a model's `config.json`.
//!
//! HuggingFace configs store labels as `"id2label": {"0": "Fake", "1": "Real"}`
//! with string keys. A [`LabelMap`] turns that into a dense, index-ordered list.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LabelError {
    #[error("invalid model config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("model config has no id2label mapping")]
    MissingId2Label,

    #[error("id2label key is not an index: {0:?}")]
    BadIndex(String),

    #[error("id2label has no entry for index {0}")]
    Gap(usize),
}

#[derive(Deserialize)]
struct ModelConfig {
    #[serde(default)]
    id2label: Option<HashMap<String, String>>,
}

/// Index-ordered class names for a classification head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    labels: Vec<String>,
}

impl LabelMap {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Build from an `id2label` map. Keys must cover `0..n` without gaps.
    pub fn from_id2label(id2label: &HashMap<String, String>) -> Result<Self, LabelError> {
        let mut indexed = Vec::with_capacity(id2label.len());
        for (key, label) in id2label {
            let idx: usize = key
                .trim()
                .parse()
                .map_err(|_| LabelError::BadIndex(key.clone()))?;
            indexed.push((idx, label.clone()));
        }
        indexed.sort_by_key(|(idx, _)| *idx);

        for (expected, (idx, _)) in indexed.iter().enumerate() {
            if *idx != expected {
                return Err(LabelError::Gap(expected));
            }
        }

        Ok(Self {
            labels: indexed.into_iter().map(|(_, label)| label).collect(),
        })
    }

    /// Parse the `id2label` section of a HuggingFace `config.json` document.
    pub fn from_model_config(json: &str) -> Result<Self, LabelError> {
        let config: ModelConfig = serde_json::from_str(json)?;
        let id2label = config.id2label.ok_or(LabelError::MissingId2Label)?;
        let labels = Self::from_id2label(&id2label)?;
        if labels.is_empty() {
            return Err(LabelError::MissingId2Label);
        }
        Ok(labels)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
