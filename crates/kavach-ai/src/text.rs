//! Text preprocessing with a HuggingFace `tokenizer.json`.

use std::path::Path;

use tokenizers::Tokenizer;

use crate::{Batch, InferenceError};

/// Longest token sequence passed to the text classifier. Longer inputs are
/// truncated, not rejected.
pub const MAX_TEXT_TOKENS: usize = 512;

/// Tokenizer configured for single-example classification.
pub struct TextPreprocessor {
    tokenizer: Tokenizer,
    max_length: usize,
}

impl TextPreprocessor {
    /// Wrap a tokenizer, truncating to `max_length` and disabling padding.
    pub fn new(mut tokenizer: Tokenizer, max_length: usize) -> anyhow::Result<Self> {
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("set truncation: {e}"))?;

        // One example per request: nothing to pad against.
        tokenizer.with_padding(None);

        Ok(Self {
            tokenizer,
            max_length,
        })
    }

    pub fn from_file(path: &Path, max_length: usize) -> anyhow::Result<Self> {
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| anyhow::anyhow!("load tokenizer {}: {e}", path.display()))?;
        Self::new(tokenizer, max_length)
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Tokenize into `[1, seq]` tensors: `input_ids`, `attention_mask`,
    /// `token_type_ids`, and `position_ids`.
    pub fn encode(&self, text: &str) -> Result<Batch, InferenceError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| InferenceError::Preprocess(format!("tokenize: {e}")))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let token_type_ids: Vec<i64> = encoding.get_type_ids().iter().map(|&t| t as i64).collect();
        let seq_len = input_ids.len();
        let position_ids: Vec<i64> = (0..seq_len as i64).collect();

        let shape = vec![1, seq_len as i64];
        Ok(Batch::new()
            .with_i64("input_ids", shape.clone(), input_ids)
            .with_i64("attention_mask", shape.clone(), attention_mask)
            .with_i64("token_type_ids", shape.clone(), token_type_ids)
            .with_i64("position_ids", shape, position_ids))
    }
}
