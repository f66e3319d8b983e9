//! Classical urgency classifier: TF-IDF features into a linear model.
//!
//! Both artifacts are JSON documents exported from a fitted scikit-learn
//! `TfidfVectorizer` and linear classifier (`LogisticRegression`,
//! `LinearSVC`, `SGDClassifier`, ...):
//!
//! ```json
//! {"vocabulary": {"fire": 0, "help": 1}, "idf": [1.4, 2.1],
//!  "lowercase": true, "ngram_range": [1, 1], "sublinear_tf": false, "norm": "l2"}
//!
//! {"classes": ["High", "Low", "Medium"], "coef": [[...], [...], [...]],
//!  "intercept": [0.1, -0.2, 0.0]}
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use unicode_properties::{GeneralCategoryGroup, UnicodeGeneralCategory};

/// Text classified when the user enters nothing.
pub const MISSING_INFO: &str = "Missing Info";

pub const DEFAULT_MODEL_PATH: &str = "mlserver/urgency_model.json";
pub const DEFAULT_VECTORIZER_PATH: &str = "mlserver/tfidf_vectorizer.json";

#[derive(Debug, Error)]
pub enum UrgencyError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("inconsistent artifacts: {0}")]
    Shape(String),
}

/// Sparse feature vector: column index → weight.
pub type Features = BTreeMap<usize, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Norm {
    L1,
    L2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    pub vocabulary: HashMap<String, usize>,
    pub idf: Vec<f64>,
    #[serde(default = "default_true")]
    pub lowercase: bool,
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),
    #[serde(default)]
    pub sublinear_tf: bool,
    #[serde(default = "default_norm")]
    pub norm: Option<Norm>,
}

fn default_true() -> bool {
    true
}

fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

fn default_norm() -> Option<Norm> {
    Some(Norm::L2)
}

impl TfidfVectorizer {
    pub fn n_features(&self) -> usize {
        self.idf.len()
    }

    fn validate(&self) -> Result<(), UrgencyError> {
        if let Some((term, &idx)) = self.vocabulary.iter().find(|(_, idx)| **idx >= self.idf.len()) {
            return Err(UrgencyError::Shape(format!(
                "vocabulary term {term:?} maps to column {idx} but idf has {} entries",
                self.idf.len()
            )));
        }
        let (min_n, max_n) = self.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(UrgencyError::Shape(format!(
                "invalid ngram_range ({min_n}, {max_n})"
            )));
        }
        Ok(())
    }

    /// Term counts weighted by idf, then normalized.
    pub fn transform(&self, text: &str) -> Features {
        let text = if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };
        let tokens = tokenize(&text);

        let mut features = Features::new();
        let (min_n, max_n) = self.ngram_range;
        for n in min_n..=max_n {
            for window in tokens.windows(n) {
                let gram = window.join(" ");
                if let Some(&idx) = self.vocabulary.get(&gram) {
                    *features.entry(idx).or_insert(0.0) += 1.0;
                }
            }
        }

        for (&idx, value) in features.iter_mut() {
            if self.sublinear_tf {
                *value = 1.0 + value.ln();
            }
            *value *= self.idf[idx];
        }

        match self.norm {
            Some(Norm::L2) => {
                let norm = features.values().map(|v| v * v).sum::<f64>().sqrt();
                scale(&mut features, norm);
            }
            Some(Norm::L1) => {
                let norm = features.values().map(|v| v.abs()).sum::<f64>();
                scale(&mut features, norm);
            }
            None => {}
        }
        features
    }
}

fn scale(features: &mut Features, norm: f64) {
    if norm > 0.0 {
        for v in features.values_mut() {
            *v /= norm;
        }
    }
}

/// Runs of two or more word characters.
pub fn tokenize(text: &str) -> Vec<&str> {
    text.split(|c: char| !is_word_char(c))
        .filter(|token| token.chars().count() >= 2)
        .collect()
}

/// Letters, numbers and `_`. Combining marks are separators, as in the
/// `(?u)\b\w\w+\b` token pattern the artifacts were fitted with.
fn is_word_char(c: char) -> bool {
    c == '_'
        || matches!(
            c.general_category_group(),
            GeneralCategoryGroup::Letter | GeneralCategoryGroup::Number
        )
}

/// Linear decision function over TF-IDF features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    #[serde(deserialize_with = "labels_as_strings")]
    pub classes: Vec<String>,
    pub coef: Vec<Vec<f64>>,
    pub intercept: Vec<f64>,
}

/// Class labels may be exported as strings or numbers.
fn labels_as_strings<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let values = Vec::<serde_json::Value>::deserialize(deserializer)?;
    values
        .into_iter()
        .map(|v| match v {
            serde_json::Value::String(s) => Ok(s),
            serde_json::Value::Number(n) => Ok(n.to_string()),
            serde_json::Value::Bool(b) => Ok(b.to_string()),
            other => Err(serde::de::Error::custom(format!(
                "unsupported class label {other}"
            ))),
        })
        .collect()
}

impl LinearModel {
    fn is_binary(&self) -> bool {
        self.classes.len() == 2 && self.coef.len() == 1
    }

    fn validate(&self, n_features: usize) -> Result<(), UrgencyError> {
        if self.classes.is_empty() {
            return Err(UrgencyError::Shape("model has no classes".into()));
        }
        if !self.is_binary() && self.coef.len() != self.classes.len() {
            return Err(UrgencyError::Shape(format!(
                "{} coefficient rows for {} classes",
                self.coef.len(),
                self.classes.len()
            )));
        }
        if self.intercept.len() != self.coef.len() {
            return Err(UrgencyError::Shape(format!(
                "{} intercepts for {} coefficient rows",
                self.intercept.len(),
                self.coef.len()
            )));
        }
        if let Some(row) = self.coef.iter().find(|row| row.len() != n_features) {
            return Err(UrgencyError::Shape(format!(
                "coefficient row has {} columns, vectorizer produces {n_features}",
                row.len()
            )));
        }
        Ok(())
    }

    /// One score per coefficient row: `coef · x + intercept`.
    pub fn decision_function(&self, features: &Features) -> Vec<f64> {
        self.coef
            .iter()
            .zip(&self.intercept)
            .map(|(row, b)| features.iter().map(|(&i, x)| row[i] * x).sum::<f64>() + b)
            .collect()
    }

    pub fn predict(&self, features: &Features) -> &str {
        let scores = self.decision_function(features);
        let idx = if self.is_binary() {
            usize::from(scores[0] > 0.0)
        } else {
            let mut best = 0;
            for (i, &score) in scores.iter().enumerate().skip(1) {
                if score > scores[best] {
                    best = i;
                }
            }
            best
        };
        &self.classes[idx]
    }
}

/// Trained vectorizer and classifier pair.
#[derive(Debug, Clone)]
pub struct UrgencyClassifier {
    vectorizer: TfidfVectorizer,
    model: LinearModel,
}

impl UrgencyClassifier {
    pub fn new(vectorizer: TfidfVectorizer, model: LinearModel) -> Result<Self, UrgencyError> {
        vectorizer.validate()?;
        model.validate(vectorizer.n_features())?;
        Ok(Self { vectorizer, model })
    }

    /// Load both artifacts from disk.
    pub fn load(model_path: &Path, vectorizer_path: &Path) -> Result<Self, UrgencyError> {
        let model: LinearModel = read_json(model_path)?;
        let vectorizer: TfidfVectorizer = read_json(vectorizer_path)?;
        Self::new(vectorizer, model)
    }

    pub fn classes(&self) -> &[String] {
        &self.model.classes
    }

    /// Predict the urgency category for one line of input.
    pub fn predict(&self, input: &str) -> &str {
        let features = self.vectorizer.transform(normalize_input(input));
        self.model.predict(&features)
    }
}

/// Trim the input, substituting [`MISSING_INFO`] when nothing is left.
pub fn normalize_input(input: &str) -> &str {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        MISSING_INFO
    } else {
        trimmed
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, UrgencyError> {
    let json = std::fs::read_to_string(path).map_err(|source| UrgencyError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&json).map_err(|source| UrgencyError::Json {
        path: path.to_path_buf(),
        source,
    })
}
