//! Named input tensors produced by preprocessing, before device placement.

#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    F32(Vec<f32>),
    I64(Vec<i64>),
}

impl TensorData {
    fn len(&self) -> usize {
        match self {
            Self::F32(v) => v.len(),
            Self::I64(v) => v.len(),
        }
    }
}

/// A dense row-major tensor held in host memory.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    pub shape: Vec<i64>,
    pub data: TensorData,
}

/// Model inputs for a single example, keyed by graph input name.
///
/// Preprocessors may emit inputs a given graph does not declare (e.g.
/// `token_type_ids` for GPT-2); placement keeps only the declared ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    inputs: Vec<(String, InputTensor)>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_f32(self, name: &str, shape: Vec<i64>, data: Vec<f32>) -> Self {
        self.with(name, shape, TensorData::F32(data))
    }

    pub fn with_i64(self, name: &str, shape: Vec<i64>, data: Vec<i64>) -> Self {
        self.with(name, shape, TensorData::I64(data))
    }

    fn with(mut self, name: &str, shape: Vec<i64>, data: TensorData) -> Self {
        debug_assert_eq!(
            shape.iter().product::<i64>() as usize,
            data.len(),
            "shape {shape:?} does not match {} elements for {name}",
            data.len()
        );
        self.inputs.retain(|(n, _)| n != name);
        self.inputs.push((name.to_string(), InputTensor { shape, data }));
        self
    }

    pub fn get(&self, name: &str) -> Option<&InputTensor> {
        self.inputs.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn into_inputs(self) -> Vec<(String, InputTensor)> {
        self.inputs
    }
}
