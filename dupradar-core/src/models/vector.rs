use pgvector::Vector;
use serde::{Deserialize, Serialize};

/// An embedding produced for one issue. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingVector {
    pub values: Vec<f32>,
    /// Tokens the provider counted, when it reports them.
    pub token_count: Option<u32>,
    /// Set when the input was cut, either before sending or by the provider.
    pub truncated: bool,
}

impl EmbeddingVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            token_count: None,
            truncated: false,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.values.len()
    }

    pub fn to_pgvector(&self) -> Vector {
        Vector::from(self.values.clone())
    }
}
