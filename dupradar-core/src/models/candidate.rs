use serde::{Deserialize, Serialize};

/// A stored issue returned by a similarity search. Smaller distance = more similar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityCandidate {
    pub issue_number: i64,
    pub repository: String,
    pub distance: f64,
}

impl SimilarityCandidate {
    pub fn new(issue_number: i64, repository: impl Into<String>, distance: f64) -> Self {
        Self {
            issue_number,
            repository: repository.into(),
            distance,
        }
    }
}
