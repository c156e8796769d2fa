pub mod candidate;
pub mod fingerprint;
pub mod issue;
pub mod vector;

pub use candidate::SimilarityCandidate;
pub use fingerprint::FingerprintRow;
pub use issue::{IssueCreated, Repository};
pub use vector::EmbeddingVector;
