pub mod config;
pub mod db;
pub mod distance;
pub mod embeddings;
pub mod error;
pub mod event;
pub mod models;
pub mod signature;
pub mod triage;

pub use config::DupRadarConfig;
pub use distance::DistanceMetric;
pub use embeddings::{
    EmbeddingBackend, EmbeddingError, TaskType, VertexConfig, VertexEmbeddingClient,
};
pub use error::DupRadarError;
pub use event::{parse_event, EventError};
pub use models::{EmbeddingVector, FingerprintRow, IssueCreated, Repository, SimilarityCandidate};
pub use signature::{SignatureError, SignatureVerifier};
pub use triage::{decide, TriageDecision, TriageSettings};
