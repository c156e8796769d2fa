use chrono::{DateTime, Utc};

use super::{EmbeddingVector, IssueCreated};

/// The persisted record for one ingested issue. Written once, never updated.
#[derive(Debug, Clone, PartialEq)]
pub struct FingerprintRow {
    pub repository: String,
    pub issue_number: i64,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub embedding: EmbeddingVector,
}

impl FingerprintRow {
    pub fn from_issue(issue: &IssueCreated, embedding: EmbeddingVector) -> Self {
        Self {
            repository: issue.repository.full_name(),
            issue_number: issue.number,
            title: issue.title.clone(),
            body: issue.body.clone(),
            created_at: issue.created_at,
            embedding,
        }
    }
}
