use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Repository identifier: `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Repository {
    pub owner: String,
    pub name: String,
}

impl Repository {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A newly opened issue, as projected from an `issues`/`opened` webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueCreated {
    pub repository: Repository,
    pub number: i64,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl IssueCreated {
    /// Text sent to the embedding provider: title and body, newline-joined.
    pub fn embedding_text(&self) -> String {
        format!("{}\n{}", self.title, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_text_joins_title_and_body() {
        let issue = IssueCreated {
            repository: Repository::new("octo", "widgets"),
            number: 12,
            title: "Crash on start".to_string(),
            body: "Segfault in main".to_string(),
            created_at: Utc::now(),
        };
        assert_eq!(issue.embedding_text(), "Crash on start\nSegfault in main");
        assert_eq!(issue.repository.to_string(), "octo/widgets");
        assert_eq!(issue.repository.full_name(), "octo/widgets");
    }
}
