//! Decoding of verified webhook bodies into [`IssueCreated`].
//!
//! Only `issues` deliveries with action `opened` are applicable. Every other
//! event kind or action is a no-op, not an error.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::models::{IssueCreated, Repository};

/// `X-GitHub-Event` value for issue activity.
pub const ISSUES_EVENT: &str = "issues";

/// The only `issues` action the pipeline reacts to.
pub const OPENED_ACTION: &str = "opened";

#[derive(Error, Debug)]
pub enum EventError {
    #[error("Malformed {kind} payload: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct ActionOnly {
    action: String,
}

#[derive(Debug, Deserialize)]
struct IssuesPayload {
    issue: IssuePayload,
    repository: RepositoryPayload,
}

#[derive(Debug, Deserialize)]
struct IssuePayload {
    number: i64,
    title: String,
    body: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RepositoryPayload {
    name: String,
    owner: OwnerPayload,
}

#[derive(Debug, Deserialize)]
struct OwnerPayload {
    login: String,
}

/// Parse a verified webhook body.
///
/// Returns `Ok(None)` for deliveries the pipeline does not handle, and an
/// error only when an `issues` body cannot be decoded.
pub fn parse_event(kind: &str, body: &[u8]) -> Result<Option<IssueCreated>, EventError> {
    if kind != ISSUES_EVENT {
        tracing::debug!(kind = kind, "Ignoring non-issues event");
        return Ok(None);
    }

    let malformed = |source| EventError::Malformed {
        kind: kind.to_string(),
        source,
    };

    let head: ActionOnly = serde_json::from_slice(body).map_err(malformed)?;
    if head.action != OPENED_ACTION {
        tracing::debug!(action = %head.action, "Ignoring issues event");
        return Ok(None);
    }

    let payload: IssuesPayload = serde_json::from_slice(body).map_err(malformed)?;

    Ok(Some(IssueCreated {
        repository: Repository::new(payload.repository.owner.login, payload.repository.name),
        number: payload.issue.number,
        title: payload.issue.title,
        body: payload.issue.body.unwrap_or_default(),
        created_at: payload.issue.created_at,
    }))
}
