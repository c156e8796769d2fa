//! Comment posting: publishes the triage comment on the new issue via the
//! GitHub REST API. Posting is never retried.

use std::time::Duration;

use async_trait::async_trait;
use dupradar_core::config::GitHubConfig;
use dupradar_core::Repository;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

const GITHUB_ACCEPT: &str = "application/vnd.github+json";

#[derive(Error, Debug)]
pub enum CommentError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("no GitHub token configured")]
    MissingToken,
}

#[async_trait]
pub trait CommentPoster: Send + Sync {
    async fn post(
        &self,
        repository: &Repository,
        issue_number: i64,
        body: &str,
    ) -> Result<(), CommentError>;
}

#[derive(Serialize)]
struct CommentRequest<'a> {
    body: &'a str,
}

pub struct GitHubCommentPoster {
    client: Client,
    api_base: String,
    token: Option<String>,
}

impl GitHubCommentPoster {
    pub fn new(
        config: &GitHubConfig,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, CommentError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn comments_url(&self, repository: &Repository, issue_number: i64) -> String {
        format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.api_base, repository.owner, repository.name, issue_number
        )
    }
}

#[async_trait]
impl CommentPoster for GitHubCommentPoster {
    async fn post(
        &self,
        repository: &Repository,
        issue_number: i64,
        body: &str,
    ) -> Result<(), CommentError> {
        let token = self.token.as_deref().ok_or(CommentError::MissingToken)?;

        let response = self
            .client
            .post(self.comments_url(repository, issue_number))
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, GITHUB_ACCEPT)
            .json(&CommentRequest { body })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CommentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        tracing::info!(repo = %repository, issue = issue_number, "Triage comment posted");
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
