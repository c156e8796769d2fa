//! Embeddings module for DupRadar: Vertex AI text embeddings
//!
//! Provides an `EmbeddingBackend` trait and the Vertex AI `:predict`
//! implementation used to fingerprint issue text.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use crate::models::EmbeddingVector;

// ============================================================================
// EmbeddingBackend trait
// ============================================================================

/// Abstraction over embedding providers.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed `text` with the given task-type hint.
    async fn embed(&self, text: &str, task_type: TaskType)
        -> Result<EmbeddingVector, EmbeddingError>;

    /// Returns the embedding dimension (e.g., 768).
    fn dimensions(&self) -> usize;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Task types
// ============================================================================

/// Task type hint sent with every instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    #[default]
    RetrievalDocument,
    RetrievalQuery,
    SemanticSimilarity,
    Clustering,
}

// ============================================================================
// Error types
// ============================================================================

/// Embedding generation errors. All of them mean "embedding unavailable".
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Invalid response: expected {expected} dimensions, got {actual}")]
    InvalidDimensions { expected: usize, actual: usize },

    #[error("Provider returned no predictions")]
    EmptyPredictions,

    #[error("Cannot embed empty text")]
    EmptyInput,

    #[error("All {attempts} retry attempts failed: {last}")]
    RetryExhausted { attempts: usize, last: String },
}

impl EmbeddingError {
    /// Client errors other than rate limiting will not succeed on retry.
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::Http(_) => true,
            EmbeddingError::Api { code, .. } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

// ============================================================================
// Config types
// ============================================================================

/// Vertex AI embedding client configuration
#[derive(Debug, Clone)]
pub struct VertexConfig {
    pub project_id: String,
    pub region: String,
    pub model: String,
    pub dimensions: usize,
    /// Bearer token. `None` sends no Authorization header (e.g. behind a proxy
    /// that injects credentials).
    pub api_key: Option<String>,
    /// Characters sent at most; longer text is cut and flagged as truncated.
    pub max_input_chars: usize,
    /// Total attempts per embedding, including the first.
    pub max_attempts: usize,
    pub retry_delay_ms: u64,
    pub request_timeout: Duration,
}

impl VertexConfig {
    /// `call_timeout` is the deadline for one whole `embed` call; each HTTP
    /// request gets an equal share of it so every attempt can run.
    pub fn from_config(
        config: &crate::config::EmbeddingConfig,
        api_key: Option<String>,
        call_timeout: Duration,
    ) -> Self {
        let attempts = u32::try_from(config.max_attempts.max(1)).unwrap_or(u32::MAX);
        Self {
            project_id: config.project_id.clone(),
            region: config.region.to_lowercase(),
            model: config.model.clone(),
            dimensions: config.dimensions,
            api_key: api_key.filter(|k| !k.is_empty()),
            max_input_chars: config.max_input_chars,
            max_attempts: config.max_attempts,
            retry_delay_ms: config.retry_delay_ms,
            request_timeout: call_timeout / attempts,
        }
    }
}

// ============================================================================
// Vertex API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    instances: Vec<PredictInstance<'a>>,
    parameters: PredictParameters,
}

#[derive(Debug, Serialize)]
struct PredictInstance<'a> {
    content: &'a str,
    task_type: TaskType,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictParameters {
    auto_truncate: bool,
    output_dimensionality: usize,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    embeddings: PredictionEmbeddings,
}

#[derive(Debug, Deserialize)]
struct PredictionEmbeddings {
    values: Vec<f32>,
    #[serde(default)]
    statistics: Option<PredictionStatistics>,
}

#[derive(Debug, Deserialize)]
struct PredictionStatistics {
    #[serde(default)]
    token_count: Option<f64>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct VertexErrorResponse {
    error: Option<VertexErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct VertexErrorDetail {
    code: u16,
    message: String,
}

// ============================================================================
// VertexEmbeddingClient
// ============================================================================

/// Vertex AI embedding client: calls the publisher model `:predict` endpoint.
#[derive(Debug, Clone)]
pub struct VertexEmbeddingClient {
    client: Client,
    config: VertexConfig,
    base_url: String,
}

impl VertexEmbeddingClient {
    pub fn new(config: VertexConfig) -> Result<Self, EmbeddingError> {
        let base_url = format!("https://{}-aiplatform.googleapis.com", config.region);
        Self::with_base_url(config, base_url)
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(config: VertexConfig, base_url: String) -> Result<Self, EmbeddingError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            client,
            config,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:predict",
            self.base_url, self.config.project_id, self.config.region, self.config.model
        )
    }

    /// Generate an embedding, retrying transient failures with backoff.
    pub async fn embed_with_task(
        &self,
        text: &str,
        task_type: TaskType,
    ) -> Result<EmbeddingVector, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let (content, cut) = truncate_chars(text, self.config.max_input_chars);
        if cut {
            tracing::warn!(
                chars = text.chars().count(),
                limit = self.config.max_input_chars,
                "Embedding input exceeds ceiling, truncating before request"
            );
        }

        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_attempts.saturating_sub(1));

        let result = RetryIf::spawn(
            retry_strategy,
            || self.embed_once(content, task_type),
            |e: &EmbeddingError| {
                let retry = e.is_retryable();
                if retry {
                    tracing::debug!(error = %e, "Embedding attempt failed, will retry");
                }
                retry
            },
        )
        .await;

        match result {
            Ok(mut vector) => {
                vector.truncated |= cut;
                if vector.truncated {
                    tracing::info!(
                        token_count = ?vector.token_count,
                        "Embedding computed over truncated text"
                    );
                }
                Ok(vector)
            }
            Err(e) if e.is_retryable() => {
                tracing::error!(
                    attempts = self.config.max_attempts,
                    error = %e,
                    "All embedding retry attempts failed"
                );
                Err(EmbeddingError::RetryExhausted {
                    attempts: self.config.max_attempts.max(1),
                    last: e.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn embed_once(
        &self,
        content: &str,
        task_type: TaskType,
    ) -> Result<EmbeddingVector, EmbeddingError> {
        let request = PredictRequest {
            instances: vec![PredictInstance { content, task_type }],
            parameters: PredictParameters {
                auto_truncate: true,
                output_dimensionality: self.config.dimensions,
            },
        };

        let mut builder = self.client.post(self.endpoint()).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let error_detail = serde_json::from_str::<VertexErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error);

            let (code, message) = error_detail
                .map(|e| (e.code, e.message))
                .unwrap_or((status.as_u16(), error_body));

            tracing::error!(code = code, message = %message, "Vertex AI API error");

            return Err(EmbeddingError::Api { code, message });
        }

        let body: PredictResponse = response.json().await?;
        let prediction = body
            .predictions
            .into_iter()
            .next()
            .ok_or(EmbeddingError::EmptyPredictions)?;

        let values = prediction.embeddings.values;
        if values.len() != self.config.dimensions {
            return Err(EmbeddingError::InvalidDimensions {
                expected: self.config.dimensions,
                actual: values.len(),
            });
        }

        let stats = prediction.embeddings.statistics;
        Ok(EmbeddingVector {
            values,
            token_count: stats
                .as_ref()
                .and_then(|s| s.token_count)
                .map(|n| n as u32),
            truncated: stats.map(|s| s.truncated).unwrap_or(false),
        })
    }
}

#[async_trait]
impl EmbeddingBackend for VertexEmbeddingClient {
    async fn embed(
        &self,
        text: &str,
        task_type: TaskType,
    ) -> Result<EmbeddingVector, EmbeddingError> {
        self.embed_with_task(text, task_type).await
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn name(&self) -> &str {
        "vertex"
    }
}

/// Cut `text` to at most `max_chars` characters on a char boundary.
/// Returns the slice and whether anything was cut.
fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}

// ============================================================================
// TESTS
// ============================================================================
