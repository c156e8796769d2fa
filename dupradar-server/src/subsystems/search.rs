//! Similarity search subsystem: nearest stored fingerprints for a vector
//!
//! The distance expression comes from the configured `DistanceMetric`, so the
//! query always agrees with the operator class the index was built with.
//! Results are ordered ascending by distance; no distance ceiling is applied
//! here, the triage decision owns the threshold.

use async_trait::async_trait;
use dupradar_core::config::{SearchScope, VectorSearchConfig};
use dupradar_core::db::TableName;
use dupradar_core::{DistanceMetric, EmbeddingVector, SimilarityCandidate};
use sqlx::PgPool;
use thiserror::Error;
use tokio_retry::Retry;

use super::RetryPolicy;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("vector search failed after {attempts} attempt(s): {source}")]
    Query {
        attempts: usize,
        #[source]
        source: sqlx::Error,
    },
}

/// Nearest-neighbour lookup over stored issue fingerprints.
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    /// Up to `k` candidates sorted ascending by distance. `repository` is the
    /// full name of the repository the new issue belongs to.
    async fn nearest(
        &self,
        vector: &EmbeddingVector,
        repository: &str,
        k: usize,
    ) -> Result<Vec<SimilarityCandidate>, SearchError>;
}

/// Fields of the configuration the searcher needs.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub metric: DistanceMetric,
    pub scope: SearchScope,
    pub table: TableName,
    pub retry: RetryPolicy,
}

impl SearchSettings {
    pub fn new(config: &VectorSearchConfig, table: TableName, retry: RetryPolicy) -> Self {
        Self {
            metric: config.distance_type,
            scope: config.scope,
            table,
            retry,
        }
    }

    /// `$1` is the query vector, `$2` the limit, `$3` the repository when
    /// the scope is restricted.
    pub fn query_sql(&self) -> String {
        let filter = match self.scope {
            SearchScope::All => "",
            SearchScope::Repository => " WHERE repository = $3",
        };
        format!(
            "SELECT issue_number, repository, {}::float8 AS distance FROM {}{} ORDER BY distance ASC LIMIT $2",
            self.metric.distance_expr("embedding", "$1"),
            self.table.qualified(),
            filter
        )
    }
}

pub struct PgVectorSearcher {
    pool: PgPool,
    settings: SearchSettings,
    sql: String,
}

impl PgVectorSearcher {
    pub fn new(pool: PgPool, settings: SearchSettings) -> Self {
        let sql = settings.query_sql();
        Self {
            pool,
            settings,
            sql,
        }
    }

    async fn query_once(
        &self,
        vector: &pgvector::Vector,
        repository: &str,
        k: i64,
    ) -> Result<Vec<SimilarityCandidate>, sqlx::Error> {
        let mut query = sqlx::query_as::<_, (i64, String, f64)>(&self.sql)
            .bind(vector)
            .bind(k);
        if self.settings.scope == SearchScope::Repository {
            query = query.bind(repository);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|(issue_number, repository, distance)| {
                SimilarityCandidate::new(issue_number, repository, distance)
            })
            .collect())
    }
}

#[async_trait]
impl SimilaritySearch for PgVectorSearcher {
    async fn nearest(
        &self,
        vector: &EmbeddingVector,
        repository: &str,
        k: usize,
    ) -> Result<Vec<SimilarityCandidate>, SearchError> {
        let pg_vector = vector.to_pgvector();
        let limit = i64::try_from(k).unwrap_or(i64::MAX);

        let candidates = Retry::spawn(self.settings.retry.strategy(), || {
            self.query_once(&pg_vector, repository, limit)
        })
        .await
        .map_err(|source| SearchError::Query {
            attempts: self.settings.retry.max_attempts,
            source,
        })?;

        for candidate in &candidates {
            tracing::debug!(
                issue = candidate.issue_number,
                repo = %candidate.repository,
                distance = candidate.distance,
                metric = %self.settings.metric,
                "Similarity candidate"
            );
        }

        Ok(candidates)
    }
}
