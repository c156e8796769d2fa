//! Fingerprint persistence: one row per processed issue.
//!
//! Inserts are unconditional: a redelivered event produces a second row.

use async_trait::async_trait;
use dupradar_core::db::TableName;
use dupradar_core::FingerprintRow;
use sqlx::PgPool;
use thiserror::Error;
use tokio_retry::Retry;

use super::RetryPolicy;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("fingerprint insert failed after {attempts} attempt(s): {source}")]
    Insert {
        attempts: usize,
        #[source]
        source: sqlx::Error,
    },
}

#[async_trait]
pub trait FingerprintStore: Send + Sync {
    async fn insert(&self, row: &FingerprintRow) -> Result<(), StoreError>;
}

pub struct PgFingerprintWriter {
    pool: PgPool,
    retry: RetryPolicy,
    sql: String,
}

impl PgFingerprintWriter {
    pub fn new(pool: PgPool, table: &TableName, retry: RetryPolicy) -> Self {
        Self {
            pool,
            retry,
            sql: insert_sql(table),
        }
    }

    async fn insert_once(&self, row: &FingerprintRow, vector: &pgvector::Vector) -> Result<(), sqlx::Error> {
        sqlx::query(&self.sql)
            .bind(&row.repository)
            .bind(row.issue_number)
            .bind(&row.title)
            .bind(&row.body)
            .bind(row.created_at)
            .bind(vector)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub fn insert_sql(table: &TableName) -> String {
    format!(
        "INSERT INTO {} (repository, issue_number, title, body, created_at, embedding) \
         VALUES ($1, $2, $3, $4, $5, $6)",
        table.qualified()
    )
}

#[async_trait]
impl FingerprintStore for PgFingerprintWriter {
    async fn insert(&self, row: &FingerprintRow) -> Result<(), StoreError> {
        let vector = row.embedding.to_pgvector();

        Retry::spawn(self.retry.strategy(), || self.insert_once(row, &vector))
            .await
            .map_err(|source| StoreError::Insert {
                attempts: self.retry.max_attempts,
                source,
            })?;

        tracing::info!(
            repo = %row.repository,
            issue = row.issue_number,
            dimensions = row.embedding.dimensions(),
            "Fingerprint stored"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_sql_targets_qualified_table() {
        let table = TableName::new("triage", "fingerprints").unwrap();
        let sql = insert_sql(&table);
        assert!(sql.starts_with("INSERT INTO \"triage\".\"fingerprints\""), "{}", sql);
        assert!(sql.contains("$6"), "{}", sql);
        assert!(!sql.contains("ON CONFLICT"), "inserts are not keyed: {}", sql);
    }
}
