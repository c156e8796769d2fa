use crate::config::DatabaseConfig;
use crate::distance::DistanceMetric;
use crate::error::DupRadarError;
use sqlx::{postgres::PgPoolOptions, PgPool};

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
}

pub async fn health_check(pool: &PgPool) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT version()").fetch_one(pool).await?;
    Ok(row.0)
}

pub async fn check_pgvector(pool: &PgPool) -> Result<String, sqlx::Error> {
    let row: (String,) =
        sqlx::query_as("SELECT extversion FROM pg_extension WHERE extname = 'vector'")
            .fetch_one(pool)
            .await?;
    Ok(row.0)
}

/// Fully-qualified fingerprint table name (schema + table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    schema: String,
    table: String,
}

impl TableName {
    pub fn new(
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Result<Self, DupRadarError> {
        let schema = schema.into();
        let table = table.into();
        if schema.trim().is_empty() {
            return Err(DupRadarError::InvalidTable("schema name is required"));
        }
        if table.trim().is_empty() {
            return Err(DupRadarError::InvalidTable("table name is required"));
        }
        Ok(Self { schema, table })
    }

    pub fn from_config(config: &DatabaseConfig) -> Result<Self, DupRadarError> {
        Self::new(config.schema.clone(), config.table.clone())
    }

    /// Fully-qualified table reference with quoted identifiers.
    pub fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }

    /// Name of the ANN index built for `metric`.
    pub fn index_name(&self, metric: DistanceMetric) -> String {
        let suffix = match metric {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::DotProduct => "ip",
            DistanceMetric::Euclidean => "l2",
        };
        quote_ident(&format!(
            "{}_embedding_{}_idx",
            sanitize_ident(&self.table),
            suffix
        ))
    }
}

/// Quotes Postgres identifiers, escaping embedded quotes.
pub fn quote_ident(input: &str) -> String {
    let escaped = input.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

fn sanitize_ident(input: &str) -> String {
    input
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect()
}

/// DDL statements that provision the fingerprint table for the configured
/// metric and dimensionality. Every statement is idempotent.
pub fn schema_statements(
    table: &TableName,
    dimensions: usize,
    metric: DistanceMetric,
) -> Vec<String> {
    vec![
        "CREATE EXTENSION IF NOT EXISTS vector".to_string(),
        format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(&table.schema)),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id BIGSERIAL PRIMARY KEY,
                repository TEXT NOT NULL,
                issue_number BIGINT NOT NULL,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                embedding VECTOR({}) NOT NULL,
                inserted_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
            table.qualified(),
            dimensions
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} USING hnsw (embedding {})",
            table.index_name(metric),
            table.qualified(),
            metric.index_ops()
        ),
    ]
}

/// Create the pgvector extension, fingerprint table and ANN index.
pub async fn provision_schema(
    pool: &PgPool,
    table: &TableName,
    dimensions: usize,
    metric: DistanceMetric,
) -> Result<(), DupRadarError> {
    for statement in schema_statements(table, dimensions, metric) {
        sqlx::query(&statement).execute(pool).await?;
    }
    tracing::info!(
        table = %table.qualified(),
        dimensions,
        metric = %metric,
        "Fingerprint schema provisioned"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("issues"), "\"issues\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_table_name_requires_both_parts() {
        assert!(matches!(
            TableName::new("", "t"),
            Err(DupRadarError::InvalidTable(_))
        ));
        assert!(matches!(
            TableName::new("public", "  "),
            Err(DupRadarError::InvalidTable(_))
        ));
        let table = TableName::new("public", "issue_fingerprints").unwrap();
        assert_eq!(table.qualified(), "\"public\".\"issue_fingerprints\"");
    }

    #[test]
    fn test_schema_uses_metric_ops_and_dimensions() {
        let table = TableName::new("triage", "fp").unwrap();
        let ddl = schema_statements(&table, 5, DistanceMetric::DotProduct).join(";\n");

        assert!(ddl.contains("VECTOR(5)"), "{}", ddl);
        assert!(ddl.contains("USING hnsw (embedding vector_ip_ops)"), "{}", ddl);
        assert!(ddl.contains("\"fp_embedding_ip_idx\""), "{}", ddl);
        assert!(ddl.contains("CREATE SCHEMA IF NOT EXISTS \"triage\""), "{}", ddl);
    }
}
