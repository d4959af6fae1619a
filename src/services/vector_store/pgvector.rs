use async_trait::async_trait;
use pgvector::Vector;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use std::time::Duration;

use super::VectorIndex;
use crate::error::IndexError;
use crate::models::{
    IndexConfig, IndexDescription, IndexEntry, IndexSpec, Metric, QueryMatch, UpsertResult,
    VectorDriver,
};

const DEFAULT_SCHEMA: &str = "public";

/// PostgreSQL backend storing one table per index.
pub struct PgVectorBackend {
    pool: PgPool,
    schema: String,
    metric: Metric,
}

/// Quote an identifier for interpolation into SQL.
fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

impl PgVectorBackend {
    pub async fn new(config: &IndexConfig) -> Result<Self, IndexError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max)
            .acquire_timeout(Duration::from_secs(config.pool_acquire_timeout.into()))
            .connect(&config.url)
            .await
            .map_err(|e| IndexError::Unavailable(e.to_string()))?;

        let backend = Self {
            pool,
            schema: config
                .schema
                .clone()
                .unwrap_or_else(|| DEFAULT_SCHEMA.to_string()),
            metric: config.metric,
        };

        backend.check_pgvector_extension().await?;

        if backend.schema != DEFAULT_SCHEMA {
            backend.ensure_schema().await?;
        }

        Ok(backend)
    }

    async fn check_pgvector_extension(&self) -> Result<(), IndexError> {
        let result: Option<(String,)> =
            sqlx::query_as("SELECT extname FROM pg_extension WHERE extname = 'vector'")
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| IndexError::PostgresError(e.to_string()))?;

        if result.is_none() {
            return Err(IndexError::PgVectorExtensionError(
                "pgvector extension is not installed. Run: CREATE EXTENSION vector;".to_string(),
            ));
        }

        Ok(())
    }

    async fn ensure_schema(&self) -> Result<(), IndexError> {
        let query = format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(&self.schema));
        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| IndexError::PostgresError(e.to_string()))?;
        Ok(())
    }

    fn table(&self, index: &str) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(index))
    }

    fn ops_class(metric: Metric) -> &'static str {
        match metric {
            Metric::Cosine => "vector_cosine_ops",
            Metric::Euclidean => "vector_l2_ops",
            Metric::Dot => "vector_ip_ops",
        }
    }

    /// Distance operator and the expression turning it into a higher-is-better score.
    fn score_expr(metric: Metric) -> (&'static str, &'static str) {
        match metric {
            Metric::Cosine => ("<=>", "1 - (embedding <=> $1)"),
            Metric::Euclidean => ("<->", "-(embedding <-> $1)"),
            // <#> yields the negated inner product
            Metric::Dot => ("<#>", "-(embedding <#> $1)"),
        }
    }
}

#[async_trait]
impl VectorIndex for PgVectorBackend {
    async fn health_check(&self) -> Result<bool, IndexError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| true)
            .map_err(|e| IndexError::Unavailable(e.to_string()))
    }

    async fn list_indexes(&self) -> Result<Vec<String>, IndexError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT c.table_name
            FROM information_schema.columns c
            WHERE c.table_schema = $1 AND c.column_name = 'embedding' AND c.udt_name = 'vector'
            ORDER BY c.table_name
            "#,
        )
        .bind(&self.schema)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexError::PostgresError(e.to_string()))?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<(), IndexError> {
        let table = self.table(&spec.name);

        let create_table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                row_index BIGINT NOT NULL,
                text TEXT NOT NULL,
                embedding vector({}) NOT NULL
            )
            "#,
            table, spec.dimension
        );

        sqlx::query(&create_table)
            .execute(&self.pool)
            .await
            .map_err(|e| IndexError::Collection(e.to_string()))?;

        let create_hnsw = format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} USING hnsw (embedding {})",
            quote_ident(&format!("{}_embedding_idx", spec.name)),
            table,
            Self::ops_class(spec.metric)
        );

        sqlx::query(&create_hnsw)
            .execute(&self.pool)
            .await
            .map_err(|e| IndexError::Collection(e.to_string()))?;

        Ok(())
    }

    async fn describe_index(&self, name: &str) -> Result<Option<IndexDescription>, IndexError> {
        let table = self.table(name);

        let dimension: Option<(i32,)> = sqlx::query_as(
            "SELECT atttypmod FROM pg_attribute WHERE attrelid = to_regclass($1) AND attname = 'embedding'",
        )
        .bind(&table)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IndexError::PostgresError(e.to_string()))?;

        let Some((typmod,)) = dimension else {
            return Ok(None);
        };

        let query = format!("SELECT COUNT(*) as count FROM {}", table);
        let row: (i64,) = sqlx::query_as(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| IndexError::PostgresError(e.to_string()))?;

        Ok(Some(IndexDescription {
            name: name.to_string(),
            dimension: u64::try_from(typmod).ok(),
            entry_count: row.0 as u64,
        }))
    }

    async fn upsert(
        &self,
        index: &str,
        entries: Vec<IndexEntry>,
    ) -> Result<UpsertResult, IndexError> {
        if entries.is_empty() {
            return Ok(UpsertResult::default());
        }

        let query = format!(
            r#"
            INSERT INTO {} (id, row_index, text, embedding)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                row_index = EXCLUDED.row_index,
                text = EXCLUDED.text,
                embedding = EXCLUDED.embedding
            "#,
            self.table(index)
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IndexError::Unavailable(e.to_string()))?;

        let upserted_count = entries.len();
        for entry in entries {
            let embedding = Vector::from(entry.values);

            sqlx::query(&query)
                .bind(&entry.id)
                .bind(entry.metadata.row_index as i64)
                .bind(&entry.metadata.text)
                .bind(&embedding)
                .execute(&mut *tx)
                .await
                .map_err(|e| IndexError::Upsert(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| IndexError::Upsert(e.to_string()))?;

        Ok(UpsertResult { upserted_count })
    }

    async fn query(
        &self,
        index: &str,
        vector: Vec<f32>,
        top_k: u64,
    ) -> Result<Vec<QueryMatch>, IndexError> {
        let embedding = Vector::from(vector);
        let (operator, score) = Self::score_expr(self.metric);

        let query = format!(
            r#"
            SELECT id, row_index, text, ({})::float8 as score
            FROM {}
            ORDER BY embedding {} $1
            LIMIT {}
            "#,
            score,
            self.table(index),
            operator,
            top_k
        );

        let rows = sqlx::query(&query)
            .bind(&embedding)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| IndexError::Query(e.to_string()))?;

        let matches = rows
            .into_iter()
            .map(|row: PgRow| {
                let score: f64 = row.get("score");
                let row_index: i64 = row.get("row_index");
                QueryMatch {
                    id: row.get("id"),
                    score: score as f32,
                    row_index: u64::try_from(row_index).ok(),
                    text: row.get("text"),
                }
            })
            .collect();

        Ok(matches)
    }

    fn driver(&self) -> VectorDriver {
        VectorDriver::PostgreSQL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("car-data-index"), "\"car-data-index\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_ops_class_follows_metric() {
        assert_eq!(PgVectorBackend::ops_class(Metric::Cosine), "vector_cosine_ops");
        assert_eq!(PgVectorBackend::ops_class(Metric::Euclidean), "vector_l2_ops");
        assert_eq!(PgVectorBackend::ops_class(Metric::Dot), "vector_ip_ops");
    }

    #[test]
    fn test_score_expr_uses_matching_operator() {
        for metric in [Metric::Cosine, Metric::Euclidean, Metric::Dot] {
            let (operator, score) = PgVectorBackend::score_expr(metric);
            assert!(score.contains(operator));
        }
    }
}
