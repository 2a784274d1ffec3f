//! SQLite implementation of the FailureLog.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::domain::errors::DomainResult;
use crate::domain::ports::{failure_dedup_key, FailureLog, FailureQuery};

use super::format_datetime;

#[derive(Clone)]
pub struct SqliteFailureLog {
    pool: SqlitePool,
}

impl SqliteFailureLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FailureLog for SqliteFailureLog {
    async fn record_failure(
        &self,
        category: &str,
        file_path: Option<&str>,
        detail: &str,
    ) -> DomainResult<i64> {
        let now = Utc::now();
        let dedup_key = failure_dedup_key(category, file_path, detail, now.date_naive());

        let result = sqlx::query(
            r#"INSERT OR IGNORE INTO failure_events (category, file_path, detail, dedup_key, occurred_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(category)
        .bind(file_path)
        .bind(detail)
        .bind(&dedup_key)
        .bind(format_datetime(now))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(result.last_insert_rowid());
        }

        let (id,): (i64,) = sqlx::query_as("SELECT id FROM failure_events WHERE dedup_key = ?")
            .bind(&dedup_key)
            .fetch_one(&self.pool)
            .await?;
        tracing::debug!(id, category, "duplicate failure ignored");
        Ok(id)
    }

    async fn count_failures(&self, query: &FailureQuery) -> DomainResult<u64> {
        let mut sql = String::from("SELECT COUNT(*) FROM failure_events WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();

        if let Some(category) = &query.category {
            sql.push_str(" AND category = ?");
            bindings.push(category.clone());
        }

        if let Some(since) = query.since {
            sql.push_str(" AND occurred_at >= ?");
            bindings.push(format_datetime(since));
        }

        if let Some(file_path) = &query.file_path {
            sql.push_str(" AND file_path = ?");
            bindings.push(file_path.clone());
        }

        let mut q = sqlx::query_scalar::<_, i64>(&sql);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let count = q.fetch_one(&self.pool).await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
