//! Failure event log port.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sha2::{Digest, Sha256};

use crate::domain::errors::DomainResult;

/// Filter for [`FailureLog::count_failures`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureQuery {
    pub category: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub file_path: Option<String>,
}

impl FailureQuery {
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            ..Default::default()
        }
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }
}

#[async_trait]
pub trait FailureLog: Send + Sync {
    /// Record a failure and return its id. An identical failure already
    /// recorded the same day returns the existing id.
    async fn record_failure(
        &self,
        category: &str,
        file_path: Option<&str>,
        detail: &str,
    ) -> DomainResult<i64>;

    async fn count_failures(&self, query: &FailureQuery) -> DomainResult<u64>;
}

/// Idempotency key: hash of category, file path, the first 200 characters of
/// the detail and the day.
pub fn failure_dedup_key(
    category: &str,
    file_path: Option<&str>,
    detail: &str,
    day: NaiveDate,
) -> String {
    let detail: String = detail.chars().take(200).collect();
    let mut hasher = Sha256::new();
    hasher.update(category.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(file_path.unwrap_or("").as_bytes());
    hasher.update(b"\x1f");
    hasher.update(detail.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(day.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}
