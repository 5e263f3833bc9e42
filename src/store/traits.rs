//! `EngagementStore` trait: the history the dedup guard reads and the
//! controller appends to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::PersistenceError;
use crate::pipeline::types::EngagementRecord;

/// Backend-agnostic, append-only engagement log.
#[async_trait]
pub trait EngagementStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), PersistenceError>;

    /// Most recent record for `(screen_name, search_term, language)` with
    /// `engaged_at >= since`, if any.
    async fn find_recent(
        &self,
        screen_name: &str,
        search_term: &str,
        language: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<EngagementRecord>, PersistenceError>;

    /// Append a record. Records are never updated or deleted.
    async fn append(&self, record: &EngagementRecord) -> Result<(), PersistenceError>;

    /// Number of records with `engaged_at >= since`.
    async fn count_since(&self, since: DateTime<Utc>) -> Result<usize, PersistenceError>;
}
