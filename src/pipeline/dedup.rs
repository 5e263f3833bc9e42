//! Dedup guard: never correct the same user for the same rule twice
//! inside the window.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::debug;

use crate::error::PersistenceError;
use crate::store::EngagementStore;

/// Default rolling window.
pub const DEFAULT_DEDUP_WINDOW_HOURS: i64 = 24;

pub struct DedupGuard {
    store: Arc<dyn EngagementStore>,
    window: Duration,
}

impl DedupGuard {
    pub fn new(store: Arc<dyn EngagementStore>, window: Duration) -> Self {
        Self { store, window }
    }

    /// True if any record for the triple has `engaged_at >= now - window`.
    pub async fn already_engaged(
        &self,
        screen_name: &str,
        search_term: &str,
        language: &str,
    ) -> Result<bool, PersistenceError> {
        let since = Utc::now() - self.window;
        let previous = self
            .store
            .find_recent(screen_name, search_term, language, since)
            .await?;

        if let Some(ref record) = previous {
            debug!(
                screen_name,
                search_term,
                last_engaged_at = %record.engaged_at,
                "User already engaged inside dedup window"
            );
        }
        Ok(previous.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    use crate::pipeline::types::{EngagementRecord, Rule, SearchCandidate};
    use crate::store::LibSqlBackend;

    async fn guard() -> (DedupGuard, Arc<LibSqlBackend>) {
        let store = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let guard = DedupGuard::new(
            store.clone(),
            Duration::hours(DEFAULT_DEDUP_WINDOW_HOURS),
        );
        (guard, store)
    }

    fn record(user: &str, term: &str, engaged_at: DateTime<Utc>) -> EngagementRecord {
        let candidate = SearchCandidate {
            id: "1".into(),
            author_handle: user.into(),
            text: format!("algo {term}"),
            created_at: engaged_at,
            place: None,
            coordinates: None,
        };
        EngagementRecord::new(&candidate, &Rule::new(term, "msg", "es"), engaged_at, false)
    }

    #[tokio::test]
    async fn fresh_user_not_engaged() {
        let (guard, _) = guard().await;
        assert!(!guard.already_engaged("ana", "tí", "es").await.unwrap());
    }

    #[tokio::test]
    async fn engaged_within_window() {
        let (guard, store) = guard().await;
        store.append(&record("ana", "tí", Utc::now())).await.unwrap();
        assert!(guard.already_engaged("ana", "tí", "es").await.unwrap());
        // Asking again does not change the answer.
        assert!(guard.already_engaged("ana", "tí", "es").await.unwrap());
    }

    #[tokio::test]
    async fn window_expires() {
        let (guard, store) = guard().await;
        store
            .append(&record("ana", "tí", Utc::now() - Duration::hours(25)))
            .await
            .unwrap();
        assert!(!guard.already_engaged("ana", "tí", "es").await.unwrap());
    }

    #[tokio::test]
    async fn other_rule_is_independent() {
        let (guard, store) = guard().await;
        store.append(&record("ana", "tí", Utc::now())).await.unwrap();
        assert!(!guard.already_engaged("ana", "cuidate", "es").await.unwrap());
        assert!(!guard.already_engaged("luis", "tí", "es").await.unwrap());
    }

    #[tokio::test]
    async fn custom_window() {
        let store = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let guard = DedupGuard::new(store.clone(), Duration::hours(1));
        store
            .append(&record("ana", "tí", Utc::now() - Duration::hours(2)))
            .await
            .unwrap();
        assert!(!guard.already_engaged("ana", "tí", "es").await.unwrap());
    }
}
