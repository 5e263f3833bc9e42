//! libSQL backend: async `EngagementStore` implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::PersistenceError;
use crate::pipeline::types::{Coordinates, EngagementRecord};
use crate::store::migrations;
use crate::store::traits::EngagementStore;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PersistenceError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| PersistenceError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests and dry runs).
    pub async fn new_memory() -> Result<Self, PersistenceError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                PersistenceError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, PersistenceError> {
        let conn = db
            .connect()
            .map_err(|e| PersistenceError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Fixed-width UTC timestamp so text comparison orders chronologically.
fn fmt_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Convert `Option<String>` to libsql Value.
fn opt_text_owned(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

const ENGAGEMENT_COLUMNS: &str = "id, status_id, screen_name, posted_at, text, engaged_at, search_term, language, place, coordinates, dry_run";

/// Map a libsql Row to an EngagementRecord. Column order matches ENGAGEMENT_COLUMNS.
fn row_to_record(row: &libsql::Row) -> Result<EngagementRecord, PersistenceError> {
    let get_err = |e: libsql::Error| PersistenceError::Query(format!("row parse: {e}"));

    let id_str: String = row.get(0).map_err(get_err)?;
    let posted_str: String = row.get(3).map_err(get_err)?;
    let engaged_str: String = row.get(5).map_err(get_err)?;
    let coordinates_str: Option<String> = row.get(9).ok();
    let dry_run: i64 = row.get(10).unwrap_or(0);

    let coordinates = match coordinates_str {
        Some(raw) => Some(
            serde_json::from_str::<Coordinates>(&raw)
                .map_err(|e| PersistenceError::Serialization(format!("coordinates: {e}")))?,
        ),
        None => None,
    };

    Ok(EngagementRecord {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| PersistenceError::Serialization(format!("id: {e}")))?,
        status_id: row.get(1).map_err(get_err)?,
        screen_name: row.get(2).map_err(get_err)?,
        posted_at: parse_datetime(&posted_str),
        text: row.get(4).map_err(get_err)?,
        engaged_at: parse_datetime(&engaged_str),
        search_term: row.get(6).map_err(get_err)?,
        language: row.get(7).map_err(get_err)?,
        place: row.get(8).ok(),
        coordinates,
        dry_run: dry_run != 0,
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl EngagementStore for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), PersistenceError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn find_recent(
        &self,
        screen_name: &str,
        search_term: &str,
        language: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<EngagementRecord>, PersistenceError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {ENGAGEMENT_COLUMNS} FROM engagements
                     WHERE screen_name = ?1 AND search_term = ?2 AND language = ?3
                       AND engaged_at >= ?4
                     ORDER BY engaged_at DESC LIMIT 1"
                ),
                params![screen_name, search_term, language, fmt_datetime(since)],
            )
            .await
            .map_err(|e| PersistenceError::Query(format!("find_recent: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_record(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(PersistenceError::Query(format!("find_recent: {e}"))),
        }
    }

    async fn append(&self, record: &EngagementRecord) -> Result<(), PersistenceError> {
        let coordinates = record
            .coordinates
            .map(|c| serde_json::to_string(&c))
            .transpose()
            .map_err(|e| PersistenceError::Serialization(format!("coordinates: {e}")))?;

        self.conn()
            .execute(
                &format!(
                    "INSERT INTO engagements ({ENGAGEMENT_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                params![
                    record.id.to_string(),
                    record.status_id.clone(),
                    record.screen_name.clone(),
                    fmt_datetime(record.posted_at),
                    record.text.clone(),
                    fmt_datetime(record.engaged_at),
                    record.search_term.clone(),
                    record.language.clone(),
                    opt_text_owned(record.place.clone()),
                    opt_text_owned(coordinates),
                    record.dry_run as i64,
                ],
            )
            .await
            .map_err(|e| PersistenceError::Query(format!("append: {e}")))?;

        debug!(
            id = %record.id,
            screen_name = %record.screen_name,
            search_term = %record.search_term,
            "Engagement recorded"
        );
        Ok(())
    }

    async fn count_since(&self, since: DateTime<Utc>) -> Result<usize, PersistenceError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM engagements WHERE engaged_at >= ?1",
                params![fmt_datetime(since)],
            )
            .await
            .map_err(|e| PersistenceError::Query(format!("count_since: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| PersistenceError::Query(format!("count_since: {e}")))?;
                Ok(count as usize)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(PersistenceError::Query(format!("count_since: {e}"))),
        }
    }
}
