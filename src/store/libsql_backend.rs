//! libSQL backend: durable pointer store and entity tracker.
//!
//! Supports local file and in-memory databases. The entity tracker plays
//! both pipeline collaborator roles: it lists pending entities and records
//! outcomes with skip-if-already-set semantics, so re-delivered batches
//! never overwrite a decision.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database, params};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, StoreError};
use crate::pipeline::types::{EntitySource, OutcomeSink, Outcomes, PendingEntity, Verdict};
use crate::store::migrations;
use crate::store::traits::PointerStore;

/// Tracker row as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    pub row: i64,
    pub name: String,
    /// `Approved` / `Declined`, or empty while undecided.
    pub status: String,
    /// `Needs review`, or empty.
    pub review_flag: String,
    /// Id of the message behind the latest recorded outcome.
    pub message_id: Option<String>,
}

/// libSQL database backend with a single reused connection.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<Database>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to open libSQL database: {e}")))?;
        let backend = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests and dry runs).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                StoreError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: Database) -> Result<Self, StoreError> {
        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    // ── Entity tracker ──────────────────────────────────────────────

    /// Append entity names not yet tracked.
    ///
    /// Names are trimmed and compared case-insensitively; blanks and
    /// duplicates are skipped. New rows get increasing positions starting at
    /// `start_row` or after the last existing row, whichever is later.
    /// Returns the number of rows added.
    pub async fn import_entities<S: AsRef<str>>(
        &self,
        start_row: i64,
        names: &[S],
    ) -> Result<usize, StoreError> {
        let records = self.all_entities().await?;
        let mut known: HashSet<String> = records.iter().map(|r| match_key(&r.name)).collect();
        let mut next_row = records
            .last()
            .map(|r| r.row + 1)
            .unwrap_or(start_row)
            .max(start_row);

        let now = Utc::now().to_rfc3339();
        let mut added = 0;
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() || !known.insert(match_key(name)) {
                continue;
            }
            self.conn
                .execute(
                    "INSERT INTO entities (row_position, name, updated_at) VALUES (?1, ?2, ?3)",
                    params![next_row, name, now.as_str()],
                )
                .await
                .map_err(|e| StoreError::Query(format!("import_entities: {e}")))?;
            next_row += 1;
            added += 1;
        }

        info!(added, total = known.len(), "Entities imported");
        Ok(added)
    }

    /// Every tracked row, ordered by position.
    pub async fn all_entities(&self) -> Result<Vec<EntityRecord>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT row_position, name, status, review_flag, message_id FROM entities ORDER BY row_position ASC",
                (),
            )
            .await
            .map_err(|e| StoreError::Query(format!("all_entities: {e}")))?;

        let mut records = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("all_entities: {e}")))?
        {
            records.push(EntityRecord {
                row: row
                    .get(0)
                    .map_err(|e| StoreError::Query(format!("entity row: {e}")))?,
                name: row
                    .get(1)
                    .map_err(|e| StoreError::Query(format!("entity name: {e}")))?,
                status: row.get(2).unwrap_or_default(),
                review_flag: row.get(3).unwrap_or_default(),
                message_id: row.get::<String>(4).ok(),
            });
        }
        Ok(records)
    }

    /// First row tracking `name` (trimmed, case-insensitive).
    pub async fn entity_status(&self, name: &str) -> Result<Option<EntityRecord>, StoreError> {
        let key = match_key(name);
        Ok(self
            .all_entities()
            .await?
            .into_iter()
            .find(|r| match_key(&r.name) == key))
    }

    async fn apply_decision(
        &self,
        record: &EntityRecord,
        verdict: Verdict,
        message_id: &str,
    ) -> Result<bool, StoreError> {
        let now = Utc::now().to_rfc3339();
        let changed = match verdict {
            Verdict::Approve | Verdict::Decline => self
                .conn
                .execute(
                    "UPDATE entities SET status = ?1, message_id = ?2, updated_at = ?3 WHERE row_position = ?4 AND status = ''",
                    params![verdict.label(), message_id, now.as_str(), record.row],
                )
                .await,
            Verdict::Review => self
                .conn
                .execute(
                    "UPDATE entities SET review_flag = ?1, message_id = ?2, updated_at = ?3 WHERE row_position = ?4 AND status = ''",
                    params![verdict.label(), message_id, now.as_str(), record.row],
                )
                .await,
        }
        .map_err(|e| StoreError::Query(format!("write outcome: {e}")))?;
        Ok(changed > 0)
    }
}

/// Tracker lookup key: trimmed, lowercased.
fn match_key(name: &str) -> String {
    name.trim().to_lowercase()
}

// ── Pointer store ───────────────────────────────────────────────────

#[async_trait]
impl PointerStore for LibSqlBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut rows = self
            .conn
            .query("SELECT value FROM pointers WHERE key = ?1", params![key])
            .await
            .map_err(|e| StoreError::Query(format!("get pointer: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("get pointer: {e}")))?
        {
            Some(row) => row
                .get::<String>(0)
                .map(Some)
                .map_err(|e| StoreError::Query(format!("get pointer row: {e}"))),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO pointers (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("set pointer: {e}")))?;
        debug!(key, value, "Pointer stored");
        Ok(())
    }
}

// ── Pipeline collaborators ──────────────────────────────────────────

#[async_trait]
impl EntitySource for LibSqlBackend {
    async fn pending_entities(&self) -> Result<Vec<PendingEntity>, PipelineError> {
        let records = self
            .all_entities()
            .await
            .map_err(|e| PipelineError::Entities(e.to_string()))?;
        Ok(records
            .into_iter()
            .filter(|r| r.status.trim().is_empty())
            .map(|r| PendingEntity {
                row: r.row,
                name: r.name,
            })
            .collect())
    }
}

#[async_trait]
impl OutcomeSink for LibSqlBackend {
    async fn write_outcomes(&self, outcomes: &Outcomes<'_>) -> Result<(), PipelineError> {
        let records = self
            .all_entities()
            .await
            .map_err(|e| PipelineError::Sink(e.to_string()))?;

        let mut updated = 0;
        let mut unmatched = 0;
        for verdict in [Verdict::Approve, Verdict::Decline, Verdict::Review] {
            for (entity, summary) in outcomes.bucket(verdict) {
                let key = match_key(entity);
                let Some(record) = records.iter().find(|r| match_key(&r.name) == key) else {
                    unmatched += 1;
                    continue;
                };
                if self
                    .apply_decision(record, verdict, &summary.id)
                    .await
                    .map_err(|e| PipelineError::Sink(e.to_string()))?
                {
                    updated += 1;
                } else {
                    debug!(entity = %entity, row = record.row, "Row already decided, skipping");
                }
            }
        }

        if unmatched > 0 {
            warn!(unmatched, "Outcomes without a matching tracker row");
        }
        info!(updated, "Outcomes written");
        Ok(())
    }
}
