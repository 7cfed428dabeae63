//! libSQL backend — async `Ledger` trait implementation.
//!
//! One local file (or `:memory:` in tests), one connection, one statement
//! per write. Each statement autocommits, so a crash between two messages
//! never leaves a half-written record.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info, warn};

use crate::error::DatabaseError;
use crate::gate::Mode;
use crate::mail::MessageId;
use crate::store::migrations;
use crate::store::traits::{ActionRecord, Ledger};
use crate::triage::{Disposition, DomainHistory, LlmLabel};

/// libSQL ledger backend.
pub struct LibSqlLedger {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlLedger {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db).await?;
        info!(path = %path.display(), "Ledger opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
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

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    // Legacy rows carry naive ISO timestamps without an offset.
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn to_id(value: i64) -> Result<MessageId, DatabaseError> {
    MessageId::try_from(value)
        .map_err(|_| DatabaseError::Query(format!("stored id {value} out of range")))
}

/// Map a libsql Row to an ActionRecord.
///
/// Column order matches ACTION_COLUMNS:
/// 0:epoch, 1:id, 2:timestamp, 3:from_addr, 4:subject, 5:spam_score,
/// 6:llm_label, 7:recommended, 8:final, 9:mode
fn row_to_action(row: &libsql::Row) -> Result<ActionRecord, DatabaseError> {
    let get_err = |e: libsql::Error| DatabaseError::Query(format!("action row parse: {e}"));

    let id: i64 = row.get(1).map_err(get_err)?;
    let timestamp: String = row.get(2).map_err(get_err)?;
    let label: String = row.get::<String>(6).unwrap_or_default();
    let recommended: String = row.get(7).map_err(get_err)?;
    let final_action: String = row.get(8).map_err(get_err)?;
    let mode: String = row.get(9).map_err(get_err)?;

    Ok(ActionRecord {
        epoch: row.get(0).map_err(get_err)?,
        id: to_id(id)?,
        timestamp: parse_datetime(&timestamp),
        from_addr: row.get::<String>(3).unwrap_or_default(),
        subject: row.get::<String>(4).unwrap_or_default(),
        spam_score: row.get::<f64>(5).unwrap_or(0.0),
        llm_label: label.parse().unwrap_or(LlmLabel::Normal),
        recommended: recommended.parse().map_err(DatabaseError::Query)?,
        final_action: final_action.parse().map_err(DatabaseError::Query)?,
        mode: mode.parse().map_err(DatabaseError::Query)?,
    })
}

/// Canonical history key: known dispositions use their persisted name.
fn history_key(action: &str) -> String {
    action
        .parse::<Disposition>()
        .map(|d| d.as_str().to_string())
        .unwrap_or_else(|_| action.to_string())
}

// ── Trait implementation ────────────────────────────────────────────

const ACTION_COLUMNS: &str =
    "epoch, id, timestamp, from_addr, subject, spam_score, llm_label, recommended, final, mode";

#[async_trait]
impl Ledger for LibSqlLedger {
    async fn get_watermark(&self, epoch: &str) -> Result<MessageId, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT last_id FROM progress WHERE epoch = ?1",
                params![epoch],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_watermark: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let last: i64 = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("get_watermark row parse: {e}")))?;
                to_id(last)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(DatabaseError::Query(format!("get_watermark: {e}"))),
        }
    }

    async fn set_watermark(&self, epoch: &str, id: MessageId) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO progress (epoch, last_id) VALUES (?1, ?2) \
                 ON CONFLICT(epoch) DO UPDATE SET last_id = excluded.last_id",
                params![epoch, i64::from(id)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_watermark: {e}")))?;

        debug!(epoch, last_id = id, "Watermark advanced");
        Ok(())
    }

    async fn record_action(&self, record: &ActionRecord) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO actions ({ACTION_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
                     ON CONFLICT(epoch, id) DO UPDATE SET \
                        timestamp = excluded.timestamp, \
                        from_addr = excluded.from_addr, \
                        subject = excluded.subject, \
                        spam_score = excluded.spam_score, \
                        llm_label = excluded.llm_label, \
                        recommended = excluded.recommended, \
                        final = excluded.final, \
                        mode = excluded.mode"
                ),
                params![
                    record.epoch.as_str(),
                    i64::from(record.id),
                    record.timestamp.to_rfc3339(),
                    record.from_addr.as_str(),
                    record.subject.as_str(),
                    record.spam_score,
                    record.llm_label.as_str(),
                    record.recommended.as_str(),
                    record.final_action.as_str(),
                    record.mode.as_str(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("record_action: {e}")))?;

        debug!(
            epoch = %record.epoch,
            id = record.id,
            final_action = record.final_action.as_str(),
            "Action recorded"
        );
        Ok(())
    }

    async fn get_domain_history(&self, domain: &str) -> Result<DomainHistory, DatabaseError> {
        let mut history = DomainHistory::new();
        if domain.is_empty() {
            return Ok(history);
        }

        // LIKE is case-insensitive for ASCII; subdomains and near-matches count.
        let mut rows = self
            .conn()
            .query(
                "SELECT final, COUNT(*) FROM actions WHERE from_addr LIKE ?1 GROUP BY final",
                params![format!("%@{domain}%")],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_domain_history: {e}")))?;

        while let Ok(Some(row)) = rows.next().await {
            let action: String = match row.get(0) {
                Ok(a) => a,
                Err(e) => {
                    warn!("Skipping history row: {e}");
                    continue;
                }
            };
            let count: i64 = row.get(1).unwrap_or(0);
            history.add(history_key(&action), count.max(0) as u64);
        }
        Ok(history)
    }

    async fn get_action(
        &self,
        epoch: &str,
        id: MessageId,
    ) -> Result<Option<ActionRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {ACTION_COLUMNS} FROM actions WHERE epoch = ?1 AND id = ?2"),
                params![epoch, i64::from(id)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_action: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_action(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_action: {e}"))),
        }
    }
}
