//! Version-tracked database migrations for the ledger.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.
//! On first run against a legacy state file (`progress` keyed by
//! `uidvalidity` plus an `email_actions` table, no `_migrations` table),
//! the old rows are carried over into the current schema.

use libsql::Connection;

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: r#"
            CREATE TABLE IF NOT EXISTS progress (
                epoch TEXT PRIMARY KEY,
                last_id INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS actions (
                epoch TEXT NOT NULL,
                id INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                from_addr TEXT,
                subject TEXT,
                spam_score REAL,
                llm_label TEXT,
                recommended TEXT NOT NULL,
                final TEXT NOT NULL,
                mode TEXT NOT NULL,
                UNIQUE(epoch, id)
            );
            CREATE INDEX IF NOT EXISTS idx_actions_timestamp ON actions(timestamp);
            CREATE INDEX IF NOT EXISTS idx_actions_final ON actions(final);
            CREATE INDEX IF NOT EXISTS idx_actions_from_addr ON actions(from_addr);
        "#,
}];

/// Moves the legacy progress table out of the way before V1 runs.
const LEGACY_PREPARE: &str = "ALTER TABLE progress RENAME TO legacy_progress;";

/// Copies legacy rows into the V1 tables. Kept messages become `skip`.
const LEGACY_IMPORT: &str = r#"
    INSERT OR IGNORE INTO progress (epoch, last_id)
        SELECT uidvalidity, last_uid FROM legacy_progress;
    INSERT OR IGNORE INTO actions
        (epoch, id, timestamp, from_addr, subject, spam_score, llm_label, recommended, final, mode)
        SELECT uidvalidity, uid, processed_at, from_addr, subject, rspamd_score, llm_label,
               CASE recommended_action WHEN 'keep' THEN 'skip' ELSE recommended_action END,
               CASE final_action WHEN 'keep' THEN 'skip' ELSE final_action END,
               mode
        FROM email_actions;
    DROP TABLE legacy_progress;
    DROP TABLE email_actions;
"#;

/// Run all pending migrations against the given connection.
///
/// Creates the `_migrations` table if it doesn't exist.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to create _migrations table: {e}")))?;

    let current_version = get_current_version(conn).await?;
    let legacy = current_version == 0 && table_exists(conn, "email_actions").await?;

    // Legacy rename, pending migrations and import commit together: a
    // failed import must not leave V1 recorded over unimported data.
    let tx = conn
        .transaction()
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to begin migration: {e}")))?;

    let applied = apply_pending(&tx, current_version, legacy).await;
    if let Err(e) = applied {
        if let Err(rollback) = tx.rollback().await {
            tracing::warn!("Migration rollback failed: {rollback}");
        }
        return Err(e);
    }
    tx.commit()
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to commit migration: {e}")))?;

    tracing::debug!(version = get_current_version(conn).await?, "Database migrations complete");
    Ok(())
}

/// Legacy rename, pending migrations and legacy import, in order.
async fn apply_pending(
    conn: &Connection,
    current_version: i64,
    legacy: bool,
) -> Result<(), DatabaseError> {
    if legacy {
        conn.execute_batch(LEGACY_PREPARE).await.map_err(|e| {
            DatabaseError::Migration(format!("Failed to rename legacy progress table: {e}"))
        })?;
        tracing::info!("Legacy state file detected — importing after V1");
    }

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            conn.execute_batch(migration.sql).await.map_err(|e| {
                DatabaseError::Migration(format!(
                    "Migration V{} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
            seed_version(conn, migration.version, migration.name).await?;
        }
    }

    if legacy {
        conn.execute_batch(LEGACY_IMPORT).await.map_err(|e| {
            DatabaseError::Migration(format!("Failed to import legacy state: {e}"))
        })?;
        tracing::info!("Legacy state imported");
    }

    Ok(())
}

/// Get the highest applied migration version, or 0 if none.
async fn get_current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to query migration version: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to read migration version: {e}")))?;

    match row {
        Some(row) => {
            let version: i64 = row.get(0).map_err(|e| {
                DatabaseError::Migration(format!("Failed to parse migration version: {e}"))
            })?;
            Ok(version)
        }
        None => Ok(0),
    }
}

async fn table_exists(conn: &Connection, name: &str) -> Result<bool, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name = ?1",
            libsql::params![name],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("Failed to check table {name}: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(format!("Failed to read table check: {e}")))?;

    match row {
        Some(row) => {
            let count: i64 = row.get(0).unwrap_or(0);
            Ok(count > 0)
        }
        None => Ok(false),
    }
}

/// Insert a version record into `_migrations`.
async fn seed_version(conn: &Connection, version: i64, name: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![version, name],
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to record migration V{version}: {e}")))?;
    Ok(())
}
