// Database schema: table creation.
//
// A `schema_version` table records applied versions so later migrations can
// be added as plain functions.

use anyhow::{Context, Result};
use rusqlite::Connection;

const CURRENT_VERSION: i64 = 2;

/// Create all tables if they don't exist yet.
///
/// This is idempotent, safe to call on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Posts accepted by a detector, with mint progress
        CREATE TABLE IF NOT EXISTS viral_posts (
            post_id TEXT PRIMARY KEY,
            author_id TEXT NOT NULL,
            author_handle TEXT NOT NULL,
            content TEXT NOT NULL,
            posted_at TEXT NOT NULL,           -- RFC 3339
            likes INTEGER NOT NULL DEFAULT 0,
            reshares INTEGER NOT NULL DEFAULT 0,
            replies INTEGER NOT NULL DEFAULT 0,
            quotes INTEGER NOT NULL DEFAULT 0,
            viral_score INTEGER NOT NULL,      -- 1 to 100
            tier INTEGER NOT NULL,             -- 0 to 3
            mint_status TEXT NOT NULL,         -- pending / minting / completed / failed
            mint_progress INTEGER NOT NULL DEFAULT 0,
            asset_address TEXT,
            metadata_uri TEXT,
            detected_at TEXT NOT NULL,         -- RFC 3339
            updated_at TEXT NOT NULL
        );

        -- Pending transfers of minted assets to their authors
        CREATE TABLE IF NOT EXISTS claims (
            asset_address TEXT PRIMARY KEY,
            post_id TEXT NOT NULL,
            author_id TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        -- Undelivered creator notifications, in queue order (rowid)
        CREATE TABLE IF NOT EXISTS notifications (
            key TEXT PRIMARY KEY,              -- asset:tierN
            author_id TEXT NOT NULL,
            asset_address TEXT NOT NULL,
            tier INTEGER NOT NULL,
            previous_tier INTEGER,             -- set for upgrades
            queued_at TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            dead_letter INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_posts_status
            ON viral_posts(mint_status);

        CREATE INDEX IF NOT EXISTS idx_posts_detected
            ON viral_posts(detected_at);
        ",
    )
    .context("Failed to create database tables")?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_VERSION],
    )
    .context("Failed to record schema version")?;

    Ok(())
}

/// Count user tables (excludes SQLite internals).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tables_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
        assert_eq!(table_count(&conn).unwrap(), 4);
    }
}
