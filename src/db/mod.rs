//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for lists, items, stores, trip history and the
//! allow-list.

mod repository;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run embedded migrations
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            schema_version INTEGER NOT NULL DEFAULT 1,
            revision_id INTEGER NOT NULL DEFAULT 0,
            generated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        INSERT OR IGNORE INTO meta (id, schema_version, revision_id, generated_at)
        VALUES (1, 1, 0, datetime('now'));
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS allowed_users (
            uid TEXT PRIMARY KEY,
            added_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // store_id is not a foreign key; a list may reference a deleted store.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lists (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            is_archived INTEGER NOT NULL DEFAULT 0,
            archived_at TEXT,
            store_id TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            list_id TEXT NOT NULL REFERENCES lists(id) ON DELETE CASCADE,
            text TEXT NOT NULL,
            section TEXT,
            checked INTEGER NOT NULL DEFAULT 0,
            checked_at TEXT,
            note TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stores (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            sections TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Trips outlive their list, so list_id is not a foreign key.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS history_trips (
            id TEXT PRIMARY KEY,
            list_id TEXT NOT NULL,
            list_name TEXT NOT NULL,
            completed_at TEXT NOT NULL,
            completed_by TEXT NOT NULL,
            item_count INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS history_items (
            id TEXT PRIMARY KEY,
            trip_id TEXT NOT NULL REFERENCES history_trips(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            text TEXT NOT NULL,
            note TEXT NOT NULL DEFAULT '',
            checked_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_lists_archived_updated ON lists(is_archived, updated_at);
        CREATE INDEX IF NOT EXISTS idx_items_list_created ON items(list_id, created_at, id);
        CREATE INDEX IF NOT EXISTS idx_items_list_checked ON items(list_id, checked);
        CREATE INDEX IF NOT EXISTS idx_stores_created_at ON stores(created_at);
        CREATE INDEX IF NOT EXISTS idx_history_trips_completed_at ON history_trips(completed_at);
        CREATE INDEX IF NOT EXISTS idx_history_items_trip ON history_items(trip_id, position);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
