//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for all portal data.

mod repository;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::errors::AppError;
use crate::models::{CreateSourceRequest, CreateUserRequest, SourceType};

/// Feeds seeded into an empty `crawler_sources` table.
pub const DEFAULT_SOURCES: &[(&str, &str, SourceType)] = &[
    ("ICC", "https://www.persecution.org/feed", SourceType::Rss),
    (
        "Morning Star News",
        "https://morningstarnews.org/tag/religious-persecution/feed/",
        SourceType::Rss,
    ),
    (
        "Christian Today India",
        "https://www.christiantoday.co.in/rss.xml",
        SourceType::Rss,
    ),
    ("UCA News", "https://www.ucanews.com/rss/news", SourceType::Rss),
    (
        "AsiaNews",
        "https://www.asianews.it/index.php?l=en&art=1&size=0",
        SourceType::Rss,
    ),
    ("UCFHR", "UCFHR", SourceType::Social),
    ("EFI_RLC", "EFI_RLC", SourceType::Social),
    ("persecution_in", "persecution_in", SourceType::Social),
];

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

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS incidents (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            location_raw TEXT NOT NULL DEFAULT '',
            title_lc TEXT NOT NULL DEFAULT '',
            description_lc TEXT NOT NULL DEFAULT '',
            location_lc TEXT NOT NULL DEFAULT '',
            incident_date TEXT NOT NULL,
            sources TEXT NOT NULL DEFAULT '[]',
            is_verified INTEGER NOT NULL DEFAULT 0,
            prayer_count INTEGER NOT NULL DEFAULT 0,
            summary TEXT,
            image_url TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS prayer_commitments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            visitor_id TEXT NOT NULL,
            incident_id TEXT NOT NULL REFERENCES incidents(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            UNIQUE (visitor_id, incident_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS crawler_sources (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            url_or_handle TEXT NOT NULL,
            source_type TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dashboard_users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS event_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            visitor_id TEXT NOT NULL,
            event_type TEXT NOT NULL,
            incident_id TEXT,
            details TEXT,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_incidents_date ON incidents(incident_date DESC);
        CREATE INDEX IF NOT EXISTS idx_prayers_visitor ON prayer_commitments(visitor_id);
        CREATE INDEX IF NOT EXISTS idx_event_logs_created ON event_logs(created_at DESC);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the configured operator and default crawler sources when missing.
pub async fn seed_defaults(
    repo: &Repository,
    admin_username: &str,
    admin_password: Option<&str>,
) -> Result<(), AppError> {
    match admin_password {
        Some(password) => {
            if repo.find_user_by_username(admin_username).await?.is_none() {
                repo.create_user(&CreateUserRequest {
                    username: admin_username.to_string(),
                    password: password.to_string(),
                })
                .await?;
                tracing::info!("Created operator account {}", admin_username);
            }
        }
        None => tracing::debug!("No admin password configured; skipping operator seed"),
    }

    if repo.count_sources().await? == 0 {
        for (name, url_or_handle, source_type) in DEFAULT_SOURCES {
            repo.create_source(&CreateSourceRequest {
                name: name.to_string(),
                url_or_handle: url_or_handle.to_string(),
                source_type: *source_type,
                is_active: true,
            })
            .await?;
        }
        tracing::info!("Seeded {} crawler sources", DEFAULT_SOURCES.len());
    }

    Ok(())
}
