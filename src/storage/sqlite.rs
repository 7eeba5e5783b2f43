use async_trait::async_trait;
use chrono::SecondsFormat;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

use super::SessionStore;
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use crate::interview::Session;

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed session store
#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Open (or create) the database and run migrations.
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn load(&self, id: &str) -> StorageResult<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, document
            FROM interview_sessions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SessionRow::into_session).transpose()
    }

    async fn save(&self, session: &Session) -> StorageResult<()> {
        let document = serde_json::to_string(session)?;

        sqlx::query(
            r#"
            INSERT INTO interview_sessions (id, phase, document, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                phase = excluded.phase,
                document = excluded.document,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&session.id)
        .bind(session.phase().to_string())
        .bind(&document)
        .bind(timestamp(&session.created_at))
        .bind(timestamp(&session.updated_at))
        .execute(&self.pool)
        .await?;

        debug!(session_id = %session.id, phase = %session.phase(), "Session saved");
        Ok(())
    }

    async fn delete(&self, id: &str) -> StorageResult<()> {
        sqlx::query("DELETE FROM interview_sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn latest(&self) -> StorageResult<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, document
            FROM interview_sessions
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(SessionRow::into_session).transpose()
    }
}

/// Fixed-width UTC timestamps so that text ordering matches time ordering.
fn timestamp(at: &chrono::DateTime<chrono::Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    document: String,
}

impl SessionRow {
    fn into_session(self) -> StorageResult<Session> {
        let mut session: Session = serde_json::from_str(&self.document)?;
        if session.id != self.id {
            return Err(StorageError::Query {
                message: format!(
                    "Stored document for {} carries id {}",
                    self.id, session.id
                ),
            });
        }
        session.fill_topic_entries();
        Ok(session)
    }
}
