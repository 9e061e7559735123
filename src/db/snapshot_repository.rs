use std::str::FromStr;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{error, warn};

use crate::errors::AppError;
use crate::models::Conversation;

/// Durable storage for the whole conversation collection under one slot.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Returns `None` when nothing usable is stored.
    async fn load(&self) -> Result<Option<Vec<Conversation>>, AppError>;

    async fn save(&self, conversations: &[Conversation]) -> Result<(), AppError>;
}

/// Decodes a stored snapshot. Corrupt data is logged and reported as absent.
fn decode_snapshot(slot: &str, raw: &str) -> Option<Vec<Conversation>> {
    if raw.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(raw) {
        Ok(conversations) => Some(conversations),
        Err(e) => {
            warn!("Discarding unreadable snapshot in slot '{slot}': {e}");
            None
        }
    }
}

/// Key-value slot in a SQLite database.
#[derive(Clone)]
pub struct SqliteSnapshotStore {
    pool: SqlitePool,
    slot: String,
}

impl SqliteSnapshotStore {
    pub fn new(pool: SqlitePool, slot: impl Into<String>) -> Self {
        Self { pool, slot: slot.into() }
    }

    /// Opens (creating if needed) the database at `database_url` and applies
    /// migrations.
    pub async fn connect(database_url: &str, slot: impl Into<String>) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::persistence(format!("Invalid database URL {database_url}"), e))?
            .create_if_missing(true);

        // One connection: every `sqlite::memory:` connection is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| {
                error!("Failed to open snapshot database {database_url}: {e}");
                AppError::persistence("Failed to open snapshot database", e)
            })?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::persistence("Failed to run migrations", e.into()))?;

        Ok(Self::new(pool, slot))
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn load(&self) -> Result<Option<Vec<Conversation>>, AppError> {
        let raw = sqlx::query_scalar::<_, String>("SELECT value FROM kv_store WHERE key = ?")
            .bind(&self.slot)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to read snapshot slot '{}': {e}", self.slot);
                AppError::persistence("Failed to read snapshot", e)
            })?;

        Ok(raw.and_then(|raw| decode_snapshot(&self.slot, &raw)))
    }

    async fn save(&self, conversations: &[Conversation]) -> Result<(), AppError> {
        let value = serde_json::to_string(conversations).map_err(AppError::SnapshotEncoding)?;
        sqlx::query(
            "INSERT INTO kv_store (key, value, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(&self.slot)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to write snapshot slot '{}': {e}", self.slot);
            AppError::persistence("Failed to write snapshot", e)
        })?;
        Ok(())
    }
}

/// Process-local slot holding the encoded snapshot.
#[derive(Default)]
pub struct MemorySnapshotStore {
    raw: Mutex<Option<String>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the slot with an arbitrary encoded value.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self { raw: Mutex::new(Some(raw.into())) }
    }

    pub fn raw(&self) -> Option<String> {
        self.raw.lock().map(|guard| guard.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self) -> Result<Option<Vec<Conversation>>, AppError> {
        Ok(self.raw().and_then(|raw| decode_snapshot("memory", &raw)))
    }

    async fn save(&self, conversations: &[Conversation]) -> Result<(), AppError> {
        let value = serde_json::to_string(conversations).map_err(AppError::SnapshotEncoding)?;
        let mut slot = self
            .raw
            .lock()
            .map_err(|_| AppError::Unexpected("memory snapshot lock poisoned".to_string()))?;
        *slot = Some(value);
        Ok(())
    }
}
