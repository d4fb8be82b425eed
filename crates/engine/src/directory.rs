//! User directory — read-only lookup of identity records.
//!
//! The pipeline only reads from the directory; registration and token
//! refresh are owned elsewhere.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use chatping_common::error::StoreError;
use chatping_common::types::UserRecord;

/// Read-only access to user identity records.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Fetch a user by id. `Ok(None)` means no such record.
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError>;
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    display_name: Option<String>,
    fcm_token: Option<String>,
    fcm_tokens: Option<Vec<String>>,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        UserRecord {
            user_id: row.id,
            display_name: row.display_name,
            first_name: None,
            fcm_token: row.fcm_token,
            fcm_tokens: row.fcm_tokens,
        }
    }
}

/// PostgreSQL-backed directory (`users` table).
#[derive(Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool and wrap it.
    ///
    /// `max_connections` comes from `AppConfig::db_max_connections` (default 10).
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect(database_url)
            .await?;

        tracing::info!(max_connections, "Connected to user directory");
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl DirectoryStore for PgDirectory {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, display_name, fcm_token, fcm_tokens
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserRecord::from))
    }
}

/// In-process directory, fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    users: HashMap<String, UserRecord>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record keyed by its `user_id`.
    pub fn with_user(mut self, record: UserRecord) -> Self {
        self.users.insert(record.user_id.clone(), record);
        self
    }

    /// Load records from a JSON object of `{ "<userId>": { ...document fields } }`.
    pub fn from_json(value: serde_json::Value) -> Result<Self, StoreError> {
        let documents: HashMap<String, UserRecord> =
            serde_json::from_value(value).map_err(|e| StoreError::Decode(e.to_string()))?;

        let users = documents
            .into_iter()
            .map(|(id, mut record)| {
                record.user_id = id.clone();
                (id, record)
            })
            .collect();
        Ok(Self { users })
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl DirectoryStore for MemoryDirectory {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.get(user_id).cloned())
    }
}
