use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::handlers::IdentityResolver;
use crate::models::{ChatMessageRecord, Role, ServiceHealth};
use crate::relay::TurnOrchestrator;

// ============================================================================
// AppState
// ============================================================================

/// Built once at startup and shared read-only by every request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MessageStore>,
    pub identity: Arc<dyn IdentityResolver>,
    pub orchestrator: TurnOrchestrator,
    pub services: ServiceHealth,
}

// ============================================================================
// Persistence Gateway
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt record {id}: {reason}")]
    Corrupt { id: Uuid, reason: String },
}

/// Chats are keyed by `(user_id, chat_id)`: two users may pick the same
/// chat id and never see each other's messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append(
        &self,
        user_id: Uuid,
        chat_id: &str,
        role: Role,
        content: &str,
    ) -> Result<ChatMessageRecord, StoreError>;

    /// Messages of one chat owned by `user_id`, oldest first.
    async fn list(&self, user_id: Uuid, chat_id: &str) -> Result<Vec<ChatMessageRecord>, StoreError>;

    fn kind(&self) -> &'static str;
}

// ============================================================================
// PostgreSQL store
// ============================================================================

#[derive(Clone)]
pub struct PgMessageStore {
    db: sqlx::PgPool,
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    user_id: Uuid,
    chat_id: String,
    role: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for ChatMessageRecord {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let role = row.role.parse::<Role>().map_err(|reason| StoreError::Corrupt {
            id: row.id,
            reason,
        })?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            chat_id: row.chat_id,
            role,
            content: row.content,
            created_at: row.created_at,
        })
    }
}

impl PgMessageStore {
    pub fn new(db: sqlx::PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn append(
        &self,
        user_id: Uuid,
        chat_id: &str,
        role: Role,
        content: &str,
    ) -> Result<ChatMessageRecord, StoreError> {
        let record = ChatMessageRecord::new(user_id, chat_id, role, content);

        sqlx::query(
            r#"
            INSERT INTO chat_messages (id, user_id, chat_id, role, content, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(&record.chat_id)
        .bind(record.role.as_str())
        .bind(&record.content)
        .bind(record.created_at)
        .execute(&self.db)
        .await?;

        Ok(record)
    }

    async fn list(&self, user_id: Uuid, chat_id: &str) -> Result<Vec<ChatMessageRecord>, StoreError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, user_id, chat_id, role, content, created_at
            FROM chat_messages
            WHERE user_id = $1 AND chat_id = $2
            ORDER BY created_at, id
            "#,
        )
        .bind(user_id)
        .bind(chat_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(ChatMessageRecord::try_from).collect()
    }

    fn kind(&self) -> &'static str {
        "postgres"
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local store for development and tests.
#[derive(Default)]
pub struct MemoryMessageStore {
    chats: RwLock<HashMap<(Uuid, String), Vec<ChatMessageRecord>>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn append(
        &self,
        user_id: Uuid,
        chat_id: &str,
        role: Role,
        content: &str,
    ) -> Result<ChatMessageRecord, StoreError> {
        let record = ChatMessageRecord::new(user_id, chat_id, role, content);
        let mut chats = self.chats.write().await;
        chats
            .entry((user_id, chat_id.to_string()))
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn list(&self, user_id: Uuid, chat_id: &str) -> Result<Vec<ChatMessageRecord>, StoreError> {
        let chats = self.chats.read().await;
        Ok(chats
            .get(&(user_id, chat_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
