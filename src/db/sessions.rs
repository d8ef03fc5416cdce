use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::RwLock;

use crate::models::ConversationSession;

/// Where conversation sessions live between messages.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn get(&self, thread_id: &str) -> anyhow::Result<Option<ConversationSession>>;

    async fn put(&self, session: &ConversationSession) -> anyhow::Result<()>;

    /// Returns whether a session existed.
    async fn evict(&self, thread_id: &str) -> anyhow::Result<bool>;
}

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<String, ConversationSession>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn get(&self, thread_id: &str) -> anyhow::Result<Option<ConversationSession>> {
        Ok(self.sessions.read().await.get(thread_id).cloned())
    }

    async fn put(&self, session: &ConversationSession) -> anyhow::Result<()> {
        self.sessions
            .write()
            .await
            .insert(session.thread_id.clone(), session.clone());
        Ok(())
    }

    async fn evict(&self, thread_id: &str) -> anyhow::Result<bool> {
        Ok(self.sessions.write().await.remove(thread_id).is_some())
    }
}

/// Sessions stored as JSON in SQLite, with the gate and IDs copied into
/// columns for ad-hoc inspection.
pub struct SqliteSessionRepository {
    db: Arc<Mutex<Connection>>,
}

impl SqliteSessionRepository {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    fn conn(&self) -> anyhow::Result<std::sync::MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| anyhow::anyhow!("session database lock poisoned"))
    }
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn get(&self, thread_id: &str) -> anyhow::Result<Option<ConversationSession>> {
        let body: Option<String> = self
            .conn()?
            .query_row(
                "SELECT body FROM sessions WHERE thread_id = ?1",
                params![thread_id],
                |row| row.get(0),
            )
            .optional()
            .context("failed to load session")?;

        body.map(|b| {
            serde_json::from_str(&b)
                .with_context(|| format!("corrupt session body for thread {thread_id}"))
        })
        .transpose()
    }

    async fn put(&self, session: &ConversationSession) -> anyhow::Result<()> {
        let body = serde_json::to_string(session).context("failed to serialize session")?;
        self.conn()?
            .execute(
                "INSERT INTO sessions (thread_id, gate, customer_id, booking_id, body, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(thread_id) DO UPDATE SET
                    gate = excluded.gate,
                    customer_id = excluded.customer_id,
                    booking_id = excluded.booking_id,
                    body = excluded.body,
                    updated_at = excluded.updated_at",
                params![
                    session.thread_id,
                    session.gate.as_str(),
                    session.customer_id,
                    session.booking_id,
                    body,
                    session.created_at.to_rfc3339(),
                    session.updated_at.to_rfc3339(),
                ],
            )
            .context("failed to save session")?;
        Ok(())
    }

    async fn evict(&self, thread_id: &str) -> anyhow::Result<bool> {
        let removed = self
            .conn()?
            .execute("DELETE FROM sessions WHERE thread_id = ?1", params![thread_id])
            .context("failed to evict session")?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::models::{CachedPet, GateState};
    use chrono::Utc;

    fn session() -> ConversationSession {
        let mut s = ConversationSession::new("thread-1", Utc::now());
        s.customer_id = Some("c-1".to_string());
        s.pets.push(CachedPet {
            id: "p-1".to_string(),
            name: "Max".to_string(),
            species: Some("Dog".to_string()),
        });
        s.gate = GateState::Completed;
        s
    }

    async fn exercise(repo: &dyn SessionRepository) {
        assert!(repo.get("thread-1").await.unwrap().is_none());

        let mut s = session();
        repo.put(&s).await.unwrap();
        assert_eq!(repo.get("thread-1").await.unwrap(), Some(s.clone()));

        s.booking_id = Some("b-1".to_string());
        repo.put(&s).await.unwrap();
        let loaded = repo.get("thread-1").await.unwrap().unwrap();
        assert_eq!(loaded.booking_id.as_deref(), Some("b-1"));

        assert!(repo.evict("thread-1").await.unwrap());
        assert!(!repo.evict("thread-1").await.unwrap());
        assert!(repo.get("thread-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_in_memory_repository() {
        exercise(&InMemorySessionRepository::new()).await;
    }

    #[tokio::test]
    async fn test_sqlite_repository() {
        let conn = init_db("memory").unwrap();
        exercise(&SqliteSessionRepository::new(Arc::new(Mutex::new(conn)))).await;
    }
}
