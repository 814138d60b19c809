//! Session store seam: append-only conversation history keyed by an opaque
//! session id.
//!
//! The store is external; the orchestrator only appends turns and reads a
//! bounded recent window. [`MemorySessionStore`] serves tests and
//! single-process deployments, [`RedisSessionStore`] (feature
//! `storage-redis`) the shared one.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::types::{ConversationTurn, RagError};

/// Sessions expire after a day of inactivity in TTL-capable backends.
pub const SESSION_TTL_SECS: u64 = 24 * 60 * 60;

/// Conversation persistence operations consumed by the pipelines and the
/// excluded HTTP layer.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Creates an empty session and returns its id.
    async fn create(&self) -> Result<String, RagError>;

    /// Returns a session's turns, or `None` for an unknown/expired id.
    async fn get(&self, session_id: &str) -> Result<Option<Vec<ConversationTurn>>, RagError>;

    /// Appends a turn. Fails with [`RagError::Session`] for unknown ids.
    async fn append(&self, session_id: &str, turn: ConversationTurn) -> Result<(), RagError>;

    /// Empties a session's turn list; the session id stays alive.
    async fn clear(&self, session_id: &str) -> Result<(), RagError>;
}

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Vec<ConversationTurn>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self) -> Result<String, RagError> {
        let id = Uuid::new_v4().to_string();
        self.sessions.lock().insert(id.clone(), Vec::new());
        Ok(id)
    }

    async fn get(&self, session_id: &str) -> Result<Option<Vec<ConversationTurn>>, RagError> {
        Ok(self.sessions.lock().get(session_id).cloned())
    }

    async fn append(&self, session_id: &str, turn: ConversationTurn) -> Result<(), RagError> {
        let mut guard = self.sessions.lock();
        let turns = guard
            .get_mut(session_id)
            .ok_or_else(|| unknown(session_id))?;
        turns.push(turn);
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<(), RagError> {
        let mut guard = self.sessions.lock();
        let turns = guard
            .get_mut(session_id)
            .ok_or_else(|| unknown(session_id))?;
        turns.clear();
        Ok(())
    }
}

fn unknown(session_id: &str) -> RagError {
    RagError::Session(format!("session '{session_id}' not found"))
}

#[cfg(feature = "storage-redis")]
pub use redis_store::RedisSessionStore;

#[cfg(feature = "storage-redis")]
mod redis_store {
    use redis::AsyncCommands;
    use redis::aio::MultiplexedConnection;

    use super::*;

    /// Redis-backed session store: one JSON list per session under
    /// `session:{id}`, refreshed to [`SESSION_TTL_SECS`] on every write.
    pub struct RedisSessionStore {
        connection: MultiplexedConnection,
        ttl_secs: u64,
    }

    impl RedisSessionStore {
        pub async fn connect(url: &str) -> Result<Self, RagError> {
            let client = redis::Client::open(url).map_err(session_err)?;
            let connection = client
                .get_multiplexed_async_connection()
                .await
                .map_err(session_err)?;
            Ok(Self {
                connection,
                ttl_secs: SESSION_TTL_SECS,
            })
        }

        fn key(session_id: &str) -> String {
            format!("session:{session_id}")
        }

        async fn write(
            &self,
            session_id: &str,
            turns: &[ConversationTurn],
        ) -> Result<(), RagError> {
            let payload = serde_json::to_string(turns)
                .map_err(|err| RagError::Session(err.to_string()))?;
            let mut connection = self.connection.clone();
            connection
                .set_ex::<_, _, ()>(Self::key(session_id), payload, self.ttl_secs)
                .await
                .map_err(session_err)
        }

        async fn read(&self, session_id: &str) -> Result<Option<Vec<ConversationTurn>>, RagError> {
            let mut connection = self.connection.clone();
            let raw: Option<String> = connection
                .get(Self::key(session_id))
                .await
                .map_err(session_err)?;
            raw.map(|payload| {
                serde_json::from_str(&payload).map_err(|err| RagError::Session(err.to_string()))
            })
            .transpose()
        }
    }

    #[async_trait]
    impl SessionStore for RedisSessionStore {
        async fn create(&self) -> Result<String, RagError> {
            let id = Uuid::new_v4().to_string();
            self.write(&id, &[]).await?;
            Ok(id)
        }

        async fn get(&self, session_id: &str) -> Result<Option<Vec<ConversationTurn>>, RagError> {
            self.read(session_id).await
        }

        async fn append(&self, session_id: &str, turn: ConversationTurn) -> Result<(), RagError> {
            let mut turns = self
                .read(session_id)
                .await?
                .ok_or_else(|| unknown(session_id))?;
            turns.push(turn);
            self.write(session_id, &turns).await
        }

        async fn clear(&self, session_id: &str) -> Result<(), RagError> {
            if self.read(session_id).await?.is_none() {
                return Err(unknown(session_id));
            }
            self.write(session_id, &[]).await
        }
    }

    fn session_err(err: redis::RedisError) -> RagError {
        RagError::Session(err.to_string())
    }
}
