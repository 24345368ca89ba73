//! Persisted session list.
//!
//! The store holds the array of [`Session`] records (geometry, dialect,
//! working directory, history, cosmetic fields). The command line being
//! typed is transient state and never reaches the store.

use super::Session;
use crate::error::EngineError;
use async_trait::async_trait;
use std::path::PathBuf;

/// Key/value collaborator the controller persists through.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Vec<Session>, EngineError>;
    async fn save(&self, sessions: &[Session]) -> Result<(), EngineError>;
}

/// JSON file store. Writes go to a temp file first so a crash mid-write
/// cannot corrupt the session list.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SessionStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<Session>, EngineError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(body) => Ok(serde_json::from_str(&body)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, sessions: &[Session]) -> Result<(), EngineError> {
        let body = serde_json::to_string_pretty(sessions)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        log::debug!("persisted {} sessions to {}", sessions.len(), self.path.display());
        Ok(())
    }
}

/// In-memory store for tests and ephemeral embedders.
#[derive(Default)]
pub struct MemoryStore {
    sessions: std::sync::Mutex<Vec<Session>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Session> {
        self.sessions.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self) -> Result<Vec<Session>, EngineError> {
        Ok(self.snapshot())
    }

    async fn save(&self, sessions: &[Session]) -> Result<(), EngineError> {
        *self.sessions.lock().unwrap() = sessions.to_vec();
        Ok(())
    }
}
