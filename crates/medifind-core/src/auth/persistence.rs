//! Where the signed-in identity survives restarts.

use std::sync::Mutex;

use thiserror::Error;

use crate::models::PersistedSession;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Session storage failed: {0}")]
pub struct PersistenceError(pub String);

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Durable storage for the persisted subset of the session state.
pub trait SessionPersistence: Send + Sync {
    fn load(&self) -> PersistenceResult<PersistedSession>;

    fn save(&self, session: &PersistedSession) -> PersistenceResult<()>;

    fn clear(&self) -> PersistenceResult<()>;
}

/// Process-local persistence, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    saved: Mutex<Option<PersistedSession>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a session already stored, as after a previous run.
    pub fn with_session(session: PersistedSession) -> Self {
        Self {
            saved: Mutex::new(Some(session)),
        }
    }

    /// What is currently stored.
    pub fn stored(&self) -> Option<PersistedSession> {
        self.saved.lock().ok().and_then(|saved| saved.clone())
    }
}

impl SessionPersistence for MemoryPersistence {
    fn load(&self) -> PersistenceResult<PersistedSession> {
        let saved = self
            .saved
            .lock()
            .map_err(|e| PersistenceError(e.to_string()))?;
        Ok(saved.clone().unwrap_or_default())
    }

    fn save(&self, session: &PersistedSession) -> PersistenceResult<()> {
        let mut saved = self
            .saved
            .lock()
            .map_err(|e| PersistenceError(e.to_string()))?;
        *saved = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> PersistenceResult<()> {
        let mut saved = self
            .saved
            .lock()
            .map_err(|e| PersistenceError(e.to_string()))?;
        *saved = None;
        Ok(())
    }
}
