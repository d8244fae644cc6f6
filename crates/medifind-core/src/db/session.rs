//! Persisted session database operations.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{Database, DbError, DbResult};
use crate::auth::{PersistenceError, PersistenceResult, SessionPersistence};
use crate::models::PersistedSession;

const USER_KEY: &str = "user";
const PROFILE_KEY: &str = "profile";
const SESSION_KEY: &str = "session";

impl Database {
    /// Load the stored identity. Missing keys come back as `None`.
    pub fn load_session(&self) -> DbResult<PersistedSession> {
        Ok(PersistedSession {
            user: self.get_value(USER_KEY)?,
            profile: self.get_value(PROFILE_KEY)?,
            session: self.get_value(SESSION_KEY)?,
        })
    }

    /// Replace the stored identity.
    pub fn save_session(&self, session: &PersistedSession) -> DbResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        put_value(&tx, USER_KEY, session.user.as_ref())?;
        put_value(&tx, PROFILE_KEY, session.profile.as_ref())?;
        put_value(&tx, SESSION_KEY, session.session.as_ref())?;
        tx.commit()?;
        Ok(())
    }

    pub fn clear_session(&self) -> DbResult<()> {
        self.conn.execute("DELETE FROM session_state", [])?;
        Ok(())
    }

    fn get_value<T: DeserializeOwned>(&self, key: &str) -> DbResult<Option<T>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM session_state WHERE key = ?",
                [key],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

fn put_value<T: Serialize>(conn: &rusqlite::Connection, key: &str, value: Option<&T>) -> DbResult<()> {
    match value {
        Some(value) => {
            let json = serde_json::to_string(value)?;
            conn.execute(
                r#"
                INSERT INTO session_state (key, value, updated_at)
                VALUES (?1, ?2, datetime('now'))
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at
                "#,
                params![key, json],
            )?;
        }
        None => {
            conn.execute("DELETE FROM session_state WHERE key = ?", [key])?;
        }
    }
    Ok(())
}

impl From<DbError> for PersistenceError {
    fn from(e: DbError) -> Self {
        PersistenceError(e.to_string())
    }
}

/// [`SessionPersistence`] backed by the local SQLite database.
pub struct SqlitePersistence {
    db: Mutex<Database>,
}

impl SqlitePersistence {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    fn with_db<T>(&self, op: impl FnOnce(&Database) -> DbResult<T>) -> PersistenceResult<T> {
        let db = self
            .db
            .lock()
            .map_err(|e| PersistenceError(e.to_string()))?;
        Ok(op(&db)?)
    }
}

impl SessionPersistence for SqlitePersistence {
    fn load(&self) -> PersistenceResult<PersistedSession> {
        self.with_db(Database::load_session)
    }

    fn save(&self, session: &PersistedSession) -> PersistenceResult<()> {
        self.with_db(|db| db.save_session(session))
    }

    fn clear(&self) -> PersistenceResult<()> {
        self.with_db(Database::clear_session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthSession, Profile, UserIdentity};

    fn persisted() -> PersistedSession {
        let user = UserIdentity::new("u1", "u1@example.com");
        PersistedSession {
            profile: Some(Profile::from_identity(&user)),
            session: Some(AuthSession::new("token", user.clone())),
            user: Some(user),
        }
    }

    #[test]
    fn test_empty_database_loads_nothing() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.load_session().unwrap().is_empty());
    }

    #[test]
    fn test_save_replaces_previous() {
        let db = Database::open_in_memory().unwrap();
        db.save_session(&persisted()).unwrap();

        let mut partial = persisted();
        partial.session = None;
        db.save_session(&partial).unwrap();

        let loaded = db.load_session().unwrap();
        assert_eq!(loaded, partial);
    }

    #[test]
    fn test_clear() {
        let db = Database::open_in_memory().unwrap();
        db.save_session(&persisted()).unwrap();
        db.clear_session().unwrap();
        assert!(db.load_session().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_row_is_an_error() {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .execute(
                "INSERT INTO session_state (key, value) VALUES ('user', 'not json')",
                [],
            )
            .unwrap();
        assert!(matches!(db.load_session(), Err(DbError::Json(_))));
    }
}
