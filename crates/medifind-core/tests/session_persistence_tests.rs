//! Session restore across restarts through the SQLite store.

use std::sync::Arc;

use medifind_core::auth::AuthStore;
use medifind_core::backend::MemoryBackend;
use medifind_core::db::{Database, SqlitePersistence};
use medifind_core::models::Role;
use serde_json::json;
use tempfile::TempDir;

fn open_store(backend: &Arc<MemoryBackend>, dir: &TempDir) -> AuthStore {
    let persistence = SqlitePersistence::open(dir.path().join("session.db")).unwrap();
    AuthStore::new(backend.clone(), backend.clone(), Arc::new(persistence))
}

fn stored_keys(dir: &TempDir) -> Vec<String> {
    let db = Database::open(dir.path().join("session.db")).unwrap();
    let mut stmt = db
        .conn()
        .prepare("SELECT key FROM session_state ORDER BY key")
        .unwrap();
    let keys = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    keys
}

#[tokio::test]
async fn test_session_survives_restart() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    backend
        .add_account("kiran@example.com", "pw", json!({"full_name": "Kiran", "role": "retailer"}))
        .await;

    let first = open_store(&backend, &dir);
    first.initialize().await;
    first.login("kiran@example.com", "pw", Some(Role::Retailer)).await.unwrap();
    first.wait_idle().await;
    drop(first);

    assert_eq!(stored_keys(&dir), vec!["profile", "session", "user"]);

    let second = open_store(&backend, &dir);
    let restored = second.snapshot();
    assert!(restored.is_authenticated());
    assert!(!restored.initialized);
    assert!(restored.loading);
    assert!(restored.error.is_none());

    second.initialize().await;
    assert!(second.is_retailer());
    second.wait_idle().await;

    let state = second.snapshot();
    assert!(state.is_authenticated());
    assert_eq!(state.profile.unwrap().full_name, "Kiran");
    assert_eq!(backend.calls("get_session").await, 2);
}

#[tokio::test]
async fn test_logout_empties_database() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    backend.add_account("out@example.com", "pw", json!({})).await;

    let store = open_store(&backend, &dir);
    store.login("out@example.com", "pw", None).await.unwrap();
    store.wait_idle().await;
    assert_eq!(stored_keys(&dir).len(), 3);

    store.logout().await.unwrap();
    assert!(stored_keys(&dir).is_empty());

    let reopened = open_store(&backend, &dir);
    assert!(!reopened.snapshot().is_authenticated());
}
