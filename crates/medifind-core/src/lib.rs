//! MediFind Core Library
//!
//! Headless client core for a medicine locator. Customers search medicines
//! near them, see the stores on a map and save favorites; retailers manage
//! their stores and inventory. Persistence, auth and file storage live in a
//! hosted backend (Supabase), maps and directions come from Google Maps.
//!
//! # Architecture
//!
//! ```text
//!              UI shell (desktop, web view, CLI)
//!                 │            │              │
//!                 ▼            ▼              ▼
//!            AuthStore   SearchService   MapController
//!           (watch chan)      │               │
//!                 │           ▼               ▼
//!                 │     normalize_rows   MapSurface / DirectionsService
//!                 │           │
//!                 ▼           ▼
//!         ┌───────────────────────────────┐
//!         │ AuthProvider + DataBackend    │
//!         │  SupabaseClient │ MemoryBackend│
//!         └───────────────────────────────┘
//!                 │
//!                 ▼
//!       SessionPersistence (SQLite)
//! ```
//!
//! # Modules
//!
//! - [`auth`]: session store, persistence seam, slow-request guard
//! - [`backend`]: backend traits, Supabase REST client, in-memory backend
//! - [`search`]: search service, row normalizer, suggestions
//! - [`map`]: marker/viewport/route composition and directions
//! - [`favorites`], [`dashboard`], [`retailer`]: account features
//! - [`db`]: local SQLite storage for the signed-in identity
//! - [`config`], [`logging`]: environment configuration and tracing setup

pub mod auth;
pub mod backend;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod favorites;
pub mod logging;
pub mod map;
pub mod models;
pub mod retailer;
pub mod search;

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;

// Re-export commonly used types
pub use auth::{AuthError, AuthStore, MemoryPersistence, SessionPersistence};
pub use backend::{AuthProvider, BackendError, DataBackend, MemoryBackend, SupabaseClient};
pub use config::{Config, ConfigError};
pub use db::{Database, DbError, SqlitePersistence};
pub use favorites::{FavoritesError, FavoritesService};
pub use map::{LatLng, MapController, MapSurface};
pub use models::{NormalizedStore, Profile, Role, SessionState, UserIdentity};
pub use retailer::{InventoryManager, RetailerError, StoreManager};
pub use search::{normalize_row, normalize_rows, SearchError, SearchRequest, SearchService};

/// Any error the core can produce.
#[derive(Debug, Error)]
pub enum MediFindError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Favorites(#[from] FavoritesError),

    #[error(transparent)]
    Retailer(#[from] RetailerError),

    #[error(transparent)]
    Directions(#[from] map::DirectionsError),

    #[error(transparent)]
    Database(#[from] DbError),
}

pub type MediFindResult<T> = Result<T, MediFindError>;

/// Services wired over one backend.
pub struct MediFind<B: ?Sized> {
    pub backend: Arc<B>,
    pub auth: AuthStore,
    pub search: SearchService<B>,
    pub favorites: FavoritesService<B>,
    pub stores: StoreManager<B>,
    pub inventory: InventoryManager<B>,
    listener: JoinHandle<()>,
}

impl<B: ?Sized> Drop for MediFind<B> {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

impl<B> MediFind<B>
where
    B: AuthProvider + DataBackend + 'static,
{
    /// Wire every service over `backend`, restoring the session from
    /// `persistence`, and start applying provider auth events to the store.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(backend: Arc<B>, persistence: Arc<dyn SessionPersistence>, config: &Config) -> Self {
        let auth = AuthStore::with_profile_timeout(
            backend.clone(),
            backend.clone(),
            persistence,
            config.profile_timeout,
        );
        let listener = auth.spawn_listener();

        Self {
            search: SearchService::new(backend.clone()),
            favorites: FavoritesService::new(backend.clone()),
            stores: StoreManager::new(backend.clone()),
            inventory: InventoryManager::new(backend.clone()),
            auth,
            backend,
            listener,
        }
    }
}

impl MediFind<SupabaseClient> {
    /// Connect to the configured Supabase project with the session stored in
    /// the configured database (in memory when none is set).
    pub fn connect(config: &Config) -> MediFindResult<Self> {
        let persistence: Arc<dyn SessionPersistence> = match &config.database_path {
            Some(path) => Arc::new(SqlitePersistence::open(path)?),
            None => Arc::new(MemoryPersistence::new()),
        };

        let backend = Arc::new(SupabaseClient::from_config(config));
        Ok(Self::new(backend, persistence, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_services_share_one_backend() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_account("a@example.com", "pw", json!({"role": "customer"})).await;
        let config = Config::new("http://localhost", "anon");

        let app = MediFind::new(backend.clone(), Arc::new(MemoryPersistence::new()), &config);
        app.auth.initialize().await;
        assert!(!app.auth.snapshot().is_authenticated());

        app.auth.login("a@example.com", "pw", Some(Role::Customer)).await.unwrap();
        let user = app.auth.snapshot().user.unwrap();
        app.favorites
            .toggle_medicine(Some(&user), "m1", "Insulin", false)
            .await
            .unwrap();
        assert_eq!(backend.count_favorite_medicines(&user.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_provider_sign_out_reaches_store() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_account("b@example.com", "pw", json!({})).await;
        let config = Config::new("http://localhost", "anon");
        let app = MediFind::new(backend.clone(), Arc::new(MemoryPersistence::new()), &config);

        app.auth.login("b@example.com", "pw", None).await.unwrap();
        assert!(app.auth.snapshot().is_authenticated());

        let mut changes = app.auth.subscribe();
        backend.emit(backend::AuthEvent::SignedOut);
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            changes.wait_for(|s| s.user.is_none()),
        )
        .await
        .unwrap()
        .unwrap();
    }

    #[test]
    fn test_error_conversions() {
        let err: MediFindError = SearchError::EmptyQuery.into();
        assert_eq!(err.to_string(), "Please enter a medicine name");

        let err: MediFindError = AuthError::NotAuthenticated.into();
        assert!(matches!(err, MediFindError::Auth(_)));
    }
}
