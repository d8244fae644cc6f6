//! Data-access layer over the hosted backend.
//!
//! Two seams: [`AuthProvider`] for identity (sign-in, sign-up, session
//! verification, auth-state events) and [`DataBackend`] for table queries,
//! the geospatial search RPC and image storage. [`SupabaseClient`] talks to
//! the real service; [`MemoryBackend`] keeps everything in process.

mod memory;
mod supabase;

pub use memory::*;
pub use supabase::*;

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::models::{
    AuthSession, FavoriteMedicine, FavoriteStore, MedicineRecord, Profile, ProfileUpdate, Role,
    SearchHistoryEntry, StoreRecord, UserIdentity,
};

/// Backend errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request failed ({status}): {message}")]
    Http { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl BackendError {
    /// HTTP status, where the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::NotFound(_) => Some(404),
            Self::Conflict(_) => Some(409),
            Self::Unauthorized(_) => Some(401),
            Self::Network(_) | Self::Decode(_) => None,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Classify a non-success status and its message.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => Self::Unauthorized(message),
            404 => Self::NotFound(message),
            409 => Self::Conflict(message),
            _ => Self::Http { status, message },
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Auth-state notification from the identity provider.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(AuthSession),
    SignedOut,
    TokenRefreshed(AuthSession),
}

impl AuthEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SignedIn(_) => "signed_in",
            Self::SignedOut => "signed_out",
            Self::TokenRefreshed(_) => "token_refreshed",
        }
    }
}

/// Account creation payload. Name, role and phone go into user metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
    pub phone: Option<String>,
}

/// Result of sign-up. `session` is absent when the provider requires email
/// confirmation first.
#[derive(Debug, Clone, PartialEq)]
pub struct SignUpResponse {
    pub user: UserIdentity,
    pub session: Option<AuthSession>,
}

/// Identity provider.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> BackendResult<AuthSession>;

    async fn sign_up(&self, request: &SignUpRequest) -> BackendResult<SignUpResponse>;

    async fn sign_out(&self, session: Option<&AuthSession>) -> BackendResult<()>;

    /// Verify (or refresh) a stored session. `Ok(None)` means there is no
    /// valid session.
    async fn get_session(&self, stored: Option<&AuthSession>) -> BackendResult<Option<AuthSession>>;

    /// Subscribe to auth-state notifications.
    fn events(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Table, RPC and storage access.
#[async_trait]
pub trait DataBackend: Send + Sync {
    // Profiles
    async fn fetch_profile(&self, user_id: &str) -> BackendResult<Option<Profile>>;
    async fn insert_profile(&self, profile: &Profile) -> BackendResult<()>;
    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> BackendResult<Profile>;

    // Search
    /// Geospatial search. Rows come back joined with their store and sorted by
    /// ascending `distance_km`.
    async fn search_medicines(
        &self,
        query: &str,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> BackendResult<Vec<Value>>;
    async fn log_search(&self, entry: &SearchHistoryEntry) -> BackendResult<()>;
    async fn recent_searches(&self, user_id: &str, limit: usize) -> BackendResult<Vec<SearchHistoryEntry>>;
    async fn count_searches(&self, user_id: &str) -> BackendResult<u64>;

    // Favorite medicines
    async fn add_favorite_medicine(
        &self,
        user_id: &str,
        medicine_id: &str,
        medicine_name: &str,
    ) -> BackendResult<FavoriteMedicine>;
    async fn remove_favorite_medicine(&self, user_id: &str, medicine_id: &str) -> BackendResult<()>;
    /// Which of `medicine_ids` the user has saved, in one query.
    async fn favorite_medicine_ids(
        &self,
        user_id: &str,
        medicine_ids: &[String],
    ) -> BackendResult<HashSet<String>>;
    async fn list_favorite_medicines(&self, user_id: &str) -> BackendResult<Vec<FavoriteMedicine>>;
    async fn count_favorite_medicines(&self, user_id: &str) -> BackendResult<u64>;

    // Favorite stores
    async fn add_favorite_store(&self, user_id: &str, store_id: &str) -> BackendResult<FavoriteStore>;
    async fn remove_favorite_store(&self, user_id: &str, store_id: &str) -> BackendResult<()>;
    async fn list_favorite_stores(
        &self,
        user_id: &str,
        limit: Option<usize>,
    ) -> BackendResult<Vec<FavoriteStore>>;
    async fn count_favorite_stores(&self, user_id: &str) -> BackendResult<u64>;

    async fn count_active_alerts(&self, user_id: &str) -> BackendResult<u64>;

    // Stores
    async fn list_stores(&self, owner_id: &str) -> BackendResult<Vec<StoreRecord>>;
    async fn insert_store(&self, store: &StoreRecord) -> BackendResult<StoreRecord>;
    async fn update_store(&self, store_id: &str, store: &StoreRecord) -> BackendResult<StoreRecord>;
    async fn delete_store(&self, store_id: &str) -> BackendResult<()>;
    async fn set_store_open(&self, store_id: &str, is_open: bool) -> BackendResult<()>;

    // Medicines
    async fn list_medicines(&self, store_ids: &[String]) -> BackendResult<Vec<MedicineRecord>>;
    async fn insert_medicine(&self, medicine: &MedicineRecord) -> BackendResult<MedicineRecord>;
    async fn update_medicine(
        &self,
        medicine_id: &str,
        medicine: &MedicineRecord,
    ) -> BackendResult<MedicineRecord>;
    async fn delete_medicine(&self, medicine_id: &str) -> BackendResult<()>;

    /// Upload a file and return its public URL.
    async fn upload_image(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BackendResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(
            BackendError::from_status(400, "Invalid login credentials"),
            BackendError::Http {
                status: 400,
                message: "Invalid login credentials".into()
            }
        );
        assert!(matches!(BackendError::from_status(409, "dup"), BackendError::Conflict(_)));
        assert_eq!(BackendError::from_status(403, "rls").status(), Some(403));
        assert!(matches!(BackendError::from_status(401, "jwt"), BackendError::Unauthorized(_)));
        assert_eq!(BackendError::Network("down".into()).status(), None);
    }
}
