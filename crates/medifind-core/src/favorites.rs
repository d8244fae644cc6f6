//! Saved medicines and stores.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::backend::{BackendError, DataBackend};
use crate::models::{FavoriteMedicine, FavoriteStore, UserIdentity};

/// Favorites errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FavoritesError {
    #[error("Please sign in to save favorites")]
    SignInRequired,

    #[error("Failed to update favorites: {0}")]
    Backend(#[from] BackendError),
}

impl FavoritesError {
    /// Text to show the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            FavoritesError::SignInRequired => "Please sign in to save favorites",
            FavoritesError::Backend(_) => "Failed to update favorites",
        }
    }
}

pub type FavoritesResult<T> = Result<T, FavoritesError>;

/// Result of toggling a favorite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteToggle {
    Added,
    Removed,
}

impl FavoriteToggle {
    pub fn is_favorite(&self) -> bool {
        matches!(self, FavoriteToggle::Added)
    }

    pub fn message(&self) -> &'static str {
        match self {
            FavoriteToggle::Added => "Added to favorites! ❤️",
            FavoriteToggle::Removed => "Removed from favorites",
        }
    }
}

pub struct FavoritesService<B: ?Sized> {
    backend: Arc<B>,
}

impl<B: ?Sized> Clone for FavoritesService<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: DataBackend + ?Sized> FavoritesService<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Flip a medicine's saved state. `is_favorite` is what the caller
    /// currently shows.
    ///
    /// Adding something already saved, or removing something already gone,
    /// still reports the requested state.
    pub async fn toggle_medicine(
        &self,
        user: Option<&UserIdentity>,
        medicine_id: &str,
        medicine_name: &str,
        is_favorite: bool,
    ) -> FavoritesResult<FavoriteToggle> {
        let user = user.ok_or(FavoritesError::SignInRequired)?;

        if is_favorite {
            self.backend.remove_favorite_medicine(&user.id, medicine_id).await?;
            debug!(user_id = %user.id, medicine_id, "Removed favorite medicine");
            return Ok(FavoriteToggle::Removed);
        }

        match self
            .backend
            .add_favorite_medicine(&user.id, medicine_id, medicine_name)
            .await
        {
            Ok(_) => {
                debug!(user_id = %user.id, medicine_id, "Added favorite medicine");
                Ok(FavoriteToggle::Added)
            }
            Err(BackendError::Conflict(_)) => {
                debug!(user_id = %user.id, medicine_id, "Medicine already saved");
                Ok(FavoriteToggle::Added)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Which of `medicine_ids` the user has saved. Anonymous users have none.
    pub async fn statuses(
        &self,
        user: Option<&UserIdentity>,
        medicine_ids: &[String],
    ) -> FavoritesResult<HashSet<String>> {
        match user {
            Some(user) if !medicine_ids.is_empty() => Ok(self
                .backend
                .favorite_medicine_ids(&user.id, medicine_ids)
                .await?),
            _ => Ok(HashSet::new()),
        }
    }

    pub async fn medicines(&self, user_id: &str) -> FavoritesResult<Vec<FavoriteMedicine>> {
        Ok(self.backend.list_favorite_medicines(user_id).await?)
    }

    pub async fn remove_medicine(&self, user_id: &str, medicine_id: &str) -> FavoritesResult<()> {
        Ok(self.backend.remove_favorite_medicine(user_id, medicine_id).await?)
    }

    /// Save a store. Returns `None` when it was already saved.
    pub async fn add_store(
        &self,
        user_id: &str,
        store_id: &str,
    ) -> FavoritesResult<Option<FavoriteStore>> {
        match self.backend.add_favorite_store(user_id, store_id).await {
            Ok(favorite) => Ok(Some(favorite)),
            Err(BackendError::Conflict(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn remove_store(&self, user_id: &str, store_id: &str) -> FavoritesResult<()> {
        Ok(self.backend.remove_favorite_store(user_id, store_id).await?)
    }

    /// Saved stores with their store rows, newest first.
    pub async fn stores(&self, user_id: &str, limit: Option<usize>) -> FavoritesResult<Vec<FavoriteStore>> {
        Ok(self.backend.list_favorite_stores(user_id, limit).await?)
    }
}
