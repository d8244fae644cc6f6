//! Medicine search.
//!
//! Runs the geospatial RPC, normalizes the heterogeneous rows it returns into
//! [`NormalizedStore`]s and records the search in the user's history.

mod normalizer;
mod suggestions;

pub use normalizer::*;
pub use suggestions::*;

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::{BackendError, DataBackend};
use crate::map::LatLng;
use crate::models::{NormalizedStore, SearchHistoryEntry, UserIdentity};

/// Search radius when the caller does not pick one.
pub const DEFAULT_RADIUS_KM: f64 = 10.0;

/// Where searches are centred when the user's location is unknown.
pub const DEFAULT_SEARCH_LOCATION: LatLng = LatLng::new(20.5937, 78.9629);

/// Message shown for an unexpected search failure.
pub const SEARCH_FAILED_MESSAGE: &str = "Something went wrong. Please try again.";

/// Search errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("Please enter a medicine name")]
    EmptyQuery,

    #[error("Search failed: {0}")]
    Backend(#[from] BackendError),

    #[error("Search cancelled")]
    Cancelled,
}

impl SearchError {
    /// Text to show the user.
    pub fn user_message(&self) -> String {
        match self {
            SearchError::Backend(_) => SEARCH_FAILED_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

pub type SearchResult<T> = Result<T, SearchError>;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub location: Option<LatLng>,
    pub radius_km: f64,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            location: None,
            radius_km: DEFAULT_RADIUS_KM,
        }
    }

    pub fn near(mut self, location: LatLng) -> Self {
        self.location = Some(location);
        self
    }

    pub fn within(mut self, radius_km: f64) -> Self {
        self.radius_km = radius_km;
        self
    }

    /// Centre of the search, falling back to [`DEFAULT_SEARCH_LOCATION`].
    pub fn origin(&self) -> LatLng {
        self.location.unwrap_or(DEFAULT_SEARCH_LOCATION)
    }
}

/// Results of one search.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub query: String,
    pub stores: Vec<NormalizedStore>,
    /// Rows as returned by the backend, in the same order as `stores`
    pub rows: Vec<Value>,
}

impl SearchOutcome {
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// One-line summary for a status message.
    pub fn summary(&self) -> String {
        match self.stores.len() {
            0 => "No medicines found nearby".to_string(),
            1 => format!("Found 1 result for \"{}\"", self.query),
            n => format!("Found {} results for \"{}\"", n, self.query),
        }
    }

    /// Raw row behind a normalized store.
    pub fn row_for(&self, store: &NormalizedStore) -> Option<&Value> {
        find_row_for_store(&self.rows, store)
    }
}

/// Runs searches against a [`DataBackend`].
pub struct SearchService<B: ?Sized> {
    backend: Arc<B>,
}

impl<B: ?Sized> Clone for SearchService<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: DataBackend + ?Sized> SearchService<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Search for a medicine near the request's origin.
    ///
    /// Signed-in users get the search appended to their history; a failed
    /// history write is logged and does not fail the search. Cancelling
    /// `cancel` abandons the request and returns [`SearchError::Cancelled`].
    pub async fn search(
        &self,
        request: &SearchRequest,
        user: Option<&UserIdentity>,
        cancel: &CancellationToken,
    ) -> SearchResult<SearchOutcome> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let origin = request.origin();
        debug!(query, lat = origin.lat, lng = origin.lng, radius_km = request.radius_km, "Searching");

        let rows = tokio::select! {
            _ = cancel.cancelled() => return Err(SearchError::Cancelled),
            rows = self.backend.search_medicines(query, origin.lat, origin.lng, request.radius_km) => rows?,
        };

        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        let stores = normalize_rows(&rows);
        debug!(query, results = stores.len(), "Search finished");

        if let Some(user) = user {
            let entry = SearchHistoryEntry {
                id: None,
                user_id: user.id.clone(),
                query: query.to_string(),
                latitude: origin.lat,
                longitude: origin.lng,
                results_count: stores.len() as i64,
                created_at: None,
            };
            if let Err(e) = self.backend.log_search(&entry).await {
                warn!(error = %e, "Failed to record search history");
            }
        }

        Ok(SearchOutcome {
            query: query.to_string(),
            stores,
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::models::{MedicineRecord, StoreRecord};
    use std::time::Duration;

    async fn seeded() -> Arc<MemoryBackend> {
        let backend = Arc::new(MemoryBackend::new());
        let store_id = backend
            .put_store(StoreRecord {
                owner_id: "owner".into(),
                store_name: "Apollo".into(),
                address: "1 Main St".into(),
                city: "Mumbai".into(),
                state: "MH".into(),
                latitude: 19.0761,
                longitude: 72.8778,
                opening_time: "09:00".into(),
                closing_time: "21:00".into(),
                is_open: true,
                ..Default::default()
            })
            .await;
        backend
            .put_medicine(MedicineRecord {
                store_id,
                name: "Insulin".into(),
                price: 350.0,
                quantity: 5,
                ..Default::default()
            })
            .await;
        backend
    }

    #[tokio::test]
    async fn test_empty_query_rejected_before_backend() {
        let backend = seeded().await;
        let service = SearchService::new(backend.clone());

        let err = service
            .search(&SearchRequest::new("   "), None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, SearchError::EmptyQuery);
        assert_eq!(err.user_message(), "Please enter a medicine name");
        assert_eq!(backend.calls("search_medicines").await, 0);
    }

    #[tokio::test]
    async fn test_search_logs_history_for_signed_in_user() {
        let backend = seeded().await;
        let service = SearchService::new(backend.clone());
        let user = UserIdentity::new("u1", "a@b.c");
        let request = SearchRequest::new(" insulin ").near(LatLng::new(19.0760, 72.8777));

        let outcome = service
            .search(&request, Some(&user), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.stores.len(), 1);
        assert_eq!(outcome.stores[0].name, "Apollo");
        assert_eq!(outcome.summary(), "Found 1 result for \"insulin\"");
        assert!(outcome.row_for(&outcome.stores[0]).is_some());

        let history = backend.recent_searches("u1", 5).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].query, "insulin");
        assert_eq!(history[0].results_count, 1);
    }

    #[tokio::test]
    async fn test_history_failure_does_not_fail_search() {
        let backend = seeded().await;
        backend.fail("log_search", BackendError::Network("offline".into())).await;
        let service = SearchService::new(backend.clone());
        let user = UserIdentity::new("u1", "a@b.c");

        let outcome = service
            .search(
                &SearchRequest::new("insulin").near(LatLng::new(19.0760, 72.8777)),
                Some(&user),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.stores.len(), 1);
    }

    #[tokio::test]
    async fn test_anonymous_search_uses_default_location() {
        let backend = seeded().await;
        let service = SearchService::new(backend.clone());

        // The only store is in Mumbai, far outside 10 km of the default centre.
        let outcome = service
            .search(&SearchRequest::new("insulin"), None, &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.is_empty());
        assert_eq!(outcome.summary(), "No medicines found nearby");
        assert_eq!(backend.calls("log_search").await, 0);
    }

    #[tokio::test]
    async fn test_backend_failure_maps_to_generic_message() {
        let backend = seeded().await;
        backend.fail("search_medicines", BackendError::Network("offline".into())).await;
        let service = SearchService::new(backend);

        let err = service
            .search(&SearchRequest::new("insulin"), None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), SEARCH_FAILED_MESSAGE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_abandons_request() {
        let backend = seeded().await;
        backend.delay("search_medicines", Duration::from_secs(30)).await;
        let service = SearchService::new(backend.clone());
        let user = UserIdentity::new("u1", "a@b.c");
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let err = service
            .search(&SearchRequest::new("insulin"), Some(&user), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, SearchError::Cancelled);
        assert_eq!(backend.calls("log_search").await, 0);
    }
}
