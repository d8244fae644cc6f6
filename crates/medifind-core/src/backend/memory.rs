//! In-process backend.
//!
//! Implements both backend traits over plain collections behind a shared
//! `RwLock`. Used by tests and by offline demos. Individual operations can be
//! slowed down or made to fail, and every call is counted.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use super::{
    AuthEvent, AuthProvider, BackendError, BackendResult, DataBackend, SignUpRequest,
    SignUpResponse,
};
use crate::map::LatLng;
use crate::models::{
    AuthSession, FavoriteMedicine, FavoriteStore, MedicineAlert, MedicineRecord, Profile,
    ProfileUpdate, SearchHistoryEntry, StoreRecord, UserIdentity,
};

const SESSION_TTL_SECS: i64 = 3600;

#[derive(Debug, Clone)]
struct Account {
    password: String,
    user: UserIdentity,
}

#[derive(Default)]
struct State {
    accounts: HashMap<String, Account>,
    /// access token -> user id
    access_tokens: HashMap<String, String>,
    /// refresh token -> user id
    refresh_tokens: HashMap<String, String>,
    profiles: HashMap<String, Profile>,
    stores: Vec<StoreRecord>,
    medicines: Vec<MedicineRecord>,
    history: Vec<SearchHistoryEntry>,
    favorite_medicines: Vec<FavoriteMedicine>,
    favorite_stores: Vec<FavoriteStore>,
    alerts: Vec<MedicineAlert>,
    uploads: HashMap<String, Vec<u8>>,
    failures: HashMap<String, BackendError>,
    delays: HashMap<String, Duration>,
    calls: HashMap<String, usize>,
}

/// In-memory implementation of [`AuthProvider`] and [`DataBackend`].
#[derive(Clone)]
pub struct MemoryBackend {
    state: Arc<RwLock<State>>,
    events: broadcast::Sender<AuthEvent>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            state: Arc::new(RwLock::new(State::default())),
            events,
        }
    }

    // ─── Seeding ───────────────────────────────────────────────────

    /// Register an account directly. Returns the new user.
    pub async fn add_account(&self, email: &str, password: &str, metadata: Value) -> UserIdentity {
        let mut user = UserIdentity::new(Uuid::new_v4().to_string(), email);
        if let Value::Object(map) = metadata {
            user.user_metadata = map.into_iter().collect();
        }

        let mut state = self.state.write().await;
        state.accounts.insert(
            email.to_lowercase(),
            Account {
                password: password.to_string(),
                user: user.clone(),
            },
        );
        user
    }

    pub async fn put_profile(&self, profile: Profile) {
        self.state.write().await.profiles.insert(profile.id.clone(), profile);
    }

    pub async fn profile(&self, user_id: &str) -> Option<Profile> {
        self.state.read().await.profiles.get(user_id).cloned()
    }

    /// Add a store, assigning an id when it has none.
    pub async fn put_store(&self, mut store: StoreRecord) -> String {
        let id = store.id.get_or_insert_with(|| Uuid::new_v4().to_string()).clone();
        self.state.write().await.stores.push(store);
        id
    }

    /// Add a medicine, assigning an id when it has none.
    pub async fn put_medicine(&self, mut medicine: MedicineRecord) -> String {
        let id = medicine.id.get_or_insert_with(|| Uuid::new_v4().to_string()).clone();
        self.state.write().await.medicines.push(medicine);
        id
    }

    pub async fn put_alert(&self, user_id: &str, medicine_name: &str, is_active: bool) {
        self.state.write().await.alerts.push(MedicineAlert {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            medicine_name: medicine_name.to_string(),
            is_active,
        });
    }

    /// Invalidate every access token of a user (refresh tokens survive).
    pub async fn expire_access_tokens(&self, user_id: &str) {
        self.state
            .write()
            .await
            .access_tokens
            .retain(|_, owner| owner != user_id);
    }

    /// Push an auth event to subscribers, as the provider would.
    pub fn emit(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }

    // ─── Fault injection ───────────────────────────────────────────

    /// Make every call of `operation` fail with `error` until cleared.
    pub async fn fail(&self, operation: &str, error: BackendError) {
        self.state.write().await.failures.insert(operation.to_string(), error);
    }

    pub async fn clear_failure(&self, operation: &str) {
        self.state.write().await.failures.remove(operation);
    }

    /// Delay every call of `operation` by `delay` (respects paused tokio time).
    pub async fn delay(&self, operation: &str, delay: Duration) {
        self.state.write().await.delays.insert(operation.to_string(), delay);
    }

    /// How many times `operation` was called.
    pub async fn calls(&self, operation: &str) -> usize {
        self.state.read().await.calls.get(operation).copied().unwrap_or(0)
    }

    pub async fn stored_upload(&self, path: &str) -> Option<Vec<u8>> {
        self.state.read().await.uploads.get(path).cloned()
    }

    /// Count the call, apply any delay, then return any injected failure.
    async fn enter(&self, operation: &str) -> BackendResult<()> {
        let delay = {
            let mut state = self.state.write().await;
            *state.calls.entry(operation.to_string()).or_insert(0) += 1;
            state.delays.get(operation).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.state.read().await.failures.get(operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn issue_session(state: &mut State, user: &UserIdentity) -> AuthSession {
        let access = format!("access-{}", Uuid::new_v4());
        let refresh = format!("refresh-{}", Uuid::new_v4());
        state.access_tokens.insert(access.clone(), user.id.clone());
        state.refresh_tokens.insert(refresh.clone(), user.id.clone());

        AuthSession {
            access_token: access,
            refresh_token: Some(refresh),
            token_type: "bearer".to_string(),
            expires_at: Some(Utc::now().timestamp() + SESSION_TTL_SECS),
            user: user.clone(),
        }
    }

    fn user_by_id(state: &State, user_id: &str) -> Option<UserIdentity> {
        state
            .accounts
            .values()
            .find(|a| a.user.id == user_id)
            .map(|a| a.user.clone())
    }
}

/// Joined search row in the shape the RPC returns.
fn search_row(medicine: &MedicineRecord, store: &StoreRecord, distance_km: f64) -> Value {
    json!({
        "id": medicine.id,
        "name": medicine.name,
        "generic_name": medicine.generic_name,
        "manufacturer": medicine.manufacturer,
        "dosage": medicine.dosage,
        "price": medicine.price,
        "quantity": medicine.quantity,
        "requires_prescription": medicine.requires_prescription,
        "image_url": medicine.image_url,
        "distance_km": distance_km,
        "stores": store,
    })
}

fn matches_query(medicine: &MedicineRecord, query: &str) -> bool {
    let query = query.to_lowercase();
    medicine.name.to_lowercase().contains(&query)
        || medicine
            .generic_name
            .as_deref()
            .map(|g| g.to_lowercase().contains(&query))
            .unwrap_or(false)
}

#[async_trait]
impl AuthProvider for MemoryBackend {
    async fn sign_in(&self, email: &str, password: &str) -> BackendResult<AuthSession> {
        self.enter("sign_in").await?;

        let session = {
            let mut state = self.state.write().await;
            let account = state
                .accounts
                .get(&email.to_lowercase())
                .filter(|a| a.password == password)
                .cloned()
                .ok_or_else(|| BackendError::Http {
                    status: 400,
                    message: "Invalid login credentials".to_string(),
                })?;
            Self::issue_session(&mut state, &account.user)
        };

        self.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, request: &SignUpRequest) -> BackendResult<SignUpResponse> {
        self.enter("sign_up").await?;

        let session = {
            let mut state = self.state.write().await;
            let key = request.email.to_lowercase();
            if state.accounts.contains_key(&key) {
                return Err(BackendError::Http {
                    status: 422,
                    message: "User already registered".to_string(),
                });
            }

            let mut user = UserIdentity::new(Uuid::new_v4().to_string(), &request.email)
                .with_metadata("full_name", request.full_name.clone())
                .with_metadata("role", request.role.as_str());
            if let Some(phone) = &request.phone {
                user = user.with_metadata("phone", phone.clone());
            }

            state.accounts.insert(
                key,
                Account {
                    password: request.password.clone(),
                    user: user.clone(),
                },
            );
            Self::issue_session(&mut state, &user)
        };

        self.emit(AuthEvent::SignedIn(session.clone()));
        Ok(SignUpResponse {
            user: session.user.clone(),
            session: Some(session),
        })
    }

    async fn sign_out(&self, session: Option<&AuthSession>) -> BackendResult<()> {
        let result = self.enter("sign_out").await;

        if let Some(session) = session {
            let mut state = self.state.write().await;
            state.access_tokens.remove(&session.access_token);
            if let Some(refresh) = &session.refresh_token {
                state.refresh_tokens.remove(refresh);
            }
        }

        self.emit(AuthEvent::SignedOut);
        result
    }

    async fn get_session(&self, stored: Option<&AuthSession>) -> BackendResult<Option<AuthSession>> {
        self.enter("get_session").await?;

        let Some(stored) = stored else {
            return Ok(None);
        };

        let refreshed = {
            let mut state = self.state.write().await;

            if let Some(user_id) = state.access_tokens.get(&stored.access_token).cloned() {
                let mut session = stored.clone();
                if let Some(user) = Self::user_by_id(&state, &user_id) {
                    session.user = user;
                }
                return Ok(Some(session));
            }

            let user_id = stored
                .refresh_token
                .as_ref()
                .and_then(|r| state.refresh_tokens.remove(r));
            match user_id.and_then(|id| Self::user_by_id(&state, &id)) {
                Some(user) => Self::issue_session(&mut state, &user),
                None => return Ok(None),
            }
        };

        self.emit(AuthEvent::TokenRefreshed(refreshed.clone()));
        Ok(Some(refreshed))
    }

    fn events(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl DataBackend for MemoryBackend {
    async fn fetch_profile(&self, user_id: &str) -> BackendResult<Option<Profile>> {
        self.enter("fetch_profile").await?;
        Ok(self.state.read().await.profiles.get(user_id).cloned())
    }

    async fn insert_profile(&self, profile: &Profile) -> BackendResult<()> {
        self.enter("insert_profile").await?;
        let mut state = self.state.write().await;
        if state.profiles.contains_key(&profile.id) {
            return Err(BackendError::Conflict(format!("profile {}", profile.id)));
        }
        state.profiles.insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> BackendResult<Profile> {
        self.enter("update_profile").await?;
        let mut state = self.state.write().await;
        let profile = state
            .profiles
            .get_mut(user_id)
            .ok_or_else(|| BackendError::NotFound(format!("profile {}", user_id)))?;
        update.apply_to(profile);
        Ok(profile.clone())
    }

    async fn search_medicines(
        &self,
        query: &str,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> BackendResult<Vec<Value>> {
        self.enter("search_medicines").await?;
        let state = self.state.read().await;
        let origin = LatLng::new(latitude, longitude);

        let mut hits: Vec<(f64, Value)> = state
            .medicines
            .iter()
            .filter(|m| matches_query(m, query))
            .filter_map(|m| {
                let store = state.stores.iter().find(|s| s.id.as_deref() == Some(m.store_id.as_str()))?;
                let distance = origin.distance_km(&LatLng::new(store.latitude, store.longitude));
                (distance <= radius_km).then(|| (distance, search_row(m, store, distance)))
            })
            .collect();

        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(hits.into_iter().map(|(_, row)| row).collect())
    }

    async fn log_search(&self, entry: &SearchHistoryEntry) -> BackendResult<()> {
        self.enter("log_search").await?;
        let mut entry = entry.clone();
        entry.id.get_or_insert_with(|| Uuid::new_v4().to_string());
        entry.created_at.get_or_insert_with(|| Utc::now().to_rfc3339());
        self.state.write().await.history.push(entry);
        Ok(())
    }

    async fn recent_searches(&self, user_id: &str, limit: usize) -> BackendResult<Vec<SearchHistoryEntry>> {
        self.enter("recent_searches").await?;
        let state = self.state.read().await;
        Ok(state
            .history
            .iter()
            .rev()
            .filter(|h| h.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_searches(&self, user_id: &str) -> BackendResult<u64> {
        self.enter("count_searches").await?;
        let state = self.state.read().await;
        Ok(state.history.iter().filter(|h| h.user_id == user_id).count() as u64)
    }

    async fn add_favorite_medicine(
        &self,
        user_id: &str,
        medicine_id: &str,
        medicine_name: &str,
    ) -> BackendResult<FavoriteMedicine> {
        self.enter("add_favorite_medicine").await?;
        let mut state = self.state.write().await;
        if state
            .favorite_medicines
            .iter()
            .any(|f| f.user_id == user_id && f.medicine_id == medicine_id)
        {
            return Err(BackendError::Conflict(format!("favorite medicine {}", medicine_id)));
        }

        let favorite = FavoriteMedicine {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            medicine_id: medicine_id.to_string(),
            medicine_name: Some(medicine_name.to_string()),
            created_at: Some(Utc::now().to_rfc3339()),
        };
        state.favorite_medicines.push(favorite.clone());
        Ok(favorite)
    }

    async fn remove_favorite_medicine(&self, user_id: &str, medicine_id: &str) -> BackendResult<()> {
        self.enter("remove_favorite_medicine").await?;
        self.state
            .write()
            .await
            .favorite_medicines
            .retain(|f| !(f.user_id == user_id && f.medicine_id == medicine_id));
        Ok(())
    }

    async fn favorite_medicine_ids(
        &self,
        user_id: &str,
        medicine_ids: &[String],
    ) -> BackendResult<HashSet<String>> {
        self.enter("favorite_medicine_ids").await?;
        let wanted: HashSet<&String> = medicine_ids.iter().collect();
        let state = self.state.read().await;
        Ok(state
            .favorite_medicines
            .iter()
            .filter(|f| f.user_id == user_id && wanted.contains(&f.medicine_id))
            .map(|f| f.medicine_id.clone())
            .collect())
    }

    async fn list_favorite_medicines(&self, user_id: &str) -> BackendResult<Vec<FavoriteMedicine>> {
        self.enter("list_favorite_medicines").await?;
        let state = self.state.read().await;
        Ok(state
            .favorite_medicines
            .iter()
            .rev()
            .filter(|f| f.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn count_favorite_medicines(&self, user_id: &str) -> BackendResult<u64> {
        self.enter("count_favorite_medicines").await?;
        let state = self.state.read().await;
        Ok(state.favorite_medicines.iter().filter(|f| f.user_id == user_id).count() as u64)
    }

    async fn add_favorite_store(&self, user_id: &str, store_id: &str) -> BackendResult<FavoriteStore> {
        self.enter("add_favorite_store").await?;
        let mut state = self.state.write().await;
        if state
            .favorite_stores
            .iter()
            .any(|f| f.user_id == user_id && f.store_id == store_id)
        {
            return Err(BackendError::Conflict(format!("favorite store {}", store_id)));
        }

        let favorite = FavoriteStore {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            store_id: store_id.to_string(),
            created_at: Some(Utc::now().to_rfc3339()),
            store: None,
        };
        state.favorite_stores.push(favorite.clone());
        Ok(favorite)
    }

    async fn remove_favorite_store(&self, user_id: &str, store_id: &str) -> BackendResult<()> {
        self.enter("remove_favorite_store").await?;
        self.state
            .write()
            .await
            .favorite_stores
            .retain(|f| !(f.user_id == user_id && f.store_id == store_id));
        Ok(())
    }

    async fn list_favorite_stores(
        &self,
        user_id: &str,
        limit: Option<usize>,
    ) -> BackendResult<Vec<FavoriteStore>> {
        self.enter("list_favorite_stores").await?;
        let state = self.state.read().await;
        Ok(state
            .favorite_stores
            .iter()
            .rev()
            .filter(|f| f.user_id == user_id)
            .take(limit.unwrap_or(usize::MAX))
            .map(|f| {
                let mut favorite = f.clone();
                favorite.store = state
                    .stores
                    .iter()
                    .find(|s| s.id.as_deref() == Some(f.store_id.as_str()))
                    .cloned();
                favorite
            })
            .collect())
    }

    async fn count_favorite_stores(&self, user_id: &str) -> BackendResult<u64> {
        self.enter("count_favorite_stores").await?;
        let state = self.state.read().await;
        Ok(state.favorite_stores.iter().filter(|f| f.user_id == user_id).count() as u64)
    }

    async fn count_active_alerts(&self, user_id: &str) -> BackendResult<u64> {
        self.enter("count_active_alerts").await?;
        let state = self.state.read().await;
        Ok(state
            .alerts
            .iter()
            .filter(|a| a.user_id == user_id && a.is_active)
            .count() as u64)
    }

    async fn list_stores(&self, owner_id: &str) -> BackendResult<Vec<StoreRecord>> {
        self.enter("list_stores").await?;
        let state = self.state.read().await;
        Ok(state
            .stores
            .iter()
            .rev()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn insert_store(&self, store: &StoreRecord) -> BackendResult<StoreRecord> {
        self.enter("insert_store").await?;
        let mut store = store.clone();
        store.id = Some(Uuid::new_v4().to_string());
        store.created_at.get_or_insert_with(|| Utc::now().to_rfc3339());
        self.state.write().await.stores.push(store.clone());
        Ok(store)
    }

    async fn update_store(&self, store_id: &str, store: &StoreRecord) -> BackendResult<StoreRecord> {
        self.enter("update_store").await?;
        let mut state = self.state.write().await;
        let existing = state
            .stores
            .iter_mut()
            .find(|s| s.id.as_deref() == Some(store_id))
            .ok_or_else(|| BackendError::NotFound(format!("store {}", store_id)))?;

        let created_at = existing.created_at.clone();
        *existing = store.clone();
        existing.id = Some(store_id.to_string());
        existing.created_at = created_at;
        Ok(existing.clone())
    }

    async fn delete_store(&self, store_id: &str) -> BackendResult<()> {
        self.enter("delete_store").await?;
        let mut state = self.state.write().await;
        state.stores.retain(|s| s.id.as_deref() != Some(store_id));
        state.medicines.retain(|m| m.store_id != store_id);
        state.favorite_stores.retain(|f| f.store_id != store_id);
        Ok(())
    }

    async fn set_store_open(&self, store_id: &str, is_open: bool) -> BackendResult<()> {
        self.enter("set_store_open").await?;
        let mut state = self.state.write().await;
        let store = state
            .stores
            .iter_mut()
            .find(|s| s.id.as_deref() == Some(store_id))
            .ok_or_else(|| BackendError::NotFound(format!("store {}", store_id)))?;
        store.is_open = is_open;
        Ok(())
    }

    async fn list_medicines(&self, store_ids: &[String]) -> BackendResult<Vec<MedicineRecord>> {
        self.enter("list_medicines").await?;
        let state = self.state.read().await;
        let mut medicines: Vec<MedicineRecord> = state
            .medicines
            .iter()
            .filter(|m| store_ids.contains(&m.store_id))
            .cloned()
            .collect();
        medicines.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(medicines)
    }

    async fn insert_medicine(&self, medicine: &MedicineRecord) -> BackendResult<MedicineRecord> {
        self.enter("insert_medicine").await?;
        let mut medicine = medicine.clone();
        medicine.id = Some(Uuid::new_v4().to_string());
        self.state.write().await.medicines.push(medicine.clone());
        Ok(medicine)
    }

    async fn update_medicine(
        &self,
        medicine_id: &str,
        medicine: &MedicineRecord,
    ) -> BackendResult<MedicineRecord> {
        self.enter("update_medicine").await?;
        let mut state = self.state.write().await;
        let existing = state
            .medicines
            .iter_mut()
            .find(|m| m.id.as_deref() == Some(medicine_id))
            .ok_or_else(|| BackendError::NotFound(format!("medicine {}", medicine_id)))?;
        *existing = medicine.clone();
        existing.id = Some(medicine_id.to_string());
        Ok(existing.clone())
    }

    async fn delete_medicine(&self, medicine_id: &str) -> BackendResult<()> {
        self.enter("delete_medicine").await?;
        let mut state = self.state.write().await;
        state.medicines.retain(|m| m.id.as_deref() != Some(medicine_id));
        state.favorite_medicines.retain(|f| f.medicine_id != medicine_id);
        Ok(())
    }

    async fn upload_image(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> BackendResult<String> {
        self.enter("upload_image").await?;
        let mut state = self.state.write().await;
        if state.uploads.contains_key(path) {
            return Err(BackendError::Conflict(format!("{}/{}", bucket, path)));
        }
        state.uploads.insert(path.to_string(), bytes);
        Ok(format!("memory://{}/{}", bucket, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(owner: &str, lat: f64, lng: f64) -> StoreRecord {
        StoreRecord {
            owner_id: owner.into(),
            store_name: format!("Store {}", lat),
            latitude: lat,
            longitude: lng,
            is_open: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_search_sorted_by_distance_within_radius() {
        let backend = MemoryBackend::new();
        let far = backend.put_store(store("o", 19.10, 72.88)).await;
        let near = backend.put_store(store("o", 19.077, 72.878)).await;
        let outside = backend.put_store(store("o", 28.6, 77.2)).await;

        for store_id in [&far, &near, &outside] {
            backend
                .put_medicine(MedicineRecord {
                    store_id: store_id.clone(),
                    name: "Paracetamol 500".into(),
                    price: 20.0,
                    quantity: 40,
                    ..Default::default()
                })
                .await;
        }

        let rows = backend.search_medicines("paracetamol", 19.0760, 72.8777, 10.0).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["stores"]["id"], json!(near));
        assert_eq!(rows[1]["stores"]["id"], json!(far));
        assert!(rows[0]["distance_km"].as_f64().unwrap() < rows[1]["distance_km"].as_f64().unwrap());
    }

    #[tokio::test]
    async fn test_favorite_uniqueness() {
        let backend = MemoryBackend::new();
        backend.add_favorite_medicine("u1", "m1", "Insulin").await.unwrap();

        let err = backend.add_favorite_medicine("u1", "m1", "Insulin").await.unwrap_err();
        assert!(matches!(err, BackendError::Conflict(_)));

        backend.remove_favorite_medicine("u1", "m1").await.unwrap();
        backend.remove_favorite_medicine("u1", "m1").await.unwrap();
        assert_eq!(backend.count_favorite_medicines("u1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_refresh_after_access_token_expiry() {
        let backend = MemoryBackend::new();
        let user = backend.add_account("a@b.c", "pw", json!({})).await;
        let session = backend.sign_in("a@b.c", "pw").await.unwrap();

        backend.expire_access_tokens(&user.id).await;
        let mut events = backend.events();

        let refreshed = backend.get_session(Some(&session)).await.unwrap().unwrap();
        assert_ne!(refreshed.access_token, session.access_token);
        assert!(matches!(events.recv().await.unwrap(), AuthEvent::TokenRefreshed(_)));

        // The old refresh token was consumed.
        backend.expire_access_tokens(&user.id).await;
        assert!(backend.get_session(Some(&session)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let backend = MemoryBackend::new();
        backend.fail("fetch_profile", BackendError::Network("offline".into())).await;

        assert!(backend.fetch_profile("u1").await.is_err());
        backend.clear_failure("fetch_profile").await;
        assert!(backend.fetch_profile("u1").await.unwrap().is_none());
        assert_eq!(backend.calls("fetch_profile").await, 2);
    }
}
