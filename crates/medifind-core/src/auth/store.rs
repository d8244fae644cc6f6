//! The session store.

use std::sync::{Arc, Mutex as SyncMutex, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::{AuthError, AuthResult, SessionPersistence};
use crate::backend::{AuthEvent, AuthProvider, DataBackend, SignUpRequest};
use crate::config::DEFAULT_PROFILE_TIMEOUT;
use crate::models::{
    AuthSession, PersistedSession, Profile, ProfileUpdate, Role, SessionState, UserIdentity,
};

/// Owner of the process-wide [`SessionState`].
///
/// Cloning is cheap; every clone drives the same state. State is only ever
/// changed through these methods and [`AuthStore::handle_event`], and every
/// change to the identity fields is written through the persistence layer.
#[derive(Clone)]
pub struct AuthStore {
    inner: Arc<Inner>,
}

struct Inner {
    state: watch::Sender<SessionState>,
    auth: Arc<dyn AuthProvider>,
    data: Arc<dyn DataBackend>,
    persistence: Arc<dyn SessionPersistence>,
    tasks: TaskTracker,
    init_lock: Mutex<()>,
    write_lock: SyncMutex<()>,
    sign_ins: SyncMutex<SignInFilter>,
    profile_timeout: Duration,
}

/// Provider `SignedIn` events that [`AuthStore::login`] owns: those for an
/// email whose login is still running, and the session it last rejected.
#[derive(Default)]
struct SignInFilter {
    in_flight: Vec<String>,
    rejected_token: Option<String>,
}

impl SignInFilter {
    fn owns(&self, session: &AuthSession) -> bool {
        if self.rejected_token.as_deref() == Some(session.access_token.as_str()) {
            return true;
        }
        session
            .user
            .email
            .as_deref()
            .map(|email| self.in_flight.contains(&email.to_lowercase()))
            .unwrap_or(false)
    }
}

/// Marks a login as running until dropped.
struct PendingSignIn<'a> {
    filter: &'a SyncMutex<SignInFilter>,
    email: String,
}

impl<'a> PendingSignIn<'a> {
    fn start(filter: &'a SyncMutex<SignInFilter>, email: &str) -> Self {
        let email = email.to_lowercase();
        filter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .in_flight
            .push(email.clone());
        Self { filter, email }
    }
}

impl Drop for PendingSignIn<'_> {
    fn drop(&mut self) {
        let mut filter = self.filter.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pos) = filter.in_flight.iter().position(|e| *e == self.email) {
            filter.in_flight.swap_remove(pos);
        }
    }
}

fn signed_in_as(state: &SessionState, user_id: &str) -> bool {
    state.user.as_ref().map(|u| u.id.as_str()) == Some(user_id)
}

impl AuthStore {
    /// Create a store, restoring whatever identity was persisted last time.
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        data: Arc<dyn DataBackend>,
        persistence: Arc<dyn SessionPersistence>,
    ) -> Self {
        Self::with_profile_timeout(auth, data, persistence, DEFAULT_PROFILE_TIMEOUT)
    }

    pub fn with_profile_timeout(
        auth: Arc<dyn AuthProvider>,
        data: Arc<dyn DataBackend>,
        persistence: Arc<dyn SessionPersistence>,
        profile_timeout: Duration,
    ) -> Self {
        let restored = persistence.load().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load saved session");
            PersistedSession::default()
        });

        let initial = SessionState {
            user: restored.user,
            profile: restored.profile,
            session: restored.session,
            initialized: false,
            loading: true,
            error: None,
        };
        let (state, _) = watch::channel(initial);

        Self {
            inner: Arc::new(Inner {
                state,
                auth,
                data,
                persistence,
                tasks: TaskTracker::new(),
                init_lock: Mutex::new(()),
                write_lock: SyncMutex::new(()),
                sign_ins: SyncMutex::new(SignInFilter::default()),
                profile_timeout,
            }),
        }
    }

    // ─── Reading ───────────────────────────────────────────────────

    /// Current state.
    pub fn snapshot(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn is_retailer(&self) -> bool {
        self.inner
            .state
            .borrow()
            .profile
            .as_ref()
            .map(Profile::is_retailer)
            .unwrap_or(false)
    }

    pub fn is_customer(&self) -> bool {
        self.inner
            .state
            .borrow()
            .profile
            .as_ref()
            .map(Profile::is_customer)
            .unwrap_or(false)
    }

    fn sign_in_filter(&self) -> std::sync::MutexGuard<'_, SignInFilter> {
        self.inner
            .sign_ins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn current_user_id(&self) -> Option<String> {
        self.inner.state.borrow().user.as_ref().map(|u| u.id.clone())
    }

    // ─── Writing ───────────────────────────────────────────────────

    /// Apply a change and write the identity fields through when they moved.
    ///
    /// The write happens after the watch lock is released; `write_lock` keeps
    /// writes in the same order as the changes.
    fn update(&self, change: impl FnOnce(&mut SessionState)) {
        let _writing = self
            .inner
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut moved = None;
        self.inner.state.send_modify(|state| {
            let before = state.persisted();
            change(state);
            let after = state.persisted();
            if after != before {
                moved = Some(after);
            }
        });

        let Some(after) = moved else {
            return;
        };
        let persistence = &self.inner.persistence;
        let written = if after.is_empty() {
            persistence.clear()
        } else {
            persistence.save(&after)
        };
        if let Err(e) = written {
            warn!(error = %e, "Failed to persist session");
        }
    }

    /// Record a failure in `error`, stop loading and hand the error back.
    fn fail(&self, error: impl Into<AuthError>) -> AuthError {
        let error = error.into();
        let message = error.to_string();
        self.update(|state| {
            state.loading = false;
            state.error = Some(message);
        });
        error
    }

    pub fn clear_error(&self) {
        self.update(|state| state.error = None);
    }

    // ─── Lifecycle ─────────────────────────────────────────────────

    /// Establish who is signed in. Runs once; later calls only reset `loading`.
    ///
    /// With a cached user and profile the state is published right away and
    /// the session is verified in the background. Otherwise the current
    /// session is fetched, and the profile lookup is bounded by the profile
    /// timeout with a metadata-derived profile as fallback. Failures never
    /// escape: the store always ends initialized and not loading.
    pub async fn initialize(&self) {
        let _init = self.inner.init_lock.lock().await;

        let initialized = self.inner.state.borrow().initialized;
        if initialized {
            self.update(|state| state.loading = false);
            return;
        }

        let cached = self.inner.state.borrow().persisted();

        if let Some((user, _)) = cached.cached_pair() {
            let user_id = user.id.clone();
            debug!(user_id = %user_id, "Restored cached session");
            self.update(|state| {
                state.loading = false;
                state.initialized = true;
            });

            let store = self.clone();
            let stored = cached.session.clone();
            self.inner
                .tasks
                .spawn(async move { store.verify_cached(user_id, stored).await });
            return;
        }

        self.update(|state| state.loading = true);

        match self.inner.auth.get_session(cached.session.as_ref()).await {
            Ok(Some(session)) => {
                let user = session.user.clone();
                let profile = self.profile_or_fallback(&user).await;
                info!(user_id = %user.id, role = %profile.role, "Session established");

                self.update(|state| {
                    state.user = Some(user);
                    state.profile = Some(profile);
                    state.session = Some(session);
                    state.loading = false;
                    state.initialized = true;
                    state.error = None;
                });
            }
            Ok(None) => {
                debug!("No active session");
                self.update(Self::settle_signed_out);
            }
            Err(e) => {
                warn!(error = %e, "Auth initialization failed");
                self.update(Self::settle_signed_out);
            }
        }
    }

    fn settle_signed_out(state: &mut SessionState) {
        state.clear_identity();
        state.loading = false;
        state.initialized = true;
        state.error = None;
    }

    async fn profile_or_fallback(&self, user: &UserIdentity) -> Profile {
        let lookup = self.inner.data.fetch_profile(&user.id);

        match tokio::time::timeout(self.inner.profile_timeout, lookup).await {
            Ok(Ok(Some(profile))) => profile,
            Ok(Ok(None)) => {
                debug!(user_id = %user.id, "No profile row, using metadata");
                Profile::from_identity(user)
            }
            Ok(Err(e)) => {
                warn!(user_id = %user.id, error = %e, "Profile lookup failed, using metadata");
                Profile::from_identity(user)
            }
            Err(_) => {
                warn!(
                    user_id = %user.id,
                    timeout_ms = self.inner.profile_timeout.as_millis() as u64,
                    "Profile lookup timed out, using metadata"
                );
                Profile::from_identity(user)
            }
        }
    }

    /// Background check of a cached session. Results only land if the same
    /// user is still signed in.
    async fn verify_cached(&self, user_id: String, stored: Option<AuthSession>) {
        let session = match self.inner.auth.get_session(stored.as_ref()).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                debug!(user_id = %user_id, "Cached session expired");
                self.update(|state| {
                    if signed_in_as(state, &user_id) {
                        state.clear_identity();
                    }
                });
                return;
            }
            Err(e) => {
                debug!(user_id = %user_id, error = %e, "Cached session verification failed");
                self.update(|state| {
                    if signed_in_as(state, &user_id) {
                        state.clear_identity();
                    }
                });
                return;
            }
        };

        let fetched = match self.inner.data.fetch_profile(&session.user.id).await {
            Ok(profile) => profile,
            Err(e) => {
                debug!(error = %e, "Background profile refresh failed");
                None
            }
        };

        self.update(|state| {
            if !signed_in_as(state, &user_id) {
                debug!(user_id = %user_id, "Dropping stale session verification");
                return;
            }
            match fetched {
                Some(profile) => state.profile = Some(profile),
                None if session.user.id != user_id => {
                    state.profile = Some(Profile::from_identity(&session.user));
                }
                None => {}
            }
            state.user = Some(session.user.clone());
            state.session = Some(session);
        });
    }

    /// Replace the provisional profile with the stored row, unless the user
    /// changed in the meantime.
    fn refresh_profile_in_background(&self, user_id: String) {
        let store = self.clone();

        self.inner.tasks.spawn(async move {
            match store.inner.data.fetch_profile(&user_id).await {
                Ok(Some(profile)) => store.update(|state| {
                    if signed_in_as(state, &user_id) && profile.id == user_id {
                        state.profile = Some(profile);
                    } else {
                        debug!(user_id = %user_id, "Dropping stale profile refresh");
                    }
                }),
                Ok(None) => {}
                Err(e) => debug!(user_id = %user_id, error = %e, "Background profile refresh failed"),
            }
        });
    }

    /// Role the account is registered with: metadata first, then the
    /// profile row.
    async fn stored_role(&self, user: &UserIdentity) -> Option<Role> {
        if let Some(role) = user.metadata_role() {
            return Some(role);
        }
        match self.inner.data.fetch_profile(&user.id).await {
            Ok(profile) => profile.map(|p| p.role),
            Err(e) => {
                debug!(user_id = %user.id, error = %e, "Could not read stored role");
                None
            }
        }
    }

    // ─── Account operations ────────────────────────────────────────

    /// Sign in with email and password.
    ///
    /// With `expected_role`, an account registered under another role is
    /// signed out again and rejected with [`AuthError::RoleMismatch`]. This is
    /// a convenience check for the sign-in form; the backend enforces access.
    ///
    /// The returned profile is provisional (built from metadata); the stored
    /// profile replaces it in the background. Provider `SignedIn` events for
    /// this attempt are ignored, so a rejected account is never published.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        expected_role: Option<Role>,
    ) -> AuthResult<Profile> {
        let email = email.trim();
        let _pending = PendingSignIn::start(&self.inner.sign_ins, email);

        self.update(|state| {
            state.loading = true;
            state.error = None;
        });

        let session = match self.inner.auth.sign_in(email, password).await {
            Ok(session) => session,
            Err(e) => return Err(self.fail(e)),
        };
        let user = session.user.clone();

        if let Some(expected) = expected_role {
            if let Some(actual) = self.stored_role(&user).await {
                if actual != expected {
                    info!(user_id = %user.id, %expected, %actual, "Sign-in rejected: role mismatch");
                    self.sign_in_filter().rejected_token = Some(session.access_token.clone());
                    if let Err(e) = self.inner.auth.sign_out(Some(&session)).await {
                        warn!(error = %e, "Sign-out after role mismatch failed");
                    }
                    self.update(|state| {
                        if signed_in_as(state, &user.id) {
                            state.clear_identity();
                        }
                    });
                    return Err(self.fail(AuthError::RoleMismatch { expected, actual }));
                }
            }
        }

        let mut profile = Profile::from_identity(&user);
        if user.metadata_role().is_none() {
            profile.role = expected_role.unwrap_or_default();
        }

        let user_id = user.id.clone();
        let published = profile.clone();
        self.update(|state| {
            state.user = Some(user);
            state.session = Some(session);
            state.profile = Some(published);
            state.loading = false;
            state.initialized = true;
        });
        info!(user_id = %user_id, role = %profile.role, "Signed in");

        self.refresh_profile_in_background(user_id);
        Ok(profile)
    }

    /// Create an account and its profile row, then publish the submitted data.
    ///
    /// A failed profile insert is logged and does not fail the registration.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        role: Role,
        phone: Option<&str>,
    ) -> AuthResult<Profile> {
        self.update(|state| {
            state.loading = true;
            state.error = None;
        });

        let request = SignUpRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
            full_name: full_name.trim().to_string(),
            role,
            phone: phone.map(str::trim).filter(|p| !p.is_empty()).map(str::to_string),
        };

        let response = match self.inner.auth.sign_up(&request).await {
            Ok(response) => response,
            Err(e) => return Err(self.fail(e)),
        };

        let profile = Profile {
            id: response.user.id.clone(),
            email: request.email,
            full_name: request.full_name,
            role,
            phone: request.phone,
        };
        if let Err(e) = self.inner.data.insert_profile(&profile).await {
            warn!(user_id = %profile.id, error = %e, "Failed to create profile row");
        }

        info!(user_id = %profile.id, %role, "Registered");
        let published = profile.clone();
        self.update(|state| {
            state.user = Some(response.user);
            state.session = response.session;
            state.profile = Some(published);
            state.loading = false;
            state.initialized = true;
        });

        Ok(profile)
    }

    /// Sign out. Local identity is cleared before the provider is called, so
    /// it is gone even when the provider call fails.
    pub async fn logout(&self) -> AuthResult<()> {
        let session = self.inner.state.borrow().session.clone();
        self.update(|state| {
            state.clear_identity();
            state.loading = true;
            state.error = None;
        });

        match self.inner.auth.sign_out(session.as_ref()).await {
            Ok(()) => {
                self.update(|state| state.loading = false);
                info!("Signed out");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Provider sign-out failed");
                Err(self.fail(e))
            }
        }
    }

    /// Write profile changes and publish the stored row.
    pub async fn update_profile(&self, updates: &ProfileUpdate) -> AuthResult<Profile> {
        let Some(user_id) = self.current_user_id() else {
            return Err(self.fail(AuthError::NotAuthenticated));
        };

        let profile = match self.inner.data.update_profile(&user_id, updates).await {
            Ok(profile) => profile,
            Err(e) => return Err(self.fail(e)),
        };

        let published = profile.clone();
        self.update(|state| {
            if signed_in_as(state, &user_id) {
                state.profile = Some(published);
            }
        });
        Ok(profile)
    }

    // ─── Provider notifications ────────────────────────────────────

    /// Reconcile a provider notification with the current state.
    pub fn handle_event(&self, event: AuthEvent) {
        debug!(event = event.name(), "Auth state change");

        match event {
            AuthEvent::SignedIn(session) => {
                if self.sign_in_filter().owns(&session) {
                    debug!(user_id = %session.user.id, "Sign-in handled by login");
                    return;
                }
                let user = session.user.clone();
                let user_id = user.id.clone();
                self.update(|state| {
                    let keep_profile = state
                        .profile
                        .as_ref()
                        .map(|p| p.id == user.id)
                        .unwrap_or(false);
                    if !keep_profile {
                        state.profile = Some(Profile::from_identity(&user));
                    }
                    state.user = Some(user);
                    state.session = Some(session);
                    state.loading = false;
                    state.initialized = true;
                });
                self.refresh_profile_in_background(user_id);
            }
            AuthEvent::SignedOut => self.update(|state| {
                state.clear_identity();
                state.loading = false;
                state.initialized = true;
            }),
            AuthEvent::TokenRefreshed(session) => self.update(|state| {
                if signed_in_as(state, &session.user.id) {
                    state.user = Some(session.user.clone());
                    state.session = Some(session);
                    state.loading = false;
                } else {
                    debug!("Ignoring token refresh for another user");
                }
            }),
        }
    }

    /// Consume provider notifications on a task until the provider goes away.
    pub fn spawn_listener(&self) -> JoinHandle<()> {
        let mut events = self.inner.auth.events();
        let store = self.clone();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => store.handle_event(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Auth listener fell behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Wait for background work (session verification, profile refreshes).
    pub async fn wait_idle(&self) {
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        self.inner.tasks.reopen();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryPersistence;
    use crate::backend::{BackendError, MemoryBackend};
    use serde_json::json;

    fn store_over(backend: &Arc<MemoryBackend>, persistence: Arc<MemoryPersistence>) -> AuthStore {
        AuthStore::new(backend.clone(), backend.clone(), persistence)
    }

    #[tokio::test]
    async fn test_login_publishes_provisional_profile() {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .add_account("asha@example.com", "secret", json!({"full_name": "Asha"}))
            .await;
        let persistence = Arc::new(MemoryPersistence::new());
        let store = store_over(&backend, persistence.clone());

        let profile = store
            .login("asha@example.com", "secret", Some(Role::Retailer))
            .await
            .unwrap();
        assert_eq!(profile.full_name, "Asha");
        assert_eq!(profile.role, Role::Retailer);

        let state = store.snapshot();
        assert!(state.is_authenticated());
        assert!(state.initialized);
        assert!(!state.loading);
        assert!(store.is_retailer());

        let saved = persistence.stored().unwrap();
        assert_eq!(saved.user.unwrap().email.as_deref(), Some("asha@example.com"));
        assert!(saved.session.is_some());
    }

    #[tokio::test]
    async fn test_login_failure_sets_error() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_over(&backend, Arc::new(MemoryPersistence::new()));

        let err = store.login("who@example.com", "nope", None).await.unwrap_err();
        assert!(matches!(err, AuthError::Backend(BackendError::Http { status: 400, .. })));

        let state = store.snapshot();
        assert!(state.error.is_some());
        assert!(!state.loading);
        assert!(!state.is_authenticated());

        store.clear_error();
        assert!(store.snapshot().error.is_none());
    }

    #[tokio::test]
    async fn test_background_refresh_replaces_provisional_profile() {
        let backend = Arc::new(MemoryBackend::new());
        let user = backend.add_account("ravi@example.com", "pw", json!({})).await;
        backend
            .put_profile(Profile {
                id: user.id.clone(),
                email: "ravi@example.com".into(),
                full_name: "Ravi Kumar".into(),
                role: Role::Customer,
                phone: Some("98200".into()),
            })
            .await;
        let store = store_over(&backend, Arc::new(MemoryPersistence::new()));

        let provisional = store.login("ravi@example.com", "pw", None).await.unwrap();
        assert_eq!(provisional.full_name, "ravi");

        store.wait_idle().await;
        let profile = store.snapshot().profile.unwrap();
        assert_eq!(profile.full_name, "Ravi Kumar");
        assert_eq!(profile.phone.as_deref(), Some("98200"));
    }

    #[tokio::test]
    async fn test_update_profile_requires_user() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_over(&backend, Arc::new(MemoryPersistence::new()));

        let err = store.update_profile(&ProfileUpdate::default()).await.unwrap_err();
        assert_eq!(err, AuthError::NotAuthenticated);
        assert_eq!(store.snapshot().error.as_deref(), Some("Not authenticated"));
    }

    #[tokio::test]
    async fn test_events_reconcile_state() {
        let backend = Arc::new(MemoryBackend::new());
        let user = backend
            .add_account("meera@example.com", "pw", json!({"role": "retailer"}))
            .await;
        let store = store_over(&backend, Arc::new(MemoryPersistence::new()));

        let session = backend.sign_in("meera@example.com", "pw").await.unwrap();
        store.handle_event(AuthEvent::SignedIn(session.clone()));
        let state = store.snapshot();
        assert_eq!(state.user.as_ref().map(|u| u.id.clone()), Some(user.id.clone()));
        assert!(store.is_retailer());
        assert!(state.is_consistent());

        let mut stranger = session.clone();
        stranger.user = UserIdentity::new("someone-else", "x@example.com");
        stranger.access_token = "other".into();
        store.handle_event(AuthEvent::TokenRefreshed(stranger));
        assert_eq!(store.snapshot().session.unwrap().access_token, session.access_token);

        store.handle_event(AuthEvent::SignedOut);
        let state = store.snapshot();
        assert!(state.user.is_none() && state.profile.is_none() && state.session.is_none());
    }
}
