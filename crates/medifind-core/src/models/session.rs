//! Auth session models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::profile::{Profile, UserIdentity};

/// Provider session (access token plus the user it belongs to).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Expiry as unix seconds
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: UserIdentity,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl AuthSession {
    pub fn new(access_token: impl Into<String>, user: UserIdentity) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            token_type: default_token_type(),
            expires_at: None,
            user,
        }
    }

    /// Whether the access token has expired at `now`. Sessions without an
    /// expiry never expire client-side.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .map(|exp| exp <= now.timestamp())
            .unwrap_or(false)
    }
}

/// Process-wide view of who is logged in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SessionState {
    pub user: Option<UserIdentity>,
    pub profile: Option<Profile>,
    pub session: Option<AuthSession>,
    pub initialized: bool,
    pub loading: bool,
    pub error: Option<String>,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// The subset of state that survives restarts.
    pub fn persisted(&self) -> PersistedSession {
        PersistedSession {
            user: self.user.clone(),
            profile: self.profile.clone(),
            session: self.session.clone(),
        }
    }

    /// Drop identity fields.
    pub fn clear_identity(&mut self) {
        self.user = None;
        self.profile = None;
        self.session = None;
    }

    /// Whether the profile belongs to the current user (vacuously true when
    /// either is missing).
    pub fn is_consistent(&self) -> bool {
        match (&self.user, &self.profile) {
            (Some(user), Some(profile)) => user.id == profile.id,
            _ => true,
        }
    }
}

/// Identity fields persisted across reloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PersistedSession {
    pub user: Option<UserIdentity>,
    pub profile: Option<Profile>,
    pub session: Option<AuthSession>,
}

impl PersistedSession {
    pub fn is_empty(&self) -> bool {
        self.user.is_none() && self.profile.is_none() && self.session.is_none()
    }

    /// Cached user and profile, only when both are present and agree.
    pub fn cached_pair(&self) -> Option<(&UserIdentity, &Profile)> {
        match (&self.user, &self.profile) {
            (Some(user), Some(profile)) if user.id == profile.id => Some((user, profile)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_session_expiry() {
        let mut session = AuthSession::new("tok", UserIdentity::new("u1", "a@b.c"));
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert!(!session.is_expired(now));

        session.expires_at = Some(1_699_999_999);
        assert!(session.is_expired(now));

        session.expires_at = Some(1_700_000_600);
        assert!(!session.is_expired(now));
    }

    #[test]
    fn test_persisted_excludes_transient_flags() {
        let user = UserIdentity::new("u1", "a@b.c");
        let state = SessionState {
            user: Some(user.clone()),
            profile: Some(Profile::from_identity(&user)),
            session: None,
            initialized: true,
            loading: true,
            error: Some("boom".into()),
        };

        let json = serde_json::to_value(state.persisted()).unwrap();
        assert!(json.get("loading").is_none());
        assert!(json.get("error").is_none());
        assert!(json.get("initialized").is_none());
        assert!(state.persisted().cached_pair().is_some());
    }

    #[test]
    fn test_cached_pair_requires_matching_ids() {
        let persisted = PersistedSession {
            user: Some(UserIdentity::new("u1", "a@b.c")),
            profile: Some(Profile::from_identity(&UserIdentity::new("u2", "x@y.z"))),
            session: None,
        };
        assert!(persisted.cached_pair().is_none());
    }
}
