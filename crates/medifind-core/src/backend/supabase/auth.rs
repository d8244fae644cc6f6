//! GoTrue endpoints.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::SupabaseClient;
use crate::backend::{
    AuthEvent, AuthProvider, BackendError, BackendResult, SignUpRequest, SignUpResponse,
};
use crate::models::{AuthSession, UserIdentity};

/// Body of a successful token grant.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    user: UserIdentity,
}

impl TokenResponse {
    fn into_session(self) -> AuthSession {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| Utc::now().timestamp() + secs));

        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type.unwrap_or_else(|| "bearer".to_string()),
            expires_at,
            user: self.user,
        }
    }
}

/// Sign-up returns a token grant when confirmation is off, or the bare user
/// (sometimes wrapped in `user`) when it is on.
fn parse_sign_up(body: Value) -> BackendResult<SignUpResponse> {
    let decode = |e: serde_json::Error| BackendError::Decode(e.to_string());

    if body.get("access_token").is_some() {
        let session = serde_json::from_value::<TokenResponse>(body).map_err(decode)?.into_session();
        return Ok(SignUpResponse {
            user: session.user.clone(),
            session: Some(session),
        });
    }

    let user_value = match body.get("user") {
        Some(user) if user.is_object() => user.clone(),
        _ => body,
    };
    let user = serde_json::from_value::<UserIdentity>(user_value).map_err(decode)?;
    Ok(SignUpResponse { user, session: None })
}

impl SupabaseClient {
    async fn fetch_user(&self, access_token: &str) -> BackendResult<UserIdentity> {
        let resp = Self::send(self.request_with_token(Method::GET, &self.auth_url("/user"), access_token)).await?;
        Self::handle_response(resp).await
    }

    /// Exchange a refresh token. `Ok(None)` when the token was rejected.
    async fn refresh(&self, refresh_token: &str) -> BackendResult<Option<AuthSession>> {
        let url = self.auth_url("/token?grant_type=refresh_token");
        let builder = self
            .request_with_token(Method::POST, &url, &self.anon_key)
            .json(&json!({ "refresh_token": refresh_token }));

        let resp = Self::send(builder).await?;
        match Self::handle_response::<TokenResponse>(resp).await {
            Ok(token) => {
                let session = token.into_session();
                self.set_session(Some(session.clone())).await;
                self.emit(AuthEvent::TokenRefreshed(session.clone()));
                Ok(Some(session))
            }
            Err(BackendError::Network(msg)) => Err(BackendError::Network(msg)),
            Err(e) => {
                debug!(error = %e, "refresh token rejected");
                self.set_session(None).await;
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl AuthProvider for SupabaseClient {
    async fn sign_in(&self, email: &str, password: &str) -> BackendResult<AuthSession> {
        let url = self.auth_url("/token?grant_type=password");
        let builder = self
            .request_with_token(Method::POST, &url, &self.anon_key)
            .json(&json!({ "email": email, "password": password }));

        let resp = Self::send(builder).await?;
        let session = Self::handle_response::<TokenResponse>(resp).await?.into_session();

        self.set_session(Some(session.clone())).await;
        self.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, request: &SignUpRequest) -> BackendResult<SignUpResponse> {
        let mut metadata = json!({
            "full_name": request.full_name,
            "role": request.role.as_str(),
        });
        if let Some(phone) = &request.phone {
            metadata["phone"] = json!(phone);
        }

        let builder = self
            .request_with_token(Method::POST, &self.auth_url("/signup"), &self.anon_key)
            .json(&json!({
                "email": request.email,
                "password": request.password,
                "data": metadata,
            }));

        let resp = Self::send(builder).await?;
        let body: Value = Self::handle_response(resp).await?;
        let response = parse_sign_up(body)?;

        if let Some(session) = &response.session {
            self.set_session(Some(session.clone())).await;
            self.emit(AuthEvent::SignedIn(session.clone()));
        }
        Ok(response)
    }

    async fn sign_out(&self, session: Option<&AuthSession>) -> BackendResult<()> {
        let token = match session {
            Some(s) => Some(s.access_token.clone()),
            None => self.current_session().await.map(|s| s.access_token),
        };

        let result = match token {
            Some(token) => {
                let url = self.auth_url("/logout");
                match Self::send(self.request_with_token(Method::POST, &url, &token)).await {
                    Ok(resp) => Self::check_status(resp).await.map(|_| ()),
                    Err(e) => Err(e),
                }
            }
            None => Ok(()),
        };

        self.set_session(None).await;
        self.emit(AuthEvent::SignedOut);

        match result {
            // Token already invalid server-side.
            Err(BackendError::Unauthorized(_)) | Err(BackendError::NotFound(_)) => Ok(()),
            other => other,
        }
    }

    async fn get_session(&self, stored: Option<&AuthSession>) -> BackendResult<Option<AuthSession>> {
        let Some(stored) = stored else {
            return Ok(None);
        };

        if !stored.is_expired(Utc::now()) {
            match self.fetch_user(&stored.access_token).await {
                Ok(user) => {
                    let mut session = stored.clone();
                    session.user = user;
                    self.set_session(Some(session.clone())).await;
                    return Ok(Some(session));
                }
                Err(BackendError::Unauthorized(_)) | Err(BackendError::Http { status: 403, .. }) => {}
                Err(e) => return Err(e),
            }
        }

        match stored.refresh_token.as_deref() {
            Some(refresh_token) => self.refresh(refresh_token).await,
            None => {
                warn!("stored session expired without a refresh token");
                self.set_session(None).await;
                Ok(None)
            }
        }
    }

    fn events(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sign_up_with_session() {
        let body = json!({
            "access_token": "tok",
            "token_type": "bearer",
            "expires_in": 3600,
            "expires_at": 1_900_000_000,
            "refresh_token": "ref",
            "user": { "id": "u1", "email": "a@b.c", "user_metadata": { "role": "retailer" } }
        });

        let response = parse_sign_up(body).unwrap();
        let session = response.session.unwrap();
        assert_eq!(session.access_token, "tok");
        assert_eq!(session.expires_at, Some(1_900_000_000));
        assert_eq!(response.user.id, "u1");
    }

    #[test]
    fn test_parse_sign_up_pending_confirmation() {
        let body = json!({ "id": "u2", "email": "x@y.z", "user_metadata": null });
        let response = parse_sign_up(body).unwrap();
        assert!(response.session.is_none());
        assert_eq!(response.user.id, "u2");
        assert!(response.user.user_metadata.is_empty());
    }
}
