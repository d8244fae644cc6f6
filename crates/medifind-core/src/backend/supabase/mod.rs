//! Supabase REST client.
//!
//! Speaks GoTrue (`/auth/v1`), PostgREST (`/rest/v1`) and Storage
//! (`/storage/v1`) directly over `reqwest`. Row-level security applies to
//! every table request, so the current session's access token is attached
//! when one exists and the anon key otherwise.

mod auth;
mod rest;

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::{AuthEvent, BackendError, BackendResult};
use crate::config::Config;
use crate::models::AuthSession;

const EVENT_CAPACITY: usize = 16;

/// Client for one Supabase project.
#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    session: Arc<RwLock<Option<AuthSession>>>,
    events: broadcast::Sender<AuthEvent>,
}

impl SupabaseClient {
    /// Create a client for the project at `base_url`.
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(value) = HeaderValue::from_str(anon_key) {
            headers.insert("apikey", value);
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            session: Arc::new(RwLock::new(None)),
            events,
        }
    }

    /// Create a client from loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.supabase_url, &config.supabase_anon_key, config.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Session currently used to authorize table requests.
    pub async fn current_session(&self) -> Option<AuthSession> {
        self.session.read().await.clone()
    }

    /// Replace the session used to authorize table requests.
    pub async fn set_session(&self, session: Option<AuthSession>) {
        *self.session.write().await = session;
    }

    fn emit(&self, event: AuthEvent) {
        debug!(event = event.name(), "auth state change");
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    // ─── URLs ──────────────────────────────────────────────────────

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.base_url, path)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, function)
    }

    fn storage_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path)
    }

    /// Public URL of an object in a public bucket.
    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, path)
    }

    // ─── Requests ──────────────────────────────────────────────────

    /// Build a request authorized as the current user (or anon).
    async fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let token = match self.session.read().await.as_ref() {
            Some(session) => session.access_token.clone(),
            None => self.anon_key.clone(),
        };
        self.http.request(method, url).bearer_auth(token)
    }

    /// Build a request authorized with an explicit access token.
    fn request_with_token(&self, method: Method, url: &str, token: &str) -> RequestBuilder {
        self.http.request(method, url).bearer_auth(token)
    }

    async fn send(builder: RequestBuilder) -> BackendResult<Response> {
        builder
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))
    }

    /// Deserialize a success body or classify the failure.
    async fn handle_response<T: DeserializeOwned>(resp: Response) -> BackendResult<T> {
        let resp = Self::check_status(resp).await?;
        let body = resp
            .text()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;
        let body = if body.trim().is_empty() { "null" } else { body.as_str() };

        serde_json::from_str(body).map_err(|e| BackendError::Decode(format!("{} (body: {})", e, truncate(body))))
    }

    /// Pass a success response through, or turn a failure into an error.
    async fn check_status(resp: Response) -> BackendResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        Err(BackendError::from_status(status.as_u16(), error_message(&body)))
    }
}

/// Pull the human-readable message out of a GoTrue, PostgREST or Storage
/// error body.
pub(crate) fn error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let from_json = parsed.as_ref().and_then(|v| {
        ["error_description", "msg", "message", "error"]
            .iter()
            .find_map(|key| v.get(*key).and_then(Value::as_str))
            .map(str::to_string)
    });

    match from_json {
        Some(message) => message,
        None if body.trim().is_empty() => "Request failed".to_string(),
        None => truncate(body),
    }
}

/// Total from a PostgREST `Content-Range` header (`0-4/57`, `*/0`).
pub(crate) fn parse_content_range_total(header: &str) -> Option<u64> {
    header.rsplit('/').next()?.trim().parse().ok()
}

/// PostgREST `in.(...)` filter with quoted values.
pub(crate) fn in_filter(values: &[String]) -> String {
    let quoted: Vec<String> = values
        .iter()
        .map(|v| format!("\"{}\"", v.replace('"', "")))
        .collect();
    format!("in.({})", quoted.join(","))
}

pub(crate) fn eq_filter(value: &str) -> String {
    format!("eq.{}", value)
}

fn truncate(body: &str) -> String {
    if body.chars().count() > 200 {
        format!("{}...", body.chars().take(200).collect::<String>())
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(error_message(r#"{"msg":"User already registered"}"#), "User already registered");
        assert_eq!(
            error_message(r#"{"code":"23505","message":"duplicate key value"}"#),
            "duplicate key value"
        );
        assert_eq!(error_message(""), "Request failed");
        assert_eq!(error_message("upstream timeout"), "upstream timeout");
    }

    #[test]
    fn test_content_range() {
        assert_eq!(parse_content_range_total("0-4/57"), Some(57));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-4/*"), None);
    }

    #[test]
    fn test_filters() {
        assert_eq!(eq_filter("abc"), "eq.abc");
        assert_eq!(in_filter(&["a".into(), "b".into()]), r#"in.("a","b")"#);
    }

    #[test]
    fn test_urls() {
        let client = SupabaseClient::new("https://x.supabase.co/", "anon", Duration::from_secs(5));
        assert_eq!(client.rest_url("stores"), "https://x.supabase.co/rest/v1/stores");
        assert_eq!(
            client.rpc_url("search_medicines"),
            "https://x.supabase.co/rest/v1/rpc/search_medicines"
        );
        assert_eq!(
            client.public_url("store-images", "u1/1-a.png"),
            "https://x.supabase.co/storage/v1/object/public/store-images/u1/1-a.png"
        );
    }
}
