//! Runtime configuration.
//!
//! Every key is read from `MEDIFIND_*` first and then from the `VITE_*` name
//! used by the web front end, so one `.env` file can serve both.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Profile lookup timeout during `initialize()`.
pub const DEFAULT_PROFILE_TIMEOUT: Duration = Duration::from_secs(3);
/// Per-request HTTP timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Auth form "taking too long" threshold.
pub const DEFAULT_SLOW_REQUEST_THRESHOLD: Duration = Duration::from_secs(15);

const SUPABASE_URL: (&str, &str) = ("MEDIFIND_SUPABASE_URL", "VITE_SUPABASE_URL");
const SUPABASE_ANON_KEY: (&str, &str) = ("MEDIFIND_SUPABASE_ANON_KEY", "VITE_SUPABASE_ANON_KEY");
const MAPS_API_KEY: (&str, &str) = ("MEDIFIND_MAPS_API_KEY", "VITE_GOOGLE_MAPS_API_KEY");
const GEMINI_API_KEY: (&str, &str) = ("MEDIFIND_GEMINI_API_KEY", "VITE_GEMINI_API_KEY");
const PROFILE_TIMEOUT_MS: &str = "MEDIFIND_PROFILE_TIMEOUT_MS";
const REQUEST_TIMEOUT_MS: &str = "MEDIFIND_REQUEST_TIMEOUT_MS";
const DATABASE_PATH: &str = "MEDIFIND_DATABASE_PATH";

/// Client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub maps_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub profile_timeout: Duration,
    pub request_timeout: Duration,
    pub slow_request_threshold: Duration,
    /// Local session database; `None` keeps the session in memory only
    pub database_path: Option<PathBuf>,
}

impl Config {
    /// Build a config with defaults for everything but the backend.
    pub fn new(supabase_url: impl Into<String>, supabase_anon_key: impl Into<String>) -> Self {
        Self {
            supabase_url: supabase_url.into(),
            supabase_anon_key: supabase_anon_key.into(),
            maps_api_key: None,
            gemini_api_key: None,
            profile_timeout: DEFAULT_PROFILE_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            slow_request_threshold: DEFAULT_SLOW_REQUEST_THRESHOLD,
            database_path: None,
        }
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let get_pair = |(primary, fallback): (&str, &str)| get(primary).or_else(|| get(fallback));

        let supabase_url = get_pair(SUPABASE_URL).ok_or(ConfigError::Missing(SUPABASE_URL.0))?;
        let supabase_anon_key =
            get_pair(SUPABASE_ANON_KEY).ok_or(ConfigError::Missing(SUPABASE_ANON_KEY.0))?;

        let mut config = Self::new(supabase_url.trim_end_matches('/'), supabase_anon_key);
        config.maps_api_key = get_pair(MAPS_API_KEY);
        config.gemini_api_key = get_pair(GEMINI_API_KEY);
        config.database_path = get(DATABASE_PATH).map(PathBuf::from);

        if let Some(raw) = get(PROFILE_TIMEOUT_MS) {
            config.profile_timeout = parse_millis(PROFILE_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = get(REQUEST_TIMEOUT_MS) {
            config.request_timeout = parse_millis(REQUEST_TIMEOUT_MS, &raw)?;
        }

        Ok(config)
    }
}

fn parse_millis(key: &'static str, raw: &str) -> ConfigResult<Duration> {
    raw.parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::Invalid {
            key,
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("MEDIFIND_SUPABASE_URL", "https://abc.supabase.co/"),
            ("MEDIFIND_SUPABASE_ANON_KEY", "anon"),
        ]))
        .unwrap();

        assert_eq!(config.supabase_url, "https://abc.supabase.co");
        assert_eq!(config.profile_timeout, Duration::from_secs(3));
        assert_eq!(config.slow_request_threshold, Duration::from_secs(15));
        assert!(config.maps_api_key.is_none());
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_vite_fallbacks() {
        let config = Config::from_lookup(lookup(&[
            ("VITE_SUPABASE_URL", "https://abc.supabase.co"),
            ("VITE_SUPABASE_ANON_KEY", "anon"),
            ("VITE_GOOGLE_MAPS_API_KEY", "maps"),
            ("VITE_GEMINI_API_KEY", "gem"),
            ("MEDIFIND_GEMINI_API_KEY", "override"),
        ]))
        .unwrap();

        assert_eq!(config.maps_api_key.as_deref(), Some("maps"));
        assert_eq!(config.gemini_api_key.as_deref(), Some("override"));
    }

    #[test]
    fn test_missing_and_invalid() {
        let err = Config::from_lookup(lookup(&[("MEDIFIND_SUPABASE_URL", "x")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("MEDIFIND_SUPABASE_ANON_KEY"));

        let err = Config::from_lookup(lookup(&[
            ("MEDIFIND_SUPABASE_URL", "x"),
            ("MEDIFIND_SUPABASE_ANON_KEY", "y"),
            ("MEDIFIND_PROFILE_TIMEOUT_MS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "MEDIFIND_PROFILE_TIMEOUT_MS", .. }));
    }
}
