//! Client configuration.
//!
//! Values come from an optional JSON file and are then overridden by
//! `BYTENOTE_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

pub const ENV_API_URL: &str = "BYTENOTE_API_URL";
pub const ENV_SESSION_TOKEN: &str = "BYTENOTE_SESSION_TOKEN";
pub const ENV_DB_PATH: &str = "BYTENOTE_DB_PATH";
pub const ENV_MAX_SYNC_ATTEMPTS: &str = "BYTENOTE_MAX_SYNC_ATTEMPTS";

const DEFAULT_MAX_SYNC_ATTEMPTS: u32 = 5;
const DEFAULT_DRAFT_DEBOUNCE_MS: u64 = 800;
const DEFAULT_PROBE_INTERVAL_SECS: u64 = 15;

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Notes backend, e.g. `https://notes.example.com`
    pub api_base_url: Option<String>,
    /// Session token sent as the `notes_token` cookie
    pub session_token: Option<String>,
    /// Local storage database file
    pub db_path: Option<PathBuf>,
    /// Failed attempts before a queued item is dead-lettered
    pub max_sync_attempts: u32,
    /// Quiet period before a draft typed into `save --stdin` is written
    pub draft_debounce_ms: u64,
    /// Per-request timeout; none when unset
    pub request_timeout_secs: Option<u64>,
    /// How often `watch` re-probes reachability
    pub probe_interval_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            session_token: None,
            db_path: None,
            max_sync_attempts: DEFAULT_MAX_SYNC_ATTEMPTS,
            draft_debounce_ms: DEFAULT_DRAFT_DEBOUNCE_MS,
            request_timeout_secs: None,
            probe_interval_secs: DEFAULT_PROBE_INTERVAL_SECS,
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ClientConfig")
            .field("api_base_url", &self.api_base_url)
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("db_path", &self.db_path)
            .field("max_sync_attempts", &self.max_sync_attempts)
            .field("draft_debounce_ms", &self.draft_debounce_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("probe_interval_secs", &self.probe_interval_secs)
            .finish()
    }
}

impl ClientConfig {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let mut config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            Error::Config(format!("Failed to parse config at {}: {error}", path.display()))
        })?;
        config.normalize()?;
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(self)?;
        std::fs::write(path, payload)?;
        Ok(())
    }

    /// Load from `path` and apply process environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::load_from_path(path)?;
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = normalize_text_option(lookup(ENV_API_URL)) {
            self.api_base_url = Some(url);
        }
        if let Some(token) = normalize_text_option(lookup(ENV_SESSION_TOKEN)) {
            self.session_token = Some(token);
        }
        if let Some(path) = normalize_text_option(lookup(ENV_DB_PATH)) {
            self.db_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = normalize_text_option(lookup(ENV_MAX_SYNC_ATTEMPTS)) {
            self.max_sync_attempts = raw.parse().map_err(|_| {
                Error::Config(format!("{ENV_MAX_SYNC_ATTEMPTS} must be a positive integer"))
            })?;
        }
        self.normalize()
    }

    fn normalize(&mut self) -> Result<()> {
        self.api_base_url = normalize_text_option(self.api_base_url.take())
            .map(|url| url.trim_end_matches('/').to_string());
        self.session_token = normalize_text_option(self.session_token.take());

        if let Some(url) = &self.api_base_url {
            if !is_http_url(url) {
                return Err(Error::Config(
                    "api_base_url must include http:// or https://".to_string(),
                ));
            }
        }
        if self.max_sync_attempts == 0 {
            return Err(Error::Config(
                "max_sync_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub const fn draft_debounce(&self) -> Duration {
        Duration::from_millis(self.draft_debounce_ms)
    }

    pub const fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_editor_and_retry_policy() {
        let config = ClientConfig::default();
        assert_eq!(config.max_sync_attempts, 5);
        assert_eq!(config.draft_debounce(), Duration::from_millis(800));
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = ClientConfig {
            api_base_url: Some("https://old.example.com".to_string()),
            ..ClientConfig::default()
        };
        config
            .apply_env(env(&[
                (ENV_API_URL, " https://notes.example.com/ "),
                (ENV_MAX_SYNC_ATTEMPTS, "3"),
            ]))
            .unwrap();

        assert_eq!(
            config.api_base_url.as_deref(),
            Some("https://notes.example.com")
        );
        assert_eq!(config.max_sync_attempts, 3);
    }

    #[test]
    fn env_rejects_invalid_values() {
        let mut config = ClientConfig::default();
        assert!(config
            .apply_env(env(&[(ENV_MAX_SYNC_ATTEMPTS, "many")]))
            .is_err());

        let mut config = ClientConfig::default();
        assert!(config
            .apply_env(env(&[(ENV_API_URL, "notes.example.com")]))
            .is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempdir().unwrap();
        let config = ClientConfig::load_from_path(&tmp.path().join("none.json")).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("bytenote").join("config.json");
        let config = ClientConfig {
            api_base_url: Some("http://localhost:3000".to_string()),
            request_timeout_secs: Some(10),
            ..ClientConfig::default()
        };

        config.save_to_path(&path).unwrap();
        assert_eq!(ClientConfig::load_from_path(&path).unwrap(), config);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"api_base_url":null,"ai_enabled":true}"#).unwrap();
        assert!(ClientConfig::load_from_path(&path).is_err());
    }

    #[test]
    fn debug_redacts_session_token() {
        let config = ClientConfig {
            session_token: Some("secret".to_string()),
            ..ClientConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
