//! Client configuration from environment variables.
//!
//! Every endpoint, flag and limit comes from the environment, with defaults
//! that point at a local development backend.

use std::time::Duration;

use url::Url;

use crate::ws::ReconnectConfig;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid URL for {var}: {reason}")]
    InvalidUrl { var: &'static str, reason: String },
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

/// Identity provider settings. Absent when no Supabase project is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// `{origin}/api/{version}`, no trailing slash.
    pub api_url: String,
    /// WebSocket origin, e.g. `ws://localhost:8000`.
    pub ws_url: String,
    pub supabase: Option<SupabaseConfig>,
    pub reconnect: ReconnectConfig,
    /// Whether chat/live features should open a socket at all.
    pub enable_chat: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000/api/v1".to_string(),
            ws_url: "ws://localhost:8000".to_string(),
            supabase: None,
            reconnect: ReconnectConfig::default(),
            enable_chat: true,
        }
    }
}

impl ClientConfig {
    /// Read configuration from the process environment.
    ///
    /// Environment variables:
    /// - `CAMPUS_API_ORIGIN`: scheme and host of the backend (default: "http://localhost:8000")
    /// - `CAMPUS_API_VERSION`: API version segment (default: "v1")
    /// - `CAMPUS_WS_URL`: WebSocket origin (default: "ws://localhost:8000")
    /// - `CAMPUS_SUPABASE_URL` / `CAMPUS_SUPABASE_ANON_KEY`: identity provider (optional, both required)
    /// - `CAMPUS_WS_MAX_RECONNECT_ATTEMPTS`: reconnect ceiling (default: 5)
    /// - `CAMPUS_WS_RECONNECT_BASE_MS`: first reconnect delay (default: 1000)
    /// - `CAMPUS_WS_RECONNECT_MAX_MS`: delay cap (default: 30000)
    /// - `CAMPUS_ENABLE_CHAT`: "true" | "false" (default: "true")
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`ClientConfig::from_env`] but reading from an arbitrary source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let origin = var("CAMPUS_API_ORIGIN").unwrap_or_else(|| "http://localhost:8000".to_string());
        let origin = parse_url("CAMPUS_API_ORIGIN", &origin, &["http", "https"])?;
        let version = var("CAMPUS_API_VERSION").unwrap_or_else(|| "v1".to_string());
        let api_url = format!(
            "{}/api/{}",
            origin.as_str().trim_end_matches('/'),
            version.trim_matches('/')
        );

        let ws_url = var("CAMPUS_WS_URL").unwrap_or(defaults.ws_url);
        let ws_url = parse_url("CAMPUS_WS_URL", &ws_url, &["ws", "wss"])?
            .as_str()
            .trim_end_matches('/')
            .to_string();

        let supabase = match (var("CAMPUS_SUPABASE_URL"), var("CAMPUS_SUPABASE_ANON_KEY")) {
            (Some(url), Some(anon_key)) => {
                let url = parse_url("CAMPUS_SUPABASE_URL", &url, &["http", "https"])?;
                Some(SupabaseConfig {
                    url: url.as_str().trim_end_matches('/').to_string(),
                    anon_key,
                })
            }
            _ => None,
        };

        let mut reconnect = defaults.reconnect;
        if let Some(v) = var("CAMPUS_WS_MAX_RECONNECT_ATTEMPTS") {
            reconnect.max_attempts = parse_num("CAMPUS_WS_MAX_RECONNECT_ATTEMPTS", &v)?;
        }
        if let Some(v) = var("CAMPUS_WS_RECONNECT_BASE_MS") {
            reconnect.initial_delay = Duration::from_millis(parse_num("CAMPUS_WS_RECONNECT_BASE_MS", &v)?);
        }
        if let Some(v) = var("CAMPUS_WS_RECONNECT_MAX_MS") {
            reconnect.max_delay = Duration::from_millis(parse_num("CAMPUS_WS_RECONNECT_MAX_MS", &v)?);
        }

        let enable_chat = match var("CAMPUS_ENABLE_CHAT").map(|v| v.to_lowercase()) {
            None => defaults.enable_chat,
            Some(v) if v == "true" || v == "1" => true,
            Some(v) if v == "false" || v == "0" => false,
            Some(value) => {
                return Err(ConfigError::InvalidValue {
                    var: "CAMPUS_ENABLE_CHAT",
                    value,
                })
            }
        };

        Ok(Self {
            api_url,
            ws_url,
            supabase,
            reconnect,
            enable_chat,
        })
    }
}

fn parse_url(var: &'static str, raw: &str, schemes: &[&str]) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        var,
        reason: e.to_string(),
    })?;
    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::InvalidUrl {
            var,
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(url)
}

fn parse_num<T: std::str::FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var,
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
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_point_at_local_backend() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_url, "http://localhost:8000/api/v1");
        assert_eq!(config.ws_url, "ws://localhost:8000");
        assert!(config.supabase.is_none());
        assert_eq!(config.reconnect.max_attempts, 5);
        assert!(config.enable_chat);
    }

    #[test]
    fn api_url_combines_origin_and_version() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("CAMPUS_API_ORIGIN", "https://campus.example.com/"),
            ("CAMPUS_API_VERSION", "v2"),
            ("CAMPUS_WS_URL", "wss://campus.example.com"),
            ("CAMPUS_WS_RECONNECT_BASE_MS", "250"),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "https://campus.example.com/api/v2");
        assert_eq!(config.ws_url, "wss://campus.example.com");
        assert_eq!(config.reconnect.initial_delay, Duration::from_millis(250));
    }

    #[test]
    fn supabase_requires_both_variables() {
        let partial = ClientConfig::from_lookup(lookup(&[("CAMPUS_SUPABASE_URL", "https://x.supabase.co")]))
            .unwrap();
        assert!(partial.supabase.is_none());

        let full = ClientConfig::from_lookup(lookup(&[
            ("CAMPUS_SUPABASE_URL", "https://x.supabase.co"),
            ("CAMPUS_SUPABASE_ANON_KEY", "anon"),
        ]))
        .unwrap();
        assert_eq!(full.supabase.unwrap().url, "https://x.supabase.co");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[("CAMPUS_WS_URL", "http://localhost")])),
            Err(ConfigError::InvalidUrl { var: "CAMPUS_WS_URL", .. })
        ));
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[("CAMPUS_WS_MAX_RECONNECT_ATTEMPTS", "many")])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[("CAMPUS_ENABLE_CHAT", "maybe")])),
            Err(ConfigError::InvalidValue { var: "CAMPUS_ENABLE_CHAT", .. })
        ));
    }
}
