//! Construction-time settings for the geolocation client.

use serde::{Deserialize, Serialize};

/// One day in milliseconds
pub const DEFAULT_TTL_MS: u64 = 24 * 60 * 60 * 1000;

/// Settings a client is built with.
///
/// The client takes ownership of this record and only hands out shared
/// references to it, so a constructed client never sees its settings change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Provider API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// IP address to look up (empty means the caller's own address)
    pub ip_address: String,

    /// Comma-separated response fields, `*` for all
    pub fields: String,

    /// Comma-separated response fields to drop
    pub excludes: String,

    /// Response language code
    pub lang: String,

    pub include_hostname: bool,
    pub include_live_hostname: bool,
    pub include_hostname_fallback_live: bool,
    pub include_security: bool,
    pub include_user_agent: bool,

    /// Cache fetched results in the session tier (no expiry)
    pub save_to_session_storage: bool,

    /// Cache fetched results in the persistent tier (with expiry)
    pub save_to_local_storage: bool,

    /// Cache time-to-live in milliseconds
    pub ttl_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            ip_address: String::new(),
            fields: "*".to_string(),
            excludes: String::new(),
            lang: "en".to_string(),
            include_hostname: false,
            include_live_hostname: false,
            include_hostname_fallback_live: false,
            include_security: false,
            include_user_agent: false,
            save_to_session_storage: false,
            save_to_local_storage: false,
            ttl_ms: DEFAULT_TTL_MS,
        }
    }
}

impl ClientConfig {
    /// Names of the enabled `include` tokens, in the order the provider expects them
    pub fn include_tokens(&self) -> Vec<&'static str> {
        [
            (self.include_hostname, "hostname"),
            (self.include_live_hostname, "liveHostname"),
            (self.include_hostname_fallback_live, "hostnameFallbackLive"),
            (self.include_security, "security"),
            (self.include_user_agent, "useragent"),
        ]
        .into_iter()
        .filter_map(|(enabled, token)| enabled.then_some(token))
        .collect()
    }

    /// True when at least one cache destination is enabled
    pub fn caches_results(&self) -> bool {
        self.save_to_session_storage || self.save_to_local_storage
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.api_key, None);
        assert_eq!(config.ip_address, "");
        assert_eq!(config.fields, "*");
        assert_eq!(config.lang, "en");
        assert_eq!(config.ttl_ms, 86_400_000);
        assert!(!config.caches_results());
        assert!(config.include_tokens().is_empty());
    }

    #[test]
    fn test_include_tokens_keep_fixed_order() {
        let config = ClientConfig {
            include_user_agent: true,
            include_hostname: true,
            include_security: true,
            ..ClientConfig::default()
        };
        assert_eq!(config.include_tokens(), vec!["hostname", "security", "useragent"]);
    }

    #[test]
    fn test_partial_toml_section_uses_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            api_key = "abc"
            include_security = true
            "#,
        )
        .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("abc"));
        assert!(config.include_security);
        assert_eq!(config.fields, "*");
        assert_eq!(config.lang, "en");
    }
}
