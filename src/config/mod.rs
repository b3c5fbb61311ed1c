use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

// Re-export component config types
pub use crate::notifier::NotifierConfig;
pub use crate::store::StoreConfig;

/// Complete relay configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

impl RelayConfig {
    /// Apply `RELAY_*` environment variables on top of the loaded values.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, keyed by environment variable name.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("RELAY_STORE_URL") {
            self.store.database_url = v;
        }
        if let Some(v) = lookup("RELAY_STORE_PATH") {
            self.store.path = v;
        }
        if let Some(v) = lookup("RELAY_STORE_AUTH") {
            self.store.auth = Some(v);
        }
        if let Some(v) = lookup("RELAY_STORE_ACCESS_TOKEN") {
            self.store.access_token = Some(v);
        }
        if let Some(v) = lookup("RELAY_RECONNECT_DELAY_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                self.store.reconnect_delay_ms = ms;
            }
        }
        if let Some(v) = lookup("RELAY_STORE_IDLE_TIMEOUT_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                self.store.idle_timeout_ms = ms;
            }
        }
        if let Some(v) = lookup("RELAY_WEBHOOK_URL") {
            self.notifier.webhook_url = v;
        }
        self
    }

    /// Check the values the relay cannot run without.
    pub fn validate(&self) -> Result<()> {
        validate_http_url("store.database_url", &self.store.database_url)?;
        validate_http_url("notifier.webhook_url", &self.notifier.webhook_url)?;
        if self.store.reconnect_delay_ms == 0 {
            bail!("store.reconnect_delay_ms must be greater than zero");
        }
        if self.store.idle_timeout_ms == 0 {
            bail!("store.idle_timeout_ms must be greater than zero");
        }
        Ok(())
    }
}

fn validate_http_url(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        bail!("{} is required", name);
    }
    let url = reqwest::Url::parse(value).with_context(|| format!("{} is not a valid URL", name))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => bail!("{} must use http or https, got '{}'", name, other),
    }
}

/// Load configuration from TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<RelayConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: RelayConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.store.path, "/linebot/receive");
        assert_eq!(config.store.reconnect_delay_ms, 3000);
        assert_eq!(config.store.idle_timeout_ms, 60_000);
        assert!(config.store.auth.is_none());
        assert!(config.notifier.webhook_url.is_empty());
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [store]
            database_url = "https://example.firebaseio.com"
            path = "/home/speaker"
            auth = "db-secret"
            reconnect_delay_ms = 500

            [notifier]
            webhook_url = "http://192.168.0.10:8091/google-home-notifier"
        "#;

        let config: RelayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.store.database_url, "https://example.firebaseio.com");
        assert_eq!(config.store.path, "/home/speaker");
        assert_eq!(config.store.auth.as_deref(), Some("db-secret"));
        assert_eq!(config.store.reconnect_delay_ms, 500);
        assert_eq!(
            config.notifier.webhook_url,
            "http://192.168.0.10:8091/google-home-notifier"
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config() {
        // Missing keys and sections use defaults
        let toml = r#"
            [store]
            database_url = "https://example.firebaseio.com"
        "#;

        let config: RelayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.store.path, "/linebot/receive"); // Default
        assert_eq!(config.store.reconnect_delay_ms, 3000); // Default
        assert!(config.notifier.webhook_url.is_empty());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("RELAY_STORE_URL", "https://override.firebaseio.com"),
            ("RELAY_STORE_ACCESS_TOKEN", "ya29.token"),
            ("RELAY_RECONNECT_DELAY_MS", "not-a-number"),
            ("RELAY_STORE_IDLE_TIMEOUT_MS", "90000"),
            ("RELAY_WEBHOOK_URL", "http://localhost:8091/notify"),
        ]
        .into_iter()
        .collect();

        let config = RelayConfig::default()
            .with_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.store.database_url, "https://override.firebaseio.com");
        assert_eq!(config.store.access_token.as_deref(), Some("ya29.token"));
        // Unparsable numbers keep the previous value
        assert_eq!(config.store.reconnect_delay_ms, 3000);
        assert_eq!(config.store.idle_timeout_ms, 90_000);
        assert_eq!(config.notifier.webhook_url, "http://localhost:8091/notify");
        assert_eq!(config.store.path, "/linebot/receive");
    }

    #[test]
    fn test_validation_errors() {
        let mut config = RelayConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("store.database_url is required"));

        config.store.database_url = "https://example.firebaseio.com".to_string();
        config.notifier.webhook_url = "ftp://speaker.local/".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must use http or https"));

        config.notifier.webhook_url = "http://speaker.local/".to_string();
        config.store.reconnect_delay_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("reconnect_delay_ms must be greater than zero"));

        config.store.reconnect_delay_ms = 3000;
        config.store.idle_timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("idle_timeout_ms must be greater than zero"));
    }

    #[test]
    fn test_database_root_is_a_valid_watch_path() {
        let mut config = RelayConfig::default();
        config.store.database_url = "https://example.firebaseio.com".to_string();
        config.notifier.webhook_url = "http://speaker.local/".to_string();
        config.store.path = "/".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[store]\ndatabase_url = \"https://example.firebaseio.com\"\n\n[notifier]\nwebhook_url = \"http://localhost:8091/\""
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.store.database_url, "https://example.firebaseio.com");
        assert_eq!(config.notifier.webhook_url, "http://localhost:8091/");
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config("/nonexistent/relay.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
