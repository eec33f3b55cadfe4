use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8000/generate";
pub const DEFAULT_HEALTH_URL: &str = "http://localhost:8000/health";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a ws:// or wss:// url, got `{value}`")]
    InvalidEndpoint { key: &'static str, value: String },
    #[error("{key} must be an http:// or https:// url, got `{value}`")]
    InvalidHealthUrl { key: &'static str, value: String },
    #[error("{key} must be a positive number of milliseconds, got `{value}`")]
    InvalidTimeout { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub endpoint: String,
    pub health_url: String,
    pub connect_timeout: Duration,
    pub catalog_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            health_url: DEFAULT_HEALTH_URL.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            catalog_path: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let value = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(endpoint) = value("CODINIT_ENDPOINT") {
            if !(endpoint.starts_with("ws://") || endpoint.starts_with("wss://")) {
                return Err(ConfigError::InvalidEndpoint {
                    key: "CODINIT_ENDPOINT",
                    value: endpoint,
                });
            }
            config.endpoint = endpoint;
        }

        if let Some(health_url) = value("CODINIT_HEALTH_URL") {
            if !(health_url.starts_with("http://") || health_url.starts_with("https://")) {
                return Err(ConfigError::InvalidHealthUrl {
                    key: "CODINIT_HEALTH_URL",
                    value: health_url,
                });
            }
            config.health_url = health_url;
        }

        if let Some(raw) = value("CODINIT_CONNECT_TIMEOUT_MS") {
            match raw.parse::<u64>() {
                Ok(millis) if millis > 0 => config.connect_timeout = Duration::from_millis(millis),
                _ => {
                    return Err(ConfigError::InvalidTimeout {
                        key: "CODINIT_CONNECT_TIMEOUT_MS",
                        value: raw,
                    })
                }
            }
        }

        config.catalog_path = value("CODINIT_CATALOG").map(PathBuf::from);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, ConfigError, DEFAULT_ENDPOINT};
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = AppConfig::from_lookup(lookup(&[])).expect("empty env should load");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn reads_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("CODINIT_ENDPOINT", "wss://codegen.example/ws"),
            ("CODINIT_HEALTH_URL", "https://codegen.example/health"),
            ("CODINIT_CONNECT_TIMEOUT_MS", "2500"),
            ("CODINIT_CATALOG", "/etc/codinit/libraries.json"),
        ]))
        .expect("overrides should load");

        assert_eq!(config.endpoint, "wss://codegen.example/ws");
        assert_eq!(config.health_url, "https://codegen.example/health");
        assert_eq!(config.connect_timeout, Duration::from_millis(2500));
        assert_eq!(
            config.catalog_path,
            Some(PathBuf::from("/etc/codinit/libraries.json"))
        );
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = AppConfig::from_lookup(lookup(&[("CODINIT_ENDPOINT", "  ")]))
            .expect("blank value should be ignored");
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[("CODINIT_ENDPOINT", "http://localhost:8000")])),
            Err(ConfigError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[("CODINIT_HEALTH_URL", "localhost/health")])),
            Err(ConfigError::InvalidHealthUrl { .. })
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[("CODINIT_CONNECT_TIMEOUT_MS", "0")])),
            Err(ConfigError::InvalidTimeout { .. })
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[("CODINIT_CONNECT_TIMEOUT_MS", "soon")])),
            Err(ConfigError::InvalidTimeout { .. })
        ));
    }
}
