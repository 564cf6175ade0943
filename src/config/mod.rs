// Configuration module for the PetVision proxy

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "imagen-4.0-generate-001";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variable naming an optional YAML config file.
pub const CONFIG_PATH_ENV: &str = "PROXY_CONFIG";

/// Model handle options the provider understands on a generateContent call.
pub const MODEL_HANDLE_KEYS: &[&str] = &[
    "generationConfig",
    "safetySettings",
    "tools",
    "toolConfig",
    "systemInstruction",
    "cachedContent",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub gemini_api_key: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_image_model")]
    pub image_model: String,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_allowed_config_keys")]
    pub allowed_config_keys: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_image_model() -> String {
    DEFAULT_IMAGE_MODEL.to_string()
}

// Room for base64-encoded photos and audio clips.
fn default_max_body_bytes() -> usize {
    50 * 1024 * 1024
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_allowed_config_keys() -> Vec<String> {
    MODEL_HANDLE_KEYS.iter().map(|k| k.to_string()).collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            gemini_api_key: String::new(),
            base_url: default_base_url(),
            default_model: default_model(),
            image_model: default_image_model(),
            max_body_bytes: default_max_body_bytes(),
            request_timeout_secs: default_request_timeout_secs(),
            allowed_config_keys: default_allowed_config_keys(),
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("gemini_api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("image_model", &self.image_model)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("allowed_config_keys", &self.allowed_config_keys)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// If `PROXY_CONFIG` names a YAML file it is read first; environment
    /// variables then override individual fields.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::load(|key| std::env::var(key).ok())?;
        tracing::info!("Config loaded: {:?}", config);
        Ok(config)
    }

    /// Read the file named by `PROXY_CONFIG` (if any) and apply overrides
    /// from the same lookup.
    pub fn load<F>(env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let yaml = match env(CONFIG_PATH_ENV) {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path.trim()))?),
            _ => None,
        };

        Self::from_sources(yaml.as_deref(), env)
    }

    /// Build a config from optional YAML text and an environment lookup.
    /// Blank environment values are treated as unset.
    pub fn from_sources<F>(yaml: Option<&str>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match yaml {
            Some(content) if !content.trim().is_empty() => serde_yaml::from_str(content)?,
            _ => AppConfig::default(),
        };

        let lookup = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = lookup("GEMINI_API_KEY") {
            config.gemini_api_key = key;
        }
        if let Some(host) = lookup("HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PORT") {
            config.port = parse_value("PORT", &port)?;
        }
        if let Some(url) = lookup("GEMINI_BASE_URL") {
            config.base_url = url;
        }
        if let Some(model) = lookup("GEMINI_DEFAULT_MODEL") {
            config.default_model = model;
        }
        if let Some(model) = lookup("GEMINI_IMAGE_MODEL") {
            config.image_model = model;
        }
        if let Some(limit) = lookup("MAX_BODY_BYTES") {
            config.max_body_bytes = parse_value("MAX_BODY_BYTES", &limit)?;
        }
        if let Some(secs) = lookup("REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = parse_value("REQUEST_TIMEOUT_SECS", &secs)?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.gemini_api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max-body-bytes",
                value: "0".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "request-timeout-secs",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn is_config_key_allowed(&self, key: &str) -> bool {
        self.allowed_config_keys.iter().any(|k| k == key)
    }
}

fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn parse_value<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let err = AppConfig::from_sources(None, env_of(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));

        let err = AppConfig::from_sources(None, env_of(&[("GEMINI_API_KEY", "   ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
    }

    #[test]
    fn test_defaults_with_only_api_key() {
        let config = AppConfig::from_sources(None, env_of(&[("GEMINI_API_KEY", "k")])).unwrap();
        assert_eq!(config.gemini_api_key, "k");
        assert_eq!(config.port, 3001);
        assert_eq!(config.default_model, DEFAULT_MODEL);
        assert_eq!(config.image_model, DEFAULT_IMAGE_MODEL);
        assert_eq!(config.request_timeout(), Duration::from_secs(120));
        assert_eq!(config.listen_addr(), "0.0.0.0:3001");
        assert!(config.is_config_key_allowed("generationConfig"));
        assert!(!config.is_config_key_allowed("temperature"));
    }

    #[test]
    fn test_env_overrides_yaml() {
        let yaml = "gemini-api-key: from-file\nport: 8080\ndefault-model: gemini-2.0-flash\n";
        let config = AppConfig::from_sources(
            Some(yaml),
            env_of(&[("PORT", "9090"), ("REQUEST_TIMEOUT_SECS", "5")]),
        )
        .unwrap();

        assert_eq!(config.gemini_api_key, "from-file");
        assert_eq!(config.port, 9090);
        assert_eq!(config.default_model, "gemini-2.0-flash");
        assert_eq!(config.request_timeout_secs, 5);
    }

    #[test]
    fn test_load_reads_config_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("proxy.yaml");
        std::fs::write(
            &path,
            "gemini-api-key: from-file\nimage-model: imagen-3.0-generate-002\nallowed-config-keys:\n  - generationConfig\n",
        )
        .unwrap();

        let path = path.to_string_lossy().to_string();
        let config =
            AppConfig::load(env_of(&[(CONFIG_PATH_ENV, path.as_str()), ("PORT", "4000")])).unwrap();

        assert_eq!(config.gemini_api_key, "from-file");
        assert_eq!(config.image_model, "imagen-3.0-generate-002");
        assert_eq!(config.port, 4000);
        assert!(config.is_config_key_allowed("generationConfig"));
        assert!(!config.is_config_key_allowed("tools"));
    }

    #[test]
    fn test_load_missing_config_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("absent.yaml");
        let path = path.to_string_lossy().to_string();

        let err = AppConfig::load(env_of(&[
            (CONFIG_PATH_ENV, path.as_str()),
            ("GEMINI_API_KEY", "k"),
        ]))
        .unwrap_err();

        match err {
            ConfigError::Io { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("expected Io error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let err = AppConfig::from_sources(
            None,
            env_of(&[("GEMINI_API_KEY", "k"), ("PORT", "not-a-port")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "PORT", .. }));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let err = AppConfig::from_sources(
            None,
            env_of(&[("GEMINI_API_KEY", "k"), ("REQUEST_TIMEOUT_SECS", "0")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = AppConfig {
            gemini_api_key: "super-secret".to_string(),
            ..AppConfig::default()
        };
        let printed = format!("{:?}", config);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("<redacted>"));
    }
}
