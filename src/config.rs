//! Configuration file parser for ~/.config/dayfeed/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted but logged as a warning, since they are usually
//! typos.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the model API key; wins over the file.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// `Debug` masks `anthropic_api_key`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP API binds to.
    pub listen_addr: String,

    /// Model identifier sent with every completion request.
    pub model: String,

    /// Anthropic API key (alternative to the ANTHROPIC_API_KEY env var).
    pub anthropic_api_key: Option<String>,

    pub anthropic_base_url: String,

    /// Upper bound on every outbound call (feeds, model).
    pub request_timeout_secs: u64,

    /// Upper bound on article page downloads.
    pub article_timeout_secs: u64,

    /// Items older than this are left out of the aggregated view.
    pub recency_window_hours: u64,

    /// Stories fed into the daily briefing.
    pub briefing_max_articles: usize,

    /// Let article summaries fetch loopback and private-network URLs.
    pub allow_private_hosts: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:3000".to_string(),
            model: "claude-sonnet-4-5".to_string(),
            anthropic_api_key: None,
            anthropic_base_url: "https://api.anthropic.com".to_string(),
            request_timeout_secs: 30,
            article_timeout_secs: 10,
            recency_window_hours: 48,
            briefing_max_articles: 10,
            allow_private_hosts: false,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("listen_addr", &self.listen_addr)
            .field("model", &self.model)
            .field(
                "anthropic_api_key",
                &self.anthropic_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("anthropic_base_url", &self.anthropic_base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("article_timeout_secs", &self.article_timeout_secs)
            .field("recency_window_hours", &self.recency_window_hours)
            .field("briefing_max_articles", &self.briefing_max_articles)
            .field("allow_private_hosts", &self.allow_private_hosts)
            .finish()
    }
}

const KNOWN_KEYS: &[&str] = &[
    "listen_addr",
    "model",
    "anthropic_api_key",
    "anthropic_base_url",
    "request_timeout_secs",
    "article_timeout_secs",
    "recency_window_hours",
    "briefing_max_articles",
    "allow_private_hosts",
];

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Zero timeouts or window → `Err(ConfigError::Invalid)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(path = %path.display(), model = %config.model, "Loaded configuration");
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("request_timeout_secs", self.request_timeout_secs),
            ("article_timeout_secs", self.article_timeout_secs),
            ("recency_window_hours", self.recency_window_hours),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be greater than 0", key)));
            }
        }
        Ok(())
    }

    /// The API key to use: `env_key` (normally [`API_KEY_ENV`]) if set and
    /// non-empty, else the file's `anthropic_api_key`.
    pub fn resolve_api_key(&self, env_key: Option<String>) -> Option<SecretString> {
        env_key
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.anthropic_api_key.clone())
            .filter(|k| !k.trim().is_empty())
            .map(|k| SecretString::from(k.trim().to_string()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn article_timeout(&self) -> Duration {
        Duration::from_secs(self.article_timeout_secs)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn write_config(name: &str, content: &str) -> (std::path::PathBuf, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("dayfeed_config_test_{}", name));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.listen_addr, "127.0.0.1:3000");
        assert_eq!(config.model, "claude-sonnet-4-5");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.article_timeout(), Duration::from_secs(10));
        assert_eq!(config.recency_window_hours, 48);
        assert_eq!(config.briefing_max_articles, 10);
        assert!(!config.allow_private_hosts);
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/dayfeed_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.model, "claude-sonnet-4-5");
    }

    #[test]
    fn test_empty_file_returns_default() {
        let (dir, path) = write_config("empty", "  \n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:3000");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let (dir, path) = write_config("partial", "recency_window_hours = 24\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.recency_window_hours, 24);
        assert_eq!(config.request_timeout_secs, 30);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let content = r#"
listen_addr = "0.0.0.0:8080"
model = "claude-haiku"
anthropic_api_key = "sk-file"
anthropic_base_url = "http://localhost:9999"
request_timeout_secs = 5
article_timeout_secs = 3
recency_window_hours = 12
briefing_max_articles = 4
allow_private_hosts = true
"#;
        let (dir, path) = write_config("full", content);
        let config = Config::load(&path).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.model, "claude-haiku");
        assert_eq!(config.anthropic_base_url, "http://localhost:9999");
        assert_eq!(config.article_timeout(), Duration::from_secs(3));
        assert_eq!(config.briefing_max_articles, 4);
        assert!(config.allow_private_hosts);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let (dir, path) = write_config("unknown", "modle = \"typo\"\nmodel = \"m\"\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.model, "m");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let (dir, path) = write_config("invalid", "model = \n");
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let (dir, path) = write_config("zero", "request_timeout_secs = 0\n");
        assert!(matches!(Config::load(&path), Err(ConfigError::Invalid(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_oversized_file_rejected() {
        let (dir, path) = write_config("large", &"#".repeat(1_048_577));
        assert!(matches!(Config::load(&path), Err(ConfigError::TooLarge(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_api_key_precedence() {
        let config = Config {
            anthropic_api_key: Some("sk-file".into()),
            ..Config::default()
        };
        let key = config.resolve_api_key(Some("sk-env".into())).unwrap();
        assert_eq!(key.expose_secret(), "sk-env");

        let key = config.resolve_api_key(Some("  ".into())).unwrap();
        assert_eq!(key.expose_secret(), "sk-file");

        assert!(Config::default().resolve_api_key(None).is_none());
    }

    #[test]
    fn test_debug_masks_api_key() {
        let config = Config {
            anthropic_api_key: Some("sk-super-secret".into()),
            ..Config::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
