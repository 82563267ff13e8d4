//! Configuration management

use crate::error::{ActFijoError, ActFijoResult};
use crate::types::{ActFijoConfig, ApiConfig, StorageConfig};
use crate::{config_error, LoggingConfig};

use std::path::{Path, PathBuf};

/// Overrides the server root (`server_base_url`)
pub const ENV_API_BASE_URL: &str = "ACTFIJO_API_BASE_URL";
/// Overrides the token data directory
pub const ENV_DATA_DIR: &str = "ACTFIJO_DATA_DIR";

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            server_base_url: "http://127.0.0.1:8000".to_string(),
            api_prefix: "/api".to_string(),
            timeout_seconds: 30,
            user_agent: "actfijo/0.1".to_string(),
        }
    }
}

impl ApiConfig {
    /// Full REST root, e.g. `http://127.0.0.1:8000/api`
    pub fn api_base_url(&self) -> String {
        format!(
            "{}/{}",
            self.server_base_url.trim_end_matches('/'),
            self.api_prefix.trim_matches('/')
        )
    }

    /// Join an endpoint path (`"my-permissions/"`) onto the REST root
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url(), path.trim_start_matches('/'))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.actfijo".to_string(),
            token_key: "token".to_string(),
        }
    }
}

impl StorageConfig {
    /// Data directory with `~` expanded
    pub fn resolved_data_dir(&self) -> PathBuf {
        expand_home(&self.data_dir)
    }

    /// File holding the persisted token
    pub fn token_path(&self) -> PathBuf {
        self.resolved_data_dir().join(&self.token_key)
    }
}

impl Default for ActFijoConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ActFijoConfig {
    /// Default location: `<config_dir>/actfijo/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("actfijo").join("config.toml"))
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ActFijoResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ActFijoError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: crate::ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: ActFijoConfig = toml::from_str(&content).map_err(|e| ActFijoError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: crate::ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })?;

        Ok(config)
    }

    /// Load from `path` when it exists, otherwise fall back to defaults
    pub fn load_or_default(path: Option<&Path>) -> ActFijoResult<Self> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path(),
        };

        match path {
            Some(path) if path.exists() => Self::from_file(path),
            _ => Ok(Self::default()),
        }
    }

    /// Save configuration to a TOML file, creating parent directories
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ActFijoResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ActFijoError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: crate::ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content).map_err(|e| ActFijoError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: crate::ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Apply `ACTFIJO_API_BASE_URL` and `ACTFIJO_DATA_DIR` when set
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(ENV_API_BASE_URL) {
            if !url.trim().is_empty() {
                self.api.server_base_url = url;
            }
        }
        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            if !dir.trim().is_empty() {
                self.storage.data_dir = dir;
            }
        }
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> ActFijoResult<()> {
        let parsed = url::Url::parse(&self.api.server_base_url).map_err(|e| {
            ActFijoError::Config {
                message: format!(
                    "Invalid server_base_url '{}': {}",
                    self.api.server_base_url, e
                ),
                source: Some(Box::new(e)),
                context: crate::ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set api.server_base_url to e.g. http://127.0.0.1:8000"),
            }
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(config_error!(
                format!("Unsupported URL scheme '{}'", parsed.scheme()),
                "config"
            ));
        }

        if self.api.timeout_seconds == 0 {
            return Err(config_error!(
                "api.timeout_seconds must be greater than 0",
                "config"
            ));
        }

        let key = self.storage.token_key.trim();
        if key.is_empty() || key.contains('/') || key.contains('\\') || key == ".." {
            return Err(config_error!(
                format!("storage.token_key '{}' must be a plain file name", key),
                "config"
            ));
        }

        Ok(())
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest.trim_start_matches(['/', '\\']));
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_base_url_joins_prefix_without_double_slashes() {
        let api = ApiConfig {
            server_base_url: "https://activos.example.com/".to_string(),
            ..ApiConfig::default()
        };
        assert_eq!(api.api_base_url(), "https://activos.example.com/api");
        assert_eq!(
            api.endpoint("/my-permissions/"),
            "https://activos.example.com/api/my-permissions/"
        );
    }

    #[test]
    fn default_config_is_valid() {
        assert!(ActFijoConfig::default().validate().is_ok());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = ActFijoConfig::default();
        config.api.server_base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = ActFijoConfig::default();
        config.api.timeout_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = ActFijoConfig::default();
        config.storage.token_key = "../token".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn token_path_uses_the_fixed_key() {
        let storage = StorageConfig {
            data_dir: "/var/lib/actfijo".to_string(),
            token_key: "token".to_string(),
        };
        assert_eq!(storage.token_path(), PathBuf::from("/var/lib/actfijo/token"));
    }

    #[test]
    fn round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = ActFijoConfig::default();
        config.api.server_base_url = "http://10.0.0.5:8000".to_string();
        config.save_to_file(&path).unwrap();

        let loaded = ActFijoConfig::from_file(&path).unwrap();
        assert_eq!(loaded.api.server_base_url, "http://10.0.0.5:8000");
        assert_eq!(loaded.storage.token_key, "token");
    }

    #[test]
    fn partial_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api]\ntimeout_seconds = 5\n").unwrap();

        let loaded = ActFijoConfig::from_file(&path).unwrap();
        assert_eq!(loaded.api.timeout_seconds, 5);
        assert_eq!(loaded.api.server_base_url, "http://127.0.0.1:8000");
    }
}
