//! Core configuration data types

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Top-level configuration for the access layer and its command-line client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActFijoConfig {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Backend connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server root, also used to build media URLs
    pub server_base_url: String,
    /// Path prefix of the REST API under the server root
    pub api_prefix: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string
    pub user_agent: String,
}

/// Where the session token is persisted between runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Data directory; a leading `~` expands to the home directory
    pub data_dir: String,
    /// Fixed key (file name) the raw token is stored under
    pub token_key: String,
}
