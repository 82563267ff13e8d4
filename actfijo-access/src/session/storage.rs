//! Persistent token storage
//!
//! The raw token under one fixed key is the only durable state of the access
//! layer.

use actfijo_core::{storage_error, ActFijoResult, StorageConfig};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Where the raw session token survives between runs
pub trait TokenStorage: Send + Sync {
    /// Read the stored token, `None` if nothing is stored
    fn load(&self) -> ActFijoResult<Option<String>>;

    /// Store the token, replacing any previous one
    fn save(&self, token: &str) -> ActFijoResult<()>;

    /// Remove the stored token; removing nothing is not an error
    fn remove(&self) -> ActFijoResult<()>;
}

impl<T: TokenStorage + ?Sized> TokenStorage for Arc<T> {
    fn load(&self) -> ActFijoResult<Option<String>> {
        (**self).load()
    }

    fn save(&self, token: &str) -> ActFijoResult<()> {
        (**self).save(token)
    }

    fn remove(&self) -> ActFijoResult<()> {
        (**self).remove()
    }
}

/// One file per key under the data directory
#[derive(Debug, Clone)]
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.token_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self) -> ActFijoResult<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let token = content.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error!(
                format!("Failed to read token file {}", self.path.display()),
                "file_token_storage",
                e
            )),
        }
    }

    fn save(&self, token: &str) -> ActFijoResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                storage_error!(
                    format!("Failed to create {}", parent.display()),
                    "file_token_storage",
                    e
                )
            })?;
        }

        std::fs::write(&self.path, token).map_err(|e| {
            storage_error!(
                format!("Failed to write token file {}", self.path.display()),
                "file_token_storage",
                e
            )
        })?;

        debug!(path = %self.path.display(), "Persisted session token");
        Ok(())
    }

    fn remove(&self) -> ActFijoResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error!(
                format!("Failed to remove token file {}", self.path.display()),
                "file_token_storage",
                e
            )),
        }
    }
}

/// In-process storage for tests and embedders without a filesystem
#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    slot: Mutex<Option<String>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(token.into())),
        }
    }

    /// Current content, for inspection
    pub fn peek(&self) -> Option<String> {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> ActFijoResult<Option<String>> {
        Ok(self.peek())
    }

    fn save(&self, token: &str) -> ActFijoResult<()> {
        *self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(token.to_string());
        Ok(())
    }

    fn remove(&self) -> ActFijoResult<()> {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        Ok(())
    }
}
