//! Unified error handling system
//!
//! Structured error types with context and recovery suggestions. The access
//! layer never surfaces these to the end user: they are logged and collapsed
//! into a restrictive UI state by the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

pub type ActFijoResult<T> = Result<T, ActFijoError>;

/// Error context providing additional information for debugging and recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Additional metadata
    pub metadata: std::collections::HashMap<String, String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            metadata: std::collections::HashMap::new(),
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Main error type for the ActFijo access layer
#[derive(Error, Debug)]
pub enum ActFijoError {
    /// The session token could not be decoded
    #[error("Invalid token: {message}")]
    InvalidToken {
        message: String,
        context: ErrorContext,
    },

    /// The session token carries an `exp` claim in the past (or none at all)
    #[error("Token expired at {expired_at:?}")]
    ExpiredToken {
        expired_at: Option<i64>,
        context: ErrorContext,
    },

    /// The backend did not deliver a usable permission list
    #[error("Permission fetch failed: {message}")]
    PermissionFetch {
        message: String,
        status: Option<u16>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Network error: {message}")]
    Network {
        message: String,
        status: Option<u16>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        context: ErrorContext,
    },

    #[error("Resource not found: {resource}")]
    NotFound {
        resource: String,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ActFijoError {
    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            ActFijoError::InvalidToken { context, .. } => Some(context),
            ActFijoError::ExpiredToken { context, .. } => Some(context),
            ActFijoError::PermissionFetch { context, .. } => Some(context),
            ActFijoError::Storage { context, .. } => Some(context),
            ActFijoError::Config { context, .. } => Some(context),
            ActFijoError::Network { context, .. } => Some(context),
            ActFijoError::Validation { context, .. } => Some(context),
            ActFijoError::NotFound { context, .. } => Some(context),
            ActFijoError::Io(_) | ActFijoError::Serialization(_) => None,
        }
    }

    /// Check if a later attempt could succeed without user intervention
    pub fn is_recoverable(&self) -> bool {
        match self {
            ActFijoError::Network { .. } => true,
            ActFijoError::PermissionFetch { status, .. } => {
                !matches!(status, Some(401) | Some(403))
            }
            ActFijoError::InvalidToken { .. } | ActFijoError::ExpiredToken { .. } => false,
            ActFijoError::Config { .. } => false,
            ActFijoError::Validation { .. } => false,
            ActFijoError::NotFound { .. } => false,
            _ => false,
        }
    }

    /// Token failures end the session
    pub fn forces_logout(&self) -> bool {
        matches!(
            self,
            ActFijoError::InvalidToken { .. } | ActFijoError::ExpiredToken { .. }
        )
    }

    /// HTTP status attached to the error, if the backend answered at all
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ActFijoError::PermissionFetch { status, .. } | ActFijoError::Network { status, .. } => {
                *status
            }
            _ => None,
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        let error_id = self.context().map(|c| c.error_id.as_str());
        match self {
            ActFijoError::Config { .. } | ActFijoError::Validation { .. } => {
                error!(error_id = ?error_id, error = %self, "Configuration or validation error");
            }
            ActFijoError::InvalidToken { .. } | ActFijoError::ExpiredToken { .. } => {
                warn!(error_id = ?error_id, error = %self, "Session token rejected, logging out");
            }
            ActFijoError::PermissionFetch { status, .. } => {
                warn!(
                    error_id = ?error_id,
                    status = ?status,
                    error = %self,
                    "Permission fetch failed, degrading to an empty permission set"
                );
            }
            ActFijoError::Network { .. } => {
                warn!(error_id = ?error_id, error = %self, "Network error (may be recoverable)");
            }
            _ => {
                error!(error_id = ?error_id, error = %self, "Error occurred");
            }
        }
    }
}

/// Convenience macros for creating errors with context
#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::ActFijoError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your configuration file")
                .with_suggestion("Run 'actfijo config --init' to create a default config"),
        }
    };
}

#[macro_export]
macro_rules! validation_error {
    ($msg:expr, $field:expr, $component:expr) => {
        $crate::ActFijoError::Validation {
            message: $msg.to_string(),
            field: Some($field.to_string()),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check the field value and format"),
        }
    };
}

#[macro_export]
macro_rules! storage_error {
    ($msg:expr, $component:expr) => {
        $crate::ActFijoError::Storage {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::ActFijoError::Storage {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check that the data directory exists and is writable"),
        }
    };
}
