//! ActFijo Core - shared ambient types for the access layer
//!
//! Error handling, logging and configuration used by every crate in the workspace.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;

// Re-export commonly used external types
pub use tracing;
