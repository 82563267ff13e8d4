//! Session Token Store
//!
//! Decodes the backend-issued token into identity claims, persists the raw
//! token under a fixed key and detects expiry at boot.

pub mod claims;
pub mod storage;
pub mod store;

pub use claims::{
    Identity, PreferenceUpdate, ThemePatch, ThemePreference, ThemePrefs, TokenClaims,
};
pub use storage::{FileTokenStorage, MemoryTokenStorage, TokenStorage};
pub use store::{Session, SessionStore};
