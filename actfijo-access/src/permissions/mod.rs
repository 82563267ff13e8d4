//! Permission System
//!
//! Fetching, caching and evaluating the permissions of the current session.
//! Everything here only decides what the client renders; the backend
//! re-checks every request on its own.

pub mod evaluator;
pub mod fetcher;
pub mod module_map;
pub mod roles;

pub use evaluator::{EvaluatorState, LoadTicket, PermissionEvaluator};
pub use fetcher::{fetch_permissions_or_empty, PermissionSource};
pub use module_map::{ModuleAccessMap, MODULE_VIEW_PERMISSIONS};
pub use roles::{PermissionDetail, Role, RoleDirectory, RolePermission, RoleSource};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Effective permission names of the current session
///
/// Names are matched exactly and case-sensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(HashSet<String>);

impl PermissionSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has(&self, permission: &str) -> bool {
        self.0.contains(permission)
    }

    pub fn insert(&mut self, permission: impl Into<String>) -> bool {
        self.0.insert(permission.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Names in a stable order, for display
    pub fn sorted(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.iter().collect();
        names.sort_unstable();
        names
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// The questions UI code may ask about the current session
///
/// Rendering code depends on this trait only, never on the session or the
/// network.
pub trait AccessQuery {
    /// May the navigable module be shown (module key matched case-insensitively)
    fn can_access(&self, module_key: &str) -> bool;

    /// Exact, case-sensitive permission membership
    fn has_permission(&self, permission: &str) -> bool;

    /// Exact, case-sensitive role membership from the token claims
    ///
    /// Coarser than [`AccessQuery::has_permission`]; kept for screens that
    /// still gate on a role name.
    fn has_role(&self, role: &str) -> bool;

    /// True while permissions are not resolved yet; callers render nothing
    fn loading_permissions(&self) -> bool;
}
