//! Permission Fetcher

use super::PermissionSet;
use actfijo_core::ActFijoResult;
use async_trait::async_trait;
use tracing::debug;

/// Source of the server-computed permission set for the ambient session
///
/// Implementations report failures as errors; callers that need the
/// fail-closed contract go through [`fetch_permissions_or_empty`] or the
/// evaluator, which collapse any error into an empty set.
#[async_trait]
pub trait PermissionSource: Send + Sync {
    async fn fetch_permissions(&self) -> ActFijoResult<PermissionSet>;
}

/// Fetch the permission set, degrading every failure to an empty set
pub async fn fetch_permissions_or_empty<P>(source: &P) -> PermissionSet
where
    P: PermissionSource + ?Sized,
{
    collapse(source.fetch_permissions().await)
}

/// Turn a tagged fetch outcome into the set the UI works with
pub(crate) fn collapse(outcome: ActFijoResult<PermissionSet>) -> PermissionSet {
    match outcome {
        Ok(permissions) => {
            debug!(count = permissions.len(), "Permissions fetched");
            permissions
        }
        Err(e) => {
            e.log();
            PermissionSet::empty()
        }
    }
}
