//! Company roles and the explicit role-details cache
//!
//! Role details are not used for any gating decision; the effective
//! permission set always comes from the server. The derivation from roles is
//! kept for the roles screen and for diagnostics.

use super::PermissionSet;
use actfijo_core::ActFijoResult;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// A permission as embedded in a role payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionDetail {
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub id: Option<String>,
    pub nombre: String,
    #[serde(default)]
    pub descripcion: Option<String>,
}

/// Entry of a role's `permisos` list
///
/// Older backends send bare primary keys instead of objects; those cannot be
/// resolved to names without another request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RolePermission {
    Detailed(PermissionDetail),
    Reference(String),
    Numeric(i64),
}

impl RolePermission {
    /// Permission name, when the payload carries one
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Detailed(detail) => Some(detail.nombre.as_str()),
            Self::Reference(_) | Self::Numeric(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub nombre: String,
    #[serde(default)]
    pub permisos: Vec<RolePermission>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permisos_details: Option<Vec<PermissionDetail>>,
}

impl Role {
    /// Names of the permissions this role grants
    ///
    /// `permisos_details` wins over `permisos` when present.
    pub fn permission_names(&self) -> Vec<&str> {
        match &self.permisos_details {
            Some(details) => details.iter().map(|d| d.nombre.as_str()).collect(),
            None => {
                let names: Vec<&str> = self.permisos.iter().filter_map(RolePermission::name).collect();
                let unresolved = self.permisos.len() - names.len();
                if unresolved > 0 {
                    warn!(
                        role = %self.nombre,
                        unresolved,
                        "Role lists permissions by id only; skipping them"
                    );
                }
                names
            }
        }
    }
}

/// `GET roles/` answers either with a bare list or with a page object
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum RolesPayload {
    List(Vec<Role>),
    Page { results: Vec<Role> },
}

impl RolesPayload {
    pub(crate) fn into_roles(self) -> Vec<Role> {
        match self {
            Self::List(roles) | Self::Page { results: roles } => roles,
        }
    }
}

#[async_trait]
pub trait RoleSource: Send + Sync {
    async fn fetch_roles(&self) -> ActFijoResult<Vec<Role>>;
}

/// Role details fetched at most once per session
///
/// A failed fetch caches an empty list so the request is not retried until
/// [`RoleDirectory::invalidate`] is called (on logout).
#[derive(Debug, Default)]
pub struct RoleDirectory {
    cache: Option<Vec<Role>>,
}

impl RoleDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached roles, fetching them first if needed
    pub async fn roles<R>(&mut self, source: &R) -> &[Role]
    where
        R: RoleSource + ?Sized,
    {
        if self.cache.is_none() {
            let roles = match source.fetch_roles().await {
                Ok(roles) => {
                    debug!(count = roles.len(), "Role details fetched");
                    roles
                }
                Err(e) => {
                    e.log();
                    Vec::new()
                }
            };
            self.cache = Some(roles);
        }

        self.cache.as_deref().unwrap_or_default()
    }

    pub fn cached(&self) -> Option<&[Role]> {
        self.cache.as_deref()
    }

    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    pub fn invalidate(&mut self) {
        if self.cache.take().is_some() {
            info!("Role details cache cleared");
        }
    }

    /// Union of the permissions granted by the named roles, from the cache
    ///
    /// Role names match exactly. Empty when nothing is cached.
    pub fn permissions_for_roles(&self, role_names: &HashSet<String>) -> PermissionSet {
        self.cache
            .iter()
            .flatten()
            .filter(|role| role_names.contains(&role.nombre))
            .flat_map(Role::permission_names)
            .collect()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl From<RawId> for String {
    fn from(id: RawId) -> Self {
        match id {
            RawId::Text(text) => text,
            RawId::Number(number) => number.to_string(),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(String::from)
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawId>::deserialize(deserializer)?.map(String::from))
}
