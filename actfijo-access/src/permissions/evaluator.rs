//! Permission Evaluator
//!
//! A synchronous state holder answering [`AccessQuery`] for the current
//! session. It never performs I/O: [`PermissionEvaluator::sync_session`] hands
//! out a [`LoadTicket`] when permissions must be fetched, and the caller
//! reports the outcome through [`PermissionEvaluator::complete_load`].

use super::fetcher::collapse;
use super::{AccessQuery, ModuleAccessMap, PermissionSet};
use crate::session::Session;
use actfijo_core::ActFijoResult;
use std::collections::HashSet;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EvaluatorState {
    #[default]
    Uninitialized,
    /// Fetch in flight; every permission query answers false
    Loading,
    Loaded(PermissionSet),
    /// Super admins are never fetched for; every query answers true
    SuperAdminBypass,
}

/// Claim on the result of one permission fetch
///
/// Only the ticket of the latest generation is honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a ticket must be completed or the evaluator stays loading"]
pub struct LoadTicket {
    generation: u64,
}

/// The session fields that trigger a new evaluation when they change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SessionKey {
    is_authenticated: bool,
    is_super_admin: bool,
    epoch: u64,
}

impl From<&Session> for SessionKey {
    fn from(session: &Session) -> Self {
        Self {
            is_authenticated: session.is_authenticated,
            is_super_admin: session.is_super_admin,
            epoch: session.epoch,
        }
    }
}

#[derive(Debug, Default)]
pub struct PermissionEvaluator {
    modules: ModuleAccessMap,
    state: EvaluatorState,
    roles: HashSet<String>,
    key: Option<SessionKey>,
    generation: u64,
}

impl PermissionEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_modules(modules: ModuleAccessMap) -> Self {
        Self {
            modules,
            ..Self::default()
        }
    }

    pub fn state(&self) -> &EvaluatorState {
        &self.state
    }

    /// Resolved permissions, `None` while loading or bypassed
    pub fn permissions(&self) -> Option<&PermissionSet> {
        match &self.state {
            EvaluatorState::Loaded(permissions) => Some(permissions),
            _ => None,
        }
    }

    pub fn modules(&self) -> &ModuleAccessMap {
        &self.modules
    }

    /// React to a session snapshot
    ///
    /// Returns a ticket when the caller must fetch permissions. Snapshots with
    /// an unchanged key are ignored, so calling this on every render is cheap.
    pub fn sync_session(&mut self, session: &Session) -> Option<LoadTicket> {
        self.roles.clone_from(&session.roles);

        let key = SessionKey::from(session);
        if self.key == Some(key) {
            return None;
        }

        self.key = Some(key);
        self.generation += 1;

        if session.is_super_admin {
            debug!(epoch = key.epoch, "Super admin session, bypassing permission checks");
            self.state = EvaluatorState::SuperAdminBypass;
            None
        } else if !session.is_authenticated {
            debug!(epoch = key.epoch, "No session, permissions resolved to empty");
            self.state = EvaluatorState::Loaded(PermissionSet::empty());
            None
        } else {
            debug!(epoch = key.epoch, generation = self.generation, "Loading permissions");
            self.state = EvaluatorState::Loading;
            Some(LoadTicket {
                generation: self.generation,
            })
        }
    }

    /// Apply the outcome of a fetch started for `ticket`
    ///
    /// Stale tickets are dropped and `false` is returned. Errors are logged and
    /// resolve to an empty permission set.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        outcome: ActFijoResult<PermissionSet>,
    ) -> bool {
        if ticket.generation != self.generation || self.state != EvaluatorState::Loading {
            debug!(
                ticket = ticket.generation,
                current = self.generation,
                "Discarding stale permission response"
            );
            return false;
        }

        let permissions = collapse(outcome);
        info!(count = permissions.len(), "Permissions loaded");
        self.state = EvaluatorState::Loaded(permissions);
        true
    }

    /// The consumer went away; outstanding tickets become stale
    pub fn detach(&mut self) {
        self.generation += 1;
        self.key = None;
        self.state = EvaluatorState::Uninitialized;
    }
}

impl AccessQuery for PermissionEvaluator {
    fn can_access(&self, module_key: &str) -> bool {
        match &self.state {
            EvaluatorState::SuperAdminBypass => true,
            EvaluatorState::Loaded(permissions) => self
                .modules
                .required_permission(module_key)
                .is_some_and(|required| permissions.has(required)),
            EvaluatorState::Uninitialized | EvaluatorState::Loading => false,
        }
    }

    fn has_permission(&self, permission: &str) -> bool {
        match &self.state {
            EvaluatorState::SuperAdminBypass => true,
            EvaluatorState::Loaded(permissions) => permissions.has(permission),
            EvaluatorState::Uninitialized | EvaluatorState::Loading => false,
        }
    }

    fn has_role(&self, role: &str) -> bool {
        self.state == EvaluatorState::SuperAdminBypass || self.roles.contains(role)
    }

    fn loading_permissions(&self) -> bool {
        matches!(
            self.state,
            EvaluatorState::Uninitialized | EvaluatorState::Loading
        )
    }
}
