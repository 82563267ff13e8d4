//! Session Token Store
//!
//! Owns the raw token and the decoded [`Session`]. Every other component gets
//! read-only snapshots, either by reference or through [`SessionStore::subscribe`].

use super::claims::{Identity, ThemePatch, ThemePrefs, TokenClaims};
use super::storage::TokenStorage;
use actfijo_core::{ActFijoError, ActFijoResult, ErrorContext};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Authentication state derived from the current token
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub is_authenticated: bool,
    /// Backend staff flag (`is_admin` claim); bypasses every check
    pub is_super_admin: bool,
    /// Role names from the token, compared case-sensitively
    pub roles: HashSet<String>,
    pub identity: Identity,
    /// `exp` claim of the token, if any
    pub expires_at: Option<i64>,
    /// Bumped on every login and logout
    pub epoch: u64,
}

impl Session {
    /// Logged-out state
    pub fn anonymous(epoch: u64) -> Self {
        Self {
            epoch,
            ..Self::default()
        }
    }

    fn from_claims(claims: &TokenClaims, epoch: u64) -> Self {
        Self {
            is_authenticated: true,
            is_super_admin: claims.is_admin,
            roles: claims.role_set(),
            identity: claims.identity(),
            expires_at: claims.exp,
            epoch,
        }
    }

    /// Roles in a stable order, for display
    pub fn sorted_roles(&self) -> Vec<&str> {
        let mut roles: Vec<&str> = self.roles.iter().map(String::as_str).collect();
        roles.sort_unstable();
        roles
    }
}

pub struct SessionStore<S: TokenStorage> {
    storage: S,
    raw_token: Option<String>,
    session: Session,
    booted: bool,
    tx: watch::Sender<Session>,
}

impl<S: TokenStorage> SessionStore<S> {
    pub fn new(storage: S) -> Self {
        let (tx, _rx) = watch::channel(Session::anonymous(0));
        Self {
            storage,
            raw_token: None,
            session: Session::anonymous(0),
            booted: false,
            tx,
        }
    }

    /// Read a stored token at boot and restore the session from it
    ///
    /// No stored token is not an error. An undecodable or expired token clears
    /// the session and is reported as `InvalidToken` / `ExpiredToken`.
    pub fn load_from_persistent_storage(&mut self) -> ActFijoResult<()> {
        self.load_at(Utc::now().timestamp())
    }

    pub(crate) fn load_at(&mut self, now: i64) -> ActFijoResult<()> {
        self.booted = true;

        let stored = match self.storage.load() {
            Ok(stored) => stored,
            Err(e) => {
                e.log();
                self.clear_session();
                return Err(e);
            }
        };

        let Some(raw_token) = stored else {
            debug!("No stored session token");
            self.publish();
            return Ok(());
        };

        let claims = match TokenClaims::decode(&raw_token) {
            Ok(claims) => claims,
            Err(e) => {
                info!("Stored session token is invalid, clearing session");
                self.clear_session();
                return Err(e);
            }
        };

        if claims.is_expired_at(now) {
            info!(expired_at = ?claims.exp, "Stored session token has expired, clearing session");
            self.clear_session();
            return Err(ActFijoError::ExpiredToken {
                expired_at: claims.exp,
                context: ErrorContext::new("session_store")
                    .with_operation("load_from_persistent_storage")
                    .with_suggestion("Log in again"),
            });
        }

        self.install(raw_token, &claims);
        Ok(())
    }

    /// Establish a session from a freshly issued token
    ///
    /// A storage failure does not abort the login; the session still applies
    /// for this process.
    pub fn set_session(&mut self, raw_token: &str) -> ActFijoResult<()> {
        self.booted = true;

        let claims = match TokenClaims::decode(raw_token) {
            Ok(claims) => claims,
            Err(e) => {
                self.clear_session();
                return Err(e);
            }
        };

        let raw_token = raw_token.trim().to_string();
        if let Err(e) = self.storage.save(&raw_token) {
            warn!(error = %e, "Could not persist session token, keeping it in memory only");
        }

        self.install(raw_token, &claims);
        Ok(())
    }

    /// Forget the token everywhere; safe to call repeatedly
    pub fn clear_session(&mut self) {
        if let Err(e) = self.storage.remove() {
            warn!(error = %e, "Could not remove persisted session token");
        }

        let was_authenticated = self.session.is_authenticated;
        self.raw_token = None;
        self.session = Session::anonymous(self.session.epoch + 1);
        self.publish();

        if was_authenticated {
            info!("Session cleared");
        }
    }

    /// Merge server-confirmed theme fields into the identity without re-decoding
    ///
    /// A no-op when nobody is logged in.
    pub fn patch_theme_prefs(&mut self, patch: &ThemePatch) -> ActFijoResult<()> {
        patch.validate()?;

        if !self.session.is_authenticated {
            debug!("Ignoring theme patch without an active session");
            return Ok(());
        }

        patch.apply_to(&mut self.session.identity.theme);
        debug!(theme = ?self.session.identity.theme, "Theme preferences updated");
        self.publish();
        Ok(())
    }

    /// Take the theme exactly as the backend confirmed it
    ///
    /// Unlike [`patch_theme_prefs`](Self::patch_theme_prefs) every field is
    /// replaced, so a confirmed `null` clears the stored value.
    pub fn apply_confirmed_theme(&mut self, confirmed: &ThemePrefs) {
        if !self.session.is_authenticated {
            debug!("Ignoring confirmed theme without an active session");
            return;
        }

        self.session.identity.theme = confirmed.clone();
        debug!(theme = ?self.session.identity.theme, "Theme preferences confirmed");
        self.publish();
    }

    pub fn current(&self) -> &Session {
        &self.session
    }

    /// Raw bearer token of the active session
    pub fn token(&self) -> Option<&str> {
        self.raw_token.as_deref()
    }

    /// True until persistent storage has been consulted once
    pub fn is_loading(&self) -> bool {
        !self.booted
    }

    /// Observe session changes (login, logout, theme patches)
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    fn install(&mut self, raw_token: String, claims: &TokenClaims) {
        self.raw_token = Some(raw_token);
        self.session = Session::from_claims(claims, self.session.epoch + 1);
        info!(
            username = ?self.session.identity.username,
            roles = ?self.session.sorted_roles(),
            super_admin = self.session.is_super_admin,
            "Session established"
        );
        self.publish();
    }

    fn publish(&self) {
        self.tx.send_replace(self.session.clone());
    }
}
