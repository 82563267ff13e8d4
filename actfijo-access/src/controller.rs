//! Access controller
//!
//! Sequences the session store, the backend, the role directory and the
//! evaluator. Each piece of state keeps exactly one owner; the controller only
//! forwards snapshots between them.

use crate::client::AccessBackend;
use crate::permissions::{AccessQuery, PermissionEvaluator, PermissionSet, Role, RoleDirectory};
use crate::session::{Session, SessionStore, ThemePatch, ThemePrefs, TokenStorage};
use actfijo_core::performance::measure_async;
use actfijo_core::{ActFijoError, ActFijoResult, ErrorContext};
use tokio::sync::watch;
use tracing::{debug, info};

pub struct AccessController<S: TokenStorage, B: AccessBackend> {
    session: SessionStore<S>,
    backend: B,
    roles: RoleDirectory,
    evaluator: PermissionEvaluator,
}

impl<S: TokenStorage, B: AccessBackend> AccessController<S, B> {
    pub fn new(storage: S, backend: B) -> Self {
        Self {
            session: SessionStore::new(storage),
            backend,
            roles: RoleDirectory::new(),
            evaluator: PermissionEvaluator::new(),
        }
    }

    /// Restore the persisted session and resolve its permissions
    ///
    /// A rejected token is returned as the error, but the controller is left
    /// logged out and fully usable either way.
    pub async fn boot(&mut self) -> ActFijoResult<()> {
        let restored = self.session.load_from_persistent_storage();
        if let Err(e) = &restored {
            e.log();
        }

        self.backend.set_auth_token(self.session.token());
        self.refresh().await;
        restored
    }

    /// Establish a session from an issued token
    pub async fn sign_in(&mut self, raw_token: &str) -> ActFijoResult<()> {
        self.roles.invalidate();
        let established = self.session.set_session(raw_token);

        self.backend.set_auth_token(self.session.token());
        self.refresh().await;
        established
    }

    /// Obtain a token with credentials, then sign in with it
    pub async fn login(&mut self, username: &str, password: &str) -> ActFijoResult<()> {
        let tokens = self.backend.obtain_token(username, password).await?;
        self.sign_in(&tokens.access).await
    }

    pub async fn sign_out(&mut self) {
        self.session.clear_session();
        self.backend.set_auth_token(None);
        self.roles.invalidate();
        self.refresh().await;
    }

    /// Bring the evaluator in line with the session, fetching if required
    ///
    /// Returns whether a fetch was performed. Failures end in an empty
    /// permission set; there is no retry.
    pub async fn refresh(&mut self) -> bool {
        let Some(ticket) = self.evaluator.sync_session(self.session.current()) else {
            return false;
        };

        let outcome = measure_async("fetch_permissions", self.backend.fetch_permissions()).await;
        self.evaluator.complete_load(ticket, outcome)
    }

    /// Save theme preferences server-side and merge the confirmed values
    pub async fn patch_theme(&mut self, patch: &ThemePatch) -> ActFijoResult<ThemePrefs> {
        patch.validate()?;

        if !self.session.current().is_authenticated {
            return Err(ActFijoError::NotFound {
                resource: "active session".to_string(),
                context: ErrorContext::new("access_controller")
                    .with_operation("patch_theme")
                    .with_suggestion("Log in first"),
            });
        }

        let confirmed = self.backend.update_theme(patch).await?;
        self.session.apply_confirmed_theme(&confirmed);
        info!(theme = ?confirmed, "Theme preferences saved");
        Ok(confirmed)
    }

    /// Company roles, fetched once per session
    pub async fn roles(&mut self) -> &[Role] {
        self.roles.roles(&self.backend).await
    }

    /// Permissions derived from the token roles and the role directory
    ///
    /// Informational only; gating uses the server-computed set.
    pub async fn legacy_role_permissions(&mut self) -> PermissionSet {
        self.roles.roles(&self.backend).await;
        let derived = self.roles.permissions_for_roles(&self.session.current().roles);
        debug!(count = derived.len(), "Derived permissions from role details");
        derived
    }

    pub fn evaluator(&self) -> &PermissionEvaluator {
        &self.evaluator
    }

    pub fn session(&self) -> &Session {
        self.session.current()
    }

    pub fn session_loading(&self) -> bool {
        self.session.is_loading()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.session.subscribe()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The consumer is gone; in-flight results will be dropped
    pub fn detach(&mut self) {
        self.evaluator.detach();
    }
}

impl<S: TokenStorage, B: AccessBackend> AccessQuery for AccessController<S, B> {
    fn can_access(&self, module_key: &str) -> bool {
        self.evaluator.can_access(module_key)
    }

    fn has_permission(&self, permission: &str) -> bool {
        self.evaluator.has_permission(permission)
    }

    fn has_role(&self, role: &str) -> bool {
        self.evaluator.has_role(role)
    }

    fn loading_permissions(&self) -> bool {
        self.evaluator.loading_permissions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::TokenPair;
    use crate::permissions::{PermissionSource, RoleSource};
    use crate::session::{MemoryTokenStorage, ThemePreference};
    use async_trait::async_trait;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct StubBackend {
        permissions: Vec<&'static str>,
        fail_permissions: bool,
        permission_calls: AtomicUsize,
        token: Option<String>,
    }

    #[async_trait]
    impl PermissionSource for StubBackend {
        async fn fetch_permissions(&self) -> ActFijoResult<PermissionSet> {
            self.permission_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_permissions {
                return Err(ActFijoError::PermissionFetch {
                    message: "HTTP 500".to_string(),
                    status: Some(500),
                    source: None,
                    context: ErrorContext::new("stub"),
                });
            }
            Ok(self.permissions.iter().copied().collect())
        }
    }

    #[async_trait]
    impl RoleSource for StubBackend {
        async fn fetch_roles(&self) -> ActFijoResult<Vec<Role>> {
            Ok(serde_json::from_value(json!([
                {"id": 1, "nombre": "Empleado", "permisos": [{"nombre": "view_dashboard"}]}
            ]))
            .unwrap())
        }
    }

    #[async_trait]
    impl AccessBackend for StubBackend {
        fn set_auth_token(&mut self, token: Option<&str>) {
            self.token = token.map(str::to_string);
        }

        async fn obtain_token(&self, username: &str, _password: &str) -> ActFijoResult<TokenPair> {
            Ok(TokenPair {
                access: mint(username, false),
                refresh: None,
            })
        }

        async fn update_theme(&self, patch: &ThemePatch) -> ActFijoResult<ThemePrefs> {
            let mut prefs = ThemePrefs::default();
            patch.apply_to(&mut prefs);
            Ok(prefs)
        }
    }

    fn mint(username: &str, is_admin: bool) -> String {
        encode(
            &Header::default(),
            &json!({
                "username": username,
                "roles": ["Empleado"],
                "is_admin": is_admin,
                "exp": chrono::Utc::now().timestamp() + 3600,
            }),
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap()
    }

    fn backend(permissions: &[&'static str]) -> StubBackend {
        StubBackend {
            permissions: permissions.to_vec(),
            ..StubBackend::default()
        }
    }

    #[tokio::test]
    async fn boot_without_token_resolves_to_logged_out() {
        let mut controller = AccessController::new(MemoryTokenStorage::new(), backend(&[]));
        assert!(controller.session_loading());

        controller.boot().await.unwrap();

        assert!(!controller.session_loading());
        assert!(!controller.loading_permissions());
        assert!(!controller.can_access("dashboard"));
        assert_eq!(controller.backend().permission_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn boot_restores_session_and_fetches_once() {
        let storage = MemoryTokenStorage::with_token(mint("jperez", false));
        let mut controller =
            AccessController::new(storage, backend(&["view_dashboard", "manage_settings"]));

        controller.boot().await.unwrap();

        assert!(controller.can_access("dashboard"));
        assert!(!controller.can_access("roles"));
        assert!(controller.has_permission("manage_settings"));
        assert!(!controller.has_role("Admin"));
        assert!(controller.backend().token.is_some());

        assert!(!controller.refresh().await);
        assert_eq!(controller.backend().permission_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn super_admin_never_fetches() {
        let mut controller = AccessController::new(MemoryTokenStorage::new(), backend(&[]));

        controller.sign_in(&mint("root", true)).await.unwrap();

        assert!(controller.can_access("anything"));
        assert!(controller.has_role("anything"));
        assert_eq!(controller.backend().permission_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_user_logged_in_without_access() {
        let mut controller = AccessController::new(
            MemoryTokenStorage::new(),
            StubBackend {
                fail_permissions: true,
                ..StubBackend::default()
            },
        );

        controller.login("jperez", "secret").await.unwrap();

        assert!(controller.session().is_authenticated);
        assert!(!controller.loading_permissions());
        assert!(!controller.can_access("dashboard"));
        assert!(!controller.has_permission("view_dashboard"));
    }

    #[tokio::test]
    async fn sign_out_clears_everything() {
        let storage = Arc::new(MemoryTokenStorage::new());
        let mut controller = AccessController::new(storage.clone(), backend(&["view_dashboard"]));
        controller.sign_in(&mint("jperez", false)).await.unwrap();
        assert!(controller.can_access("dashboard"));
        controller.legacy_role_permissions().await;

        controller.sign_out().await;

        assert!(!controller.can_access("dashboard"));
        assert!(!controller.session().is_authenticated);
        assert!(controller.backend().token.is_none());
        assert_eq!(storage.peek(), None);
        assert!(!controller.roles.is_cached());
    }

    #[tokio::test]
    async fn re_login_refetches_permissions() {
        let mut controller = AccessController::new(MemoryTokenStorage::new(), backend(&["view_cargo"]));

        controller.login("ana", "x").await.unwrap();
        controller.login("luis", "y").await.unwrap();

        assert_eq!(controller.backend().permission_calls.load(Ordering::SeqCst), 2);
        assert_eq!(controller.session().identity.username.as_deref(), Some("luis"));
    }

    #[tokio::test]
    async fn legacy_permissions_join_roles_from_the_token() {
        let mut controller = AccessController::new(MemoryTokenStorage::new(), backend(&[]));
        controller.sign_in(&mint("jperez", false)).await.unwrap();

        let derived = controller.legacy_role_permissions().await;

        assert!(derived.has("view_dashboard"));
        // Derived permissions never feed the evaluator
        assert!(!controller.has_permission("view_dashboard"));
    }

    #[tokio::test]
    async fn theme_patch_reaches_subscribers() {
        let mut controller = AccessController::new(MemoryTokenStorage::new(), backend(&[]));
        controller.sign_in(&mint("jperez", false)).await.unwrap();
        let mut rx = controller.subscribe();
        rx.borrow_and_update();

        let patch = ThemePatch {
            theme_preference: Some(ThemePreference::Custom.into()),
            theme_custom_color: Some("#112233".to_string()),
            ..ThemePatch::default()
        };
        controller.patch_theme(&patch).await.unwrap();

        assert!(rx.has_changed().unwrap());
        let theme = rx.borrow().identity.theme.clone();
        assert_eq!(theme.theme_preference, Some(ThemePreference::Custom));
        assert_eq!(theme.theme_custom_color.as_deref(), Some("#112233"));
    }

    #[tokio::test]
    async fn theme_patch_requires_a_session() {
        let mut controller = AccessController::new(MemoryTokenStorage::new(), backend(&[]));
        let patch = ThemePatch {
            theme_glow_enabled: Some(true),
            ..ThemePatch::default()
        };

        let error = controller.patch_theme(&patch).await.unwrap_err();
        assert!(matches!(error, ActFijoError::NotFound { .. }));
    }
}
