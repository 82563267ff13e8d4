//! ActFijo Access - the authorization view model of the asset management client
//!
//! Decides what the current user may see and do in the UI:
//!
//! - **Session** (`session`): owns the bearer token and the identity decoded from it
//! - **Permissions** (`permissions`): fetches the server-computed permission set,
//!   caches role details and answers [`AccessQuery`] through the evaluator
//! - **Navigation** (`navigation`): composes the sidebar, route guards and
//!   screen actions from [`AccessQuery`] answers only
//! - **Controller** (`controller`): wires the pieces above to the backend
//!
//! ## Security
//!
//! Nothing here is a security boundary. Every answer only controls rendering;
//! the backend enforces each permission again on every request.

pub mod client;
pub mod controller;
pub mod navigation;
pub mod permissions;
pub mod session;

pub use client::{AccessBackend, BackendClient, TokenPair};
pub use controller::AccessController;
pub use navigation::{
    compose_sidebar, guard_module, guard_route, visible_actions, Gate, NavEntry, NavItem,
    RouteDecision, ScreenAction, SidebarView, SCREEN_ACTIONS, SETTINGS_ENTRY, SIDEBAR,
};
pub use permissions::{
    AccessQuery, EvaluatorState, ModuleAccessMap, PermissionEvaluator, PermissionSet,
    PermissionSource, Role, RoleDirectory, RoleSource,
};
pub use session::{
    FileTokenStorage, Identity, MemoryTokenStorage, PreferenceUpdate, Session, SessionStore,
    ThemePatch, ThemePreference, ThemePrefs, TokenStorage,
};
