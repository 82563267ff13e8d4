//! Access-Gated View Composer
//!
//! Decides which navigation entries, routes and screen actions exist for the
//! current session. Everything here goes through [`AccessQuery`]; nothing
//! compares roles or permissions on its own. A denied affordance is omitted,
//! never returned in a disabled state.

use crate::permissions::AccessQuery;
use serde::Serialize;
use tracing::debug;

/// A navigable module as listed in the sidebar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NavEntry {
    pub module: &'static str,
    pub label: &'static str,
}

const fn entry(module: &'static str, label: &'static str) -> NavEntry {
    NavEntry { module, label }
}

/// Sidebar entries in display order
pub const SIDEBAR: &[NavEntry] = &[
    entry("dashboard", "Dashboard"),
    entry("empleados", "Empleados"),
    entry("cargos", "Cargos"),
    entry("departamentos", "Departamentos"),
    entry("solicitudes_compra", "Solicitudes de Compra"),
    entry("ordenes_compra", "Órdenes de Compra"),
    entry("activos_fijos", "Activos Fijos"),
    entry("revalorizaciones", "Revalorización"),
    entry("depreciaciones", "Depreciación"),
    entry("mantenimientos", "Mantenimientos"),
    entry("presupuestos", "Presupuestos"),
    entry("estados", "Estados"),
    entry("ubicaciones", "Ubicaciones"),
    entry("proveedores", "Proveedores"),
    entry("categorias", "Categorías"),
    entry("roles", "Roles"),
    entry("permisos", "Permisos"),
    entry("reportes", "Reportes"),
];

/// Footer entry, rendered for every authenticated user
pub const SETTINGS_ENTRY: NavEntry = entry("settings", "Configuración");

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub module: &'static str,
    pub label: &'static str,
    pub active: bool,
}

impl NavItem {
    fn from_entry(entry: &NavEntry, current: Option<&str>) -> Self {
        Self {
            module: entry.module,
            label: entry.label,
            active: current.is_some_and(|page| page.eq_ignore_ascii_case(entry.module)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SidebarView {
    pub items: Vec<NavItem>,
    pub footer: NavItem,
    /// Permissions still resolving; `items` is empty
    pub loading: bool,
}

/// Build the sidebar, evaluating `can_access` once per entry
pub fn compose_sidebar<Q>(query: &Q, current: Option<&str>) -> SidebarView
where
    Q: AccessQuery + ?Sized,
{
    let footer = NavItem::from_entry(&SETTINGS_ENTRY, current);

    if query.loading_permissions() {
        return SidebarView {
            items: Vec::new(),
            footer,
            loading: true,
        };
    }

    let items: Vec<NavItem> = SIDEBAR
        .iter()
        .filter(|entry| query.can_access(entry.module))
        .map(|entry| NavItem::from_entry(entry, current))
        .collect();

    debug!(visible = items.len(), total = SIDEBAR.len(), "Sidebar composed");

    SidebarView {
        items,
        footer,
        loading: false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteDecision {
    /// Show a spinner; nothing protected is rendered
    Loading,
    RedirectToLogin,
    Forbidden,
    Render,
}

/// Gate for every page behind the login
pub fn guard_route(session_loading: bool, is_authenticated: bool) -> RouteDecision {
    if session_loading {
        RouteDecision::Loading
    } else if is_authenticated {
        RouteDecision::Render
    } else {
        RouteDecision::RedirectToLogin
    }
}

/// Gate for one module page
pub fn guard_module<Q>(query: &Q, module_key: &str) -> RouteDecision
where
    Q: AccessQuery + ?Sized,
{
    if query.loading_permissions() {
        RouteDecision::Loading
    } else if query.can_access(module_key) {
        RouteDecision::Render
    } else {
        debug!(module = module_key, "Module access denied");
        RouteDecision::Forbidden
    }
}

/// The predicate protecting an affordance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Gate {
    Module(&'static str),
    Permission(&'static str),
    /// Role-name check; only for screens not yet moved to permissions
    Role(&'static str),
}

impl Gate {
    pub fn allows<Q>(&self, query: &Q) -> bool
    where
        Q: AccessQuery + ?Sized,
    {
        match *self {
            Gate::Module(module) => query.can_access(module),
            Gate::Permission(permission) => query.has_permission(permission),
            Gate::Role(role) => query.has_role(role),
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Gate::Role(_))
    }
}

/// An action button on a module screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScreenAction {
    pub screen: &'static str,
    pub action: &'static str,
    pub label: &'static str,
    pub gate: Gate,
}

const fn manage(screen: &'static str, label: &'static str, permission: &'static str) -> ScreenAction {
    ScreenAction {
        screen,
        action: "manage",
        label,
        gate: Gate::Permission(permission),
    }
}

pub const SCREEN_ACTIONS: &[ScreenAction] = &[
    manage("activos_fijos", "Gestionar activos", "manage_activofijo"),
    manage("mantenimientos", "Gestionar mantenimientos", "manage_mantenimiento"),
    manage("solicitudes_compra", "Gestionar solicitudes", "manage_solicitud_compra"),
    ScreenAction {
        screen: "solicitudes_compra",
        action: "approve",
        label: "Aprobar / rechazar",
        gate: Gate::Permission("approve_solicitud_compra"),
    },
    manage("ordenes_compra", "Gestionar órdenes", "manage_orden_compra"),
    ScreenAction {
        screen: "ordenes_compra",
        action: "receive",
        label: "Recibir orden",
        gate: Gate::Permission("receive_orden_compra"),
    },
    manage("roles", "Gestionar roles", "manage_rol"),
    manage("revalorizaciones", "Revalorizar", "manage_revalorizacion"),
    manage("depreciaciones", "Ejecutar depreciación", "manage_depreciacion"),
    manage("disposiciones", "Dar de baja", "manage_disposicion"),
    manage("empleados", "Gestionar empleados", "manage_empleado"),
    manage("departamentos", "Gestionar departamentos", "manage_departamento"),
    manage("cargos", "Gestionar cargos", "manage_cargo"),
    manage("proveedores", "Gestionar proveedores", "manage_proveedor"),
    manage("ubicaciones", "Gestionar ubicaciones", "manage_ubicacion"),
    manage("categorias", "Gestionar categorías", "manage_categoriaactivo"),
    manage("estados", "Gestionar estados", "manage_estadoactivo"),
    manage("presupuestos", "Gestionar presupuestos", "manage_presupuesto"),
    ScreenAction {
        screen: "reportes",
        action: "export",
        label: "Exportar",
        gate: Gate::Permission("export_reporte"),
    },
    // Still gated on the role name; should move to manage_permiso
    ScreenAction {
        screen: "permisos",
        action: "manage",
        label: "Gestionar permisos",
        gate: Gate::Role("Admin"),
    },
];

/// Actions of `screen` the session may see; none while loading
pub fn visible_actions<Q>(query: &Q, screen: &str) -> Vec<&'static ScreenAction>
where
    Q: AccessQuery + ?Sized,
{
    if query.loading_permissions() {
        return Vec::new();
    }

    let screen = screen.to_lowercase();
    SCREEN_ACTIONS
        .iter()
        .filter(|action| action.screen == screen)
        .filter(|action| {
            let allowed = action.gate.allows(query);
            if allowed && action.gate.is_legacy() {
                debug!(screen = action.screen, action = action.action, "Action allowed by role name");
            }
            allowed
        })
        .collect()
}
