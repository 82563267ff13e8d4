//! Static module → required view permission table

/// Navigable module keys and the permission each one requires
///
/// Keys are lowercase route slugs. A key missing here can never be reached
/// from the UI.
pub const MODULE_VIEW_PERMISSIONS: &[(&str, &str)] = &[
    ("dashboard", "view_dashboard"),
    ("activos_fijos", "view_activofijo"),
    ("departamentos", "view_departamento"),
    ("cargos", "view_cargo"),
    ("empleados", "view_empleado"),
    ("roles", "view_rol"),
    ("permisos", "view_permiso"),
    ("presupuestos", "view_presupuesto"),
    ("ubicaciones", "view_ubicacion"),
    ("proveedores", "view_proveedor"),
    ("categorias", "view_categoriaactivo"),
    ("estados", "view_estadoactivo"),
    ("reportes", "view_reporte"),
    ("settings", "manage_settings"),
    ("mantenimientos", "view_mantenimiento"),
    ("revalorizaciones", "view_revalorizacion"),
    ("solicitudes", "view_solicitudactivo"),
    ("solicitudes_compra", "view_solicitud_compra"),
    ("ordenes_compra", "view_orden_compra"),
    ("depreciaciones", "view_depreciacion"),
    ("disposiciones", "view_disposicion"),
    ("suscripcion", "view_suscripcion"),
];

/// Lookup over a compile-time table; never mutated at runtime
#[derive(Debug, Clone, Copy)]
pub struct ModuleAccessMap {
    entries: &'static [(&'static str, &'static str)],
}

impl ModuleAccessMap {
    pub const fn new(entries: &'static [(&'static str, &'static str)]) -> Self {
        Self { entries }
    }

    /// The application's table
    pub const fn standard() -> Self {
        Self::new(MODULE_VIEW_PERMISSIONS)
    }

    /// Permission required for `module_key`, compared after lowercasing
    pub fn required_permission(&self, module_key: &str) -> Option<&'static str> {
        let key = module_key.to_lowercase();
        self.entries
            .iter()
            .find(|(module, _)| *module == key)
            .map(|(_, permission)| *permission)
    }

    pub fn contains(&self, module_key: &str) -> bool {
        self.required_permission(module_key).is_some()
    }

    pub fn module_keys(&self) -> impl Iterator<Item = &'static str> {
        self.entries.iter().map(|(module, _)| *module)
    }
}

impl Default for ModuleAccessMap {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn lookup_ignores_module_key_case() {
        let map = ModuleAccessMap::standard();
        assert_eq!(map.required_permission("dashboard"), Some("view_dashboard"));
        assert_eq!(map.required_permission("Dashboard"), Some("view_dashboard"));
        assert_eq!(map.required_permission("ACTIVOS_FIJOS"), Some("view_activofijo"));
    }

    #[test]
    fn unknown_modules_have_no_permission() {
        let map = ModuleAccessMap::standard();
        assert_eq!(map.required_permission("bitacora"), None);
        assert_eq!(map.required_permission(""), None);
    }

    #[test]
    fn keys_are_unique_and_lowercase() {
        let mut seen = HashSet::new();
        for key in ModuleAccessMap::standard().module_keys() {
            assert_eq!(key, key.to_lowercase());
            assert!(seen.insert(key), "duplicate module key {key}");
        }
    }
}
