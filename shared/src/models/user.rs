//! User, role and permission models

use serde::{Deserialize, Serialize};

/// Name of the role given to self-registered users
pub const DEFAULT_ROLE: &str = "Aprendiz";

/// Name of the role allowed to manage users and broadcast notifications
pub const ADMIN_ROLE: &str = "Administrador";

/// A permission granting actions on a resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Permission {
    pub resource: Resource,
    pub actions: Vec<Action>,
}

impl Permission {
    /// Flatten into `"recurso:accion"` strings as carried in access tokens
    pub fn to_strings(&self) -> Vec<String> {
        self.actions
            .iter()
            .map(|a| permission_string(self.resource, *a))
            .collect()
    }
}

/// Resources that can be accessed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Usuarios,
    Zonas,
    Cultivos,
    Actividades,
    Cosechas,
    Ventas,
    Inventario,
    Sensores,
    Reportes,
    Notificaciones,
}

impl Resource {
    pub const ALL: [Resource; 10] = [
        Resource::Usuarios,
        Resource::Zonas,
        Resource::Cultivos,
        Resource::Actividades,
        Resource::Cosechas,
        Resource::Ventas,
        Resource::Inventario,
        Resource::Sensores,
        Resource::Reportes,
        Resource::Notificaciones,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Usuarios => "usuarios",
            Resource::Zonas => "zonas",
            Resource::Cultivos => "cultivos",
            Resource::Actividades => "actividades",
            Resource::Cosechas => "cosechas",
            Resource::Ventas => "ventas",
            Resource::Inventario => "inventario",
            Resource::Sensores => "sensores",
            Resource::Reportes => "reportes",
            Resource::Notificaciones => "notificaciones",
        }
    }
}

/// Actions that can be performed on resources
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Ver,
    Crear,
    Editar,
    Eliminar,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Ver, Action::Crear, Action::Editar, Action::Eliminar];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Ver => "ver",
            Action::Crear => "crear",
            Action::Editar => "editar",
            Action::Eliminar => "eliminar",
        }
    }
}

pub fn permission_string(resource: Resource, action: Action) -> String {
    format!("{}:{}", resource.as_str(), action.as_str())
}

fn grant(resource: Resource, actions: &[Action]) -> Permission {
    Permission {
        resource,
        actions: actions.to_vec(),
    }
}

/// Roles seeded on first start, with their permissions
pub fn default_roles() -> Vec<(&'static str, Vec<Permission>)> {
    use Action::*;

    let field_work = [
        Resource::Zonas,
        Resource::Cultivos,
        Resource::Actividades,
        Resource::Cosechas,
        Resource::Ventas,
        Resource::Inventario,
        Resource::Sensores,
    ];

    vec![
        (
            ADMIN_ROLE,
            Resource::ALL.iter().map(|r| grant(*r, &Action::ALL)).collect(),
        ),
        (
            "Instructor",
            field_work
                .iter()
                .map(|r| grant(*r, &Action::ALL))
                .chain([
                    grant(Resource::Usuarios, &[Ver]),
                    grant(Resource::Reportes, &[Ver, Crear]),
                    grant(Resource::Notificaciones, &[Ver, Crear]),
                ])
                .collect(),
        ),
        (
            DEFAULT_ROLE,
            field_work
                .iter()
                .map(|r| grant(*r, &[Ver]))
                .chain([
                    grant(Resource::Actividades, &[Ver, Editar]),
                    grant(Resource::Cosechas, &[Ver, Crear]),
                    grant(Resource::Inventario, &[Ver, Crear]),
                    grant(Resource::Reportes, &[Ver]),
                    grant(Resource::Notificaciones, &[Ver]),
                ])
                .collect(),
        ),
        (
            "Pasante",
            field_work
                .iter()
                .map(|r| grant(*r, &[Ver]))
                .chain([
                    grant(Resource::Actividades, &[Ver, Editar]),
                    grant(Resource::Notificaciones, &[Ver]),
                ])
                .collect(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(role: &str) -> Vec<String> {
        default_roles()
            .into_iter()
            .find(|(name, _)| *name == role)
            .map(|(_, perms)| perms.iter().flat_map(|p| p.to_strings()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_admin_has_everything() {
        let perms = flat(ADMIN_ROLE);
        assert_eq!(perms.len(), Resource::ALL.len() * Action::ALL.len());
        assert!(perms.contains(&"usuarios:eliminar".to_string()));
    }

    #[test]
    fn test_default_role_cannot_delete() {
        let perms = flat(DEFAULT_ROLE);
        assert!(perms.contains(&"cosechas:crear".to_string()));
        assert!(!perms.iter().any(|p| p.ends_with(":eliminar")));
        assert!(!perms.contains(&"usuarios:ver".to_string()));
    }

    #[test]
    fn test_permission_string() {
        assert_eq!(permission_string(Resource::Inventario, Action::Crear), "inventario:crear");
    }
}
