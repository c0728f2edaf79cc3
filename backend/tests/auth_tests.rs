//! Authentication and authorization tests
//!
//! Covers account field validation and the permissions seeded for the
//! default roles.

use proptest::prelude::*;
use shared::{
    default_roles, normalize_colombian_phone, permission_string, validate_colombian_phone, validate_dni,
    validate_email, validate_password, Action, Resource, ADMIN_ROLE, DEFAULT_ROLE,
};
use std::collections::HashSet;

fn permissions_of(role: &str) -> HashSet<String> {
    default_roles()
        .into_iter()
        .find(|(name, _)| *name == role)
        .map(|(_, perms)| perms.iter().flat_map(|p| p.to_strings()).collect())
        .unwrap_or_default()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[test]
fn test_permission_string_format() {
    assert_eq!(permission_string(Resource::Cultivos, Action::Editar), "cultivos:editar");
    assert_eq!(permission_string(Resource::Inventario, Action::Ver), "inventario:ver");
}

#[test]
fn test_admin_has_every_permission() {
    let admin = permissions_of(ADMIN_ROLE);
    for resource in Resource::ALL {
        for action in Action::ALL {
            assert!(admin.contains(&permission_string(resource, action)));
        }
    }
}

#[test]
fn test_default_role_cannot_manage_users() {
    let aprendiz = permissions_of(DEFAULT_ROLE);
    assert!(!aprendiz.is_empty());
    assert!(aprendiz.contains("cosechas:crear"));
    assert!(!aprendiz.contains("usuarios:editar"));
    assert!(!aprendiz.contains("zonas:eliminar"));
}

#[test]
fn test_role_names_unique() {
    let roles = default_roles();
    let names: HashSet<&str> = roles.iter().map(|(n, _)| *n).collect();
    assert_eq!(names.len(), roles.len());
}

#[test]
fn test_password_rules() {
    assert!(validate_password("siembra2025").is_ok());
    assert!(validate_password("corta1").is_err());
    assert!(validate_password("sololetras").is_err());
    assert!(validate_password("12345678").is_err());
}

#[test]
fn test_email_rules() {
    assert!(validate_email("instructor@sena.edu.co").is_ok());
    assert!(validate_email("instructor.sena.edu.co").is_err());
}

#[test]
fn test_dni_length() {
    assert!(validate_dni(1_000_000_000).is_ok());
    assert!(validate_dni(99_999).is_err());
    assert!(validate_dni(10_000_000_000).is_err());
}

#[test]
fn test_phone_normalization() {
    assert_eq!(normalize_colombian_phone("+57 310 555 1234").as_deref(), Some("3105551234"));
    assert_eq!(normalize_colombian_phone("310-555-1234").as_deref(), Some("3105551234"));
    assert!(validate_colombian_phone("6015551234").is_err());
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    /// Any letters-and-digits password of 8+ characters is accepted
    #[test]
    fn prop_valid_passwords(letters in "[a-zA-Z]{4,20}", digits in "[0-9]{4,10}") {
        let password = format!("{}{}", letters, digits);
        prop_assert!(validate_password(&password).is_ok());
    }

    /// Passwords shorter than 8 characters are always rejected
    #[test]
    fn prop_short_passwords_rejected(password in "[a-z0-9]{0,7}") {
        prop_assert!(validate_password(&password).is_err());
    }

    /// Mobile numbers normalize to ten digits starting with 3
    #[test]
    fn prop_mobile_normalizes(rest in "[0-9]{9}") {
        let phone = format!("+573{}", rest);
        let normalized = normalize_colombian_phone(&phone).unwrap();
        prop_assert_eq!(normalized.len(), 10);
        prop_assert!(normalized.starts_with('3'));
    }
}
