//! Authentication middleware
//!
//! JWT authentication and role-based access control middleware

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use shared::{permission_string, Action, Resource, ADMIN_ROLE};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::auth::decode_access_token;
use crate::AppState;

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub dni: i64,
    pub rol: String,
    pub permissions: Vec<String>,
}

impl AuthUser {
    /// Check if user has a specific permission
    pub fn has_permission(&self, resource: Resource, action: Action) -> bool {
        let permission = permission_string(resource, action);
        self.permissions.contains(&permission)
    }

    /// Check if user has any of the specified permissions
    pub fn has_any_permission(&self, perms: &[(Resource, Action)]) -> bool {
        perms.iter().any(|(r, a)| self.has_permission(*r, *a))
    }

    pub fn is_admin(&self) -> bool {
        self.rol == ADMIN_ROLE
    }

    /// Permission guard for use in handlers
    pub fn require(&self, resource: Resource, action: Action) -> AppResult<()> {
        if self.has_permission(resource, action) {
            Ok(())
        } else {
            tracing::debug!(
                user_id = %self.user_id,
                "Permission denied: requires {}",
                permission_string(resource, action)
            );
            Err(AppError::InsufficientPermissions)
        }
    }
}

/// Authentication middleware that validates the bearer token
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => {
            return AppError::Unauthorized {
                message: "Missing or invalid Authorization header".to_string(),
                message_es: "Falta el encabezado Authorization o no es válido".to_string(),
            }
            .into_response();
        }
    };

    match authenticate(token, &state.config.jwt.secret) {
        Ok(auth_user) => {
            request.extensions_mut().insert(auth_user);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

/// Resolve an access token into the user it was issued to
pub fn authenticate(token: &str, secret: &str) -> AppResult<AuthUser> {
    let claims = decode_access_token(token, secret)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;

    Ok(AuthUser {
        user_id,
        dni: claims.dni,
        rol: claims.rol,
        permissions: claims.permissions,
    })
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized {
                message: "Authentication required".to_string(),
                message_es: "Debe iniciar sesión".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(perms: &[&str]) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            dni: 1_234_567,
            rol: "Aprendiz".to_string(),
            permissions: perms.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_has_permission() {
        let u = user(&["cosechas:ver", "cosechas:crear"]);
        assert!(u.has_permission(Resource::Cosechas, Action::Crear));
        assert!(!u.has_permission(Resource::Cosechas, Action::Eliminar));
        assert!(u.has_any_permission(&[(Resource::Ventas, Action::Ver), (Resource::Cosechas, Action::Ver)]));
        assert!(u.require(Resource::Ventas, Action::Ver).is_err());
        assert!(!u.is_admin());
    }
}
