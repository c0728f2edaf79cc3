//! User administration service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::auth::validate_phone;

/// User management service
#[derive(Clone)]
pub struct UserService {
    db: PgPool,
}

/// A user account with its role name. Password hashes never leave the
/// auth service.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Usuario {
    pub id: Uuid,
    pub dni: i64,
    pub nombres: String,
    pub apellidos: String,
    pub correo: String,
    pub telefono: Option<String>,
    pub rol_id: Uuid,
    pub rol: String,
    pub activo: bool,
    pub ultimo_acceso: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Usuario {
    pub fn nombre_completo(&self) -> String {
        format!("{} {}", self.nombres, self.apellidos)
    }
}

/// A role with its flattened permissions
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Rol {
    pub id: Uuid,
    pub nombre: String,
    pub permisos: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFilter {
    pub buscar: Option<String>,
    pub rol_id: Option<Uuid>,
    pub activo: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserInput {
    #[validate(length(min = 1, max = 100, message = "Names must be 1-100 characters"))]
    pub nombres: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Surnames must be 1-100 characters"))]
    pub apellidos: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub correo: Option<String>,
    #[validate(custom = "validate_phone")]
    pub telefono: Option<String>,
    pub rol_id: Option<Uuid>,
    pub activo: Option<bool>,
}

pub(crate) const USUARIO_SELECT: &str = r#"
    SELECT u.id, u.dni, u.nombres, u.apellidos, u.correo, u.telefono, u.rol_id,
           r.nombre AS rol, u.activo, u.ultimo_acceso, u.created_at, u.updated_at
    FROM usuarios u
    JOIN roles r ON r.id = u.rol_id
"#;

impl UserService {
    /// Create a new UserService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List users, optionally filtered by name/document, role and status
    pub async fn list(&self, filter: &UserFilter) -> AppResult<Vec<Usuario>> {
        let pattern = filter
            .buscar
            .as_deref()
            .map(|s| format!("%{}%", s.trim()));

        let users = sqlx::query_as::<_, Usuario>(&format!(
            r#"{}
            WHERE ($1::text IS NULL
                   OR u.nombres ILIKE $1 OR u.apellidos ILIKE $1
                   OR u.correo ILIKE $1 OR u.dni::text LIKE $1)
              AND ($2::uuid IS NULL OR u.rol_id = $2)
              AND ($3::bool IS NULL OR u.activo = $3)
            ORDER BY u.apellidos, u.nombres
            "#,
            USUARIO_SELECT
        ))
        .bind(pattern)
        .bind(filter.rol_id)
        .bind(filter.activo)
        .fetch_all(&self.db)
        .await?;

        Ok(users)
    }

    /// Get a user by ID
    pub async fn get(&self, user_id: Uuid) -> AppResult<Usuario> {
        sqlx::query_as::<_, Usuario>(&format!("{} WHERE u.id = $1", USUARIO_SELECT))
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Usuario".to_string()))
    }

    /// Update a user. Role and status changes are reserved for administrators.
    pub async fn update(
        &self,
        user_id: Uuid,
        input: UpdateUserInput,
        is_admin: bool,
    ) -> AppResult<Usuario> {
        input.validate()?;

        if (input.rol_id.is_some() || input.activo.is_some()) && !is_admin {
            return Err(AppError::InsufficientPermissions);
        }

        if let Some(rol_id) = input.rol_id {
            let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM roles WHERE id = $1)")
                .bind(rol_id)
                .fetch_one(&self.db)
                .await?;
            if !exists {
                return Err(AppError::NotFound("Rol".to_string()));
            }
        }

        let updated = sqlx::query(
            r#"
            UPDATE usuarios
            SET nombres = COALESCE($2, nombres),
                apellidos = COALESCE($3, apellidos),
                correo = COALESCE($4, correo),
                telefono = COALESCE($5, telefono),
                rol_id = COALESCE($6, rol_id),
                activo = COALESCE($7, activo),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(&input.nombres)
        .bind(&input.apellidos)
        .bind(input.correo.as_deref().map(str::to_lowercase))
        .bind(&input.telefono)
        .bind(input.rol_id)
        .bind(input.activo)
        .execute(&self.db)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound("Usuario".to_string()));
        }

        tracing::info!(user_id = %user_id, "User updated");
        self.get(user_id).await
    }

    /// Deactivate a user and revoke their refresh tokens
    pub async fn deactivate(&self, user_id: Uuid, acting_user: Uuid) -> AppResult<Usuario> {
        if user_id == acting_user {
            return Err(AppError::InvalidStateTransition(
                "You cannot deactivate your own account".to_string(),
            ));
        }

        let mut tx = self.db.begin().await?;

        let updated = sqlx::query("UPDATE usuarios SET activo = false, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound("Usuario".to_string()));
        }

        sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE usuario_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(user_id = %user_id, "User deactivated");
        self.get(user_id).await
    }

    /// List roles with their permissions
    pub async fn list_roles(&self) -> AppResult<Vec<Rol>> {
        let roles = sqlx::query_as::<_, Rol>(
            r#"
            SELECT r.id, r.nombre,
                   COALESCE(
                       array_agg(CONCAT(p.recurso, ':', p.accion) ORDER BY p.recurso, p.accion)
                           FILTER (WHERE p.id IS NOT NULL),
                       ARRAY[]::text[]
                   ) AS permisos
            FROM roles r
            LEFT JOIN rol_permisos rp ON rp.rol_id = r.id
            LEFT JOIN permisos p ON p.id = rp.permiso_id
            GROUP BY r.id, r.nombre
            ORDER BY r.nombre
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(roles)
    }
}
