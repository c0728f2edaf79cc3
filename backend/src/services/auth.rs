//! Authentication service for user registration, login, and token management

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::user::{Usuario, USUARIO_SELECT};
use shared::{
    default_roles, normalize_colombian_phone, validate_colombian_phone, validate_password,
    ADMIN_ROLE, DEFAULT_ROLE,
};

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: PgPool,
    jwt_secret: String,
    access_token_expiry: i64,
    refresh_token_expiry: i64,
}

/// Input for registering a new user
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    #[validate(range(min = 100000, max = 9999999999, message = "DNI must have between 6 and 10 digits"))]
    pub dni: i64,
    #[validate(length(min = 1, max = 100, message = "Names must be 1-100 characters"))]
    pub nombres: String,
    #[validate(length(min = 1, max = 100, message = "Surnames must be 1-100 characters"))]
    pub apellidos: String,
    #[validate(email(message = "Invalid email format"))]
    pub correo: String,
    #[validate(custom = "validate_password_strength")]
    pub password: String,
    #[validate(custom = "validate_phone")]
    pub telefono: Option<String>,
    /// Only honoured when an administrator performs the registration
    pub rol_id: Option<Uuid>,
}

/// Login by email or document number
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginInput {
    pub correo: Option<String>,
    pub dni: Option<i64>,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshInput {
    pub refresh_token: String,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    pub dni: i64,
    pub rol: String,
    pub permissions: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

/// Authentication tokens
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Tokens plus the profile they were issued for
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[serde(flatten)]
    pub tokens: AuthTokens,
    pub usuario: Usuario,
}

/// Profile returned by `/auth/me`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(flatten)]
    pub usuario: Usuario,
    pub permisos: Vec<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    id: Uuid,
    password_hash: String,
    activo: bool,
}

pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    validate_colombian_phone(phone).map_err(|msg| {
        let mut err = ValidationError::new("telefono");
        err.message = Some(msg.into());
        err
    })
}

fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    validate_password(password).map_err(|msg| {
        let mut err = ValidationError::new("password");
        err.message = Some(msg.into());
        err
    })
}

/// Decode and verify an access token
pub fn decode_access_token(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::InvalidToken,
    })
}

/// Hash a refresh token for storage
fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

fn invalid_login() -> AppError {
    AppError::Unauthorized {
        message: "Invalid credentials".to_string(),
        message_es: "Correo, documento o contraseña incorrectos".to_string(),
    }
}

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            jwt_secret: config.jwt.secret.clone(),
            access_token_expiry: config.jwt.access_token_expiry,
            refresh_token_expiry: config.jwt.refresh_token_expiry,
        }
    }

    /// Make sure the built-in roles and their permissions exist.
    /// Permissions are only ever added, so manual grants survive restarts.
    pub async fn ensure_default_roles(&self) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        for (role, permissions) in default_roles() {
            let role_id = sqlx::query_scalar::<_, Uuid>(
                r#"
                INSERT INTO roles (nombre) VALUES ($1)
                ON CONFLICT (nombre) DO UPDATE SET nombre = EXCLUDED.nombre
                RETURNING id
                "#,
            )
            .bind(role)
            .fetch_one(&mut *tx)
            .await?;

            for permission in &permissions {
                for action in &permission.actions {
                    let permiso_id = sqlx::query_scalar::<_, Uuid>(
                        r#"
                        INSERT INTO permisos (recurso, accion) VALUES ($1, $2)
                        ON CONFLICT (recurso, accion) DO UPDATE SET recurso = EXCLUDED.recurso
                        RETURNING id
                        "#,
                    )
                    .bind(permission.resource.as_str())
                    .bind(action.as_str())
                    .fetch_one(&mut *tx)
                    .await?;

                    sqlx::query(
                        "INSERT INTO rol_permisos (rol_id, permiso_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
                    )
                    .bind(role_id)
                    .bind(permiso_id)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;
        tracing::info!("Default roles ensured");
        Ok(())
    }

    /// Register a new user. The very first account becomes administrator;
    /// otherwise the default role applies unless an administrator picks one.
    pub async fn register(
        &self,
        input: RegisterInput,
        registered_by_admin: bool,
    ) -> AppResult<AuthResponse> {
        input.validate()?;

        let correo = input.correo.trim().to_lowercase();
        let telefono = input
            .telefono
            .as_deref()
            .and_then(normalize_colombian_phone);

        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM usuarios WHERE dni = $1 OR correo = $2",
        )
        .bind(input.dni)
        .bind(&correo)
        .fetch_one(&self.db)
        .await?;

        if existing > 0 {
            return Err(AppError::Conflict {
                resource: "usuario".to_string(),
                message: "A user with this document or email already exists".to_string(),
                message_es: "Ya existe un usuario con este documento o correo".to_string(),
            });
        }

        let password_hash = hash(&input.password, DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        let mut tx = self.db.begin().await?;

        let user_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM usuarios")
            .fetch_one(&mut *tx)
            .await?;

        let rol_id = match input.rol_id {
            Some(rol_id) if registered_by_admin => sqlx::query_scalar::<_, Uuid>(
                "SELECT id FROM roles WHERE id = $1",
            )
            .bind(rol_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Rol".to_string()))?,
            _ => {
                let role = if user_count == 0 { ADMIN_ROLE } else { DEFAULT_ROLE };
                sqlx::query_scalar::<_, Uuid>("SELECT id FROM roles WHERE nombre = $1")
                    .bind(role)
                    .fetch_optional(&mut *tx)
                    .await?
                    .ok_or_else(|| {
                        AppError::Configuration(format!("Role {} has not been seeded", role))
                    })?
            }
        };

        let user_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO usuarios (dni, nombres, apellidos, correo, telefono, password_hash, rol_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(input.dni)
        .bind(input.nombres.trim())
        .bind(input.apellidos.trim())
        .bind(&correo)
        .bind(&telefono)
        .bind(&password_hash)
        .bind(rol_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(user_id = %user_id, dni = input.dni, "User registered");

        self.issue(user_id).await
    }

    /// Authenticate user with email or document number and password
    pub async fn login(&self, input: LoginInput) -> AppResult<AuthResponse> {
        let row = match (&input.correo, input.dni) {
            (Some(correo), _) => {
                sqlx::query_as::<_, CredentialRow>(
                    "SELECT id, password_hash, activo FROM usuarios WHERE correo = $1",
                )
                .bind(correo.trim().to_lowercase())
                .fetch_optional(&self.db)
                .await?
            }
            (None, Some(dni)) => {
                sqlx::query_as::<_, CredentialRow>(
                    "SELECT id, password_hash, activo FROM usuarios WHERE dni = $1",
                )
                .bind(dni)
                .fetch_optional(&self.db)
                .await?
            }
            (None, None) => {
                return Err(AppError::validation(
                    "correo",
                    "Email or document number is required",
                    "Debe indicar el correo o el documento",
                ))
            }
        };

        let user = row.ok_or_else(invalid_login)?;

        if !user.activo {
            return Err(AppError::Unauthorized {
                message: "Account is disabled".to_string(),
                message_es: "La cuenta está desactivada".to_string(),
            });
        }

        let valid = verify(&input.password, &user.password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;

        if !valid {
            tracing::warn!(user_id = %user.id, "Failed login attempt");
            return Err(invalid_login());
        }

        sqlx::query("UPDATE usuarios SET ultimo_acceso = NOW() WHERE id = $1")
            .bind(user.id)
            .execute(&self.db)
            .await?;

        self.issue(user.id).await
    }

    /// Exchange a refresh token for a new token pair. The old token is revoked.
    pub async fn refresh_token(&self, refresh_token: &str) -> AppResult<AuthResponse> {
        let token_hash = hash_token(refresh_token);

        let mut tx = self.db.begin().await?;

        let user_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE refresh_tokens rt
            SET revoked_at = NOW()
            FROM usuarios u
            WHERE u.id = rt.usuario_id
              AND rt.token_hash = $1
              AND rt.expires_at > NOW()
              AND rt.revoked_at IS NULL
              AND u.activo = true
            RETURNING rt.usuario_id
            "#,
        )
        .bind(&token_hash)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::Unauthorized {
            message: "Invalid or expired refresh token".to_string(),
            message_es: "El token de actualización no es válido o expiró".to_string(),
        })?;

        tx.commit().await?;

        self.issue(user_id).await
    }

    /// Current user's profile and permissions
    pub async fn me(&self, user_id: Uuid) -> AppResult<Profile> {
        let usuario = self.load_user(user_id).await?;
        let permisos = self.get_user_permissions(user_id).await?;
        Ok(Profile { usuario, permisos })
    }

    async fn issue(&self, user_id: Uuid) -> AppResult<AuthResponse> {
        let usuario = self.load_user(user_id).await?;
        let permissions = self.get_user_permissions(user_id).await?;
        let tokens = self.generate_tokens(&usuario, &permissions)?;
        self.store_refresh_token(user_id, &tokens.refresh_token).await?;
        Ok(AuthResponse { tokens, usuario })
    }

    async fn load_user(&self, user_id: Uuid) -> AppResult<Usuario> {
        sqlx::query_as::<_, Usuario>(&format!("{} WHERE u.id = $1", USUARIO_SELECT))
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Usuario".to_string()))
    }

    /// Get user permissions from database
    async fn get_user_permissions(&self, user_id: Uuid) -> AppResult<Vec<String>> {
        let permissions = sqlx::query_scalar::<_, String>(
            r#"
            SELECT CONCAT(p.recurso, ':', p.accion)
            FROM usuarios u
            JOIN rol_permisos rp ON rp.rol_id = u.rol_id
            JOIN permisos p ON p.id = rp.permiso_id
            WHERE u.id = $1
            ORDER BY 1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(permissions)
    }

    /// Generate access and refresh tokens
    fn generate_tokens(&self, usuario: &Usuario, permissions: &[String]) -> AppResult<AuthTokens> {
        let now = Utc::now();
        let access_exp = now + Duration::seconds(self.access_token_expiry);

        let claims = Claims {
            sub: usuario.id.to_string(),
            dni: usuario.dni,
            rol: usuario.rol.clone(),
            permissions: permissions.to_vec(),
            exp: access_exp.timestamp(),
            iat: now.timestamp(),
        };

        let access_token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;

        Ok(AuthTokens {
            access_token,
            refresh_token: Uuid::new_v4().to_string(),
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expiry,
        })
    }

    /// Store refresh token in database
    async fn store_refresh_token(&self, user_id: Uuid, token: &str) -> AppResult<()> {
        let expires_at = Utc::now() + Duration::seconds(self.refresh_token_expiry);

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (usuario_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user_id)
        .bind(hash_token(token))
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_for(exp_offset: i64, secret: &str) -> String {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            dni: 1_098_765_432,
            rol: "Instructor".to_string(),
            permissions: vec!["cultivos:ver".to_string()],
            exp: now + exp_offset,
            iat: now,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn test_decode_valid_token() {
        let token = token_for(600, "s3cret");
        let claims = decode_access_token(&token, "s3cret").unwrap();
        assert_eq!(claims.rol, "Instructor");
        assert_eq!(claims.permissions, vec!["cultivos:ver"]);
    }

    #[test]
    fn test_decode_rejects_wrong_secret_and_expiry() {
        let token = token_for(600, "s3cret");
        assert!(matches!(decode_access_token(&token, "other"), Err(AppError::InvalidToken)));

        let expired = token_for(-3600, "s3cret");
        assert!(matches!(decode_access_token(&expired, "s3cret"), Err(AppError::TokenExpired)));
    }

    #[test]
    fn test_hash_token_is_sha256_hex() {
        let hashed = hash_token("abc");
        assert_eq!(
            hashed,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_register_input_validation() {
        let input = RegisterInput {
            dni: 1234,
            nombres: "Ana".to_string(),
            apellidos: "Rojas".to_string(),
            correo: "ana@example.com".to_string(),
            password: "clave1234".to_string(),
            telefono: Some("3001234567".to_string()),
            rol_id: None,
        };
        let errors = input.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("dni"));

        let ok = RegisterInput { dni: 1_098_765_432, ..input };
        assert!(ok.validate().is_ok());
    }
}
