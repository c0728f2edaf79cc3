//! Error handling for the AgroTIC platform
//!
//! Provides consistent error responses in Spanish and English

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::DomainError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String, message_es: String },

    #[error("Invalid request signature")]
    InvalidSignature,

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_es: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Conflict: {message}")]
    Conflict {
        resource: String,
        message: String,
        message_es: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Insufficient harvest quantity: {0}")]
    InsufficientHarvest(String),

    // Report rendering errors
    #[error("Report generation failed: {0}")]
    Report(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_es: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    fn new(code: &str, message_en: impl Into<String>, message_es: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message_en: message_en.into(),
            message_es: message_es.into(),
            field: None,
        }
    }

    fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl AppError {
    /// Shorthand for a field validation error
    pub fn validation(field: &str, message: impl Into<String>, message_es: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
            message_es: message_es.into(),
        }
    }

    pub(crate) fn status_and_detail(&self) -> (StatusCode, ErrorDetail) {
        match self {
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new(
                    "INVALID_CREDENTIALS",
                    "Invalid credentials",
                    "Credenciales inválidas",
                ),
            ),
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("TOKEN_EXPIRED", "Token has expired", "El token ha expirado"),
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("INVALID_TOKEN", "Invalid token", "Token inválido"),
            ),
            AppError::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                ErrorDetail::new(
                    "INSUFFICIENT_PERMISSIONS",
                    "You do not have permission to perform this action",
                    "No tiene permiso para realizar esta acción",
                ),
            ),
            AppError::Unauthorized { message, message_es } => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("UNAUTHORIZED", message.clone(), message_es.clone()),
            ),
            AppError::InvalidSignature => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new(
                    "INVALID_SIGNATURE",
                    "Request signature does not match",
                    "La firma de la solicitud no coincide",
                ),
            ),
            AppError::Validation {
                field,
                message,
                message_es,
            } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", message.clone(), message_es.clone())
                    .with_field(field.clone()),
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new(
                    "VALIDATION_ERROR",
                    msg.clone(),
                    format!("Datos inválidos: {}", msg),
                ),
            ),
            AppError::DuplicateEntry(field) => (
                StatusCode::CONFLICT,
                ErrorDetail::new(
                    "DUPLICATE_ENTRY",
                    format!("A record with this {} already exists", field),
                    format!("Ya existe un registro con este {}", field),
                )
                .with_field(field.clone()),
            ),
            AppError::Conflict {
                resource,
                message,
                message_es,
            } => (
                StatusCode::CONFLICT,
                ErrorDetail::new("CONFLICT", message.clone(), message_es.clone())
                    .with_field(resource.clone()),
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new(
                    "NOT_FOUND",
                    format!("{} not found", resource),
                    format!("No se encontró {}", resource),
                ),
            ),
            AppError::InvalidStateTransition(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new(
                    "INVALID_STATE_TRANSITION",
                    msg.clone(),
                    format!("Cambio de estado no permitido: {}", msg),
                ),
            ),
            AppError::InsufficientStock(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new(
                    "INSUFFICIENT_STOCK",
                    msg.clone(),
                    format!("Stock insuficiente: {}", msg),
                ),
            ),
            AppError::InsufficientHarvest(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new(
                    "INSUFFICIENT_HARVEST",
                    msg.clone(),
                    format!("Cantidad de cosecha insuficiente: {}", msg),
                ),
            ),
            AppError::Report(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "REPORT_ERROR",
                    "The report could not be generated",
                    "No se pudo generar el reporte",
                ),
            ),
            AppError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "CONFIGURATION_ERROR",
                    format!("Configuration error: {}", msg),
                    format!("Error de configuración: {}", msg),
                ),
            ),
            AppError::DatabaseError(err) => classify_database_error(err),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", msg.clone(), "Error interno del servidor"),
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "INTERNAL_ERROR",
                    "An internal server error occurred",
                    "Error interno del servidor",
                ),
            ),
        }
    }
}

/// Map constraint violations to client errors; everything else is a 500
fn classify_database_error(err: &sqlx::Error) -> (StatusCode, ErrorDetail) {
    if let sqlx::Error::RowNotFound = err {
        return (
            StatusCode::NOT_FOUND,
            ErrorDetail::new("NOT_FOUND", "Record not found", "No se encontró el registro"),
        );
    }

    let Some(db_err) = err.as_database_error() else {
        return database_failure();
    };
    let constraint = db_err.constraint().unwrap_or("constraint").to_string();
    classify_sqlstate(db_err.code().as_deref(), constraint)
}

/// Client-facing status for a Postgres SQLSTATE
fn classify_sqlstate(code: Option<&str>, constraint: String) -> (StatusCode, ErrorDetail) {
    match code {
        Some("23505") => (
            StatusCode::CONFLICT,
            ErrorDetail::new(
                "DUPLICATE_ENTRY",
                "A record with the same unique value already exists",
                "Ya existe un registro con el mismo valor único",
            )
            .with_field(constraint),
        ),
        Some("23503") => (
            StatusCode::CONFLICT,
            ErrorDetail::new(
                "CONFLICT",
                "The record is referenced by or references another record",
                "El registro está relacionado con otro registro",
            )
            .with_field(constraint),
        ),
        Some("23514") => (
            StatusCode::BAD_REQUEST,
            ErrorDetail::new(
                "VALIDATION_ERROR",
                "A value violates a data rule",
                "Un valor no cumple una regla de datos",
            )
            .with_field(constraint),
        ),
        // numeric_value_out_of_range, invalid_text_representation
        Some("22003") | Some("22P02") => (
            StatusCode::BAD_REQUEST,
            ErrorDetail::new(
                "VALIDATION_ERROR",
                "A value is out of range or malformed",
                "Un valor está fuera de rango o tiene un formato inválido",
            ),
        ),
        _ => database_failure(),
    }
}

fn database_failure() -> (StatusCode, ErrorDetail) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorDetail::new(
            "DATABASE_ERROR",
            "A database error occurred",
            "Ocurrió un error en la base de datos",
        ),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = self.status_and_detail();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::warn!(code = %error_detail.code, "Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        let message = err.to_string();
        match err {
            DomainError::InsufficientStock { .. } => AppError::InsufficientStock(message),
            DomainError::InsufficientHarvest { .. } => AppError::InsufficientHarvest(message),
            DomainError::HarvestClosed => AppError::InvalidStateTransition(message),
            DomainError::HarvestBelowSold { .. } => AppError::InvalidStateTransition(message),
            other => AppError::Validation {
                field: other.field().unwrap_or("body").to_string(),
                message_es: format!("Datos inválidos: {}", message),
                message,
            },
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let first = errors
            .field_errors()
            .into_iter()
            .next()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("Invalid value for {}", field));
                (field.to_string(), message)
            });

        match first {
            Some((field, message)) => AppError::Validation {
                message_es: format!("Valor inválido en {}", field),
                field,
                message,
            },
            None => AppError::ValidationError(errors.to_string()),
        }
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_domain_errors_map_to_business_codes() {
        let err: AppError = DomainError::InsufficientStock {
            available: Decimal::from(1),
            requested: Decimal::from(2),
        }
        .into();
        let (status, detail) = err.status_and_detail();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(detail.code, "INSUFFICIENT_STOCK");

        let err: AppError = DomainError::HarvestClosed.into();
        assert_eq!(err.status_and_detail().0, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_domain_validation_keeps_field() {
        let err: AppError = DomainError::ZeroAdjustment.into();
        let (status, detail) = err.status_and_detail();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(detail.field.as_deref(), Some("cantidad"));
    }

    #[test]
    fn test_out_of_range_amount_is_400() {
        let err: AppError = DomainError::OutOfRange {
            field: "precioUnitario",
            value: Decimal::from(10_000_000_000_000i64),
            max: shared::MAX_AMOUNT,
        }
        .into();
        let (status, detail) = err.status_and_detail();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(detail.code, "VALIDATION_ERROR");
        assert_eq!(detail.field.as_deref(), Some("precioUnitario"));
    }

    #[test]
    fn test_numeric_overflow_sqlstate_is_400() {
        for code in ["22003", "22P02"] {
            let (status, detail) = classify_sqlstate(Some(code), "cosechas".to_string());
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(detail.code, "VALIDATION_ERROR");
        }
        let (status, _) = classify_sqlstate(Some("23505"), "usuarios_email_key".to_string());
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, detail) = classify_sqlstate(Some("57014"), "constraint".to_string());
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(detail.code, "DATABASE_ERROR");
    }

    #[test]
    fn test_row_not_found_is_404() {
        let err = AppError::DatabaseError(sqlx::Error::RowNotFound);
        assert_eq!(err.status_and_detail().0, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_error_body_shape() {
        let detail = ErrorDetail::new("NOT_FOUND", "Zona not found", "No se encontró Zona");
        let value = serde_json::to_value(ErrorResponse { error: detail }).unwrap();
        assert_eq!(value["error"]["code"], "NOT_FOUND");
        assert!(value["error"].get("field").is_none());
    }
}
