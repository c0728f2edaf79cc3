//! Field activity service

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::notification::{HubEvent, NotificationHub, NotificationService};
use shared::{validate_activity, ActivityStatus, NotificationDraft, NotificationType};

#[derive(Clone)]
pub struct ActivityService {
    db: PgPool,
    hub: NotificationHub,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Actividad {
    pub id: Uuid,
    pub fk_cultivo_variedad_zona_id: Uuid,
    pub cultivo_nombre: String,
    pub descripcion: String,
    pub fecha_asignacion: NaiveDate,
    pub horas_dedicadas: Decimal,
    /// false = pendiente, true = completada
    pub estado: bool,
    pub observacion: Option<String>,
    pub dni_responsable: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Actividad {
    pub fn status(&self) -> ActivityStatus {
        ActivityStatus::from(self.estado)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityFilter {
    pub cvz_id: Option<Uuid>,
    pub pendientes: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivityInput {
    pub fk_cultivo_variedad_zona_id: Uuid,
    pub descripcion: String,
    pub fecha_asignacion: NaiveDate,
    #[serde(default)]
    pub horas_dedicadas: Decimal,
    pub observacion: Option<String>,
    pub dni_responsable: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActivityInput {
    pub descripcion: Option<String>,
    pub fecha_asignacion: Option<NaiveDate>,
    pub horas_dedicadas: Option<Decimal>,
    pub estado: Option<bool>,
    pub observacion: Option<String>,
    pub dni_responsable: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteActivityInput {
    pub horas_dedicadas: Option<Decimal>,
    pub observacion: Option<String>,
}

const ACTIVIDAD_SELECT: &str = r#"
    SELECT a.id, a.fk_cultivo_variedad_zona_id, c.nombre AS cultivo_nombre, a.descripcion,
           a.fecha_asignacion, a.horas_dedicadas, a.estado, a.observacion, a.dni_responsable,
           a.created_at, a.updated_at
    FROM actividades a
    JOIN cultivos_variedad_zona cvz ON cvz.id = a.fk_cultivo_variedad_zona_id
    JOIN cultivos c ON c.id = cvz.fk_cultivo_id
"#;

fn activity_error(msg: &'static str) -> AppError {
    let field = if msg.contains("description") {
        "descripcion"
    } else {
        "horasDedicadas"
    };
    AppError::validation(field, msg, format!("Actividad inválida: {}", msg))
}

impl ActivityService {
    pub fn new(db: PgPool, hub: NotificationHub) -> Self {
        Self { db, hub }
    }

    /// List activities, pending first then by assignment date
    pub async fn list(&self, filter: &ActivityFilter) -> AppResult<Vec<Actividad>> {
        let activities = sqlx::query_as::<_, Actividad>(&format!(
            r#"{}
            WHERE ($1::uuid IS NULL OR a.fk_cultivo_variedad_zona_id = $1)
              AND ($2::bool IS NULL OR a.estado = NOT $2)
            ORDER BY a.estado, a.fecha_asignacion, a.created_at
            "#,
            ACTIVIDAD_SELECT
        ))
        .bind(filter.cvz_id)
        .bind(filter.pendientes)
        .fetch_all(&self.db)
        .await?;

        Ok(activities)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Actividad> {
        sqlx::query_as::<_, Actividad>(&format!("{} WHERE a.id = $1", ACTIVIDAD_SELECT))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Actividad".to_string()))
    }

    /// Create an activity. The responsible user, if registered, is notified.
    pub async fn create(&self, input: CreateActivityInput) -> AppResult<Actividad> {
        validate_activity(&input.descripcion, input.horas_dedicadas).map_err(activity_error)?;

        let mut tx = self.db.begin().await?;

        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO actividades (
                fk_cultivo_variedad_zona_id, descripcion, fecha_asignacion,
                horas_dedicadas, observacion, dni_responsable
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(input.fk_cultivo_variedad_zona_id)
        .bind(input.descripcion.trim())
        .bind(input.fecha_asignacion)
        .bind(input.horas_dedicadas)
        .bind(&input.observacion)
        .bind(input.dni_responsable)
        .fetch_one(&mut *tx)
        .await?;

        let mut assigned = None;
        if let Some(dni) = input.dni_responsable {
            let responsible = sqlx::query_scalar::<_, Uuid>(
                "SELECT id FROM usuarios WHERE dni = $1 AND activo = true",
            )
            .bind(dni)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(user_id) = responsible {
                let draft = NotificationDraft {
                    tipo: NotificationType::Actividad,
                    titulo: "Nueva actividad asignada".to_string(),
                    mensaje: format!(
                        "Se le asignó la actividad \"{}\" para el {}",
                        input.descripcion.trim(),
                        input.fecha_asignacion.format("%d/%m/%Y")
                    ),
                    entidad: Some("actividades"),
                    entidad_id: Some(id),
                };
                assigned = Some(NotificationService::persist(&mut *tx, &draft, Some(user_id)).await?);
            }
        }

        tx.commit().await?;

        if let Some(notificacion) = assigned {
            self.hub.publish(HubEvent::Notification(notificacion));
        }
        self.hub.refresh("actividades");

        tracing::info!(activity_id = %id, "Activity created");
        self.get(id).await
    }

    pub async fn update(&self, id: Uuid, input: UpdateActivityInput) -> AppResult<Actividad> {
        let current = self.get(id).await?;

        let descripcion = input.descripcion.unwrap_or(current.descripcion);
        let horas = input.horas_dedicadas.unwrap_or(current.horas_dedicadas);
        validate_activity(&descripcion, horas).map_err(activity_error)?;

        sqlx::query(
            r#"
            UPDATE actividades
            SET descripcion = $2,
                fecha_asignacion = COALESCE($3, fecha_asignacion),
                horas_dedicadas = $4,
                estado = COALESCE($5, estado),
                observacion = COALESCE($6, observacion),
                dni_responsable = COALESCE($7, dni_responsable),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(descripcion.trim())
        .bind(input.fecha_asignacion)
        .bind(horas)
        .bind(input.estado)
        .bind(&input.observacion)
        .bind(input.dni_responsable)
        .execute(&self.db)
        .await?;

        self.hub.refresh("actividades");
        self.get(id).await
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM actividades WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Actividad".to_string()));
        }

        self.hub.refresh("actividades");
        tracing::info!(activity_id = %id, "Activity deleted");
        Ok(())
    }

    /// Mark an activity completed, optionally recording the hours spent
    pub async fn complete(&self, id: Uuid, input: CompleteActivityInput) -> AppResult<Actividad> {
        let current = self.get(id).await?;

        if current.status() == ActivityStatus::Completada {
            return Err(AppError::InvalidStateTransition(
                "Activity is already completed".to_string(),
            ));
        }

        let horas = input.horas_dedicadas.unwrap_or(current.horas_dedicadas);
        validate_activity(&current.descripcion, horas).map_err(activity_error)?;

        sqlx::query(
            r#"
            UPDATE actividades
            SET estado = true, horas_dedicadas = $2,
                observacion = COALESCE($3, observacion), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(horas)
        .bind(&input.observacion)
        .execute(&self.db)
        .await?;

        self.hub.refresh("actividades");
        tracing::info!(activity_id = %id, horas = %horas, "Activity completed");
        self.get(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_error_fields() {
        match activity_error("Activity description cannot be empty") {
            AppError::Validation { field, .. } => assert_eq!(field, "descripcion"),
            other => panic!("unexpected {:?}", other),
        }
        match activity_error("Hours cannot be negative") {
            AppError::Validation { field, .. } => assert_eq!(field, "horasDedicadas"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
