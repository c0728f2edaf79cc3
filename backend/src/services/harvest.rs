//! Harvest service
//!
//! Each create/update/delete also recomputes the planting's average yield.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::crop::recompute_yield;
use crate::services::notification::NotificationHub;
use shared::HarvestBalance;

#[derive(Clone)]
pub struct HarvestService {
    db: PgPool,
    hub: NotificationHub,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Cosecha {
    pub id: Uuid,
    pub fk_cultivo_variedad_zona_id: Uuid,
    pub cultivo_nombre: String,
    pub cantidad: Decimal,
    pub unidad_medida: String,
    pub cantidad_disponible: Decimal,
    pub cerrado: bool,
    pub fecha: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cosecha {
    pub fn balance(&self) -> HarvestBalance {
        HarvestBalance {
            cantidad: self.cantidad,
            cantidad_disponible: self.cantidad_disponible,
            cerrado: self.cerrado,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestFilter {
    pub cvz_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHarvestInput {
    pub fk_cultivo_variedad_zona_id: Uuid,
    pub cantidad: Decimal,
    pub unidad_medida: Option<String>,
    pub fecha: NaiveDate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateHarvestInput {
    pub cantidad: Option<Decimal>,
    pub unidad_medida: Option<String>,
    pub fecha: Option<NaiveDate>,
}

const COSECHA_SELECT: &str = r#"
    SELECT co.id, co.fk_cultivo_variedad_zona_id, c.nombre AS cultivo_nombre, co.cantidad,
           co.unidad_medida, co.cantidad_disponible, co.cerrado, co.fecha,
           co.created_at, co.updated_at
    FROM cosechas co
    JOIN cultivos_variedad_zona cvz ON cvz.id = co.fk_cultivo_variedad_zona_id
    JOIN cultivos c ON c.id = cvz.fk_cultivo_id
"#;

const DEFAULT_UNIT: &str = "kg";

impl HarvestService {
    pub fn new(db: PgPool, hub: NotificationHub) -> Self {
        Self { db, hub }
    }

    pub async fn list(&self, filter: &HarvestFilter) -> AppResult<Vec<Cosecha>> {
        let harvests = sqlx::query_as::<_, Cosecha>(&format!(
            r#"{}
            WHERE ($1::uuid IS NULL OR co.fk_cultivo_variedad_zona_id = $1)
            ORDER BY co.fecha DESC, co.created_at DESC
            "#,
            COSECHA_SELECT
        ))
        .bind(filter.cvz_id)
        .fetch_all(&self.db)
        .await?;

        Ok(harvests)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Cosecha> {
        sqlx::query_as::<_, Cosecha>(&format!("{} WHERE co.id = $1", COSECHA_SELECT))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Cosecha".to_string()))
    }

    /// Record a harvest with its whole quantity available for sale
    pub async fn create(&self, input: CreateHarvestInput) -> AppResult<Cosecha> {
        let balance = HarvestBalance::new(input.cantidad)?;
        let unidad = input
            .unidad_medida
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_UNIT);

        let mut tx = self.db.begin().await?;

        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO cosechas (fk_cultivo_variedad_zona_id, cantidad, unidad_medida, cantidad_disponible, fecha)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(input.fk_cultivo_variedad_zona_id)
        .bind(balance.cantidad)
        .bind(unidad)
        .bind(balance.cantidad_disponible)
        .bind(input.fecha)
        .fetch_one(&mut *tx)
        .await?;

        recompute_yield(&mut *tx, input.fk_cultivo_variedad_zona_id).await?;

        tx.commit().await?;

        self.hub.refresh("cosechas");
        tracing::info!(harvest_id = %id, cantidad = %balance.cantidad, "Harvest recorded");
        self.get(id).await
    }

    /// Update a harvest. A quantity change shifts availability by the same
    /// delta and may not drop below what was already sold.
    pub async fn update(&self, id: Uuid, input: UpdateHarvestInput) -> AppResult<Cosecha> {
        let mut tx = self.db.begin().await?;

        let (cvz_id, cantidad, disponible, cerrado) =
            sqlx::query_as::<_, (Uuid, Decimal, Decimal, bool)>(
                r#"
                SELECT fk_cultivo_variedad_zona_id, cantidad, cantidad_disponible, cerrado
                FROM cosechas WHERE id = $1
                FOR UPDATE
                "#,
            )
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Cosecha".to_string()))?;

        let current = HarvestBalance {
            cantidad,
            cantidad_disponible: disponible,
            cerrado,
        };
        let next = match input.cantidad {
            Some(new_total) => current.resize(new_total)?,
            None => current,
        };

        sqlx::query(
            r#"
            UPDATE cosechas
            SET cantidad = $2, cantidad_disponible = $3, cerrado = $4,
                unidad_medida = COALESCE($5, unidad_medida),
                fecha = COALESCE($6, fecha),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(next.cantidad)
        .bind(next.cantidad_disponible)
        .bind(next.cerrado)
        .bind(input.unidad_medida.as_deref().map(str::trim))
        .bind(input.fecha)
        .execute(&mut *tx)
        .await?;

        recompute_yield(&mut *tx, cvz_id).await?;

        tx.commit().await?;

        self.hub.refresh("cosechas");
        tracing::info!(harvest_id = %id, cantidad = %next.cantidad, "Harvest updated");
        self.get(id).await
    }

    /// Delete a harvest that has no sales
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let cvz_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT fk_cultivo_variedad_zona_id FROM cosechas WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Cosecha".to_string()))?;

        let sales = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM ventas WHERE fk_cosecha_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        if sales > 0 {
            return Err(AppError::Conflict {
                resource: "cosecha".to_string(),
                message: format!("Harvest has {} sale(s) and cannot be deleted", sales),
                message_es: format!("La cosecha tiene {} venta(s) y no se puede eliminar", sales),
            });
        }

        sqlx::query("DELETE FROM cosechas WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        recompute_yield(&mut *tx, cvz_id).await?;

        tx.commit().await?;

        self.hub.refresh("cosechas");
        tracing::info!(harvest_id = %id, "Harvest deleted");
        Ok(())
    }

    /// Close a harvest to further sales
    pub async fn close(&self, id: Uuid) -> AppResult<Cosecha> {
        let mut tx = self.db.begin().await?;

        let (cantidad, disponible, cerrado) = sqlx::query_as::<_, (Decimal, Decimal, bool)>(
            "SELECT cantidad, cantidad_disponible, cerrado FROM cosechas WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Cosecha".to_string()))?;

        let closed = HarvestBalance {
            cantidad,
            cantidad_disponible: disponible,
            cerrado,
        }
        .close()?;

        sqlx::query("UPDATE cosechas SET cerrado = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(closed.cerrado)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.hub.refresh("cosechas");
        tracing::info!(harvest_id = %id, disponible = %closed.cantidad_disponible, "Harvest closed");
        self.get(id).await
    }
}
