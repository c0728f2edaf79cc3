//! Sales drawn against harvests

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::notification::NotificationHub;
use shared::{sale_total, validate_amount, DateRange, HarvestBalance, MAX_AMOUNT};

/// Price must be non-negative and both figures must fit their columns
fn check_sale_line(cantidad: Decimal, precio_unitario: Decimal) -> AppResult<()> {
    if precio_unitario < Decimal::ZERO {
        return Err(AppError::validation(
            "precioUnitario",
            "Unit price cannot be negative",
            "El precio unitario no puede ser negativo",
        ));
    }
    validate_amount("cantidad", cantidad, MAX_AMOUNT)?;
    validate_amount("precioUnitario", precio_unitario, MAX_AMOUNT)?;
    Ok(())
}

#[derive(Clone)]
pub struct SaleService {
    db: PgPool,
    hub: NotificationHub,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Venta {
    pub id: Uuid,
    pub fk_cosecha_id: Uuid,
    pub fk_cultivo_variedad_zona_id: Uuid,
    pub cultivo_nombre: String,
    pub cantidad: Decimal,
    pub unidad_medida: String,
    pub precio_unitario: Decimal,
    pub fecha: NaiveDate,
    pub created_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub total: Decimal,
}

impl Venta {
    fn with_total(mut self) -> Self {
        self.total = sale_total(self.cantidad, self.precio_unitario);
        self
    }
}

/// Flat row for the CSV export
#[derive(Debug, Serialize)]
pub struct VentaCsvRow {
    pub fecha: String,
    pub cultivo: String,
    pub cantidad: Decimal,
    pub unidad: String,
    pub precio_unitario: Decimal,
    pub total: Decimal,
}

impl From<&Venta> for VentaCsvRow {
    fn from(v: &Venta) -> Self {
        Self {
            fecha: shared::format_date_es(v.fecha),
            cultivo: v.cultivo_nombre.clone(),
            cantidad: v.cantidad,
            unidad: v.unidad_medida.clone(),
            precio_unitario: v.precio_unitario,
            total: v.total,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleFilter {
    pub cosecha_id: Option<Uuid>,
    pub cvz_id: Option<Uuid>,
    pub desde: Option<NaiveDate>,
    pub hasta: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleInput {
    pub fk_cosecha_id: Uuid,
    pub cantidad: Decimal,
    pub unidad_medida: Option<String>,
    pub precio_unitario: Decimal,
    pub fecha: NaiveDate,
}

const VENTA_SELECT: &str = r#"
    SELECT v.id, v.fk_cosecha_id, co.fk_cultivo_variedad_zona_id, c.nombre AS cultivo_nombre,
           v.cantidad, v.unidad_medida, v.precio_unitario, v.fecha, v.created_at
    FROM ventas v
    JOIN cosechas co ON co.id = v.fk_cosecha_id
    JOIN cultivos_variedad_zona cvz ON cvz.id = co.fk_cultivo_variedad_zona_id
    JOIN cultivos c ON c.id = cvz.fk_cultivo_id
"#;

impl SaleService {
    pub fn new(db: PgPool, hub: NotificationHub) -> Self {
        Self { db, hub }
    }

    pub async fn list(&self, filter: &SaleFilter) -> AppResult<Vec<Venta>> {
        if let (Some(desde), Some(hasta)) = (filter.desde, filter.hasta) {
            DateRange::new(desde, hasta)?;
        }

        let sales = sqlx::query_as::<_, Venta>(&format!(
            r#"{}
            WHERE ($1::uuid IS NULL OR v.fk_cosecha_id = $1)
              AND ($2::uuid IS NULL OR co.fk_cultivo_variedad_zona_id = $2)
              AND ($3::date IS NULL OR v.fecha >= $3)
              AND ($4::date IS NULL OR v.fecha <= $4)
            ORDER BY v.fecha DESC, v.created_at DESC
            "#,
            VENTA_SELECT
        ))
        .bind(filter.cosecha_id)
        .bind(filter.cvz_id)
        .bind(filter.desde)
        .bind(filter.hasta)
        .fetch_all(&self.db)
        .await?;

        Ok(sales.into_iter().map(Venta::with_total).collect())
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Venta> {
        sqlx::query_as::<_, Venta>(&format!("{} WHERE v.id = $1", VENTA_SELECT))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .map(Venta::with_total)
            .ok_or_else(|| AppError::NotFound("Venta".to_string()))
    }

    /// Record a sale. The harvest row is locked while its availability is
    /// checked and decremented.
    pub async fn create(&self, input: CreateSaleInput) -> AppResult<Venta> {
        check_sale_line(input.cantidad, input.precio_unitario)?;

        let mut tx = self.db.begin().await?;

        let (cantidad, disponible, cerrado, unidad_cosecha) =
            sqlx::query_as::<_, (Decimal, Decimal, bool, String)>(
                r#"
                SELECT cantidad, cantidad_disponible, cerrado, unidad_medida
                FROM cosechas WHERE id = $1
                FOR UPDATE
                "#,
            )
            .bind(input.fk_cosecha_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Cosecha".to_string()))?;

        let balance = HarvestBalance {
            cantidad,
            cantidad_disponible: disponible,
            cerrado,
        }
        .reserve_sale(input.cantidad)?;

        let unidad = input
            .unidad_medida
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(&unidad_cosecha)
            .to_string();

        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO ventas (fk_cosecha_id, cantidad, unidad_medida, precio_unitario, fecha)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(input.fk_cosecha_id)
        .bind(input.cantidad)
        .bind(&unidad)
        .bind(input.precio_unitario)
        .bind(input.fecha)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE cosechas SET cantidad_disponible = $2, cerrado = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(input.fk_cosecha_id)
        .bind(balance.cantidad_disponible)
        .bind(balance.cerrado)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if balance.cerrado {
            tracing::info!(harvest_id = %input.fk_cosecha_id, "Harvest sold out and closed");
        }
        tracing::info!(
            sale_id = %id,
            cantidad = %input.cantidad,
            disponible = %balance.cantidad_disponible,
            "Sale recorded"
        );

        self.hub.refresh("ventas");
        self.hub.refresh("cosechas");
        self.get(id).await
    }

    /// Delete a sale and give its quantity back to the harvest
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let (cosecha_id, vendido) = sqlx::query_as::<_, (Uuid, Decimal)>(
            "SELECT fk_cosecha_id, cantidad FROM ventas WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Venta".to_string()))?;

        let (cantidad, disponible, cerrado) = sqlx::query_as::<_, (Decimal, Decimal, bool)>(
            "SELECT cantidad, cantidad_disponible, cerrado FROM cosechas WHERE id = $1 FOR UPDATE",
        )
        .bind(cosecha_id)
        .fetch_one(&mut *tx)
        .await?;

        let balance = HarvestBalance {
            cantidad,
            cantidad_disponible: disponible,
            cerrado,
        }
        .release_sale(vendido);

        sqlx::query("DELETE FROM ventas WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE cosechas SET cantidad_disponible = $2, cerrado = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(cosecha_id)
        .bind(balance.cantidad_disponible)
        .bind(balance.cerrado)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(sale_id = %id, harvest_id = %cosecha_id, "Sale deleted");
        self.hub.refresh("ventas");
        self.hub.refresh("cosechas");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sale_line_bounds() {
        assert!(check_sale_line(Decimal::from(12), Decimal::from(3500)).is_ok());
        assert!(check_sale_line(MAX_AMOUNT, MAX_AMOUNT).is_ok());

        let err = check_sale_line(Decimal::ONE, Decimal::NEGATIVE_ONE).unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "precioUnitario"));

        let huge = Decimal::from(10_000_000_000_000i64);
        let err = check_sale_line(huge, Decimal::ONE).unwrap_err();
        assert_eq!(err.status_and_detail().0, axum::http::StatusCode::BAD_REQUEST);
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "cantidad"));

        let err = check_sale_line(Decimal::ONE, huge).unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "precioUnitario"));
    }
}
