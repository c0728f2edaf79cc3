//! Inventory service for products and stock movements
//!
//! Stock is kept in base units: a movement of `cantidad` presentations
//! moves `cantidad × capacidad_presentacion` units.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::notification::{HubEvent, NotificationHub, NotificationService};
use shared::{
    apply_movement, low_stock_draft, validate_amount, DateRange, FarmClock, MovementType, MAX_AMOUNT,
    MAX_CAPACITY,
};

/// Inventory service
#[derive(Clone)]
pub struct InventoryService {
    db: PgPool,
    hub: NotificationHub,
    clock: FarmClock,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Producto {
    pub id: Uuid,
    pub nombre: String,
    pub descripcion: Option<String>,
    pub sku: Option<String>,
    pub unidad_medida: String,
    pub capacidad_presentacion: Decimal,
    pub precio_compra: Option<Decimal>,
    pub stock: Decimal,
    pub stock_minimo: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MovimientoInventario {
    pub id: Uuid,
    pub fk_producto_id: Uuid,
    pub producto_nombre: String,
    pub unidad_medida: String,
    #[sqlx(try_from = "String")]
    pub tipo: MovementType,
    pub cantidad: Decimal,
    pub unidades_base: Decimal,
    pub stock_resultante: Decimal,
    pub observacion: Option<String>,
    pub fk_usuario_id: Option<Uuid>,
    pub usuario_nombre: Option<String>,
    pub fk_actividad_id: Option<Uuid>,
    pub fecha: DateTime<Utc>,
}

/// Flat row for the CSV export
#[derive(Debug, Serialize)]
pub struct MovimientoCsvRow {
    pub fecha: String,
    pub producto: String,
    pub tipo: String,
    pub cantidad: Decimal,
    pub unidades_base: Decimal,
    pub unidad: String,
    pub stock_resultante: Decimal,
    pub usuario: String,
    pub observacion: String,
}

impl MovimientoCsvRow {
    pub fn new(m: &MovimientoInventario, clock: &FarmClock) -> Self {
        Self {
            fecha: clock.local(m.fecha).format("%d/%m/%Y %H:%M").to_string(),
            producto: m.producto_nombre.clone(),
            tipo: m.tipo.to_string(),
            cantidad: m.cantidad,
            unidades_base: m.unidades_base,
            unidad: m.unidad_medida.clone(),
            stock_resultante: m.stock_resultante,
            usuario: m.usuario_nombre.clone().unwrap_or_default(),
            observacion: m.observacion.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 150, message = "Product name must be 1-150 characters"))]
    pub nombre: String,
    pub descripcion: Option<String>,
    #[validate(length(min = 1, max = 50, message = "SKU must be 1-50 characters"))]
    pub sku: Option<String>,
    pub unidad_medida: Option<String>,
    pub capacidad_presentacion: Option<Decimal>,
    pub precio_compra: Option<Decimal>,
    pub stock_minimo: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 150, message = "Product name must be 1-150 characters"))]
    pub nombre: Option<String>,
    pub descripcion: Option<String>,
    #[validate(length(min = 1, max = 50, message = "SKU must be 1-50 characters"))]
    pub sku: Option<String>,
    pub unidad_medida: Option<String>,
    pub capacidad_presentacion: Option<Decimal>,
    pub precio_compra: Option<Decimal>,
    pub stock_minimo: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMovementInput {
    pub fk_producto_id: Uuid,
    pub tipo: MovementType,
    /// Presentations moved; signed for adjustments
    pub cantidad: Decimal,
    pub observacion: Option<String>,
    pub fk_actividad_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilter {
    pub buscar: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementFilter {
    pub producto_id: Option<Uuid>,
    pub tipo: Option<MovementType>,
    pub desde: Option<NaiveDate>,
    pub hasta: Option<NaiveDate>,
}

const PRODUCTO_COLUMNS: &str = r#"
    id, nombre, descripcion, sku, unidad_medida, capacidad_presentacion, precio_compra,
    stock, stock_minimo, created_at, updated_at
"#;

const MOVIMIENTO_SELECT: &str = r#"
    SELECT m.id, m.fk_producto_id, p.nombre AS producto_nombre, p.unidad_medida, m.tipo,
           m.cantidad, m.unidades_base, m.stock_resultante, m.observacion, m.fk_usuario_id,
           CASE WHEN u.id IS NULL THEN NULL ELSE u.nombres || ' ' || u.apellidos END AS usuario_nombre,
           m.fk_actividad_id, m.fecha
    FROM movimientos_inventario m
    JOIN productos p ON p.id = m.fk_producto_id
    LEFT JOIN usuarios u ON u.id = m.fk_usuario_id
"#;

fn check_amounts(
    capacidad: Option<Decimal>,
    precio: Option<Decimal>,
    minimo: Option<Decimal>,
) -> AppResult<()> {
    if matches!(capacidad, Some(c) if c <= Decimal::ZERO) {
        return Err(AppError::validation(
            "capacidadPresentacion",
            "Presentation capacity must be positive",
            "La capacidad de presentación debe ser positiva",
        ));
    }
    if matches!(precio, Some(p) if p < Decimal::ZERO) {
        return Err(AppError::validation(
            "precioCompra",
            "Purchase price cannot be negative",
            "El precio de compra no puede ser negativo",
        ));
    }
    if matches!(minimo, Some(m) if m < Decimal::ZERO) {
        return Err(AppError::validation(
            "stockMinimo",
            "Minimum stock cannot be negative",
            "El stock mínimo no puede ser negativo",
        ));
    }
    if let Some(c) = capacidad {
        validate_amount("capacidadPresentacion", c, MAX_CAPACITY)?;
    }
    if let Some(p) = precio {
        validate_amount("precioCompra", p, MAX_AMOUNT)?;
    }
    if let Some(m) = minimo {
        validate_amount("stockMinimo", m, MAX_AMOUNT)?;
    }
    Ok(())
}

impl InventoryService {
    pub fn new(db: PgPool, hub: NotificationHub, clock: FarmClock) -> Self {
        Self { db, hub, clock }
    }

    // ------------------------------------------------------------------
    // Products
    // ------------------------------------------------------------------

    pub async fn list_products(&self, filter: &ProductFilter) -> AppResult<Vec<Producto>> {
        let pattern = filter
            .buscar
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let products = sqlx::query_as::<_, Producto>(&format!(
            r#"
            SELECT {} FROM productos
            WHERE ($1::text IS NULL OR nombre ILIKE $1 OR sku ILIKE $1)
            ORDER BY nombre
            "#,
            PRODUCTO_COLUMNS
        ))
        .bind(pattern)
        .fetch_all(&self.db)
        .await?;

        Ok(products)
    }

    /// Products at or below their minimum stock
    pub async fn low_stock(&self) -> AppResult<Vec<Producto>> {
        let products = sqlx::query_as::<_, Producto>(&format!(
            "SELECT {} FROM productos WHERE stock <= stock_minimo ORDER BY stock - stock_minimo, nombre",
            PRODUCTO_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(products)
    }

    pub async fn get_product(&self, id: Uuid) -> AppResult<Producto> {
        sqlx::query_as::<_, Producto>(&format!(
            "SELECT {} FROM productos WHERE id = $1",
            PRODUCTO_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Producto".to_string()))
    }

    pub async fn create_product(&self, input: CreateProductInput) -> AppResult<Producto> {
        input.validate()?;
        check_amounts(input.capacidad_presentacion, input.precio_compra, input.stock_minimo)?;

        let product = sqlx::query_as::<_, Producto>(&format!(
            r#"
            INSERT INTO productos (
                nombre, descripcion, sku, unidad_medida, capacidad_presentacion,
                precio_compra, stock_minimo
            )
            VALUES ($1, $2, $3, COALESCE($4, 'unidad'), COALESCE($5, 1.00), $6, COALESCE($7, 0))
            RETURNING {}
            "#,
            PRODUCTO_COLUMNS
        ))
        .bind(input.nombre.trim())
        .bind(&input.descripcion)
        .bind(input.sku.as_deref().map(str::trim))
        .bind(input.unidad_medida.as_deref().map(str::trim))
        .bind(input.capacidad_presentacion)
        .bind(input.precio_compra)
        .bind(input.stock_minimo)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(product_id = %product.id, nombre = %product.nombre, "Product created");
        self.hub.refresh("productos");
        Ok(product)
    }

    pub async fn update_product(&self, id: Uuid, input: UpdateProductInput) -> AppResult<Producto> {
        input.validate()?;
        check_amounts(input.capacidad_presentacion, input.precio_compra, input.stock_minimo)?;

        let product = sqlx::query_as::<_, Producto>(&format!(
            r#"
            UPDATE productos
            SET nombre = COALESCE($2, nombre),
                descripcion = COALESCE($3, descripcion),
                sku = COALESCE($4, sku),
                unidad_medida = COALESCE($5, unidad_medida),
                capacidad_presentacion = COALESCE($6, capacidad_presentacion),
                precio_compra = COALESCE($7, precio_compra),
                stock_minimo = COALESCE($8, stock_minimo),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PRODUCTO_COLUMNS
        ))
        .bind(id)
        .bind(input.nombre.as_deref().map(str::trim))
        .bind(&input.descripcion)
        .bind(input.sku.as_deref().map(str::trim))
        .bind(input.unidad_medida.as_deref().map(str::trim))
        .bind(input.capacidad_presentacion)
        .bind(input.precio_compra)
        .bind(input.stock_minimo)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Producto".to_string()))?;

        self.hub.refresh("productos");
        Ok(product)
    }

    /// Delete a product. Products with recorded movements are kept for history.
    pub async fn delete_product(&self, id: Uuid) -> AppResult<()> {
        let movements = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM movimientos_inventario WHERE fk_producto_id = $1",
        )
        .bind(id)
        .fetch_one(&self.db)
        .await?;

        if movements > 0 {
            return Err(AppError::Conflict {
                resource: "producto".to_string(),
                message: "Product has inventory movements and cannot be deleted".to_string(),
                message_es: "El producto tiene movimientos de inventario y no se puede eliminar"
                    .to_string(),
            });
        }

        let result = sqlx::query("DELETE FROM productos WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Producto".to_string()));
        }

        self.hub.refresh("productos");
        tracing::info!(product_id = %id, "Product deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Movements
    // ------------------------------------------------------------------

    /// Record a stock movement. The product row stays locked until the new
    /// stock and the movement are written.
    pub async fn record_movement(
        &self,
        user_id: Uuid,
        input: RecordMovementInput,
    ) -> AppResult<MovimientoInventario> {
        let mut tx = self.db.begin().await?;

        let product = sqlx::query_as::<_, Producto>(&format!(
            "SELECT {} FROM productos WHERE id = $1 FOR UPDATE",
            PRODUCTO_COLUMNS
        ))
        .bind(input.fk_producto_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Producto".to_string()))?;

        let outcome = apply_movement(
            input.tipo,
            input.cantidad,
            product.capacidad_presentacion,
            product.stock,
            product.stock_minimo,
        )?;

        let movement_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO movimientos_inventario (
                fk_producto_id, tipo, cantidad, unidades_base, stock_resultante,
                observacion, fk_usuario_id, fk_actividad_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(product.id)
        .bind(input.tipo.as_str())
        .bind(input.cantidad)
        .bind(outcome.unidades_base)
        .bind(outcome.stock_resultante)
        .bind(&input.observacion)
        .bind(user_id)
        .bind(input.fk_actividad_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE productos SET stock = $2, updated_at = NOW() WHERE id = $1")
            .bind(product.id)
            .bind(outcome.stock_resultante)
            .execute(&mut *tx)
            .await?;

        let alert = if outcome.bajo_stock {
            let draft = low_stock_draft(
                product.id,
                &product.nombre,
                outcome.stock_resultante,
                product.stock_minimo,
                &product.unidad_medida,
            );
            Some(NotificationService::persist(&mut *tx, &draft, None).await?)
        } else {
            None
        };

        tx.commit().await?;

        tracing::info!(
            movement_id = %movement_id,
            product_id = %product.id,
            tipo = %input.tipo,
            delta = %outcome.delta,
            stock = %outcome.stock_resultante,
            "Inventory movement recorded"
        );

        if let Some(notificacion) = alert {
            tracing::warn!(
                product_id = %product.id,
                stock = %outcome.stock_resultante,
                minimo = %product.stock_minimo,
                "Product at or below minimum stock"
            );
            self.hub.publish(HubEvent::Notification(notificacion));
        }
        self.hub.refresh("productos");
        self.hub.refresh("movimientos-inventario");

        self.get_movement(movement_id).await
    }

    pub async fn get_movement(&self, id: Uuid) -> AppResult<MovimientoInventario> {
        sqlx::query_as::<_, MovimientoInventario>(&format!("{} WHERE m.id = $1", MOVIMIENTO_SELECT))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Movimiento de inventario".to_string()))
    }

    /// Movements, newest first. Dates are farm-local days, both inclusive.
    pub async fn list_movements(&self, filter: &MovementFilter) -> AppResult<Vec<MovimientoInventario>> {
        let (desde, hasta) = match (filter.desde, filter.hasta) {
            (Some(d), Some(h)) => {
                DateRange::new(d, h)?;
                let (from, to) = self.clock.utc_bounds(d, h);
                (Some(from), Some(to))
            }
            (Some(d), None) => (Some(self.clock.utc_bounds(d, d).0), None),
            (None, Some(h)) => (None, Some(self.clock.utc_bounds(h, h).1)),
            (None, None) => (None, None),
        };

        let movements = sqlx::query_as::<_, MovimientoInventario>(&format!(
            r#"{}
            WHERE ($1::uuid IS NULL OR m.fk_producto_id = $1)
              AND ($2::text IS NULL OR m.tipo = $2)
              AND ($3::timestamptz IS NULL OR m.fecha >= $3)
              AND ($4::timestamptz IS NULL OR m.fecha < $4)
            ORDER BY m.fecha DESC
            "#,
            MOVIMIENTO_SELECT
        ))
        .bind(filter.producto_id)
        .bind(filter.tipo.map(|t| t.as_str()))
        .bind(desde)
        .bind(hasta)
        .fetch_all(&self.db)
        .await?;

        Ok(movements)
    }

    pub fn csv_rows(&self, movements: &[MovimientoInventario]) -> Vec<MovimientoCsvRow> {
        movements
            .iter()
            .map(|m| MovimientoCsvRow::new(m, &self.clock))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_amounts() {
        assert!(check_amounts(Some(Decimal::ONE), Some(Decimal::ZERO), Some(Decimal::ZERO)).is_ok());
        assert!(check_amounts(None, None, None).is_ok());
        assert!(check_amounts(Some(Decimal::ZERO), None, None).is_err());
        assert!(check_amounts(None, Some(Decimal::NEGATIVE_ONE), None).is_err());
        assert!(check_amounts(None, None, Some(Decimal::NEGATIVE_ONE)).is_err());
    }

    #[test]
    fn test_check_amounts_rejects_values_columns_cannot_hold() {
        let cent = Decimal::new(1, 2);
        assert!(check_amounts(Some(MAX_CAPACITY), Some(MAX_AMOUNT), Some(MAX_AMOUNT)).is_ok());

        let err = check_amounts(Some(MAX_CAPACITY + cent), None, None).unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "capacidadPresentacion"));

        let err = check_amounts(None, Some(MAX_AMOUNT + cent), None).unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "precioCompra"));

        let err = check_amounts(None, None, Some(Decimal::from(10_000_000_000_000i64))).unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "stockMinimo"));
    }
}
