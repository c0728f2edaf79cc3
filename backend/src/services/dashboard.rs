//! Dashboard summary for the home screen

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::sensor::SensorService;
use crate::services::notification::NotificationHub;
use crate::services::user::UserService;
use shared::{activity_distribution, ActivityDistribution, FarmClock, LatestReading};

const PENDING_LIMIT: i64 = 5;
const DISTRIBUTION_DAYS: i64 = 30;

#[derive(Clone)]
pub struct DashboardService {
    db: PgPool,
    hub: NotificationHub,
    clock: FarmClock,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardQuery {
    pub zona_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub usuario: WelcomeUser,
    pub ultima_cosecha: Option<LastHarvest>,
    pub ultima_venta: Option<LastSale>,
    pub ultimo_movimiento: Option<LastMovement>,
    pub actividades_pendientes: Vec<PendingActivity>,
    pub metricas: ZoneMetrics,
    pub distribucion: ActivityDistribution,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomeUser {
    pub nombre: String,
    pub rol: String,
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LastHarvest {
    pub fecha: NaiveDate,
    pub cantidad: Decimal,
    pub unidad_medida: String,
    pub cultivo_nombre: String,
}

/// Sales of the most recent sale date
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastSale {
    pub fecha: NaiveDate,
    pub total: Decimal,
    pub cultivos: Vec<String>,
}

/// The most recent movement together with the other movements the same
/// user recorded with the same type on that local day
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMovement {
    pub usuario: Option<String>,
    pub fecha: DateTime<Utc>,
    pub tipo: String,
    pub productos: Vec<MovedProduct>,
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MovedProduct {
    pub nombre: String,
    pub cantidad: Decimal,
    pub unidad_medida: String,
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PendingActivity {
    pub id: Uuid,
    pub descripcion: String,
    pub fecha_asignacion: NaiveDate,
    pub cultivo_nombre: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneMetrics {
    pub zona_id: Option<Uuid>,
    pub zona_nombre: Option<String>,
    pub lecturas: Vec<LatestReading>,
}

#[derive(Debug, FromRow)]
struct SaleRow {
    fecha: NaiveDate,
    cantidad: Decimal,
    precio_unitario: Decimal,
    cultivo_nombre: String,
}

#[derive(Debug, FromRow)]
struct MovementHead {
    fk_usuario_id: Option<Uuid>,
    usuario_nombre: Option<String>,
    tipo: String,
    fecha: DateTime<Utc>,
}

impl DashboardService {
    pub fn new(db: PgPool, hub: NotificationHub, clock: FarmClock) -> Self {
        Self { db, hub, clock }
    }

    pub async fn summary(&self, user_id: Uuid, query: &DashboardQuery) -> AppResult<DashboardSummary> {
        let usuario = UserService::new(self.db.clone()).get(user_id).await?;

        Ok(DashboardSummary {
            usuario: WelcomeUser {
                nombre: usuario.nombre_completo(),
                rol: usuario.rol,
            },
            ultima_cosecha: self.last_harvest().await?,
            ultima_venta: self.last_sale().await?,
            ultimo_movimiento: self.last_movement().await?,
            actividades_pendientes: self.pending_activities().await?,
            metricas: self.zone_metrics(query.zona_id).await?,
            distribucion: self.distribution().await?,
        })
    }

    async fn last_harvest(&self) -> AppResult<Option<LastHarvest>> {
        let harvest = sqlx::query_as::<_, LastHarvest>(
            r#"
            SELECT co.fecha, co.cantidad, co.unidad_medida, c.nombre AS cultivo_nombre
            FROM cosechas co
            JOIN cultivos_variedad_zona cvz ON cvz.id = co.fk_cultivo_variedad_zona_id
            JOIN cultivos c ON c.id = cvz.fk_cultivo_id
            ORDER BY co.fecha DESC, co.created_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.db)
        .await?;

        Ok(harvest)
    }

    async fn last_sale(&self) -> AppResult<Option<LastSale>> {
        let rows = sqlx::query_as::<_, SaleRow>(
            r#"
            SELECT v.fecha, v.cantidad, v.precio_unitario, c.nombre AS cultivo_nombre
            FROM ventas v
            JOIN cosechas co ON co.id = v.fk_cosecha_id
            JOIN cultivos_variedad_zona cvz ON cvz.id = co.fk_cultivo_variedad_zona_id
            JOIN cultivos c ON c.id = cvz.fk_cultivo_id
            WHERE v.fecha = (SELECT MAX(fecha) FROM ventas)
            ORDER BY v.created_at
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let Some(fecha) = rows.first().map(|r| r.fecha) else {
            return Ok(None);
        };

        let total = rows
            .iter()
            .map(|r| shared::sale_total(r.cantidad, r.precio_unitario))
            .sum();
        let mut cultivos: Vec<String> = Vec::new();
        for row in rows {
            if !cultivos.contains(&row.cultivo_nombre) {
                cultivos.push(row.cultivo_nombre);
            }
        }

        Ok(Some(LastSale { fecha, total, cultivos }))
    }

    async fn last_movement(&self) -> AppResult<Option<LastMovement>> {
        let head = sqlx::query_as::<_, MovementHead>(
            r#"
            SELECT m.fk_usuario_id, u.nombres || ' ' || u.apellidos AS usuario_nombre, m.tipo, m.fecha
            FROM movimientos_inventario m
            LEFT JOIN usuarios u ON u.id = m.fk_usuario_id
            ORDER BY m.fecha DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.db)
        .await?;

        let Some(head) = head else {
            return Ok(None);
        };

        let day = self.clock.today(head.fecha);
        let (desde, hasta) = self.clock.utc_bounds(day, day);

        let productos = sqlx::query_as::<_, MovedProduct>(
            r#"
            SELECT p.nombre, m.cantidad, p.unidad_medida
            FROM movimientos_inventario m
            JOIN productos p ON p.id = m.fk_producto_id
            WHERE m.tipo = $1
              AND m.fk_usuario_id IS NOT DISTINCT FROM $2
              AND m.fecha >= $3 AND m.fecha < $4
            ORDER BY m.fecha DESC
            "#,
        )
        .bind(&head.tipo)
        .bind(head.fk_usuario_id)
        .bind(desde)
        .bind(hasta)
        .fetch_all(&self.db)
        .await?;

        Ok(Some(LastMovement {
            usuario: head.usuario_nombre,
            fecha: head.fecha,
            tipo: head.tipo,
            productos,
        }))
    }

    async fn pending_activities(&self) -> AppResult<Vec<PendingActivity>> {
        let activities = sqlx::query_as::<_, PendingActivity>(
            r#"
            SELECT a.id, a.descripcion, a.fecha_asignacion, c.nombre AS cultivo_nombre
            FROM actividades a
            JOIN cultivos_variedad_zona cvz ON cvz.id = a.fk_cultivo_variedad_zona_id
            JOIN cultivos c ON c.id = cvz.fk_cultivo_id
            WHERE a.estado = false
            ORDER BY a.fecha_asignacion, a.created_at
            LIMIT $1
            "#,
        )
        .bind(PENDING_LIMIT)
        .fetch_all(&self.db)
        .await?;

        Ok(activities)
    }

    /// Latest reading per key for a zone; without a zone, the zone that
    /// reported most recently
    async fn zone_metrics(&self, zona_id: Option<Uuid>) -> AppResult<ZoneMetrics> {
        let zona: Option<(Uuid, String)> = match zona_id {
            Some(id) => sqlx::query_as("SELECT id, nombre FROM zonas WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.db)
                .await?,
            None => sqlx::query_as(
                r#"
                SELECT z.id, z.nombre
                FROM mediciones_sensor m
                JOIN zonas z ON z.id = m.fk_zona_id
                ORDER BY m.fecha_medicion DESC
                LIMIT 1
                "#,
            )
            .fetch_optional(&self.db)
            .await?,
        };

        let Some((id, nombre)) = zona else {
            return Ok(ZoneMetrics {
                zona_id: None,
                zona_nombre: None,
                lecturas: Vec::new(),
            });
        };

        let sensors = SensorService::new(self.db.clone(), self.hub.clone(), self.clock);
        let lecturas = sensors
            .latest_by_zone(&[id])
            .await?
            .remove(&id)
            .unwrap_or_default();

        Ok(ZoneMetrics {
            zona_id: Some(id),
            zona_nombre: Some(nombre),
            lecturas,
        })
    }

    async fn distribution(&self) -> AppResult<ActivityDistribution> {
        let since = Utc::now() - Duration::days(DISTRIBUTION_DAYS);
        let since_date = self.clock.today(since);

        let (ventas, cosechas, actividades, movimientos): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM ventas WHERE fecha >= $1),
                (SELECT COUNT(*) FROM cosechas WHERE fecha >= $1),
                (SELECT COUNT(*) FROM actividades WHERE fecha_asignacion >= $1),
                (SELECT COUNT(*) FROM movimientos_inventario WHERE fecha >= $2)
            "#,
        )
        .bind(since_date)
        .bind(since)
        .fetch_one(&self.db)
        .await?;

        Ok(activity_distribution(
            ventas.max(0) as u64,
            cosechas.max(0) as u64,
            actividades.max(0) as u64,
            movimientos.max(0) as u64,
        ))
    }
}
