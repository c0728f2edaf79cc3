//! Crop service: catalog (types, varieties, phenological stages) and crop
//! plantings (a crop sown as a variety in a zone)

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use shared::{
    average_yield, crop_age_days, finalize_date, validate_ficha, validate_plant_count, CropStatus,
    FarmClock,
};

/// Crop management service
#[derive(Clone)]
pub struct CropService {
    db: PgPool,
    clock: FarmClock,
}

// ============================================================================
// Catalog types
// ============================================================================

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TipoCultivo {
    pub id: Uuid,
    pub nombre: String,
    pub descripcion: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Variedad {
    pub id: Uuid,
    pub nombre: String,
    pub fk_tipo_cultivo_id: Uuid,
    pub tipo_cultivo_nombre: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EstadoFenologico {
    pub id: Uuid,
    pub nombre: String,
    pub descripcion: Option<String>,
    pub orden: i32,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TipoCultivoInput {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub nombre: String,
    pub descripcion: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VariedadInput {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub nombre: String,
    pub fk_tipo_cultivo_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EstadoFenologicoInput {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub nombre: String,
    pub descripcion: Option<String>,
    #[validate(range(min = 0, message = "Order cannot be negative"))]
    pub orden: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariedadFilter {
    pub tipo_cultivo_id: Option<Uuid>,
}

// ============================================================================
// Crop plantings
// ============================================================================

/// Joined view of a crop planting
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Cultivo {
    /// Planting (cultivo-variedad-zona) id
    pub id: Uuid,
    pub fk_cultivo_id: Uuid,
    pub ficha: String,
    pub lote: Option<String>,
    pub nombre: String,
    pub fecha_siembra: NaiveDate,
    pub fecha_cosecha: Option<NaiveDate>,
    pub estado: i16,
    pub fk_variedad_id: Uuid,
    pub variedad_nombre: String,
    pub fk_tipo_cultivo_id: Uuid,
    pub tipo_cultivo_nombre: String,
    pub fk_zona_id: Uuid,
    pub zona_nombre: String,
    pub cantidad_plantas_inicial: Option<i32>,
    pub cantidad_plantas_actual: Option<i32>,
    pub fk_estado_fenologico_id: Option<Uuid>,
    pub estado_fenologico_nombre: Option<String>,
    pub area_terreno: Option<Decimal>,
    pub rendimiento_promedio: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub edad_dias: i64,
}

impl Cultivo {
    pub fn status(&self) -> CropStatus {
        CropStatus::from_code(self.estado)
    }

    fn with_age(mut self, today: NaiveDate) -> Self {
        let harvest = match self.status() {
            CropStatus::Finalizado => self.fecha_cosecha,
            CropStatus::EnCurso => None,
        };
        self.edad_dias = crop_age_days(self.fecha_siembra, harvest, today);
        self
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CultivoFilter {
    pub buscar: Option<String>,
    pub estado: Option<i16>,
    pub zona_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCultivoInput {
    pub ficha: String,
    #[validate(length(max = 50, message = "Lot must be at most 50 characters"))]
    pub lote: Option<String>,
    #[validate(length(min = 1, max = 150, message = "Name must be 1-150 characters"))]
    pub nombre: String,
    pub fecha_siembra: NaiveDate,
    pub fecha_cosecha: Option<NaiveDate>,
    pub fk_variedad_id: Uuid,
    pub fk_zona_id: Uuid,
    #[validate(range(min = 0, message = "Plant count cannot be negative"))]
    pub cantidad_plantas_inicial: Option<i32>,
    pub fk_estado_fenologico_id: Option<Uuid>,
    pub area_terreno: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCultivoInput {
    pub ficha: Option<String>,
    #[validate(length(max = 50, message = "Lot must be at most 50 characters"))]
    pub lote: Option<String>,
    #[validate(length(min = 1, max = 150, message = "Name must be 1-150 characters"))]
    pub nombre: Option<String>,
    pub fecha_siembra: Option<NaiveDate>,
    pub fecha_cosecha: Option<NaiveDate>,
    pub fk_variedad_id: Option<Uuid>,
    pub fk_zona_id: Option<Uuid>,
    #[validate(range(min = 0, message = "Plant count cannot be negative"))]
    pub cantidad_plantas_inicial: Option<i32>,
    pub area_terreno: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeInput {
    pub fecha_cosecha: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhenologyInput {
    pub fk_estado_fenologico_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantCountInput {
    pub cantidad_plantas_actual: i32,
}

const CULTIVO_SELECT: &str = r#"
    SELECT cvz.id, c.id AS fk_cultivo_id, c.ficha, c.lote, c.nombre,
           c.fecha_siembra, c.fecha_cosecha, c.estado,
           v.id AS fk_variedad_id, v.nombre AS variedad_nombre,
           t.id AS fk_tipo_cultivo_id, t.nombre AS tipo_cultivo_nombre,
           z.id AS fk_zona_id, z.nombre AS zona_nombre,
           cvz.cantidad_plantas_inicial, cvz.cantidad_plantas_actual,
           cvz.fk_estado_fenologico_id, ef.nombre AS estado_fenologico_nombre,
           cvz.area_terreno, cvz.rendimiento_promedio,
           cvz.created_at, GREATEST(cvz.updated_at, c.updated_at) AS updated_at
    FROM cultivos_variedad_zona cvz
    JOIN cultivos c ON c.id = cvz.fk_cultivo_id
    JOIN variedades v ON v.id = cvz.fk_variedad_id
    JOIN tipos_cultivo t ON t.id = v.fk_tipo_cultivo_id
    JOIN zonas z ON z.id = cvz.fk_zona_id
    LEFT JOIN estados_fenologicos ef ON ef.id = cvz.fk_estado_fenologico_id
"#;

fn ficha_error(msg: &str) -> AppError {
    AppError::validation("ficha", msg, format!("Ficha inválida: {}", msg))
}

fn non_negative_area(area: Option<Decimal>) -> AppResult<()> {
    match area {
        Some(a) if a < Decimal::ZERO => Err(AppError::validation(
            "areaTerreno",
            "Area cannot be negative",
            "El área no puede ser negativa",
        )),
        _ => Ok(()),
    }
}

/// Recompute a planting's average yield from its harvests. Runs inside the
/// caller's transaction so it sees uncommitted harvest changes.
pub async fn recompute_yield(conn: &mut PgConnection, cvz_id: Uuid) -> AppResult<Option<Decimal>> {
    let (total, plants) = sqlx::query_as::<_, (Decimal, Option<i32>)>(
        r#"
        SELECT COALESCE((SELECT SUM(cantidad) FROM cosechas WHERE fk_cultivo_variedad_zona_id = $1), 0),
               cantidad_plantas_actual
        FROM cultivos_variedad_zona
        WHERE id = $1
        "#,
    )
    .bind(cvz_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Cultivo".to_string()))?;

    let rendimiento = average_yield(total, plants);

    sqlx::query(
        "UPDATE cultivos_variedad_zona SET rendimiento_promedio = $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(cvz_id)
    .bind(rendimiento)
    .execute(&mut *conn)
    .await?;

    tracing::debug!(cvz_id = %cvz_id, rendimiento = ?rendimiento, "Average yield recomputed");
    Ok(rendimiento)
}

impl CropService {
    pub fn new(db: PgPool, clock: FarmClock) -> Self {
        Self { db, clock }
    }

    fn today(&self) -> NaiveDate {
        self.clock.today(Utc::now())
    }

    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    pub async fn list_crop_types(&self) -> AppResult<Vec<TipoCultivo>> {
        let types = sqlx::query_as::<_, TipoCultivo>(
            "SELECT id, nombre, descripcion FROM tipos_cultivo ORDER BY nombre",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(types)
    }

    pub async fn create_crop_type(&self, input: TipoCultivoInput) -> AppResult<TipoCultivo> {
        input.validate()?;
        let created = sqlx::query_as::<_, TipoCultivo>(
            "INSERT INTO tipos_cultivo (nombre, descripcion) VALUES ($1, $2) RETURNING id, nombre, descripcion",
        )
        .bind(input.nombre.trim())
        .bind(&input.descripcion)
        .fetch_one(&self.db)
        .await?;
        Ok(created)
    }

    pub async fn update_crop_type(&self, id: Uuid, input: TipoCultivoInput) -> AppResult<TipoCultivo> {
        input.validate()?;
        sqlx::query_as::<_, TipoCultivo>(
            r#"
            UPDATE tipos_cultivo SET nombre = $2, descripcion = $3
            WHERE id = $1
            RETURNING id, nombre, descripcion
            "#,
        )
        .bind(id)
        .bind(input.nombre.trim())
        .bind(&input.descripcion)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Tipo de cultivo".to_string()))
    }

    pub async fn delete_crop_type(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM tipos_cultivo WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Tipo de cultivo".to_string()));
        }
        Ok(())
    }

    pub async fn list_varieties(&self, filter: &VariedadFilter) -> AppResult<Vec<Variedad>> {
        let varieties = sqlx::query_as::<_, Variedad>(
            r#"
            SELECT v.id, v.nombre, v.fk_tipo_cultivo_id, t.nombre AS tipo_cultivo_nombre
            FROM variedades v
            JOIN tipos_cultivo t ON t.id = v.fk_tipo_cultivo_id
            WHERE ($1::uuid IS NULL OR v.fk_tipo_cultivo_id = $1)
            ORDER BY t.nombre, v.nombre
            "#,
        )
        .bind(filter.tipo_cultivo_id)
        .fetch_all(&self.db)
        .await?;
        Ok(varieties)
    }

    async fn get_variety(&self, id: Uuid) -> AppResult<Variedad> {
        sqlx::query_as::<_, Variedad>(
            r#"
            SELECT v.id, v.nombre, v.fk_tipo_cultivo_id, t.nombre AS tipo_cultivo_nombre
            FROM variedades v
            JOIN tipos_cultivo t ON t.id = v.fk_tipo_cultivo_id
            WHERE v.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Variedad".to_string()))
    }

    pub async fn create_variety(&self, input: VariedadInput) -> AppResult<Variedad> {
        input.validate()?;
        let id = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO variedades (nombre, fk_tipo_cultivo_id) VALUES ($1, $2) RETURNING id",
        )
        .bind(input.nombre.trim())
        .bind(input.fk_tipo_cultivo_id)
        .fetch_one(&self.db)
        .await?;
        self.get_variety(id).await
    }

    pub async fn update_variety(&self, id: Uuid, input: VariedadInput) -> AppResult<Variedad> {
        input.validate()?;
        let result = sqlx::query(
            "UPDATE variedades SET nombre = $2, fk_tipo_cultivo_id = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(input.nombre.trim())
        .bind(input.fk_tipo_cultivo_id)
        .execute(&self.db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Variedad".to_string()));
        }
        self.get_variety(id).await
    }

    pub async fn delete_variety(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM variedades WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Variedad".to_string()));
        }
        Ok(())
    }

    pub async fn list_stages(&self) -> AppResult<Vec<EstadoFenologico>> {
        let stages = sqlx::query_as::<_, EstadoFenologico>(
            "SELECT id, nombre, descripcion, orden FROM estados_fenologicos ORDER BY orden, nombre",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(stages)
    }

    pub async fn create_stage(&self, input: EstadoFenologicoInput) -> AppResult<EstadoFenologico> {
        input.validate()?;
        let stage = sqlx::query_as::<_, EstadoFenologico>(
            r#"
            INSERT INTO estados_fenologicos (nombre, descripcion, orden)
            VALUES ($1, $2, $3)
            RETURNING id, nombre, descripcion, orden
            "#,
        )
        .bind(input.nombre.trim())
        .bind(&input.descripcion)
        .bind(input.orden.unwrap_or(0))
        .fetch_one(&self.db)
        .await?;
        Ok(stage)
    }

    pub async fn update_stage(&self, id: Uuid, input: EstadoFenologicoInput) -> AppResult<EstadoFenologico> {
        input.validate()?;
        sqlx::query_as::<_, EstadoFenologico>(
            r#"
            UPDATE estados_fenologicos
            SET nombre = $2, descripcion = $3, orden = COALESCE($4, orden)
            WHERE id = $1
            RETURNING id, nombre, descripcion, orden
            "#,
        )
        .bind(id)
        .bind(input.nombre.trim())
        .bind(&input.descripcion)
        .bind(input.orden)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Estado fenológico".to_string()))
    }

    pub async fn delete_stage(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM estados_fenologicos WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Estado fenológico".to_string()));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Plantings
    // ------------------------------------------------------------------

    /// List plantings with catalog names and computed age
    pub async fn list(&self, filter: &CultivoFilter) -> AppResult<Vec<Cultivo>> {
        let pattern = filter
            .buscar
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let rows = sqlx::query_as::<_, Cultivo>(&format!(
            r#"{}
            WHERE ($1::text IS NULL
                   OR c.ficha ILIKE $1 OR c.nombre ILIKE $1 OR c.lote ILIKE $1
                   OR v.nombre ILIKE $1 OR t.nombre ILIKE $1 OR z.nombre ILIKE $1)
              AND ($2::smallint IS NULL OR c.estado = $2)
              AND ($3::uuid IS NULL OR cvz.fk_zona_id = $3)
            ORDER BY c.fecha_siembra DESC, c.nombre
            "#,
            CULTIVO_SELECT
        ))
        .bind(pattern)
        .bind(filter.estado)
        .bind(filter.zona_id)
        .fetch_all(&self.db)
        .await?;

        let today = self.today();
        Ok(rows.into_iter().map(|c| c.with_age(today)).collect())
    }

    /// Plantings in one zone
    pub async fn list_by_zone(&self, zona_id: Uuid) -> AppResult<Vec<Cultivo>> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM zonas WHERE id = $1)")
            .bind(zona_id)
            .fetch_one(&self.db)
            .await?;
        if !exists {
            return Err(AppError::NotFound("Zona".to_string()));
        }

        self.list(&CultivoFilter {
            zona_id: Some(zona_id),
            ..Default::default()
        })
        .await
    }

    pub async fn get(&self, cvz_id: Uuid) -> AppResult<Cultivo> {
        let row = sqlx::query_as::<_, Cultivo>(&format!("{} WHERE cvz.id = $1", CULTIVO_SELECT))
            .bind(cvz_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Cultivo".to_string()))?;

        Ok(row.with_age(self.today()))
    }

    /// Create the crop and its planting in one transaction
    pub async fn create(&self, input: CreateCultivoInput) -> AppResult<Cultivo> {
        input.validate()?;
        validate_ficha(&input.ficha).map_err(ficha_error)?;
        non_negative_area(input.area_terreno)?;

        if let Some(cosecha) = input.fecha_cosecha {
            if cosecha < input.fecha_siembra {
                return Err(AppError::validation(
                    "fechaCosecha",
                    "Harvest date cannot be before the sowing date",
                    "La fecha de cosecha no puede ser anterior a la siembra",
                ));
            }
        }

        let mut tx = self.db.begin().await?;

        let cultivo_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO cultivos (ficha, lote, nombre, fecha_siembra, fecha_cosecha, estado)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(input.ficha.trim())
        .bind(&input.lote)
        .bind(input.nombre.trim())
        .bind(input.fecha_siembra)
        .bind(input.fecha_cosecha)
        .bind(CropStatus::EnCurso.code())
        .fetch_one(&mut *tx)
        .await?;

        let cvz_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO cultivos_variedad_zona (
                fk_cultivo_id, fk_variedad_id, fk_zona_id, cantidad_plantas_inicial,
                cantidad_plantas_actual, fk_estado_fenologico_id, area_terreno
            )
            VALUES ($1, $2, $3, $4, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(cultivo_id)
        .bind(input.fk_variedad_id)
        .bind(input.fk_zona_id)
        .bind(input.cantidad_plantas_inicial)
        .bind(input.fk_estado_fenologico_id)
        .bind(input.area_terreno)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(cvz_id = %cvz_id, ficha = %input.ficha, "Crop created");
        self.get(cvz_id).await
    }

    pub async fn update(&self, cvz_id: Uuid, input: UpdateCultivoInput) -> AppResult<Cultivo> {
        input.validate()?;
        if let Some(ficha) = &input.ficha {
            validate_ficha(ficha).map_err(ficha_error)?;
        }
        non_negative_area(input.area_terreno)?;

        let current = self.get(cvz_id).await?;

        let siembra = input.fecha_siembra.unwrap_or(current.fecha_siembra);
        let cosecha = input.fecha_cosecha.or(current.fecha_cosecha);
        if matches!(cosecha, Some(c) if c < siembra) {
            return Err(AppError::validation(
                "fechaCosecha",
                "Harvest date cannot be before the sowing date",
                "La fecha de cosecha no puede ser anterior a la siembra",
            ));
        }

        if let Some(inicial) = input.cantidad_plantas_inicial {
            if let Some(actual) = current.cantidad_plantas_actual {
                validate_plant_count(actual, Some(inicial))?;
            }
        }

        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            UPDATE cultivos
            SET ficha = COALESCE($2, ficha),
                lote = COALESCE($3, lote),
                nombre = COALESCE($4, nombre),
                fecha_siembra = $5,
                fecha_cosecha = $6,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(current.fk_cultivo_id)
        .bind(input.ficha.as_deref().map(str::trim))
        .bind(&input.lote)
        .bind(input.nombre.as_deref().map(str::trim))
        .bind(siembra)
        .bind(cosecha)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE cultivos_variedad_zona
            SET fk_variedad_id = COALESCE($2, fk_variedad_id),
                fk_zona_id = COALESCE($3, fk_zona_id),
                cantidad_plantas_inicial = COALESCE($4, cantidad_plantas_inicial),
                area_terreno = COALESCE($5, area_terreno),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(cvz_id)
        .bind(input.fk_variedad_id)
        .bind(input.fk_zona_id)
        .bind(input.cantidad_plantas_inicial)
        .bind(input.area_terreno)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(cvz_id = %cvz_id, "Crop updated");
        self.get(cvz_id).await
    }

    /// Delete a planting; the crop record goes with it when no other
    /// planting references it. Plantings with harvests cannot be deleted.
    pub async fn delete(&self, cvz_id: Uuid) -> AppResult<()> {
        let current = self.get(cvz_id).await?;

        let harvests = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM cosechas WHERE fk_cultivo_variedad_zona_id = $1",
        )
        .bind(cvz_id)
        .fetch_one(&self.db)
        .await?;

        if harvests > 0 {
            return Err(AppError::Conflict {
                resource: "cultivo".to_string(),
                message: "Crop has recorded harvests and cannot be deleted".to_string(),
                message_es: "El cultivo tiene cosechas registradas y no se puede eliminar".to_string(),
            });
        }

        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM cultivos_variedad_zona WHERE id = $1")
            .bind(cvz_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            DELETE FROM cultivos c
            WHERE c.id = $1
              AND NOT EXISTS (SELECT 1 FROM cultivos_variedad_zona WHERE fk_cultivo_id = c.id)
            "#,
        )
        .bind(current.fk_cultivo_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(cvz_id = %cvz_id, "Crop deleted");
        Ok(())
    }

    /// Mark the crop as finished on the given date (or today)
    pub async fn finalize(&self, cvz_id: Uuid, input: FinalizeInput) -> AppResult<Cultivo> {
        let current = self.get(cvz_id).await?;

        let fecha = finalize_date(
            current.status(),
            current.fecha_siembra,
            input.fecha_cosecha,
            self.today(),
        )
        .map_err(|msg| match current.status() {
            CropStatus::Finalizado => AppError::InvalidStateTransition(msg.to_string()),
            CropStatus::EnCurso => AppError::validation(
                "fechaCosecha",
                msg,
                "La fecha de cosecha no puede ser anterior a la siembra",
            ),
        })?;

        // The status guard in WHERE keeps concurrent finalizations from both succeeding
        let result = sqlx::query(
            r#"
            UPDATE cultivos SET estado = $2, fecha_cosecha = $3, updated_at = NOW()
            WHERE id = $1 AND estado = $4
            "#,
        )
        .bind(current.fk_cultivo_id)
        .bind(CropStatus::Finalizado.code())
        .bind(fecha)
        .bind(CropStatus::EnCurso.code())
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::InvalidStateTransition(
                "Crop is already finalized".to_string(),
            ));
        }

        tracing::info!(cvz_id = %cvz_id, fecha = %fecha, "Crop finalized");
        self.get(cvz_id).await
    }

    pub async fn set_phenology(&self, cvz_id: Uuid, input: PhenologyInput) -> AppResult<Cultivo> {
        let result = sqlx::query(
            "UPDATE cultivos_variedad_zona SET fk_estado_fenologico_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(cvz_id)
        .bind(input.fk_estado_fenologico_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Cultivo".to_string()));
        }

        self.get(cvz_id).await
    }

    /// Update the current plant count and the yield that depends on it
    pub async fn set_plant_count(&self, cvz_id: Uuid, input: PlantCountInput) -> AppResult<Cultivo> {
        let current = self.get(cvz_id).await?;
        validate_plant_count(input.cantidad_plantas_actual, current.cantidad_plantas_inicial)?;

        let mut tx = self.db.begin().await?;

        sqlx::query(
            "UPDATE cultivos_variedad_zona SET cantidad_plantas_actual = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(cvz_id)
        .bind(input.cantidad_plantas_actual)
        .execute(&mut *tx)
        .await?;

        recompute_yield(&mut *tx, cvz_id).await?;

        tx.commit().await?;

        tracing::info!(
            cvz_id = %cvz_id,
            plantas = input.cantidad_plantas_actual,
            "Plant count updated"
        );
        self.get(cvz_id).await
    }
}
