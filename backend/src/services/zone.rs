//! Zone and map management service

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use shared::Coordinates;

/// Zone management service
#[derive(Clone)]
pub struct ZoneService {
    db: PgPool,
}

/// A field zone
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Zona {
    pub id: Uuid,
    pub nombre: String,
    pub coordenadas: Json<Coordinates>,
    pub area_metros_cuadrados: Option<Decimal>,
    pub fk_mapa_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A base map the zones are drawn over
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Mapa {
    pub id: Uuid,
    pub nombre: String,
    pub url_imagen: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateZoneInput {
    #[validate(length(min = 1, max = 100, message = "Zone name must be 1-100 characters"))]
    pub nombre: String,
    pub coordenadas: Coordinates,
    pub area_metros_cuadrados: Option<Decimal>,
    pub fk_mapa_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateZoneInput {
    #[validate(length(min = 1, max = 100, message = "Zone name must be 1-100 characters"))]
    pub nombre: Option<String>,
    pub coordenadas: Option<Coordinates>,
    pub area_metros_cuadrados: Option<Decimal>,
    pub fk_mapa_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMapInput {
    #[validate(length(min = 1, max = 100, message = "Map name must be 1-100 characters"))]
    pub nombre: String,
    #[validate(url(message = "Invalid image URL"))]
    pub url_imagen: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ZoneFilter {
    pub buscar: Option<String>,
}

/// Validate geometry and settle the stored area: an explicit area wins,
/// otherwise polygons get their computed surface.
fn resolve_area(
    coordenadas: &Coordinates,
    explicit: Option<Decimal>,
) -> AppResult<Option<Decimal>> {
    coordenadas.validate()?;

    match explicit {
        Some(area) if area < Decimal::ZERO => Err(AppError::validation(
            "areaMetrosCuadrados",
            "Area cannot be negative",
            "El área no puede ser negativa",
        )),
        Some(area) => Ok(Some(area.round_dp(2))),
        None => Ok(coordenadas.area_m2()),
    }
}

const ZONA_COLUMNS: &str =
    "id, nombre, coordenadas, area_metros_cuadrados, fk_mapa_id, created_at, updated_at";

impl ZoneService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List zones, optionally filtered by name (case-insensitive)
    pub async fn list(&self, filter: &ZoneFilter) -> AppResult<Vec<Zona>> {
        let pattern = filter
            .buscar
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let zones = sqlx::query_as::<_, Zona>(&format!(
            "SELECT {} FROM zonas WHERE ($1::text IS NULL OR nombre ILIKE $1) ORDER BY nombre",
            ZONA_COLUMNS
        ))
        .bind(pattern)
        .fetch_all(&self.db)
        .await?;

        Ok(zones)
    }

    pub async fn get(&self, zone_id: Uuid) -> AppResult<Zona> {
        sqlx::query_as::<_, Zona>(&format!("SELECT {} FROM zonas WHERE id = $1", ZONA_COLUMNS))
            .bind(zone_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Zona".to_string()))
    }

    pub async fn create(&self, input: CreateZoneInput) -> AppResult<Zona> {
        input.validate()?;
        let area = resolve_area(&input.coordenadas, input.area_metros_cuadrados)?;

        let zone = sqlx::query_as::<_, Zona>(&format!(
            r#"
            INSERT INTO zonas (nombre, coordenadas, area_metros_cuadrados, fk_mapa_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            ZONA_COLUMNS
        ))
        .bind(input.nombre.trim())
        .bind(Json(&input.coordenadas))
        .bind(area)
        .bind(input.fk_mapa_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(zone_id = %zone.id, area = ?zone.area_metros_cuadrados, "Zone created");
        Ok(zone)
    }

    pub async fn update(&self, zone_id: Uuid, input: UpdateZoneInput) -> AppResult<Zona> {
        input.validate()?;
        let current = self.get(zone_id).await?;

        let coordenadas = input.coordenadas.unwrap_or(current.coordenadas.0);
        let area = match input.area_metros_cuadrados {
            Some(area) => resolve_area(&coordenadas, Some(area))?,
            None => {
                coordenadas.validate()?;
                match coordenadas.area_m2() {
                    Some(computed) => Some(computed),
                    None => current.area_metros_cuadrados,
                }
            }
        };

        let zone = sqlx::query_as::<_, Zona>(&format!(
            r#"
            UPDATE zonas
            SET nombre = COALESCE($2, nombre),
                coordenadas = $3,
                area_metros_cuadrados = $4,
                fk_mapa_id = COALESCE($5, fk_mapa_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ZONA_COLUMNS
        ))
        .bind(zone_id)
        .bind(input.nombre.as_deref().map(str::trim))
        .bind(Json(&coordenadas))
        .bind(area)
        .bind(input.fk_mapa_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(zone_id = %zone_id, "Zone updated");
        Ok(zone)
    }

    /// Delete a zone. Zones with crops planted in them cannot be removed.
    pub async fn delete(&self, zone_id: Uuid) -> AppResult<()> {
        let crops = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM cultivos_variedad_zona WHERE fk_zona_id = $1",
        )
        .bind(zone_id)
        .fetch_one(&self.db)
        .await?;

        if crops > 0 {
            return Err(AppError::Conflict {
                resource: "zona".to_string(),
                message: format!("Zone has {} crop(s) planted and cannot be deleted", crops),
                message_es: format!("La zona tiene {} cultivo(s) y no se puede eliminar", crops),
            });
        }

        let result = sqlx::query("DELETE FROM zonas WHERE id = $1")
            .bind(zone_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Zona".to_string()));
        }

        tracing::info!(zone_id = %zone_id, "Zone deleted");
        Ok(())
    }

    pub async fn list_maps(&self) -> AppResult<Vec<Mapa>> {
        let maps = sqlx::query_as::<_, Mapa>(
            "SELECT id, nombre, url_imagen, created_at FROM mapas ORDER BY nombre",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(maps)
    }

    pub async fn create_map(&self, input: CreateMapInput) -> AppResult<Mapa> {
        input.validate()?;

        let map = sqlx::query_as::<_, Mapa>(
            r#"
            INSERT INTO mapas (nombre, url_imagen)
            VALUES ($1, $2)
            RETURNING id, nombre, url_imagen, created_at
            "#,
        )
        .bind(input.nombre.trim())
        .bind(&input.url_imagen)
        .fetch_one(&self.db)
        .await?;

        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::GeoPoint;

    fn square() -> Coordinates {
        Coordinates::Polygon(vec![
            GeoPoint::new(4.0, -74.0),
            GeoPoint::new(4.0, -73.999),
            GeoPoint::new(4.001, -73.999),
            GeoPoint::new(4.001, -74.0),
        ])
    }

    #[test]
    fn test_explicit_area_wins() {
        let area = resolve_area(&square(), Some(Decimal::new(12345, 1))).unwrap();
        assert_eq!(area, Some(Decimal::new(123450, 2)));
    }

    #[test]
    fn test_polygon_area_computed_when_missing() {
        let area = resolve_area(&square(), None).unwrap().unwrap();
        // roughly 111 m x 111 m near the equator
        assert!(area > Decimal::from(12_000) && area < Decimal::from(12_600));
    }

    #[test]
    fn test_invalid_geometry_rejected() {
        let point = Coordinates::Point(GeoPoint::new(95.0, 0.0));
        assert!(resolve_area(&point, None).is_err());
        assert!(resolve_area(&square(), Some(Decimal::from(-1))).is_err());
    }
}
