//! Sensor service: MQTT gateway configuration, thresholds, readings and
//! the aggregated data behind the sensor reports

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::notification::{HubEvent, NotificationHub, NotificationService};
use shared::{
    aggregate_report, is_valid_reading, latest_per_key, matches_search, threshold_draft,
    validate_port, validate_sensor_key, validate_topic_base, FarmClock, LatestReading,
    MqttProtocol, ReportDataRequest, ReportRow, SensorRange, SensorSample, SENTINEL_VALUES,
};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the gateway's configuration id
pub const CONFIG_HEADER: &str = "x-agro-config";
/// Header carrying the base64 HMAC-SHA256 of the request body
pub const SIGNATURE_HEADER: &str = "x-agro-signature";

const MAX_BATCH: usize = 1000;

#[derive(Clone)]
pub struct SensorService {
    db: PgPool,
    hub: NotificationHub,
    clock: FarmClock,
}

// ============================================================================
// Types
// ============================================================================

/// Gateway configuration. The ingestion secret is never serialized.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MqttConfig {
    pub id: Uuid,
    pub nombre: String,
    pub host: String,
    pub port: i32,
    #[sqlx(try_from = "String")]
    pub protocol: MqttProtocol,
    pub topic_base: String,
    pub fk_zona_id: Option<Uuid>,
    pub zona_nombre: Option<String>,
    pub activa: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Returned once, on creation or secret rotation
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MqttConfigWithSecret {
    #[serde(flatten)]
    pub config: MqttConfig,
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UmbralSensor {
    pub id: Uuid,
    pub fk_mqtt_config_id: Uuid,
    pub sensor_key: String,
    pub minimo: f64,
    pub maximo: f64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MedicionSensor {
    pub id: Uuid,
    pub fk_mqtt_config_id: Option<Uuid>,
    pub fk_zona_id: Uuid,
    pub key: String,
    pub valor: f64,
    pub unidad: Option<String>,
    pub fecha_medicion: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMqttConfigInput {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub nombre: String,
    #[validate(length(min = 1, max = 255, message = "Host must be 1-255 characters"))]
    pub host: String,
    pub port: i32,
    pub protocol: MqttProtocol,
    pub topic_base: String,
    pub fk_zona_id: Option<Uuid>,
    pub activa: Option<bool>,
    #[validate(length(min = 16, message = "Secret must be at least 16 characters"))]
    pub secret: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMqttConfigInput {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub nombre: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Host must be 1-255 characters"))]
    pub host: Option<String>,
    pub port: Option<i32>,
    pub protocol: Option<MqttProtocol>,
    pub topic_base: Option<String>,
    pub fk_zona_id: Option<Uuid>,
    pub activa: Option<bool>,
    #[validate(length(min = 16, message = "Secret must be at least 16 characters"))]
    pub secret: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdInput {
    pub sensor_key: String,
    pub minimo: f64,
    pub maximo: f64,
}

/// One reading as sent by a gateway or a user
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingInput {
    pub key: String,
    pub valor: f64,
    pub unidad: Option<String>,
    /// Defaults to the time of arrival
    pub fecha_medicion: Option<DateTime<Utc>>,
}

/// Signed gateway batch
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestPayload {
    pub mediciones: Vec<ReadingInput>,
}

/// Manual batch from an authenticated user
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualReadingsInput {
    pub fk_zona_id: Uuid,
    pub fk_mqtt_config_id: Option<Uuid>,
    pub mediciones: Vec<ReadingInput>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResult {
    pub recibidas: usize,
    pub guardadas: usize,
    pub alertas: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingFilter {
    pub zona_id: Option<Uuid>,
    pub key: Option<String>,
    pub desde: Option<DateTime<Utc>>,
    pub hasta: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

/// Search entry: one per crop and zone
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorSearchEntry {
    pub cultivo_id: Uuid,
    pub cultivo_nombre: String,
    pub variedad_nombre: String,
    pub tipo_cultivo_nombre: String,
    pub zona_id: Uuid,
    pub zona_nombre: String,
    pub cvz_id: Uuid,
    pub sensor_config: Option<MqttConfig>,
    pub unique_sensor_data: Vec<LatestReading>,
}

#[derive(Debug, FromRow)]
struct PlantingRow {
    cultivo_id: Uuid,
    cultivo_nombre: String,
    variedad_nombre: String,
    tipo_cultivo_nombre: String,
    zona_id: Uuid,
    zona_nombre: String,
    cvz_id: Uuid,
}

#[derive(Debug, FromRow)]
struct LatestRow {
    fk_zona_id: Uuid,
    key: String,
    unidad: Option<String>,
    valor: f64,
    fecha_medicion: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct SampleRow {
    cultivo_id: Uuid,
    cultivo_nombre: String,
    variedad_nombre: String,
    zona_id: Uuid,
    zona_nombre: String,
    cvz_id: Uuid,
    key: String,
    valor: f64,
    unidad: Option<String>,
    fecha_medicion: DateTime<Utc>,
}

impl From<SampleRow> for SensorSample {
    fn from(r: SampleRow) -> Self {
        SensorSample {
            cultivo_id: r.cultivo_id,
            cultivo_nombre: r.cultivo_nombre,
            variedad_nombre: r.variedad_nombre,
            zona_id: r.zona_id,
            zona_nombre: r.zona_nombre,
            cvz_id: r.cvz_id,
            key: r.key,
            valor: r.valor,
            unidad: r.unidad,
            fecha_medicion: r.fecha_medicion,
        }
    }
}

#[derive(Debug, FromRow)]
struct IngestTarget {
    fk_zona_id: Option<Uuid>,
    zona_nombre: Option<String>,
    activa: bool,
    secret: String,
}

// ============================================================================
// Helpers
// ============================================================================

/// Verify a base64 HMAC-SHA256 signature of `body` in constant time
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> AppResult<()> {
    let expected = BASE64
        .decode(signature.trim())
        .map_err(|_| AppError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal("Failed to create HMAC".to_string()))?;
    mac.update(body);
    mac.verify_slice(&expected).map_err(|_| AppError::InvalidSignature)
}

/// Signature a gateway must send for `body`
pub fn sign(secret: &str, body: &[u8]) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal("Failed to create HMAC".to_string()))?;
    mac.update(body);
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn check_connection(port: i32, topic: &str) -> AppResult<()> {
    validate_port(port).map_err(|m| AppError::validation("port", m, "Puerto inválido"))?;
    validate_topic_base(topic)
        .map_err(|m| AppError::validation("topicBase", m, "Tópico base inválido"))
}

fn check_readings(readings: &[ReadingInput]) -> AppResult<()> {
    if readings.is_empty() {
        return Err(AppError::validation(
            "mediciones",
            "At least one reading is required",
            "Debe enviar al menos una medición",
        ));
    }
    if readings.len() > MAX_BATCH {
        return Err(AppError::validation(
            "mediciones",
            format!("At most {} readings per batch", MAX_BATCH),
            format!("Máximo {} mediciones por lote", MAX_BATCH),
        ));
    }
    for reading in readings {
        validate_sensor_key(&reading.key)
            .map_err(|m| AppError::validation("key", m, "Clave de sensor inválida"))?;
    }
    Ok(())
}

const MQTT_CONFIG_SELECT: &str = r#"
    SELECT m.id, m.nombre, m.host, m.port, m.protocol, m.topic_base, m.fk_zona_id,
           z.nombre AS zona_nombre, m.activa, m.created_at, m.updated_at
    FROM mqtt_configs m
    LEFT JOIN zonas z ON z.id = m.fk_zona_id
"#;

impl SensorService {
    pub fn new(db: PgPool, hub: NotificationHub, clock: FarmClock) -> Self {
        Self { db, hub, clock }
    }

    pub fn clock(&self) -> FarmClock {
        self.clock
    }

    // ------------------------------------------------------------------
    // Gateway configuration
    // ------------------------------------------------------------------

    pub async fn list_configs(&self) -> AppResult<Vec<MqttConfig>> {
        let configs = sqlx::query_as::<_, MqttConfig>(&format!("{} ORDER BY m.nombre", MQTT_CONFIG_SELECT))
            .fetch_all(&self.db)
            .await?;
        Ok(configs)
    }

    pub async fn get_config(&self, id: Uuid) -> AppResult<MqttConfig> {
        sqlx::query_as::<_, MqttConfig>(&format!("{} WHERE m.id = $1", MQTT_CONFIG_SELECT))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Configuración MQTT".to_string()))
    }

    pub async fn create_config(&self, input: CreateMqttConfigInput) -> AppResult<MqttConfigWithSecret> {
        input.validate()?;
        check_connection(input.port, &input.topic_base)?;

        let secret = input.secret.clone().unwrap_or_else(generate_secret);

        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO mqtt_configs (nombre, host, port, protocol, topic_base, fk_zona_id, activa, secret)
            VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, true), $8)
            RETURNING id
            "#,
        )
        .bind(input.nombre.trim())
        .bind(input.host.trim())
        .bind(input.port)
        .bind(input.protocol.as_str())
        .bind(input.topic_base.trim())
        .bind(input.fk_zona_id)
        .bind(input.activa)
        .bind(&secret)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(config_id = %id, "MQTT configuration created");
        let config = self.get_config(id).await?;
        Ok(MqttConfigWithSecret { config, secret })
    }

    pub async fn update_config(&self, id: Uuid, input: UpdateMqttConfigInput) -> AppResult<MqttConfig> {
        input.validate()?;
        let current = self.get_config(id).await?;
        check_connection(
            input.port.unwrap_or(current.port),
            input.topic_base.as_deref().unwrap_or(&current.topic_base),
        )?;

        sqlx::query(
            r#"
            UPDATE mqtt_configs
            SET nombre = COALESCE($2, nombre),
                host = COALESCE($3, host),
                port = COALESCE($4, port),
                protocol = COALESCE($5, protocol),
                topic_base = COALESCE($6, topic_base),
                fk_zona_id = COALESCE($7, fk_zona_id),
                activa = COALESCE($8, activa),
                secret = COALESCE($9, secret),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(input.nombre.as_deref().map(str::trim))
        .bind(input.host.as_deref().map(str::trim))
        .bind(input.port)
        .bind(input.protocol.map(|p| p.as_str()))
        .bind(input.topic_base.as_deref().map(str::trim))
        .bind(input.fk_zona_id)
        .bind(input.activa)
        .bind(&input.secret)
        .execute(&self.db)
        .await?;

        tracing::info!(config_id = %id, "MQTT configuration updated");
        self.get_config(id).await
    }

    pub async fn delete_config(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM mqtt_configs WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Configuración MQTT".to_string()));
        }

        tracing::info!(config_id = %id, "MQTT configuration deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Thresholds
    // ------------------------------------------------------------------

    pub async fn list_thresholds(&self, config_id: Uuid) -> AppResult<Vec<UmbralSensor>> {
        self.get_config(config_id).await?;

        let thresholds = sqlx::query_as::<_, UmbralSensor>(
            r#"
            SELECT id, fk_mqtt_config_id, sensor_key, minimo, maximo, updated_at
            FROM umbrales_sensor
            WHERE fk_mqtt_config_id = $1
            ORDER BY sensor_key
            "#,
        )
        .bind(config_id)
        .fetch_all(&self.db)
        .await?;

        Ok(thresholds)
    }

    /// Create or replace the threshold of a sensor key
    pub async fn upsert_threshold(&self, config_id: Uuid, input: ThresholdInput) -> AppResult<UmbralSensor> {
        validate_sensor_key(&input.sensor_key)
            .map_err(|m| AppError::validation("sensorKey", m, "Clave de sensor inválida"))?;
        SensorRange::new(input.minimo, input.maximo)
            .map_err(|m| AppError::validation("minimo", m, "Rango de umbral inválido"))?;
        self.get_config(config_id).await?;

        let threshold = sqlx::query_as::<_, UmbralSensor>(
            r#"
            INSERT INTO umbrales_sensor (fk_mqtt_config_id, sensor_key, minimo, maximo)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (fk_mqtt_config_id, sensor_key)
            DO UPDATE SET minimo = EXCLUDED.minimo, maximo = EXCLUDED.maximo, updated_at = NOW()
            RETURNING id, fk_mqtt_config_id, sensor_key, minimo, maximo, updated_at
            "#,
        )
        .bind(config_id)
        .bind(input.sensor_key.trim())
        .bind(input.minimo)
        .bind(input.maximo)
        .fetch_one(&self.db)
        .await?;

        Ok(threshold)
    }

    pub async fn delete_threshold(&self, config_id: Uuid, threshold_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM umbrales_sensor WHERE id = $1 AND fk_mqtt_config_id = $2")
            .bind(threshold_id)
            .bind(config_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Umbral".to_string()));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Readings
    // ------------------------------------------------------------------

    /// Ingest a signed batch from a gateway
    pub async fn ingest(&self, config_id: Uuid, signature: &str, body: &[u8]) -> AppResult<IngestResult> {
        let target = sqlx::query_as::<_, IngestTarget>(
            r#"
            SELECT m.fk_zona_id, z.nombre AS zona_nombre, m.activa, m.secret
            FROM mqtt_configs m
            LEFT JOIN zonas z ON z.id = m.fk_zona_id
            WHERE m.id = $1
            "#,
        )
        .bind(config_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::InvalidSignature)?;

        verify_signature(&target.secret, body, signature).map_err(|e| {
            tracing::warn!(config_id = %config_id, "Rejected gateway batch with bad signature");
            e
        })?;

        if !target.activa {
            return Err(AppError::InvalidStateTransition(
                "Sensor configuration is inactive".to_string(),
            ));
        }
        let (zona_id, zona_nombre) = match (target.fk_zona_id, target.zona_nombre) {
            (Some(id), Some(nombre)) => (id, nombre),
            _ => {
                return Err(AppError::InvalidStateTransition(
                    "Sensor configuration has no zone assigned".to_string(),
                ))
            }
        };

        let payload: IngestPayload = serde_json::from_slice(body)
            .map_err(|e| AppError::ValidationError(format!("Invalid reading batch: {}", e)))?;

        self.store_readings(zona_id, &zona_nombre, Some(config_id), payload.mediciones)
            .await
    }

    /// Insert readings entered by a user
    pub async fn create_manual(&self, input: ManualReadingsInput) -> AppResult<IngestResult> {
        let zona_nombre = sqlx::query_scalar::<_, String>("SELECT nombre FROM zonas WHERE id = $1")
            .bind(input.fk_zona_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Zona".to_string()))?;

        self.store_readings(input.fk_zona_id, &zona_nombre, input.fk_mqtt_config_id, input.mediciones)
            .await
    }

    async fn store_readings(
        &self,
        zona_id: Uuid,
        zona_nombre: &str,
        config_id: Option<Uuid>,
        readings: Vec<ReadingInput>,
    ) -> AppResult<IngestResult> {
        check_readings(&readings)?;
        let recibidas = readings.len();
        let now = Utc::now();

        let ranges: HashMap<String, SensorRange> = match config_id {
            Some(id) => sqlx::query_as::<_, (String, f64, f64)>(
                "SELECT sensor_key, minimo, maximo FROM umbrales_sensor WHERE fk_mqtt_config_id = $1",
            )
            .bind(id)
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .filter_map(|(key, min, max)| SensorRange::new(min, max).ok().map(|r| (key, r)))
            .collect(),
            None => HashMap::new(),
        };

        let mut tx = self.db.begin().await?;
        let mut guardadas = 0;
        let mut alerts = Vec::new();

        for reading in &readings {
            // NaN and infinities cannot be stored; sentinels are kept as sent
            if !reading.valor.is_finite() {
                continue;
            }

            sqlx::query(
                r#"
                INSERT INTO mediciones_sensor (fk_mqtt_config_id, fk_zona_id, key, valor, unidad, fecha_medicion)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(config_id)
            .bind(zona_id)
            .bind(reading.key.trim())
            .bind(reading.valor)
            .bind(&reading.unidad)
            .bind(reading.fecha_medicion.unwrap_or(now))
            .execute(&mut *tx)
            .await?;
            guardadas += 1;

            if let Some(range) = ranges.get(reading.key.trim()) {
                if let Some(breach) = range.check(reading.valor) {
                    let draft = threshold_draft(
                        zona_id,
                        zona_nombre,
                        reading.key.trim(),
                        reading.valor,
                        reading.unidad.as_deref(),
                        range,
                        breach,
                    );
                    alerts.push(NotificationService::persist(&mut *tx, &draft, None).await?);
                }
            }
        }

        tx.commit().await?;

        let alertas = alerts.len();
        for notificacion in alerts {
            self.hub.publish(HubEvent::Notification(notificacion));
        }
        self.hub.refresh("mediciones");

        tracing::info!(
            zona_id = %zona_id,
            recibidas,
            guardadas,
            alertas,
            "Sensor readings stored"
        );

        Ok(IngestResult {
            recibidas,
            guardadas,
            alertas,
        })
    }

    /// Raw readings, newest first
    pub async fn list_readings(&self, filter: &ReadingFilter) -> AppResult<Vec<MedicionSensor>> {
        let limit = filter.limit.unwrap_or(500).clamp(1, 5000);

        let readings = sqlx::query_as::<_, MedicionSensor>(
            r#"
            SELECT id, fk_mqtt_config_id, fk_zona_id, key, valor, unidad, fecha_medicion
            FROM mediciones_sensor
            WHERE ($1::uuid IS NULL OR fk_zona_id = $1)
              AND ($2::text IS NULL OR key = $2)
              AND ($3::timestamptz IS NULL OR fecha_medicion >= $3)
              AND ($4::timestamptz IS NULL OR fecha_medicion <= $4)
            ORDER BY fecha_medicion DESC
            LIMIT $5
            "#,
        )
        .bind(filter.zona_id)
        .bind(&filter.key)
        .bind(filter.desde)
        .bind(filter.hasta)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(readings)
    }

    /// Latest valid reading per key for each of the given zones
    pub async fn latest_by_zone(&self, zone_ids: &[Uuid]) -> AppResult<HashMap<Uuid, Vec<LatestReading>>> {
        let rows = sqlx::query_as::<_, LatestRow>(
            r#"
            SELECT DISTINCT ON (fk_zona_id, key) fk_zona_id, key, unidad, valor, fecha_medicion
            FROM mediciones_sensor
            WHERE fk_zona_id = ANY($1)
              AND valor <> ALL($2)
            ORDER BY fk_zona_id, key, fecha_medicion DESC
            "#,
        )
        .bind(zone_ids)
        .bind(&SENTINEL_VALUES[..])
        .fetch_all(&self.db)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<LatestReading>> = HashMap::new();
        for row in rows {
            grouped.entry(row.fk_zona_id).or_default().push(LatestReading {
                key: row.key,
                unidad: row.unidad,
                valor: row.valor,
                fecha_medicion: row.fecha_medicion,
            });
        }

        Ok(grouped
            .into_iter()
            .map(|(zona, readings)| (zona, latest_per_key(readings)))
            .collect())
    }

    /// One entry per crop and zone with the zone's latest readings
    pub async fn search_data(&self, query: &SearchQuery) -> AppResult<Vec<SensorSearchEntry>> {
        let plantings = sqlx::query_as::<_, PlantingRow>(
            r#"
            SELECT c.id AS cultivo_id, c.nombre AS cultivo_nombre, v.nombre AS variedad_nombre,
                   t.nombre AS tipo_cultivo_nombre, z.id AS zona_id, z.nombre AS zona_nombre,
                   cvz.id AS cvz_id
            FROM cultivos_variedad_zona cvz
            JOIN cultivos c ON c.id = cvz.fk_cultivo_id
            JOIN variedades v ON v.id = cvz.fk_variedad_id
            JOIN tipos_cultivo t ON t.id = v.fk_tipo_cultivo_id
            JOIN zonas z ON z.id = cvz.fk_zona_id
            ORDER BY c.nombre, z.nombre
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let q = query.q.as_deref().unwrap_or("");
        let plantings: Vec<PlantingRow> = plantings
            .into_iter()
            .filter(|p| {
                matches_search(
                    q,
                    &[
                        &p.cultivo_nombre,
                        &p.zona_nombre,
                        &p.variedad_nombre,
                        &p.tipo_cultivo_nombre,
                    ],
                )
            })
            .collect();

        let mut zone_ids: Vec<Uuid> = plantings.iter().map(|p| p.zona_id).collect();
        zone_ids.sort();
        zone_ids.dedup();

        let latest = self.latest_by_zone(&zone_ids).await?;

        let configs = sqlx::query_as::<_, MqttConfig>(&format!(
            "{} WHERE m.fk_zona_id = ANY($1) ORDER BY m.activa DESC, m.updated_at DESC",
            MQTT_CONFIG_SELECT
        ))
        .bind(&zone_ids)
        .fetch_all(&self.db)
        .await?;

        let mut config_by_zone: HashMap<Uuid, MqttConfig> = HashMap::new();
        for config in configs {
            if let Some(zona) = config.fk_zona_id {
                config_by_zone.entry(zona).or_insert(config);
            }
        }

        Ok(plantings
            .into_iter()
            .map(|p| SensorSearchEntry {
                unique_sensor_data: latest.get(&p.zona_id).cloned().unwrap_or_default(),
                sensor_config: config_by_zone.get(&p.zona_id).cloned(),
                cultivo_id: p.cultivo_id,
                cultivo_nombre: p.cultivo_nombre,
                variedad_nombre: p.variedad_nombre,
                tipo_cultivo_nombre: p.tipo_cultivo_nombre,
                zona_id: p.zona_id,
                zona_nombre: p.zona_nombre,
                cvz_id: p.cvz_id,
            })
            .collect())
    }

    /// Aggregated statistics for the requested keys, plantings and period
    pub async fn report_data(&self, request: &ReportDataRequest) -> AppResult<Vec<ReportRow>> {
        request.validate()?;
        if request.med_keys.is_empty() {
            return Err(AppError::validation(
                "med_keys",
                "At least one sensor key is required",
                "Debe seleccionar al menos un sensor",
            ));
        }

        let (desde, hasta) = self.clock.utc_bounds(request.start_date, request.end_date);

        let rows = sqlx::query_as::<_, SampleRow>(
            r#"
            SELECT c.id AS cultivo_id, c.nombre AS cultivo_nombre, v.nombre AS variedad_nombre,
                   z.id AS zona_id, z.nombre AS zona_nombre, cvz.id AS cvz_id,
                   m.key, m.valor, m.unidad, m.fecha_medicion
            FROM mediciones_sensor m
            JOIN zonas z ON z.id = m.fk_zona_id
            JOIN cultivos_variedad_zona cvz ON cvz.fk_zona_id = z.id
            JOIN cultivos c ON c.id = cvz.fk_cultivo_id
            JOIN variedades v ON v.id = cvz.fk_variedad_id
            WHERE m.key = ANY($1)
              AND m.fecha_medicion >= $2
              AND m.fecha_medicion < $3
              AND ($4::uuid[] IS NULL OR c.id = ANY($4))
              AND ($5::uuid[] IS NULL OR z.id = ANY($5))
            "#,
        )
        .bind(&request.med_keys)
        .bind(desde)
        .bind(hasta)
        .bind(request.cultivo_ids.as_deref().filter(|ids| !ids.is_empty()))
        .bind(request.zona_ids.as_deref().filter(|ids| !ids.is_empty()))
        .fetch_all(&self.db)
        .await?;

        let samples: Vec<SensorSample> = rows
            .into_iter()
            .map(SensorSample::from)
            .filter(|s| is_valid_reading(s.valor))
            .collect();

        let report = aggregate_report(&samples, request, &self.clock);

        tracing::debug!(
            samples = samples.len(),
            rows = report.len(),
            group_by = %request.group_by,
            "Sensor report aggregated"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_roundtrip_and_tamper() {
        let body = br#"{"mediciones":[{"key":"temperatura","valor":24.5}]}"#;
        let signature = sign("gateway-secret-0001", body).unwrap();
        assert!(verify_signature("gateway-secret-0001", body, &signature).is_ok());
        assert!(matches!(
            verify_signature("another-secret-0001", body, &signature),
            Err(AppError::InvalidSignature)
        ));
        assert!(matches!(
            verify_signature("gateway-secret-0001", b"{}", &signature),
            Err(AppError::InvalidSignature)
        ));
        assert!(matches!(
            verify_signature("gateway-secret-0001", body, "not base64!"),
            Err(AppError::InvalidSignature)
        ));
    }

    #[test]
    fn test_generated_secret_length() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 64);
        assert_ne!(secret, generate_secret());
    }

    #[test]
    fn test_check_readings() {
        let reading = |key: &str| ReadingInput {
            key: key.to_string(),
            valor: 1.0,
            unidad: None,
            fecha_medicion: None,
        };
        assert!(check_readings(&[]).is_err());
        assert!(check_readings(&[reading("humedad_suelo")]).is_ok());
        assert!(check_readings(&[reading("")]).is_err());
    }

    #[test]
    fn test_ingest_payload_shape() {
        let payload: IngestPayload = serde_json::from_str(
            r#"{"mediciones":[{"key":"ph","valor":6.8,"unidad":"pH","fechaMedicion":"2024-05-01T12:00:00Z"}]}"#,
        )
        .unwrap();
        assert_eq!(payload.mediciones.len(), 1);
        assert!(payload.mediciones[0].fecha_medicion.is_some());
    }
}
