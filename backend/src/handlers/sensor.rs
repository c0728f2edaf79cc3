//! Sensor HTTP handlers: gateway configuration, thresholds, readings and
//! sensor reports

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use shared::{Action, FarmClock, ReportDataRequest, ReportRow, Resource};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::services::sensor::{
    CreateMqttConfigInput, IngestResult, ManualReadingsInput, MedicionSensor, MqttConfig,
    MqttConfigWithSecret, ReadingFilter, SearchQuery, SensorSearchEntry, SensorService,
    ThresholdInput, UmbralSensor, UpdateMqttConfigInput, CONFIG_HEADER, SIGNATURE_HEADER,
};
use crate::services::ReportingService;
use crate::AppState;

fn clock(state: &AppState) -> FarmClock {
    FarmClock::from_offset_hours(state.config.reports.utc_offset_hours)
}

fn sensor_service(state: &AppState) -> SensorService {
    SensorService::new(state.db.clone(), state.hub.clone(), clock(state))
}

// ============================================================================
// Gateway configuration
// ============================================================================

pub async fn list_mqtt_configs(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<MqttConfig>>> {
    current_user.0.require(Resource::Sensores, Action::Ver)?;
    Ok(Json(sensor_service(&state).list_configs().await?))
}

pub async fn get_mqtt_config(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(config_id): Path<Uuid>,
) -> AppResult<Json<MqttConfig>> {
    current_user.0.require(Resource::Sensores, Action::Ver)?;
    Ok(Json(sensor_service(&state).get_config(config_id).await?))
}

/// The ingestion secret is only returned here
pub async fn create_mqtt_config(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateMqttConfigInput>,
) -> AppResult<(StatusCode, Json<MqttConfigWithSecret>)> {
    current_user.0.require(Resource::Sensores, Action::Crear)?;
    let created = sensor_service(&state).create_config(input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_mqtt_config(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(config_id): Path<Uuid>,
    Json(input): Json<UpdateMqttConfigInput>,
) -> AppResult<Json<MqttConfig>> {
    current_user.0.require(Resource::Sensores, Action::Editar)?;
    Ok(Json(sensor_service(&state).update_config(config_id, input).await?))
}

pub async fn delete_mqtt_config(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(config_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.0.require(Resource::Sensores, Action::Eliminar)?;
    sensor_service(&state).delete_config(config_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_thresholds(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(config_id): Path<Uuid>,
) -> AppResult<Json<Vec<UmbralSensor>>> {
    current_user.0.require(Resource::Sensores, Action::Ver)?;
    Ok(Json(sensor_service(&state).list_thresholds(config_id).await?))
}

pub async fn upsert_threshold(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(config_id): Path<Uuid>,
    Json(input): Json<ThresholdInput>,
) -> AppResult<Json<UmbralSensor>> {
    current_user.0.require(Resource::Sensores, Action::Editar)?;
    Ok(Json(sensor_service(&state).upsert_threshold(config_id, input).await?))
}

pub async fn delete_threshold(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((config_id, threshold_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    current_user.0.require(Resource::Sensores, Action::Eliminar)?;
    sensor_service(&state)
        .delete_threshold(config_id, threshold_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Readings
// ============================================================================

/// Signed gateway ingestion (no bearer token)
pub async fn ingest_readings(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<(StatusCode, Json<IngestResult>)> {
    let config_id = headers
        .get(CONFIG_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .ok_or_else(|| AppError::Unauthorized {
            message: "Missing or invalid X-Agro-Config header".to_string(),
            message_es: "Falta el encabezado X-Agro-Config o no es válido".to_string(),
        })?;
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::InvalidSignature)?;

    let result = sensor_service(&state).ingest(config_id, signature, &body).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn create_readings(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<ManualReadingsInput>,
) -> AppResult<(StatusCode, Json<IngestResult>)> {
    current_user.0.require(Resource::Sensores, Action::Crear)?;
    let result = sensor_service(&state).create_manual(input).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn list_readings(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<ReadingFilter>,
) -> AppResult<Json<Vec<MedicionSensor>>> {
    current_user.0.require(Resource::Sensores, Action::Ver)?;
    Ok(Json(sensor_service(&state).list_readings(&filter).await?))
}

pub async fn search_sensor_data(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<SensorSearchEntry>>> {
    current_user.0.require(Resource::Sensores, Action::Ver)?;
    Ok(Json(sensor_service(&state).search_data(&query).await?))
}

pub async fn sensor_report_data(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<ReportDataRequest>,
) -> AppResult<Json<Vec<ReportRow>>> {
    current_user.0.require(Resource::Reportes, Action::Ver)?;
    Ok(Json(sensor_service(&state).report_data(&request).await?))
}

pub async fn sensor_report_pdf(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<ReportDataRequest>,
) -> AppResult<Response> {
    current_user.0.require(Resource::Reportes, Action::Ver)?;
    let service = ReportingService::new(
        state.db.clone(),
        state.hub.clone(),
        clock(&state),
        state.config.reports.labor_hourly_rate,
    );
    let file = service.sensor_pdf(&request).await?;

    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.file_name),
            ),
        ],
        file.bytes,
    )
        .into_response())
}
