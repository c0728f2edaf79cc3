//! Crop catalog and crop record handlers

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use shared::{Action, FarmClock, Resource};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::crop::{
    CreateCultivoInput, CropService, Cultivo, CultivoFilter, EstadoFenologico,
    EstadoFenologicoInput, FinalizeInput, PhenologyInput, PlantCountInput, TipoCultivo,
    TipoCultivoInput, UpdateCultivoInput, Variedad, VariedadFilter, VariedadInput,
};
use crate::services::ReportingService;
use crate::AppState;

fn crop_service(state: &AppState) -> CropService {
    CropService::new(
        state.db.clone(),
        FarmClock::from_offset_hours(state.config.reports.utc_offset_hours),
    )
}

// ============================================================================
// Catalog
// ============================================================================

pub async fn list_crop_types(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<TipoCultivo>>> {
    current_user.0.require(Resource::Cultivos, Action::Ver)?;
    Ok(Json(crop_service(&state).list_crop_types().await?))
}

pub async fn create_crop_type(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<TipoCultivoInput>,
) -> AppResult<(StatusCode, Json<TipoCultivo>)> {
    current_user.0.require(Resource::Cultivos, Action::Crear)?;
    let tipo = crop_service(&state).create_crop_type(input).await?;
    Ok((StatusCode::CREATED, Json(tipo)))
}

pub async fn update_crop_type(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<TipoCultivoInput>,
) -> AppResult<Json<TipoCultivo>> {
    current_user.0.require(Resource::Cultivos, Action::Editar)?;
    Ok(Json(crop_service(&state).update_crop_type(id, input).await?))
}

pub async fn delete_crop_type(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.0.require(Resource::Cultivos, Action::Eliminar)?;
    crop_service(&state).delete_crop_type(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_varieties(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<VariedadFilter>,
) -> AppResult<Json<Vec<Variedad>>> {
    current_user.0.require(Resource::Cultivos, Action::Ver)?;
    Ok(Json(crop_service(&state).list_varieties(&filter).await?))
}

pub async fn create_variety(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<VariedadInput>,
) -> AppResult<(StatusCode, Json<Variedad>)> {
    current_user.0.require(Resource::Cultivos, Action::Crear)?;
    let variedad = crop_service(&state).create_variety(input).await?;
    Ok((StatusCode::CREATED, Json(variedad)))
}

pub async fn update_variety(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<VariedadInput>,
) -> AppResult<Json<Variedad>> {
    current_user.0.require(Resource::Cultivos, Action::Editar)?;
    Ok(Json(crop_service(&state).update_variety(id, input).await?))
}

pub async fn delete_variety(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.0.require(Resource::Cultivos, Action::Eliminar)?;
    crop_service(&state).delete_variety(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_stages(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<EstadoFenologico>>> {
    current_user.0.require(Resource::Cultivos, Action::Ver)?;
    Ok(Json(crop_service(&state).list_stages().await?))
}

pub async fn create_stage(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<EstadoFenologicoInput>,
) -> AppResult<(StatusCode, Json<EstadoFenologico>)> {
    current_user.0.require(Resource::Cultivos, Action::Crear)?;
    let stage = crop_service(&state).create_stage(input).await?;
    Ok((StatusCode::CREATED, Json(stage)))
}

pub async fn update_stage(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<EstadoFenologicoInput>,
) -> AppResult<Json<EstadoFenologico>> {
    current_user.0.require(Resource::Cultivos, Action::Editar)?;
    Ok(Json(crop_service(&state).update_stage(id, input).await?))
}

pub async fn delete_stage(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.0.require(Resource::Cultivos, Action::Eliminar)?;
    crop_service(&state).delete_stage(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Crops
// ============================================================================

pub async fn list_crops(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<CultivoFilter>,
) -> AppResult<Json<Vec<Cultivo>>> {
    current_user.0.require(Resource::Cultivos, Action::Ver)?;
    Ok(Json(crop_service(&state).list(&filter).await?))
}

pub async fn get_crop(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(cvz_id): Path<Uuid>,
) -> AppResult<Json<Cultivo>> {
    current_user.0.require(Resource::Cultivos, Action::Ver)?;
    Ok(Json(crop_service(&state).get(cvz_id).await?))
}

pub async fn create_crop(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateCultivoInput>,
) -> AppResult<(StatusCode, Json<Cultivo>)> {
    current_user.0.require(Resource::Cultivos, Action::Crear)?;
    let crop = crop_service(&state).create(input).await?;
    Ok((StatusCode::CREATED, Json(crop)))
}

pub async fn update_crop(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(cvz_id): Path<Uuid>,
    Json(input): Json<UpdateCultivoInput>,
) -> AppResult<Json<Cultivo>> {
    current_user.0.require(Resource::Cultivos, Action::Editar)?;
    Ok(Json(crop_service(&state).update(cvz_id, input).await?))
}

pub async fn delete_crop(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(cvz_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.0.require(Resource::Cultivos, Action::Eliminar)?;
    crop_service(&state).delete(cvz_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn finalize_crop(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(cvz_id): Path<Uuid>,
    body: Option<Json<FinalizeInput>>,
) -> AppResult<Json<Cultivo>> {
    current_user.0.require(Resource::Cultivos, Action::Editar)?;
    let input = body
        .map(|Json(b)| b)
        .unwrap_or(FinalizeInput { fecha_cosecha: None });
    Ok(Json(crop_service(&state).finalize(cvz_id, input).await?))
}

pub async fn set_crop_phenology(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(cvz_id): Path<Uuid>,
    Json(input): Json<PhenologyInput>,
) -> AppResult<Json<Cultivo>> {
    current_user.0.require(Resource::Cultivos, Action::Editar)?;
    Ok(Json(crop_service(&state).set_phenology(cvz_id, input).await?))
}

pub async fn set_crop_plants(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(cvz_id): Path<Uuid>,
    Json(input): Json<PlantCountInput>,
) -> AppResult<Json<Cultivo>> {
    current_user.0.require(Resource::Cultivos, Action::Editar)?;
    Ok(Json(crop_service(&state).set_plant_count(cvz_id, input).await?))
}

/// Crop workbook download
pub async fn crop_report_xlsx(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(cvz_id): Path<Uuid>,
) -> AppResult<Response> {
    current_user.0.require(Resource::Reportes, Action::Ver)?;
    let service = ReportingService::new(
        state.db.clone(),
        state.hub.clone(),
        FarmClock::from_offset_hours(state.config.reports.utc_offset_hours),
        state.config.reports.labor_hourly_rate,
    );
    let file = service.crop_workbook(cvz_id).await?;

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
