//! Zone and map HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{Action, FarmClock, Resource};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::crop::{CropService, Cultivo};
use crate::services::zone::{
    CreateMapInput, CreateZoneInput, Mapa, UpdateZoneInput, ZoneFilter, ZoneService, Zona,
};
use crate::AppState;

pub async fn list_zones(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<ZoneFilter>,
) -> AppResult<Json<Vec<Zona>>> {
    current_user.0.require(Resource::Zonas, Action::Ver)?;
    let zones = ZoneService::new(state.db).list(&filter).await?;
    Ok(Json(zones))
}

pub async fn get_zone(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(zone_id): Path<Uuid>,
) -> AppResult<Json<Zona>> {
    current_user.0.require(Resource::Zonas, Action::Ver)?;
    let zone = ZoneService::new(state.db).get(zone_id).await?;
    Ok(Json(zone))
}

pub async fn create_zone(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateZoneInput>,
) -> AppResult<(StatusCode, Json<Zona>)> {
    current_user.0.require(Resource::Zonas, Action::Crear)?;
    let zone = ZoneService::new(state.db).create(input).await?;
    Ok((StatusCode::CREATED, Json(zone)))
}

pub async fn update_zone(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(zone_id): Path<Uuid>,
    Json(input): Json<UpdateZoneInput>,
) -> AppResult<Json<Zona>> {
    current_user.0.require(Resource::Zonas, Action::Editar)?;
    let zone = ZoneService::new(state.db).update(zone_id, input).await?;
    Ok(Json(zone))
}

pub async fn delete_zone(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(zone_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.0.require(Resource::Zonas, Action::Eliminar)?;
    ZoneService::new(state.db).delete(zone_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Crops planted in a zone
pub async fn list_zone_crops(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(zone_id): Path<Uuid>,
) -> AppResult<Json<Vec<Cultivo>>> {
    current_user.0.require(Resource::Cultivos, Action::Ver)?;
    let clock = FarmClock::from_offset_hours(state.config.reports.utc_offset_hours);
    ZoneService::new(state.db.clone()).get(zone_id).await?;
    let crops = CropService::new(state.db, clock).list_by_zone(zone_id).await?;
    Ok(Json(crops))
}

pub async fn list_maps(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Mapa>>> {
    current_user.0.require(Resource::Zonas, Action::Ver)?;
    let maps = ZoneService::new(state.db).list_maps().await?;
    Ok(Json(maps))
}

pub async fn create_map(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateMapInput>,
) -> AppResult<(StatusCode, Json<Mapa>)> {
    current_user.0.require(Resource::Zonas, Action::Crear)?;
    let map = ZoneService::new(state.db).create_map(input).await?;
    Ok((StatusCode::CREATED, Json(map)))
}
