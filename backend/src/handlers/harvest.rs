//! Harvest management HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{Action, Resource};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::harvest::{
    Cosecha, CreateHarvestInput, HarvestFilter, HarvestService, UpdateHarvestInput,
};
use crate::AppState;

/// List harvests, optionally for one planting
pub async fn list_harvests(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<HarvestFilter>,
) -> AppResult<Json<Vec<Cosecha>>> {
    current_user.0.require(Resource::Cosechas, Action::Ver)?;
    let service = HarvestService::new(state.db, state.hub);
    Ok(Json(service.list(&filter).await?))
}

pub async fn get_harvest(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(harvest_id): Path<Uuid>,
) -> AppResult<Json<Cosecha>> {
    current_user.0.require(Resource::Cosechas, Action::Ver)?;
    let service = HarvestService::new(state.db, state.hub);
    Ok(Json(service.get(harvest_id).await?))
}

/// Record a new harvest
pub async fn create_harvest(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateHarvestInput>,
) -> AppResult<(StatusCode, Json<Cosecha>)> {
    current_user.0.require(Resource::Cosechas, Action::Crear)?;
    let service = HarvestService::new(state.db, state.hub);
    let harvest = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(harvest)))
}

pub async fn update_harvest(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(harvest_id): Path<Uuid>,
    Json(input): Json<UpdateHarvestInput>,
) -> AppResult<Json<Cosecha>> {
    current_user.0.require(Resource::Cosechas, Action::Editar)?;
    let service = HarvestService::new(state.db, state.hub);
    Ok(Json(service.update(harvest_id, input).await?))
}

pub async fn delete_harvest(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(harvest_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.0.require(Resource::Cosechas, Action::Eliminar)?;
    HarvestService::new(state.db, state.hub).delete(harvest_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Close a harvest to further sales
pub async fn close_harvest(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(harvest_id): Path<Uuid>,
) -> AppResult<Json<Cosecha>> {
    current_user.0.require(Resource::Cosechas, Action::Editar)?;
    let service = HarvestService::new(state.db, state.hub);
    Ok(Json(service.close(harvest_id).await?))
}
