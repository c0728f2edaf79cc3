//! Field activity HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{Action, Resource};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::activity::{
    ActivityFilter, ActivityService, Actividad, CompleteActivityInput, CreateActivityInput,
    UpdateActivityInput,
};
use crate::AppState;

pub async fn list_activities(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<ActivityFilter>,
) -> AppResult<Json<Vec<Actividad>>> {
    current_user.0.require(Resource::Actividades, Action::Ver)?;
    let service = ActivityService::new(state.db, state.hub);
    Ok(Json(service.list(&filter).await?))
}

pub async fn get_activity(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Actividad>> {
    current_user.0.require(Resource::Actividades, Action::Ver)?;
    let service = ActivityService::new(state.db, state.hub);
    Ok(Json(service.get(id).await?))
}

pub async fn create_activity(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateActivityInput>,
) -> AppResult<(StatusCode, Json<Actividad>)> {
    current_user.0.require(Resource::Actividades, Action::Crear)?;
    let service = ActivityService::new(state.db, state.hub);
    let activity = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

pub async fn update_activity(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateActivityInput>,
) -> AppResult<Json<Actividad>> {
    current_user.0.require(Resource::Actividades, Action::Editar)?;
    let service = ActivityService::new(state.db, state.hub);
    Ok(Json(service.update(id, input).await?))
}

pub async fn delete_activity(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.0.require(Resource::Actividades, Action::Eliminar)?;
    ActivityService::new(state.db, state.hub).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn complete_activity(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
    body: Option<Json<CompleteActivityInput>>,
) -> AppResult<Json<Actividad>> {
    current_user.0.require(Resource::Actividades, Action::Editar)?;
    let input = body.map(|Json(b)| b).unwrap_or_default();
    let service = ActivityService::new(state.db, state.hub);
    Ok(Json(service.complete(id, input).await?))
}
