//! User and role management handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use shared::{Action, Resource};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::user::{Rol, UpdateUserInput, UserFilter, UserService, Usuario};
use crate::AppState;

pub async fn list_users(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<UserFilter>,
) -> AppResult<Json<Vec<Usuario>>> {
    current_user.0.require(Resource::Usuarios, Action::Ver)?;
    let users = UserService::new(state.db).list(&filter).await?;
    Ok(Json(users))
}

/// Users may always read their own record
pub async fn get_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Usuario>> {
    if current_user.0.user_id != user_id {
        current_user.0.require(Resource::Usuarios, Action::Ver)?;
    }
    let user = UserService::new(state.db).get(user_id).await?;
    Ok(Json(user))
}

/// Users may edit their own contact data; role and status need an administrator
pub async fn update_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
    Json(input): Json<UpdateUserInput>,
) -> AppResult<Json<Usuario>> {
    if current_user.0.user_id != user_id {
        current_user.0.require(Resource::Usuarios, Action::Editar)?;
    }
    let user = UserService::new(state.db)
        .update(user_id, input, current_user.0.is_admin())
        .await?;
    Ok(Json(user))
}

pub async fn deactivate_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Usuario>> {
    current_user.0.require(Resource::Usuarios, Action::Eliminar)?;
    let user = UserService::new(state.db)
        .deactivate(user_id, current_user.0.user_id)
        .await?;
    Ok(Json(user))
}

pub async fn list_roles(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Rol>>> {
    current_user.0.require(Resource::Usuarios, Action::Ver)?;
    let roles = UserService::new(state.db).list_roles().await?;
    Ok(Json(roles))
}
