//! Authentication handlers

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    Json,
};

use crate::error::AppResult;
use crate::middleware::{auth::authenticate, CurrentUser};
use crate::services::auth::{AuthResponse, LoginInput, Profile, RefreshInput, RegisterInput};
use crate::services::AuthService;
use crate::AppState;

/// Register endpoint handler
///
/// Public, but an administrator's bearer token lets the caller pick the role.
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RegisterInput>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let by_admin = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .and_then(|token| authenticate(token, &state.config.jwt.secret).ok())
        .map(|user| user.is_admin())
        .unwrap_or(false);

    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let response = auth_service.register(body, by_admin).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Login endpoint handler
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginInput>,
) -> AppResult<Json<AuthResponse>> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let response = auth_service.login(body).await?;
    Ok(Json(response))
}

/// Refresh token endpoint handler
pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshInput>,
) -> AppResult<Json<AuthResponse>> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let response = auth_service.refresh_token(&body.refresh_token).await?;
    Ok(Json(response))
}

/// Current user profile with permissions
pub async fn me(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Profile>> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let profile = auth_service.me(current_user.0.user_id).await?;
    Ok(Json(profile))
}
