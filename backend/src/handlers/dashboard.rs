//! Dashboard handler

use axum::{
    extract::{Query, State},
    Json,
};
use shared::FarmClock;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::dashboard::{DashboardQuery, DashboardService, DashboardSummary};
use crate::AppState;

/// Home screen summary for the current user
pub async fn get_dashboard(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<DashboardQuery>,
) -> AppResult<Json<DashboardSummary>> {
    let service = DashboardService::new(
        state.db.clone(),
        state.hub.clone(),
        FarmClock::from_offset_hours(state.config.reports.utc_offset_hours),
    );
    let summary = service.summary(current_user.0.user_id, &query).await?;
    Ok(Json(summary))
}
