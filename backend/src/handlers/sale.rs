//! Sales HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use shared::{Action, Resource};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::sale::{CreateSaleInput, SaleFilter, SaleService, Venta, VentaCsvRow};
use crate::services::ReportingService;
use crate::AppState;

pub async fn list_sales(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<SaleFilter>,
) -> AppResult<Json<Vec<Venta>>> {
    current_user.0.require(Resource::Ventas, Action::Ver)?;
    let service = SaleService::new(state.db, state.hub);
    Ok(Json(service.list(&filter).await?))
}

pub async fn get_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(sale_id): Path<Uuid>,
) -> AppResult<Json<Venta>> {
    current_user.0.require(Resource::Ventas, Action::Ver)?;
    let service = SaleService::new(state.db, state.hub);
    Ok(Json(service.get(sale_id).await?))
}

pub async fn create_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateSaleInput>,
) -> AppResult<(StatusCode, Json<Venta>)> {
    current_user.0.require(Resource::Ventas, Action::Crear)?;
    let service = SaleService::new(state.db, state.hub);
    let sale = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

pub async fn delete_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(sale_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.0.require(Resource::Ventas, Action::Eliminar)?;
    SaleService::new(state.db, state.hub).delete(sale_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Sales listing as CSV, same filters as the JSON listing
pub async fn export_sales_csv(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<SaleFilter>,
) -> AppResult<Response> {
    current_user.0.require(Resource::Ventas, Action::Ver)?;
    let sales = SaleService::new(state.db, state.hub).list(&filter).await?;
    let rows: Vec<VentaCsvRow> = sales.iter().map(VentaCsvRow::from).collect();
    let csv = ReportingService::export_to_csv(&rows)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"ventas.csv\""),
        ],
        csv,
    )
        .into_response())
}
