//! Inventory HTTP handlers: products and stock movements

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
use crate::services::inventory::{
    CreateProductInput, InventoryService, MovementFilter, MovimientoInventario, Producto,
    ProductFilter, RecordMovementInput, UpdateProductInput,
};
use crate::services::ReportingService;
use crate::AppState;

fn inventory_service(state: &AppState) -> InventoryService {
    InventoryService::new(
        state.db.clone(),
        state.hub.clone(),
        FarmClock::from_offset_hours(state.config.reports.utc_offset_hours),
    )
}

// ============================================================================
// Products
// ============================================================================

pub async fn list_products(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<ProductFilter>,
) -> AppResult<Json<Vec<Producto>>> {
    current_user.0.require(Resource::Inventario, Action::Ver)?;
    Ok(Json(inventory_service(&state).list_products(&filter).await?))
}

/// Products at or below their minimum stock
pub async fn list_low_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Producto>>> {
    current_user.0.require(Resource::Inventario, Action::Ver)?;
    Ok(Json(inventory_service(&state).low_stock().await?))
}

pub async fn get_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Producto>> {
    current_user.0.require(Resource::Inventario, Action::Ver)?;
    Ok(Json(inventory_service(&state).get_product(product_id).await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateProductInput>,
) -> AppResult<(StatusCode, Json<Producto>)> {
    current_user.0.require(Resource::Inventario, Action::Crear)?;
    let product = inventory_service(&state).create_product(input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<UpdateProductInput>,
) -> AppResult<Json<Producto>> {
    current_user.0.require(Resource::Inventario, Action::Editar)?;
    Ok(Json(inventory_service(&state).update_product(product_id, input).await?))
}

pub async fn delete_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.0.require(Resource::Inventario, Action::Eliminar)?;
    inventory_service(&state).delete_product(product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Movements
// ============================================================================

pub async fn list_movements(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<MovementFilter>,
) -> AppResult<Json<Vec<MovimientoInventario>>> {
    current_user.0.require(Resource::Inventario, Action::Ver)?;
    Ok(Json(inventory_service(&state).list_movements(&filter).await?))
}

pub async fn get_movement(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(movement_id): Path<Uuid>,
) -> AppResult<Json<MovimientoInventario>> {
    current_user.0.require(Resource::Inventario, Action::Ver)?;
    Ok(Json(inventory_service(&state).get_movement(movement_id).await?))
}

/// Record an entrada, salida or ajuste
pub async fn record_movement(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<RecordMovementInput>,
) -> AppResult<(StatusCode, Json<MovimientoInventario>)> {
    current_user.0.require(Resource::Inventario, Action::Crear)?;
    let movement = inventory_service(&state)
        .record_movement(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

pub async fn export_movements_csv(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<MovementFilter>,
) -> AppResult<Response> {
    current_user.0.require(Resource::Inventario, Action::Ver)?;
    let service = inventory_service(&state);
    let movements = service.list_movements(&filter).await?;
    let csv = ReportingService::export_to_csv(&service.csv_rows(&movements))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"movimientos_inventario.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}
