//! Route definitions for the AgroTIC platform

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes (public)
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh))
        // Gateway ingestion (signed, no bearer token)
        .route("/medicion-sensor/ingest", post(handlers::ingest_readings))
        // Realtime push (token in query string)
        .route("/ws", get(handlers::ws_handler))
        // Protected routes
        .merge(protected_routes(state))
}

/// Routes that require a bearer token
fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(handlers::me))
        .route("/dashboard", get(handlers::get_dashboard))
        .merge(user_routes())
        .merge(zone_routes())
        .merge(crop_routes())
        .merge(activity_routes())
        .merge(harvest_routes())
        .merge(sale_routes())
        .merge(inventory_routes())
        .merge(sensor_routes())
        .merge(notification_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// User and role management routes
fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/usuarios", get(handlers::list_users))
        .route(
            "/usuarios/:user_id",
            get(handlers::get_user).put(handlers::update_user),
        )
        .route("/usuarios/:user_id/desactivar", post(handlers::deactivate_user))
        .route("/roles", get(handlers::list_roles))
}

/// Zone and map routes
fn zone_routes() -> Router<AppState> {
    Router::new()
        .route("/zonas", get(handlers::list_zones).post(handlers::create_zone))
        .route(
            "/zonas/:zone_id",
            get(handlers::get_zone)
                .put(handlers::update_zone)
                .delete(handlers::delete_zone),
        )
        .route("/zonas/:zone_id/cultivos", get(handlers::list_zone_crops))
        .route("/mapas", get(handlers::list_maps).post(handlers::create_map))
}

/// Crop catalog and crop record routes
fn crop_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/tipos-cultivo",
            get(handlers::list_crop_types).post(handlers::create_crop_type),
        )
        .route(
            "/tipos-cultivo/:id",
            put(handlers::update_crop_type).delete(handlers::delete_crop_type),
        )
        .route(
            "/variedades",
            get(handlers::list_varieties).post(handlers::create_variety),
        )
        .route(
            "/variedades/:id",
            put(handlers::update_variety).delete(handlers::delete_variety),
        )
        .route(
            "/estados-fenologicos",
            get(handlers::list_stages).post(handlers::create_stage),
        )
        .route(
            "/estados-fenologicos/:id",
            put(handlers::update_stage).delete(handlers::delete_stage),
        )
        .route("/cultivos", get(handlers::list_crops).post(handlers::create_crop))
        .route(
            "/cultivos/:cvz_id",
            get(handlers::get_crop)
                .put(handlers::update_crop)
                .delete(handlers::delete_crop),
        )
        .route("/cultivos/:cvz_id/finalizar", post(handlers::finalize_crop))
        .route(
            "/cultivos/:cvz_id/estado-fenologico",
            put(handlers::set_crop_phenology),
        )
        .route("/cultivos/:cvz_id/plantas", put(handlers::set_crop_plants))
        .route("/cultivos/:cvz_id/informe.xlsx", get(handlers::crop_report_xlsx))
}

/// Field activity routes
fn activity_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/actividades",
            get(handlers::list_activities).post(handlers::create_activity),
        )
        .route(
            "/actividades/:id",
            get(handlers::get_activity)
                .put(handlers::update_activity)
                .delete(handlers::delete_activity),
        )
        .route("/actividades/:id/completar", post(handlers::complete_activity))
}

/// Harvest routes
fn harvest_routes() -> Router<AppState> {
    Router::new()
        .route("/cosechas", get(handlers::list_harvests).post(handlers::create_harvest))
        .route(
            "/cosechas/:harvest_id",
            get(handlers::get_harvest)
                .put(handlers::update_harvest)
                .delete(handlers::delete_harvest),
        )
        .route("/cosechas/:harvest_id/cerrar", post(handlers::close_harvest))
}

/// Sales routes
fn sale_routes() -> Router<AppState> {
    Router::new()
        .route("/ventas", get(handlers::list_sales).post(handlers::create_sale))
        .route("/ventas/export.csv", get(handlers::export_sales_csv))
        .route(
            "/ventas/:sale_id",
            get(handlers::get_sale).delete(handlers::delete_sale),
        )
}

/// Inventory routes
fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/productos",
            get(handlers::list_products).post(handlers::create_product),
        )
        .route("/productos/bajo-stock", get(handlers::list_low_stock))
        .route(
            "/productos/:product_id",
            get(handlers::get_product)
                .put(handlers::update_product)
                .delete(handlers::delete_product),
        )
        .route(
            "/movimientos-inventario",
            get(handlers::list_movements).post(handlers::record_movement),
        )
        .route(
            "/movimientos-inventario/export.csv",
            get(handlers::export_movements_csv),
        )
        .route(
            "/movimientos-inventario/:movement_id",
            get(handlers::get_movement),
        )
}

/// Sensor configuration, readings and sensor report routes
fn sensor_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/mqtt-config",
            get(handlers::list_mqtt_configs).post(handlers::create_mqtt_config),
        )
        .route(
            "/mqtt-config/:config_id",
            get(handlers::get_mqtt_config)
                .put(handlers::update_mqtt_config)
                .delete(handlers::delete_mqtt_config),
        )
        .route(
            "/mqtt-config/:config_id/umbrales",
            get(handlers::list_thresholds)
                .post(handlers::upsert_threshold)
                .put(handlers::upsert_threshold),
        )
        .route(
            "/mqtt-config/:config_id/umbrales/:threshold_id",
            delete(handlers::delete_threshold),
        )
        .route(
            "/medicion-sensor",
            get(handlers::list_readings).post(handlers::create_readings),
        )
        .route("/medicion-sensor/search-data", get(handlers::search_sensor_data))
        .route("/medicion-sensor/report-data", post(handlers::sensor_report_data))
        .route("/medicion-sensor/report.pdf", post(handlers::sensor_report_pdf))
}

/// Notification routes
fn notification_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/notificaciones",
            get(handlers::list_notifications).post(handlers::create_notification),
        )
        .route("/notificaciones/no-leidas/count", get(handlers::unread_count))
        .route("/notificaciones/leer-todas", post(handlers::mark_all_read))
        .route("/notificaciones/:id/leer", post(handlers::mark_read))
}
