//! WebAssembly module for the AgroTIC farm management platform
//!
//! Provides client-side computation for:
//! - Zone area from the map editor polygon
//! - Inventory movement previews
//! - Sale totals and harvest availability
//! - Sensor report previews and form validation

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::debug_1(&JsValue::from_str("agrotic-wasm ready"));
}

fn js_error(context: &str, e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{}: {}", context, e))
}

fn to_decimal(value: f64) -> Result<Decimal, JsValue> {
    Decimal::try_from(value).map_err(|e| js_error("Invalid number", e))
}

/// Area in square meters of a polygon given as `[{lat, lng}, ...]`
#[wasm_bindgen]
pub fn zone_area_m2(points_json: &str) -> Result<f64, JsValue> {
    let points: Vec<GeoPoint> =
        serde_json::from_str(points_json).map_err(|e| js_error("Invalid points JSON", e))?;
    let coords = Coordinates::Polygon(points);
    coords.validate().map_err(|e| js_error("Invalid polygon", e))?;
    Ok(coords.area_m2().and_then(|a| a.to_f64()).unwrap_or(0.0))
}

/// Stock after a movement, or an error message when it would go negative
#[wasm_bindgen]
pub fn preview_movement(
    tipo: &str,
    cantidad: f64,
    capacidad_presentacion: f64,
    stock: f64,
    stock_minimo: f64,
) -> Result<f64, JsValue> {
    let tipo: MovementType = tipo.parse().map_err(|e| js_error("Invalid movement type", e))?;
    let outcome = apply_movement(
        tipo,
        to_decimal(cantidad)?,
        to_decimal(capacidad_presentacion)?,
        to_decimal(stock)?,
        to_decimal(stock_minimo)?,
    )
    .map_err(|e| js_error("Movement rejected", e))?;
    Ok(outcome.stock_resultante.to_f64().unwrap_or(0.0))
}

/// Total price of a sale rounded to cents
#[wasm_bindgen]
pub fn calculate_sale_total(cantidad: f64, precio_unitario: f64) -> Result<f64, JsValue> {
    let cantidad = to_decimal(cantidad)?;
    let precio_unitario = to_decimal(precio_unitario)?;
    validate_amount("cantidad", cantidad, MAX_AMOUNT).map_err(|e| js_error("Sale rejected", e))?;
    validate_amount("precioUnitario", precio_unitario, MAX_AMOUNT)
        .map_err(|e| js_error("Sale rejected", e))?;
    Ok(sale_total(cantidad, precio_unitario).to_f64().unwrap_or(0.0))
}

/// Whether a sale of `cantidad` fits in what is left of the harvest
#[wasm_bindgen]
pub fn can_sell(cantidad_disponible: f64, cerrado: bool, cantidad: f64) -> bool {
    if cerrado || cantidad <= 0.0 {
        return false;
    }
    cantidad <= cantidad_disponible
}

/// Days since sowing; uses the harvest date once the crop is finalized.
/// `today` defaults to the browser's local date.
#[wasm_bindgen]
pub fn crop_age(sowing: &str, harvest: Option<String>, today: Option<String>) -> Result<i64, JsValue> {
    let parse = |s: &str| {
        chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| js_error("Invalid date", e))
    };
    let harvest = match harvest {
        Some(h) => Some(parse(&h)?),
        None => None,
    };
    let today = match today {
        Some(t) => parse(&t)?,
        None => browser_today()?,
    };
    Ok(crop_age_days(parse(sowing)?, harvest, today))
}

fn browser_today() -> Result<chrono::NaiveDate, JsValue> {
    let now = js_sys::Date::new_0();
    chrono::NaiveDate::from_ymd_opt(now.get_full_year() as i32, now.get_month() + 1, now.get_date())
        .ok_or_else(|| JsValue::from_str("Invalid browser date"))
}

/// Aggregate sensor samples the same way the report endpoint does
///
/// Takes the samples and the report request as JSON and returns the report
/// rows as JSON.
#[wasm_bindgen]
pub fn aggregate_sensor_report(samples_json: &str, request_json: &str, utc_offset_hours: i32) -> Result<String, JsValue> {
    let samples: Vec<SensorSample> =
        serde_json::from_str(samples_json).map_err(|e| js_error("Invalid samples JSON", e))?;
    let request: ReportDataRequest =
        serde_json::from_str(request_json).map_err(|e| js_error("Invalid request JSON", e))?;
    request.validate().map_err(|e| js_error("Invalid request", e))?;
    let rows = aggregate_report(&samples, &request, &FarmClock::from_offset_hours(utc_offset_hours));
    serde_json::to_string(&rows).map_err(|e| js_error("Encoding failed", e))
}

/// Label for a time slot index (0 = morning ... 3 = night)
#[wasm_bindgen]
pub fn time_slot_label(index: u8) -> String {
    TimeSlot::from_index(index)
        .map(|s| s.label_es().to_string())
        .unwrap_or_default()
}

/// Validate a sensor key typed in the threshold form
#[wasm_bindgen]
pub fn is_valid_sensor_key(key: &str) -> bool {
    validate_sensor_key(key).is_ok()
}

/// Validate a Colombian mobile number
#[wasm_bindgen]
pub fn is_valid_phone(phone: &str) -> bool {
    validate_colombian_phone(phone).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_sell() {
        assert!(can_sell(10.0, false, 10.0));
        assert!(!can_sell(10.0, false, 10.5));
        assert!(!can_sell(10.0, true, 1.0));
        assert!(!can_sell(10.0, false, 0.0));
    }

    #[test]
    fn test_time_slot_label() {
        assert_eq!(time_slot_label(0), "Mañana (6:00-12:00)");
        assert_eq!(time_slot_label(9), "");
    }

    #[test]
    fn test_sensor_key() {
        assert!(is_valid_sensor_key("temp_aire"));
        assert!(!is_valid_sensor_key("temp aire"));
    }

    #[test]
    fn test_phone() {
        assert!(is_valid_phone("3105551234"));
        assert!(!is_valid_phone("12345"));
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    fn test_sale_total_in_browser() {
        assert_eq!(calculate_sale_total(2.5, 3000.0).unwrap(), 7500.0);
        assert!(calculate_sale_total(1e28, 10.0).is_err());
    }

    #[wasm_bindgen_test]
    fn test_movement_preview_in_browser() {
        assert_eq!(preview_movement("entrada", 3.0, 25.0, 0.0, 10.0).unwrap(), 75.0);
        assert!(preview_movement("salida", 2.0, 1.0, 1.0, 0.0).is_err());
        assert!(preview_movement("entrada", 1e28, 10.0, 0.0, 0.0).is_err());
        assert!(preview_movement("traslado", 1.0, 1.0, 0.0, 0.0).is_err());
    }

    #[wasm_bindgen_test]
    fn test_crop_age_defaults_to_browser_date() {
        assert_eq!(
            crop_age("2025-01-01", None, Some("2025-01-31".to_string())).unwrap(),
            30
        );
        assert!(crop_age("2000-01-01", None, None).unwrap() > 9000);
    }
}
