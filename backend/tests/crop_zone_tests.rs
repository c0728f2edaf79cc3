//! Zone geometry, crop lifecycle and crop report tests

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    activity_distribution, average_yield, crop_age_days, crop_financials, crop_workbook, finalize_date,
    percentage_split, polygon_area_m2, validate_plant_count, workbook_file_name, ActivityLine, CellValue,
    Coordinates, CropReportData, CropReportHeader, CropStatus, GeoPoint, SaleLine, SHEET_FINANCIAL,
    SHEET_SUMMARY,
};
use uuid::Uuid;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn report(hours: &[i64], sales: &[(i64, i64)]) -> CropReportData {
    CropReportData {
        header: CropReportHeader {
            cvz_id: Uuid::nil(),
            ficha: "2879612".to_string(),
            lote: Some("L-3".to_string()),
            nombre: "Chonto".to_string(),
            tipo_cultivo: Some("Tomate".to_string()),
            fecha_siembra: d(2025, 1, 10),
            fecha_cosecha: None,
            estado: CropStatus::EnCurso,
            cantidad_plantas_inicial: Some(200),
            cantidad_plantas_actual: Some(180),
            estado_fenologico: Some("Floración".to_string()),
            area_terreno: Some(Decimal::new(125050, 2)),
            rendimiento_promedio: None,
        },
        actividades: hours
            .iter()
            .map(|h| ActivityLine {
                id: Uuid::new_v4(),
                descripcion: "Riego".to_string(),
                fecha_asignacion: d(2025, 2, 1),
                horas_dedicadas: Decimal::from(*h),
                completada: true,
                observacion: None,
                dni_responsable: Some(1_098_765_432),
            })
            .collect(),
        cosechas: Vec::new(),
        ventas: sales
            .iter()
            .map(|(cantidad, precio)| SaleLine {
                id: Uuid::new_v4(),
                fk_cosecha_id: Uuid::nil(),
                fecha: d(2025, 4, 1),
                cantidad: Decimal::from(*cantidad),
                precio_unitario: Decimal::from(*precio),
            })
            .collect(),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[test]
fn test_polygon_area_positive_either_orientation() {
    let ring = vec![
        GeoPoint::new(4.0, -74.0),
        GeoPoint::new(4.0, -73.999),
        GeoPoint::new(4.001, -73.999),
        GeoPoint::new(4.001, -74.0),
    ];
    let mut reversed = ring.clone();
    reversed.reverse();
    let a = polygon_area_m2(&ring);
    let b = polygon_area_m2(&reversed);
    assert!(a > 12_000.0);
    assert!((a - b).abs() < 1e-6);
}

#[test]
fn test_point_zone_has_no_area() {
    let c = Coordinates::Point(GeoPoint::new(7.1, -73.1));
    assert_eq!(c.area_m2(), None);
    assert_eq!(c.centroid(), GeoPoint::new(7.1, -73.1));
}

#[test]
fn test_out_of_range_vertex_rejected() {
    let c = Coordinates::Polygon(vec![
        GeoPoint::new(0.0, 0.0),
        GeoPoint::new(0.0, 1.0),
        GeoPoint::new(91.0, 1.0),
    ]);
    let err = c.validate().unwrap_err();
    assert_eq!(err.field(), Some("coordenadas"));
}

#[test]
fn test_finalize_rules() {
    let sown = d(2025, 1, 10);
    let today = d(2025, 5, 1);
    assert_eq!(finalize_date(CropStatus::EnCurso, sown, None, today), Ok(today));
    assert!(finalize_date(CropStatus::EnCurso, sown, Some(d(2025, 1, 9)), today).is_err());
    assert!(finalize_date(CropStatus::Finalizado, sown, None, today).is_err());
}

#[test]
fn test_plant_count_cannot_grow() {
    assert!(validate_plant_count(150, Some(200)).is_ok());
    assert!(validate_plant_count(201, Some(200)).is_err());
    assert!(validate_plant_count(5, None).is_ok());
}

#[test]
fn test_average_yield() {
    assert_eq!(average_yield(Decimal::from(100), Some(40)), Some(Decimal::new(250, 2)));
    assert_eq!(average_yield(Decimal::from(100), Some(0)), None);
}

#[test]
fn test_crop_financials() {
    let data = report(&[2, 3], &[(10, 3000), (5, 2000)]);
    let fin = crop_financials(&data, Decimal::from(6000));
    assert_eq!(fin.horas_totales, Decimal::from(5));
    assert_eq!(fin.costo_mano_obra, Decimal::from(30_000));
    assert_eq!(fin.ingresos, Decimal::from(40_000));
    assert_eq!(fin.ganancia_neta, Decimal::from(10_000));
}

#[test]
fn test_workbook_sheets() {
    let data = report(&[4], &[(2, 1500)]);
    let sheets = crop_workbook(&data, Decimal::from(5000), d(2025, 5, 1));
    assert_eq!(sheets.len(), 4);
    assert_eq!(sheets[0].name, SHEET_SUMMARY);

    let nombre = sheets[0]
        .rows
        .iter()
        .find(|r| r[0] == CellValue::from("Nombre del Cultivo"))
        .unwrap();
    assert_eq!(nombre[1], CellValue::from("Tomate Chonto"));

    let financial = sheets.iter().find(|s| s.name == SHEET_FINANCIAL).unwrap();
    let neta = financial.rows.last().unwrap();
    assert_eq!(neta[2], CellValue::Number(-17_000.0));
}

#[test]
fn test_workbook_file_name_sanitized() {
    assert_eq!(
        workbook_file_name("FICHA 12/3", d(2025, 5, 1)),
        "Informe_Cultivo_FICHA_12_3_2025-05-01.xlsx"
    );
}

#[test]
fn test_distribution_groups_other_work() {
    let dist = activity_distribution(2, 2, 3, 1);
    assert_eq!(dist.ventas, 25);
    assert_eq!(dist.cosechas, 25);
    assert_eq!(dist.otros, 50);
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Non-empty splits always sum to exactly 100
    #[test]
    fn prop_percentages_sum_to_100(counts in prop::collection::vec(0u64..10_000u64, 1..6)) {
        let split = percentage_split(&counts);
        prop_assert_eq!(split.len(), counts.len());
        let total: u64 = counts.iter().sum();
        let sum: u32 = split.iter().sum();
        if total == 0 {
            prop_assert_eq!(sum, 0);
        } else {
            prop_assert_eq!(sum, 100);
        }
    }

    /// A larger count never gets a smaller share
    #[test]
    fn prop_percentages_monotonic(a in 0u64..1_000u64, b in 0u64..1_000u64, c in 0u64..1_000u64) {
        let split = percentage_split(&[a, b, c]);
        if a > b {
            prop_assert!(split[0] >= split[1]);
        }
        if b > c {
            prop_assert!(split[1] >= split[2]);
        }
    }

    /// Crop age is never negative and counts from sowing
    #[test]
    fn prop_crop_age(offset in 0i64..2_000i64, back in 0i64..50i64) {
        let sown = d(2024, 1, 1);
        let today = sown + chrono::Duration::days(offset);
        prop_assert_eq!(crop_age_days(sown, None, today), offset);
        let before = sown - chrono::Duration::days(back);
        prop_assert_eq!(crop_age_days(sown, None, before), 0);
    }

    /// Net profit is always income minus labor
    #[test]
    fn prop_net_profit(
        hours in prop::collection::vec(0i64..24i64, 0..10),
        sales in prop::collection::vec((1i64..100i64, 1i64..10_000i64), 0..10)
    ) {
        let data = report(&hours, &sales);
        let fin = crop_financials(&data, Decimal::from(5_000));
        prop_assert_eq!(fin.ganancia_neta, fin.ingresos - fin.costo_mano_obra);
        prop_assert!(fin.costo_mano_obra >= Decimal::ZERO);
    }
}
