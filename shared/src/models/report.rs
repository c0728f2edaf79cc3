//! Crop report workbook content
//!
//! The sheets are described as plain rows of cells so the same content can
//! be written to a spreadsheet on the server or previewed in the browser.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{crop_age_days, labor_cost, sale_total, CropStatus};
use crate::types::format_date_es;

pub const SHEET_SUMMARY: &str = "Resumen del Cultivo";
pub const SHEET_ACTIVITIES: &str = "Actividades";
pub const SHEET_FINANCIAL: &str = "Financieros";
pub const SHEET_HARVESTS_SALES: &str = "Cosechas y Ventas";

/// Single spreadsheet cell
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Number(f64),
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<Decimal> for CellValue {
    fn from(d: Decimal) -> Self {
        CellValue::Number(d.to_f64().unwrap_or_default())
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

/// A named sheet with a header row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkbookSheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl WorkbookSheet {
    fn new(name: &str, headers: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: Vec<CellValue>) {
        self.rows.push(row);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropReportHeader {
    pub cvz_id: Uuid,
    pub ficha: String,
    pub lote: Option<String>,
    pub nombre: String,
    pub tipo_cultivo: Option<String>,
    pub fecha_siembra: NaiveDate,
    pub fecha_cosecha: Option<NaiveDate>,
    pub estado: CropStatus,
    pub cantidad_plantas_inicial: Option<i32>,
    pub cantidad_plantas_actual: Option<i32>,
    pub estado_fenologico: Option<String>,
    pub area_terreno: Option<Decimal>,
    pub rendimiento_promedio: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLine {
    pub id: Uuid,
    pub descripcion: String,
    pub fecha_asignacion: NaiveDate,
    pub horas_dedicadas: Decimal,
    pub completada: bool,
    pub observacion: Option<String>,
    pub dni_responsable: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestLine {
    pub id: Uuid,
    pub fecha: NaiveDate,
    pub cantidad: Decimal,
    pub unidad_medida: String,
    pub cantidad_disponible: Decimal,
    pub cerrado: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleLine {
    pub id: Uuid,
    pub fk_cosecha_id: Uuid,
    pub fecha: NaiveDate,
    pub cantidad: Decimal,
    pub precio_unitario: Decimal,
}

/// Everything the crop workbook is built from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropReportData {
    pub header: CropReportHeader,
    pub actividades: Vec<ActivityLine>,
    pub cosechas: Vec<HarvestLine>,
    pub ventas: Vec<SaleLine>,
}

/// Money summary of a crop
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CropFinancials {
    pub horas_totales: Decimal,
    pub costo_mano_obra: Decimal,
    pub ingresos: Decimal,
    pub ganancia_neta: Decimal,
}

pub fn crop_financials(data: &CropReportData, hourly_rate: Decimal) -> CropFinancials {
    let horas_totales: Decimal = data.actividades.iter().map(|a| a.horas_dedicadas).sum();
    let costo_mano_obra = labor_cost(horas_totales, hourly_rate);
    let ingresos: Decimal = data
        .ventas
        .iter()
        .map(|v| sale_total(v.cantidad, v.precio_unitario))
        .sum();
    CropFinancials {
        horas_totales,
        costo_mano_obra,
        ingresos,
        ganancia_neta: ingresos - costo_mano_obra,
    }
}

pub fn workbook_file_name(ficha: &str, date: NaiveDate) -> String {
    let safe: String = ficha
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("Informe_Cultivo_{}_{}.xlsx", safe, date.format("%Y-%m-%d"))
}

fn money(d: Decimal) -> String {
    format!("{:.2}", d.round_dp(2))
}

fn or_text<T: ToString>(value: Option<T>, fallback: &str) -> CellValue {
    match value {
        Some(v) => CellValue::Text(v.to_string()),
        None => CellValue::from(fallback),
    }
}

/// Build the four sheets of the crop report
pub fn crop_workbook(data: &CropReportData, hourly_rate: Decimal, today: NaiveDate) -> Vec<WorkbookSheet> {
    let h = &data.header;
    let fin = crop_financials(data, hourly_rate);

    let mut resumen = WorkbookSheet::new(SHEET_SUMMARY, &["Campo", "Valor"]);
    let nombre = match &h.tipo_cultivo {
        Some(tipo) => format!("{} {}", tipo, h.nombre).trim().to_string(),
        None => h.nombre.clone(),
    };
    let edad = crop_age_days(h.fecha_siembra, h.fecha_cosecha, today);
    let summary_rows: Vec<(&str, CellValue)> = vec![
        ("ID del Cultivo", h.cvz_id.to_string().into()),
        ("Ficha", h.ficha.clone().into()),
        ("Lote", or_text(h.lote.as_deref(), "N/A")),
        ("Nombre del Cultivo", nombre.into()),
        ("Fecha de Siembra", format_date_es(h.fecha_siembra).into()),
        ("Fecha de Cosecha", or_text(h.fecha_cosecha.map(format_date_es), "N/A")),
        ("Edad del Cultivo", format!("{} días", edad).into()),
        ("Cantidad de Plantas Inicial", or_text(h.cantidad_plantas_inicial, "No registrado")),
        ("Cantidad de Plantas Actual", or_text(h.cantidad_plantas_actual, "No registrado")),
        ("Estado Fenológico", or_text(h.estado_fenologico.as_deref(), "No definido")),
        ("Área del Terreno", or_text(h.area_terreno.map(|a| format!("{} m²", a.normalize())), "N/A")),
        (
            "Rendimiento Promedio",
            or_text(h.rendimiento_promedio.map(|r| format!("{} kg/planta", money(r))), "Sin datos"),
        ),
        (
            "Estado",
            match h.estado {
                CropStatus::EnCurso => "En Curso".into(),
                CropStatus::Finalizado => "Finalizado".into(),
            },
        ),
        ("Total Actividades", (data.actividades.len() as i64).into()),
        ("Total Cosechas", (data.cosechas.len() as i64).into()),
        ("Total Ventas", (data.ventas.len() as i64).into()),
        ("Ingresos Totales", money(fin.ingresos).into()),
        ("Fecha de Exportación", format_date_es(today).into()),
    ];
    for (campo, valor) in summary_rows {
        resumen.push(vec![campo.into(), valor]);
    }

    let mut actividades = WorkbookSheet::new(
        SHEET_ACTIVITIES,
        &[
            "ID",
            "Descripción",
            "Fecha Asignación",
            "Horas Dedicadas",
            "Estado",
            "Observación",
            "Responsable",
        ],
    );
    for a in &data.actividades {
        actividades.push(vec![
            a.id.to_string().into(),
            a.descripcion.clone().into(),
            format_date_es(a.fecha_asignacion).into(),
            a.horas_dedicadas.into(),
            if a.completada { "Completada" } else { "Pendiente" }.into(),
            a.observacion.clone().unwrap_or_default().into(),
            or_text(a.dni_responsable, "N/A"),
        ]);
    }

    let mut financieros = WorkbookSheet::new(SHEET_FINANCIAL, &["Categoría", "Descripción", "Monto", "Tipo"]);
    financieros.push(vec![
        "Mano de Obra".into(),
        "Costo estimado de actividades".into(),
        fin.costo_mano_obra.into(),
        "Gasto".into(),
    ]);
    financieros.push(vec!["Ventas".into(), "Ingresos por ventas".into(), fin.ingresos.into(), "Ingreso".into()]);
    financieros.push(vec!["Total Gastos".into(), "".into(), fin.costo_mano_obra.into(), "".into()]);
    financieros.push(vec!["Total Ingresos".into(), "".into(), fin.ingresos.into(), "".into()]);
    financieros.push(vec!["Ganancia Neta".into(), "".into(), fin.ganancia_neta.into(), "".into()]);

    let mut cosechas_ventas = WorkbookSheet::new(
        SHEET_HARVESTS_SALES,
        &[
            "ID Cosecha",
            "Fecha Cosecha",
            "Cantidad",
            "Unidad",
            "Disponible",
            "Estado",
            "ID Venta",
            "Fecha Venta",
            "Precio Unitario",
            "Total Venta",
        ],
    );
    for c in &data.cosechas {
        let harvest_cells = || -> Vec<CellValue> {
            vec![
                c.id.to_string().into(),
                format_date_es(c.fecha).into(),
                c.cantidad.into(),
                c.unidad_medida.clone().into(),
                c.cantidad_disponible.into(),
                if c.cerrado { "Cerrada" } else { "Abierta" }.into(),
            ]
        };
        let sales: Vec<&SaleLine> = data.ventas.iter().filter(|v| v.fk_cosecha_id == c.id).collect();
        if sales.is_empty() {
            let mut row = harvest_cells();
            let no_sale: [CellValue; 4] = [
                "Sin venta".into(),
                "N/A".into(),
                Decimal::ZERO.into(),
                Decimal::ZERO.into(),
            ];
            row.extend(no_sale);
            cosechas_ventas.push(row);
            continue;
        }
        for v in sales {
            let mut row = harvest_cells();
            let sale: [CellValue; 4] = [
                v.id.to_string().into(),
                format_date_es(v.fecha).into(),
                v.precio_unitario.into(),
                sale_total(v.cantidad, v.precio_unitario).into(),
            ];
            row.extend(sale);
            cosechas_ventas.push(row);
        }
    }

    vec![resumen, actividades, financieros, cosechas_ventas]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample() -> CropReportData {
        let cosecha_a = Uuid::new_v4();
        let cosecha_b = Uuid::new_v4();
        CropReportData {
            header: CropReportHeader {
                cvz_id: Uuid::new_v4(),
                ficha: "F-001".to_string(),
                lote: Some("L1".to_string()),
                nombre: "Cherry".to_string(),
                tipo_cultivo: Some("Tomate".to_string()),
                fecha_siembra: d(2025, 1, 1),
                fecha_cosecha: None,
                estado: CropStatus::EnCurso,
                cantidad_plantas_inicial: Some(100),
                cantidad_plantas_actual: Some(90),
                estado_fenologico: None,
                area_terreno: None,
                rendimiento_promedio: None,
            },
            actividades: vec![ActivityLine {
                id: Uuid::new_v4(),
                descripcion: "Riego".to_string(),
                fecha_asignacion: d(2025, 1, 5),
                horas_dedicadas: Decimal::from(3),
                completada: true,
                observacion: None,
                dni_responsable: Some(1_000_000),
            }],
            cosechas: vec![
                HarvestLine {
                    id: cosecha_a,
                    fecha: d(2025, 3, 1),
                    cantidad: Decimal::from(50),
                    unidad_medida: "kg".to_string(),
                    cantidad_disponible: Decimal::from(20),
                    cerrado: false,
                },
                HarvestLine {
                    id: cosecha_b,
                    fecha: d(2025, 3, 8),
                    cantidad: Decimal::from(10),
                    unidad_medida: "kg".to_string(),
                    cantidad_disponible: Decimal::from(10),
                    cerrado: false,
                },
            ],
            ventas: vec![
                SaleLine {
                    id: Uuid::new_v4(),
                    fk_cosecha_id: cosecha_a,
                    fecha: d(2025, 3, 2),
                    cantidad: Decimal::from(20),
                    precio_unitario: Decimal::from(2),
                },
                SaleLine {
                    id: Uuid::new_v4(),
                    fk_cosecha_id: cosecha_a,
                    fecha: d(2025, 3, 3),
                    cantidad: Decimal::from(10),
                    precio_unitario: Decimal::from(3),
                },
            ],
        }
    }

    #[test]
    fn test_financials() {
        let fin = crop_financials(&sample(), Decimal::from(10));
        assert_eq!(fin.costo_mano_obra, Decimal::from(30));
        assert_eq!(fin.ingresos, Decimal::from(70));
        assert_eq!(fin.ganancia_neta, Decimal::from(40));
    }

    #[test]
    fn test_sheets_and_sale_rows() {
        let sheets = crop_workbook(&sample(), Decimal::from(10), d(2025, 3, 10));
        let names: Vec<&str> = sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, [SHEET_SUMMARY, SHEET_ACTIVITIES, SHEET_FINANCIAL, SHEET_HARVESTS_SALES]);

        let cv = &sheets[3];
        // two sales on the first harvest, one "Sin venta" row for the second
        assert_eq!(cv.rows.len(), 3);
        assert_eq!(cv.rows[2][6], CellValue::from("Sin venta"));
        assert_eq!(cv.rows[0][1], CellValue::from("01/03/2025"));
    }

    #[test]
    fn test_summary_mentions_age() {
        let sheets = crop_workbook(&sample(), Decimal::from(10), d(2025, 1, 31));
        let edad = sheets[0]
            .rows
            .iter()
            .find(|r| r[0] == CellValue::from("Edad del Cultivo"))
            .unwrap();
        assert_eq!(edad[1], CellValue::from("30 días"));
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            workbook_file_name("F 01/2", d(2025, 3, 10)),
            "Informe_Cultivo_F_01_2_2025-03-10.xlsx"
        );
    }
}
