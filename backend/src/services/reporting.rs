//! Report exports: CSV listings, the crop workbook and the sensor PDF

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerIndex, PdfLayerReference, PdfPageIndex, Point, Rect, Rgb,
};
use rust_decimal::Decimal;
use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::activity::{ActivityFilter, ActivityService};
use crate::services::crop::CropService;
use crate::services::harvest::{HarvestFilter, HarvestService};
use crate::services::notification::NotificationHub;
use crate::services::sale::{SaleFilter, SaleService};
use crate::services::sensor::SensorService;
use shared::{
    crop_workbook, format_date_es, workbook_file_name, ActivityLine, CellValue, CropReportData,
    CropReportHeader, FarmClock, GroupBy, HarvestLine, ReportDataRequest, ReportRow, SaleLine,
    TimeSlot,
};

#[derive(Clone)]
pub struct ReportingService {
    db: PgPool,
    hub: NotificationHub,
    clock: FarmClock,
    labor_hourly_rate: Decimal,
}

/// Rendered file ready to be sent as an attachment
pub struct ReportFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

pub const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

impl ReportingService {
    pub fn new(db: PgPool, hub: NotificationHub, clock: FarmClock, labor_hourly_rate: Decimal) -> Self {
        Self {
            db,
            hub,
            clock,
            labor_hourly_rate,
        }
    }

    /// Export report data as CSV
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Report(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Report(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| AppError::Report(format!("UTF-8 conversion error: {}", e)))
    }

    /// Gather everything the crop workbook shows
    pub async fn crop_report_data(&self, cvz_id: Uuid) -> AppResult<CropReportData> {
        let cultivo = CropService::new(self.db.clone(), self.clock).get(cvz_id).await?;

        let actividades = ActivityService::new(self.db.clone(), self.hub.clone())
            .list(&ActivityFilter {
                cvz_id: Some(cvz_id),
                pendientes: None,
            })
            .await?;
        let cosechas = HarvestService::new(self.db.clone(), self.hub.clone())
            .list(&HarvestFilter { cvz_id: Some(cvz_id) })
            .await?;
        let ventas = SaleService::new(self.db.clone(), self.hub.clone())
            .list(&SaleFilter {
                cvz_id: Some(cvz_id),
                ..Default::default()
            })
            .await?;

        Ok(CropReportData {
            header: CropReportHeader {
                cvz_id,
                estado: cultivo.status(),
                ficha: cultivo.ficha,
                lote: cultivo.lote,
                nombre: cultivo.nombre,
                tipo_cultivo: Some(cultivo.tipo_cultivo_nombre),
                fecha_siembra: cultivo.fecha_siembra,
                fecha_cosecha: cultivo.fecha_cosecha,
                cantidad_plantas_inicial: cultivo.cantidad_plantas_inicial,
                cantidad_plantas_actual: cultivo.cantidad_plantas_actual,
                estado_fenologico: cultivo.estado_fenologico_nombre,
                area_terreno: cultivo.area_terreno,
                rendimiento_promedio: cultivo.rendimiento_promedio,
            },
            actividades: actividades
                .into_iter()
                .map(|a| ActivityLine {
                    id: a.id,
                    descripcion: a.descripcion,
                    fecha_asignacion: a.fecha_asignacion,
                    horas_dedicadas: a.horas_dedicadas,
                    completada: a.estado,
                    observacion: a.observacion,
                    dni_responsable: a.dni_responsable,
                })
                .collect(),
            cosechas: cosechas
                .into_iter()
                .map(|c| HarvestLine {
                    id: c.id,
                    fecha: c.fecha,
                    cantidad: c.cantidad,
                    unidad_medida: c.unidad_medida,
                    cantidad_disponible: c.cantidad_disponible,
                    cerrado: c.cerrado,
                })
                .collect(),
            ventas: ventas
                .into_iter()
                .map(|v| SaleLine {
                    id: v.id,
                    fk_cosecha_id: v.fk_cosecha_id,
                    fecha: v.fecha,
                    cantidad: v.cantidad,
                    precio_unitario: v.precio_unitario,
                })
                .collect(),
        })
    }

    /// Four-sheet crop workbook
    pub async fn crop_workbook(&self, cvz_id: Uuid) -> AppResult<ReportFile> {
        let data = self.crop_report_data(cvz_id).await?;
        let today = self.clock.today(Utc::now());
        let sheets = crop_workbook(&data, self.labor_hourly_rate, today);

        let mut workbook = Workbook::new();
        let header_format = Format::new().set_bold();

        for sheet in &sheets {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(&sheet.name).map_err(xlsx_error)?;

            for (col, title) in sheet.headers.iter().enumerate() {
                worksheet
                    .write_string_with_format(0, col as u16, title, &header_format)
                    .map_err(xlsx_error)?;
                worksheet.set_column_width(col as u16, 22).map_err(xlsx_error)?;
            }

            for (i, row) in sheet.rows.iter().enumerate() {
                let r = (i + 1) as u32;
                for (col, cell) in row.iter().enumerate() {
                    match cell {
                        CellValue::Text(text) => worksheet.write_string(r, col as u16, text),
                        CellValue::Number(n) => worksheet.write_number(r, col as u16, *n),
                    }
                    .map_err(xlsx_error)?;
                }
            }
        }

        let bytes = workbook.save_to_buffer().map_err(xlsx_error)?;
        tracing::info!(cvz_id = %cvz_id, size = bytes.len(), "Crop workbook generated");

        Ok(ReportFile {
            file_name: workbook_file_name(&data.header.ficha, today),
            content_type: XLSX_CONTENT_TYPE,
            bytes,
        })
    }

    /// Sensor report as an A4 PDF
    pub async fn sensor_pdf(&self, request: &ReportDataRequest) -> AppResult<ReportFile> {
        let sensors = SensorService::new(self.db.clone(), self.hub.clone(), self.clock);
        let rows = sensors.report_data(request).await?;
        let generated = self.clock.local(Utc::now());

        let bytes = render_sensor_pdf(request, &rows, &generated.format("%d/%m/%Y %H:%M").to_string())?;
        tracing::info!(rows = rows.len(), size = bytes.len(), "Sensor PDF generated");

        Ok(ReportFile {
            file_name: format!(
                "Reporte_Sensores_{}_{}.pdf",
                request.start_date.format("%Y-%m-%d"),
                request.end_date.format("%Y-%m-%d")
            ),
            content_type: PDF_CONTENT_TYPE,
            bytes,
        })
    }
}

fn xlsx_error(err: rust_xlsxwriter::XlsxError) -> AppError {
    AppError::Report(format!("XLSX error: {}", err))
}

fn pdf_error<E: std::fmt::Display>(err: E) -> AppError {
    AppError::Report(format!("PDF error: {}", err))
}

// ============================================================================
// Sensor report content
// ============================================================================

/// Figures shown in the statistical summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSummary {
    pub data_points: usize,
    pub unique_sensors: usize,
    pub periods: usize,
}

pub fn report_summary(rows: &[ReportRow]) -> ReportSummary {
    let mut keys = BTreeSet::new();
    let mut periods = BTreeSet::new();
    let mut data_points = 0;
    for row in rows {
        periods.insert(row.period.as_str());
        for stat in &row.statistics {
            keys.insert(stat.med_key.as_str());
            data_points += stat.count;
        }
    }
    ReportSummary {
        data_points,
        unique_sensors: keys.len(),
        periods: periods.len(),
    }
}

/// One chart line: average value of a key per period
#[derive(Debug, Clone, PartialEq)]
pub struct TrendSeries {
    pub label: String,
    pub points: Vec<(String, f64)>,
}

/// Average per period for `key`, weighted by reading count across crops
/// and zones. Time-slot grouping yields one series per slot.
pub fn trend_series(rows: &[ReportRow], key: &str) -> Vec<TrendSeries> {
    let mut grouped: BTreeMap<Option<u8>, BTreeMap<String, (f64, usize)>> = BTreeMap::new();

    for row in rows {
        for stat in row.statistics.iter().filter(|s| s.med_key == key) {
            let entry = grouped
                .entry(row.time_slot)
                .or_default()
                .entry(row.period.clone())
                .or_insert((0.0, 0));
            entry.0 += stat.avg * stat.count as f64;
            entry.1 += stat.count;
        }
    }

    grouped
        .into_iter()
        .map(|(slot, periods)| TrendSeries {
            label: match slot.and_then(TimeSlot::from_index) {
                Some(s) => s.short_label_es().to_string(),
                None => "Promedio".to_string(),
            },
            points: periods
                .into_iter()
                .filter(|(_, (_, n))| *n > 0)
                .map(|(period, (sum, n))| (period, sum / n as f64))
                .collect(),
        })
        .collect()
}

/// Rows of a time-slot table: period and crop, then the average of each
/// requested slot ("-" when the slot has no data)
pub fn slot_table(rows: &[ReportRow], key: &str, slots: &[TimeSlot]) -> Vec<Vec<String>> {
    let mut table: BTreeMap<(String, String), BTreeMap<u8, f64>> = BTreeMap::new();

    for row in rows {
        let Some(slot) = row.time_slot else { continue };
        if let Some(stat) = row.statistics.iter().find(|s| s.med_key == key) {
            table
                .entry((row.period.clone(), format!("{} / {}", row.cultivo_nombre, row.zona_nombre)))
                .or_default()
                .insert(slot, stat.avg);
        }
    }

    table
        .into_iter()
        .map(|((period, planting), values)| {
            let mut line = vec![period, planting];
            for slot in slots {
                line.push(match values.get(&slot.index()) {
                    Some(v) => format!("{:.2}", v),
                    None => "-".to_string(),
                });
            }
            line
        })
        .collect()
}

fn sensor_keys(rows: &[ReportRow]) -> Vec<String> {
    let keys: BTreeSet<&str> = rows
        .iter()
        .flat_map(|r| r.statistics.iter().map(|s| s.med_key.as_str()))
        .collect();
    keys.into_iter().map(str::to_string).collect()
}

fn unit_of(rows: &[ReportRow], key: &str) -> Option<String> {
    rows.iter()
        .flat_map(|r| r.statistics.iter())
        .find(|s| s.med_key == key)
        .and_then(|s| s.unidad.clone())
}

// ============================================================================
// PDF layout
// ============================================================================

const PAGE_W: f64 = 210.0;
const PAGE_H: f64 = 297.0;
const MARGIN: f64 = 15.0;
const BOTTOM: f64 = 20.0;
const LINE: f64 = 6.0;

const SERIES_COLORS: [(f64, f64, f64); 4] = [
    (0.18, 0.49, 0.20),
    (0.95, 0.61, 0.07),
    (0.13, 0.40, 0.75),
    (0.42, 0.27, 0.60),
];

struct PdfWriter {
    doc: PdfDocumentReference,
    font: IndirectFontRef,
    bold: IndirectFontRef,
    pages: Vec<(PdfPageIndex, PdfLayerIndex)>,
    y: f64,
}

impl PdfWriter {
    fn new(title: &str) -> AppResult<Self> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_W as f32), Mm(PAGE_H as f32), "Capa 1");
        let font = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?;
        let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_error)?;
        Ok(Self {
            doc,
            font,
            bold,
            pages: vec![(page, layer)],
            y: PAGE_H - MARGIN,
        })
    }

    fn layer(&self) -> PdfLayerReference {
        let (page, layer) = self.pages[self.pages.len() - 1];
        self.doc.get_page(page).get_layer(layer)
    }

    fn new_page(&mut self) {
        let n = self.pages.len() + 1;
        let (page, layer) = self.doc.add_page(Mm(PAGE_W as f32), Mm(PAGE_H as f32), format!("Capa {}", n));
        self.pages.push((page, layer));
        self.y = PAGE_H - MARGIN;
    }

    fn ensure_space(&mut self, height: f64) {
        if self.y - height < BOTTOM {
            self.new_page();
        }
    }

    fn text_at(&self, text: &str, size: f64, x: f64, y: f64, bold: bool) {
        let font = if bold { &self.bold } else { &self.font };
        self.layer().use_text(text, size as f32, Mm(x as f32), Mm(y as f32), font);
    }

    fn line(&mut self, text: &str, size: f64, bold: bool) {
        self.ensure_space(LINE);
        self.text_at(text, size, MARGIN, self.y, bold);
        self.y -= LINE;
    }

    fn section(&mut self, title: &str) {
        self.ensure_space(LINE * 3.0);
        self.y -= LINE / 2.0;
        self.line(title, 13.0, true);
    }

    fn fill_rect(&self, x1: f64, y1: f64, x2: f64, y2: f64, rgb: (f64, f64, f64)) {
        let layer = self.layer();
        layer.set_fill_color(Color::Rgb(Rgb::new(rgb.0 as f32, rgb.1 as f32, rgb.2 as f32, None)));
        layer.add_rect(Rect::new(Mm(x1 as f32), Mm(y1 as f32), Mm(x2 as f32), Mm(y2 as f32)));
        layer.set_fill_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
    }

    fn stroke(&self, points: &[(f64, f64)], rgb: (f64, f64, f64), thickness: f64) {
        if points.len() < 2 {
            return;
        }
        let layer = self.layer();
        layer.set_outline_color(Color::Rgb(Rgb::new(rgb.0 as f32, rgb.1 as f32, rgb.2 as f32, None)));
        layer.set_outline_thickness(thickness as f32);
        layer.add_line(Line {
            points: points
                .iter()
                .map(|(x, y)| (Point::new(Mm(*x as f32), Mm(*y as f32)), false))
                .collect(),
            is_closed: false,
        });
    }

    fn header_band(&mut self, title: &str, subtitle: &str) {
        self.fill_rect(0.0, PAGE_H - 28.0, PAGE_W, PAGE_H, (0.18, 0.49, 0.20));
        let layer = self.layer();
        layer.set_fill_color(Color::Rgb(Rgb::new(1.0, 1.0, 1.0, None)));
        self.text_at(title, 18.0, MARGIN, PAGE_H - 14.0, true);
        self.text_at(subtitle, 10.0, MARGIN, PAGE_H - 22.0, false);
        layer.set_fill_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
        self.y = PAGE_H - 38.0;
    }

    fn table(&mut self, headers: &[String], rows: &[Vec<String>]) {
        let width = PAGE_W - 2.0 * MARGIN;
        let first = width * 0.22;
        let second = width * 0.30;
        let rest = if headers.len() > 2 {
            (width - first - second) / (headers.len() - 2) as f64
        } else {
            0.0
        };
        let column_x = |i: usize| match i {
            0 => MARGIN,
            1 => MARGIN + first,
            n => MARGIN + first + second + rest * (n - 2) as f64,
        };

        let draw_header = |w: &mut PdfWriter| {
            w.ensure_space(LINE * 2.0);
            w.fill_rect(MARGIN, w.y - 1.5, PAGE_W - MARGIN, w.y + 4.5, (0.88, 0.93, 0.88));
            for (i, h) in headers.iter().enumerate() {
                w.text_at(h, 9.0, column_x(i) + 1.0, w.y, true);
            }
            w.y -= LINE;
        };

        draw_header(self);
        for row in rows {
            if self.y - LINE < BOTTOM {
                self.new_page();
                draw_header(self);
            }
            for (i, cell) in row.iter().enumerate() {
                let text: String = cell.chars().take(if i == 1 { 30 } else { 22 }).collect();
                self.text_at(&text, 9.0, column_x(i) + 1.0, self.y, false);
            }
            self.y -= LINE;
        }
    }

    fn chart(&mut self, title: &str, series: &[TrendSeries]) {
        const HEIGHT: f64 = 60.0;
        self.ensure_space(HEIGHT + LINE * 4.0);
        self.line(title, 11.0, true);

        let periods: Vec<&str> = series
            .iter()
            .flat_map(|s| s.points.iter().map(|(p, _)| p.as_str()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let values = series.iter().flat_map(|s| s.points.iter().map(|(_, v)| *v));
        let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });

        let left = MARGIN + 14.0;
        let right = PAGE_W - MARGIN;
        let top = self.y;
        let bottom = self.y - HEIGHT;

        self.stroke(&[(left, top), (left, bottom), (right, bottom)], (0.3, 0.3, 0.3), 0.5);

        if periods.is_empty() || !min.is_finite() {
            self.text_at("Sin datos", 9.0, left + 5.0, bottom + HEIGHT / 2.0, false);
            self.y = bottom - LINE;
            return;
        }

        let span = if (max - min).abs() < f64::EPSILON { 1.0 } else { max - min };
        let x_of = |i: usize| {
            if periods.len() == 1 {
                (left + right) / 2.0
            } else {
                left + (right - left) * i as f64 / (periods.len() - 1) as f64
            }
        };
        let y_of = |v: f64| bottom + 4.0 + (HEIGHT - 8.0) * (v - min) / span;

        self.text_at(&format!("{:.1}", max), 7.0, MARGIN, y_of(max) - 1.0, false);
        self.text_at(&format!("{:.1}", min), 7.0, MARGIN, y_of(min) - 1.0, false);

        for (n, s) in series.iter().enumerate() {
            let color = SERIES_COLORS[n % SERIES_COLORS.len()];
            let points: Vec<(f64, f64)> = s
                .points
                .iter()
                .filter_map(|(p, v)| {
                    periods
                        .iter()
                        .position(|q| q == p)
                        .map(|i| (x_of(i), y_of(*v)))
                })
                .collect();
            if points.len() == 1 {
                let (x, y) = points[0];
                self.stroke(&[(x - 1.0, y), (x + 1.0, y)], color, 2.0);
            } else {
                self.stroke(&points, color, 1.0);
            }
            let lx = left + 40.0 * n as f64;
            self.stroke(&[(lx, bottom - 9.0), (lx + 6.0, bottom - 9.0)], color, 1.5);
            self.text_at(&s.label, 8.0, lx + 8.0, bottom - 10.0, false);
        }

        if let (Some(first), Some(last)) = (periods.first(), periods.last()) {
            self.text_at(first, 7.0, left, bottom - 4.0, false);
            if periods.len() > 1 {
                self.text_at(last, 7.0, right - 28.0, bottom - 4.0, false);
            }
        }

        self.y = bottom - LINE * 2.5;
    }

    fn finish(self) -> AppResult<Vec<u8>> {
        let total = self.pages.len();
        for (i, (page, layer)) in self.pages.iter().enumerate() {
            let layer = self.doc.get_page(*page).get_layer(*layer);
            layer.use_text(
                format!("Página {} de {}", i + 1, total),
                8.0,
                Mm((PAGE_W / 2.0 - 12.0) as f32),
                Mm(10.0),
                &self.font,
            );
        }
        self.doc.save_to_bytes().map_err(pdf_error)
    }
}

/// Lay out the sensor report
pub fn render_sensor_pdf(request: &ReportDataRequest, rows: &[ReportRow], generated_at: &str) -> AppResult<Vec<u8>> {
    let mut pdf = PdfWriter::new("Reporte de Sensores")?;
    pdf.header_band("Reporte de Sensores", &format!("AgroTIC - generado el {}", generated_at));

    let summary = report_summary(rows);
    let keys = sensor_keys(rows);
    let slots = request.report_slots();

    pdf.section("Información del reporte");
    pdf.line(
        &format!(
            "Periodo: {} - {}",
            format_date_es(request.start_date),
            format_date_es(request.end_date)
        ),
        10.0,
        false,
    );
    pdf.line(&format!("Agrupación: {}", request.group_by.label_es()), 10.0, false);
    let slot_labels: Vec<&str> = slots.iter().map(|s| s.label_es()).collect();
    pdf.line(&format!("Franjas horarias: {}", slot_labels.join(", ")), 10.0, false);
    pdf.line(
        &format!("Sensores solicitados: {}", request.med_keys.join(", ")),
        10.0,
        false,
    );
    let plantings: BTreeSet<Uuid> = rows.iter().map(|r| r.cvz_id).collect();
    pdf.line(
        &format!("Cultivos incluidos: {}  Filas: {}", plantings.len(), rows.len()),
        10.0,
        false,
    );

    pdf.section("Resumen estadístico");
    pdf.line(&format!("Total de datos: {}", summary.data_points), 10.0, false);
    pdf.line(&format!("Sensores únicos: {}", summary.unique_sensors), 10.0, false);
    pdf.line(&format!("Periodos reportados: {}", summary.periods), 10.0, false);

    if rows.is_empty() {
        pdf.section("Sin datos");
        pdf.line("No hay mediciones para los filtros seleccionados.", 10.0, false);
        return pdf.finish();
    }

    if request.group_by == GroupBy::TimeSlot {
        let mut headers = vec!["Periodo".to_string(), "Cultivo / Zona".to_string()];
        headers.extend(slots.iter().map(|s| s.short_label_es().to_string()));

        for key in &keys {
            let title = match unit_of(rows, key) {
                Some(u) => format!("Franjas horarias: {} ({})", key, u),
                None => format!("Franjas horarias: {}", key),
            };
            pdf.section(&title);
            pdf.table(&headers, &slot_table(rows, key, slots));
        }
    }

    pdf.section("Tendencias");
    for key in &keys {
        let title = match unit_of(rows, key) {
            Some(u) => format!("{} ({}) promedio por periodo", key, u),
            None => format!("{} promedio por periodo", key),
        };
        pdf.chart(&title, &trend_series(rows, key));
    }

    pdf.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use shared::SensorStatistics;

    fn stat(key: &str, count: usize, avg: f64) -> SensorStatistics {
        SensorStatistics {
            med_key: key.to_string(),
            count,
            min: avg,
            max: avg,
            avg,
            sum: avg * count as f64,
            stddev: 0.0,
            unidad: Some("°C".to_string()),
        }
    }

    fn row(period: &str, slot: Option<u8>, stats: Vec<SensorStatistics>) -> ReportRow {
        ReportRow {
            cultivo_id: Uuid::nil(),
            cultivo_nombre: "Tomate".to_string(),
            variedad_nombre: "Chonto".to_string(),
            zona_id: Uuid::nil(),
            zona_nombre: "Invernadero".to_string(),
            cvz_id: Uuid::nil(),
            period: period.to_string(),
            time_slot: slot,
            statistics: stats,
        }
    }

    #[test]
    fn test_csv_export_has_header() {
        #[derive(Serialize)]
        struct Line {
            producto: String,
            cantidad: i32,
        }
        let csv = ReportingService::export_to_csv(&[Line {
            producto: "Urea".to_string(),
            cantidad: 3,
        }])
        .unwrap();
        assert_eq!(csv, "producto,cantidad\nUrea,3\n");
    }

    #[test]
    fn test_summary_counts() {
        let rows = vec![
            row("2024-05-01", None, vec![stat("temp", 3, 20.0), stat("hum", 2, 60.0)]),
            row("2024-05-02", None, vec![stat("temp", 1, 22.0)]),
        ];
        assert_eq!(
            report_summary(&rows),
            ReportSummary {
                data_points: 6,
                unique_sensors: 2,
                periods: 2,
            }
        );
    }

    #[test]
    fn test_trend_is_count_weighted() {
        let mut other = row("2024-05-01", None, vec![stat("temp", 1, 30.0)]);
        other.cvz_id = Uuid::new_v4();
        let rows = vec![row("2024-05-01", None, vec![stat("temp", 3, 20.0)]), other];
        let series = trend_series(&rows, "temp");
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].label, "Promedio");
        assert!((series[0].points[0].1 - 22.5).abs() < 1e-9);
    }

    #[test]
    fn test_trend_one_series_per_slot() {
        let rows = vec![
            row("2024-05-01", Some(0), vec![stat("temp", 1, 18.0)]),
            row("2024-05-01", Some(1), vec![stat("temp", 1, 26.0)]),
            row("2024-05-02", Some(0), vec![stat("temp", 1, 19.0)]),
        ];
        let series = trend_series(&rows, "temp");
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].points.len(), 2);
        assert_eq!(series[1].points.len(), 1);
    }

    #[test]
    fn test_slot_table_marks_missing_slots() {
        let rows = vec![row("2024-05-01", Some(1), vec![stat("temp", 2, 25.5)])];
        let table = slot_table(&rows, "temp", &TimeSlot::ALL);
        assert_eq!(table.len(), 1);
        assert_eq!(table[0][0], "2024-05-01");
        assert_eq!(table[0][2], "-");
        assert_eq!(table[0][3], "25.50");
    }

    fn sensor_request(group_by: GroupBy, time_ranges: Option<Vec<TimeSlot>>) -> ReportDataRequest {
        ReportDataRequest {
            med_keys: vec!["temp".to_string()],
            cultivo_ids: None,
            zona_ids: None,
            start_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            group_by,
            time_ranges,
        }
    }

    #[test]
    fn test_slot_table_without_picked_slots_has_every_column() {
        let request = sensor_request(GroupBy::TimeSlot, None);
        let rows = vec![row("2024-05-01", Some(0), vec![stat("temp", 1, 18.0)])];
        let table = slot_table(&rows, "temp", request.report_slots());
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].len(), 2 + TimeSlot::ALL.len());
        assert_eq!(table[0][2], "18.00");
        assert_eq!(table[0][5], "-");
    }

    #[test]
    fn test_slot_table_keeps_picked_slots_only() {
        let request = sensor_request(GroupBy::TimeSlot, Some(vec![TimeSlot::Night]));
        let rows = vec![row("2024-05-01", Some(3), vec![stat("temp", 1, 12.0)])];
        let table = slot_table(&rows, "temp", request.report_slots());
        assert_eq!(table[0].len(), 3);
        assert_eq!(table[0][2], "12.00");
    }

    #[test]
    fn test_pdf_renders_for_empty_report() {
        let request = sensor_request(GroupBy::Daily, None);
        let bytes = render_sensor_pdf(&request, &[], "01/05/2024 08:00").unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_pdf_renders_time_slot_report() {
        let request = sensor_request(GroupBy::TimeSlot, None);
        let rows = vec![
            row("2024-05-01", Some(0), vec![stat("temp", 2, 18.5)]),
            row("2024-05-01", Some(2), vec![stat("temp", 1, 21.0)]),
            row("2024-05-02", Some(0), vec![stat("temp", 3, 19.0)]),
        ];
        let bytes = render_sensor_pdf(&request, &rows, "02/05/2024 18:30").unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > 1000);
    }
}
