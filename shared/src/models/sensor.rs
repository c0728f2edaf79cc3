//! Sensor readings and the statistics reported over them
//!
//! Readings are grouped per crop/zone planting and per period (hour, day,
//! ISO week or time slot of the day) in farm local time, then summarised per
//! sensor key.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Timelike, Utc,
};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Values the gateways emit when a probe is disconnected
pub const SENTINEL_VALUES: [f64; 2] = [999.0, -999.0];

/// Transport of a gateway configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MqttProtocol {
    Mqtt,
    Mqtts,
    Ws,
    Wss,
}

impl MqttProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            MqttProtocol::Mqtt => "mqtt",
            MqttProtocol::Mqtts => "mqtts",
            MqttProtocol::Ws => "ws",
            MqttProtocol::Wss => "wss",
        }
    }
}

impl TryFrom<String> for MqttProtocol {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "mqtt" => Ok(MqttProtocol::Mqtt),
            "mqtts" => Ok(MqttProtocol::Mqtts),
            "ws" => Ok(MqttProtocol::Ws),
            "wss" => Ok(MqttProtocol::Wss),
            _ => Err(DomainError::UnknownVariant {
                kind: "protocol",
                value,
            }),
        }
    }
}

/// Quarter of the day a reading falls in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TimeSlot {
    /// 06:00-12:00
    Morning,
    /// 12:00-18:00
    Afternoon,
    /// 18:00-24:00
    Evening,
    /// 00:00-06:00
    Night,
}

impl TimeSlot {
    pub const ALL: [TimeSlot; 4] = [
        TimeSlot::Morning,
        TimeSlot::Afternoon,
        TimeSlot::Evening,
        TimeSlot::Night,
    ];

    pub fn from_hour(hour: u32) -> Self {
        match hour {
            6..=11 => TimeSlot::Morning,
            12..=17 => TimeSlot::Afternoon,
            18..=23 => TimeSlot::Evening,
            _ => TimeSlot::Night,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Numeric slot reported in the `timeSlot` field
    pub fn index(&self) -> u8 {
        match self {
            TimeSlot::Morning => 0,
            TimeSlot::Afternoon => 1,
            TimeSlot::Evening => 2,
            TimeSlot::Night => 3,
        }
    }

    pub fn label_es(&self) -> &'static str {
        match self {
            TimeSlot::Morning => "Mañana (6:00-12:00)",
            TimeSlot::Afternoon => "Tarde (12:00-18:00)",
            TimeSlot::Evening => "Noche (18:00-24:00)",
            TimeSlot::Night => "Madrugada (00:00-6:00)",
        }
    }

    pub fn short_label_es(&self) -> &'static str {
        match self {
            TimeSlot::Morning => "Mañana",
            TimeSlot::Afternoon => "Tarde",
            TimeSlot::Evening => "Noche",
            TimeSlot::Night => "Madrugada",
        }
    }
}

/// How report periods are formed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    Hourly,
    Daily,
    Weekly,
    TimeSlot,
}

impl GroupBy {
    pub fn label_es(&self) -> &'static str {
        match self {
            GroupBy::Hourly => "Por Horas",
            GroupBy::Daily => "Diario",
            GroupBy::Weekly => "Semanal",
            GroupBy::TimeSlot => "Franjas Horarias (4 por día)",
        }
    }

    /// Period label for a local timestamp
    pub fn period(&self, local: NaiveDateTime) -> String {
        match self {
            GroupBy::Hourly => format!("{} {:02}:00", local.date().format("%Y-%m-%d"), local.hour()),
            GroupBy::Daily | GroupBy::TimeSlot => local.date().format("%Y-%m-%d").to_string(),
            GroupBy::Weekly => {
                let date = local.date();
                let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
                monday.format("%Y-%m-%d").to_string()
            }
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GroupBy::Hourly => "hourly",
            GroupBy::Daily => "daily",
            GroupBy::Weekly => "weekly",
            GroupBy::TimeSlot => "time_slot",
        };
        f.write_str(s)
    }
}

/// Body of a sensor report request. Field names follow the front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDataRequest {
    pub med_keys: Vec<String>,
    #[serde(default)]
    pub cultivo_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub zona_ids: Option<Vec<Uuid>>,
    #[serde(deserialize_with = "deserialize_day")]
    pub start_date: NaiveDate,
    #[serde(deserialize_with = "deserialize_day")]
    pub end_date: NaiveDate,
    pub group_by: GroupBy,
    #[serde(default)]
    pub time_ranges: Option<Vec<TimeSlot>>,
}

/// Accepts `YYYY-MM-DD` as well as a full ISO timestamp (date part is used)
fn deserialize_day<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let day = raw.get(..10).unwrap_or(&raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(serde::de::Error::custom)
}

impl ReportDataRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.start_date > self.end_date {
            return Err(DomainError::InvalidDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        Ok(())
    }

    /// Selected slots; empty means every slot
    pub fn slots(&self) -> &[TimeSlot] {
        self.time_ranges.as_deref().unwrap_or(&[])
    }

    /// Slots to lay out in a report, all four when none were picked
    pub fn report_slots(&self) -> &[TimeSlot] {
        match self.slots() {
            [] => &TimeSlot::ALL[..],
            picked => picked,
        }
    }
}

/// Farm-local clock used to bucket readings
#[derive(Debug, Clone, Copy)]
pub struct FarmClock {
    offset: FixedOffset,
}

impl FarmClock {
    /// Clock at a whole-hour UTC offset; out-of-range offsets fall back to UTC
    pub fn from_offset_hours(hours: i32) -> Self {
        let offset = FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| Utc.fix());
        Self { offset }
    }

    pub fn local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.offset).naive_local()
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.local(now).date()
    }

    /// UTC instants covering `start..=end` local days, end exclusive
    pub fn utc_bounds(&self, start: NaiveDate, end: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let to_utc = |day: NaiveDate| {
            let midnight = day.and_time(NaiveTime::default());
            DateTime::<Utc>::from_naive_utc_and_offset(
                midnight - Duration::seconds(self.offset.local_minus_utc() as i64),
                Utc,
            )
        };
        (to_utc(start), to_utc(end + Duration::days(1)))
    }
}

/// A reading joined with the planting it belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorSample {
    pub cultivo_id: Uuid,
    pub cultivo_nombre: String,
    pub variedad_nombre: String,
    pub zona_id: Uuid,
    pub zona_nombre: String,
    pub cvz_id: Uuid,
    pub key: String,
    pub valor: f64,
    pub unidad: Option<String>,
    pub fecha_medicion: DateTime<Utc>,
}

/// Summary of one sensor key within a report row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensorStatistics {
    pub med_key: String,
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub sum: f64,
    pub stddev: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unidad: Option<String>,
}

/// One planting in one period
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub cultivo_id: Uuid,
    pub cultivo_nombre: String,
    pub variedad_nombre: String,
    pub zona_id: Uuid,
    pub zona_nombre: String,
    pub cvz_id: Uuid,
    pub period: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_slot: Option<u8>,
    pub statistics: Vec<SensorStatistics>,
}

/// A reading is usable unless it is a disconnect sentinel or not a number
pub fn is_valid_reading(value: f64) -> bool {
    value.is_finite() && !SENTINEL_VALUES.contains(&value)
}

/// Count, min, max, mean, sum and sample standard deviation
pub fn compute_statistics(med_key: &str, values: &[f64], unidad: Option<String>) -> Option<SensorStatistics> {
    if values.is_empty() {
        return None;
    }
    let count = values.len();
    let sum: f64 = values.iter().sum();
    let avg = sum / count as f64;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let stddev = if count > 1 {
        let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (count - 1) as f64;
        variance.sqrt()
    } else {
        0.0
    };

    Some(SensorStatistics {
        med_key: med_key.to_string(),
        count,
        min,
        max,
        avg,
        sum,
        stddev,
        unidad,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct RowKey {
    cultivo_nombre: String,
    zona_nombre: String,
    variedad_nombre: String,
    cvz_id: Uuid,
    period: String,
    slot: Option<u8>,
}

struct RowAccumulator {
    cultivo_id: Uuid,
    zona_id: Uuid,
    by_key: BTreeMap<String, (Vec<f64>, Option<String>)>,
}

/// Group samples into report rows.
///
/// Samples outside the requested keys, outside the date range, outside the
/// selected time slots, or carrying invalid values are skipped. Rows come out
/// ordered by crop, zone, period and slot; statistics by key.
pub fn aggregate_report(
    samples: &[SensorSample],
    request: &ReportDataRequest,
    clock: &FarmClock,
) -> Vec<ReportRow> {
    let slots = request.slots();
    let mut rows: BTreeMap<RowKey, RowAccumulator> = BTreeMap::new();

    for sample in samples {
        if !is_valid_reading(sample.valor) {
            continue;
        }
        if !request.med_keys.is_empty() && !request.med_keys.iter().any(|k| k == &sample.key) {
            continue;
        }
        let local = clock.local(sample.fecha_medicion);
        let day = local.date();
        if day < request.start_date || day > request.end_date {
            continue;
        }
        let slot = TimeSlot::from_hour(local.hour());
        if !slots.is_empty() && !slots.contains(&slot) {
            continue;
        }

        let key = RowKey {
            cultivo_nombre: sample.cultivo_nombre.clone(),
            zona_nombre: sample.zona_nombre.clone(),
            variedad_nombre: sample.variedad_nombre.clone(),
            cvz_id: sample.cvz_id,
            period: request.group_by.period(local),
            slot: (request.group_by == GroupBy::TimeSlot).then(|| slot.index()),
        };

        let acc = rows.entry(key).or_insert_with(|| RowAccumulator {
            cultivo_id: sample.cultivo_id,
            zona_id: sample.zona_id,
            by_key: BTreeMap::new(),
        });
        let entry = acc
            .by_key
            .entry(sample.key.clone())
            .or_insert_with(|| (Vec::new(), None));
        entry.0.push(sample.valor);
        if entry.1.is_none() {
            entry.1 = sample.unidad.clone();
        }
    }

    rows.into_iter()
        .map(|(key, acc)| ReportRow {
            cultivo_id: acc.cultivo_id,
            cultivo_nombre: key.cultivo_nombre,
            variedad_nombre: key.variedad_nombre,
            zona_id: acc.zona_id,
            zona_nombre: key.zona_nombre,
            cvz_id: key.cvz_id,
            period: key.period,
            time_slot: key.slot,
            statistics: acc
                .by_key
                .into_iter()
                .filter_map(|(med_key, (values, unidad))| compute_statistics(&med_key, &values, unidad))
                .collect(),
        })
        .collect()
}

/// Latest reading of a key in a zone
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LatestReading {
    pub key: String,
    pub unidad: Option<String>,
    pub valor: f64,
    pub fecha_medicion: DateTime<Utc>,
}

/// Keep the most recent valid reading per key, ordered by key
pub fn latest_per_key<I>(readings: I) -> Vec<LatestReading>
where
    I: IntoIterator<Item = LatestReading>,
{
    let mut latest: HashMap<String, LatestReading> = HashMap::new();
    for reading in readings {
        if !is_valid_reading(reading.valor) {
            continue;
        }
        match latest.get(&reading.key) {
            Some(existing) if existing.fecha_medicion >= reading.fecha_medicion => {}
            _ => {
                latest.insert(reading.key.clone(), reading);
            }
        }
    }
    let mut out: Vec<LatestReading> = latest.into_values().collect();
    out.sort_by(|a, b| a.key.cmp(&b.key));
    out
}

/// Case-insensitive match of a search term against any of the given names
pub fn matches_search(query: &str, names: &[&str]) -> bool {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return true;
    }
    names.iter().any(|n| n.to_lowercase().contains(&q))
}

/// Side of a threshold a value fell on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdBreach {
    Below,
    Above,
}

/// Acceptable range configured for a sensor key
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SensorRange {
    pub minimo: f64,
    pub maximo: f64,
}

impl SensorRange {
    pub fn new(minimo: f64, maximo: f64) -> Result<Self, &'static str> {
        if !minimo.is_finite() || !maximo.is_finite() {
            return Err("Threshold bounds must be finite numbers");
        }
        if minimo > maximo {
            return Err("Threshold minimum cannot exceed the maximum");
        }
        Ok(Self { minimo, maximo })
    }

    pub fn check(&self, value: f64) -> Option<ThresholdBreach> {
        if !is_valid_reading(value) {
            return None;
        }
        if value < self.minimo {
            Some(ThresholdBreach::Below)
        } else if value > self.maximo {
            Some(ThresholdBreach::Above)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn request(group_by: GroupBy) -> ReportDataRequest {
        ReportDataRequest {
            med_keys: vec!["temp".to_string()],
            cultivo_ids: None,
            zona_ids: None,
            start_date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 3, 9).unwrap(),
            group_by,
            time_ranges: None,
        }
    }

    fn sample(valor: f64, at: &str) -> SensorSample {
        SensorSample {
            cultivo_id: Uuid::nil(),
            cultivo_nombre: "Tomate".to_string(),
            variedad_nombre: "Chonto".to_string(),
            zona_id: Uuid::nil(),
            zona_nombre: "Invernadero".to_string(),
            cvz_id: Uuid::nil(),
            key: "temp".to_string(),
            valor,
            unidad: Some("°C".to_string()),
            fecha_medicion: DateTime::parse_from_rfc3339(at).unwrap().with_timezone(&Utc),
        }
    }

    #[test]
    fn test_time_slots() {
        assert_eq!(TimeSlot::from_hour(6), TimeSlot::Morning);
        assert_eq!(TimeSlot::from_hour(11), TimeSlot::Morning);
        assert_eq!(TimeSlot::from_hour(12), TimeSlot::Afternoon);
        assert_eq!(TimeSlot::from_hour(18), TimeSlot::Evening);
        assert_eq!(TimeSlot::from_hour(0), TimeSlot::Night);
        assert_eq!(TimeSlot::from_hour(5), TimeSlot::Night);
        assert_eq!(TimeSlot::Night.index(), 3);
    }

    #[test]
    fn test_period_labels() {
        let ts = NaiveDate::from_ymd_opt(2025, 3, 6).unwrap().and_hms_opt(14, 35, 0).unwrap();
        assert_eq!(GroupBy::Hourly.period(ts), "2025-03-06 14:00");
        assert_eq!(GroupBy::Daily.period(ts), "2025-03-06");
        assert_eq!(GroupBy::Weekly.period(ts), "2025-03-03");
    }

    #[test]
    fn test_sample_stddev() {
        let s = compute_statistics("temp", &[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], None).unwrap();
        assert_eq!(s.count, 8);
        assert!((s.avg - 5.0).abs() < 1e-9);
        assert!((s.stddev - 2.138_089_935).abs() < 1e-6);
        let single = compute_statistics("temp", &[3.0], None).unwrap();
        assert_eq!(single.stddev, 0.0);
    }

    #[test]
    fn test_sentinels_discarded() {
        assert!(!is_valid_reading(999.0));
        assert!(!is_valid_reading(-999.0));
        assert!(!is_valid_reading(f64::NAN));
        assert!(is_valid_reading(998.5));
    }

    #[test]
    fn test_aggregate_daily_in_local_time() {
        let clock = FarmClock::from_offset_hours(-5);
        // 2025-03-07T03:00Z is 22:00 local on the 6th
        let samples = vec![
            sample(20.0, "2025-03-06T15:00:00Z"),
            sample(22.0, "2025-03-07T03:00:00Z"),
            sample(999.0, "2025-03-06T16:00:00Z"),
        ];
        let rows = aggregate_report(&samples, &request(GroupBy::Daily), &clock);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].period, "2025-03-06");
        assert_eq!(rows[0].statistics[0].count, 2);
        assert!((rows[0].statistics[0].avg - 21.0).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_time_slot_filter() {
        let clock = FarmClock::from_offset_hours(0);
        let mut req = request(GroupBy::TimeSlot);
        req.time_ranges = Some(vec![TimeSlot::Morning]);
        let samples = vec![
            sample(10.0, "2025-03-04T07:00:00Z"),
            sample(30.0, "2025-03-04T13:00:00Z"),
        ];
        let rows = aggregate_report(&samples, &req, &clock);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].time_slot, Some(0));
    }

    #[test]
    fn test_end_date_inclusive() {
        let clock = FarmClock::from_offset_hours(0);
        let samples = vec![sample(10.0, "2025-03-09T23:59:00Z"), sample(10.0, "2025-03-10T00:00:00Z")];
        let rows = aggregate_report(&samples, &request(GroupBy::Daily), &clock);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].period, "2025-03-09");
    }

    #[test]
    fn test_utc_bounds() {
        let clock = FarmClock::from_offset_hours(-5);
        let day = NaiveDate::from_ymd_opt(2025, 3, 6).unwrap();
        let (start, end) = clock.utc_bounds(day, day);
        assert_eq!(start.to_rfc3339(), "2025-03-06T05:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2025-03-07T05:00:00+00:00");
    }

    #[test]
    fn test_request_accepts_iso_timestamps() {
        let json = r#"{"med_keys":["temp"],"start_date":"2025-03-01T00:00:00.000Z","end_date":"2025-03-02","group_by":"time_slot","time_ranges":["night"]}"#;
        let req: ReportDataRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.start_date, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(req.slots(), &[TimeSlot::Night]);
        assert_eq!(req.report_slots(), &[TimeSlot::Night]);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_report_slots_default_to_all() {
        let mut req = request(GroupBy::TimeSlot);
        req.time_ranges = None;
        assert!(req.slots().is_empty());
        assert_eq!(req.report_slots(), &TimeSlot::ALL[..]);
        req.time_ranges = Some(Vec::new());
        assert_eq!(req.report_slots().len(), 4);
    }

    #[test]
    fn test_latest_per_key() {
        let t1 = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2025, 3, 1, 11, 0, 0).unwrap();
        let reading = |key: &str, valor: f64, at| LatestReading {
            key: key.to_string(),
            unidad: None,
            valor,
            fecha_medicion: at,
        };
        let out = latest_per_key(vec![
            reading("temp", 20.0, t1),
            reading("temp", 21.0, t2),
            reading("hum", 999.0, t2),
            reading("hum", 60.0, t1),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].key, "hum");
        assert_eq!(out[0].valor, 60.0);
        assert_eq!(out[1].valor, 21.0);
    }

    #[test]
    fn test_threshold_check() {
        let range = SensorRange::new(10.0, 30.0).unwrap();
        assert_eq!(range.check(5.0), Some(ThresholdBreach::Below));
        assert_eq!(range.check(31.0), Some(ThresholdBreach::Above));
        assert_eq!(range.check(20.0), None);
        assert_eq!(range.check(999.0), None);
        assert!(SensorRange::new(5.0, 1.0).is_err());
    }

    #[test]
    fn test_matches_search() {
        assert!(matches_search("tom", &["Tomate", "Zona A"]));
        assert!(matches_search("", &["x"]));
        assert!(!matches_search("papa", &["Tomate"]));
    }
}
