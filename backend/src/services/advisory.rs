//! Field extraction and report rendering
//!
//! Extraction is pure: the record is only read, and the same record and keys
//! always yield the same rounded values.

use chrono::{Duration, NaiveDate};
use rust_decimal::prelude::*;
use std::collections::BTreeMap;

use shared::{AdvisorySnapshot, DateRange, FieldKey, FieldValue, GeoRecord};

use crate::error::{AppError, AppResult};
use crate::external::OutgoingMessage;

/// Placeholder for a value the dataset marks as missing
pub const NO_DATA: &str = "no data for this date";

const DISCRETE_DECIMALS: u32 = 2;
const SERIES_DECIMALS: u32 = 1;

/// A value read from a grid cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    Value(Decimal),
    Text(String),
    Unavailable,
}

impl Extracted {
    fn from_field(value: &FieldValue, decimals: u32) -> Self {
        match value {
            FieldValue::Number(n) => match Decimal::from_f64(*n) {
                Some(d) => Extracted::Value(
                    d.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero)
                        .normalize(),
                ),
                None => Extracted::Unavailable,
            },
            FieldValue::Text(s) if s.trim().is_empty() => Extracted::Unavailable,
            FieldValue::Text(s) => Extracted::Text(s.trim().to_string()),
            FieldValue::Missing => Extracted::Unavailable,
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, Extracted::Unavailable)
    }

    /// Text for display, `None` when unavailable
    pub fn as_text(&self) -> Option<String> {
        match self {
            Extracted::Value(d) => Some(d.to_string()),
            Extracted::Text(s) => Some(s.clone()),
            Extracted::Unavailable => None,
        }
    }
}

impl std::fmt::Display for Extracted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Extracted::Value(d) => write!(f, "{}", d),
            Extracted::Text(s) => write!(f, "{}", s),
            Extracted::Unavailable => write!(f, "{}", NO_DATA),
        }
    }
}

pub type ExtractedFields = BTreeMap<FieldKey, Extracted>;

/// Read the requested keys, rounding numbers to two decimals.
///
/// A key the record does not carry at all is `FieldMissing`; a key present
/// with a NaN or null value is `Extracted::Unavailable`.
pub fn extract(record: &GeoRecord, keys: &[FieldKey]) -> AppResult<ExtractedFields> {
    keys.iter()
        .map(|key| {
            let value = record
                .get(key)
                .ok_or_else(|| AppError::FieldMissing(key.to_string()))?;
            Ok((key.clone(), Extracted::from_field(value, DISCRETE_DECIMALS)))
        })
        .collect()
}

/// Per-field series over a date window, one decimal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForecastTable {
    pub series: BTreeMap<String, BTreeMap<NaiveDate, Extracted>>,
}

impl ForecastTable {
    pub fn value(&self, field: &str, date: NaiveDate) -> Option<&Extracted> {
        self.series.get(field).and_then(|s| s.get(&date))
    }

    /// Ensure every field has a value for every date of the window
    pub fn require(&self, fields: &[&str], window: &DateRange) -> AppResult<()> {
        for field in fields {
            for date in window.days() {
                if self.value(field, date).is_none() {
                    return Err(AppError::FieldMissing(FieldKey::new(*field, date).to_string()));
                }
            }
        }
        Ok(())
    }
}

/// Bucket the record's keys by field prefix, keeping the requested fields
/// and dates inside the window
pub fn time_series(record: &GeoRecord, fields: &[&str], window: &DateRange) -> ForecastTable {
    let mut table = ForecastTable::default();

    for (raw, value) in &record.fields {
        let Some(key) = FieldKey::parse(raw) else {
            continue;
        };
        if !fields.contains(&key.field.as_str()) || !window.contains(key.date) {
            continue;
        }
        table
            .series
            .entry(key.field)
            .or_default()
            .insert(key.date, Extracted::from_field(value, SERIES_DECIMALS));
    }

    table
}

/// Rendered message plus the advisory to cache on the farm, if any
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedReport {
    pub message: OutgoingMessage,
    pub snapshot: Option<AdvisorySnapshot>,
}

/// Turns a matched grid cell into a farm's message
pub trait ReportTemplate: Send + Sync {
    /// Purpose tag recorded in the delivery log
    fn purpose(&self) -> &str;

    fn render(&self, farm_name: &str, record: &GeoRecord) -> AppResult<RenderedReport>;
}

/// Multi-day weather table
#[derive(Debug, Clone)]
pub struct WeatherReport {
    pub window: DateRange,
}

/// Series shown in the weather table, with their labels
pub const WEATHER_FIELDS: [(&str, &str); 5] = [
    ("tmin", "Min temp (°C)"),
    ("tmax", "Max temp (°C)"),
    ("rh", "Humidity (%)"),
    ("wind", "Wind (m/s)"),
    ("rain", "Rain (mm)"),
];

impl WeatherReport {
    pub fn new(start: NaiveDate, days: u32) -> Self {
        Self {
            window: DateRange::starting_at(start, days),
        }
    }
}

impl ReportTemplate for WeatherReport {
    fn purpose(&self) -> &str {
        "weather"
    }

    fn render(&self, farm_name: &str, record: &GeoRecord) -> AppResult<RenderedReport> {
        let fields: Vec<&str> = WEATHER_FIELDS.iter().map(|(f, _)| *f).collect();
        let table = time_series(record, &fields, &self.window);
        table.require(&fields, &self.window)?;

        let mut text = format!("Weather forecast for farm \"{}\"\n", farm_name);
        for date in self.window.days() {
            text.push_str(&format!("\n{}\n", date.format("%Y-%m-%d")));
            for (field, label) in WEATHER_FIELDS {
                if let Some(value) = table.value(field, date) {
                    text.push_str(&format!("  {}: {}\n", label, value));
                }
            }
        }

        Ok(RenderedReport {
            message: OutgoingMessage::Text(text.trim_end().to_string()),
            snapshot: None,
        })
    }
}

/// Three-day agronomic advice, cached on the farm after delivery
#[derive(Debug, Clone)]
pub struct AdvisoryReport {
    pub start: NaiveDate,
    /// Field carrying the advice text
    pub field: String,
}

const ADVISORY_DAY_LABELS: [&str; 3] = ["Today", "Tomorrow", "Day after tomorrow"];

impl AdvisoryReport {
    pub fn new(start: NaiveDate) -> Self {
        Self {
            start,
            field: "advice".to_string(),
        }
    }

    fn keys(&self) -> Vec<FieldKey> {
        (0..ADVISORY_DAY_LABELS.len() as i64)
            .map(|offset| FieldKey::new(&self.field, self.start + Duration::days(offset)))
            .collect()
    }
}

impl ReportTemplate for AdvisoryReport {
    fn purpose(&self) -> &str {
        "advisory"
    }

    fn render(&self, farm_name: &str, record: &GeoRecord) -> AppResult<RenderedReport> {
        let keys = self.keys();
        let values = extract(record, &keys)?;
        let days: Vec<&Extracted> = keys.iter().filter_map(|k| values.get(k)).collect();

        let mut text = format!("Agronomic advice for farm \"{}\"\n", farm_name);
        for (label, value) in ADVISORY_DAY_LABELS.iter().zip(&days) {
            text.push_str(&format!("\n{}: {}", label, value));
        }

        let snapshot = AdvisorySnapshot {
            issued_for: Some(self.start),
            today: days.first().and_then(|v| v.as_text()),
            day2: days.get(1).and_then(|v| v.as_text()),
            day3: days.get(2).and_then(|v| v.as_text()),
        };

        Ok(RenderedReport {
            message: OutgoingMessage::Text(text),
            snapshot: Some(snapshot),
        })
    }
}
