//! Gridded advisory dataset models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::GpsCoordinates;

/// Separator between a field name and its date suffix, as in `tmax_Time=20240101`
pub const DATE_SUFFIX_SEPARATOR: &str = "_Time=";

/// Date format used in field keys and dataset file names
pub const KEY_DATE_FORMAT: &str = "%Y%m%d";

/// A single value carried by a grid cell
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    /// Present in the file but without data (NaN or null)
    Missing,
}

impl FieldValue {
    /// Numbers that are not finite count as missing
    pub fn number(value: f64) -> Self {
        if value.is_finite() {
            FieldValue::Number(value)
        } else {
            FieldValue::Missing
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FieldValue::Missing)
    }
}

/// One grid cell of the dataset
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeoRecord {
    pub location: GpsCoordinates,
    /// Values keyed by `field_Time=YYYYMMDD`
    pub fields: BTreeMap<String, FieldValue>,
}

impl GeoRecord {
    pub fn new(location: GpsCoordinates) -> Self {
        Self {
            location,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &FieldKey) -> Option<&FieldValue> {
        self.fields.get(&key.to_string())
    }
}

/// A field name paired with a forecast date
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldKey {
    pub field: String,
    pub date: NaiveDate,
}

impl FieldKey {
    pub fn new(field: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            field: field.into(),
            date,
        }
    }

    /// Split a raw key like `tmax_Time=20240101` into its parts
    pub fn parse(raw: &str) -> Option<Self> {
        let (field, date) = raw.rsplit_once(DATE_SUFFIX_SEPARATOR)?;
        if field.is_empty() {
            return None;
        }
        let date = NaiveDate::parse_from_str(date, KEY_DATE_FORMAT).ok()?;
        Some(Self::new(field, date))
    }
}

impl std::fmt::Display for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.field,
            DATE_SUFFIX_SEPARATOR,
            self.date.format(KEY_DATE_FORMAT)
        )
    }
}

/// Reference row mapping an administrative region to coordinates
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GazetteerRow {
    pub province: String,
    pub city: String,
    pub village: String,
    /// Longitude
    pub x: f64,
    /// Latitude
    pub y: f64,
}

impl GazetteerRow {
    pub fn coordinates(&self) -> GpsCoordinates {
        GpsCoordinates::new(self.y, self.x)
    }
}
