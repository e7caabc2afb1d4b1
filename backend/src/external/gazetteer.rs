//! Gazetteer of administrative regions
//!
//! Static CSV table mapping (province, city, village) to coordinates, used only
//! when a farm has no direct coordinates.

use std::io::Read;
use std::path::Path;

use shared::GazetteerRow;

use crate::error::{AppError, AppResult};

/// In-memory gazetteer
#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    rows: Vec<GazetteerRow>,
}

impl Gazetteer {
    pub fn new(rows: Vec<GazetteerRow>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| GazetteerRow {
                province: normalize(&row.province),
                city: normalize(&row.city),
                village: normalize(&row.village),
                ..row
            })
            .collect();
        Self { rows }
    }

    /// Load from a CSV file with a `province,city,village,x,y` header
    pub fn load(path: &Path) -> AppResult<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| AppError::Gazetteer(format!("{}: {}", path.display(), e)))?;
        let gazetteer = Self::from_reader(file)?;
        tracing::info!(
            "Loaded {} gazetteer rows from {}",
            gazetteer.len(),
            path.display()
        );
        Ok(gazetteer)
    }

    pub fn from_reader<R: Read>(reader: R) -> AppResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let rows = csv_reader
            .deserialize::<GazetteerRow>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::Gazetteer(e.to_string()))?;

        Ok(Self::new(rows))
    }

    /// All rows matching the exact (province, city, village) triple
    pub fn lookup(&self, province: &str, city: &str, village: &str) -> Vec<&GazetteerRow> {
        let (province, city, village) = (normalize(province), normalize(city), normalize(village));
        self.rows
            .iter()
            .filter(|row| row.province == province && row.city == city && row.village == village)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn normalize(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
