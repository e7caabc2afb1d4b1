//! Nearest-cell lookup over one dataset snapshot

use std::path::{Path, PathBuf};

use shared::{GeoRecord, GpsCoordinates};

use crate::error::AppResult;
use crate::external::geojson;

/// Default match threshold, in planar degrees
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.1;

/// Immutable snapshot of the advisory grid
#[derive(Debug, Clone, Default)]
pub struct SpatialIndex {
    records: Vec<GeoRecord>,
    source: Option<PathBuf>,
}

/// Result of a nearest lookup
#[derive(Debug, Clone, Copy)]
pub struct Nearest<'a> {
    pub record: &'a GeoRecord,
    pub distance: f64,
}

/// Result of a thresholded lookup
#[derive(Debug, Clone, Copy)]
pub enum MatchOutcome<'a> {
    Matched(Nearest<'a>),
    /// Nearest cell is farther than the threshold
    OutOfRange { distance: f64 },
    /// The snapshot has no cells at all
    Empty,
}

impl<'a> MatchOutcome<'a> {
    pub fn record(&self) -> Option<&'a GeoRecord> {
        match self {
            MatchOutcome::Matched(nearest) => Some(nearest.record),
            _ => None,
        }
    }
}

impl SpatialIndex {
    pub fn new(records: Vec<GeoRecord>) -> Self {
        Self {
            records,
            source: None,
        }
    }

    /// Load a dataset file; fails with `DatasetUnavailable` when it is
    /// absent and `DatasetMalformed` when it cannot be parsed
    pub fn load(path: &Path) -> AppResult<Self> {
        let records = geojson::read_records(path)?;
        tracing::info!("Loaded {} grid cells from {}", records.len(), path.display());
        Ok(Self {
            records,
            source: Some(path.to_path_buf()),
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Closest cell by planar distance; `None` for an empty snapshot
    pub fn nearest(&self, point: &GpsCoordinates) -> Option<Nearest<'_>> {
        self.records
            .iter()
            .map(|record| Nearest {
                record,
                distance: record.location.planar_distance(point),
            })
            .filter(|n| !n.distance.is_nan())
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    /// Nearest cell when it lies within `threshold` (inclusive)
    pub fn match_point(&self, point: &GpsCoordinates, threshold: f64) -> MatchOutcome<'_> {
        match self.nearest(point) {
            Some(nearest) if nearest.distance <= threshold => MatchOutcome::Matched(nearest),
            Some(nearest) => MatchOutcome::OutOfRange {
                distance: nearest.distance,
            },
            None => MatchOutcome::Empty,
        }
    }
}
