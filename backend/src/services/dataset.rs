//! Daily dataset selection
//!
//! Files are named by a chrono pattern over the file date. Today's file is
//! preferred; before the local cutover hour yesterday's file may stand in, in
//! which case the reporting window starts one day after the file date.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use std::path::PathBuf;

use crate::config::DatasetConfig;
use crate::error::{AppError, AppResult};
use crate::services::spatial::SpatialIndex;

/// Locates and loads the snapshot for a sweep
#[derive(Debug, Clone)]
pub struct DatasetSource {
    dir: PathBuf,
    file_pattern: String,
    cutover: NaiveTime,
    utc_offset: FixedOffset,
}

/// A file the sweep may use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetCandidate {
    pub path: PathBuf,
    pub file_date: NaiveDate,
    /// First day reported to farmers
    pub report_start: NaiveDate,
}

/// A loaded snapshot together with the window it serves
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub index: SpatialIndex,
    pub file_date: NaiveDate,
    pub report_start: NaiveDate,
}

impl DatasetSource {
    pub fn new(
        dir: impl Into<PathBuf>,
        file_pattern: impl Into<String>,
        cutover: NaiveTime,
        utc_offset: FixedOffset,
    ) -> Self {
        Self {
            dir: dir.into(),
            file_pattern: file_pattern.into(),
            cutover,
            utc_offset,
        }
    }

    pub fn from_config(config: &DatasetConfig) -> AppResult<Self> {
        Ok(Self::new(
            &config.dir,
            &config.file_pattern,
            config.cutover()?,
            config.utc_offset()?,
        ))
    }

    /// Path of the file for a given date
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(date.format(&self.file_pattern).to_string())
    }

    /// Local calendar date at `now`
    pub fn local_today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.utc_offset).date_naive()
    }

    /// Files to try, in order of preference
    pub fn candidates(&self, now: DateTime<Utc>) -> Vec<DatasetCandidate> {
        let local = now.with_timezone(&self.utc_offset);
        let today = local.date_naive();

        let mut candidates = vec![DatasetCandidate {
            path: self.path_for(today),
            file_date: today,
            report_start: today,
        }];

        if local.time() < self.cutover {
            let yesterday = today - Duration::days(1);
            candidates.push(DatasetCandidate {
                path: self.path_for(yesterday),
                file_date: yesterday,
                report_start: today,
            });
        }

        candidates
    }

    /// Load the first available candidate.
    ///
    /// A missing file moves on to the next candidate; a malformed one aborts
    /// immediately.
    pub fn load(&self, now: DateTime<Utc>) -> AppResult<Snapshot> {
        let mut tried = Vec::new();

        for candidate in self.candidates(now) {
            match SpatialIndex::load(&candidate.path) {
                Ok(index) => {
                    if candidate.file_date != candidate.report_start {
                        tracing::warn!(
                            "Using fallback dataset {} for {}",
                            candidate.path.display(),
                            candidate.report_start
                        );
                    }
                    return Ok(Snapshot {
                        index,
                        file_date: candidate.file_date,
                        report_start: candidate.report_start,
                    });
                }
                Err(AppError::DatasetUnavailable { tried: paths }) => {
                    tracing::debug!("Dataset file {} not found", candidate.path.display());
                    tried.extend(paths);
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::DatasetUnavailable { tried })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn source(dir: &std::path::Path) -> DatasetSource {
        DatasetSource::new(
            dir,
            "advisory_%Y%m%d.geojson",
            NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            FixedOffset::east_opt(210 * 60).unwrap(),
        )
    }

    const EMPTY_COLLECTION: &str = r#"{"type":"FeatureCollection","features":[]}"#;

    #[test]
    fn test_path_for_uses_pattern() {
        let src = source(std::path::Path::new("/data"));
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(
            src.path_for(date),
            PathBuf::from("/data/advisory_20240101.geojson")
        );
    }

    #[test]
    fn test_candidates_after_cutover() {
        let src = source(std::path::Path::new("/data"));
        // 05:30 UTC is 09:00 local
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 5, 30, 0).unwrap();
        let candidates = src.candidates(now);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].file_date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn test_candidates_before_cutover_include_yesterday() {
        let src = source(std::path::Path::new("/data"));
        // 01:30 UTC is 05:00 local
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 1, 30, 0).unwrap();
        let candidates = src.candidates(now);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1].file_date, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
        assert_eq!(candidates[1].report_start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn test_local_date_crosses_midnight() {
        let src = source(std::path::Path::new("/data"));
        // 21:00 UTC on Dec 31 is 00:30 local on Jan 1
        let now = Utc.with_ymd_and_hms(2023, 12, 31, 21, 0, 0).unwrap();
        assert_eq!(src.local_today(now), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn test_load_falls_back_to_yesterday() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("advisory_20231231.geojson"), EMPTY_COLLECTION).unwrap();

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 1, 30, 0).unwrap();
        let snapshot = source(dir.path()).load(now).unwrap();
        assert_eq!(snapshot.file_date, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
        assert_eq!(snapshot.report_start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn test_load_without_files_lists_all_tried_paths() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 1, 30, 0).unwrap();
        match source(dir.path()).load(now) {
            Err(AppError::DatasetUnavailable { tried }) => assert_eq!(tried.len(), 2),
            other => panic!("unexpected result: {:?}", other.map(|s| s.file_date)),
        }
    }

    #[test]
    fn test_malformed_file_aborts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("advisory_20240101.geojson"), "{oops").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 5, 30, 0).unwrap();
        assert!(matches!(
            source(dir.path()).load(now),
            Err(AppError::DatasetMalformed { .. })
        ));
    }
}
