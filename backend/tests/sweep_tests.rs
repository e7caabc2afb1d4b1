//! Sweep tests against dataset files on disk

mod common;

use chrono::{DateTime, FixedOffset, NaiveTime, TimeZone, Utc};
use serde_json::json;
use std::path::Path;
use tokio_test::assert_ok;

use agro_advisory::db::{FarmStore, InMemoryStore};
use agro_advisory::external::Gazetteer;
use agro_advisory::services::{DatasetSource, SweepKind, SweepService};
use agro_advisory::AppError;
use shared::GpsCoordinates;

use common::*;

/// 05:00 local on 2024-01-01, before the 07:00 cutover
fn early_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 1, 30, 0).unwrap()
}

/// 09:00 local on 2024-01-01
fn mid_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 5, 30, 0).unwrap()
}

fn dataset(dir: &Path) -> DatasetSource {
    DatasetSource::new(
        dir,
        "advisory_%Y%m%d.geojson",
        NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
        FixedOffset::east_opt(210 * 60).unwrap(),
    )
}

fn service(
    dir: &Path,
    store: &InMemoryStore,
    channel: &std::sync::Arc<MockChannel>,
) -> SweepService<InMemoryStore, MockChannel> {
    SweepService::new(
        store.clone(),
        dataset(dir),
        dispatcher(store, channel, Gazetteer::default()),
        2,
    )
}

#[tokio::test]
async fn test_missing_files_abort_with_one_operator_message() {
    let dir = tempfile::tempdir().unwrap();
    let store = InMemoryStore::new();
    let channel = MockChannel::new();
    farmer_at(&store, 1, GpsCoordinates::new(35.0, 51.0)).await;

    let result = service(dir.path(), &store, &channel)
        .run(SweepKind::Weather, early_morning())
        .await;

    match result {
        Err(AppError::DatasetUnavailable { tried }) => assert_eq!(tried.len(), 2),
        other => panic!("unexpected result: {:?}", other.map(|r| r.delivered)),
    }
    assert_eq!(channel.sent_to(OPERATOR).len(), 1);
    assert!(channel.farmer_messages().is_empty());
    assert!(store.delivery_logs().await.is_empty());
}

#[tokio::test]
async fn test_missing_files_notify_each_operator_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = InMemoryStore::new();
    let channel = MockChannel::new();
    farmer_at(&store, 1, GpsCoordinates::new(35.0, 51.0)).await;
    let operators = vec![OPERATOR, 901, 902];

    let sweeps = SweepService::new(
        store.clone(),
        dataset(dir.path()),
        dispatcher_for(&store, &channel, Gazetteer::default(), operators.clone()),
        2,
    );
    assert!(sweeps.run(SweepKind::Advisory, mid_morning()).await.is_err());

    for operator in operators {
        assert_eq!(channel.sent_to(operator).len(), 1, "operator {}", operator);
    }
    assert!(channel.sent_to(1).is_empty());
}

#[tokio::test]
async fn test_malformed_file_aborts_like_missing() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("advisory_20240101.geojson"), "not json").unwrap();
    let store = InMemoryStore::new();
    let channel = MockChannel::new();
    farmer_at(&store, 1, GpsCoordinates::new(35.0, 51.0)).await;

    let result = service(dir.path(), &store, &channel)
        .run(SweepKind::Advisory, mid_morning())
        .await;

    assert!(matches!(result, Err(AppError::DatasetMalformed { .. })));
    assert_eq!(channel.sent_to(OPERATOR).len(), 1);
    assert!(channel.farmer_messages().is_empty());
}

#[tokio::test]
async fn test_yesterday_file_serves_today_before_cutover() {
    let dir = tempfile::tempdir().unwrap();
    let body = feature_collection(&[(
        51.0,
        35.0,
        json!({
            "advice_Time=20231231": "stale",
            "advice_Time=20240101": "Irrigate",
            "advice_Time=20240102": "Prune",
            "advice_Time=20240103": null,
        }),
    )]);
    std::fs::write(dir.path().join("advisory_20231231.geojson"), body).unwrap();

    let store = InMemoryStore::new();
    let channel = MockChannel::new();
    farmer_at(&store, 1, GpsCoordinates::new(35.0, 51.0)).await;

    let report = assert_ok!(
        service(dir.path(), &store, &channel)
            .run(SweepKind::Advisory, early_morning())
            .await
    );

    assert_eq!(report.receivers, vec![1]);
    let message = &channel.sent_to(1)[0];
    assert!(message.contains("Today: Irrigate"));
    assert!(!message.contains("stale"));

    let logs = store.delivery_logs().await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].purpose, "advisory");
}

#[tokio::test]
async fn test_yesterday_file_ignored_after_cutover() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("advisory_20231231.geojson"),
        feature_collection(&[]),
    )
    .unwrap();
    let store = InMemoryStore::new();
    let channel = MockChannel::new();

    let result = service(dir.path(), &store, &channel)
        .run(SweepKind::Weather, mid_morning())
        .await;
    assert!(matches!(result, Err(AppError::DatasetUnavailable { .. })));
}

#[tokio::test]
async fn test_weather_sweep_over_forecast_window() {
    let dir = tempfile::tempdir().unwrap();
    let mut properties = serde_json::Map::new();
    for day in ["20240101", "20240102"] {
        for field in ["tmin", "tmax", "rh", "wind", "rain"] {
            properties.insert(format!("{}_Time={}", field, day), json!(10.06));
        }
    }
    properties.insert("rain_Time=20240102".into(), json!("NaN"));
    std::fs::write(
        dir.path().join("advisory_20240101.geojson"),
        feature_collection(&[(51.0, 35.0, serde_json::Value::Object(properties))]),
    )
    .unwrap();

    let store = InMemoryStore::new();
    let channel = MockChannel::new();
    farmer_at(&store, 1, GpsCoordinates::new(35.05, 51.05)).await;
    farmer_at(&store, 2, GpsCoordinates::new(40.0, 60.0)).await;

    let report = service(dir.path(), &store, &channel)
        .run(SweepKind::Weather, mid_morning())
        .await
        .unwrap();

    assert_eq!(report.receivers, vec![1]);
    assert_eq!(report.unmatched_farms, 1);
    let message = &channel.sent_to(1)[0];
    assert!(message.contains("2024-01-02"));
    assert!(message.contains("10.1"));
    assert!(message.contains("no data for this date"));

    let summary = &channel.sent_to(OPERATOR)[0];
    assert!(summary.contains("\"weather\""));
    assert!(store.get_user(1).await.unwrap().unwrap().farms["main"].advisory.is_none());
}
