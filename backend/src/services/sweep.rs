//! Scheduled sweeps: load the day's snapshot and fan out one report kind

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::db::FarmStore;
use crate::error::{AppError, AppResult};
use crate::external::MessagingChannel;
use crate::services::advisory::{AdvisoryReport, ReportTemplate, WeatherReport};
use crate::services::dataset::DatasetSource;
use crate::services::notification::{DeliveryReport, NotificationDispatcher};

/// Report kinds delivered by a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepKind {
    Weather,
    Advisory,
}

impl SweepKind {
    pub const ALL: [SweepKind; 2] = [SweepKind::Weather, SweepKind::Advisory];

    /// Purpose tag written to the delivery log
    pub fn purpose(&self) -> &'static str {
        match self {
            SweepKind::Weather => "weather",
            SweepKind::Advisory => "advisory",
        }
    }
}

impl std::fmt::Display for SweepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.purpose())
    }
}

impl FromStr for SweepKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weather" => Ok(SweepKind::Weather),
            "advisory" => Ok(SweepKind::Advisory),
            other => Err(AppError::NotFound(format!("Sweep kind '{}'", other))),
        }
    }
}

/// Runs sweeps against the store and the dataset directory
pub struct SweepService<S, C> {
    store: S,
    dataset: DatasetSource,
    dispatcher: NotificationDispatcher<S, C>,
    forecast_days: u32,
}

impl<S: FarmStore, C: MessagingChannel> SweepService<S, C> {
    pub fn new(
        store: S,
        dataset: DatasetSource,
        dispatcher: NotificationDispatcher<S, C>,
        forecast_days: u32,
    ) -> Self {
        Self {
            store,
            dataset,
            dispatcher,
            forecast_days,
        }
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher<S, C> {
        &self.dispatcher
    }

    /// Run one sweep as of `now`.
    ///
    /// When no usable dataset exists every operator gets exactly one message
    /// and nothing is sent to farmers.
    pub async fn run(&self, kind: SweepKind, now: DateTime<Utc>) -> AppResult<DeliveryReport> {
        tracing::info!("Starting {} sweep", kind);

        let dataset = self.dataset.clone();
        let loaded = tokio::task::spawn_blocking(move || dataset.load(now))
            .await
            .map_err(|e| AppError::Internal(format!("dataset loader panicked: {}", e)))?;

        let snapshot = match loaded {
            Ok(snapshot) => snapshot,
            Err(e) if e.aborts_sweep() => {
                tracing::error!("Aborting {} sweep: {}", kind, e);
                self.dispatcher
                    .notify_operators(&format!("Sweep \"{}\" aborted: {}", kind, e))
                    .await;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let recipients = self.store.list_users().await?;
        tracing::debug!(
            "{} sweep over {} user(s) with data for {}",
            kind,
            recipients.len(),
            snapshot.report_start
        );

        let template: Box<dyn ReportTemplate> = match kind {
            SweepKind::Weather => {
                Box::new(WeatherReport::new(snapshot.report_start, self.forecast_days))
            }
            SweepKind::Advisory => Box::new(AdvisoryReport::new(snapshot.report_start)),
        };

        self.dispatcher
            .dispatch(&recipients, &snapshot.index, template.as_ref())
            .await
    }
}
