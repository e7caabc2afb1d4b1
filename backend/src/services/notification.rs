//! Advisory fan-out
//!
//! Walks recipients one farm at a time, matches each farm against the grid
//! snapshot and delivers the rendered report. A failed send is logged and
//! the next farm is still attempted.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use shared::{ChatId, DeliveryLog, Farm, FarmField, User};

use crate::db::FarmStore;
use crate::error::{AppError, AppResult};
use crate::external::{DeliveryError, Gazetteer, MessagingChannel, OutgoingMessage};
use crate::services::advisory::ReportTemplate;
use crate::services::location::{resolve_detailed, Resolution};
use crate::services::spatial::{MatchOutcome, SpatialIndex, DEFAULT_MATCH_THRESHOLD};

/// Dispatch tuning
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub threshold: f64,
    pub send_timeout: Duration,
    pub operators: Vec<ChatId>,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MATCH_THRESHOLD,
            send_timeout: Duration::from_secs(15),
            operators: Vec::new(),
        }
    }
}

/// Outcome of one sweep
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeliveryReport {
    pub purpose: String,
    /// Messages accepted by the channel
    pub delivered: usize,
    /// Recipients with at least one delivered message
    pub receivers: Vec<ChatId>,
    pub blocked: Vec<ChatId>,
    pub not_found: Vec<ChatId>,
    /// Timeouts and other transport failures
    pub failed: Vec<ChatId>,
    pub without_farms: usize,
    pub unresolved_farms: usize,
    pub unmatched_farms: usize,
    pub incomplete_farms: usize,
}

impl DeliveryReport {
    fn new(purpose: &str) -> Self {
        Self {
            purpose: purpose.to_string(),
            ..Self::default()
        }
    }

    /// Operator-facing summary
    pub fn summary(&self) -> String {
        format!(
            "Sweep \"{}\" finished\n\
             Delivered: {} message(s) to {} user(s)\n\
             Blocked: {}\n\
             Chat not found: {}\n\
             Failed: {}\n\
             Skipped: {} without farms, {} unresolved, {} out of coverage, {} incomplete data",
            self.purpose,
            self.delivered,
            self.receivers.len(),
            self.blocked.len(),
            self.not_found.len(),
            self.failed.len(),
            self.without_farms,
            self.unresolved_farms,
            self.unmatched_farms,
            self.incomplete_farms,
        )
    }
}

/// Sends rendered reports through a messaging channel
pub struct NotificationDispatcher<S, C> {
    store: S,
    channel: Arc<C>,
    gazetteer: Arc<Gazetteer>,
    settings: DispatchSettings,
}

impl<S: FarmStore, C: MessagingChannel> NotificationDispatcher<S, C> {
    pub fn new(
        store: S,
        channel: Arc<C>,
        gazetteer: Arc<Gazetteer>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            store,
            channel,
            gazetteer,
            settings,
        }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Deliver `template` to every farm of every recipient, then record the
    /// sweep in the delivery log and report to operators
    pub async fn dispatch<T>(
        &self,
        recipients: &[User],
        index: &SpatialIndex,
        template: &T,
    ) -> AppResult<DeliveryReport>
    where
        T: ReportTemplate + ?Sized,
    {
        let mut report = DeliveryReport::new(template.purpose());

        for recipient in recipients {
            if !recipient.has_farms() {
                report.without_farms += 1;
                continue;
            }

            for farm in recipient.farms.values() {
                self.deliver_farm(recipient, farm, index, template, &mut report)
                    .await;
            }
        }

        let entry = DeliveryLog::new(
            template.purpose(),
            report.receivers.clone(),
            i32::try_from(report.delivered).unwrap_or(i32::MAX),
        );
        if let Err(e) = self.store.append_delivery_log(&entry).await {
            tracing::error!("Failed to append delivery log for {}: {}", report.purpose, e);
        }

        tracing::info!(
            "Sweep {} delivered {} message(s) to {} user(s)",
            report.purpose,
            report.delivered,
            report.receivers.len()
        );
        self.notify_operators(&report.summary()).await;

        Ok(report)
    }

    async fn deliver_farm<T>(
        &self,
        recipient: &User,
        farm: &Farm,
        index: &SpatialIndex,
        template: &T,
        report: &mut DeliveryReport,
    ) where
        T: ReportTemplate + ?Sized,
    {
        let chat_id = recipient.chat_id;

        let point = match resolve_detailed(farm, &self.gazetteer) {
            Resolution::Unresolved(reason) => {
                tracing::info!("Skipping farm '{}' of chat {}: {}", farm.name, chat_id, reason);
                report.unresolved_farms += 1;
                return;
            }
            Resolution::Direct(point) | Resolution::Gazetteer(point) => point,
        };

        let record = match index.match_point(&point, self.settings.threshold) {
            MatchOutcome::Matched(nearest) => nearest.record,
            MatchOutcome::OutOfRange { distance } => {
                tracing::info!(
                    "Farm '{}' of chat {} at {} is {:.4} from the nearest cell",
                    farm.name,
                    chat_id,
                    point,
                    distance
                );
                report.unmatched_farms += 1;
                return;
            }
            MatchOutcome::Empty => {
                tracing::debug!("Dataset is empty, nothing to match farm '{}'", farm.name);
                report.unmatched_farms += 1;
                return;
            }
        };

        let rendered = match template.render(&farm.name, record) {
            Ok(rendered) => rendered,
            Err(e) => {
                tracing::warn!("Skipping farm '{}' of chat {}: {}", farm.name, chat_id, e);
                report.incomplete_farms += 1;
                return;
            }
        };

        match self.send_bounded(chat_id, &rendered.message).await {
            Ok(()) => {
                report.delivered += 1;
                if !report.receivers.contains(&chat_id) {
                    report.receivers.push(chat_id);
                }
                // The flag may also have been raised by an earlier farm of this sweep
                if recipient.blocked || report.blocked.contains(&chat_id) {
                    if let Err(e) = self.store.set_blocked(chat_id, false).await {
                        tracing::warn!("Failed to clear blocked flag of chat {}: {}", chat_id, e);
                    }
                }
                if let Some(snapshot) = rendered.snapshot {
                    let field = FarmField::Advisory(Some(snapshot));
                    if let Err(e) = self.store.set_farm_field(chat_id, &farm.name, field).await {
                        tracing::warn!("Failed to cache advisory for farm '{}': {}", farm.name, e);
                    }
                }
            }
            Err(DeliveryError::Unreachable(reason)) => {
                tracing::warn!(
                    "Chat {} is unreachable for farm '{}': {}",
                    chat_id,
                    farm.name,
                    reason
                );
                if report.blocked.contains(&chat_id) {
                    return;
                }
                report.blocked.push(chat_id);
                if let Err(e) = self.store.set_blocked(chat_id, true).await {
                    tracing::warn!("Failed to set blocked flag of chat {}: {}", chat_id, e);
                }
                self.notify_operators(&AppError::ChannelUnreachable(chat_id).to_string())
                    .await;
            }
            Err(DeliveryError::ChatNotFound(reason)) => {
                tracing::warn!("{}: {}", AppError::ChannelChatNotFound(chat_id), reason);
                if !report.not_found.contains(&chat_id) {
                    report.not_found.push(chat_id);
                }
            }
            Err(e) => {
                tracing::warn!("Delivery to chat {} failed: {}", chat_id, e);
                if !report.failed.contains(&chat_id) {
                    report.failed.push(chat_id);
                }
            }
        }
    }

    async fn send_bounded(
        &self,
        chat_id: ChatId,
        message: &OutgoingMessage,
    ) -> Result<(), DeliveryError> {
        let timeout = self.settings.send_timeout;
        match tokio::time::timeout(timeout, self.channel.send(chat_id, message, None)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(DeliveryError::Timeout(timeout)),
        }
    }

    /// Send a text to every operator; returns how many accepted it
    pub async fn notify_operators(&self, text: &str) -> usize {
        let message = OutgoingMessage::text(text);
        let mut notified = 0;
        for operator in &self.settings.operators {
            match self.send_bounded(*operator, &message).await {
                Ok(()) => notified += 1,
                Err(e) => tracing::warn!("Failed to notify operator {}: {}", operator, e),
            }
        }
        notified
    }
}
