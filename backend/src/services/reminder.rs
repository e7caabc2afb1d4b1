//! Delayed one-shot follow-ups
//!
//! A reminder sleeps for its delay, re-checks its precondition and only then
//! sends. At most one reminder per (chat, kind) is pending: scheduling again
//! aborts the earlier one.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};
use uuid::Uuid;

use shared::ChatId;

use crate::db::FarmStore;
use crate::error::AppResult;
use crate::external::MessagingChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    /// Registered but never added a farm
    NoFarm,
    /// Has farms but none with coordinates
    NoLocation,
}

impl ReminderKind {
    pub fn message(&self) -> &'static str {
        match self {
            ReminderKind::NoFarm => {
                "You have not registered a farm yet. Use /addfarm <name> [product] \
                 to start receiving forecasts."
            }
            ReminderKind::NoLocation => {
                "Your farms have no location yet. Send /location <farm> <lat> <lon> \
                 or /village <farm> <province>|<city>|<village>."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReminderJob {
    pub id: Uuid,
    pub kind: ReminderKind,
    pub chat_id: ChatId,
    #[serde(skip)]
    pub delay: Duration,
    pub payload: String,
    pub scheduled_at: DateTime<Utc>,
}

impl ReminderJob {
    pub fn new(kind: ReminderKind, chat_id: ChatId, delay: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            chat_id,
            delay,
            payload: kind.message().to_string(),
            scheduled_at: Utc::now(),
        }
    }
}

/// Delays applied to onboarding reminders
#[derive(Debug, Clone, Copy)]
pub struct ReminderDelays {
    pub no_farm: Duration,
    pub no_location: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderOutcome {
    Sent,
    /// Precondition no longer held
    Skipped,
    Failed(String),
}

type PendingMap = HashMap<(ChatId, ReminderKind), (Uuid, AbortHandle)>;

/// Spawns reminder tasks on the tokio runtime
pub struct ReminderScheduler<C> {
    channel: Arc<C>,
    send_timeout: Duration,
    pending: Arc<Mutex<PendingMap>>,
}

impl<C> Clone for ReminderScheduler<C> {
    fn clone(&self) -> Self {
        Self {
            channel: Arc::clone(&self.channel),
            send_timeout: self.send_timeout,
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<C: MessagingChannel + 'static> ReminderScheduler<C> {
    pub fn new(channel: Arc<C>, send_timeout: Duration) -> Self {
        Self {
            channel,
            send_timeout,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of reminders that have not fired yet
    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Schedule `job`, replacing any pending reminder of the same kind for
    /// the same chat
    pub fn schedule<P, Fut>(&self, job: ReminderJob, precondition: P) -> JoinHandle<ReminderOutcome>
    where
        P: FnOnce(ChatId) -> Fut + Send + 'static,
        Fut: Future<Output = AppResult<bool>> + Send + 'static,
    {
        let key = (job.chat_id, job.kind);
        let id = job.id;
        let channel = Arc::clone(&self.channel);
        let pending = Arc::clone(&self.pending);
        let send_timeout = self.send_timeout;

        // Held across spawn so a zero-delay task cannot finish before its
        // entry exists
        let mut guard = match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let handle = tokio::spawn(async move {
            tokio::time::sleep(job.delay).await;

            let outcome = match precondition(job.chat_id).await {
                Ok(true) => {
                    let send = channel.send_text(job.chat_id, &job.payload);
                    match tokio::time::timeout(send_timeout, send).await {
                        Ok(Ok(_)) => ReminderOutcome::Sent,
                        Ok(Err(e)) => ReminderOutcome::Failed(e.to_string()),
                        Err(_) => ReminderOutcome::Failed("send timed out".to_string()),
                    }
                }
                Ok(false) => ReminderOutcome::Skipped,
                Err(e) => ReminderOutcome::Failed(e.to_string()),
            };

            match &outcome {
                ReminderOutcome::Sent => {
                    tracing::info!("Sent {:?} reminder to chat {}", job.kind, job.chat_id)
                }
                ReminderOutcome::Skipped => {
                    tracing::debug!("Skipped {:?} reminder for chat {}", job.kind, job.chat_id)
                }
                ReminderOutcome::Failed(reason) => tracing::warn!(
                    "{:?} reminder for chat {} failed: {}",
                    job.kind,
                    job.chat_id,
                    reason
                ),
            }

            if let Ok(mut pending) = pending.lock() {
                if pending.get(&key).map(|(pending_id, _)| *pending_id) == Some(job.id) {
                    pending.remove(&key);
                }
            }
            outcome
        });

        if let Some((previous, abort)) = guard.insert(key, (id, handle.abort_handle())) {
            abort.abort();
            tracing::debug!("Replaced pending reminder {} for chat {}", previous, key.0);
        }

        handle
    }

    /// Schedule a reminder of `kind` whose precondition is read from `store`
    pub fn remind<S: FarmStore>(
        &self,
        store: S,
        kind: ReminderKind,
        chat_id: ChatId,
        delay: Duration,
    ) -> JoinHandle<ReminderOutcome> {
        let job = ReminderJob::new(kind, chat_id, delay);
        self.schedule(job, move |chat_id| async move {
            match kind {
                ReminderKind::NoFarm => still_without_farms(&store, chat_id).await,
                ReminderKind::NoLocation => still_without_location(&store, chat_id).await,
            }
        })
    }

    /// Queue reminders for every chat still lacking a farm or a located
    /// farm. Pending reminders live in memory, so startup calls this once.
    pub async fn rearm<S: FarmStore>(&self, store: &S, delays: ReminderDelays) -> AppResult<usize> {
        let without_farms = store.chats_without_farms().await?;
        let without_location = store.chats_without_location().await?;

        for &chat_id in &without_farms {
            self.remind(store.clone(), ReminderKind::NoFarm, chat_id, delays.no_farm);
        }
        for &chat_id in &without_location {
            self.remind(store.clone(), ReminderKind::NoLocation, chat_id, delays.no_location);
        }

        let count = without_farms.len() + without_location.len();
        tracing::info!("Re-armed {} onboarding reminder(s)", count);
        Ok(count)
    }
}

/// The user exists and has no farm
pub async fn still_without_farms<S: FarmStore>(store: &S, chat_id: ChatId) -> AppResult<bool> {
    Ok(store
        .get_user(chat_id)
        .await?
        .map_or(false, |user| !user.has_farms()))
}

/// The user has farms and none of them is located
pub async fn still_without_location<S: FarmStore>(store: &S, chat_id: ChatId) -> AppResult<bool> {
    Ok(store
        .get_user(chat_id)
        .await?
        .map_or(false, |user| user.has_farms() && !user.has_located_farm()))
}
