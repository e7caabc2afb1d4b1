//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agro_advisory::db::{FarmStore, InMemoryStore};
use agro_advisory::external::telegram::{InlineKeyboardMarkup, SentMessage};
use agro_advisory::external::{DeliveryError, Gazetteer, MessagingChannel, OutgoingMessage};
use agro_advisory::services::{DispatchSettings, NotificationDispatcher};
use shared::{ChatId, FarmField, GazetteerRow, GpsCoordinates, LocationMethod, NewUser};

pub const OPERATOR: ChatId = 900;

/// Channel that records every send and fails on demand
#[derive(Default)]
pub struct MockChannel {
    failures: Mutex<HashMap<ChatId, DeliveryError>>,
    one_shot: Mutex<HashMap<ChatId, DeliveryError>>,
    attempts: Mutex<Vec<ChatId>>,
    delays: Mutex<HashMap<ChatId, Duration>>,
    sent: Mutex<Vec<(ChatId, String)>>,
}

impl MockChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every send to `chat_id` fails with `error`
    pub fn fail_with(&self, chat_id: ChatId, error: DeliveryError) {
        self.failures.lock().unwrap().insert(chat_id, error);
    }

    /// Only the next send to `chat_id` fails with `error`
    pub fn fail_once(&self, chat_id: ChatId, error: DeliveryError) {
        self.one_shot.lock().unwrap().insert(chat_id, error);
    }

    /// Chats of every send call, failed ones included
    pub fn attempts(&self) -> Vec<ChatId> {
        self.attempts.lock().unwrap().clone()
    }

    /// Every send to `chat_id` takes `delay` before succeeding
    pub fn stall(&self, chat_id: ChatId, delay: Duration) {
        self.delays.lock().unwrap().insert(chat_id, delay);
    }

    pub fn sent(&self) -> Vec<(ChatId, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, chat_id: ChatId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(id, _)| *id == chat_id)
            .map(|(_, text)| text)
            .collect()
    }

    /// Sends to anyone but the operator
    pub fn farmer_messages(&self) -> Vec<(ChatId, String)> {
        self.sent()
            .into_iter()
            .filter(|(id, _)| *id != OPERATOR)
            .collect()
    }
}

impl MessagingChannel for MockChannel {
    async fn send(
        &self,
        chat_id: ChatId,
        message: &OutgoingMessage,
        _markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<SentMessage, DeliveryError> {
        self.attempts.lock().unwrap().push(chat_id);
        let delay = self.delays.lock().unwrap().get(&chat_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let one_shot = self.one_shot.lock().unwrap().remove(&chat_id);
        let failure = one_shot.or_else(|| self.failures.lock().unwrap().get(&chat_id).cloned());
        if let Some(error) = failure {
            return Err(error);
        }

        let text = match message {
            OutgoingMessage::Text(text) => text.clone(),
            OutgoingMessage::Photo { caption, .. } | OutgoingMessage::Document { caption, .. } => {
                caption.clone().unwrap_or_default()
            }
        };
        let mut sent = self.sent.lock().unwrap();
        sent.push((chat_id, text));
        Ok(SentMessage {
            message_id: sent.len() as i64,
        })
    }

    async fn forward(
        &self,
        chat_id: ChatId,
        _from_chat: ChatId,
        message_id: i64,
    ) -> Result<SentMessage, DeliveryError> {
        self.sent.lock().unwrap().push((chat_id, format!("forward {}", message_id)));
        Ok(SentMessage { message_id })
    }

    async fn copy(
        &self,
        chat_id: ChatId,
        _from_chat: ChatId,
        message_id: i64,
    ) -> Result<SentMessage, DeliveryError> {
        self.sent.lock().unwrap().push((chat_id, format!("copy {}", message_id)));
        Ok(SentMessage { message_id })
    }
}

pub fn gazetteer_row(province: &str, city: &str, village: &str, x: f64, y: f64) -> GazetteerRow {
    GazetteerRow {
        province: province.into(),
        city: city.into(),
        village: village.into(),
        x,
        y,
    }
}

pub fn dispatcher(
    store: &InMemoryStore,
    channel: &Arc<MockChannel>,
    gazetteer: Gazetteer,
) -> NotificationDispatcher<InMemoryStore, MockChannel> {
    dispatcher_for(store, channel, gazetteer, vec![OPERATOR])
}

pub fn dispatcher_for(
    store: &InMemoryStore,
    channel: &Arc<MockChannel>,
    gazetteer: Gazetteer,
    operators: Vec<ChatId>,
) -> NotificationDispatcher<InMemoryStore, MockChannel> {
    NotificationDispatcher::new(
        store.clone(),
        Arc::clone(channel),
        Arc::new(gazetteer),
        DispatchSettings {
            send_timeout: Duration::from_secs(5),
            operators,
            ..DispatchSettings::default()
        },
    )
}

/// Register `chat_id` with one farm at `point`
pub async fn farmer_at(store: &InMemoryStore, chat_id: ChatId, point: GpsCoordinates) {
    store
        .ensure_user(NewUser {
            chat_id,
            ..NewUser::default()
        })
        .await
        .unwrap();
    store.add_farm(chat_id, "main").await.unwrap();
    store
        .set_farm_field(
            chat_id,
            "main",
            FarmField::Location {
                coordinates: Some(point),
                method: Some(LocationMethod::UserSent),
            },
        )
        .await
        .unwrap();
}

/// Add a located farm named `name` to an existing user
pub async fn add_located_farm(
    store: &InMemoryStore,
    chat_id: ChatId,
    name: &str,
    point: GpsCoordinates,
) {
    store.add_farm(chat_id, name).await.unwrap();
    store
        .set_farm_field(
            chat_id,
            name,
            FarmField::Location {
                coordinates: Some(point),
                method: Some(LocationMethod::UserSent),
            },
        )
        .await
        .unwrap();
}

/// Register `chat_id` with one farm known only by its village
pub async fn farmer_in_village(
    store: &InMemoryStore,
    chat_id: ChatId,
    province: &str,
    city: &str,
    village: &str,
) {
    store
        .ensure_user(NewUser {
            chat_id,
            ..NewUser::default()
        })
        .await
        .unwrap();
    store.add_farm(chat_id, "main").await.unwrap();
    for field in [
        FarmField::Province(Some(province.into())),
        FarmField::City(Some(city.into())),
        FarmField::Village(Some(village.into())),
    ] {
        store.set_farm_field(chat_id, "main", field).await.unwrap();
    }
}

/// GeoJSON FeatureCollection with one point feature per (lon, lat, properties)
pub fn feature_collection(features: &[(f64, f64, serde_json::Value)]) -> String {
    let features: Vec<serde_json::Value> = features
        .iter()
        .map(|(lon, lat, properties)| {
            serde_json::json!({
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [lon, lat]},
                "properties": properties,
            })
        })
        .collect();
    serde_json::json!({"type": "FeatureCollection", "features": features}).to_string()
}
