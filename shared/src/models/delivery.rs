//! Delivery audit models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ChatId;

/// Append-only audit record written after every sweep
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryLog {
    pub id: Uuid,
    /// Chats that received at least one message
    pub receivers: Vec<ChatId>,
    /// Purpose tag of the sweep, e.g. "weather"
    pub purpose: String,
    /// Number of messages delivered
    pub count: i32,
    pub created_at: DateTime<Utc>,
}

impl DeliveryLog {
    pub fn new(purpose: impl Into<String>, receivers: Vec<ChatId>, count: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            receivers,
            purpose: purpose.into(),
            count,
            created_at: Utc::now(),
        }
    }
}
