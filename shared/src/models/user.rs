//! User models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::farm::Farm;
use crate::types::ChatId;

/// A bot user, keyed by the messaging platform's chat identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub chat_id: ChatId,
    pub username: Option<String>,
    pub phone: Option<String>,
    pub display_name: Option<String>,
    /// Last known reachability; never consulted before a send
    pub blocked: bool,
    pub registered_at: DateTime<Utc>,
    /// Farms keyed by name
    pub farms: BTreeMap<String, Farm>,
}

impl User {
    pub fn new(chat_id: ChatId, registered_at: DateTime<Utc>) -> Self {
        Self {
            chat_id,
            username: None,
            phone: None,
            display_name: None,
            blocked: false,
            registered_at,
            farms: BTreeMap::new(),
        }
    }

    pub fn has_farms(&self) -> bool {
        !self.farms.is_empty()
    }

    /// True when at least one farm carries direct coordinates
    pub fn has_located_farm(&self) -> bool {
        self.farms.values().any(|f| f.location.is_some())
    }
}

/// Profile details captured on first interaction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewUser {
    pub chat_id: ChatId,
    pub username: Option<String>,
    pub display_name: Option<String>,
}
