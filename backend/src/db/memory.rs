//! In-memory store used by tests and local runs without a database

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use shared::{ChatId, DeliveryLog, Farm, FarmField, NewUser, User};

use super::{check_farm_name, check_field, FarmStore};
use crate::error::{AppError, AppResult};

#[derive(Debug, Default)]
struct MemoryState {
    users: BTreeMap<ChatId, User>,
    logs: Vec<DeliveryLog>,
}

/// Store keeping every document in process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a complete user document
    pub async fn insert_user(&self, user: User) {
        self.state.write().await.users.insert(user.chat_id, user);
    }

    /// Every audit entry in insertion order
    pub async fn delivery_logs(&self) -> Vec<DeliveryLog> {
        self.state.read().await.logs.clone()
    }
}

impl FarmStore for InMemoryStore {
    async fn get_user(&self, chat_id: ChatId) -> AppResult<Option<User>> {
        Ok(self.state.read().await.users.get(&chat_id).cloned())
    }

    async fn ensure_user(&self, new_user: NewUser) -> AppResult<(User, bool)> {
        let mut state = self.state.write().await;
        if let Some(user) = state.users.get(&new_user.chat_id) {
            return Ok((user.clone(), false));
        }

        let mut user = User::new(new_user.chat_id, Utc::now());
        user.username = new_user.username;
        user.display_name = new_user.display_name;
        state.users.insert(user.chat_id, user.clone());
        Ok((user, true))
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        Ok(self.state.read().await.users.values().cloned().collect())
    }

    async fn add_farm(&self, chat_id: ChatId, name: &str) -> AppResult<()> {
        let name = check_farm_name(name)?;
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(&chat_id)
            .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        if user.farms.contains_key(&name) {
            return Err(AppError::DuplicateEntry(format!("Farm '{}'", name)));
        }
        user.farms.insert(name.clone(), Farm::named(name));
        Ok(())
    }

    async fn set_farm_field(
        &self,
        chat_id: ChatId,
        farm_name: &str,
        field: FarmField,
    ) -> AppResult<()> {
        check_field(&field)?;
        let mut state = self.state.write().await;
        let farm = state
            .users
            .get_mut(&chat_id)
            .and_then(|user| user.farms.get_mut(farm_name))
            .ok_or_else(|| AppError::NotFound(format!("Farm '{}'", farm_name)))?;

        field.apply(farm);
        Ok(())
    }

    async fn delete_farm(&self, chat_id: ChatId, farm_name: &str) -> AppResult<()> {
        let mut state = self.state.write().await;
        state
            .users
            .get_mut(&chat_id)
            .and_then(|user| user.farms.remove(farm_name))
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("Farm '{}'", farm_name)))
    }

    async fn set_blocked(&self, chat_id: ChatId, blocked: bool) -> AppResult<()> {
        if let Some(user) = self.state.write().await.users.get_mut(&chat_id) {
            user.blocked = blocked;
        }
        Ok(())
    }

    async fn append_delivery_log(&self, entry: &DeliveryLog) -> AppResult<()> {
        self.state.write().await.logs.push(entry.clone());
        Ok(())
    }

    async fn recent_delivery_logs(&self, limit: i64) -> AppResult<Vec<DeliveryLog>> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .state
            .read()
            .await
            .logs
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn chats_without_farms(&self) -> AppResult<Vec<ChatId>> {
        Ok(self
            .state
            .read()
            .await
            .users
            .values()
            .filter(|u| !u.has_farms())
            .map(|u| u.chat_id)
            .collect())
    }

    async fn chats_without_location(&self) -> AppResult<Vec<ChatId>> {
        Ok(self
            .state
            .read()
            .await
            .users
            .values()
            .filter(|u| u.has_farms() && !u.has_located_farm())
            .map(|u| u.chat_id)
            .collect())
    }
}
