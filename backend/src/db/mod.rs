//! Persistent store for users, farms and the delivery audit log
//!
//! Every mutation addresses a single attribute (or one attribute group such as
//! a farm's coordinates) so that a sweep writing a cached advisory and a user
//! editing their farm never overwrite each other's fields.

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgFarmStore;

use std::future::Future;

use shared::{validate_area, validate_coordinates, validate_farm_name};
use shared::{ChatId, DeliveryLog, FarmField, NewUser, User};

use crate::error::{AppError, AppResult};

/// Store handle injected into services
pub trait FarmStore: Clone + Send + Sync + 'static {
    fn get_user(&self, chat_id: ChatId) -> impl Future<Output = AppResult<Option<User>>> + Send;

    /// Create the user on first interaction; returns the user and whether it
    /// was created by this call
    fn ensure_user(&self, new_user: NewUser)
        -> impl Future<Output = AppResult<(User, bool)>> + Send;

    /// Every user with their farms, ordered by chat id
    fn list_users(&self) -> impl Future<Output = AppResult<Vec<User>>> + Send;

    /// Create an empty farm
    fn add_farm(&self, chat_id: ChatId, name: &str) -> impl Future<Output = AppResult<()>> + Send;

    /// Targeted update of one farm attribute
    fn set_farm_field(
        &self,
        chat_id: ChatId,
        farm_name: &str,
        field: FarmField,
    ) -> impl Future<Output = AppResult<()>> + Send;

    fn delete_farm(&self, chat_id: ChatId, farm_name: &str)
        -> impl Future<Output = AppResult<()>> + Send;

    fn set_blocked(&self, chat_id: ChatId, blocked: bool)
        -> impl Future<Output = AppResult<()>> + Send;

    fn append_delivery_log(&self, entry: &DeliveryLog)
        -> impl Future<Output = AppResult<()>> + Send;

    /// Newest entries first
    fn recent_delivery_logs(&self, limit: i64)
        -> impl Future<Output = AppResult<Vec<DeliveryLog>>> + Send;

    /// Distinct chat ids of users without any farm
    fn chats_without_farms(&self) -> impl Future<Output = AppResult<Vec<ChatId>>> + Send;

    /// Distinct chat ids of users whose farms all lack coordinates
    fn chats_without_location(&self) -> impl Future<Output = AppResult<Vec<ChatId>>> + Send;
}

/// Validate a farm name before insertion
pub(crate) fn check_farm_name(name: &str) -> AppResult<String> {
    validate_farm_name(name).map_err(|msg| AppError::validation("name", msg))?;
    Ok(name.trim().to_string())
}

/// Validate a field value before it is written
pub(crate) fn check_field(field: &FarmField) -> AppResult<()> {
    match field {
        FarmField::Location {
            coordinates: Some(coords),
            ..
        } => validate_coordinates(coords).map_err(|msg| AppError::validation("location", msg)),
        FarmField::Area(Some(area)) => {
            validate_area(*area).map_err(|msg| AppError::validation("area", msg))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::GpsCoordinates;

    #[test]
    fn test_check_farm_name_trims() {
        assert_eq!(check_farm_name("  north  ").unwrap(), "north");
        assert!(check_farm_name("a.b").is_err());
    }

    #[test]
    fn test_check_field_rejects_bad_location() {
        let field = FarmField::Location {
            coordinates: Some(GpsCoordinates::new(120.0, 51.0)),
            method: None,
        };
        assert!(matches!(
            check_field(&field),
            Err(AppError::Validation { .. })
        ));
        assert!(check_field(&FarmField::Location {
            coordinates: None,
            method: None
        })
        .is_ok());
    }
}
