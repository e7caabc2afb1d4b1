//! PostgreSQL-backed store

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{types::Json, FromRow, PgPool};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

use shared::{AdvisorySnapshot, ChatId, DeliveryLog, Farm, FarmField, GpsCoordinates};
use shared::{LocationMethod, NewUser, User};

use super::{check_farm_name, check_field, FarmStore};
use crate::error::{AppError, AppResult};

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgFarmStore {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct UserRow {
    chat_id: i64,
    username: Option<String>,
    phone: Option<String>,
    display_name: Option<String>,
    blocked: bool,
    registered_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct FarmRow {
    chat_id: i64,
    name: String,
    product: Option<String>,
    province: Option<String>,
    city: Option<String>,
    village: Option<String>,
    area: Option<Decimal>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    location_method: Option<String>,
    advisory: Option<Json<AdvisorySnapshot>>,
}

#[derive(Debug, FromRow)]
struct DeliveryLogRow {
    id: Uuid,
    receivers: Vec<i64>,
    purpose: String,
    count: i32,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            chat_id: row.chat_id,
            username: row.username,
            phone: row.phone,
            display_name: row.display_name,
            blocked: row.blocked,
            registered_at: row.registered_at,
            farms: BTreeMap::new(),
        }
    }
}

impl From<FarmRow> for Farm {
    fn from(row: FarmRow) -> Self {
        let location = match (row.latitude, row.longitude) {
            (Some(latitude), Some(longitude)) => Some(GpsCoordinates::new(latitude, longitude)),
            _ => None,
        };
        let location_method = row
            .location_method
            .as_deref()
            .and_then(|m| match LocationMethod::from_str(m) {
                Ok(method) => Some(method),
                Err(e) => {
                    tracing::warn!("Farm {} of chat {}: {}", row.name, row.chat_id, e);
                    None
                }
            });

        Farm {
            name: row.name,
            product: row.product,
            province: row.province,
            city: row.city,
            village: row.village,
            area: row.area,
            location,
            location_method,
            advisory: row.advisory.map(|json| json.0),
        }
    }
}

impl From<DeliveryLogRow> for DeliveryLog {
    fn from(row: DeliveryLogRow) -> Self {
        DeliveryLog {
            id: row.id,
            receivers: row.receivers,
            purpose: row.purpose,
            count: row.count,
            created_at: row.created_at,
        }
    }
}

const FARM_COLUMNS: &str = "chat_id, name, product, province, city, village, area, \
     latitude, longitude, location_method, advisory";

impl PgFarmStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }

    async fn farms_of(&self, chat_id: ChatId) -> AppResult<Vec<FarmRow>> {
        let rows = sqlx::query_as::<_, FarmRow>(&format!(
            "SELECT {} FROM farms WHERE chat_id = $1 ORDER BY name",
            FARM_COLUMNS
        ))
        .bind(chat_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }
}

fn attach_farms(mut user: User, rows: Vec<FarmRow>) -> User {
    for row in rows {
        let farm = Farm::from(row);
        user.farms.insert(farm.name.clone(), farm);
    }
    user
}

impl FarmStore for PgFarmStore {
    async fn get_user(&self, chat_id: ChatId) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT chat_id, username, phone, display_name, blocked, registered_at
            FROM users
            WHERE chat_id = $1
            "#,
        )
        .bind(chat_id)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => {
                let farms = self.farms_of(chat_id).await?;
                Ok(Some(attach_farms(User::from(row), farms)))
            }
            None => Ok(None),
        }
    }

    async fn ensure_user(&self, new_user: NewUser) -> AppResult<(User, bool)> {
        let inserted = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users (chat_id, username, display_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (chat_id) DO NOTHING
            RETURNING chat_id
            "#,
        )
        .bind(new_user.chat_id)
        .bind(&new_user.username)
        .bind(&new_user.display_name)
        .fetch_optional(&self.db)
        .await?;

        let user = self
            .get_user(new_user.chat_id)
            .await?
            .ok_or_else(|| AppError::Internal("user vanished after insert".to_string()))?;

        Ok((user, inserted.is_some()))
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT chat_id, username, phone, display_name, blocked, registered_at
            FROM users
            ORDER BY chat_id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let farms = sqlx::query_as::<_, FarmRow>(&format!(
            "SELECT {} FROM farms ORDER BY chat_id, name",
            FARM_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        let mut by_chat: BTreeMap<ChatId, Vec<FarmRow>> = BTreeMap::new();
        for farm in farms {
            by_chat.entry(farm.chat_id).or_default().push(farm);
        }

        Ok(users
            .into_iter()
            .map(|row| {
                let farms = by_chat.remove(&row.chat_id).unwrap_or_default();
                attach_farms(User::from(row), farms)
            })
            .collect())
    }

    async fn add_farm(&self, chat_id: ChatId, name: &str) -> AppResult<()> {
        let name = check_farm_name(name)?;

        let result = sqlx::query(
            r#"
            INSERT INTO farms (chat_id, name)
            SELECT chat_id, $2 FROM users WHERE chat_id = $1
            ON CONFLICT (chat_id, name) DO NOTHING
            "#,
        )
        .bind(chat_id)
        .bind(&name)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_user(chat_id).await? {
                Some(_) => Err(AppError::DuplicateEntry(format!("Farm '{}'", name))),
                None => Err(AppError::NotFound("User".to_string())),
            };
        }

        Ok(())
    }

    async fn set_farm_field(
        &self,
        chat_id: ChatId,
        farm_name: &str,
        field: FarmField,
    ) -> AppResult<()> {
        check_field(&field)?;
        let field_name = field.name();

        let result = match field {
            FarmField::Product(value) => {
                sqlx::query("UPDATE farms SET product = $3 WHERE chat_id = $1 AND name = $2")
                    .bind(chat_id)
                    .bind(farm_name)
                    .bind(value)
                    .execute(&self.db)
                    .await?
            }
            FarmField::Province(value) => {
                sqlx::query("UPDATE farms SET province = $3 WHERE chat_id = $1 AND name = $2")
                    .bind(chat_id)
                    .bind(farm_name)
                    .bind(value)
                    .execute(&self.db)
                    .await?
            }
            FarmField::City(value) => {
                sqlx::query("UPDATE farms SET city = $3 WHERE chat_id = $1 AND name = $2")
                    .bind(chat_id)
                    .bind(farm_name)
                    .bind(value)
                    .execute(&self.db)
                    .await?
            }
            FarmField::Village(value) => {
                sqlx::query("UPDATE farms SET village = $3 WHERE chat_id = $1 AND name = $2")
                    .bind(chat_id)
                    .bind(farm_name)
                    .bind(value)
                    .execute(&self.db)
                    .await?
            }
            FarmField::Area(value) => {
                sqlx::query("UPDATE farms SET area = $3 WHERE chat_id = $1 AND name = $2")
                    .bind(chat_id)
                    .bind(farm_name)
                    .bind(value)
                    .execute(&self.db)
                    .await?
            }
            FarmField::Location {
                coordinates,
                method,
            } => {
                sqlx::query(
                    r#"
                    UPDATE farms
                    SET latitude = $3, longitude = $4, location_method = $5
                    WHERE chat_id = $1 AND name = $2
                    "#,
                )
                .bind(chat_id)
                .bind(farm_name)
                .bind(coordinates.map(|c| c.latitude))
                .bind(coordinates.map(|c| c.longitude))
                .bind(method.map(|m| m.as_str()))
                .execute(&self.db)
                .await?
            }
            FarmField::Advisory(value) => {
                sqlx::query("UPDATE farms SET advisory = $3 WHERE chat_id = $1 AND name = $2")
                    .bind(chat_id)
                    .bind(farm_name)
                    .bind(value.map(Json))
                    .execute(&self.db)
                    .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Farm '{}'", farm_name)));
        }

        tracing::debug!("Updated {} of farm '{}' for chat {}", field_name, farm_name, chat_id);
        Ok(())
    }

    async fn delete_farm(&self, chat_id: ChatId, farm_name: &str) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM farms WHERE chat_id = $1 AND name = $2")
            .bind(chat_id)
            .bind(farm_name)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Farm '{}'", farm_name)));
        }

        Ok(())
    }

    async fn set_blocked(&self, chat_id: ChatId, blocked: bool) -> AppResult<()> {
        sqlx::query("UPDATE users SET blocked = $2 WHERE chat_id = $1")
            .bind(chat_id)
            .bind(blocked)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn append_delivery_log(&self, entry: &DeliveryLog) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO delivery_logs (id, purpose, receivers, count, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.purpose)
        .bind(&entry.receivers)
        .bind(entry.count)
        .bind(entry.created_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn recent_delivery_logs(&self, limit: i64) -> AppResult<Vec<DeliveryLog>> {
        let rows = sqlx::query_as::<_, DeliveryLogRow>(
            r#"
            SELECT id, receivers, purpose, count, created_at
            FROM delivery_logs
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(DeliveryLog::from).collect())
    }

    async fn chats_without_farms(&self) -> AppResult<Vec<ChatId>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT u.chat_id
            FROM users u
            WHERE NOT EXISTS (SELECT 1 FROM farms f WHERE f.chat_id = u.chat_id)
            ORDER BY u.chat_id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(ids)
    }

    async fn chats_without_location(&self) -> AppResult<Vec<ChatId>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT chat_id
            FROM farms
            GROUP BY chat_id
            HAVING bool_and(latitude IS NULL)
            ORDER BY chat_id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(ids)
    }
}
