//! Configuration management for the Agro Advisory bot
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with AGRO_ prefix

use chrono::format::{Item, StrftimeItems};
use chrono::{FixedOffset, NaiveTime};
use config::{ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use shared::ChatId;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Telegram Bot API configuration
    pub telegram: TelegramConfig,

    /// Advisory dataset configuration
    pub dataset: DatasetConfig,

    /// Location fallback table
    #[serde(default)]
    pub gazetteer: GazetteerConfig,

    /// Daily sweep times
    pub schedule: ScheduleConfig,

    /// Follow-up reminder delays
    pub reminders: ReminderConfig,

    /// Chat ids that receive sweep summaries and failure reports
    #[serde(default)]
    pub operators: Vec<ChatId>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,

    /// Bearer token required on operator endpoints
    pub operator_token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    /// Bot token issued by BotFather
    pub bot_token: String,

    /// Bot API base URL
    pub api_base_url: String,

    /// Expected value of the X-Telegram-Bot-Api-Secret-Token header
    pub webhook_secret: Option<String>,

    /// Upper bound for a single send, in seconds
    pub send_timeout_secs: u64,
}

impl TelegramConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatasetConfig {
    /// Directory holding the daily files
    pub dir: String,

    /// chrono format pattern for a day's file name
    pub file_pattern: String,

    /// Local hour before which yesterday's file may stand in for today's
    pub cutover_hour: u32,

    /// Offset of local time from UTC, in minutes
    pub utc_offset_minutes: i32,

    /// Largest planar distance accepted as coverage, in degrees
    pub match_threshold: f64,

    /// Days shown in the weather table
    pub forecast_days: u32,
}

impl DatasetConfig {
    pub fn utc_offset(&self) -> Result<FixedOffset, ConfigError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            ConfigError::Message(format!(
                "dataset.utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            ))
        })
    }

    pub fn cutover(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::from_hms_opt(self.cutover_hour, 0, 0).ok_or_else(|| {
            ConfigError::Message(format!(
                "dataset.cutover_hour out of range: {}",
                self.cutover_hour
            ))
        })
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GazetteerConfig {
    /// CSV file with province,city,village,x,y columns
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    /// Local time of the weather sweep (HH:MM)
    pub weather_at: String,

    /// Local time of the advisory sweep (HH:MM)
    pub advisory_at: String,
}

impl ScheduleConfig {
    pub fn parse_time(value: &str) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(value, "%H:%M")
            .map_err(|e| ConfigError::Message(format!("invalid time '{}': {}", value, e)))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReminderConfig {
    /// Delay before reminding a user who has not added a farm
    pub no_farm_delay_secs: u64,

    /// Delay before reminding a user whose farms have no location
    pub no_location_delay_secs: u64,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("AGRO_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.operator_token", "")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("telegram.api_base_url", "https://api.telegram.org")?
            .set_default("telegram.send_timeout_secs", 15)?
            .set_default("dataset.dir", "data")?
            .set_default("dataset.file_pattern", "advisory_%Y%m%d.geojson")?
            .set_default("dataset.cutover_hour", 7)?
            .set_default("dataset.utc_offset_minutes", 210)?
            .set_default("dataset.match_threshold", 0.1)?
            .set_default("dataset.forecast_days", 4)?
            .set_default("schedule.weather_at", "07:30")?
            .set_default("schedule.advisory_at", "08:00")?
            .set_default("reminders.no_farm_delay_secs", 3600)?
            .set_default("reminders.no_location_delay_secs", 7200)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (AGRO_ prefix)
            .add_source(
                Environment::with_prefix("AGRO")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("operators")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would only fail later at sweep time
    fn validate(&self) -> Result<(), ConfigError> {
        self.dataset.utc_offset()?;
        self.dataset.cutover()?;
        let mut pattern = StrftimeItems::new(&self.dataset.file_pattern);
        if pattern.any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::Message(format!(
                "dataset.file_pattern is not a valid date format: {}",
                self.dataset.file_pattern
            )));
        }
        ScheduleConfig::parse_time(&self.schedule.weather_at)?;
        ScheduleConfig::parse_time(&self.schedule.advisory_at)?;
        if !(self.dataset.match_threshold.is_finite() && self.dataset.match_threshold >= 0.0) {
            return Err(ConfigError::Message(
                "dataset.match_threshold must be a non-negative number".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_schedule_time() {
        assert_eq!(
            ScheduleConfig::parse_time("07:30").unwrap(),
            NaiveTime::from_hms_opt(7, 30, 0).unwrap()
        );
        assert!(ScheduleConfig::parse_time("7h30").is_err());
    }

    #[test]
    fn test_dataset_offset_and_cutover() {
        let dataset = DatasetConfig {
            dir: "data".into(),
            file_pattern: "advisory_%Y%m%d.geojson".into(),
            cutover_hour: 7,
            utc_offset_minutes: 210,
            match_threshold: 0.1,
            forecast_days: 4,
        };
        assert_eq!(dataset.utc_offset().unwrap().local_minus_utc(), 210 * 60);
        assert_eq!(dataset.cutover().unwrap(), NaiveTime::from_hms_opt(7, 0, 0).unwrap());

        let broken = DatasetConfig {
            cutover_hour: 25,
            ..dataset
        };
        assert!(broken.cutover().is_err());
    }
}
