//! Telegram chat bot
//!
//! Every text is parsed into a `ChatbotCommand`. Users are created on their
//! first update, and reminders are queued for users who stall during
//! onboarding.

use serde::Deserialize;
use std::sync::Arc;

use shared::{ChatId, FarmField, GpsCoordinates, LocationMethod, NewUser, User};

use crate::db::FarmStore;
use crate::error::{AppError, AppResult};
use crate::external::{Gazetteer, MessagingChannel};
use crate::services::location::{resolve_detailed, Resolution};
pub use crate::services::reminder::ReminderDelays;
use crate::services::reminder::{ReminderKind, ReminderScheduler};

/// Incoming Bot API update
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<Sender>,
    pub text: Option<String>,
    pub location: Option<SharedLocation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: ChatId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sender {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl Sender {
    fn display_name(&self) -> Option<String> {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        (!name.is_empty()).then_some(name)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SharedLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// Parsed command from a user message
#[derive(Debug, Clone, PartialEq)]
pub enum ChatbotCommand {
    Start,
    Help,
    /// Register a farm: name, optional product
    AddFarm {
        name: String,
        product: Option<String>,
    },
    /// Set coordinates explicitly
    Location {
        farm: String,
        coordinates: GpsCoordinates,
    },
    /// Set the administrative region
    Village {
        farm: String,
        province: String,
        city: String,
        village: String,
    },
    DeleteFarm(String),
    ListFarms,
    /// Unknown command or bad arguments, with a hint for the user
    Unknown(String),
}

/// Parse a text message into a command
pub fn parse_command(text: &str) -> ChatbotCommand {
    let text = text.trim();
    let (head, rest) = match text.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (text, ""),
    };
    // Commands addressed in groups arrive as /cmd@botname
    let head = head.split('@').next().unwrap_or(head).to_lowercase();
    let args: Vec<&str> = rest.split_whitespace().collect();

    match head.as_str() {
        "/start" => ChatbotCommand::Start,
        "/help" => ChatbotCommand::Help,
        "/addfarm" => parse_add_farm(&args),
        "/location" => parse_location(&args),
        "/village" => parse_village(rest),
        "/delfarm" => match args.as_slice() {
            [name] => ChatbotCommand::DeleteFarm((*name).to_string()),
            _ => ChatbotCommand::Unknown("Usage: /delfarm <farm>".to_string()),
        },
        "/farms" => ChatbotCommand::ListFarms,
        _ => ChatbotCommand::Unknown(format!(
            "Unknown command: '{}'. Type /help for available commands.",
            text
        )),
    }
}

fn parse_add_farm(args: &[&str]) -> ChatbotCommand {
    match args {
        [name] => ChatbotCommand::AddFarm {
            name: (*name).to_string(),
            product: None,
        },
        [name, product @ ..] if !product.is_empty() => ChatbotCommand::AddFarm {
            name: (*name).to_string(),
            product: Some(product.join(" ")),
        },
        _ => ChatbotCommand::Unknown("Usage: /addfarm <name> [product]".to_string()),
    }
}

fn parse_location(args: &[&str]) -> ChatbotCommand {
    let [farm, lat, lon] = args else {
        return ChatbotCommand::Unknown("Usage: /location <farm> <lat> <lon>".to_string());
    };

    match (lat.parse::<f64>(), lon.parse::<f64>()) {
        (Ok(latitude), Ok(longitude)) => ChatbotCommand::Location {
            farm: (*farm).to_string(),
            coordinates: GpsCoordinates::new(latitude, longitude),
        },
        _ => ChatbotCommand::Unknown(format!("Invalid coordinates: {} {}", lat, lon)),
    }
}

fn parse_village(rest: &str) -> ChatbotCommand {
    let usage = || {
        ChatbotCommand::Unknown("Usage: /village <farm> <province>|<city>|<village>".to_string())
    };
    let Some((farm, region)) = rest.split_once(char::is_whitespace) else {
        return usage();
    };

    let parts: Vec<&str> = region.split('|').map(str::trim).collect();
    match parts.as_slice() {
        [province, city, village] if !village.is_empty() => ChatbotCommand::Village {
            farm: farm.to_string(),
            province: (*province).to_string(),
            city: (*city).to_string(),
            village: (*village).to_string(),
        },
        _ => usage(),
    }
}

const HELP_TEXT: &str = "Available commands:\n\
    /addfarm <name> [product] - register a farm\n\
    /location <farm> <lat> <lon> - set farm coordinates\n\
    /village <farm> <province>|<city>|<village> - set the farm's village\n\
    /delfarm <farm> - remove a farm\n\
    /farms - list your farms\n\
    You can also share a location when you have a single farm.";

/// Handles Telegram updates
pub struct ChatbotService<S, C> {
    store: S,
    channel: Arc<C>,
    gazetteer: Arc<Gazetteer>,
    reminders: ReminderScheduler<C>,
    delays: ReminderDelays,
}

impl<S: FarmStore, C: MessagingChannel + 'static> ChatbotService<S, C> {
    pub fn new(
        store: S,
        channel: Arc<C>,
        gazetteer: Arc<Gazetteer>,
        reminders: ReminderScheduler<C>,
        delays: ReminderDelays,
    ) -> Self {
        Self {
            store,
            channel,
            gazetteer,
            reminders,
            delays,
        }
    }

    /// Process one update and reply in the same chat
    pub async fn process_update(&self, update: Update) -> AppResult<()> {
        let Some(message) = update.message else {
            tracing::debug!("Ignoring update {} without a message", update.update_id);
            return Ok(());
        };
        let chat_id = message.chat.id;

        let new_user = NewUser {
            chat_id,
            username: message.from.as_ref().and_then(|f| f.username.clone()),
            display_name: message.from.as_ref().and_then(Sender::display_name),
        };
        let (user, created) = self.store.ensure_user(new_user).await?;
        if created {
            tracing::info!("Registered chat {}", chat_id);
            self.reminders.remind(
                self.store.clone(),
                ReminderKind::NoFarm,
                chat_id,
                self.delays.no_farm,
            );
        }

        let reply = match (message.text.as_deref(), message.location) {
            (_, Some(location)) => self.handle_shared_location(&user, location).await,
            (Some(text), None) => self.handle_command(&user, parse_command(text)).await,
            (None, None) => return Ok(()),
        };

        let reply = match reply {
            Ok(text) => text,
            Err(e @ (AppError::Validation { .. }
            | AppError::DuplicateEntry(_)
            | AppError::NotFound(_))) => e.to_string(),
            Err(e) => {
                tracing::error!("Failed to handle update {}: {}", update.update_id, e);
                self.reply(chat_id, "Something went wrong, please try again later.")
                    .await;
                return Err(e);
            }
        };

        self.reply(chat_id, &reply).await;
        Ok(())
    }

    async fn reply(&self, chat_id: ChatId, text: &str) {
        if let Err(e) = self.channel.send_text(chat_id, text).await {
            tracing::warn!("Failed to reply to chat {}: {}", chat_id, e);
        }
    }

    /// Execute a parsed command and return the reply text
    pub async fn handle_command(&self, user: &User, command: ChatbotCommand) -> AppResult<String> {
        let chat_id = user.chat_id;

        match command {
            ChatbotCommand::Start => Ok(format!(
                "Welcome! Register your farm to receive daily forecasts and advice.\n\n{}",
                HELP_TEXT
            )),
            ChatbotCommand::Help => Ok(HELP_TEXT.to_string()),
            ChatbotCommand::AddFarm { name, product } => {
                self.store.add_farm(chat_id, &name).await?;
                let name = name.trim();
                if let Some(product) = product {
                    self.store
                        .set_farm_field(chat_id, name, FarmField::Product(Some(product)))
                        .await?;
                }
                self.reminders.remind(
                    self.store.clone(),
                    ReminderKind::NoLocation,
                    chat_id,
                    self.delays.no_location,
                );
                Ok(format!(
                    "Farm '{}' added. Now set its location with /location or /village.",
                    name
                ))
            }
            ChatbotCommand::Location { farm, coordinates } => {
                self.store
                    .set_farm_field(
                        chat_id,
                        &farm,
                        FarmField::Location {
                            coordinates: Some(coordinates),
                            method: Some(LocationMethod::UserSent),
                        },
                    )
                    .await?;
                Ok(format!("Location of '{}' set to {}.", farm, coordinates))
            }
            ChatbotCommand::Village {
                farm,
                province,
                city,
                village,
            } => self.set_village(user, &farm, province, city, village).await,
            ChatbotCommand::DeleteFarm(farm) => {
                self.store.delete_farm(chat_id, &farm).await?;
                Ok(format!("Farm '{}' removed.", farm))
            }
            ChatbotCommand::ListFarms => Ok(describe_farms(user)),
            ChatbotCommand::Unknown(hint) => Ok(hint),
        }
    }

    async fn set_village(
        &self,
        user: &User,
        farm_name: &str,
        province: String,
        city: String,
        village: String,
    ) -> AppResult<String> {
        let chat_id = user.chat_id;
        let farm = user
            .farms
            .get(farm_name)
            .ok_or_else(|| AppError::NotFound(format!("Farm '{}'", farm_name)))?;

        self.store
            .set_farm_field(chat_id, farm_name, FarmField::Province(Some(province.clone())))
            .await?;
        self.store
            .set_farm_field(chat_id, farm_name, FarmField::City(Some(city.clone())))
            .await?;
        self.store
            .set_farm_field(chat_id, farm_name, FarmField::Village(Some(village.clone())))
            .await?;

        let mut probe = farm.clone();
        probe.location = None;
        probe.province = Some(province);
        probe.city = Some(city);
        probe.village = Some(village);

        match resolve_detailed(&probe, &self.gazetteer) {
            Resolution::Gazetteer(coordinates) => Ok(format!(
                "Village of '{}' saved; it is located at {}.",
                farm_name, coordinates
            )),
            Resolution::Unresolved(reason) => {
                if farm.location.is_none() {
                    self.store
                        .set_farm_field(
                            chat_id,
                            farm_name,
                            FarmField::Location {
                                coordinates: None,
                                method: Some(LocationMethod::Unsuccessful),
                            },
                        )
                        .await?;
                }
                tracing::info!("Village of farm '{}' not resolved: {}", farm_name, reason);
                Ok(format!(
                    "Village of '{}' saved, but it could not be located ({}). \
                     Please send coordinates with /location.",
                    farm_name, reason
                ))
            }
            Resolution::Direct(_) => Ok(format!("Village of '{}' saved.", farm_name)),
        }
    }

    async fn handle_shared_location(
        &self,
        user: &User,
        location: SharedLocation,
    ) -> AppResult<String> {
        let mut farms = user.farms.keys();
        let (Some(farm), None) = (farms.next(), farms.next()) else {
            return Ok(
                "Use /location <farm> <lat> <lon> to choose which farm this location is for."
                    .to_string(),
            );
        };

        let coordinates = GpsCoordinates::new(location.latitude, location.longitude);
        self.store
            .set_farm_field(
                user.chat_id,
                farm,
                FarmField::Location {
                    coordinates: Some(coordinates),
                    method: Some(LocationMethod::UserSent),
                },
            )
            .await?;
        Ok(format!("Location of '{}' set to {}.", farm, coordinates))
    }
}

fn describe_farms(user: &User) -> String {
    if !user.has_farms() {
        return "You have no farms yet. Use /addfarm <name> [product].".to_string();
    }

    let mut text = String::from("Your farms:");
    for farm in user.farms.values() {
        let location = match farm.location {
            Some(coordinates) => coordinates.to_string(),
            None => match farm.village_name() {
                Some(village) => format!("village {}", village),
                None => "no location".to_string(),
            },
        };
        text.push_str(&format!("\n- {} ({})", farm.name, location));
        if let Some(today) = farm.advisory.as_ref().and_then(|a| a.today.as_deref()) {
            text.push_str(&format!("\n  Latest advice: {}", today));
        }
    }
    text
}
