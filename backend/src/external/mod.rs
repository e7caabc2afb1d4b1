//! External integrations: messaging channel and data files

pub mod gazetteer;
pub mod geojson;
pub mod telegram;

pub use gazetteer::Gazetteer;
pub use telegram::{DeliveryError, MessagingChannel, OutgoingMessage, TelegramClient};
