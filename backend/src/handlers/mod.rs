//! HTTP request handlers

pub mod health;
pub mod sweep;
pub mod telegram;

pub use health::health_check;
pub use sweep::{list_delivery_logs, trigger_sweep};
pub use telegram::handle_telegram_webhook;
