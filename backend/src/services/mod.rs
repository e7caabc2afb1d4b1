//! Advisory pipeline services for the Agro Advisory bot

pub mod advisory;
pub mod chatbot;
pub mod dataset;
pub mod location;
pub mod notification;
pub mod reminder;
pub mod scheduler;
pub mod spatial;
pub mod sweep;

pub use advisory::{AdvisoryReport, ReportTemplate, WeatherReport};
pub use chatbot::ChatbotService;
pub use dataset::DatasetSource;
pub use notification::{DeliveryReport, DispatchSettings, NotificationDispatcher};
pub use reminder::{ReminderKind, ReminderScheduler};
pub use spatial::SpatialIndex;
pub use sweep::{SweepKind, SweepService};
