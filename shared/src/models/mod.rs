//! Domain models for the Agro Advisory platform

mod dataset;
mod delivery;
mod farm;
mod user;

pub use dataset::*;
pub use delivery::*;
pub use farm::*;
pub use user::*;
