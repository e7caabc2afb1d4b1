//! Shared types and models for the Agro Advisory platform
//!
//! This crate contains the domain types used by the bot backend and any
//! future tooling that reads the same store or dataset files.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
