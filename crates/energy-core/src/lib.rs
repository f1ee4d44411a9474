//! Core domain types for energy-mix.
//!
//! Records, output rows, the fixed source category table, calendar helpers,
//! the shared error type and CLI settings.

pub mod categories;
pub mod error;
pub mod models;
pub mod settings;
pub mod time_utils;

pub use error::{EnergyError, Result};
