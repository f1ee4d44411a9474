//! Data ingestion and aggregation layer for energy-mix.
//!
//! Responsible for discovering and loading per-year JSON documents,
//! flattening them into records, applying the query window, and producing
//! the level table and the monthly category summary.

pub mod aggregator;
pub mod analysis;
pub mod filter;
pub mod monthly;
pub mod normalizer;
pub mod reader;

pub use energy_core as core;
