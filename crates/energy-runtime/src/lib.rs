//! Runtime layer for energy-mix.
//!
//! Wraps the synchronous engine in an async service that loads year documents
//! concurrently under one optional I/O deadline per query.

pub mod service;

pub use energy_core as core;
pub use energy_data as data;
