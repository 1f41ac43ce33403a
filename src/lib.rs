//! EMu to ReCollect migration
//!
//! Reads EMu XML exports (catalogue, accession lots, parties, locations and
//! multimedia), derives ReCollect fields for every record and writes
//! template-shaped import batches with their assets alongside.

pub mod config;
pub mod convert;
pub mod emu;
pub mod error;
pub mod models;
pub mod rules;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
