//! # Cultural Context Analyzer Common Library
//!
//! Shared code for the analyzer service and its tooling:
//! - Error types
//! - Bootstrap configuration (TOML + environment + defaults)
//! - Database initialization and schema
//! - Timestamp helpers

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
