//! HTTP API handlers for cca-analyzer

pub mod analysis;
pub mod cache;
pub mod entities;
pub mod health;

pub use analysis::{analyze, delete_analysis, get_analysis, history, stats};
pub use cache::{cache_stats, clear_cache};
pub use entities::{entity_highlights, extract_entities};
pub use health::health_routes;
