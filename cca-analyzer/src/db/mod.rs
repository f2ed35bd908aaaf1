//! Database access for the analyzer
//!
//! Schema lives in `cca_common::db`; these modules hold the queries.

pub mod analyses;
pub mod cache_entries;
