//! Timestamp utilities
//!
//! Timestamps are persisted as fixed-width RFC 3339 UTC strings so that
//! lexical ordering in SQLite matches chronological ordering.

use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

/// Current UTC timestamp at storage precision (microseconds)
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Format a timestamp for storage (microsecond precision, `Z` suffix)
pub fn to_db_string(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp back into UTC
pub fn from_db_string(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid stored timestamp '{}': {}", value, e)))
}
