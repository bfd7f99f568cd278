//! Timestamp Utilities

use chrono::{SecondsFormat, Utc};

/// Current UTC time as RFC-3339 with fixed microsecond precision.
///
/// Fixed width keeps lexicographic order identical to chronological order,
/// which message ordering relies on (timestamps are stored as TEXT).
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
