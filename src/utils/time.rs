use chrono::{DateTime, Utc};

/// Parses an RFC 3339 timestamp with any offset into UTC.
pub fn from_rfc3339(s: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s.trim())?.with_timezone(&Utc))
}
