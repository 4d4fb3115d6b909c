pub mod sprint;
pub mod ticket;

use chrono::{DateTime, NaiveDateTime};

use crate::errors::{MetricsError, Result};

/// Parses a Jira timestamp into wall-clock time in its own offset.
///
/// Jira uses RFC 3339 on the agile API (`2021-08-09T10:00:00.000Z`) but
/// `+0100` style offsets on issue fields.
pub fn parse_jira_datetime(ticket: &str, value: &str) -> Result<NaiveDateTime> {
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .map(|dt| dt.naive_local())
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
        .map_err(|_| MetricsError::InvalidTimestamp {
            ticket: ticket.to_string(),
            value: value.to_string(),
        })
}

pub fn format_datetime(value: &NaiveDateTime) -> String {
    value.format("%Y-%m-%d %H:%M:%S").to_string()
}
