/// Utility functions for timestamps and labels
use time::{format_description, OffsetDateTime, UtcOffset};

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format.
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    match format_description::parse("[day].[month].[year] - [hour]:[minute]:[second]") {
        Ok(format) => dt.format(&format).unwrap_or_else(|_| dt.to_string()),
        Err(_) => dt.to_string(),
    }
}

/// Rolling-window label for a sample: time of day in UTC as HH:MM:SS
pub fn format_time_label(dt: &OffsetDateTime) -> String {
    let utc = dt.to_offset(UtcOffset::UTC);
    match format_description::parse("[hour]:[minute]:[second]") {
        Ok(format) => utc.format(&format).unwrap_or_else(|_| utc.time().to_string()),
        Err(_) => utc.time().to_string(),
    }
}

/// Round to two decimals for display strings
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
