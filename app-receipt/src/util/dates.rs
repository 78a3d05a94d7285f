/*!
 Contains date parsing and formatting functions for receipt timestamps.

 Receipts store dates as `IA5String` text in the [RFC 3339](https://www.rfc-editor.org/rfc/rfc3339) profile of ISO 8601,
 for example `2020-07-22T17:39:08Z`.
*/

use chrono::{DateTime, Utc};

/// Parse receipt date text into a UTC timestamp
///
/// Empty text is how the App Store marks an unset date, so it yields `None`.
/// Any other text, including whitespace, must be a valid timestamp.
///
/// # Example:
///
/// ```
/// use app_receipt::util::dates::parse_receipt_date;
///
/// let date = parse_receipt_date("2020-07-22T17:39:08Z").unwrap().unwrap();
/// assert_eq!(date.timestamp(), 1595439548);
/// assert!(parse_receipt_date("").unwrap().is_none());
/// ```
pub fn parse_receipt_date(text: &str) -> Result<Option<DateTime<Utc>>, chrono::ParseError> {
    if text.is_empty() {
        return Ok(None);
    }
    DateTime::parse_from_rfc3339(text).map(|date| Some(date.with_timezone(&Utc)))
}

/// Format a date for display
///
/// # Example:
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use app_receipt::util::dates::format;
///
/// let date = Utc.timestamp_opt(1595439548, 0).unwrap();
/// assert_eq!(format(&date), "Jul 22, 2020  5:39:08 PM UTC");
/// ```
pub fn format(date: &DateTime<Utc>) -> String {
    date.format("%b %d, %Y %l:%M:%S %p UTC").to_string()
}

/// Generate a readable diff from two dates
///
/// Returns `None` if `end` is before `start`.
///
/// # Example:
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use app_receipt::util::dates::readable_diff;
///
/// let start = Utc.timestamp_opt(1594755400, 0).unwrap();
/// let end = Utc.timestamp_opt(1594755700, 0).unwrap();
/// assert_eq!(readable_diff(&start, &end), Some("5 minutes".to_string()));
/// ```
pub fn readable_diff(start: &DateTime<Utc>, end: &DateTime<Utc>) -> Option<String> {
    let seconds = end.signed_duration_since(*start).num_seconds();
    if seconds < 0 {
        return None;
    }

    let units = [
        (seconds / 86400, "day", "days"),
        ((seconds % 86400) / 3600, "hour", "hours"),
        ((seconds % 3600) / 60, "minute", "minutes"),
        (seconds % 60, "second", "seconds"),
    ];

    let parts: Vec<String> = units
        .iter()
        .filter(|(amount, _, _)| *amount != 0)
        .map(|(amount, singular, plural)| match amount {
            1 => format!("{amount} {singular}"),
            _ => format!("{amount} {plural}"),
        })
        .collect();

    if parts.is_empty() {
        return Some("0 seconds".to_string());
    }
    Some(parts.join(", "))
}
