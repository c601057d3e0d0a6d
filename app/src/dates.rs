//! The backend speaks local wall-clock date-times without an offset
//! (`2026-01-10T09:00:00`), sometimes with fractional seconds and sometimes
//! with a trailing `Z` that must be ignored.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serializer};

const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a server date-time
#[must_use]
pub fn parse_server_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim().trim_end_matches('Z');
    // %.f also accepts a missing fraction
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

/// Format a date-time the way the server expects it
#[must_use]
pub fn format_server_datetime(value: &NaiveDateTime) -> String {
    value.format(DATE_TIME_FORMAT).to_string()
}

/// Format a calendar day for query parameters
#[must_use]
pub fn format_query_date(day: NaiveDate) -> String {
    day.format(DATE_FORMAT).to_string()
}

/// `#[serde(with = "dates::optional")]` for `Option<NaiveDateTime>` fields.
///
/// Unparseable strings decode as `None` rather than failing the whole payload.
pub mod optional {
    use super::{Deserialize, Deserializer, NaiveDateTime, Serializer, format_server_datetime, parse_server_datetime};

    /// Deserialize an optional server date-time
    ///
    /// # Errors
    ///
    /// Returns the deserializer's error if the value is neither a string nor null.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = Option::<String>::deserialize(deserializer)?;
        Ok(text.as_deref().and_then(|text| {
            let parsed = parse_server_datetime(text);
            if parsed.is_none() {
                tracing::debug!(value = text, "Unrecognised server date-time");
            }
            parsed
        }))
    }

    /// Serialize an optional date-time in server format
    ///
    /// # Errors
    ///
    /// Returns the serializer's error.
    #[allow(clippy::ref_option)] // serde's `with` signature
    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(value) => serializer.serialize_str(&format_server_datetime(value)),
            None => serializer.serialize_none(),
        }
    }
}
