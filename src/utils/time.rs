//! Serde helpers for the backend's offset-less timestamps.
//!
//! The backend serializes `LocalDateTime` values such as
//! `2024-05-01T09:30:15.123456` with no UTC offset attached.

use serde::{Deserialize, Deserializer, Serializer};
use time::PrimitiveDateTime;
use time::format_description::FormatItem;
use time::macros::format_description;

const LOCAL_DATE_TIME: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
);

const LOCAL_DATE_TIME_OUT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

/// Parse a backend local timestamp.
pub fn parse_local(s: &str) -> Result<PrimitiveDateTime, time::error::Parse> {
    PrimitiveDateTime::parse(s, LOCAL_DATE_TIME)
}

/// Deserialize an optional local timestamp; `null` and missing fields map to `None`.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<PrimitiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = Option::<String>::deserialize(deserializer)?;
    s.map(|s| parse_local(&s).map_err(serde::de::Error::custom))
        .transpose()
}

/// Serialize an optional local timestamp with second precision.
pub fn serialize<S>(datetime: &Option<PrimitiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match datetime {
        Some(datetime) => {
            let s = datetime
                .format(LOCAL_DATE_TIME_OUT)
                .map_err(serde::ser::Error::custom)?;
            serializer.serialize_str(&s)
        }
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_and_without_fraction() {
        let whole = parse_local("2024-05-01T09:30:15").unwrap();
        assert_eq!(whole.hour(), 9);
        assert_eq!(whole.second(), 15);

        let fractional = parse_local("2024-05-01T09:30:15.123456").unwrap();
        assert_eq!(fractional.minute(), 30);
        assert_eq!(fractional.microsecond(), 123_456);
    }

    #[test]
    fn rejects_offset_timestamps() {
        assert!(parse_local("2024-05-01T09:30:15Z").is_err());
    }
}
