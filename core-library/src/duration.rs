//! Duration helpers
//!
//! Playback positions and track lengths are carried as [`std::time::Duration`]
//! everywhere in the core. These helpers convert them to and from the
//! clock-style strings shown by hosts and the millisecond integers used on
//! the serialization boundary.

use std::time::Duration;

use crate::error::{LibraryError, Result};

/// Format a duration as `m:ss`, or `h:mm:ss` once it reaches an hour.
///
/// Sub-second precision is truncated.
///
/// ```
/// use core_library::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(65)), "1:05");
/// assert_eq!(format_duration(Duration::from_secs(3725)), "1:02:05");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Parse `ss`, `m:ss` or `h:mm:ss` into a duration.
///
/// Every component after the first must be below 60.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(LibraryError::InvalidDuration(input.to_string()));
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() > 3 {
        return Err(LibraryError::InvalidDuration(input.to_string()));
    }

    let mut total: u64 = 0;
    for (i, part) in parts.iter().enumerate() {
        let value: u64 = part
            .parse()
            .map_err(|_| LibraryError::InvalidDuration(input.to_string()))?;
        if i > 0 && value >= 60 {
            return Err(LibraryError::InvalidDuration(input.to_string()));
        }
        total = total * 60 + value;
    }

    Ok(Duration::from_secs(total))
}

/// Serialize a [`Duration`] as integer milliseconds.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Position {
///     #[serde(with = "core_library::duration::duration_ms")]
///     at: Duration,
/// }
/// ```
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::ZERO), "0:00");
        assert_eq!(format_duration(Duration::from_millis(59_999)), "0:59");
        assert_eq!(format_duration(Duration::from_secs(600)), "10:00");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1:00:00");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("42").unwrap(), Duration::from_secs(42));
        assert_eq!(parse_duration("3:07").unwrap(), Duration::from_secs(187));
        assert_eq!(parse_duration(" 1:02:05 ").unwrap(), Duration::from_secs(3725));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("1:60").is_err());
        assert!(parse_duration("a:10").is_err());
        assert!(parse_duration("1:2:3:4").is_err());
    }

    #[test]
    fn test_format_then_parse_keeps_whole_seconds() {
        let d = Duration::from_secs(4000);
        assert_eq!(parse_duration(&format_duration(d)).unwrap(), d);
    }
}
