//! Timestamp grammars for the two syndication formats.
//!
//! The grammar is picked by looking at the last character of the value:
//!
//! - Atom `updated`: a trailing `Z` means UTC (`2021-05-01T10:00:00Z`),
//!   anything else is read with a numeric offset (`2021-05-01T10:00:00+02:00`).
//! - RSS `pubDate`: a trailing `T` means a zone name such as `GMT` or `EST`
//!   (`Mon, 2 Jan 2006 15:04:05 GMT`), anything else is read with a numeric
//!   offset (`Mon, 2 Jan 2006 15:04:05 -0700`).
//!
//! Fractional seconds are accepted after the seconds field in both grammars.

use chrono::format::{self, Parsed, StrftimeItems};
use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, Utc};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const ATOM_UTC: &str = "%Y-%m-%dT%H:%M:%S%.fZ";
const ATOM_OFFSET: &str = "%Y-%m-%dT%H:%M:%S%.f%:z";
const RSS_OFFSET: &str = "%d %b %Y %H:%M:%S%.f %z";
const RSS_NAMED: &str = "%d %b %Y %H:%M:%S%.f";

/// Which feed grammar a date was read with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    Atom,
    Rss,
}

impl fmt::Display for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateFormat::Atom => f.write_str("Atom"),
            DateFormat::Rss => f.write_str("RSS"),
        }
    }
}

/// A present date field that does not match its inferred grammar.
#[derive(Debug, Error)]
#[error("Invalid {format} date {value:?}: {source}")]
pub struct DateError {
    pub format: DateFormat,
    pub value: String,
    #[source]
    pub source: chrono::ParseError,
}

/// What the parser does with a date that fails to parse.
///
/// The same policy applies to RSS and Atom dates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum DatePolicy {
    /// Abort the whole parse with [`DateError`].
    #[default]
    #[serde(rename = "abort")]
    Abort,
    /// Keep the parse-time reference timestamp and continue.
    #[serde(rename = "fallback")]
    FallbackToNow,
}

impl FromStr for DatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(DatePolicy::Abort),
            "fallback" => Ok(DatePolicy::FallbackToNow),
            other => Err(format!(
                "unknown date policy '{}' (expected 'abort' or 'fallback')",
                other
            )),
        }
    }
}

/// Parses an Atom `updated` value.
pub fn parse_atom_date(text: &str) -> Result<DateTime<FixedOffset>, DateError> {
    let value = text.trim().to_ascii_uppercase();
    let parsed = if value.ends_with('Z') {
        NaiveDateTime::parse_from_str(&value, ATOM_UTC).map(|naive| naive.and_utc().fixed_offset())
    } else {
        DateTime::parse_from_str(&value, ATOM_OFFSET)
    };

    parsed.map_err(|source| DateError {
        format: DateFormat::Atom,
        value: text.to_string(),
        source,
    })
}

/// Parses an RSS `pubDate` value.
///
/// The leading weekday is optional. It must be a day name, but it is not
/// checked against the date, so `Tue, 2 Jan 2006 ...` still parses.
pub fn parse_rss_date(text: &str) -> Result<DateTime<FixedOffset>, DateError> {
    let error = |source| DateError {
        format: DateFormat::Rss,
        value: text.to_string(),
        source,
    };

    let trimmed = text.trim();
    let value = match trimmed.split_once(',') {
        Some((weekday, rest)) => {
            check_weekday(weekday.trim()).map_err(error)?;
            rest.trim()
        }
        None => trimmed,
    };

    let parsed = if trimmed.to_ascii_uppercase().ends_with('T') {
        let (stamp, zone) = value
            .rsplit_once(char::is_whitespace)
            .unwrap_or((value, ""));
        NaiveDateTime::parse_from_str(stamp.trim_end(), RSS_NAMED).map(|naive| {
            let offset = named_zone_offset(zone);
            DateTime::from_naive_utc_and_offset(naive - offset, offset)
        })
    } else {
        DateTime::parse_from_str(value, RSS_OFFSET)
    };

    parsed.map_err(error)
}

/// Accepts a weekday name on its own, without resolving a date from it.
fn check_weekday(name: &str) -> Result<(), chrono::ParseError> {
    let mut parsed = Parsed::new();
    format::parse(&mut parsed, name, StrftimeItems::new("%a"))
}

/// RFC 822 zone names. Unknown names resolve to UTC.
fn named_zone_offset(zone: &str) -> FixedOffset {
    let hours = match zone.to_ascii_uppercase().as_str() {
        "UT" | "GMT" => 0,
        "EDT" => -4,
        "EST" | "CDT" => -5,
        "CST" | "MDT" => -6,
        "MST" | "PDT" => -7,
        "PST" => -8,
        other => {
            tracing::debug!(zone = %other, "Unknown time zone name, assuming UTC");
            0
        }
    };
    FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| Utc.fix())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn offset(hours: i32) -> FixedOffset {
        FixedOffset::east_opt(hours * 3600).unwrap()
    }

    #[test]
    fn test_atom_utc() {
        let when = parse_atom_date("2021-05-01T10:00:00Z").unwrap();
        assert_eq!(when, Utc.with_ymd_and_hms(2021, 5, 1, 10, 0, 0).unwrap());
        assert_eq!(when.offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_atom_lowercase_z() {
        let when = parse_atom_date("2021-05-01t10:00:00z").unwrap();
        assert_eq!(when, Utc.with_ymd_and_hms(2021, 5, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_atom_numeric_offset() {
        let when = parse_atom_date("2021-05-01T10:00:00+02:00").unwrap();
        assert_eq!(
            when,
            offset(2).with_ymd_and_hms(2021, 5, 1, 10, 0, 0).unwrap()
        );
        assert_eq!(when.offset().local_minus_utc(), 7200);
    }

    #[test]
    fn test_atom_fractional_seconds() {
        let when = parse_atom_date("2021-05-01T10:00:00.250Z").unwrap();
        assert_eq!(when.timestamp_subsec_millis(), 250);

        let when = parse_atom_date("2021-05-01T10:00:00.5-03:00").unwrap();
        assert_eq!(when.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_atom_surrounding_whitespace() {
        assert!(parse_atom_date("\n  2021-05-01T10:00:00Z  \n").is_ok());
    }

    #[test]
    fn test_atom_missing_offset_is_error() {
        let err = parse_atom_date("2021-05-01T10:00:00").unwrap_err();
        assert_eq!(err.format, DateFormat::Atom);
        assert_eq!(err.value, "2021-05-01T10:00:00");
    }

    #[test]
    fn test_atom_rejects_rss_shape() {
        assert!(parse_atom_date("Mon, 2 Jan 2006 15:04:05 -0700").is_err());
    }

    #[test]
    fn test_rss_numeric_offset() {
        let when = parse_rss_date("Mon, 2 Jan 2006 15:04:05 -0700").unwrap();
        assert_eq!(
            when,
            offset(-7).with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap()
        );
        assert_eq!(when.offset().local_minus_utc(), -7 * 3600);
    }

    #[test]
    fn test_rss_two_digit_day() {
        let when = parse_rss_date("Fri, 02 Jan 2009 08:30:00 +0100").unwrap();
        assert_eq!(when, offset(1).with_ymd_and_hms(2009, 1, 2, 8, 30, 0).unwrap());
    }

    #[test]
    fn test_rss_named_gmt() {
        let when = parse_rss_date("Mon, 2 Jan 2006 15:04:05 GMT").unwrap();
        assert_eq!(when, Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap());
    }

    #[test]
    fn test_rss_named_us_zones() {
        let est = parse_rss_date("Mon, 2 Jan 2006 15:04:05 EST").unwrap();
        assert_eq!(est, Utc.with_ymd_and_hms(2006, 1, 2, 20, 4, 5).unwrap());
        assert_eq!(est.offset().local_minus_utc(), -5 * 3600);

        let pdt = parse_rss_date("Mon, 2 Jan 2006 15:04:05 PDT").unwrap();
        assert_eq!(pdt, Utc.with_ymd_and_hms(2006, 1, 2, 22, 4, 5).unwrap());
    }

    #[test]
    fn test_rss_unknown_zone_name_is_utc() {
        let when = parse_rss_date("Mon, 2 Jan 2006 15:04:05 XYZT").unwrap();
        assert_eq!(when, Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap());
    }

    #[test]
    fn test_rss_lowercase_zone_suffix() {
        let when = parse_rss_date("Mon, 2 Jan 2006 15:04:05 gmt").unwrap();
        assert_eq!(when, Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap());
    }

    #[test]
    fn test_rss_weekday_not_checked() {
        // 2 Jan 2006 was a Monday
        assert!(parse_rss_date("Sat, 2 Jan 2006 15:04:05 -0700").is_ok());
        assert!(parse_rss_date("2 Jan 2006 15:04:05 -0700").is_ok());
    }

    #[test]
    fn test_rss_weekday_must_be_a_day_name() {
        let err = parse_rss_date("Garbage, 2 Jan 2006 15:04:05 GMT").unwrap_err();
        assert_eq!(err.format, DateFormat::Rss);
        assert_eq!(err.value, "Garbage, 2 Jan 2006 15:04:05 GMT");

        assert!(parse_rss_date(", 2 Jan 2006 15:04:05 GMT").is_err());
        assert!(parse_rss_date("mon, 2 Jan 2006 15:04:05 GMT").is_ok());
    }

    #[test]
    fn test_rss_named_zone_requires_name_pattern() {
        // Ends in "T" but the date portion is garbage
        let err = parse_rss_date("not a date at all T").unwrap_err();
        assert_eq!(err.format, DateFormat::Rss);
    }

    #[test]
    fn test_rss_utc_suffix_uses_numeric_pattern() {
        // "UTC" does not end in "T", so it goes through the numeric grammar and fails
        assert!(parse_rss_date("Mon, 2 Jan 2006 15:04:05 UTC").is_err());
    }

    #[test]
    fn test_rss_rejects_atom_shape() {
        assert!(parse_rss_date("2021-05-01T10:00:00Z").is_err());
    }

    #[test]
    fn test_date_policy_from_str() {
        assert_eq!("abort".parse::<DatePolicy>().unwrap(), DatePolicy::Abort);
        assert_eq!(
            "Fallback".parse::<DatePolicy>().unwrap(),
            DatePolicy::FallbackToNow
        );
        assert!("ignore".parse::<DatePolicy>().is_err());
        assert_eq!(DatePolicy::default(), DatePolicy::Abort);
    }

    #[test]
    fn test_error_message_names_format() {
        let err = parse_rss_date("yesterday").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("RSS"), "{}", msg);
        assert!(msg.contains("yesterday"), "{}", msg);
    }
}
