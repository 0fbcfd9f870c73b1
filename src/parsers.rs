//! Parsers for the irregular text encodings found in raw flight records.
//!
//! - [`get_duration`]: `"2.50h m"` / `"3h 30m"` → hours as `f64`
//! - [`get_stops`]: `"1-stop\n\tVia IXU"` → mapped stop category
//! - [`bucket_hours`]: `"06:20"` → name of the hour bucket containing 6
//!
//! All three fail loudly on text they cannot interpret; none of them
//! substitutes a default value.

use crate::config::HourRange;
use crate::error::{AirfareError, Result};
use indexmap::IndexMap;
use regex::Regex;
use std::sync::LazyLock;

static DECIMAL_HOURS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+\.[0-9]{1,2}h m").expect("valid regex"));
static DECIMAL_PARTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)\.([0-9]{1,2})h").expect("valid regex"));
static HOURS_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)h").expect("valid regex"));
static MINUTES_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^0-9])([0-5]?[0-9])m").expect("valid regex"));
static CLOCK_HOUR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-2][0-9]):").expect("valid regex"));

/// The two textual grammars a duration can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationGrammar {
    /// `"<h>.<ff>h m"`: the fraction is a decimal part of an hour (`.50` = 30 minutes)
    DecimalHours,
    /// `"<h>h <m>m"`
    HoursMinutes,
}

impl DurationGrammar {
    /// Every string maps to exactly one grammar; whether it actually parses
    /// under that grammar is decided by [`get_duration`].
    pub fn classify(text: &str) -> Self {
        if DECIMAL_HOURS.is_match(text) {
            Self::DecimalHours
        } else {
            Self::HoursMinutes
        }
    }
}

/// Duration in hours, rounded to two decimals.
///
/// ```
/// use airfare::parsers::get_duration;
///
/// assert_eq!(get_duration("2.50h m").unwrap(), 2.5);
/// assert_eq!(get_duration("1h 45m").unwrap(), 1.75);
/// assert!(get_duration("10h").is_err());
/// ```
///
/// # Errors
///
/// Returns [`AirfareError::Parse`] when the text matches neither grammar.
pub fn get_duration(text: &str) -> Result<f64> {
    let (hours, minutes) = match DurationGrammar::classify(text) {
        DurationGrammar::DecimalHours => {
            let caps = DECIMAL_PARTS
                .captures(text)
                .ok_or_else(|| AirfareError::parse("duration", text, "malformed decimal hours"))?;
            let hours = parse_int(&caps[1], text)?;
            let fraction: f64 = format!("0.{}", &caps[2])
                .parse()
                .map_err(|e| AirfareError::parse("duration", text, format!("{e}")))?;
            (hours, (fraction * 60.0).round())
        }
        DurationGrammar::HoursMinutes => {
            let hours = HOURS_PART
                .captures(text)
                .ok_or_else(|| AirfareError::parse("duration", text, "no leading '<hours>h'"))?;
            let minutes = MINUTES_PART
                .captures(text)
                .ok_or_else(|| AirfareError::parse("duration", text, "no '<minutes>m'"))?;
            (parse_int(&hours[1], text)?, parse_int(&minutes[1], text)? as f64)
        }
    };

    Ok(round2(hours as f64 + minutes / 60.0))
}

fn parse_int(digits: &str, text: &str) -> Result<u32> {
    digits
        .parse()
        .map_err(|e| AirfareError::parse("duration", text, format!("{e}")))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Compiled stop-count parser: a regex locating the stop phrase and the
/// mapping from phrase to category.
#[derive(Debug, Clone)]
pub struct StopsParser {
    pattern: Regex,
    stop_dict: IndexMap<String, i64>,
}

impl StopsParser {
    pub fn new(pattern: &str, stop_dict: IndexMap<String, i64>) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            stop_dict,
        })
    }

    /// `Ok(None)` when the pattern does not occur in `text`.
    ///
    /// # Errors
    ///
    /// Returns [`AirfareError::Parse`] when the pattern matches a phrase that
    /// has no entry in the stop mapping.
    pub fn parse(&self, text: &str) -> Result<Option<i64>> {
        let Some(found) = self.pattern.find(text) else {
            tracing::debug!("{text:?} does not contain stops info, returning null");
            return Ok(None);
        };

        self.stop_dict
            .get(found.as_str())
            .copied()
            .map(Some)
            .ok_or_else(|| {
                AirfareError::parse(
                    "stops",
                    text,
                    format!("matched '{}' which is not in stop_dict", found.as_str()),
                )
            })
    }
}

/// Number of stops encoded in `text`, or `None` when `pattern` does not match.
///
/// # Errors
///
/// Fails when `pattern` is not a valid regex or the matched phrase is not a
/// key of `stop_dict`.
pub fn get_stops(text: &str, pattern: &str, stop_dict: &IndexMap<String, i64>) -> Result<Option<i64>> {
    StopsParser::new(pattern, stop_dict.clone())?.parse(text)
}

/// Name of the bucket whose `[min, max)` range contains the hour of `time`.
///
/// # Errors
///
/// Fails when `time` does not start with a `HH:` hour between 00 and 23, or
/// when no bucket contains the hour.
pub fn bucket_hours<'a>(time: &str, hour_buckets: &'a IndexMap<String, HourRange>) -> Result<&'a str> {
    let caps = CLOCK_HOUR
        .captures(time)
        .ok_or_else(|| AirfareError::parse("hour", time, "expected a leading 'HH:'"))?;
    let hour: u32 = caps[1]
        .parse()
        .map_err(|e| AirfareError::parse("hour", time, format!("{e}")))?;
    if hour > 23 {
        return Err(AirfareError::parse(
            "hour",
            time,
            format!("hour {hour} is outside 00-23"),
        ));
    }

    hour_buckets
        .iter()
        .find(|(_, range)| range.contains(hour))
        .map(|(name, _)| name.as_str())
        .ok_or_else(|| AirfareError::parse("hour", time, format!("no bucket contains hour {hour}")))
}

/// Bucket ranges must be well-formed and pairwise disjoint.
pub fn validate_buckets(hour_buckets: &IndexMap<String, HourRange>) -> Result<()> {
    for (name, range) in hour_buckets {
        if range.min >= range.max || range.max > 24 {
            return Err(AirfareError::config(
                format!("clean_data.bucket_hours.{name}"),
                format!("invalid range [{}, {})", range.min, range.max),
            ));
        }
    }

    let buckets: Vec<_> = hour_buckets.iter().collect();
    for (i, (name_a, a)) in buckets.iter().enumerate() {
        for (name_b, b) in buckets.iter().skip(i + 1) {
            if a.min < b.max && b.min < a.max {
                return Err(AirfareError::config(
                    format!("clean_data.bucket_hours.{name_b}"),
                    format!("range [{}, {}) overlaps bucket '{name_a}'", b.min, b.max),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop_dict() -> IndexMap<String, i64> {
        IndexMap::from([
            ("non-stop".to_owned(), 0),
            ("1-stop".to_owned(), 1),
            ("2+-stop".to_owned(), 2),
        ])
    }

    const STOP_PATTERN: &str = r"non-stop|1-stop|2\+-stop";

    fn hour_buckets() -> IndexMap<String, HourRange> {
        IndexMap::from([
            ("late_night".to_owned(), HourRange { min: 0, max: 4 }),
            ("early_morning".to_owned(), HourRange { min: 4, max: 6 }),
            ("morning".to_owned(), HourRange { min: 6, max: 12 }),
            ("afternoon".to_owned(), HourRange { min: 12, max: 16 }),
            ("evening".to_owned(), HourRange { min: 16, max: 20 }),
            ("night".to_owned(), HourRange { min: 20, max: 24 }),
        ])
    }

    #[test]
    fn test_duration_decimal_hours() -> Result<()> {
        assert_eq!(get_duration("2.50h m")?, 2.5);
        assert_eq!(get_duration("10.30h m")?, 10.3);
        // .03 of an hour is 1.8 minutes, which rounds to 2
        assert_eq!(get_duration("1.03h m")?, 1.03);
        Ok(())
    }

    #[test]
    fn test_duration_hours_minutes() -> Result<()> {
        assert_eq!(get_duration("3h 30m")?, 3.5);
        assert_eq!(get_duration("1h 45m")?, 1.75);
        assert_eq!(get_duration("02h 10m")?, 2.17);
        assert_eq!(get_duration("12h 05m")?, 12.08);
        Ok(())
    }

    #[test]
    fn test_duration_single_digit_minutes() -> Result<()> {
        assert_eq!(get_duration("2h 5m")?, 2.08);
        assert_eq!(get_duration("2h 05m")?, get_duration("2h 5m")?);
        assert!(get_duration("2h 60m").is_err());
        Ok(())
    }

    #[test]
    fn test_duration_malformed_input_fails() {
        for text in ["2.5", "10h", "3h m", "abcd", "", "3h 75m"] {
            let result = get_duration(text);
            assert!(
                matches!(result, Err(AirfareError::Parse { .. })),
                "{text:?} should not parse, got {result:?}"
            );
        }
    }

    #[test]
    fn test_grammar_classification() {
        assert_eq!(DurationGrammar::classify("2.50h m"), DurationGrammar::DecimalHours);
        assert_eq!(DurationGrammar::classify("2h 50m"), DurationGrammar::HoursMinutes);
        assert_eq!(DurationGrammar::classify(""), DurationGrammar::HoursMinutes);
    }

    #[test]
    fn test_stops_mapped() -> Result<()> {
        let dict = stop_dict();
        assert_eq!(get_stops("non-stop", STOP_PATTERN, &dict)?, Some(0));
        assert_eq!(get_stops("1-stop", STOP_PATTERN, &dict)?, Some(1));
        assert_eq!(get_stops("2+-stops", STOP_PATTERN, &dict)?, Some(2));
        assert_eq!(
            get_stops("1-stop\n\t\t\t\tVia IXU", STOP_PATTERN, &dict)?,
            Some(1)
        );
        Ok(())
    }

    #[test]
    fn test_stops_no_match_is_null() -> Result<()> {
        let dict = stop_dict();
        for text in ["3 stops", "stop", "stops", "1", "2", ""] {
            assert_eq!(get_stops(text, STOP_PATTERN, &dict)?, None, "{text:?}");
        }
        Ok(())
    }

    #[test]
    fn test_stops_unmapped_match_is_error() {
        let mut dict = stop_dict();
        dict.shift_remove("1-stop");
        let err = get_stops("1-stop", STOP_PATTERN, &dict).unwrap_err();
        assert!(matches!(err, AirfareError::Parse { what: "stops", .. }));
        assert!(err.to_string().contains("not in stop_dict"));
    }

    #[test]
    fn test_bucket_hours() -> Result<()> {
        let buckets = hour_buckets();
        assert_eq!(bucket_hours("00:00", &buckets)?, "late_night");
        assert_eq!(bucket_hours("06:20", &buckets)?, "morning");
        assert_eq!(bucket_hours("12:08", &buckets)?, "afternoon");
        assert_eq!(bucket_hours("18:43", &buckets)?, "evening");
        assert_eq!(bucket_hours("04:38", &buckets)?, "early_morning");
        assert_eq!(bucket_hours("12:00", &buckets)?, "afternoon");
        assert_eq!(bucket_hours("23:59", &buckets)?, "night");
        Ok(())
    }

    #[test]
    fn test_bucket_hours_invalid_time() {
        let buckets = hour_buckets();
        for time in ["25:00", "60:00", "100:00", "", "6:20", "noon"] {
            assert!(bucket_hours(time, &buckets).is_err(), "{time:?}");
        }
    }

    #[test]
    fn test_bucket_hours_gap_is_error() {
        let mut buckets = hour_buckets();
        buckets.shift_remove("early_morning");
        let err = bucket_hours("05:10", &buckets).unwrap_err();
        assert!(err.to_string().contains("no bucket contains hour 5"));
    }

    #[test]
    fn test_validate_buckets() {
        assert!(validate_buckets(&hour_buckets()).is_ok());

        let mut overlapping = hour_buckets();
        overlapping.insert("brunch".to_owned(), HourRange { min: 10, max: 13 });
        assert!(validate_buckets(&overlapping).is_err());

        let mut inverted = hour_buckets();
        inverted.insert("nowhere".to_owned(), HourRange { min: 5, max: 5 });
        assert!(validate_buckets(&inverted).is_err());
    }
}
