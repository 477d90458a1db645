//! Type coercion and character-class repairs.
//!
//! These functions are shared by the validator's coercion check and the
//! normalizer so that "would this cast succeed" and "did this cast succeed"
//! can never disagree.

use std::borrow::Cow;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use thiserror::Error;

/// Two-digit years below this value belong to the 2000s, the rest to the 1900s.
pub const TWO_DIGIT_YEAR_PIVOT: i32 = 70;

/// Why a raw value could not be cast to its canonical type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
    /// Not a 64-bit signed integer
    #[error("'{0}' is not an integer")]
    NotAnInteger(String),
    /// None of the accepted date layouts match
    #[error("'{0}' does not match M/D/YY, M/D/YYYY or YYYY-MM-DD")]
    UnrecognizedDateFormat(String),
    /// Layout matches but the day does not exist
    #[error("'{0}' is not a calendar date")]
    InvalidCalendarDate(String),
    /// Empty or longer than one character
    #[error("'{0}' is not a single character")]
    NotSingleCharacter(String),
}

/// Pre-compiled character classes used by repairs and validation checks.
///
/// Uses `OnceLock` for thread-safe lazy initialization.
pub struct CleaningPatterns {
    /// Characters removed from user ids: double quotes and any whitespace
    pub userid_noise: Regex,
    /// Characters removed from points: double quotes and question marks
    pub points_noise: Regex,
    /// Anything outside letters, digits, space, dot and minus
    pub unexpected_points_characters: Regex,
}

impl CleaningPatterns {
    /// Gets the singleton instance of the compiled patterns.
    pub fn instance() -> &'static Self {
        static PATTERNS: OnceLock<CleaningPatterns> = OnceLock::new();
        PATTERNS.get_or_init(Self::compile)
    }

    fn compile() -> Self {
        Self {
            userid_noise: Regex::new(r#"["\s]"#).expect("Invalid userid noise pattern"),
            points_noise: Regex::new(r#"["?]"#).expect("Invalid points noise pattern"),
            unexpected_points_characters: Regex::new(r"[^A-Za-z0-9 .\-]")
                .expect("Invalid points character pattern"),
        }
    }
}

/// Removes every double quote and whitespace character from a user id.
///
/// This is character-class removal, not trimming: interior occurrences go too.
pub fn strip_userid_noise(value: &str) -> Cow<'_, str> {
    CleaningPatterns::instance()
        .userid_noise
        .replace_all(value, "")
}

/// Removes every double quote and question mark from a points value.
pub fn strip_points_noise(value: &str) -> Cow<'_, str> {
    CleaningPatterns::instance()
        .points_noise
        .replace_all(value, "")
}

/// Returns true if the points text contains characters no number would.
pub fn has_unexpected_points_characters(value: &str) -> bool {
    CleaningPatterns::instance()
        .unexpected_points_characters
        .is_match(value)
}

/// Casts text to a 64-bit integer. Surrounding whitespace is tolerated.
pub fn coerce_integer(value: &str) -> Result<i64, CoercionError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| CoercionError::NotAnInteger(value.to_string()))
}

/// Casts text to a single character.
pub fn coerce_single_character(value: &str) -> Result<char, CoercionError> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(CoercionError::NotSingleCharacter(value.to_string())),
    }
}

/// Expands a two-digit year around [`TWO_DIGIT_YEAR_PIVOT`].
pub fn expand_two_digit_year(year: i32) -> i32 {
    if year < TWO_DIGIT_YEAR_PIVOT {
        2000 + year
    } else {
        1900 + year
    }
}

fn numeric_component(text: &str, max_len: usize) -> Option<u32> {
    if text.is_empty() || text.len() > max_len || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Parses an event date as entered.
///
/// Accepted layouts are `M/D/YY` (the bulk of the raw data), `M/D/YYYY`
/// and the canonical `YYYY-MM-DD` written by the backup export. Text that
/// matches a layout but names no real day, such as `19/24/2019`, fails with
/// [`CoercionError::InvalidCalendarDate`].
pub fn parse_event_date(value: &str) -> Result<NaiveDate, CoercionError> {
    let text = value.trim();
    let unrecognized = || CoercionError::UnrecognizedDateFormat(value.to_string());
    let invalid = || CoercionError::InvalidCalendarDate(value.to_string());

    let slash_parts: Vec<&str> = text.split('/').collect();
    if let [month, day, year] = slash_parts.as_slice() {
        let month = numeric_component(month, 2).ok_or_else(unrecognized)?;
        let day = numeric_component(day, 2).ok_or_else(unrecognized)?;
        let year = match year.len() {
            2 => numeric_component(year, 2)
                .and_then(|y| i32::try_from(y).ok())
                .map(expand_two_digit_year),
            4 => numeric_component(year, 4).and_then(|y| i32::try_from(y).ok()),
            _ => None,
        }
        .ok_or_else(unrecognized)?;

        return NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid);
    }

    let dash_parts: Vec<&str> = text.split('-').collect();
    if let [year, month, day] = dash_parts.as_slice()
        && year.len() == 4
    {
        let year = numeric_component(year, 4)
            .and_then(|y| i32::try_from(y).ok())
            .ok_or_else(unrecognized)?;
        let month = numeric_component(month, 2).ok_or_else(unrecognized)?;
        let day = numeric_component(day, 2).ok_or_else(unrecognized)?;

        return NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid);
    }

    Err(unrecognized())
}

/// Replaces whitespace with visible escapes so trailing spaces can be seen.
///
/// Space becomes `\s`; tab, newline and carriage return use their usual
/// escapes; any other whitespace is shown as a `\u{..}` code point.
pub fn make_whitespace_visible(value: &str) -> String {
    let mut visible = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            ' ' => visible.push_str("\\s"),
            '\t' => visible.push_str("\\t"),
            '\n' => visible.push_str("\\n"),
            '\r' => visible.push_str("\\r"),
            c if c.is_whitespace() => visible.push_str(&format!("\\u{{{:x}}}", u32::from(c))),
            c => visible.push(c),
        }
    }
    visible
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_strip_userid_noise() {
        assert_eq!(strip_userid_noise("abc "), "abc");
        assert_eq!(strip_userid_noise("abc\""), "abc");
        assert_eq!(strip_userid_noise("\" a b\tc\""), "abc");
        assert!(matches!(strip_userid_noise("clean"), Cow::Borrowed("clean")));
    }

    #[test]
    fn test_strip_points_noise() {
        assert_eq!(strip_points_noise("\"732"), "732");
        assert_eq!(strip_points_noise("45?"), "45");
        assert_eq!(strip_points_noise("-12"), "-12");
        assert!(matches!(strip_points_noise("12"), Cow::Borrowed("12")));
    }

    #[test]
    fn test_unexpected_points_characters() {
        assert!(has_unexpected_points_characters("\"732"));
        assert!(has_unexpected_points_characters("45?"));
        assert!(!has_unexpected_points_characters("-45"));
        assert!(!has_unexpected_points_characters("4.5"));
    }

    #[test]
    fn test_coerce_integer() {
        assert_eq!(coerce_integer("732"), Ok(732));
        assert_eq!(coerce_integer(" -5 "), Ok(-5));
        assert!(coerce_integer("\"732").is_err());
        assert!(coerce_integer("45?").is_err());
        assert!(coerce_integer("").is_err());
        assert_eq!(coerce_integer("3000000000"), Ok(3_000_000_000));
        assert!(coerce_integer("99999999999999999999").is_err());
    }

    #[test]
    fn test_coerce_single_character() {
        assert_eq!(coerce_single_character("A"), Ok('A'));
        assert!(coerce_single_character("").is_err());
        assert!(coerce_single_character("AB").is_err());
    }

    #[test]
    fn test_two_digit_years() {
        assert_eq!(parse_event_date("1/24/19"), Ok(date(2019, 1, 24)));
        assert_eq!(parse_event_date("12/31/99"), Ok(date(1999, 12, 31)));
        assert_eq!(parse_event_date("6/1/39"), Ok(date(2039, 6, 1)));
        assert_eq!(parse_event_date("03/07/00"), Ok(date(2000, 3, 7)));
        assert_eq!(parse_event_date("1/1/70"), Ok(date(1970, 1, 1)));
    }

    #[test]
    fn test_four_digit_years() {
        assert_eq!(parse_event_date("9/24/2019"), Ok(date(2019, 9, 24)));
        assert_eq!(parse_event_date("2019-09-24"), Ok(date(2019, 9, 24)));
        assert_eq!(parse_event_date(" 2019-9-4 "), Ok(date(2019, 9, 4)));
    }

    #[test]
    fn test_impossible_month_is_invalid_date() {
        assert_eq!(
            parse_event_date("19/24/2019"),
            Err(CoercionError::InvalidCalendarDate("19/24/2019".to_string()))
        );
        assert!(matches!(
            parse_event_date("2/30/19"),
            Err(CoercionError::InvalidCalendarDate(_))
        ));
    }

    #[test]
    fn test_unrecognized_layouts() {
        for text in ["", "yesterday", "1/24", "1/24/019", "1/24/19/1", "24.01.2019", "19-01-24"] {
            assert!(
                matches!(parse_event_date(text), Err(CoercionError::UnrecognizedDateFormat(_))),
                "expected unrecognized layout for {:?}",
                text
            );
        }
    }

    #[test]
    fn test_make_whitespace_visible() {
        assert_eq!(make_whitespace_visible("abc "), "abc\\s");
        assert_eq!(make_whitespace_visible("a\tb"), "a\\tb");
        assert_eq!(make_whitespace_visible("x\u{a0}"), "x\\u{a0}");
        assert_eq!(make_whitespace_visible("plain"), "plain");
    }
}
