//! Cleaning of user-typed address input.
//!
//! People paste addresses in many shapes:
//! - With a unit: `"150 Court St Apt 4B"`, `"150 COURT ST #4B"`
//! - With stray spacing and punctuation: `"150  court st."`
//! - With the city tacked on: `"150 Court St, Brooklyn"`
//!
//! Geocoders match on the building, so unit designators, trailing
//! punctuation and anything after the first comma are dropped.

use regex::Regex;
use std::sync::LazyLock;

/// Unit designators at the end of a street line (`APT 4B`, `#4B`, `UNIT 3`).
static UNIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+(?:(?:APT\.?|APARTMENT|UNIT|STE\.?|SUITE|FL\.?|FLOOR)\s+|#\s*)[\w-]+$")
        .expect("valid regex")
});

/// Runs of whitespace.
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// A house number glued to its street (`"150COURT ST"`). Three letters
/// minimum so ordinals like `1ST` are left alone.
static GLUED_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:-\d+)?)([A-Z]{3,})").expect("valid regex"));

/// A house number token: digits, an optional Queens-style hyphenated
/// part, and an optional letter (`150`, `90-20`, `150A`).
static HOUSE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(?:-\d+)?[A-Z]?$").expect("valid regex"));

/// Input that is obviously not an address.
static SKIP_PATTERNS: &[&str] = &["UNKNOWN", "N/A", "NA", "NONE"];

/// Normalizes a street name: upper-cased, single-spaced, without a
/// trailing unit designator, period, or comma-separated locality.
///
/// Returns an empty string for input with nothing searchable in it.
#[must_use]
pub fn normalize_street(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    let line = upper.split(',').next().unwrap_or_default();
    let line = WHITESPACE_RE.replace_all(line.trim(), " ");
    let line = UNIT_RE.replace(&line, "");
    let line = line.trim_end_matches('.').trim();

    if SKIP_PATTERNS.contains(&line) {
        return String::new();
    }
    line.to_string()
}

/// Splits a single line like `"150 COURT ST"` into house number and
/// street. Queens hyphenated numbers (`"90-20 170TH ST"`) stay whole.
///
/// Returns `None` when the line does not start with a house number.
#[must_use]
pub fn split_house_number(line: &str) -> Option<(String, String)> {
    let line = normalize_street(line);
    let line = GLUED_NUMBER_RE.replace(&line, "$1 $2");
    let (number, street) = line.split_once(' ')?;
    if !HOUSE_NUMBER_RE.is_match(number) || street.trim().is_empty() {
        return None;
    }
    Some((number.to_string(), street.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uppercases_and_collapses_spaces() {
        assert_eq!(normalize_street("  court   st "), "COURT ST");
    }

    #[test]
    fn drops_unit_designators() {
        assert_eq!(normalize_street("Court St Apt 4B"), "COURT ST");
        assert_eq!(normalize_street("COURT ST #4B"), "COURT ST");
        assert_eq!(normalize_street("court st suite 200"), "COURT ST");
    }

    #[test]
    fn drops_locality_and_trailing_period() {
        assert_eq!(normalize_street("Court St., Brooklyn, NY"), "COURT ST");
    }

    #[test]
    fn skips_placeholders() {
        assert_eq!(normalize_street("n/a"), "");
        assert_eq!(normalize_street("   "), "");
    }

    #[test]
    fn splits_house_number() {
        assert_eq!(
            split_house_number("150 court st apt 2"),
            Some(("150".to_string(), "COURT ST".to_string()))
        );
        assert_eq!(
            split_house_number("90-20 170th st"),
            Some(("90-20".to_string(), "170TH ST".to_string()))
        );
        assert_eq!(
            split_house_number("150COURT ST"),
            Some(("150".to_string(), "COURT ST".to_string()))
        );
        assert_eq!(split_house_number("COURT ST"), None);
        assert_eq!(split_house_number("1ST AVE"), None);
    }
}
