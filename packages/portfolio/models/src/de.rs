//! Lenient field decoders for backend JSON.
//!
//! The backend passes Postgres values through untouched, so numeric
//! aggregates frequently arrive as strings (`"12.5"`), integer ids as
//! numbers, dates as either `YYYY-MM-DD` or full ISO timestamps, and
//! arrays as `null`. These helpers are used with
//! `#[serde(default, deserialize_with = "...")]`.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, de::Error as _};
use serde_json::Value;

/// Decodes `null` as `T::default()`.
///
/// # Errors
///
/// Propagates the inner deserializer's error.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decodes a number, numeric string, empty string, or `null` into an
/// optional `f64`.
///
/// # Errors
///
/// Fails on non-numeric strings and non-scalar values.
pub fn optional_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|e| D::Error::custom(format!("invalid number {s:?}: {e}"))),
        Some(other) => Err(D::Error::custom(format!("expected number, got {other}"))),
    }
}

/// Like [`optional_f64`] but for whole counts. Fractional values are
/// rejected.
///
/// # Errors
///
/// Fails on non-numeric or fractional values.
pub fn optional_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(value) = optional_f64(deserializer)? else {
        return Ok(None);
    };
    if value.fract() != 0.0 || !value.is_finite() {
        return Err(D::Error::custom(format!("expected whole number, got {value}")));
    }
    #[allow(clippy::cast_possible_truncation)]
    Ok(Some(value as i64))
}

/// A count that the backend may send as `null`; missing means zero.
///
/// # Errors
///
/// Same as [`optional_i64`].
pub fn count<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_i64(deserializer)?.unwrap_or(0))
}

/// Same as [`optional_f64`] with `null` read as `0.0`.
///
/// # Errors
///
/// Same as [`optional_f64`].
pub fn number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_f64(deserializer)?.unwrap_or(0.0))
}

/// Decodes a string or number into an optional string.
///
/// # Errors
///
/// Fails on arrays, objects and booleans.
pub fn optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!("expected string, got {other}"))),
    }
}

/// Decodes `YYYY-MM-DD` or an ISO timestamp starting with a date.
///
/// # Errors
///
/// Fails if the first ten characters are not a calendar date.
pub fn optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map(Some)
        .map_err(|e| D::Error::custom(format!("invalid date {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Row {
        #[serde(default, deserialize_with = "super::optional_f64")]
        ratio: Option<f64>,
        #[serde(default, deserialize_with = "super::count")]
        total: i64,
        #[serde(default, deserialize_with = "super::optional_string")]
        id: Option<String>,
        #[serde(default, deserialize_with = "super::optional_date")]
        date: Option<chrono::NaiveDate>,
        #[serde(default, deserialize_with = "super::null_as_default")]
        names: Vec<String>,
    }

    #[test]
    fn accepts_strings_numbers_and_nulls() {
        let row: Row = serde_json::from_value(serde_json::json!({
            "ratio": "0.125",
            "total": "12",
            "id": 352_819,
            "date": "2019-08-30T00:00:00.000Z",
            "names": null
        }))
        .unwrap();
        assert_eq!(row.ratio, Some(0.125));
        assert_eq!(row.total, 12);
        assert_eq!(row.id.as_deref(), Some("352819"));
        assert_eq!(
            row.date,
            chrono::NaiveDate::from_ymd_opt(2019, 8, 30)
        );
        assert!(row.names.is_empty());
    }

    #[test]
    fn missing_fields_fall_back() {
        let row: Row = serde_json::from_str("{}").unwrap();
        assert_eq!(row.ratio, None);
        assert_eq!(row.total, 0);
        assert_eq!(row.date, None);
    }

    #[test]
    fn rejects_fractional_counts() {
        let err = serde_json::from_value::<Row>(serde_json::json!({ "total": 1.5 }));
        assert!(err.is_err());
    }
}
