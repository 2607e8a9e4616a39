//! Borough and Borough-Block-Lot (BBL) parcel identifiers.
//!
//! A BBL is ten digits with no separator: one borough digit (`1`..=`5`),
//! a five digit tax block, and a four digit tax lot. It is the join key
//! for every piece of portfolio data.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;

/// Number of digits in a BBL.
pub const BBL_LEN: usize = 10;

/// Largest tax block that fits the five block digits.
pub const MAX_BLOCK: u32 = 99_999;

/// Largest tax lot that fits the four lot digits.
pub const MAX_LOT: u32 = 9_999;

/// One of the five New York City boroughs.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Borough {
    /// Borough code 1.
    Manhattan,
    /// Borough code 2.
    Bronx,
    /// Borough code 3.
    Brooklyn,
    /// Borough code 4.
    Queens,
    /// Borough code 5.
    #[serde(rename = "STATEN ISLAND", alias = "STATEN_ISLAND")]
    #[strum(to_string = "STATEN ISLAND", serialize = "STATEN_ISLAND")]
    StatenIsland,
}

impl Borough {
    /// The single-digit borough code used as the first digit of a BBL.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Manhattan => 1,
            Self::Bronx => 2,
            Self::Brooklyn => 3,
            Self::Queens => 4,
            Self::StatenIsland => 5,
        }
    }

    /// Looks up a borough by its BBL digit.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Manhattan),
            2 => Some(Self::Bronx),
            3 => Some(Self::Brooklyn),
            4 => Some(Self::Queens),
            5 => Some(Self::StatenIsland),
            _ => None,
        }
    }

    /// Title-cased name, as geocoders spell it (e.g. `"Staten Island"`).
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Manhattan => "Manhattan",
            Self::Bronx => "Bronx",
            Self::Brooklyn => "Brooklyn",
            Self::Queens => "Queens",
            Self::StatenIsland => "Staten Island",
        }
    }
}

/// Errors from parsing or building a [`Bbl`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BblError {
    /// Wrong number of digits.
    #[error("BBL must be {BBL_LEN} digits, got {len}")]
    Length {
        /// Digit count after removing separators.
        len: usize,
    },

    /// Something other than a digit (or `-` separator) was present.
    #[error("BBL contains a non-digit character: {value:?}")]
    NonDigit {
        /// The rejected input.
        value: String,
    },

    /// Leading digit is not a borough code.
    #[error("Invalid borough code '{code}' in BBL")]
    Borough {
        /// The rejected leading digit.
        code: char,
    },

    /// Block or lot too large for its field.
    #[error("{field} {value} exceeds {max}")]
    OutOfRange {
        /// `"block"` or `"lot"`.
        field: &'static str,
        /// Rejected value.
        value: u32,
        /// Largest accepted value.
        max: u32,
    },
}

/// A validated Borough-Block-Lot parcel identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Bbl(String);

/// A BBL split into its three fields, zero-padded as in the BBL itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BblParts {
    /// The borough.
    pub borough: Borough,
    /// Five digit block, e.g. `"01238"`.
    pub block: String,
    /// Four digit lot, e.g. `"0016"`.
    pub lot: String,
}

impl Bbl {
    /// Parses a BBL, accepting optional `-` separators
    /// (`"3-01238-0016"` and `"3012380016"` are the same parcel).
    ///
    /// # Errors
    ///
    /// Returns [`BblError`] if the input is not ten digits with a valid
    /// borough digit.
    pub fn parse(raw: &str) -> Result<Self, BblError> {
        let digits: String = raw.trim().chars().filter(|c| *c != '-').collect();

        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(BblError::NonDigit {
                value: raw.to_string(),
            });
        }
        if digits.len() != BBL_LEN {
            return Err(BblError::Length { len: digits.len() });
        }

        let code = digits.as_bytes()[0];
        if Borough::from_code(code - b'0').is_none() {
            return Err(BblError::Borough {
                code: char::from(code),
            });
        }

        Ok(Self(digits))
    }

    /// Builds a BBL from its parts, zero-padding block and lot.
    ///
    /// # Errors
    ///
    /// Returns [`BblError::OutOfRange`] if `block` or `lot` does not fit.
    pub fn from_parts(borough: Borough, block: u32, lot: u32) -> Result<Self, BblError> {
        if block > MAX_BLOCK {
            return Err(BblError::OutOfRange {
                field: "block",
                value: block,
                max: MAX_BLOCK,
            });
        }
        if lot > MAX_LOT {
            return Err(BblError::OutOfRange {
                field: "lot",
                value: lot,
                max: MAX_LOT,
            });
        }
        Ok(Self(format!("{}{block:05}{lot:04}", borough.code())))
    }

    /// The borough encoded in the first digit.
    #[must_use]
    pub fn borough(&self) -> Borough {
        // Validated on construction.
        Borough::from_code(self.0.as_bytes()[0] - b'0').unwrap_or(Borough::Manhattan)
    }

    /// Splits into borough, block and lot.
    #[must_use]
    pub fn split(&self) -> BblParts {
        BblParts {
            borough: self.borough(),
            block: self.0[1..6].to_string(),
            lot: self.0[6..].to_string(),
        }
    }

    /// The ten digit string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Bbl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Bbl {
    type Err = BblError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Bbl {
    type Error = BblError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Bbl> for String {
    fn from(value: Bbl) -> Self {
        value.0
    }
}

impl AsRef<str> for Bbl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
