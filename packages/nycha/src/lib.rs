#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! NYCHA public housing lookup.
//!
//! Public housing developments are not registered with HPD, so a search
//! that lands on one finds no portfolio. [`NychaTable`] recognizes those
//! parcels from a static table baked into the binary at compile time via
//! [`include_str!`]. A fuller table can be loaded from disk with
//! [`NychaTable::from_path`].
//!
//! Lookups are pure: the table is immutable once built.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use wow_portfolio_models::{Bbl, Borough, de};

/// Table embedded at compile time.
const EMBEDDED_TABLE: &str = include_str!("../data/nycha_bbls.json");

/// Errors loading a NYCHA table.
#[derive(Debug, thiserror::Error)]
pub enum NychaError {
    /// I/O error reading the table file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One public housing parcel and the development it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NychaRecord {
    /// Parcel.
    #[serde(deserialize_with = "bbl_from_string_or_number")]
    pub bbl: Bbl,
    /// Development name, e.g. `"SOTOMAYOR HOUSES"`.
    pub development: String,
    /// Residential units across the whole development.
    #[serde(default, deserialize_with = "de::optional_i64")]
    pub dev_unitsres: Option<i64>,
    /// Evictions executed in the development.
    #[serde(default, deserialize_with = "de::optional_i64")]
    pub dev_evictions: Option<i64>,
    /// Street address of the parcel.
    #[serde(default, deserialize_with = "de::optional_string")]
    pub address: Option<String>,
    /// Borough name as NYCHA spells it.
    #[serde(default, deserialize_with = "de::optional_string")]
    pub borough: Option<String>,
    /// Tax block.
    #[serde(default, deserialize_with = "de::optional_string")]
    pub block: Option<String>,
    /// Tax lot.
    #[serde(default, deserialize_with = "de::optional_string")]
    pub lot: Option<String>,
    /// ZIP code.
    #[serde(default, deserialize_with = "de::optional_string")]
    pub zipcode: Option<String>,
    /// Managing development.
    #[serde(default, deserialize_with = "de::optional_string")]
    pub managedby: Option<String>,
    /// Facility on the lot, if not residential.
    #[serde(default, deserialize_with = "de::optional_string")]
    pub facility: Option<String>,
    /// Community district.
    #[serde(default, deserialize_with = "de::optional_string")]
    pub cd: Option<String>,
}

/// Immutable BBL to development table.
#[derive(Debug, Clone, Default)]
pub struct NychaTable {
    records: HashMap<Bbl, NychaRecord>,
}

impl NychaTable {
    /// Loads the table embedded in the binary.
    ///
    /// # Panics
    ///
    /// Panics if the embedded JSON is malformed. That is a build error,
    /// not a runtime condition.
    #[must_use]
    pub fn embedded() -> Self {
        Self::from_json(EMBEDDED_TABLE)
            .unwrap_or_else(|e| panic!("Failed to parse embedded nycha_bbls.json: {e}"))
    }

    /// Parses a table from a JSON array of records.
    ///
    /// # Errors
    ///
    /// Returns [`NychaError::Json`] if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self, NychaError> {
        let rows: Vec<NychaRecord> = serde_json::from_str(json)?;
        Ok(Self::from_records(rows))
    }

    /// Reads a table from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`NychaError`] if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self, NychaError> {
        let json = std::fs::read_to_string(path)?;
        let table = Self::from_json(&json)?;
        log::info!(
            "Loaded {} NYCHA parcels from {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }

    /// Builds a table from records. A later record for the same parcel
    /// replaces an earlier one.
    #[must_use]
    pub fn from_records(rows: impl IntoIterator<Item = NychaRecord>) -> Self {
        let records = rows.into_iter().map(|r| (r.bbl.clone(), r)).collect();
        Self { records }
    }

    /// The development on `bbl`, if it is public housing.
    #[must_use]
    pub fn lookup(&self, bbl: &Bbl) -> Option<&NychaRecord> {
        self.records.get(bbl)
    }

    /// Number of parcels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table has no parcels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A NYCHA borough management office.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoroughOffice {
    /// Office name.
    pub boro_name: &'static str,
    /// Street line.
    pub address_line1: &'static str,
    /// City, state and ZIP line.
    pub address_line2: &'static str,
    /// Phone number.
    pub phone: &'static str,
}

/// The management office residents of `borough` should contact.
/// Queens and Staten Island share the Queens office.
#[must_use]
pub const fn borough_office(borough: Borough) -> BoroughOffice {
    match borough {
        Borough::Manhattan => BoroughOffice {
            boro_name: "Manhattan",
            address_line1: "1980 Lexington Ave #1",
            address_line2: "New York, NY 10035",
            phone: "(917) 206-3500",
        },
        Borough::Bronx => BoroughOffice {
            boro_name: "Bronx",
            address_line1: "1200 Water Pl, Suite #200",
            address_line2: "Bronx, NY 10461",
            phone: "(718) 409-8626",
        },
        Borough::Brooklyn => BoroughOffice {
            boro_name: "Brooklyn",
            address_line1: "816 Ashford St",
            address_line2: "Brooklyn, NY 11207",
            phone: "(718) 491-6967",
        },
        Borough::Queens | Borough::StatenIsland => BoroughOffice {
            boro_name: "Queens",
            address_line1: "90-20 170th St, 1st Floor",
            address_line2: "Jamaica, NY 11432",
            phone: "(718) 553-4700",
        },
    }
}

fn bbl_from_string_or_number<'de, D>(deserializer: D) -> Result<Bbl, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = de::optional_string(deserializer)?
        .ok_or_else(|| serde::de::Error::custom("missing bbl"))?;
    Bbl::parse(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbl(s: &str) -> Bbl {
        Bbl::parse(s).unwrap()
    }

    #[test]
    fn embedded_table_loads() {
        let table = NychaTable::embedded();
        assert!(!table.is_empty());
        let record = table.lookup(&bbl("2037250001")).unwrap();
        assert_eq!(record.development, "SOTOMAYOR HOUSES");
        assert_eq!(record.address.as_deref(), Some("1000 ROSEDALE AVENUE"));
    }

    #[test]
    fn unknown_parcel_is_none() {
        assert!(NychaTable::embedded().lookup(&bbl("3012380016")).is_none());
    }

    #[test]
    fn lookup_is_repeatable() {
        let table = NychaTable::embedded();
        let key = bbl("3035440001");
        assert_eq!(table.lookup(&key), table.lookup(&key));
        assert_eq!(
            table.lookup(&key).map(|r| r.development.as_str()),
            Some("BROWNSVILLE")
        );
    }

    #[test]
    fn accepts_string_bbls_and_null_counts() {
        let table = NychaTable::from_json(
            r#"[{ "bbl": "1-00477-0001", "development": "TEST HOUSES",
                  "dev_unitsres": null, "dev_evictions": "4" }]"#,
        )
        .unwrap();
        let record = table.lookup(&bbl("1004770001")).unwrap();
        assert_eq!(record.dev_unitsres, None);
        assert_eq!(record.dev_evictions, Some(4));
    }

    #[test]
    fn rejects_bad_bbl() {
        assert!(NychaTable::from_json(r#"[{ "bbl": "12", "development": "X" }]"#).is_err());
    }

    #[test]
    fn queens_and_staten_island_share_an_office() {
        assert_eq!(
            borough_office(Borough::Queens),
            borough_office(Borough::StatenIsland)
        );
        assert_eq!(borough_office(Borough::Bronx).phone, "(718) 409-8626");
    }
}
