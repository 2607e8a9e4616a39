#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for the who-owns-what portfolio lookup.
//!
//! Everything here mirrors the JSON the backend API returns. Records are
//! immutable snapshots: the client replaces them, it never patches them.
//! Field names follow the backend's lowercase column names so that a
//! record can be serialized back out in the same shape it arrived in.

pub mod bbl;
pub mod de;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub use bbl::{Bbl, BblError, BblParts, Borough};

/// What a user types to find their building.
///
/// Values are trimmed and upper-cased on construction, matching how the
/// backend and the geocoders spell addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchAddressParams {
    /// House number, e.g. `"150"`. May be empty for whole-street lookups.
    pub house_number: String,
    /// Street name, e.g. `"COURT ST"`.
    pub street_name: String,
    /// Borough, if the user picked one.
    pub borough: Option<Borough>,
}

impl SearchAddressParams {
    /// Builds normalized search parameters.
    #[must_use]
    pub fn new(house_number: &str, street_name: &str, borough: Option<Borough>) -> Self {
        Self {
            house_number: house_number.trim().to_uppercase(),
            street_name: street_name.trim().to_uppercase(),
            borough,
        }
    }

    /// Whether the parameters carry enough to search on: a borough and a
    /// non-empty street name.
    #[must_use]
    pub fn is_searchable(&self) -> bool {
        self.borough.is_some() && !self.street_name.trim().is_empty()
    }

    /// Single-line form used for free-text geocoding, e.g.
    /// `"150 COURT ST, Brooklyn"`.
    #[must_use]
    pub fn to_query_text(&self) -> String {
        let street = if self.house_number.is_empty() {
            self.street_name.clone()
        } else {
            format!("{} {}", self.house_number, self.street_name)
        };
        match self.borough {
            Some(borough) => format!("{street}, {}", borough.label()),
            None => street,
        }
    }
}

/// A titled contact on an HPD registration, e.g. `HeadOfficer: JANE DOE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HpdOwnerContact {
    /// Registration contact type (`"HeadOfficer"`, `"Agent"`, ...).
    pub title: String,
    /// Person or entity name.
    pub value: String,
}

/// Business address attached to a registration contact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HpdContactAddress {
    /// House number.
    #[serde(default, deserialize_with = "de::optional_string")]
    pub housenumber: Option<String>,
    /// Street name.
    #[serde(default)]
    pub streetname: Option<String>,
    /// Apartment or suite.
    #[serde(default)]
    pub apartment: Option<String>,
    /// City.
    #[serde(default)]
    pub city: Option<String>,
    /// State.
    #[serde(default)]
    pub state: Option<String>,
    /// ZIP code.
    #[serde(default, deserialize_with = "de::optional_string")]
    pub zip: Option<String>,
}

/// One entry of a registration's full contact list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HpdFullContact {
    /// Registration contact type.
    pub title: String,
    /// Person or entity name.
    pub value: String,
    /// Business address, when the registration lists one.
    #[serde(default)]
    pub address: Option<HpdContactAddress>,
}

/// Count of recent HPD complaints of one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HpdComplaintCount {
    /// Complaint type, e.g. `"HEAT/HOT WATER"`.
    #[serde(rename = "type")]
    pub complaint_type: String,
    /// Number of complaints.
    #[serde(deserialize_with = "de::count")]
    pub count: i64,
}

/// One parcel's registration, ownership, and statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressRecord {
    /// Parcel identifier.
    pub bbl: Bbl,
    /// Building identification number.
    #[serde(default, deserialize_with = "de::optional_string")]
    pub bin: Option<String>,
    /// Borough.
    pub boro: Borough,
    /// House number.
    #[serde(default)]
    pub housenumber: String,
    /// Street name.
    #[serde(default)]
    pub streetname: String,
    /// ZIP code.
    #[serde(default, deserialize_with = "de::optional_string")]
    pub zip: Option<String>,
    /// Latitude (WGS84).
    #[serde(default, deserialize_with = "de::optional_f64")]
    pub lat: Option<f64>,
    /// Longitude (WGS84).
    #[serde(default, deserialize_with = "de::optional_f64")]
    pub lng: Option<f64>,

    /// HPD registration id.
    #[serde(default, deserialize_with = "de::optional_string")]
    pub registrationid: Option<String>,
    /// Date the registration was last filed.
    #[serde(default, deserialize_with = "de::optional_date")]
    pub lastregistrationdate: Option<NaiveDate>,
    /// Date the registration expires.
    #[serde(default, deserialize_with = "de::optional_date")]
    pub registrationenddate: Option<NaiveDate>,

    /// Corporate owner names.
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub corpnames: Vec<String>,
    /// Business addresses shared across the ownership group.
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub businessaddrs: Vec<String>,
    /// Owner name/title pairs.
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub ownernames: Vec<HpdOwnerContact>,
    /// Every registration contact with its structured address.
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub allcontacts: Vec<HpdFullContact>,

    /// All HPD violations ever issued.
    #[serde(default, deserialize_with = "de::count")]
    pub totalviolations: i64,
    /// HPD violations currently open.
    #[serde(default, deserialize_with = "de::count")]
    pub openviolations: i64,
    /// All HPD complaints.
    #[serde(default, deserialize_with = "de::optional_i64")]
    pub totalcomplaints: Option<i64>,
    /// HPD complaints in the recent window.
    #[serde(default, deserialize_with = "de::optional_i64")]
    pub recentcomplaints: Option<i64>,
    /// Recent HPD complaints grouped by type.
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub recentcomplaintsbytype: Vec<HpdComplaintCount>,
    /// Executed evictions.
    #[serde(default, deserialize_with = "de::optional_i64")]
    pub evictions: Option<i64>,
    /// Eviction filings in housing court.
    #[serde(default, deserialize_with = "de::optional_i64")]
    pub evictionfilings: Option<i64>,

    /// Residential units.
    #[serde(default, deserialize_with = "de::optional_i64")]
    pub unitsres: Option<i64>,
    /// Year built.
    #[serde(default, deserialize_with = "de::optional_i64")]
    pub yearbuilt: Option<i64>,
    /// Rent-stabilized units in the earlier reference year.
    #[serde(default, deserialize_with = "de::optional_i64")]
    pub rsunits2007: Option<i64>,
    /// Rent-stabilized units in the later reference year.
    #[serde(default, deserialize_with = "de::optional_i64")]
    pub rsunits2017: Option<i64>,
    /// Change in rent-stabilized units between the two years.
    #[serde(default, deserialize_with = "de::optional_i64")]
    pub rsdiff: Option<i64>,
    /// Percent change in rent-stabilized units.
    #[serde(default, deserialize_with = "de::optional_f64")]
    pub rspercentchange: Option<f64>,

    /// ACRIS document id of the last sale.
    #[serde(default, deserialize_with = "de::optional_string")]
    pub lastsaleacrisid: Option<String>,
    /// Date of the last sale.
    #[serde(default, deserialize_with = "de::optional_date")]
    pub lastsaledate: Option<NaiveDate>,
    /// Price of the last sale.
    #[serde(default, deserialize_with = "de::optional_f64")]
    pub lastsaleamount: Option<f64>,
}

impl AddressRecord {
    /// The five location fields used by map markers and summary pointers.
    #[must_use]
    pub fn location(&self) -> AddressLocation {
        AddressLocation {
            boro: self.boro,
            housenumber: self.housenumber.clone(),
            streetname: self.streetname.clone(),
            lat: self.lat,
            lng: self.lng,
        }
    }
}

/// Where a building is, without any of its statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressLocation {
    /// Borough.
    pub boro: Borough,
    /// House number.
    #[serde(default)]
    pub housenumber: String,
    /// Street name.
    #[serde(default)]
    pub streetname: String,
    /// Latitude.
    #[serde(default, deserialize_with = "de::optional_f64")]
    pub lat: Option<f64>,
    /// Longitude.
    #[serde(default, deserialize_with = "de::optional_f64")]
    pub lng: Option<f64>,
}

/// Building with the most executed evictions in a portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvictionsAddress {
    /// Location.
    #[serde(flatten)]
    pub location: AddressLocation,
    /// Evictions at this building.
    #[serde(default, deserialize_with = "de::optional_i64")]
    pub evictions: Option<i64>,
}

/// Building with the most eviction filings in a portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvictionFilingsAddress {
    /// Location.
    #[serde(flatten)]
    pub location: AddressLocation,
    /// Filings at this building.
    #[serde(default, deserialize_with = "de::optional_i64")]
    pub filings: Option<i64>,
}

/// Building with the largest rent-stabilized unit loss in a portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentStabilizedAddress {
    /// Location.
    #[serde(flatten)]
    pub location: AddressLocation,
    /// Change in rent-stabilized units.
    #[serde(default, deserialize_with = "de::optional_i64")]
    pub rsdiff: Option<i64>,
}

/// Building with the most open violations in a portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HpdViolationsAddress {
    /// Location.
    #[serde(flatten)]
    pub location: AddressLocation,
    /// Open violations at this building.
    #[serde(default, deserialize_with = "de::optional_i64")]
    pub openviolations: Option<i64>,
}

/// Aggregate statistics over every building in a portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatsRecord {
    /// Number of buildings.
    #[serde(deserialize_with = "de::count")]
    pub bldgs: i64,
    /// Residential units across all buildings.
    #[serde(deserialize_with = "de::count")]
    pub units: i64,
    /// Average building age in years.
    #[serde(default, deserialize_with = "de::optional_f64")]
    pub age: Option<f64>,
    /// Most frequent owner contact names, most common first.
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub topowners: Vec<String>,
    /// Most frequent corporate owner name.
    #[serde(default)]
    pub topcorp: Option<String>,
    /// Most frequent business address.
    #[serde(default)]
    pub topbusinessaddr: Option<String>,

    /// Open HPD violations.
    #[serde(default, deserialize_with = "de::count")]
    pub totalopenviolations: i64,
    /// All HPD violations.
    #[serde(default, deserialize_with = "de::count")]
    pub totalviolations: i64,
    /// Open violations per building.
    #[serde(default, deserialize_with = "de::number")]
    pub openviolationsperbldg: f64,
    /// Open violations per residential unit.
    #[serde(default, deserialize_with = "de::number")]
    pub openviolationsperresunit: f64,

    /// All HPD complaints.
    #[serde(default, deserialize_with = "de::optional_i64")]
    pub totalhpdcomplaints: Option<i64>,
    /// Recent HPD complaints.
    #[serde(default, deserialize_with = "de::optional_i64")]
    pub totalrecenthpdcomplaints: Option<i64>,
    /// Most common recent complaint types.
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub recenthpdcomplaintsbytype: Vec<HpdComplaintCount>,

    /// Executed evictions.
    #[serde(default, deserialize_with = "de::optional_i64")]
    pub totalevictions: Option<i64>,
    /// Eviction filings.
    #[serde(default, deserialize_with = "de::optional_i64")]
    pub totalevictionfilings: Option<i64>,
    /// Evictions per building.
    #[serde(default, deserialize_with = "de::optional_f64")]
    pub avgevictions: Option<f64>,

    /// Sum of rent-stabilized unit gains.
    #[serde(default, deserialize_with = "de::count")]
    pub totalrsgain: i64,
    /// Sum of rent-stabilized unit losses (zero or negative).
    #[serde(default, deserialize_with = "de::count")]
    pub totalrsloss: i64,
    /// Net change in rent-stabilized units.
    #[serde(default, deserialize_with = "de::optional_i64")]
    pub totalrsdiff: Option<i64>,
    /// Net rent-stabilized change as a percent of all units.
    #[serde(default, deserialize_with = "de::optional_f64")]
    pub rsproportion: Option<f64>,
    /// Average per-building rent-stabilized percent change.
    #[serde(default, deserialize_with = "de::optional_f64")]
    pub avgrspercent: Option<f64>,

    /// Building with the most open violations.
    #[serde(default)]
    pub violationsaddr: Option<HpdViolationsAddress>,
    /// Building with the most evictions.
    #[serde(default)]
    pub evictionsaddr: Option<EvictionsAddress>,
    /// Building with the most eviction filings.
    #[serde(default)]
    pub evictionfilingsaddr: Option<EvictionFilingsAddress>,
    /// Building with the largest rent-stabilized loss.
    #[serde(default)]
    pub rslossaddr: Option<RentStabilizedAddress>,
}

/// Fallback metadata for a parcel with no HPD registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingInfoRecord {
    /// Display address, e.g. `"144 COURT STREET"`.
    #[serde(default)]
    pub formatted_address: String,
    /// House number.
    #[serde(default)]
    pub housenumber: String,
    /// Street name.
    #[serde(default)]
    pub streetname: String,
    /// Department of Finance building class, e.g. `"O5"`.
    #[serde(default)]
    pub bldgclass: Option<String>,
    /// Borough.
    pub boro: Borough,
    /// Latitude.
    #[serde(default, deserialize_with = "de::optional_f64")]
    pub latitude: Option<f64>,
    /// Longitude.
    #[serde(default, deserialize_with = "de::optional_f64")]
    pub longitude: Option<f64>,
}

/// One month of building activity for the timeline charts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyTimelineData {
    /// Month as `YYYY-MM`.
    pub month: String,
    /// Emergency complaints.
    #[serde(default, deserialize_with = "de::count")]
    pub complaints_emergency: i64,
    /// Non-emergency complaints.
    #[serde(default, deserialize_with = "de::count")]
    pub complaints_nonemergency: i64,
    /// All complaints.
    #[serde(default, deserialize_with = "de::count")]
    pub complaints_total: i64,
    /// Building permit applications.
    #[serde(default, deserialize_with = "de::count")]
    pub permits_total: i64,
    /// Class A (non-hazardous) violations.
    #[serde(default, deserialize_with = "de::count")]
    pub viols_class_a: i64,
    /// Class B (hazardous) violations.
    #[serde(default, deserialize_with = "de::count")]
    pub viols_class_b: i64,
    /// Class C (immediately hazardous) violations.
    #[serde(default, deserialize_with = "de::count")]
    pub viols_class_c: i64,
    /// All violations.
    #[serde(default, deserialize_with = "de::count")]
    pub viols_total: i64,
}

/// Monthly indicator history for one building, oldest month first.
pub type TimelineIndicatorData = Vec<MonthlyTimelineData>;

/// Geosupport result echoed back by the backend's address search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoSearchData {
    /// Geosupport return code; `"00"` and `"01"` are matches.
    pub geosupport_return_code: String,
    /// Resolved parcel, if any.
    #[serde(default, deserialize_with = "de::optional_string")]
    pub bbl: Option<String>,
}

impl GeoSearchData {
    /// Return codes Geosupport uses for a successful (possibly warned)
    /// match.
    pub const MATCH_CODES: [&str; 2] = ["00", "01"];

    /// The resolved parcel, when the return code is a match and the BBL
    /// is well formed.
    #[must_use]
    pub fn matched_bbl(&self) -> Option<Bbl> {
        if !Self::MATCH_CODES.contains(&self.geosupport_return_code.as_str()) {
            return None;
        }
        self.bbl.as_deref().and_then(|b| Bbl::parse(b).ok())
    }
}

/// Response of `GET /api/address`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    /// Registered addresses in the searched parcel's portfolio.
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub addrs: Vec<AddressRecord>,
    /// Geosupport echo, present for house-number/street searches.
    #[serde(default)]
    pub geosearch: Option<GeoSearchData>,
}

/// The `{ "result": [...] }` envelope the aggregate, building info and
/// indicator history endpoints share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope<T> {
    /// Rows.
    #[serde(default = "Vec::new")]
    pub result: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> serde_json::Value {
        serde_json::json!({
            "housenumber": "654",
            "streetname": "PARK PLACE",
            "zip": "11216",
            "boro": "BROOKLYN",
            "registrationid": "352819",
            "lastregistrationdate": "2019-08-30",
            "registrationenddate": "2020-09-01",
            "bbl": "3012380016",
            "bin": "3031404",
            "corpnames": ["654 PARK PLACE LLC"],
            "businessaddrs": ["12 SPENCER STREET 4 11205"],
            "ownernames": [
                { "title": "HeadOfficer", "value": "MOSES GUTMAN" },
                { "title": "Agent", "value": "NATHAN SCHWARCZ" }
            ],
            "totalviolations": 12,
            "openviolations": 0,
            "unitsres": 13,
            "yearbuilt": 1931,
            "lat": 40.673_797_413_950_4,
            "lng": -73.956_278_132_253_8,
            "evictions": null,
            "rsunits2007": 11,
            "rsunits2017": 12,
            "rsdiff": 1,
            "rspercentchange": 8.33,
            "lastsaleacrisid": "2008012400521001",
            "lastsaledate": "2008-01-17",
            "lastsaleamount": 750_000
        })
    }

    #[test]
    fn decodes_address_record() {
        let record: AddressRecord = serde_json::from_value(sample_record()).unwrap();
        assert_eq!(record.bbl.as_str(), "3012380016");
        assert_eq!(record.boro, Borough::Brooklyn);
        assert_eq!(record.ownernames.len(), 2);
        assert_eq!(record.evictions, None);
        assert_eq!(record.lastsaleamount, Some(750_000.0));
        assert!(record.allcontacts.is_empty());
        assert_eq!(record.location().streetname, "PARK PLACE");
    }

    #[test]
    fn decodes_summary_with_string_numbers() {
        let summary: SummaryStatsRecord = serde_json::from_value(serde_json::json!({
            "bldgs": "2",
            "units": "21",
            "age": "98.5",
            "topowners": ["MOSES GUTMAN"],
            "topcorp": "654 PARK PLACE LLC",
            "topbusinessaddr": null,
            "totalopenviolations": "1",
            "totalviolations": "30",
            "openviolationsperbldg": "0.5",
            "openviolationsperresunit": "0.047",
            "totalevictions": null,
            "avgevictions": null,
            "totalrsgain": "1",
            "totalrsloss": "-8",
            "totalrsdiff": "-7",
            "rsproportion": "33.3",
            "violationsaddr": {
                "boro": "BROOKLYN",
                "housenumber": "378",
                "streetname": "LEWIS AVENUE",
                "lat": 40.68,
                "lng": -73.93,
                "openviolations": 1
            }
        }))
        .unwrap();
        assert_eq!(summary.bldgs, 2);
        assert_eq!(summary.totalrsloss, -8);
        assert_eq!(
            summary
                .violationsaddr
                .as_ref()
                .map(|a| a.location.streetname.as_str()),
            Some("LEWIS AVENUE")
        );
        assert!(summary.evictionsaddr.is_none());
    }

    #[test]
    fn geosearch_match_codes() {
        let hit = GeoSearchData {
            geosupport_return_code: "01".to_string(),
            bbl: Some("3012380016".to_string()),
        };
        assert_eq!(hit.matched_bbl().map(String::from).as_deref(), Some("3012380016"));

        let miss = GeoSearchData {
            geosupport_return_code: "42".to_string(),
            bbl: Some("3012380016".to_string()),
        };
        assert!(miss.matched_bbl().is_none());
    }

    #[test]
    fn search_params_normalize_and_guard() {
        let params = SearchAddressParams::new(" 150 ", "court st", Some(Borough::Brooklyn));
        assert_eq!(params.street_name, "COURT ST");
        assert!(params.is_searchable());
        assert_eq!(params.to_query_text(), "150 COURT ST, Brooklyn");

        assert!(!SearchAddressParams::new("150", "  ", Some(Borough::Brooklyn)).is_searchable());
        assert!(!SearchAddressParams::new("150", "COURT ST", None).is_searchable());
    }
}
