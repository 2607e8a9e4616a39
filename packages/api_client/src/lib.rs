#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Client for the who-owns-what backend JSON API.
//!
//! The backend exposes one address search and three per-parcel reads:
//!
//! | Endpoint | Returns |
//! |---|---|
//! | `GET /api/address?houseNumber&street&borough` | `{ geosearch, addrs }` |
//! | `GET /api/address?block&lot&borough` | `{ geosearch, addrs }` |
//! | `GET /api/address/wowza?block&lot&borough` | `{ geosearch, addrs }` |
//! | `GET /api/address/aggregate?bbl=` | `{ result: [SummaryStatsRecord] }` |
//! | `GET /api/address/dap-aggregate?bbl=` | `{ result: [SummaryStatsRecord] }` |
//! | `GET /api/address/buildinginfo?bbl=` | `{ result: [BuildingInfoRecord] }` |
//! | `GET /api/address/indicatorhistory?bbl=` | `{ result: [MonthlyTimelineData] }` |
//!
//! The backend answers failures with HTTP 200 and `{ "error": "..." }`;
//! those become [`ApiError::Backend`] here so callers never mistake them
//! for an empty result.
//!
//! The `wowza` and `dap-aggregate` routes group portfolios by the
//! ownership graph instead of by shared registration contacts. Which pair
//! a client uses is its [`PortfolioMethod`].
//!
//! [`PortfolioDataSource`] is the seam the state machine depends on;
//! [`ApiClient`] implements it over HTTP.

pub mod resolver;
pub mod retry;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{AsRefStr, Display, EnumString};
use wow_portfolio_models::{
    AddressRecord, Bbl, BuildingInfoRecord, MonthlyTimelineData, ResultEnvelope,
    SearchAddressParams, SearchResults, SummaryStatsRecord, TimelineIndicatorData,
};

pub use retry::RetryPolicy;

/// Default backend base URL.
pub const DEFAULT_BASE_URL: &str = "https://whoownswhat.justfix.org";

/// Errors from backend API calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status.
    #[error("HTTP error {status} from {url}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// The response was not `application/json`.
    #[error("Expected JSON response but got {content_type:?} from {url}")]
    NotJson {
        /// The `Content-Type` header, if any.
        content_type: Option<String>,
        /// Requested URL.
        url: String,
    },

    /// The body claimed to be JSON but did not parse.
    #[error("Invalid JSON from {url}: {message}")]
    Decode {
        /// Requested URL.
        url: String,
        /// Parser message.
        message: String,
    },

    /// The JSON did not have the expected shape.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The backend reported a failure in an `{ "error": ... }` body.
    #[error("Backend error: {message}")]
    Backend {
        /// Message from the backend.
        message: String,
    },

    /// An endpoint that always returns one row returned none.
    #[error("{endpoint} returned no rows for {bbl}")]
    Empty {
        /// Endpoint name.
        endpoint: &'static str,
        /// Requested parcel.
        bbl: Bbl,
    },
}

impl ApiError {
    /// Whether this failure points at a bug on our side rather than at
    /// connectivity or backend health: 4xx responses (other than rate
    /// limiting) and responses that break the API contract.
    #[must_use]
    pub const fn should_report(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status >= 400 && *status < 500 && *status != 429,
            Self::NotJson { .. } | Self::Decode { .. } | Self::Json(_) | Self::Empty { .. } => {
                true
            }
            Self::Http(_) | Self::Backend { .. } => false,
        }
    }
}

/// How the backend maps a parcel to its portfolio.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PortfolioMethod {
    /// Buildings sharing HPD registration contacts.
    #[default]
    Legacy,
    /// The ownership graph.
    Wowza,
}

impl PortfolioMethod {
    /// The parcel search route.
    #[must_use]
    pub const fn lookup_path(self) -> &'static str {
        match self {
            Self::Legacy => "/api/address",
            Self::Wowza => "/api/address/wowza",
        }
    }

    /// The portfolio summary route.
    #[must_use]
    pub const fn summary_path(self) -> &'static str {
        match self {
            Self::Legacy => "/api/address/aggregate",
            Self::Wowza => "/api/address/dap-aggregate",
        }
    }

    const fn summary_endpoint(self) -> &'static str {
        match self {
            Self::Legacy => "aggregate",
            Self::Wowza => "dap-aggregate",
        }
    }
}

/// The four backend reads the portfolio state machine depends on.
///
/// Every operation is side-effect free from the caller's point of view
/// and may be retried.
#[async_trait]
pub trait PortfolioDataSource: Send + Sync {
    /// Registered addresses in the ownership group of `bbl`. Empty means
    /// the parcel has no HPD registration.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend cannot be reached or fails.
    async fn lookup_by_bbl(&self, bbl: &Bbl) -> Result<Vec<AddressRecord>, ApiError>;

    /// Fallback metadata for an unregistered parcel, if the backend has
    /// any.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend cannot be reached or fails.
    async fn get_building_info(&self, bbl: &Bbl) -> Result<Option<BuildingInfoRecord>, ApiError>;

    /// Portfolio-wide statistics for the portfolio containing `bbl`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend cannot be reached, fails, or
    /// returns no row.
    async fn get_summary(&self, bbl: &Bbl) -> Result<SummaryStatsRecord, ApiError>;

    /// Monthly indicator history for the building at `bbl`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the backend cannot be reached or fails.
    async fn get_timeline(&self, bbl: &Bbl) -> Result<TimelineIndicatorData, ApiError>;
}

/// HTTP client for the backend API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
    method: PortfolioMethod,
}

impl ApiClient {
    /// Creates a client against `base_url` with a fresh HTTP client.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Creates a client that shares an existing HTTP client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
            method: PortfolioMethod::default(),
        }
    }

    /// Overrides the retry policy.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Selects the routes used for portfolio lookups and summaries.
    #[must_use]
    pub const fn with_portfolio_method(mut self, method: PortfolioMethod) -> Self {
        self.method = method;
        self
    }

    /// The portfolio method in use.
    #[must_use]
    pub const fn portfolio_method(&self) -> PortfolioMethod {
        self.method
    }

    /// The backend base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Searches by street address. The backend geocodes the address and
    /// echoes the Geosupport result alongside the portfolio.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the request fails or the backend reports
    /// an error (including "address not found").
    pub async fn search_address(
        &self,
        params: &SearchAddressParams,
    ) -> Result<SearchResults, ApiError> {
        let borough = params.borough.map(|b| b.to_string()).unwrap_or_default();
        let body = self
            .get(
                "/api/address",
                &[
                    ("houseNumber", params.house_number.as_str()),
                    ("street", params.street_name.as_str()),
                    ("borough", borough.as_str()),
                ],
            )
            .await?;
        parse_search_results(body)
    }

    /// Searches by parcel, grouping the portfolio by the configured
    /// [`PortfolioMethod`].
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the request fails or the backend reports
    /// an error.
    pub async fn search_bbl(&self, bbl: &Bbl) -> Result<SearchResults, ApiError> {
        let parts = bbl.split();
        let borough = parts.borough.code().to_string();
        let body = self
            .get(
                self.method.lookup_path(),
                &[
                    ("block", parts.block.as_str()),
                    ("lot", parts.lot.as_str()),
                    ("borough", borough.as_str()),
                ],
            )
            .await?;
        parse_search_results(body)
    }

    /// Portfolio aggregate rows for `bbl`, from the configured
    /// [`PortfolioMethod`]'s summary route.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the request fails or the backend reports
    /// an error.
    pub async fn get_aggregate(&self, bbl: &Bbl) -> Result<Vec<SummaryStatsRecord>, ApiError> {
        let body = self
            .get(self.method.summary_path(), &[("bbl", bbl.as_str())])
            .await?;
        parse_result_rows(body)
    }

    /// Building info rows for `bbl`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the request fails or the backend reports
    /// an error.
    pub async fn get_building_info_rows(
        &self,
        bbl: &Bbl,
    ) -> Result<Vec<BuildingInfoRecord>, ApiError> {
        let body = self
            .get("/api/address/buildinginfo", &[("bbl", bbl.as_str())])
            .await?;
        parse_result_rows(body)
    }

    /// Monthly indicator history for `bbl`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the request fails or the backend reports
    /// an error.
    pub async fn get_indicator_history(
        &self,
        bbl: &Bbl,
    ) -> Result<Vec<MonthlyTimelineData>, ApiError> {
        let body = self
            .get("/api/address/indicatorhistory", &[("bbl", bbl.as_str())])
            .await?;
        parse_result_rows(body)
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, ApiError> {
        let url = format!("{}{path}", self.base_url);
        log::debug!("GET {url} {query:?}");

        let body = retry::send_json(&self.retry, || {
            self.client
                .get(&url)
                .header(reqwest::header::ACCEPT, "application/json")
                .query(query)
        })
        .await?;

        check_backend_error(&body)?;
        Ok(body)
    }
}

#[async_trait]
impl PortfolioDataSource for ApiClient {
    async fn lookup_by_bbl(&self, bbl: &Bbl) -> Result<Vec<AddressRecord>, ApiError> {
        let results = self.search_bbl(bbl).await?;
        log::debug!("{bbl}: {} registered addresses", results.addrs.len());
        Ok(results.addrs)
    }

    async fn get_building_info(&self, bbl: &Bbl) -> Result<Option<BuildingInfoRecord>, ApiError> {
        Ok(self.get_building_info_rows(bbl).await?.into_iter().next())
    }

    async fn get_summary(&self, bbl: &Bbl) -> Result<SummaryStatsRecord, ApiError> {
        self.get_aggregate(bbl)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Empty {
                endpoint: self.method.summary_endpoint(),
                bbl: bbl.clone(),
            })
    }

    async fn get_timeline(&self, bbl: &Bbl) -> Result<TimelineIndicatorData, ApiError> {
        self.get_indicator_history(bbl).await
    }
}

/// Fails with [`ApiError::Backend`] if `body` is an `{ "error": ... }`
/// envelope.
///
/// # Errors
///
/// Returns [`ApiError::Backend`] carrying the backend's message.
pub fn check_backend_error(body: &Value) -> Result<(), ApiError> {
    match body.get("error") {
        None | Some(Value::Null) => Ok(()),
        Some(Value::String(message)) => Err(ApiError::Backend {
            message: message.clone(),
        }),
        Some(other) => Err(ApiError::Backend {
            message: other.to_string(),
        }),
    }
}

/// Parses an address search response.
///
/// # Errors
///
/// Returns [`ApiError::Json`] if the body does not match
/// [`SearchResults`].
pub fn parse_search_results(body: Value) -> Result<SearchResults, ApiError> {
    Ok(serde_json::from_value(body)?)
}

/// Parses the rows out of a `{ "result": [...] }` response.
///
/// # Errors
///
/// Returns [`ApiError::Json`] if the body or any row has the wrong
/// shape.
pub fn parse_result_rows<T: DeserializeOwned>(body: Value) -> Result<Vec<T>, ApiError> {
    let envelope: ResultEnvelope<T> = serde_json::from_value(body)?;
    Ok(envelope.result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_is_a_backend_error() {
        let body = serde_json::json!({ "error": "[geosearch] Address not found" });
        match check_backend_error(&body) {
            Err(ApiError::Backend { message }) => {
                assert_eq!(message, "[geosearch] Address not found");
            }
            other => panic!("expected backend error, got {other:?}"),
        }
        assert!(check_backend_error(&serde_json::json!({ "result": [] })).is_ok());
        assert!(check_backend_error(&serde_json::json!({ "error": null })).is_ok());
    }

    #[test]
    fn parses_search_results() {
        let body = serde_json::json!({
            "geosearch": { "geosupportReturnCode": "00", "bbl": "3012380016" },
            "addrs": [{
                "bbl": "3012380016",
                "housenumber": "654",
                "streetname": "PARK PLACE",
                "boro": "BROOKLYN",
                "totalviolations": 12,
                "openviolations": 0
            }]
        });
        let results = parse_search_results(body).unwrap();
        assert_eq!(results.addrs.len(), 1);
        assert_eq!(results.addrs[0].bbl.as_str(), "3012380016");
        assert_eq!(
            results.geosearch.and_then(|g| g.matched_bbl()),
            Some(Bbl::parse("3012380016").unwrap())
        );
    }

    #[test]
    fn null_addrs_is_empty() {
        let body = serde_json::json!({
            "geosearch": { "geosupportReturnCode": "00", "bbl": "3012380016" },
            "addrs": null
        });
        assert!(parse_search_results(body).unwrap().addrs.is_empty());
    }

    #[test]
    fn portfolio_method_picks_routes() {
        assert_eq!(PortfolioMethod::default(), PortfolioMethod::Legacy);
        assert_eq!(PortfolioMethod::Legacy.lookup_path(), "/api/address");
        assert_eq!(PortfolioMethod::Legacy.summary_path(), "/api/address/aggregate");
        assert_eq!(PortfolioMethod::Wowza.lookup_path(), "/api/address/wowza");
        assert_eq!(PortfolioMethod::Wowza.summary_path(), "/api/address/dap-aggregate");
        assert_eq!("WOWZA".parse::<PortfolioMethod>().unwrap(), PortfolioMethod::Wowza);
        assert_eq!(PortfolioMethod::Wowza.to_string(), "wowza");

        let client =
            ApiClient::new("http://localhost/").with_portfolio_method(PortfolioMethod::Wowza);
        assert_eq!(client.portfolio_method(), PortfolioMethod::Wowza);
    }

    /// `wowza` answers in the `/api/address` shape, with extra keys the
    /// client does not use.
    #[test]
    fn parses_wowza_search_results() {
        let body = serde_json::json!({
            "geosearch": { "geosupportReturnCode": "00", "bbl": "3016690036" },
            "addrs": [
                { "bbl": "3012380016", "housenumber": "654", "streetname": "PARK PLACE",
                  "boro": "BROOKLYN" },
                { "bbl": "3016690036", "housenumber": "378", "streetname": "LEWIS AVENUE",
                  "boro": "BROOKLYN" }
            ],
            "graph": { "nodes": [], "edges": [] }
        });
        check_backend_error(&body).unwrap();
        let results = parse_search_results(body).unwrap();
        assert_eq!(results.addrs.len(), 2);
        assert_eq!(results.addrs[1].bbl.as_str(), "3016690036");
    }

    #[test]
    fn parses_dap_aggregate_rows() {
        let body = serde_json::json!({
            "result": [{
                "bldgs": 2,
                "units": 21,
                "age": 99.5,
                "topowners": ["MOSES GUTMAN"],
                "totalopenviolations": 2,
                "totalviolations": 20
            }]
        });
        let rows: Vec<SummaryStatsRecord> = parse_result_rows(body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].bldgs, 2);
    }

    #[test]
    fn parses_indicator_history_rows() {
        let body = serde_json::json!({
            "result": [
                { "month": "2019-01", "complaints_emergency": 1, "complaints_nonemergency": 2,
                  "complaints_total": 3, "permits_total": null, "viols_class_a": 0,
                  "viols_class_b": 1, "viols_class_c": 0, "viols_total": 1 },
                { "month": "2019-02", "complaints_total": 0 }
            ]
        });
        let rows: Vec<MonthlyTimelineData> = parse_result_rows(body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].complaints_total, 3);
        assert_eq!(rows[0].permits_total, 0);
        assert_eq!(rows[1].month, "2019-02");
    }

    #[test]
    fn parses_building_info_rows() {
        let body = serde_json::json!({
            "result": [{
                "formatted_address": "144 COURT STREET",
                "housenumber": "144",
                "streetname": "COURT STREET",
                "bldgclass": "O5",
                "boro": "BROOKLYN",
                "latitude": 40.688,
                "longitude": -73.992
            }]
        });
        let rows: Vec<BuildingInfoRecord> = parse_result_rows(body).unwrap();
        assert_eq!(rows[0].bldgclass.as_deref(), Some("O5"));
    }

    #[test]
    fn wrong_shape_is_a_json_error() {
        let body = serde_json::json!({ "result": "nope" });
        assert!(matches!(
            parse_result_rows::<MonthlyTimelineData>(body),
            Err(ApiError::Json(_))
        ));
    }

    #[test]
    fn reports_client_errors_and_contract_breaks_only() {
        let status = |status| ApiError::Status {
            status,
            url: "http://localhost/api/address".to_string(),
        };
        assert!(status(400).should_report());
        assert!(status(404).should_report());
        assert!(!status(429).should_report());
        assert!(!status(502).should_report());
        assert!(
            ApiError::NotJson {
                content_type: Some("text/html".to_string()),
                url: "http://localhost/".to_string(),
            }
            .should_report()
        );
        assert!(
            !ApiError::Backend {
                message: "db down".to_string()
            }
            .should_report()
        );
    }
}
