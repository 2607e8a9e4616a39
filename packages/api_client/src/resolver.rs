//! Address resolution through the backend's Geoclient passthrough.
//!
//! `GET /api/address?houseNumber&street&borough` geocodes on the server
//! and echoes the Geosupport result in its `geosearch` block. An address
//! Geosupport cannot place comes back as `{ "error": "... not found" }`,
//! which is a miss rather than a failure.
//!
//! The same response carries the parcel's registered addresses. With the
//! legacy portfolio method that list is exactly what a parcel lookup
//! would return, so [`AddressResolver::resolve_with_addrs`] hands it on
//! and the search skips the second request. The wowza method groups
//! portfolios differently and always looks the parcel up.

use async_trait::async_trait;
use wow_geocoder::{AddressResolver, GeocodeError, Resolution};
use wow_portfolio_models::{AddressRecord, SearchAddressParams, SearchResults};

use crate::{ApiClient, ApiError, PortfolioMethod};

#[async_trait]
impl AddressResolver for ApiClient {
    fn id(&self) -> &'static str {
        "backend"
    }

    async fn resolve(&self, params: &SearchAddressParams) -> Result<Resolution, GeocodeError> {
        Ok(self.resolve_with_addrs(params).await?.0)
    }

    async fn resolve_with_addrs(
        &self,
        params: &SearchAddressParams,
    ) -> Result<(Resolution, Option<Vec<AddressRecord>>), GeocodeError> {
        let text = params.to_query_text();
        log::debug!("backend geoclient: resolving {text:?}");

        let (resolution, addrs) = resolved_search(self.search_address(params).await)?;
        if resolution == Resolution::NotFound {
            log::info!("backend geoclient: no parcel for {text:?}");
            return Ok((resolution, None));
        }
        let reusable = self.portfolio_method() == PortfolioMethod::Legacy;
        Ok((resolution, reusable.then_some(addrs)))
    }
}

/// Maps an address search outcome onto a [`Resolution`].
///
/// # Errors
///
/// Returns [`GeocodeError`] for every failure other than the backend's
/// "not found" message.
pub fn resolution_from(
    outcome: Result<SearchResults, ApiError>,
) -> Result<Resolution, GeocodeError> {
    resolved_search(outcome).map(|(resolution, _)| resolution)
}

/// [`resolution_from`], keeping the registered addresses that came with
/// the answer. A miss has none.
///
/// # Errors
///
/// Same as [`resolution_from`].
pub fn resolved_search(
    outcome: Result<SearchResults, ApiError>,
) -> Result<(Resolution, Vec<AddressRecord>), GeocodeError> {
    match outcome {
        Ok(results) => {
            let resolution = results
                .geosearch
                .and_then(|g| g.matched_bbl())
                .map_or(Resolution::NotFound, Resolution::Found);
            Ok((resolution, results.addrs))
        }
        Err(ApiError::Backend { message }) if is_not_found_message(&message) => {
            Ok((Resolution::NotFound, Vec::new()))
        }
        Err(e) => Err(into_geocode_error(e)),
    }
}

fn is_not_found_message(message: &str) -> bool {
    message.to_ascii_lowercase().contains("not found")
}

fn into_geocode_error(e: ApiError) -> GeocodeError {
    match e {
        ApiError::Http(e) => GeocodeError::Http(e),
        ApiError::Status { status: 429, .. } => GeocodeError::RateLimited,
        ApiError::Status { status, .. } => GeocodeError::Status { status },
        ApiError::Backend { message } => GeocodeError::Service { message },
        other @ (ApiError::NotJson { .. }
        | ApiError::Decode { .. }
        | ApiError::Json(_)
        | ApiError::Empty { .. }) => GeocodeError::Parse {
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use wow_portfolio_models::{Bbl, GeoSearchData};

    use super::*;

    fn results(code: &str, bbl: Option<&str>) -> SearchResults {
        SearchResults {
            addrs: Vec::new(),
            geosearch: Some(GeoSearchData {
                geosupport_return_code: code.to_string(),
                bbl: bbl.map(String::from),
            }),
        }
    }

    #[test]
    fn match_codes_resolve() {
        assert_eq!(
            resolution_from(Ok(results("00", Some("3012380016")))).unwrap(),
            Resolution::Found(Bbl::parse("3012380016").unwrap())
        );
        assert_eq!(
            resolution_from(Ok(results("01", Some("3012380016")))).unwrap(),
            Resolution::Found(Bbl::parse("3012380016").unwrap())
        );
    }

    #[test]
    fn other_codes_are_not_found() {
        assert_eq!(
            resolution_from(Ok(results("42", Some("3012380016")))).unwrap(),
            Resolution::NotFound
        );
        assert_eq!(
            resolution_from(Ok(results("00", None))).unwrap(),
            Resolution::NotFound
        );
    }

    #[test]
    fn resolved_search_keeps_the_addresses() {
        let mut found = results("00", Some("3012380016"));
        found.addrs = serde_json::from_value(serde_json::json!([
            { "bbl": "3012380016", "housenumber": "654", "streetname": "PARK PLACE",
              "boro": "BROOKLYN" }
        ]))
        .unwrap();
        let (resolution, addrs) = resolved_search(Ok(found)).unwrap();
        assert_eq!(
            resolution,
            Resolution::Found(Bbl::parse("3012380016").unwrap())
        );
        assert_eq!(addrs.len(), 1);
    }

    #[test]
    fn not_found_message_is_a_miss() {
        let outcome = Err(ApiError::Backend {
            message: "[geosearch] Address not found".to_string(),
        });
        assert_eq!(resolution_from(outcome).unwrap(), Resolution::NotFound);
    }

    #[test]
    fn service_failures_stay_errors() {
        let outcome = Err(ApiError::Status {
            status: 503,
            url: "http://localhost/api/address".to_string(),
        });
        assert!(matches!(
            resolution_from(outcome),
            Err(GeocodeError::Status { status: 503 })
        ));

        let outcome = Err(ApiError::Backend {
            message: "connection refused".to_string(),
        });
        assert!(matches!(
            resolution_from(outcome),
            Err(GeocodeError::Service { .. })
        ));
    }
}
