//! NYC `GeoSearch` client.
//!
//! `GeoSearch` is the city's hosted Pelias instance, loaded with the
//! Property Address Directory (PAD). Its `/search` endpoint takes a
//! free-form query and returns a `GeoJSON` `FeatureCollection`; each
//! feature carries the PAD BBL under `properties.addendum.pad.bbl`
//! (older deployments flatten it to `properties.pad_bbl`).
//!
//! See <https://geosearch.planninglabs.nyc/docs/>

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use wow_portfolio_models::{Bbl, Borough, SearchAddressParams};

use crate::{AddressResolver, GeocodeError, Resolution};

/// Public `GeoSearch` v2 endpoint.
pub const DEFAULT_BASE_URL: &str = "https://geosearch.planninglabs.nyc/v2";

/// Candidates requested per query. More than one so a borough mismatch
/// on the top hit can fall through to the right borough.
pub const DEFAULT_RESULT_SIZE: u32 = 5;

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Resolves addresses through `GeoSearch`.
#[derive(Debug, Clone)]
pub struct GeoSearchResolver {
    client: reqwest::Client,
    base_url: String,
    size: u32,
}

impl GeoSearchResolver {
    /// Creates a resolver against `base_url` with a fresh HTTP client.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Creates a resolver that shares an existing HTTP client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            size: DEFAULT_RESULT_SIZE,
        }
    }

    /// Overrides how many candidates are requested.
    #[must_use]
    pub const fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    /// Runs a raw free-text search and returns the `FeatureCollection`.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the request fails, the service answers
    /// with a non-success status, or the body is not JSON.
    pub async fn search(&self, text: &str) -> Result<Value, GeocodeError> {
        let url = format!("{}/search", self.base_url);
        let size = self.size.to_string();

        let resp = self
            .client
            .get(&url)
            .query(&[("text", text), ("size", size.as_str())])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }
        if !status.is_success() {
            return Err(GeocodeError::Status {
                status: status.as_u16(),
            });
        }

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl AddressResolver for GeoSearchResolver {
    fn id(&self) -> &'static str {
        "geosearch"
    }

    async fn resolve(&self, params: &SearchAddressParams) -> Result<Resolution, GeocodeError> {
        let text = params.to_query_text();
        log::debug!("geosearch: resolving {text:?}");

        let body = self.search(&text).await?;
        let resolution = parse_resolution(&body, params.borough)?;

        match &resolution {
            Resolution::Found(bbl) => log::debug!("geosearch: {text:?} -> {bbl}"),
            Resolution::NotFound => log::info!("geosearch: no parcel for {text:?}"),
        }
        Ok(resolution)
    }
}

/// Picks the parcel out of a `GeoSearch` response.
///
/// Features from a different borough than `borough` are skipped, as are
/// features without a usable BBL. No remaining feature means
/// [`Resolution::NotFound`].
///
/// # Errors
///
/// Returns [`GeocodeError::Parse`] if the body has no `features` array.
pub fn parse_resolution(
    body: &Value,
    borough: Option<Borough>,
) -> Result<Resolution, GeocodeError> {
    let features = body
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| GeocodeError::Parse {
            message: "GeoSearch response missing 'features' array".to_string(),
        })?;

    let found = features
        .iter()
        .filter(|f| borough.is_none_or(|b| borough_matches(f, b)))
        .find_map(feature_bbl);

    Ok(found.map_or(Resolution::NotFound, Resolution::Found))
}

/// Whether a feature lies in `borough`. Features that do not name a
/// borough are kept.
fn borough_matches(feature: &Value, borough: Borough) -> bool {
    feature
        .pointer("/properties/borough")
        .and_then(Value::as_str)
        .is_none_or(|name| name.eq_ignore_ascii_case(borough.label()))
}

/// Reads the PAD BBL from a feature, if present and well formed.
fn feature_bbl(feature: &Value) -> Option<Bbl> {
    let raw = feature
        .pointer("/properties/addendum/pad/bbl")
        .or_else(|| feature.pointer("/properties/pad_bbl"))?;

    let text = match raw {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    match Bbl::parse(&text) {
        Ok(bbl) => Some(bbl),
        Err(e) => {
            log::warn!("geosearch: ignoring feature with bad BBL {text:?}: {e}");
            None
        }
    }
}
