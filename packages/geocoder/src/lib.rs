#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Resolves a typed street address to a parcel identifier (BBL).
//!
//! The [`AddressResolver`] trait is the seam the portfolio state machine
//! depends on. Two implementations exist:
//!
//! 1. [`geosearch::GeoSearchResolver`]: the city's free `GeoSearch`
//!    service (Pelias-based, no API key).
//! 2. The backend API's own Geoclient passthrough, implemented on the
//!    API client in `wow_api_client`.
//!
//! A resolver must keep "no such address" ([`Resolution::NotFound`])
//! separate from "could not ask" ([`GeocodeError`]); the state machine
//! shows the user different pages for each.
//!
//! Also provides [`address`] cleaning for user-typed input.

pub mod address;
pub mod geosearch;

use async_trait::async_trait;
use thiserror::Error;
use wow_portfolio_models::{AddressRecord, Bbl, SearchAddressParams};

/// Outcome of resolving an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The geocoder had no match.
    NotFound,
    /// The address sits on this parcel.
    Found(Bbl),
}

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Geocoder answered with a non-success status.
    #[error("Geocoder returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// The geocoding service answered but reported a failure of its own.
    #[error("Geocoder failed: {message}")]
    Service {
        /// Message from the service.
        message: String,
    },
}

impl GeocodeError {
    /// Whether this failure points at a bug on our side (a malformed
    /// request or a response we cannot read) rather than at the network.
    #[must_use]
    pub const fn should_report(&self) -> bool {
        match self {
            Self::Status { status } => *status >= 400 && *status < 500,
            Self::Parse { .. } => true,
            Self::Http(_) | Self::RateLimited | Self::Service { .. } => false,
        }
    }
}

/// Turns search parameters into a parcel.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Short identifier for logs (e.g. `"geosearch"`).
    fn id(&self) -> &str;

    /// Resolves `params` to a parcel.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] when the geocoder cannot be reached or
    /// answers with something other than a result set. An empty result
    /// set is `Ok(Resolution::NotFound)`, never an error.
    async fn resolve(&self, params: &SearchAddressParams) -> Result<Resolution, GeocodeError>;

    /// Like [`AddressResolver::resolve`], plus the parcel's registered
    /// addresses when the resolver's answer already includes them. A
    /// resolver that cannot vouch for the list returns `None` and the
    /// caller looks the parcel up itself.
    ///
    /// # Errors
    ///
    /// Same as [`AddressResolver::resolve`].
    async fn resolve_with_addrs(
        &self,
        params: &SearchAddressParams,
    ) -> Result<(Resolution, Option<Vec<AddressRecord>>), GeocodeError> {
        Ok((self.resolve(params).await?, None))
    }
}
