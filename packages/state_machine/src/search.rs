//! The search chain: resolve, look up registrations, then branch.
//!
//! 1. Resolve the address to a parcel (skipped for a BBL search).
//! 2. Look up the parcel's registered portfolio, unless the resolver
//!    already returned it.
//! 3. With registrations, build the portfolio. Without, fetch building
//!    info and check the NYCHA table.
//!
//! Every collaborator call is bounded by the configured timeout.

use std::future::Future;
use std::time::Duration;

use wow_geocoder::Resolution;
use wow_portfolio::PortfolioData;
use wow_portfolio_models::{AddressRecord, Bbl};

use crate::event::SearchOutcome;
use crate::state::SearchRequest;
use crate::{FetchError, Services};

/// Runs the search chain for `request`.
///
/// # Errors
///
/// * [`FetchError::Geocode`] / [`FetchError::Api`] if a collaborator fails
/// * [`FetchError::Timeout`] if a collaborator does not answer in time
/// * [`FetchError::Contract`] if the registrations do not include the
///   searched parcel
pub async fn run(
    services: &Services,
    timeout: Duration,
    request: &SearchRequest,
) -> Result<SearchOutcome, FetchError> {
    let (bbl, prefetched) = match request {
        SearchRequest::Address(params) => {
            let (resolution, addrs) = with_timeout(
                timeout,
                "resolve",
                services.resolver.resolve_with_addrs(params),
            )
            .await?;
            match resolution {
                Resolution::Found(bbl) => (bbl, addrs),
                Resolution::NotFound => return Ok(SearchOutcome::NotFound),
            }
        }
        SearchRequest::Bbl(bbl) => (bbl.clone(), None),
    };

    lookup(services, timeout, bbl, prefetched).await
}

async fn lookup(
    services: &Services,
    timeout: Duration,
    bbl: Bbl,
    prefetched: Option<Vec<AddressRecord>>,
) -> Result<SearchOutcome, FetchError> {
    let addrs = match prefetched {
        Some(addrs) => {
            log::debug!("{bbl}: {} addresses came with the resolution", addrs.len());
            addrs
        }
        None => {
            with_timeout(
                timeout,
                "lookup_by_bbl",
                services.data_source.lookup_by_bbl(&bbl),
            )
            .await?
        }
    };

    if !addrs.is_empty() {
        let portfolio = PortfolioData::new(&bbl, addrs)?;
        return Ok(SearchOutcome::Portfolio { bbl, portfolio });
    }

    log::debug!("{bbl} has no registrations; fetching building info");
    let building_info = with_timeout(
        timeout,
        "get_building_info",
        services.data_source.get_building_info(&bbl),
    )
    .await?;

    Ok(match services.nycha.lookup(&bbl) {
        Some(nycha) => SearchOutcome::Nycha {
            bbl,
            building_info,
            nycha: nycha.clone(),
        },
        None => SearchOutcome::Unregistered { bbl, building_info },
    })
}

/// Awaits `fut` for at most `after`.
///
/// # Errors
///
/// Returns [`FetchError::Timeout`] if the limit is hit, or the future's
/// own error converted into a [`FetchError`].
pub async fn with_timeout<T, E, F>(
    after: Duration,
    operation: &'static str,
    fut: F,
) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, E>> + Send,
    E: Into<FetchError>,
{
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| FetchError::Timeout { operation, after })?
        .map_err(Into::into)
}
