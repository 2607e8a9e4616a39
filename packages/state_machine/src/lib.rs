#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Portfolio discovery state machine.
//!
//! A search moves through the machine like this:
//!
//! ```text
//! NoData --SEARCH--> SearchInProgress --+--> BblNotFound
//!                                       +--> UnregisteredFound
//!                                       +--> NychaFound
//!                                       +--> PortfolioFound { timeline, summary }
//!                                       +--> NetworkErrorOccurred
//! ```
//!
//! Inside `PortfolioFound` the `timeline` and `summary` regions load on
//! demand (`VIEW_TIMELINE`, `VIEW_SUMMARY`) and evolve independently.
//! Selecting another detail address resets the timeline only.
//!
//! The transition logic in [`machine`] is synchronous and does no I/O;
//! it returns [`event::Command`]s. [`interpreter::PortfolioMachine`] runs
//! those commands on tokio and feeds their results back in, tagged with
//! sequence numbers so a superseded request can never overwrite newer
//! state.

pub mod error_reporting;
pub mod event;
pub mod interpreter;
pub mod machine;
pub mod search;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;
use wow_api_client::{ApiError, PortfolioDataSource};
use wow_geocoder::{AddressResolver, GeocodeError};
use wow_nycha::NychaTable;
use wow_portfolio::PortfolioError;
use wow_portfolio_models::Bbl;

pub use error_reporting::{ErrorReporter, LogReporter};
pub use event::{Command, Event, Input, SearchOutcome, Settled};
pub use interpreter::PortfolioMachine;
pub use machine::Machine;
pub use state::{Region, SearchRequest, StateTag, WowState};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A failed collaborator call.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Address resolution failed.
    #[error("Geocoding failed: {0}")]
    Geocode(#[from] GeocodeError),

    /// A backend call failed.
    #[error("Backend request failed: {0}")]
    Api(#[from] ApiError),

    /// A call did not answer in time.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// Which call.
        operation: &'static str,
        /// The limit that was hit.
        after: Duration,
    },

    /// The backend broke the portfolio contract.
    #[error("Portfolio contract violated: {0}")]
    Contract(#[from] PortfolioError),
}

impl FetchError {
    /// Whether the failure is worth reporting as a bug rather than as
    /// weather: client errors and contract breaks are, connectivity
    /// problems and timeouts are not.
    #[must_use]
    pub const fn should_report(&self) -> bool {
        match self {
            Self::Geocode(e) => e.should_report(),
            Self::Api(e) => e.should_report(),
            Self::Timeout { .. } => false,
            Self::Contract(_) => true,
        }
    }
}

/// Misuse of the machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineError {
    /// `SelectDetailAddr` named a parcel outside the current portfolio.
    #[error("Parcel {bbl} is not part of the current portfolio")]
    DetailAddrNotInPortfolio {
        /// The rejected parcel.
        bbl: Bbl,
    },

    /// The backend returned a portfolio that does not contain the parcel
    /// that was searched for.
    #[error("Portfolio contract violated: {0}")]
    Contract(#[from] PortfolioError),

    /// The machine's task is gone.
    #[error("Portfolio machine has stopped")]
    Stopped,
}

/// Where the summary region's data comes from.
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
pub enum SummarySource {
    /// `GET /api/address/aggregate`.
    #[default]
    Backend,
    /// Computed locally from the portfolio's addresses.
    Portfolio,
}

/// Tuning for a machine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineConfig {
    /// Limit on every individual collaborator call.
    pub request_timeout: Duration,
    /// Summary data source.
    pub summary_source: SummarySource,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            summary_source: SummarySource::default(),
        }
    }
}

/// The machine's collaborators.
#[derive(Clone)]
pub struct Services {
    /// Address to parcel.
    pub resolver: Arc<dyn AddressResolver>,
    /// Backend reads.
    pub data_source: Arc<dyn PortfolioDataSource>,
    /// Public housing parcels.
    pub nycha: Arc<NychaTable>,
    /// Failure sink.
    pub reporter: Arc<dyn ErrorReporter>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("resolver", &self.resolver.id())
            .field("nycha", &self.nycha.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod fakes;
