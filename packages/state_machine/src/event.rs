//! What flows into the machine, and what it asks to have done.

use wow_nycha::NychaRecord;
use wow_portfolio::PortfolioData;
use wow_portfolio_models::{
    AddressRecord, Bbl, BuildingInfoRecord, SearchAddressParams, SummaryStatsRecord,
    TimelineIndicatorData,
};

use crate::FetchError;
use crate::state::SearchRequest;

/// User-facing events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Look up a street address.
    Search(SearchAddressParams),
    /// Look up a known parcel.
    SearchBbl(Bbl),
    /// Focus a different building of the current portfolio.
    SelectDetailAddr(Bbl),
    /// Load the portfolio summary.
    ViewSummary,
    /// Load the detail address's timeline.
    ViewTimeline,
}

/// How a search chain ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// No parcel for the address.
    NotFound,
    /// Parcel without registrations.
    Unregistered {
        /// Resolved parcel.
        bbl: Bbl,
        /// Fallback metadata.
        building_info: Option<BuildingInfoRecord>,
    },
    /// Public housing parcel.
    Nycha {
        /// Resolved parcel.
        bbl: Bbl,
        /// Fallback metadata.
        building_info: Option<BuildingInfoRecord>,
        /// Development record.
        nycha: NychaRecord,
    },
    /// Registered parcel with its portfolio.
    Portfolio {
        /// Resolved parcel.
        bbl: Bbl,
        /// The portfolio; its search address is `bbl`.
        portfolio: PortfolioData,
    },
}

/// Completion of a command, tagged with the sequence number it was
/// issued under.
#[derive(Debug)]
pub enum Settled {
    /// A search chain finished.
    Search {
        /// Issue number.
        seq: u64,
        /// Outcome.
        result: Result<SearchOutcome, FetchError>,
    },
    /// A timeline fetch finished.
    Timeline {
        /// Issue number.
        seq: u64,
        /// Outcome.
        result: Result<TimelineIndicatorData, FetchError>,
    },
    /// A summary fetch or computation finished.
    Summary {
        /// Issue number.
        seq: u64,
        /// Outcome.
        result: Result<SummaryStatsRecord, FetchError>,
    },
}

/// Everything the machine reacts to.
#[derive(Debug)]
pub enum Input {
    /// From the user.
    Event(Event),
    /// From a finished command.
    Settled(Settled),
}

impl From<Event> for Input {
    fn from(event: Event) -> Self {
        Self::Event(event)
    }
}

impl From<Settled> for Input {
    fn from(settled: Settled) -> Self {
        Self::Settled(settled)
    }
}

/// Side effects requested by a transition.
#[derive(Debug)]
pub enum Command {
    /// Run the search chain.
    Search {
        /// Issue number.
        seq: u64,
        /// What to search for.
        request: SearchRequest,
    },
    /// Fetch indicator history.
    FetchTimeline {
        /// Issue number.
        seq: u64,
        /// Building to fetch.
        bbl: Bbl,
    },
    /// Fetch the backend's portfolio aggregate.
    FetchSummary {
        /// Issue number.
        seq: u64,
        /// Building whose portfolio to aggregate.
        bbl: Bbl,
    },
    /// Compute the summary locally.
    ComputeSummary {
        /// Issue number.
        seq: u64,
        /// Building the summary was requested for.
        bbl: Bbl,
        /// Every address in the portfolio.
        addrs: Vec<AddressRecord>,
    },
    /// Hand a failure to the error reporter.
    Report(FetchError),
}
