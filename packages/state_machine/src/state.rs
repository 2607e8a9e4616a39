//! State snapshots published by the portfolio machine.
//!
//! Each top-level state carries exactly the context that is meaningful
//! in it, so a consumer matching on [`WowState`] can never read a
//! portfolio while the machine is showing a NYCHA page, or building info
//! while a portfolio is on screen.

use serde::Serialize;
use strum_macros::{AsRefStr, Display};
use wow_nycha::NychaRecord;
use wow_portfolio::PortfolioData;
use wow_portfolio_models::{
    Bbl, BuildingInfoRecord, SearchAddressParams, SummaryStatsRecord, TimelineIndicatorData,
};

/// What was searched for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchRequest {
    /// A typed street address, resolved through the geocoder.
    Address(SearchAddressParams),
    /// A known parcel; no geocoding needed.
    Bbl(Bbl),
}

/// A fetch that runs on demand inside a found portfolio.
///
/// `NoData -> Pending -> Success | Error`; triggering it again goes back
/// to `Pending`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "camelCase")]
pub enum Region<T> {
    /// Not requested since the last reset.
    NoData,
    /// In flight.
    Pending,
    /// Loaded.
    Success(T),
    /// Failed.
    Error {
        /// Human-readable failure.
        message: String,
    },
}

impl<T> Default for Region<T> {
    fn default() -> Self {
        Self::NoData
    }
}

impl<T> Region<T> {
    /// The loaded value, if any.
    #[must_use]
    pub const fn data(&self) -> Option<&T> {
        match self {
            Self::Success(data) => Some(data),
            _ => None,
        }
    }

    /// Whether a fetch is in flight.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Whether the region has settled, successfully or not.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        matches!(self, Self::Success(_) | Self::Error { .. })
    }
}

/// Names of the top-level states, for logging and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "camelCase")]
pub enum StateTag {
    /// See [`WowState::NoData`].
    NoData,
    /// See [`WowState::SearchInProgress`].
    SearchInProgress,
    /// See [`WowState::BblNotFound`].
    BblNotFound,
    /// See [`WowState::UnregisteredFound`].
    UnregisteredFound,
    /// See [`WowState::NychaFound`].
    NychaFound,
    /// See [`WowState::PortfolioFound`].
    PortfolioFound,
    /// See [`WowState::NetworkErrorOccurred`].
    NetworkErrorOccurred,
}

/// The full state of a lookup session.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "state", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WowState {
    /// Nothing searched yet.
    #[default]
    NoData,

    /// Waiting on the geocoder or the backend.
    SearchInProgress {
        /// The search in flight.
        search: SearchRequest,
    },

    /// The address did not resolve to a parcel.
    BblNotFound {
        /// The search that missed.
        search: SearchRequest,
    },

    /// The parcel exists but has no HPD registration.
    UnregisteredFound {
        /// The search.
        search: SearchRequest,
        /// The resolved parcel.
        bbl: Bbl,
        /// Fallback building metadata, if the backend has any.
        building_info: Option<BuildingInfoRecord>,
    },

    /// The parcel is NYCHA public housing.
    NychaFound {
        /// The search.
        search: SearchRequest,
        /// The resolved parcel.
        bbl: Bbl,
        /// Fallback building metadata, if the backend has any.
        building_info: Option<BuildingInfoRecord>,
        /// The development the parcel belongs to.
        nycha: NychaRecord,
    },

    /// The parcel is registered and its portfolio is loaded.
    PortfolioFound {
        /// The search.
        search: SearchRequest,
        /// The resolved parcel.
        bbl: Bbl,
        /// Searched, detail and associated addresses.
        portfolio: PortfolioData,
        /// Indicator history of the detail address.
        timeline: Region<TimelineIndicatorData>,
        /// Portfolio-wide statistics.
        summary: Region<SummaryStatsRecord>,
    },

    /// The geocoder or the backend could not be reached.
    NetworkErrorOccurred {
        /// The search that failed.
        search: SearchRequest,
        /// Human-readable failure.
        message: String,
    },
}

impl WowState {
    /// The state's name.
    #[must_use]
    pub const fn tag(&self) -> StateTag {
        match self {
            Self::NoData => StateTag::NoData,
            Self::SearchInProgress { .. } => StateTag::SearchInProgress,
            Self::BblNotFound { .. } => StateTag::BblNotFound,
            Self::UnregisteredFound { .. } => StateTag::UnregisteredFound,
            Self::NychaFound { .. } => StateTag::NychaFound,
            Self::PortfolioFound { .. } => StateTag::PortfolioFound,
            Self::NetworkErrorOccurred { .. } => StateTag::NetworkErrorOccurred,
        }
    }

    /// The most recent search, if any.
    #[must_use]
    pub const fn search(&self) -> Option<&SearchRequest> {
        match self {
            Self::NoData => None,
            Self::SearchInProgress { search }
            | Self::BblNotFound { search }
            | Self::UnregisteredFound { search, .. }
            | Self::NychaFound { search, .. }
            | Self::PortfolioFound { search, .. }
            | Self::NetworkErrorOccurred { search, .. } => Some(search),
        }
    }

    /// The loaded portfolio, in [`WowState::PortfolioFound`].
    #[must_use]
    pub const fn portfolio(&self) -> Option<&PortfolioData> {
        match self {
            Self::PortfolioFound { portfolio, .. } => Some(portfolio),
            _ => None,
        }
    }

    /// The timeline region, in [`WowState::PortfolioFound`].
    #[must_use]
    pub const fn timeline(&self) -> Option<&Region<TimelineIndicatorData>> {
        match self {
            Self::PortfolioFound { timeline, .. } => Some(timeline),
            _ => None,
        }
    }

    /// The summary region, in [`WowState::PortfolioFound`].
    #[must_use]
    pub const fn summary(&self) -> Option<&Region<SummaryStatsRecord>> {
        match self {
            Self::PortfolioFound { summary, .. } => Some(summary),
            _ => None,
        }
    }

    /// Whether a search has finished, one way or another.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        !matches!(self, Self::NoData | Self::SearchInProgress { .. })
    }
}
