#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! The set of buildings that share ownership with a searched parcel.
//!
//! [`PortfolioData`] keeps the searched address, the address currently in
//! focus ("detail" address), and every associated address. The search and
//! detail addresses are stored as positions into the associated list, so
//! both are always members of it; there is no way to point the detail
//! address at a record from somewhere else.
//!
//! [`summary`] computes portfolio-wide statistics locally from the same
//! address list.

pub mod summary;

use serde::ser::{Serialize, SerializeStruct as _, Serializer};
use thiserror::Error;
use wow_portfolio_models::{AddressRecord, Bbl};

/// Contract violations when building or navigating a portfolio.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortfolioError {
    /// The backend returned no records for a portfolio lookup.
    #[error("Portfolio for {bbl} has no addresses")]
    Empty {
        /// The searched parcel.
        bbl: Bbl,
    },

    /// The backend returned records, but none for the parcel searched.
    #[error("Searched parcel {bbl} is missing from its own portfolio of {count} addresses")]
    SearchAddrMissing {
        /// The searched parcel.
        bbl: Bbl,
        /// How many records came back.
        count: usize,
    },

    /// A parcel outside the portfolio was selected.
    #[error("Parcel {bbl} is not part of this portfolio")]
    NotInPortfolio {
        /// The rejected parcel.
        bbl: Bbl,
    },
}

/// A found portfolio: the searched address, the detail address, and all
/// associated addresses.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioData {
    assoc_addrs: Vec<AddressRecord>,
    search_idx: usize,
    detail_idx: usize,
}

impl PortfolioData {
    /// Builds a portfolio for `search_bbl`. The detail address starts out
    /// as the searched address.
    ///
    /// # Errors
    ///
    /// * [`PortfolioError::Empty`] if `assoc_addrs` is empty
    /// * [`PortfolioError::SearchAddrMissing`] if no record has `search_bbl`
    pub fn new(search_bbl: &Bbl, assoc_addrs: Vec<AddressRecord>) -> Result<Self, PortfolioError> {
        if assoc_addrs.is_empty() {
            return Err(PortfolioError::Empty {
                bbl: search_bbl.clone(),
            });
        }

        let search_idx = assoc_addrs
            .iter()
            .position(|a| &a.bbl == search_bbl)
            .ok_or_else(|| PortfolioError::SearchAddrMissing {
                bbl: search_bbl.clone(),
                count: assoc_addrs.len(),
            })?;

        Ok(Self {
            assoc_addrs,
            search_idx,
            detail_idx: search_idx,
        })
    }

    /// The record for the parcel that was searched.
    #[must_use]
    pub fn search_addr(&self) -> &AddressRecord {
        &self.assoc_addrs[self.search_idx]
    }

    /// The record currently in focus.
    #[must_use]
    pub fn detail_addr(&self) -> &AddressRecord {
        &self.assoc_addrs[self.detail_idx]
    }

    /// Every address in the portfolio, in backend order.
    #[must_use]
    pub fn assoc_addrs(&self) -> &[AddressRecord] {
        &self.assoc_addrs
    }

    /// Looks up a member by parcel.
    #[must_use]
    pub fn find(&self, bbl: &Bbl) -> Option<&AddressRecord> {
        self.assoc_addrs.iter().find(|a| &a.bbl == bbl)
    }

    /// Whether `bbl` is a member of the portfolio.
    #[must_use]
    pub fn contains(&self, bbl: &Bbl) -> bool {
        self.find(bbl).is_some()
    }

    /// Moves focus to the member with `bbl`.
    ///
    /// # Errors
    ///
    /// Returns [`PortfolioError::NotInPortfolio`] if no member has `bbl`;
    /// focus is left unchanged.
    pub fn select_detail_addr(&mut self, bbl: &Bbl) -> Result<&AddressRecord, PortfolioError> {
        let idx = self
            .assoc_addrs
            .iter()
            .position(|a| &a.bbl == bbl)
            .ok_or_else(|| PortfolioError::NotInPortfolio { bbl: bbl.clone() })?;
        self.detail_idx = idx;
        Ok(self.detail_addr())
    }

    /// Number of buildings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assoc_addrs.len()
    }

    /// Always `false`; a portfolio has at least the searched address.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assoc_addrs.is_empty()
    }
}

impl Serialize for PortfolioData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("PortfolioData", 3)?;
        s.serialize_field("searchAddr", self.search_addr())?;
        s.serialize_field("detailAddr", self.detail_addr())?;
        s.serialize_field("assocAddrs", &self.assoc_addrs)?;
        s.end()
    }
}
