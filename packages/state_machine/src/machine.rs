//! Transition function.
//!
//! [`Machine::apply`] takes the current state and one input, updates the
//! state in place and returns the commands to run. It never blocks and
//! never performs I/O, so every transition can be driven directly from
//! a test.
//!
//! Each command carries a sequence number. A completion is applied only
//! if its number is still the latest one issued for its kind; a new
//! search bumps all three counters, selecting a detail address bumps
//! the timeline counter.

use wow_portfolio_models::Bbl;

use crate::event::{Command, Event, Input, SearchOutcome, Settled};
use crate::state::{Region, SearchRequest, WowState};
use crate::{FetchError, MachineError, SummarySource};

/// Sequence counters and settings for one machine instance.
#[derive(Debug, Clone, Default)]
pub struct Machine {
    summary_source: SummarySource,
    search_seq: u64,
    timeline_seq: u64,
    summary_seq: u64,
}

impl Machine {
    /// Creates a machine that loads summaries from `summary_source`.
    #[must_use]
    pub const fn new(summary_source: SummarySource) -> Self {
        Self {
            summary_source,
            search_seq: 0,
            timeline_seq: 0,
            summary_seq: 0,
        }
    }

    /// Applies one input.
    ///
    /// Events that mean nothing in the current state are ignored, as are
    /// completions of superseded commands.
    ///
    /// # Errors
    ///
    /// * [`MachineError::DetailAddrNotInPortfolio`] if a detail address
    ///   outside the portfolio is selected; state is left unchanged
    /// * [`MachineError::Contract`] if a search settles with a portfolio
    ///   that lacks the searched parcel; state is left unchanged
    pub fn apply(
        &mut self,
        state: &mut WowState,
        input: Input,
    ) -> Result<Vec<Command>, MachineError> {
        match input {
            Input::Event(event) => self.on_event(state, event),
            Input::Settled(settled) => self.on_settled(state, settled),
        }
    }

    fn on_event(
        &mut self,
        state: &mut WowState,
        event: Event,
    ) -> Result<Vec<Command>, MachineError> {
        match event {
            Event::Search(params) => {
                if !params.is_searchable() {
                    log::debug!("Ignoring search without borough or street: {params:?}");
                    return Ok(Vec::new());
                }
                Ok(self.start_search(state, SearchRequest::Address(params)))
            }
            Event::SearchBbl(bbl) => Ok(self.start_search(state, SearchRequest::Bbl(bbl))),
            Event::SelectDetailAddr(bbl) => self.select_detail_addr(state, &bbl),
            Event::ViewTimeline => Ok(self.view_timeline(state)),
            Event::ViewSummary => Ok(self.view_summary(state)),
        }
    }

    fn start_search(&mut self, state: &mut WowState, request: SearchRequest) -> Vec<Command> {
        if let WowState::SearchInProgress { search } = state
            && *search == request
        {
            log::debug!("Search already in progress: {request:?}");
            return Vec::new();
        }

        self.search_seq += 1;
        self.timeline_seq += 1;
        self.summary_seq += 1;

        log::debug!("{} -> searchInProgress ({request:?})", state.tag());
        *state = WowState::SearchInProgress {
            search: request.clone(),
        };

        vec![Command::Search {
            seq: self.search_seq,
            request,
        }]
    }

    fn select_detail_addr(
        &mut self,
        state: &mut WowState,
        bbl: &Bbl,
    ) -> Result<Vec<Command>, MachineError> {
        let WowState::PortfolioFound {
            portfolio, timeline, ..
        } = state
        else {
            log::debug!("Ignoring detail address selection in {}", state.tag());
            return Ok(Vec::new());
        };

        if portfolio.detail_addr().bbl == *bbl {
            log::debug!("{bbl} is already the detail address");
            return Ok(Vec::new());
        }

        portfolio
            .select_detail_addr(bbl)
            .map_err(|_| MachineError::DetailAddrNotInPortfolio { bbl: bbl.clone() })?;

        self.timeline_seq += 1;
        *timeline = Region::NoData;
        log::debug!("Detail address is now {bbl}; timeline reset");
        Ok(Vec::new())
    }

    fn view_timeline(&mut self, state: &mut WowState) -> Vec<Command> {
        let WowState::PortfolioFound {
            portfolio, timeline, ..
        } = state
        else {
            log::debug!("Ignoring timeline request in {}", state.tag());
            return Vec::new();
        };

        self.timeline_seq += 1;
        *timeline = Region::Pending;

        vec![Command::FetchTimeline {
            seq: self.timeline_seq,
            bbl: portfolio.detail_addr().bbl.clone(),
        }]
    }

    fn view_summary(&mut self, state: &mut WowState) -> Vec<Command> {
        let WowState::PortfolioFound {
            portfolio, summary, ..
        } = state
        else {
            log::debug!("Ignoring summary request in {}", state.tag());
            return Vec::new();
        };

        self.summary_seq += 1;
        *summary = Region::Pending;

        let seq = self.summary_seq;
        let bbl = portfolio.detail_addr().bbl.clone();
        let command = match self.summary_source {
            SummarySource::Backend => Command::FetchSummary { seq, bbl },
            SummarySource::Portfolio => Command::ComputeSummary {
                seq,
                bbl,
                addrs: portfolio.assoc_addrs().to_vec(),
            },
        };
        vec![command]
    }

    fn on_settled(
        &mut self,
        state: &mut WowState,
        settled: Settled,
    ) -> Result<Vec<Command>, MachineError> {
        match settled {
            Settled::Search { seq, result } => self.search_settled(state, seq, result),
            Settled::Timeline { seq, result } => {
                if seq != self.timeline_seq {
                    log::debug!("Discarding stale timeline #{seq} (latest #{})", self.timeline_seq);
                    return Ok(Vec::new());
                }
                let WowState::PortfolioFound { timeline, .. } = state else {
                    return Ok(Vec::new());
                };
                Ok(settle_region(timeline, "timeline", result))
            }
            Settled::Summary { seq, result } => {
                if seq != self.summary_seq {
                    log::debug!("Discarding stale summary #{seq} (latest #{})", self.summary_seq);
                    return Ok(Vec::new());
                }
                let WowState::PortfolioFound { summary, .. } = state else {
                    return Ok(Vec::new());
                };
                Ok(settle_region(summary, "summary", result))
            }
        }
    }

    fn search_settled(
        &self,
        state: &mut WowState,
        seq: u64,
        result: Result<SearchOutcome, FetchError>,
    ) -> Result<Vec<Command>, MachineError> {
        if seq != self.search_seq {
            log::debug!("Discarding stale search #{seq} (latest #{})", self.search_seq);
            return Ok(Vec::new());
        }
        let WowState::SearchInProgress { search } = state else {
            return Ok(Vec::new());
        };
        let search = search.clone();

        let (next, commands) = match result {
            Ok(SearchOutcome::NotFound) => (WowState::BblNotFound { search }, Vec::new()),
            Ok(SearchOutcome::Unregistered { bbl, building_info }) => (
                WowState::UnregisteredFound {
                    search,
                    bbl,
                    building_info,
                },
                Vec::new(),
            ),
            Ok(SearchOutcome::Nycha {
                bbl,
                building_info,
                nycha,
            }) => (
                WowState::NychaFound {
                    search,
                    bbl,
                    building_info,
                    nycha,
                },
                Vec::new(),
            ),
            Ok(SearchOutcome::Portfolio { bbl, portfolio }) => {
                log::info!("Found portfolio of {} buildings for {bbl}", portfolio.len());
                (
                    WowState::PortfolioFound {
                        search,
                        bbl,
                        portfolio,
                        timeline: Region::NoData,
                        summary: Region::NoData,
                    },
                    Vec::new(),
                )
            }
            Err(FetchError::Contract(e)) => return Err(MachineError::Contract(e)),
            Err(e) => (
                WowState::NetworkErrorOccurred {
                    search,
                    message: e.to_string(),
                },
                vec![Command::Report(e)],
            ),
        };

        log::debug!("{} -> {}", state.tag(), next.tag());
        *state = next;
        Ok(commands)
    }
}

fn settle_region<T>(
    region: &mut Region<T>,
    name: &str,
    result: Result<T, FetchError>,
) -> Vec<Command> {
    match result {
        Ok(data) => {
            log::debug!("{name}: pending -> success");
            *region = Region::Success(data);
            Vec::new()
        }
        Err(e) => {
            log::debug!("{name}: pending -> error");
            *region = Region::Error {
                message: e.to_string(),
            };
            vec![Command::Report(e)]
        }
    }
}
