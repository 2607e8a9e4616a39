//! Runs the machine on tokio.
//!
//! One task owns the state. User events and command completions arrive
//! on two channels and are applied one at a time, so the state is never
//! mutated concurrently. Each command runs in its own task and reports
//! back as a [`Settled`] input. Every new state is published on a
//! [`watch`] channel; observers read snapshots and never mutate.
//!
//! A published snapshot can predate an event that was just sent. Use
//! [`PortfolioMachine::send_and_wait`] to observe the state an event
//! leads to, rather than [`PortfolioMachine::wait_for`] alone.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use wow_portfolio::PortfolioError;
use wow_portfolio::summary::calculate_summary_now;

use crate::event::{Command, Event, Input, Settled};
use crate::machine::Machine;
use crate::search::{self, with_timeout};
use crate::state::WowState;
use crate::{FetchError, MachineConfig, MachineError, Services};

/// Handle to a running portfolio machine.
///
/// Cloning the handle shares the machine. The machine stops once every
/// handle is dropped.
#[derive(Debug, Clone)]
pub struct PortfolioMachine {
    events: mpsc::UnboundedSender<Envelope>,
    state: watch::Receiver<WowState>,
}

impl PortfolioMachine {
    /// Starts a machine in [`WowState::NoData`].
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(services: Services, config: MachineConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (settled_tx, settled_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(WowState::NoData);

        let interpreter = Interpreter {
            machine: Machine::new(config.summary_source),
            state: WowState::NoData,
            services,
            timeout: config.request_timeout,
            state_tx,
            settled_tx,
        };
        tokio::spawn(interpreter.run(events_rx, settled_rx));

        Self {
            events: events_tx,
            state: state_rx,
        }
    }

    /// The latest published state.
    #[must_use]
    pub fn current_state(&self) -> WowState {
        self.state.borrow().clone()
    }

    /// A receiver that observes every published state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<WowState> {
        self.state.clone()
    }

    /// Enqueues `event`.
    ///
    /// # Errors
    ///
    /// * [`MachineError::DetailAddrNotInPortfolio`] if `event` selects a
    ///   detail address outside the current portfolio
    /// * [`MachineError::Stopped`] if the machine is no longer running
    pub fn send(&self, event: Event) -> Result<(), MachineError> {
        self.enqueue(event, None)
    }

    /// Enqueues `event` and resolves once the machine has applied it and
    /// published the resulting state.
    ///
    /// # Errors
    ///
    /// Same as [`Self::send`].
    pub async fn send_applied(&self, event: Event) -> Result<(), MachineError> {
        let (applied_tx, applied_rx) = oneshot::channel();
        self.enqueue(event, Some(applied_tx))?;
        applied_rx.await.map_err(|_| MachineError::Stopped)
    }

    /// Sends `event`, then waits for the first state at or after it that
    /// satisfies `predicate`. Snapshots published before the event was
    /// applied are never returned.
    ///
    /// # Errors
    ///
    /// Same as [`Self::send`], or [`MachineError::Stopped`] if the machine
    /// stops while waiting.
    pub async fn send_and_wait(
        &self,
        event: Event,
        predicate: impl FnMut(&WowState) -> bool,
    ) -> Result<WowState, MachineError> {
        self.send_applied(event).await?;
        self.wait_for(predicate).await
    }

    fn enqueue(
        &self,
        event: Event,
        applied: Option<oneshot::Sender<()>>,
    ) -> Result<(), MachineError> {
        if self.state.has_changed().is_err() {
            return Err(MachineError::Stopped);
        }

        if let Event::SelectDetailAddr(bbl) = &event
            && let Some(portfolio) = self.state.borrow().portfolio()
            && !portfolio.contains(bbl)
        {
            return Err(MachineError::DetailAddrNotInPortfolio { bbl: bbl.clone() });
        }

        self.events
            .send(Envelope { event, applied })
            .map_err(|_| MachineError::Stopped)
    }

    /// Waits until the published state satisfies `predicate` and returns
    /// it. Checks the current state first, which may not yet reflect
    /// events still queued; see [`Self::send_and_wait`].
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::Stopped`] if the machine stops first.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&WowState) -> bool,
    ) -> Result<WowState, MachineError> {
        let mut rx = self.state.clone();
        let state = rx
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| MachineError::Stopped)?;
        Ok(WowState::clone(&state))
    }
}

/// A queued event, with an optional signal fired once it is applied.
struct Envelope {
    event: Event,
    applied: Option<oneshot::Sender<()>>,
}

struct Interpreter {
    machine: Machine,
    state: WowState,
    services: Services,
    timeout: Duration,
    state_tx: watch::Sender<WowState>,
    settled_tx: mpsc::UnboundedSender<Settled>,
}

impl Interpreter {
    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<Envelope>,
        mut settled: mpsc::UnboundedReceiver<Settled>,
    ) {
        log::debug!("Portfolio machine started");
        loop {
            tokio::select! {
                envelope = events.recv() => {
                    let Some(Envelope { event, applied }) = envelope else {
                        break;
                    };
                    self.step(Input::Event(event));
                    if let Some(applied) = applied {
                        let _ = applied.send(());
                    }
                }
                Some(done) = settled.recv() => self.step(Input::Settled(done)),
            }
        }
        log::debug!("Portfolio machine stopped");
    }

    fn step(&mut self, input: Input) {
        match self.machine.apply(&mut self.state, input) {
            Ok(commands) => {
                self.publish();
                for command in commands {
                    self.execute(command);
                }
            }
            Err(MachineError::Contract(e)) => self.contract_violation(e),
            Err(e) => log::warn!("Rejected event: {e}"),
        }
    }

    fn publish(&self) {
        let next = &self.state;
        self.state_tx.send_if_modified(|current| {
            if current == next {
                return false;
            }
            current.clone_from(next);
            true
        });
    }

    fn execute(&self, command: Command) {
        let timeout = self.timeout;
        let tx = self.settled_tx.clone();

        match command {
            Command::Search { seq, request } => {
                let services = self.services.clone();
                tokio::spawn(async move {
                    let result = search::run(&services, timeout, &request).await;
                    let _ = tx.send(Settled::Search { seq, result });
                });
            }
            Command::FetchTimeline { seq, bbl } => {
                let data_source = self.services.data_source.clone();
                tokio::spawn(async move {
                    let result =
                        with_timeout(timeout, "get_timeline", data_source.get_timeline(&bbl)).await;
                    let _ = tx.send(Settled::Timeline { seq, result });
                });
            }
            Command::FetchSummary { seq, bbl } => {
                let data_source = self.services.data_source.clone();
                tokio::spawn(async move {
                    let result =
                        with_timeout(timeout, "get_summary", data_source.get_summary(&bbl)).await;
                    let _ = tx.send(Settled::Summary { seq, result });
                });
            }
            Command::ComputeSummary { seq, bbl, addrs } => {
                let result = calculate_summary_now(&addrs)
                    .ok_or_else(|| FetchError::Contract(PortfolioError::Empty { bbl }));
                let _ = tx.send(Settled::Summary { seq, result });
            }
            Command::Report(error) => self.services.reporter.report(&error),
        }
    }

    fn contract_violation(&self, e: PortfolioError) -> ! {
        let error = FetchError::Contract(e);
        self.services.reporter.report(&error);
        log::error!("Stopping portfolio machine: {error}");
        panic!("{error}");
    }
}
