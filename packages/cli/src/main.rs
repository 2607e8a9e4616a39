#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Look up who owns a NYC building and what else they own.
//!
//! ```text
//! wow search --house-number 150 --street "court st" --borough brooklyn \
//!     [--timeline] [--summary] [--detail <BBL>]
//! wow search --street "150 court st" --borough brooklyn
//! wow bbl 3012380016 [--timeline] [--summary] [--detail <BBL>]
//! wow nycha 2037250001
//! ```
//!
//! `search` and `bbl` drive the portfolio machine until it settles and
//! print the final state as JSON. Logging goes through `RUST_LOG`.

mod config;
mod progress;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use config::{Config, GeocoderProvider};
use wow_api_client::ApiClient;
use wow_geocoder::AddressResolver;
use wow_geocoder::address::{normalize_street, split_house_number};
use wow_geocoder::geosearch::GeoSearchResolver;
use wow_nycha::NychaTable;
use wow_portfolio_models::{Bbl, Borough, SearchAddressParams};
use wow_state_machine::{
    Event, LogReporter, MachineError, PortfolioMachine, Region, Services, WowState,
};

#[derive(Parser)]
#[command(name = "wow", about = "Find a NYC landlord's portfolio")]
struct Cli {
    /// Config file replacing the built-in defaults
    #[arg(long, global = true, env = "WOW_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search by street address
    Search {
        /// House number. Taken from the start of --street when omitted
        #[arg(long)]
        house_number: Option<String>,
        /// Street name, e.g. "court st"
        #[arg(long)]
        street: String,
        /// MANHATTAN, BRONX, BROOKLYN, QUEENS or "STATEN ISLAND"
        #[arg(long)]
        borough: Borough,
        #[command(flatten)]
        view: ViewArgs,
    },
    /// Search by borough-block-lot
    Bbl {
        /// 10-digit BBL
        bbl: Bbl,
        #[command(flatten)]
        view: ViewArgs,
    },
    /// Look up a parcel in the NYCHA development table
    Nycha {
        /// 10-digit BBL
        bbl: Bbl,
    },
}

/// What to load once a portfolio is found.
#[derive(Args, Debug, Clone, Default)]
struct ViewArgs {
    /// Load the monthly indicator timeline
    #[arg(long)]
    timeline: bool,
    /// Load the portfolio summary
    #[arg(long)]
    summary: bool,
    /// Focus the detail view on another building in the portfolio
    #[arg(long)]
    detail: Option<Bbl>,
}

impl ViewArgs {
    /// Whether `state` reflects everything that was asked for.
    fn is_done(&self, state: &WowState) -> bool {
        let Some(portfolio) = state.portfolio() else {
            return state.is_settled();
        };
        let detail_ok = self
            .detail
            .as_ref()
            .is_none_or(|bbl| portfolio.detail_addr().bbl == *bbl);
        let timeline_ok = !self.timeline || state.timeline().is_some_and(Region::is_settled);
        let summary_ok = !self.summary || state.summary().is_some_and(Region::is_settled);
        detail_ok && timeline_ok && summary_ok
    }
}

/// Builds search parameters, splitting a house number off the street
/// when none was given.
fn search_params(
    house_number: Option<&str>,
    street: &str,
    borough: Borough,
) -> Result<SearchAddressParams, String> {
    let (house_number, street) = match house_number {
        Some(number) => (number.to_string(), normalize_street(street)),
        None => split_house_number(street)
            .unwrap_or_else(|| (String::new(), normalize_street(street))),
    };
    let params = SearchAddressParams::new(&house_number, &street, Some(borough));
    if params.is_searchable() {
        Ok(params)
    } else {
        Err(format!("Nothing searchable in street '{street}'"))
    }
}

fn load_nycha(config: &Config) -> Result<NychaTable, wow_nycha::NychaError> {
    config
        .nycha
        .data_path
        .as_deref()
        .map_or_else(|| Ok(NychaTable::embedded()), NychaTable::from_path)
}

fn build_services(config: &Config) -> Result<Services, Box<dyn Error>> {
    let http = reqwest::Client::builder()
        .timeout(config.api.request_timeout())
        .build()?;
    let api = ApiClient::with_client(http.clone(), &config.api.base_url)
        .with_retry_policy(config.api.retry_policy())
        .with_portfolio_method(config.api.portfolio_method);

    let resolver: Arc<dyn AddressResolver> = match config.geocoder.provider {
        GeocoderProvider::Geosearch => {
            Arc::new(GeoSearchResolver::with_client(http, &config.geocoder.base_url))
        }
        GeocoderProvider::Backend => Arc::new(api.clone()),
    };
    log::debug!(
        "Using {} resolver, backend {} ({} portfolios)",
        resolver.id(),
        api.base_url(),
        api.portfolio_method()
    );

    Ok(Services {
        resolver,
        data_source: Arc::new(api),
        nycha: Arc::new(load_nycha(config)?),
        reporter: Arc::new(LogReporter),
    })
}

/// Runs `search` to completion, then loads whatever `view` asks for.
async fn drive(
    machine: &PortfolioMachine,
    search: Event,
    view: &ViewArgs,
) -> Result<WowState, MachineError> {
    let state = machine
        .send_and_wait(search, WowState::is_settled)
        .await?;
    log::info!("Search settled in {}", state.tag());

    if !matches!(state, WowState::PortfolioFound { .. }) {
        return Ok(state);
    }

    if let Some(bbl) = &view.detail {
        machine
            .send_applied(Event::SelectDetailAddr(bbl.clone()))
            .await?;
    }
    if view.timeline {
        machine.send_applied(Event::ViewTimeline).await?;
    }
    if view.summary {
        machine.send_applied(Event::ViewSummary).await?;
    }
    machine.wait_for(|s| view.is_done(s)).await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let multi = progress::init_logger();
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let (search, view, label) = match cli.command {
        Commands::Nycha { bbl } => {
            let table = load_nycha(&config)?;
            let Some(record) = table.lookup(&bbl) else {
                eprintln!("{bbl} is not a NYCHA parcel");
                std::process::exit(1);
            };
            let output = serde_json::json!({
                "development": record,
                "managementOffice": wow_nycha::borough_office(bbl.borough()),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }
        Commands::Search {
            house_number,
            street,
            borough,
            view,
        } => {
            let params = search_params(house_number.as_deref(), &street, borough)?;
            let label = format!("{} {}, {borough}", params.house_number, params.street_name);
            (Event::Search(params), view, label)
        }
        Commands::Bbl { bbl, view } => {
            let label = bbl.to_string();
            (Event::SearchBbl(bbl), view, label)
        }
    };

    let machine = PortfolioMachine::spawn(build_services(&config)?, config.machine_config());
    let bar = progress::spinner(&multi, &format!("Looking up {label}"));
    let result = drive(&machine, search, &view).await;
    bar.finish_and_clear();

    let state = result?;
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}
