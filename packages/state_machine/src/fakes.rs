//! Hand-written collaborators for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use wow_api_client::{ApiError, PortfolioDataSource};
use wow_geocoder::{AddressResolver, GeocodeError, Resolution};
use wow_nycha::NychaTable;
use wow_portfolio::PortfolioData;
use wow_portfolio_models::{
    AddressRecord, Bbl, Borough, BuildingInfoRecord, MonthlyTimelineData, SearchAddressParams,
    SummaryStatsRecord, TimelineIndicatorData,
};

use crate::{ErrorReporter, FetchError, Services};

pub fn bbl(s: &str) -> Bbl {
    Bbl::parse(s).unwrap()
}

/// `150 COURT ST, Brooklyn`.
pub fn court_st() -> SearchAddressParams {
    SearchAddressParams::new("150", "court st", Some(Borough::Brooklyn))
}

fn record(bbl: &str, housenumber: &str, streetname: &str, units: i64) -> AddressRecord {
    serde_json::from_value(serde_json::json!({
        "bbl": bbl,
        "boro": "BROOKLYN",
        "housenumber": housenumber,
        "streetname": streetname,
        "businessaddrs": ["12 SPENCER STREET 4 11205"],
        "ownernames": [{ "title": "HeadOfficer", "value": "MOSES GUTMAN" }],
        "totalviolations": 10,
        "openviolations": 1,
        "unitsres": units,
        "yearbuilt": 1920,
    }))
    .unwrap()
}

/// Two buildings sharing a business address.
pub fn brooklyn_records() -> Vec<AddressRecord> {
    vec![
        record("3012380016", "654", "PARK PLACE", 13),
        record("3016690036", "378", "LEWIS AVENUE", 8),
    ]
}

pub fn brooklyn_portfolio() -> PortfolioData {
    PortfolioData::new(&bbl("3012380016"), brooklyn_records()).unwrap()
}

pub fn timeline_rows() -> TimelineIndicatorData {
    vec![MonthlyTimelineData {
        month: "2019-01".to_string(),
        complaints_emergency: 1,
        complaints_nonemergency: 2,
        complaints_total: 3,
        permits_total: 0,
        viols_class_a: 1,
        viols_class_b: 0,
        viols_class_c: 0,
        viols_total: 1,
    }]
}

pub fn summary_record() -> SummaryStatsRecord {
    serde_json::from_value(serde_json::json!({
        "bldgs": 2,
        "units": 21,
        "age": 99.5,
        "topowners": ["MOSES GUTMAN"],
        "totalopenviolations": 2,
        "totalviolations": 20
    }))
    .unwrap()
}

fn building_info(bbl: &Bbl) -> BuildingInfoRecord {
    BuildingInfoRecord {
        formatted_address: format!("BUILDING {bbl}"),
        housenumber: "1000".to_string(),
        streetname: "ROSEDALE AVENUE".to_string(),
        bldgclass: Some("D3".to_string()),
        boro: bbl.borough(),
        latitude: None,
        longitude: None,
    }
}

/// A scripted resolver answer.
#[derive(Debug, Clone, Copy)]
pub enum Answer {
    Found(&'static str),
    NotFound,
    Fail(u16),
}

/// Resolver answering per street name, with an optional delay.
pub struct FakeResolver {
    default: (Answer, Duration),
    streets: HashMap<String, (Answer, Duration)>,
    addrs: Option<Vec<AddressRecord>>,
    pub calls: AtomicUsize,
}

impl FakeResolver {
    pub fn answering(answer: Answer) -> Self {
        Self {
            default: (answer, Duration::ZERO),
            streets: HashMap::new(),
            addrs: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub const fn delayed(mut self, delay: Duration) -> Self {
        self.default.1 = delay;
        self
    }

    /// Hands `addrs` back with every match, as the backend resolver does.
    pub fn with_addrs(mut self, addrs: Vec<AddressRecord>) -> Self {
        self.addrs = Some(addrs);
        self
    }

    pub fn on_street(mut self, street: &str, answer: Answer, delay: Duration) -> Self {
        self.streets
            .insert(street.to_uppercase(), (answer, delay));
        self
    }
}

#[async_trait]
impl AddressResolver for FakeResolver {
    fn id(&self) -> &'static str {
        "fake"
    }

    async fn resolve(&self, params: &SearchAddressParams) -> Result<Resolution, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (answer, delay) = self
            .streets
            .get(&params.street_name)
            .copied()
            .unwrap_or(self.default);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match answer {
            Answer::Found(b) => Ok(Resolution::Found(bbl(b))),
            Answer::NotFound => Ok(Resolution::NotFound),
            Answer::Fail(status) => Err(GeocodeError::Status { status }),
        }
    }

    async fn resolve_with_addrs(
        &self,
        params: &SearchAddressParams,
    ) -> Result<(Resolution, Option<Vec<AddressRecord>>), GeocodeError> {
        let resolution = self.resolve(params).await?;
        let addrs = match resolution {
            Resolution::Found(_) => self.addrs.clone(),
            Resolution::NotFound => None,
        };
        Ok((resolution, addrs))
    }
}

/// Backend with canned portfolios. Parcels without one are unregistered.
#[derive(Default)]
pub struct FakeDataSource {
    portfolios: HashMap<Bbl, Vec<AddressRecord>>,
    timeline_fails: bool,
    summary_fails: bool,
    delay: Duration,
    pub lookup_calls: AtomicUsize,
    pub timeline_calls: AtomicUsize,
    pub summary_calls: AtomicUsize,
}

impl FakeDataSource {
    /// Both Brooklyn buildings resolve to the shared portfolio.
    pub fn brooklyn() -> Self {
        Self::default()
            .with_portfolio("3012380016", brooklyn_records())
            .with_portfolio("3016690036", brooklyn_records())
    }

    pub fn with_portfolio(mut self, key: &str, addrs: Vec<AddressRecord>) -> Self {
        self.portfolios.insert(bbl(key), addrs);
        self
    }

    /// Registers the Brooklyn pair under a parcel that is not in it.
    pub fn with_portfolio_for(self, key: &str) -> Self {
        self.with_portfolio(key, brooklyn_records())
    }

    pub const fn failing_timeline(mut self) -> Self {
        self.timeline_fails = true;
        self
    }

    pub const fn failing_summary(mut self) -> Self {
        self.summary_fails = true;
        self
    }

    pub const fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

fn server_error() -> ApiError {
    ApiError::Status {
        status: 500,
        url: "http://localhost/api".to_string(),
    }
}

#[async_trait]
impl PortfolioDataSource for FakeDataSource {
    async fn lookup_by_bbl(&self, bbl: &Bbl) -> Result<Vec<AddressRecord>, ApiError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Ok(self.portfolios.get(bbl).cloned().unwrap_or_default())
    }

    async fn get_building_info(&self, bbl: &Bbl) -> Result<Option<BuildingInfoRecord>, ApiError> {
        self.pause().await;
        Ok(Some(building_info(bbl)))
    }

    async fn get_summary(&self, _bbl: &Bbl) -> Result<SummaryStatsRecord, ApiError> {
        self.summary_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.summary_fails {
            return Err(server_error());
        }
        Ok(summary_record())
    }

    async fn get_timeline(&self, _bbl: &Bbl) -> Result<TimelineIndicatorData, ApiError> {
        self.timeline_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.timeline_fails {
            return Err(server_error());
        }
        Ok(timeline_rows())
    }
}

/// Collects reported failures.
#[derive(Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn reports(&self) -> Vec<String> {
        self.reports.lock().unwrap().clone()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, error: &FetchError) {
        self.reports.lock().unwrap().push(error.to_string());
    }
}

pub fn services_with_reporter(
    resolver: FakeResolver,
    data_source: FakeDataSource,
) -> (Services, Arc<RecordingReporter>) {
    let reporter = Arc::new(RecordingReporter::default());
    let services = Services {
        resolver: Arc::new(resolver),
        data_source: Arc::new(data_source),
        nycha: Arc::new(NychaTable::embedded()),
        reporter: reporter.clone(),
    };
    (services, reporter)
}

pub fn services(resolver: FakeResolver, data_source: FakeDataSource) -> Services {
    services_with_reporter(resolver, data_source).0
}

/// A loopback HTTP backend answering each path with canned JSON and
/// recording the paths it was asked for. Unknown paths get a 404.
pub struct FakeBackend {
    pub base_url: String,
    paths: Arc<Mutex<Vec<String>>>,
}

impl FakeBackend {
    pub async fn start(routes: Vec<(&'static str, Value)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let paths = Arc::new(Mutex::new(Vec::new()));
        let routes: HashMap<&'static str, Value> = routes.into_iter().collect();

        let seen = paths.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                Self::answer(socket, &routes, &seen).await;
            }
        });

        Self { base_url, paths }
    }

    async fn answer(
        mut socket: TcpStream,
        routes: &HashMap<&'static str, Value>,
        seen: &Mutex<Vec<String>>,
    ) {
        let mut request = Vec::new();
        let mut chunk = [0_u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            match socket.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => request.extend_from_slice(&chunk[..n]),
            }
        }

        let request = String::from_utf8_lossy(&request);
        let target = request.split_whitespace().nth(1).unwrap_or("/");
        let path = target.split('?').next().unwrap_or(target).to_string();
        let (status, body) = routes.get(path.as_str()).map_or_else(
            || ("404 Not Found", "{}".to_string()),
            |body| ("200 OK", body.to_string()),
        );
        seen.lock().unwrap().push(path);

        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
    }

    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }
}
