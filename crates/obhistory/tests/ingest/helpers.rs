use async_trait::async_trait;
use mockall::mock;
use obhistory::{FetchError, ObservationService, ObservationSource, StationCode, StationFiles};
use slog::{o, Discard, Logger};
use std::sync::Arc;
use tempfile::TempDir;

mock! {
    pub Source {}
    #[async_trait]
    impl ObservationSource for Source {
        async fn fetch_page(&self, station: &StationCode) -> Result<String, FetchError>;
    }
}

pub type PageRow<'a> = (&'a str, &'a str, &'a str, &'a str, &'a str, &'a str, &'a str);

pub struct TestApp {
    pub service: ObservationService,
    // Dropping this deletes the data directory
    _data_dir: TempDir,
}

impl TestApp {
    pub fn files(&self, station: &StationCode) -> StationFiles {
        StationFiles::new(&self.service.data_dir, station)
    }
}

pub fn spawn_app(source: Arc<dyn ObservationSource>) -> TestApp {
    let data_dir = tempfile::tempdir().expect("temp data dir");
    let logger = Logger::root(Discard, o!());
    // Point at a subfolder so directory creation is exercised
    let service = ObservationService::new(logger, source, data_dir.path().join("weather_data"));
    TestApp {
        service,
        _data_dir: data_dir,
    }
}

pub fn station(code: &str) -> StationCode {
    code.parse().expect("valid station code")
}

const TABLE: &str = include_str!("../fixtures/obhistory_table.html");
const ROW: &str = include_str!("../fixtures/obhistory_row.html");

/// A page shaped like forecast.weather.gov/data/obhistory/{STATION}.html.
///
/// Rows are `(day, time, wind, air, dwpt, humidity, precip_1h)`, newest first
/// as the site publishes them.
pub fn obhistory_page(zone: &str, rows: &[PageRow<'_>]) -> String {
    let body: String = rows
        .iter()
        .map(|(day, time, wind, air, dwpt, rh, p1)| {
            ROW.replace("{day}", day)
                .replace("{time}", time)
                .replace("{wind}", wind)
                .replace("{air}", air)
                .replace("{dwpt}", dwpt)
                .replace("{rh}", rh)
                .replace("{p1}", p1)
        })
        .collect();
    let table = TABLE.replace("{zone}", zone).replace("{body}", &body);
    // Nested in a layout table, as page chrome often is
    format!(
        "<html><body><table><tr><td>National Weather Service</td><td>{}</td></tr></table></body></html>",
        table
    )
}
