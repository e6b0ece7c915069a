//! PVGIS hourly time-series provider (`seriescalc` endpoint).
//!
//! No credentials needed. Responds with CSV: a fixed metadata prelude, then
//! a header row with a named `time` column in `YYYYMMDD:HHMM` format, then
//! data rows, then trailing explanatory lines that do not parse as rows and
//! are dropped.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::PipelineError;
use crate::model::{Location, StudyWindow};
use crate::provider::{MeteoProvider, ProviderId, collect_channels, truncate_body};
use crate::series::MeteoSeries;
use crate::table::{RawTable, TimestampStrategy, detect_timestamps};

const BASE_URL: &str = "https://re.jrc.ec.europa.eu/api/v5_2/seriescalc";

/// Years the SARAH2 radiation database covers; requests are clamped here.
const FIRST_YEAR: i32 = 2005;
const LAST_YEAR: i32 = 2020;

/// Metadata records before the header row in the CSV output.
const METADATA_ROWS: usize = 10;

const TIME_FORMATS: &[&str] =
    &["%Y%m%d:%H%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

const STRATEGIES: &[TimestampStrategy] = &[
    TimestampStrategy::FixedName { names: &["time", "time(UTC)", "Time"], formats: TIME_FORMATS },
    TimestampStrategy::FirstColumn { formats: TIME_FORMATS },
];

#[derive(Debug, Clone, Default)]
pub struct PvgisProvider {
    http: Client,
}

impl PvgisProvider {
    pub fn new() -> Self {
        Self { http: Client::new() }
    }

    /// Parse a seriescalc CSV body into a normalized series.
    pub fn parse_body(body: &str) -> Result<MeteoSeries, PipelineError> {
        let table = RawTable::from_csv(body, METADATA_ROWS)?;
        let (timestamps, kept_rows) = detect_timestamps(&table, STRATEGIES)?;
        let channels = collect_channels(&table, &kept_rows)?;
        MeteoSeries::new(timestamps, channels)
    }
}

#[async_trait]
impl MeteoProvider for PvgisProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Pvgis
    }

    fn window_warnings(&self, window: &StudyWindow) -> Vec<String> {
        let start_year = window.start_year().clamp(FIRST_YEAR, LAST_YEAR);
        let end_year = window.end_year().clamp(FIRST_YEAR, LAST_YEAR);
        if (start_year, end_year) == (window.start_year(), window.end_year()) {
            return Vec::new();
        }
        vec![format!(
            "PVGIS radiation data covers {FIRST_YEAR}-{LAST_YEAR}; \
             requested years {}-{} are served as {start_year}-{end_year}",
            window.start_year(),
            window.end_year(),
        )]
    }

    async fn fetch(
        &self,
        location: &Location,
        window: &StudyWindow,
    ) -> Result<MeteoSeries, PipelineError> {
        let start_year = window.start_year().clamp(FIRST_YEAR, LAST_YEAR);
        let end_year = window.end_year().clamp(FIRST_YEAR, LAST_YEAR);

        let res = self
            .http
            .get(BASE_URL)
            .query(&[
                ("lat", location.latitude.to_string()),
                ("lon", location.longitude.to_string()),
                ("startyear", start_year.to_string()),
                ("endyear", end_year.to_string()),
                ("components", "1".to_string()),
                ("outputformat", "csv".to_string()),
            ])
            .send()
            .await
            .map_err(|e| PipelineError::Fetch {
                provider: "PVGIS",
                detail: format!("failed to send request: {e}"),
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| PipelineError::Fetch {
            provider: "PVGIS",
            detail: format!("failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            return Err(PipelineError::Fetch {
                provider: "PVGIS",
                detail: format!("status {status}: {}", truncate_body(&body)),
            });
        }

        Self::parse_body(&body)
    }
}
