//! NSRDB PSM3 typical-year provider.
//!
//! Credentialed: an API key plus requester identity (full name, email,
//! affiliation) go into the query string and are mandatory before any
//! request is attempted. Responds with CSV: two metadata records, then a
//! header row with the timestamp split over Year/Month/Day/Hour(/Minute)
//! columns.

use async_trait::async_trait;
use reqwest::Client;

use crate::config::ProviderConfig;
use crate::error::PipelineError;
use crate::model::{Location, StudyWindow};
use crate::provider::{MeteoProvider, ProviderId, collect_channels, truncate_body};
use crate::series::MeteoSeries;
use crate::table::{RawTable, TimestampStrategy, detect_timestamps};

const BASE_URL: &str = "https://developer.nrel.gov/api/nsrdb/v2/solar/psm3-tmy-download.csv";
const AVAILABILITY_URL: &str = "https://developer.nrel.gov/api/nsrdb/v2/solar/psm3-tmy-available.json";

/// Metadata records before the header row.
const METADATA_ROWS: usize = 2;

const TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"];

const STRATEGIES: &[TimestampStrategy] = &[
    TimestampStrategy::ComposedParts,
    TimestampStrategy::FixedName { names: &["time", "timestamp"], formats: TIME_FORMATS },
];

/// Mandatory requester identity for the NSRDB API.
#[derive(Debug, Clone)]
pub struct NsrdbCredentials {
    pub api_key: String,
    pub full_name: String,
    pub email: String,
    pub affiliation: String,
}

impl NsrdbCredentials {
    /// Build from stored provider config; any missing field is a hard input
    /// error, reported before a request goes out.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, PipelineError> {
        let require = |field: &Option<String>, name: &str| {
            field
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    PipelineError::invalid_input(format!(
                        "NSRDB requires {name}.\nHint: run `facadepv configure nsrdb`."
                    ))
                })
        };

        if config.api_key.trim().is_empty() {
            return Err(PipelineError::invalid_input(
                "NSRDB requires an API key.\nHint: run `facadepv configure nsrdb`.",
            ));
        }

        Ok(Self {
            api_key: config.api_key.clone(),
            full_name: require(&config.full_name, "the requester's full name")?,
            email: require(&config.email, "the requester's email")?,
            affiliation: require(&config.affiliation, "the requester's affiliation")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NsrdbProvider {
    http: Client,
    credentials: NsrdbCredentials,
}

impl NsrdbProvider {
    pub fn new(credentials: NsrdbCredentials) -> Self {
        Self { http: Client::new(), credentials }
    }

    /// Parse a PSM3 CSV body into a normalized series.
    pub fn parse_body(body: &str) -> Result<MeteoSeries, PipelineError> {
        let table = RawTable::from_csv(body, METADATA_ROWS)?;
        let (timestamps, kept_rows) = detect_timestamps(&table, STRATEGIES)?;
        let channels = collect_channels(&table, &kept_rows)?;
        MeteoSeries::new(timestamps, channels)
    }

    /// Query the availability-check endpoint, which returns a JSON boolean.
    pub async fn check_availability(&self, location: &Location) -> Result<bool, PipelineError> {
        let wkt = point_wkt(location);
        let res = self
            .http
            .get(AVAILABILITY_URL)
            .query(&[
                ("api_key", self.credentials.api_key.as_str()),
                ("wkt", wkt.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PipelineError::Fetch {
                provider: "NSRDB",
                detail: format!("availability check failed: {e}"),
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| PipelineError::Fetch {
            provider: "NSRDB",
            detail: format!("failed to read availability response: {e}"),
        })?;

        if !status.is_success() {
            return Err(PipelineError::Fetch {
                provider: "NSRDB",
                detail: format!("availability check status {status}: {}", truncate_body(&body)),
            });
        }

        serde_json::from_str::<bool>(body.trim())
            .map_err(|_| PipelineError::parse(format!("expected a JSON boolean, got: {}", truncate_body(&body))))
    }
}

fn point_wkt(location: &Location) -> String {
    format!("POINT({} {})", location.longitude, location.latitude)
}

#[async_trait]
impl MeteoProvider for NsrdbProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Nsrdb
    }

    async fn fetch(
        &self,
        location: &Location,
        _window: &StudyWindow,
    ) -> Result<MeteoSeries, PipelineError> {
        let wkt = point_wkt(location);
        let res = self
            .http
            .get(BASE_URL)
            .query(&[
                ("api_key", self.credentials.api_key.as_str()),
                ("wkt", wkt.as_str()),
                ("names", "tmy"),
                ("full_name", self.credentials.full_name.as_str()),
                ("email", self.credentials.email.as_str()),
                ("affiliation", self.credentials.affiliation.as_str()),
                ("utc", "true"),
            ])
            .send()
            .await
            .map_err(|e| PipelineError::Fetch {
                provider: "NSRDB",
                detail: format!("failed to send request: {e}"),
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| PipelineError::Fetch {
            provider: "NSRDB",
            detail: format!("failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            return Err(PipelineError::Fetch {
                provider: "NSRDB",
                detail: format!("status {status}: {}", truncate_body(&body)),
            });
        }

        Self::parse_body(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Channel;
    use chrono::{TimeZone, Utc};

    fn full_config() -> ProviderConfig {
        ProviderConfig {
            api_key: "KEY".into(),
            full_name: Some("Jane Roe".into()),
            email: Some("jane@example.com".into()),
            affiliation: Some("Example Labs".into()),
        }
    }

    #[test]
    fn credentials_require_every_identity_field() {
        assert!(NsrdbCredentials::from_config(&full_config()).is_ok());

        let mut missing_email = full_config();
        missing_email.email = None;
        let err = NsrdbCredentials::from_config(&missing_email).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
        assert!(err.to_string().contains("email"));

        let mut blank_key = full_config();
        blank_key.api_key = "  ".into();
        assert!(NsrdbCredentials::from_config(&blank_key).is_err());
    }

    #[test]
    fn parses_canned_psm3_body() {
        let body = "Source,Location ID,City\nNSRDB,12345,-\n\
                    Year,Month,Day,Hour,Minute,GHI,DNI,DHI,Temperature,Wind Speed\n\
                    2020,6,1,0,30,0,0,0,18.0,2.0\n\
                    2020,6,1,1,30,15,5,10,17.5,2.2\n";
        let series = NsrdbProvider::parse_body(body).unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(
            series.timestamps()[0],
            Utc.with_ymd_and_hms(2020, 6, 1, 0, 30, 0).unwrap()
        );
        assert_eq!(series.channel(Channel::Ghi).unwrap(), &[0.0, 15.0]);
        assert_eq!(series.channel(Channel::Dni).unwrap(), &[0.0, 5.0]);
        assert_eq!(series.channel(Channel::TempAir).unwrap(), &[18.0, 17.5]);
    }

    #[test]
    fn missing_timestamp_columns_fail_descriptively() {
        let body = "a,b\nc,d\nfoo,bar\n1,2\n";
        let err = NsrdbProvider::parse_body(body).unwrap_err();
        assert!(err.to_string().contains("Year/Month/Day/Hour"));
    }

    #[test]
    fn point_wkt_is_lon_lat() {
        let loc = Location::new(39.7, -105.2).unwrap();
        assert_eq!(point_wkt(&loc), "POINT(-105.2 39.7)");
    }
}
