use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::PipelineError;
use crate::model::{Location, StudyWindow};
use crate::provider::nsrdb::{NsrdbCredentials, NsrdbProvider};
use crate::provider::pvgis::PvgisProvider;
use crate::series::{Channel, MeteoSeries};
use crate::table::{RawTable, candidates};

pub mod nsrdb;
pub mod pvgis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    Pvgis,
    Nsrdb,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Pvgis => "pvgis",
            ProviderId::Nsrdb => "nsrdb",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::Pvgis, ProviderId::Nsrdb]
    }

    /// Whether the provider needs an API key and requester identity.
    pub fn requires_credentials(&self) -> bool {
        matches!(self, ProviderId::Nsrdb)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = PipelineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "pvgis" => Ok(ProviderId::Pvgis),
            "nsrdb" => Ok(ProviderId::Nsrdb),
            _ => Err(PipelineError::invalid_input(format!(
                "Unknown provider '{value}'. Supported providers: pvgis, nsrdb."
            ))),
        }
    }
}

/// A source of meteorological time-series for a location and study window.
#[async_trait]
pub trait MeteoProvider: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    async fn fetch(
        &self,
        location: &Location,
        window: &StudyWindow,
    ) -> Result<MeteoSeries, PipelineError>;

    /// Provider-specific notes on how the requested window will be served,
    /// e.g. when it falls outside the archive the provider covers.
    fn window_warnings(&self, _window: &StudyWindow) -> Vec<String> {
        Vec::new()
    }
}

/// Construct a provider from config and explicit ProviderId.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
) -> Result<Box<dyn MeteoProvider>, PipelineError> {
    match id {
        ProviderId::Pvgis => Ok(Box::new(PvgisProvider::new())),
        ProviderId::Nsrdb => {
            let stored = config.provider_config(id).ok_or_else(|| {
                PipelineError::invalid_input(
                    "NSRDB requires an API key and requester identity.\n\
                     Hint: run `facadepv configure nsrdb` first.",
                )
            })?;
            let credentials = NsrdbCredentials::from_config(stored)?;
            Ok(Box::new(NsrdbProvider::new(credentials)))
        }
    }
}

/// Construct the default provider from config, using the `default_provider`
/// field.
pub fn default_provider_from_config(
    config: &Config,
) -> Result<Box<dyn MeteoProvider>, PipelineError> {
    let id = config.default_provider_id()?;
    provider_from_config(id, config)
}

/// Pull every recognized physical-quantity column out of a raw table,
/// keeping only the rows whose timestamp parsed.
///
/// At least one irradiance column must be present; which ones the pipeline
/// actually needs is checked downstream.
pub(crate) fn collect_channels(
    table: &RawTable,
    kept_rows: &[usize],
) -> Result<BTreeMap<Channel, Vec<f64>>, PipelineError> {
    const QUANTITIES: &[(Channel, &[&str])] = &[
        (Channel::Dni, candidates::DNI),
        (Channel::Ghi, candidates::GHI),
        (Channel::Dhi, candidates::DHI),
        (Channel::PoaGlobal, candidates::POA),
        (Channel::TempAir, candidates::TEMP_AIR),
        (Channel::WindSpeed, candidates::WIND_SPEED),
    ];

    let mut channels = BTreeMap::new();
    for &(channel, names) in QUANTITIES {
        if let Some(col) = table.find_column(names) {
            let full = table.numeric_column(col);
            let values = kept_rows.iter().map(|&row| full[row]).collect();
            channels.insert(channel, values);
        }
    }

    if !channels.keys().any(Channel::is_irradiance) {
        return Err(PipelineError::parse(format!(
            "no irradiance column found; tried {}, {}, {}, {}",
            candidates::POA.join("/"),
            candidates::GHI.join("/"),
            candidates::DNI.join("/"),
            candidates::DHI.join("/"),
        )));
    }

    Ok(channels)
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }
    // Back off to a char boundary; bodies are arbitrary text.
    let mut cut = MAX;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &body[..cut])
}
