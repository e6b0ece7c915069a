use anyhow::{Context, anyhow, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use inquire::Text;

use facadepv_core::pipeline::{self, EstimateRequest};
use facadepv_core::provider::{default_provider_from_config, provider_from_config};
use facadepv_core::pv::{inverter_catalog, module_catalog};
use facadepv_core::{
    AggregationMode, Channel, Config, FacadeConfig, Location, ProviderConfig, ProviderId,
    StudyWindow,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "facadepv", version, about = "Facade PV energy estimator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Mode {
    /// Sum POA irradiance, apply area and losses.
    Simplified,
    /// Cell temperature, DC and AC models through catalog records.
    PowerChain,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "pvgis" or "nsrdb".
        provider: String,
    },

    /// Estimate energy generated by a vertical facade over a study window.
    Estimate {
        /// Facade latitude in degrees, -90..90.
        #[arg(long)]
        lat: f64,

        /// Facade longitude in degrees, -180..180.
        #[arg(long)]
        lon: f64,

        /// Study start date, YYYY-MM-DD.
        #[arg(long)]
        start: String,

        /// Study end date, YYYY-MM-DD; must be after the start.
        #[arg(long)]
        end: String,

        /// Facade azimuth: compass bearing it faces, degrees, 0..360.
        #[arg(long)]
        azimuth: f64,

        /// Facade area in square metres.
        #[arg(long)]
        area: f64,

        /// System losses in percent, 0..100.
        #[arg(long, default_value_t = 14.0)]
        loss: f64,

        /// Provider to fetch from; defaults to the configured default.
        #[arg(long)]
        provider: Option<String>,

        /// Aggregation mode.
        #[arg(long, value_enum, default_value_t = Mode::Simplified)]
        mode: Mode,

        /// Module catalog entry (power-chain mode).
        #[arg(long)]
        module: Option<String>,

        /// Inverter catalog entry (power-chain mode).
        #[arg(long)]
        inverter: Option<String>,
    },

    /// List the built-in module and inverter catalogs.
    Catalog,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider),
            Command::Estimate {
                lat,
                lon,
                start,
                end,
                azimuth,
                area,
                loss,
                provider,
                mode,
                module,
                inverter,
            } => {
                let request = build_request(
                    lat, lon, &start, &end, azimuth, area, loss, mode, module, inverter,
                )?;
                estimate(&request, provider.as_deref()).await
            }
            Command::Catalog => {
                print_catalog();
                Ok(())
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn build_request(
    lat: f64,
    lon: f64,
    start: &str,
    end: &str,
    azimuth: f64,
    area: f64,
    loss: f64,
    mode: Mode,
    module: Option<String>,
    inverter: Option<String>,
) -> anyhow::Result<EstimateRequest> {
    let start = NaiveDate::parse_from_str(start, "%Y-%m-%d")
        .with_context(|| format!("Invalid start date '{start}', expected YYYY-MM-DD"))?;
    let end = NaiveDate::parse_from_str(end, "%Y-%m-%d")
        .with_context(|| format!("Invalid end date '{end}', expected YYYY-MM-DD"))?;

    let mode = match mode {
        Mode::Simplified => AggregationMode::Simplified,
        Mode::PowerChain => {
            let module = module
                .ok_or_else(|| anyhow!("--module is required in power-chain mode"))?;
            let inverter = inverter
                .ok_or_else(|| anyhow!("--inverter is required in power-chain mode"))?;
            AggregationMode::PowerChain { module, inverter }
        }
    };

    Ok(EstimateRequest {
        location: Location::new(lat, lon)?,
        window: StudyWindow::new(start, end)?,
        facade: FacadeConfig::new(azimuth, area, loss)?,
        mode,
    })
}

async fn estimate(request: &EstimateRequest, provider: Option<&str>) -> anyhow::Result<()> {
    let config = Config::load()?;
    let provider = match provider {
        Some(name) => provider_from_config(ProviderId::try_from(name)?, &config)?,
        None => default_provider_from_config(&config)?,
    };

    // Pairing problems should surface before the fetch.
    if let AggregationMode::PowerChain { module, inverter } = &request.mode {
        let module = facadepv_core::pv::find_module(module)?;
        let inverter = facadepv_core::pv::find_inverter(inverter)?;
        facadepv_core::pv::check_compatibility(module, inverter)?;
    }

    println!("Fetching meteorological data from {}...", provider.id());
    let data = pipeline::acquire_and_align(provider.as_ref(), request).await?;

    print_preview(&data);

    let estimate = pipeline::aggregate(&data, request)?;
    for warning in &estimate.warnings {
        println!("warning: {warning}");
    }
    println!();
    println!("Estimated facade output: {:.2} kWh", estimate.energy_kwh);

    Ok(())
}

/// Head of the aligned table plus the derived POA series.
fn print_preview(data: &pipeline::AlignedData) {
    const PREVIEW_ROWS: usize = 5;

    let channels: Vec<Channel> = data.series.channels().collect();

    print!("{:<18}", "time (UTC)");
    for channel in &channels {
        print!(" {:>12}", channel.label());
    }
    println!(" {:>12}", "POA [W/m2]");

    for (i, t) in data.grid.iter().take(PREVIEW_ROWS).enumerate() {
        print!("{:<18}", t.format("%Y-%m-%d %H:%M").to_string());
        for channel in &channels {
            let v = data.series.channel(*channel).map_or(f64::NAN, |col| col[i]);
            print!(" {v:>12.1}");
        }
        println!(" {:>12.1}", data.poa[i]);
    }
    if data.grid.len() > PREVIEW_ROWS {
        println!("... {} rows total", data.grid.len());
    }
}

fn print_catalog() {
    println!("Modules:");
    for module in module_catalog() {
        println!(
            "  {:<28} {:>6.0} W  Vmp {:>5.1} V  Imp {:>5.2} A",
            module.name, module.pdc0_w, module.vmp_v, module.imp_a
        );
    }
    println!();
    println!("Inverters:");
    for inverter in inverter_catalog() {
        println!(
            "  {:<28} {:>6.0} W AC  Vac {:>5.0} V  Pdco {:>6.0} W  Idco {:>5.1} A",
            inverter.name, inverter.paco_w, inverter.vac_v, inverter.pdco_w, inverter.idco_a
        );
    }
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load()?;

    match id {
        ProviderId::Pvgis => {
            // PVGIS is an open API; configuring it just stores the default.
            config.upsert_provider(id, ProviderConfig::default());
            println!("PVGIS needs no credentials.");
        }
        ProviderId::Nsrdb => {
            let api_key = Text::new("NSRDB API key:").prompt()?;
            let full_name = Text::new("Your full name:").prompt()?;
            let email = Text::new("Your email:").prompt()?;
            let affiliation = Text::new("Your affiliation:").prompt()?;

            if api_key.trim().is_empty() {
                bail!("An API key is required for NSRDB");
            }

            config.upsert_provider(
                id,
                ProviderConfig {
                    api_key,
                    full_name: Some(full_name),
                    email: Some(email),
                    affiliation: Some(affiliation),
                },
            );
        }
    }

    config.save()?;
    println!(
        "Saved configuration for '{id}' to {}",
        Config::config_file_path()?.display()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request(mode: Mode, module: Option<&str>, inverter: Option<&str>) -> anyhow::Result<EstimateRequest> {
        build_request(
            48.2,
            16.4,
            "2024-06-01",
            "2024-06-02",
            180.0,
            100.0,
            15.0,
            mode,
            module.map(str::to_string),
            inverter.map(str::to_string),
        )
    }

    #[test]
    fn builds_simplified_request() {
        let req = base_request(Mode::Simplified, None, None).unwrap();
        assert_eq!(req.mode, AggregationMode::Simplified);
        assert_eq!(req.facade.area_m2, 100.0);
    }

    #[test]
    fn reversed_dates_are_rejected_locally() {
        let err = build_request(
            48.2, 16.4, "2024-06-02", "2024-06-01", 180.0, 100.0, 15.0,
            Mode::Simplified, None, None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("not after"));
    }

    #[test]
    fn power_chain_requires_equipment_names() {
        let err = base_request(Mode::PowerChain, None, None).unwrap_err();
        assert!(err.to_string().contains("--module"));

        let req = base_request(
            Mode::PowerChain,
            Some("Canadian_Solar_CS5P_220M"),
            Some("SMA_America_SB5000US_240V"),
        )
        .unwrap();
        assert!(matches!(req.mode, AggregationMode::PowerChain { .. }));
    }

    #[test]
    fn malformed_date_is_reported() {
        let err = build_request(
            48.2, 16.4, "June 1st", "2024-06-02", 180.0, 100.0, 15.0,
            Mode::Simplified, None, None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("YYYY-MM-DD"));
    }
}
