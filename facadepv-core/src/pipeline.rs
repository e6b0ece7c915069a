//! The two-stage estimate: acquire and align a meteorological series, then
//! reduce it to a loss-adjusted energy figure under the selected aggregation
//! mode.
//!
//! Stateless; one run per user action. Every failure aborts the run, so no
//! partial energy figure ever escapes.

use chrono::{DateTime, Utc};

use crate::error::PipelineError;
use crate::model::{AggregationMode, Estimate, FacadeConfig, Location, StudyWindow};
use crate::provider::MeteoProvider;
use crate::pv::{
    ALBEDO, FACADE_TILT_DEG, ac_power, cell_temperature, check_compatibility, dc_power,
    find_inverter, find_module, poa_irradiance, solar_position,
};
use crate::series::{Channel, MeteoSeries};

/// Error margin quoted when an irradiance component is zero across the whole
/// window. Policy constant; the run proceeds.
pub const DEGENERATE_ERROR_MARGIN_PCT: f64 = 20.0;

/// Fallbacks when the provider carries no temperature or wind column.
const DEFAULT_TEMP_AIR_C: f64 = 20.0;
const DEFAULT_WIND_M_S: f64 = 1.0;

/// Everything one estimate run needs, collected up front. UI state never
/// leaks into the pipeline; this record is the whole contract.
#[derive(Debug, Clone)]
pub struct EstimateRequest {
    pub location: Location,
    pub window: StudyWindow,
    pub facade: FacadeConfig,
    pub mode: AggregationMode,
}

/// Fetched series aligned onto the study grid, with the POA series the
/// aggregation stage consumes and any warnings collected so far.
#[derive(Debug, Clone)]
pub struct AlignedData {
    pub grid: Vec<DateTime<Utc>>,
    pub series: MeteoSeries,
    pub poa: Vec<f64>,
    pub warnings: Vec<String>,
}

/// Stage one: fetch, sort, deduplicate, reindex onto the hourly grid, repair
/// gaps, and derive the plane-of-array series.
pub async fn acquire_and_align(
    provider: &dyn MeteoProvider,
    request: &EstimateRequest,
) -> Result<AlignedData, PipelineError> {
    let mut raw = provider.fetch(&request.location, &request.window).await?;

    let grid = request.window.hourly_grid();
    raw.sort_and_dedup();
    let mut series = raw.reindex_nearest(&grid)?;
    series.repair_gaps();

    let mut warnings = provider.window_warnings(&request.window);
    for channel in [Channel::Dni, Channel::Ghi, Channel::Dhi, Channel::PoaGlobal] {
        if series.is_all_zero(channel) {
            warnings.push(format!(
                "{channel} is zero across the entire study window; \
                 the estimate may be off by roughly {DEGENERATE_ERROR_MARGIN_PCT:.0}%"
            ));
        }
    }

    let poa = poa_series(&series, &grid, request, &mut warnings);

    Ok(AlignedData { grid, series, poa, warnings })
}

/// POA per grid hour: the provider's own POA column when present, otherwise
/// an isotropic transposition of the horizontal components at the facade
/// azimuth, tilt 90 degrees.
fn poa_series(
    series: &MeteoSeries,
    grid: &[DateTime<Utc>],
    request: &EstimateRequest,
    warnings: &mut Vec<String>,
) -> Vec<f64> {
    if let Some(poa) = series.channel(Channel::PoaGlobal) {
        return poa.to_vec();
    }

    let missing: Vec<&str> = [Channel::Dni, Channel::Ghi, Channel::Dhi]
        .iter()
        .filter(|c| !series.has_channel(**c))
        .map(|c| c.label())
        .collect();
    if !missing.is_empty() {
        warnings.push(format!(
            "missing irradiance components treated as zero: {}",
            missing.join(", ")
        ));
    }

    let component = |channel: Channel, i: usize| -> f64 {
        series.channel(channel).map_or(0.0, |v| v[i])
    };

    grid.iter()
        .enumerate()
        .map(|(i, &t)| {
            let angles =
                solar_position(t, request.location.latitude, request.location.longitude);
            poa_irradiance(
                component(Channel::Dni, i),
                component(Channel::Ghi, i),
                component(Channel::Dhi, i),
                angles,
                FACADE_TILT_DEG,
                request.facade.azimuth_deg,
                ALBEDO,
            )
        })
        .collect()
}

/// Stage two: reduce the aligned data to a single kWh figure.
///
/// Hourly samples make each W/m² reading count as one Wh/m², so both modes
/// sum power, scale by area, apply the loss factor and divide by 1000.
pub fn aggregate(data: &AlignedData, request: &EstimateRequest) -> Result<Estimate, PipelineError> {
    let mut warnings = data.warnings.clone();

    let gross_wh = match &request.mode {
        AggregationMode::Simplified => {
            data.poa.iter().sum::<f64>() * request.facade.area_m2
        }
        AggregationMode::PowerChain { module, inverter } => {
            let module = find_module(module)?;
            let inverter = find_inverter(inverter)?;
            check_compatibility(module, inverter)?;

            let temp_air = data.series.channel(Channel::TempAir);
            let wind = data.series.channel(Channel::WindSpeed);
            if temp_air.is_none() {
                warnings.push(format!(
                    "no temperature column; assuming {DEFAULT_TEMP_AIR_C} °C ambient"
                ));
            }
            if wind.is_none() {
                warnings.push(format!("no wind column; assuming {DEFAULT_WIND_M_S} m/s"));
            }

            let mut total_ac = 0.0;
            for (i, &poa) in data.poa.iter().enumerate() {
                let t_air = temp_air.map_or(DEFAULT_TEMP_AIR_C, |v| v[i]);
                let ws = wind.map_or(DEFAULT_WIND_M_S, |v| v[i]);

                let t_cell = cell_temperature(poa, t_air, ws)?;
                let p_dc = dc_power(poa, t_cell, module)?;
                total_ac += ac_power(p_dc, inverter)?;
            }
            total_ac * request.facade.area_m2
        }
    };

    let energy_kwh = gross_wh / 1000.0 * request.facade.loss_factor();
    Ok(Estimate { energy_kwh, warnings })
}

/// Run a whole estimate. The window is validated at construction and the
/// module/inverter pairing is checked here, so both reject before any
/// network traffic.
pub async fn run_estimate(
    provider: &dyn MeteoProvider,
    request: &EstimateRequest,
) -> Result<Estimate, PipelineError> {
    if let AggregationMode::PowerChain { module, inverter } = &request.mode {
        let module = find_module(module)?;
        let inverter = find_inverter(inverter)?;
        check_compatibility(module, inverter)?;
    }

    let data = acquire_and_align(provider, request).await?;
    aggregate(&data, request)
}
