use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Geographic point of the facade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, PipelineError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(PipelineError::invalid_input(format!(
                "latitude {latitude} out of range -90..90"
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(PipelineError::invalid_input(format!(
                "longitude {longitude} out of range -180..180"
            )));
        }
        Ok(Self { latitude, longitude })
    }
}

/// Study period over which energy is accumulated.
///
/// The hourly grid runs from `start` 00:00 through `end` 00:00 inclusive,
/// in UTC. Construction rejects windows where the end is not after the
/// start, before any network activity happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StudyWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl StudyWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, PipelineError> {
        if start >= end {
            return Err(PipelineError::invalid_input(format!(
                "end date {end} is not after start date {start}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Hourly UTC timestamps covering the window, end midnight included.
    pub fn hourly_grid(&self) -> Vec<DateTime<Utc>> {
        let start = midnight_utc(self.start);
        let end = midnight_utc(self.end);

        let mut grid = Vec::new();
        let mut t = start;
        while t <= end {
            grid.push(t);
            t += Duration::hours(1);
        }
        grid
    }

    pub fn start_year(&self) -> i32 {
        self.start.year()
    }

    pub fn end_year(&self) -> i32 {
        self.end.year()
    }
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    // 00:00:00 exists for every date.
    date.and_hms_opt(0, 0, 0).unwrap().and_utc()
}

/// Facade geometry and system losses, fixed for the whole run.
///
/// Tilt is not a field: facades are vertical by definition here, the
/// pipeline always uses 90 degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FacadeConfig {
    /// Compass bearing the facade faces, degrees clockwise from north.
    pub azimuth_deg: f64,
    /// Facade surface area in square metres.
    pub area_m2: f64,
    /// System losses as a percentage, 0..=100.
    pub loss_pct: f64,
}

impl FacadeConfig {
    pub fn new(azimuth_deg: f64, area_m2: f64, loss_pct: f64) -> Result<Self, PipelineError> {
        if !(0.0..=360.0).contains(&azimuth_deg) {
            return Err(PipelineError::invalid_input(format!(
                "facade azimuth {azimuth_deg} out of range 0..360"
            )));
        }
        if area_m2 <= 0.0 || !area_m2.is_finite() {
            return Err(PipelineError::invalid_input(format!(
                "facade area {area_m2} must be positive"
            )));
        }
        if !(0.0..=100.0).contains(&loss_pct) {
            return Err(PipelineError::invalid_input(format!(
                "system loss {loss_pct}% out of range 0..100"
            )));
        }
        Ok(Self { azimuth_deg, area_m2, loss_pct })
    }

    /// Multiplier applied to gross energy, `1 - loss`.
    pub fn loss_factor(&self) -> f64 {
        1.0 - self.loss_pct / 100.0
    }
}

/// How the aligned series is reduced to an energy figure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationMode {
    /// Sum POA irradiance directly; area and loss applied at the end.
    Simplified,
    /// Full cell-temperature / DC / AC chain through named catalog records.
    PowerChain { module: String, inverter: String },
}

/// Final result of a successful run: loss-adjusted energy plus any
/// non-fatal warnings collected along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    pub energy_kwh: f64,
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn window_rejects_end_not_after_start() {
        let err = StudyWindow::new(date(2024, 6, 2), date(2024, 6, 1)).unwrap_err();
        assert!(err.to_string().contains("not after"));

        assert!(StudyWindow::new(date(2024, 6, 1), date(2024, 6, 1)).is_err());
        assert!(StudyWindow::new(date(2024, 6, 1), date(2024, 6, 2)).is_ok());
    }

    #[test]
    fn hourly_grid_is_end_inclusive() {
        let window = StudyWindow::new(date(2024, 6, 1), date(2024, 6, 2)).unwrap();
        let grid = window.hourly_grid();

        // 24 hours plus the end midnight.
        assert_eq!(grid.len(), 25);
        assert_eq!(grid[0], midnight_utc(date(2024, 6, 1)));
        assert_eq!(*grid.last().unwrap(), midnight_utc(date(2024, 6, 2)));
        for pair in grid.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::hours(1));
        }
    }

    #[test]
    fn location_range_checks() {
        assert!(Location::new(48.2, 16.4).is_ok());
        assert!(Location::new(91.0, 0.0).is_err());
        assert!(Location::new(0.0, -181.0).is_err());
    }

    #[test]
    fn facade_config_validation() {
        assert!(FacadeConfig::new(180.0, 100.0, 15.0).is_ok());
        assert!(FacadeConfig::new(400.0, 100.0, 15.0).is_err());
        assert!(FacadeConfig::new(180.0, 0.0, 15.0).is_err());
        assert!(FacadeConfig::new(180.0, 100.0, 120.0).is_err());
    }

    #[test]
    fn loss_factor_is_complement() {
        let cfg = FacadeConfig::new(180.0, 100.0, 15.0).unwrap();
        assert!((cfg.loss_factor() - 0.85).abs() < 1e-12);
    }
}
