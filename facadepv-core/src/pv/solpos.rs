//! Solar position from time and place.
//!
//! NOAA-style computation: Spencer declination and equation of time, hour
//! angle from true solar time, zenith/azimuth by spherical trigonometry.
//! Accuracy is a fraction of a degree, plenty for hourly energy estimates.

use std::f64::consts::PI;

use chrono::{DateTime, Datelike, Timelike, Utc};

/// Sun position at one instant, degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarAngles {
    /// Angle from vertical; > 90 means the sun is below the horizon.
    pub zenith_deg: f64,
    /// Compass bearing of the sun, clockwise from north.
    pub azimuth_deg: f64,
}

impl SolarAngles {
    pub fn elevation_deg(&self) -> f64 {
        90.0 - self.zenith_deg
    }

    pub fn is_above_horizon(&self) -> bool {
        self.zenith_deg < 90.0
    }
}

/// Solar zenith and azimuth for a UTC instant at the given coordinates.
pub fn solar_position(time: DateTime<Utc>, latitude: f64, longitude: f64) -> SolarAngles {
    let day_of_year = time.ordinal() as f64;
    let frac_hour =
        time.hour() as f64 + time.minute() as f64 / 60.0 + time.second() as f64 / 3600.0;

    // Fractional year in radians.
    let gamma = 2.0 * PI / 365.0 * (day_of_year - 1.0 + (frac_hour - 12.0) / 24.0);

    // Spencer (1971) series.
    let declination = 0.006918 - 0.399912 * gamma.cos() + 0.070257 * gamma.sin()
        - 0.006758 * (2.0 * gamma).cos()
        + 0.000907 * (2.0 * gamma).sin()
        - 0.002697 * (3.0 * gamma).cos()
        + 0.00148 * (3.0 * gamma).sin();

    // Equation of time, minutes.
    let eq_time = 229.18
        * (0.000075 + 0.001868 * gamma.cos()
            - 0.032077 * gamma.sin()
            - 0.014615 * (2.0 * gamma).cos()
            - 0.040849 * (2.0 * gamma).sin());

    // True solar time, minutes; longitude east positive.
    let tst = frac_hour * 60.0 + eq_time + 4.0 * longitude;
    let hour_angle = (tst / 4.0 - 180.0).to_radians();

    let lat = latitude.to_radians();
    let cos_zenith = lat.sin() * declination.sin()
        + lat.cos() * declination.cos() * hour_angle.cos();
    let zenith = cos_zenith.clamp(-1.0, 1.0).acos();

    // Azimuth measured westward from south, then converted to compass.
    let azimuth_south = hour_angle
        .sin()
        .atan2(hour_angle.cos() * lat.sin() - declination.tan() * lat.cos());
    let azimuth_deg = (azimuth_south.to_degrees() + 180.0).rem_euclid(360.0);

    SolarAngles { zenith_deg: zenith.to_degrees(), azimuth_deg }
}
