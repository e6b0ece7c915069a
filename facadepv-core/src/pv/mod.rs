//! Photovoltaic model set consumed by the pipeline as pure functions:
//! solar position, plane-of-array transposition, cell temperature, module DC
//! and inverter AC conversion, and the built-in equipment catalogs.

pub mod power;
pub mod solpos;

pub use power::{
    InverterParams, ModuleParams, ac_power, cell_temperature, check_compatibility, dc_power,
    find_inverter, find_module, inverter_catalog, module_catalog,
};
pub use solpos::{SolarAngles, solar_position};

/// Facades are vertical surfaces.
pub const FACADE_TILT_DEG: f64 = 90.0;

/// Ground reflectance used for the reflected POA component.
pub const ALBEDO: f64 = 0.2;

/// Angle between the sun and the surface normal, degrees.
pub fn angle_of_incidence(
    angles: SolarAngles,
    tilt_deg: f64,
    surface_azimuth_deg: f64,
) -> f64 {
    let zenith = angles.zenith_deg.to_radians();
    let sun_az = angles.azimuth_deg.to_radians();
    let tilt = tilt_deg.to_radians();
    let surf_az = surface_azimuth_deg.to_radians();

    let cos_aoi =
        zenith.cos() * tilt.cos() + zenith.sin() * tilt.sin() * (sun_az - surf_az).cos();
    cos_aoi.clamp(-1.0, 1.0).acos().to_degrees()
}

/// Plane-of-array irradiance from the horizontal components, isotropic-sky
/// transposition: beam projection plus sky-diffuse and ground-reflected view
/// factors.
pub fn poa_irradiance(
    dni: f64,
    ghi: f64,
    dhi: f64,
    angles: SolarAngles,
    tilt_deg: f64,
    surface_azimuth_deg: f64,
    albedo: f64,
) -> f64 {
    let aoi = angle_of_incidence(angles, tilt_deg, surface_azimuth_deg);
    let cos_aoi = aoi.to_radians().cos();

    let beam = if cos_aoi > 0.0 && angles.is_above_horizon() { dni * cos_aoi } else { 0.0 };

    let tilt = tilt_deg.to_radians();
    let sky_diffuse = dhi * (1.0 + tilt.cos()) / 2.0;
    let ground = ghi * albedo * (1.0 - tilt.cos()) / 2.0;

    (beam + sky_diffuse + ground).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn angles(zenith: f64, azimuth: f64) -> SolarAngles {
        SolarAngles { zenith_deg: zenith, azimuth_deg: azimuth }
    }

    #[test]
    fn aoi_zero_when_sun_faces_surface() {
        // Sun 45 degrees up due south, surface tilted 45 facing south.
        let aoi = angle_of_incidence(angles(45.0, 180.0), 45.0, 180.0);
        assert!(aoi.abs() < 0.1, "aoi {aoi}");
    }

    #[test]
    fn aoi_ninety_for_vertical_facade_under_zenith_sun() {
        let aoi = angle_of_incidence(angles(0.0, 180.0), FACADE_TILT_DEG, 180.0);
        assert!((aoi - 90.0).abs() < 0.1, "aoi {aoi}");
    }

    #[test]
    fn vertical_facade_sees_half_the_sky_diffuse() {
        // Sun behind the facade: only diffuse terms contribute.
        let poa = poa_irradiance(500.0, 300.0, 200.0, angles(60.0, 0.0), FACADE_TILT_DEG, 180.0, ALBEDO);
        let expected = 200.0 * 0.5 + 300.0 * ALBEDO * 0.5;
        assert!((poa - expected).abs() < 1e-9, "poa {poa}");
    }

    #[test]
    fn beam_contributes_when_sun_in_front() {
        let sun = angles(60.0, 180.0);
        let with_beam = poa_irradiance(500.0, 300.0, 200.0, sun, FACADE_TILT_DEG, 180.0, ALBEDO);
        let no_beam = poa_irradiance(0.0, 300.0, 200.0, sun, FACADE_TILT_DEG, 180.0, ALBEDO);
        // cos(aoi) for a south facade with the sun due south at zenith 60:
        // cos(60)*cos(90) + sin(60)*sin(90)*cos(0) = sin(60).
        let beam = 500.0 * 60.0_f64.to_radians().sin();
        assert!((with_beam - no_beam - beam).abs() < 1e-9);
    }

    #[test]
    fn no_beam_below_horizon() {
        let poa = poa_irradiance(800.0, 0.0, 0.0, angles(95.0, 180.0), FACADE_TILT_DEG, 180.0, ALBEDO);
        assert_eq!(poa, 0.0);
    }
}
