//! Module/inverter parameter records and the empirical power chain:
//! Sandia flat-plate cell temperature, a temperature-corrected DC model and a
//! clipped nominal-efficiency inverter model.

use crate::error::{CompatibilityReason, ModelStage, PipelineError};

/// Sandia flat-plate thermal constants for a glass/cell/polymer sheet module
/// in open-rack mounting. Domain-standard values, not user tunable.
const SAPM_A: f64 = -3.47;
const SAPM_B: f64 = -0.0594;
const SAPM_DELTA_T: f64 = 3.0;

/// Reference conditions for the DC model.
const IRRADIANCE_REF: f64 = 1000.0;
const TEMP_REF: f64 = 25.0;

/// PV module parameter record.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleParams {
    pub name: &'static str,
    /// Rated DC power at reference conditions, W.
    pub pdc0_w: f64,
    /// Voltage at the maximum power point, V.
    pub vmp_v: f64,
    /// Current at the maximum power point, A.
    pub imp_a: f64,
    /// Power temperature coefficient, 1/°C (negative).
    pub gamma_pdc: f64,
}

/// Inverter parameter record.
#[derive(Debug, Clone, PartialEq)]
pub struct InverterParams {
    pub name: &'static str,
    /// AC voltage rating, V.
    pub vac_v: f64,
    /// AC power rating (clipping limit), W.
    pub paco_w: f64,
    /// DC power rating, W.
    pub pdco_w: f64,
    /// DC current rating, A.
    pub idco_a: f64,
    /// Nominal conversion efficiency.
    pub eta_nom: f64,
}

/// Built-in module catalog.
pub fn module_catalog() -> &'static [ModuleParams] {
    const MODULES: &[ModuleParams] = &[
        ModuleParams {
            name: "Canadian_Solar_CS5P_220M",
            pdc0_w: 220.0,
            vmp_v: 48.3,
            imp_a: 4.55,
            gamma_pdc: -0.0047,
        },
        ModuleParams {
            name: "SunPower_SPR_E20_327",
            pdc0_w: 327.0,
            vmp_v: 54.7,
            imp_a: 5.98,
            gamma_pdc: -0.0035,
        },
        ModuleParams {
            name: "Trina_TSM_240PA05",
            pdc0_w: 240.0,
            vmp_v: 29.3,
            imp_a: 8.19,
            gamma_pdc: -0.0044,
        },
    ];
    MODULES
}

/// Built-in inverter catalog.
pub fn inverter_catalog() -> &'static [InverterParams] {
    const INVERTERS: &[InverterParams] = &[
        InverterParams {
            name: "ABB_MICRO_0_25_I_OUTD_US_208",
            vac_v: 208.0,
            paco_w: 250.0,
            pdco_w: 265.0,
            idco_a: 10.0,
            eta_nom: 0.96,
        },
        InverterParams {
            name: "SMA_America_SB5000US_240V",
            vac_v: 240.0,
            paco_w: 5000.0,
            pdco_w: 5250.0,
            idco_a: 21.0,
            eta_nom: 0.965,
        },
        InverterParams {
            name: "Fronius_Primo_3_8_240V",
            vac_v: 240.0,
            paco_w: 3800.0,
            pdco_w: 3970.0,
            idco_a: 18.0,
            eta_nom: 0.96,
        },
    ];
    INVERTERS
}

pub fn find_module(name: &str) -> Result<&'static ModuleParams, PipelineError> {
    module_catalog().iter().find(|m| m.name == name).ok_or_else(|| PipelineError::Model {
        stage: ModelStage::DcPower,
        detail: format!("unknown module '{name}'"),
    })
}

pub fn find_inverter(name: &str) -> Result<&'static InverterParams, PipelineError> {
    inverter_catalog().iter().find(|i| i.name == name).ok_or_else(|| PipelineError::Model {
        stage: ModelStage::AcPower,
        detail: format!("unknown inverter '{name}'"),
    })
}

/// Reject a pairing whose module ratings exceed the inverter's. Each check
/// has its own named rejection so the user sees which rating was violated.
pub fn check_compatibility(
    module: &ModuleParams,
    inverter: &InverterParams,
) -> Result<(), PipelineError> {
    if module.vmp_v > inverter.vac_v {
        return Err(PipelineError::Compatibility(CompatibilityReason::VoltageExceeded));
    }
    if module.pdc0_w > inverter.pdco_w {
        return Err(PipelineError::Compatibility(CompatibilityReason::PowerExceeded));
    }
    if module.imp_a > inverter.idco_a {
        return Err(PipelineError::Compatibility(CompatibilityReason::CurrentExceeded));
    }
    Ok(())
}

/// Sandia flat-plate cell temperature, °C.
pub fn cell_temperature(poa_w_m2: f64, temp_air_c: f64, wind_m_s: f64) -> Result<f64, PipelineError> {
    let module_temp = poa_w_m2 * (SAPM_A + SAPM_B * wind_m_s).exp() + temp_air_c;
    let cell = module_temp + poa_w_m2 / IRRADIANCE_REF * SAPM_DELTA_T;
    if cell.is_finite() {
        Ok(cell)
    } else {
        Err(PipelineError::Model {
            stage: ModelStage::CellTemperature,
            detail: format!("non-finite cell temperature from poa={poa_w_m2}, temp={temp_air_c}, wind={wind_m_s}"),
        })
    }
}

/// DC power at the given irradiance and cell temperature, W. Linear in POA
/// with a temperature correction around 25 °C, floored at zero.
pub fn dc_power(
    poa_w_m2: f64,
    cell_temp_c: f64,
    module: &ModuleParams,
) -> Result<f64, PipelineError> {
    let p = module.pdc0_w * (poa_w_m2 / IRRADIANCE_REF)
        * (1.0 + module.gamma_pdc * (cell_temp_c - TEMP_REF));
    if p.is_finite() {
        Ok(p.max(0.0))
    } else {
        Err(PipelineError::Model {
            stage: ModelStage::DcPower,
            detail: format!("non-finite DC power from poa={poa_w_m2}, cell_temp={cell_temp_c}"),
        })
    }
}

/// AC power out of the inverter, W: nominal efficiency, clipped at the AC
/// rating, zero for non-positive DC input.
pub fn ac_power(dc_w: f64, inverter: &InverterParams) -> Result<f64, PipelineError> {
    if !dc_w.is_finite() {
        return Err(PipelineError::Model {
            stage: ModelStage::AcPower,
            detail: format!("non-finite DC input {dc_w}"),
        });
    }
    if dc_w <= 0.0 {
        return Ok(0.0);
    }
    Ok((dc_w * inverter.eta_nom).min(inverter.paco_w))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(vmp: f64, pdc0: f64, imp: f64) -> ModuleParams {
        ModuleParams { name: "test_module", pdc0_w: pdc0, vmp_v: vmp, imp_a: imp, gamma_pdc: -0.004 }
    }

    fn inverter(vac: f64, pdco: f64, idco: f64) -> InverterParams {
        InverterParams {
            name: "test_inverter",
            vac_v: vac,
            paco_w: pdco * 0.95,
            pdco_w: pdco,
            idco_a: idco,
            eta_nom: 0.96,
        }
    }

    #[test]
    fn overvoltage_pairing_is_rejected() {
        let err = check_compatibility(&module(50.0, 200.0, 5.0), &inverter(40.0, 300.0, 10.0))
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Compatibility(CompatibilityReason::VoltageExceeded)
        ));
    }

    #[test]
    fn compatible_pairing_passes() {
        assert!(check_compatibility(&module(50.0, 200.0, 5.0), &inverter(60.0, 300.0, 10.0)).is_ok());
    }

    #[test]
    fn overpower_and_overcurrent_have_their_own_reasons() {
        let err = check_compatibility(&module(50.0, 400.0, 5.0), &inverter(60.0, 300.0, 10.0))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Compatibility(CompatibilityReason::PowerExceeded)));

        let err = check_compatibility(&module(50.0, 200.0, 15.0), &inverter(60.0, 300.0, 10.0))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Compatibility(CompatibilityReason::CurrentExceeded)));
    }

    #[test]
    fn catalog_pairings_are_self_consistent() {
        // Every built-in module fits at least one built-in inverter.
        for module in module_catalog() {
            assert!(
                inverter_catalog().iter().any(|inv| check_compatibility(module, inv).is_ok()),
                "no inverter fits {}",
                module.name
            );
        }
    }

    #[test]
    fn catalog_lookup_by_name() {
        assert!(find_module("Canadian_Solar_CS5P_220M").is_ok());
        let err = find_module("nope").unwrap_err();
        assert!(err.to_string().contains("nope"));
        assert!(find_inverter("SMA_America_SB5000US_240V").is_ok());
    }

    #[test]
    fn cell_temperature_matches_hand_computation() {
        // 800 W/m2, 20 C, 5 m/s:
        // module = 800 * exp(-3.47 - 0.297) + 20 ~= 38.5
        // cell   = module + 0.8 * 3 = 40.9
        let t = cell_temperature(800.0, 20.0, 5.0).unwrap();
        let expected = 800.0 * (-3.47_f64 - 0.0594 * 5.0).exp() + 20.0 + 0.8 * 3.0;
        assert!((t - expected).abs() < 1e-9);
        assert!(t > 38.0 && t < 44.0, "cell temp {t}");
    }

    #[test]
    fn cell_temperature_is_ambient_plus_nothing_in_the_dark() {
        let t = cell_temperature(0.0, 10.0, 2.0).unwrap();
        assert!((t - 10.0).abs() < 1e-9);
    }

    #[test]
    fn dc_power_scales_with_irradiance_and_derates_with_heat() {
        let m = module(48.0, 220.0, 4.5);

        let at_ref = dc_power(1000.0, 25.0, &m).unwrap();
        assert!((at_ref - 220.0).abs() < 1e-9);

        let half = dc_power(500.0, 25.0, &m).unwrap();
        assert!((half - 110.0).abs() < 1e-9);

        let hot = dc_power(1000.0, 50.0, &m).unwrap();
        assert!(hot < at_ref);

        assert_eq!(dc_power(0.0, 25.0, &m).unwrap(), 0.0);
    }

    #[test]
    fn ac_power_clips_at_rating() {
        let inv = inverter(240.0, 300.0, 10.0);
        // paco = 285; 400 * 0.96 = 384 clips.
        assert_eq!(ac_power(400.0, &inv).unwrap(), inv.paco_w);
        // Below clipping, nominal efficiency applies.
        let p = ac_power(100.0, &inv).unwrap();
        assert!((p - 96.0).abs() < 1e-9);
        assert_eq!(ac_power(-5.0, &inv).unwrap(), 0.0);
    }
}
