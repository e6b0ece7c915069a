use thiserror::Error;

/// Stage of the power-chain model that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelStage {
    CellTemperature,
    DcPower,
    AcPower,
}

impl std::fmt::Display for ModelStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ModelStage::CellTemperature => "cell temperature",
            ModelStage::DcPower => "DC power",
            ModelStage::AcPower => "AC power",
        };
        f.write_str(s)
    }
}

/// Why a module/inverter pairing was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompatibilityReason {
    /// Module max-power voltage exceeds the inverter AC voltage rating.
    VoltageExceeded,
    /// Module max power exceeds the inverter DC power rating.
    PowerExceeded,
    /// Module max-power current exceeds the inverter DC current rating.
    CurrentExceeded,
}

impl std::fmt::Display for CompatibilityReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CompatibilityReason::VoltageExceeded => {
                "module voltage exceeds inverter AC voltage rating"
            }
            CompatibilityReason::PowerExceeded => {
                "module power exceeds inverter DC power rating"
            }
            CompatibilityReason::CurrentExceeded => {
                "module current exceeds inverter DC current rating"
            }
        };
        f.write_str(s)
    }
}

/// Terminal failures of a single estimate run.
///
/// Every variant aborts the calculation; no partial energy figure is ever
/// produced. The only designed non-fatal condition (a fully zero irradiance
/// window) is reported as a warning on the result instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// User input rejected before any network activity.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Network failure or non-success status from a provider.
    #[error("{provider} request failed: {detail}")]
    Fetch { provider: &'static str, detail: String },

    /// Provider response was readable but missing an expected column.
    #[error("could not interpret provider response: {0}")]
    Parse(String),

    /// Timestamp parsing or reindexing failure.
    #[error("time alignment failed: {0}")]
    TimeAlignment(String),

    /// A power-model stage produced an unusable value.
    #[error("{stage} model failed: {detail}")]
    Model { stage: ModelStage, detail: String },

    /// Module/inverter pairing rejected before the fetch.
    #[error("incompatible module/inverter pairing: {0}")]
    Compatibility(CompatibilityReason),
}

impl PipelineError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        PipelineError::InvalidInput(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        PipelineError::Parse(msg.into())
    }

    pub fn time_alignment(msg: impl Into<String>) -> Self {
        PipelineError::TimeAlignment(msg.into())
    }
}
