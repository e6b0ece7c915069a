//! Core library for the `facadepv` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Abstraction over meteorological data providers (PVGIS, NSRDB)
//! - The resample-and-aggregate pipeline that turns a fetched time-series
//!   into a loss-adjusted facade energy estimate
//! - The PV model set (solar position, transposition, power chain) and the
//!   built-in module/inverter catalogs
//!
//! It is used by `facadepv-cli`, but can also be reused by other binaries or
//! services.

pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod pv;
pub mod series;
pub mod table;

pub use config::{Config, ProviderConfig};
pub use error::PipelineError;
pub use model::{AggregationMode, Estimate, FacadeConfig, Location, StudyWindow};
pub use pipeline::{EstimateRequest, run_estimate};
pub use provider::{MeteoProvider, ProviderId};
pub use series::{Channel, MeteoSeries};
