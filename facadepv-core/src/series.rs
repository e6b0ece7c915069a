//! Time-indexed meteorological table and the alignment/repair operations
//! every estimate runs through.
//!
//! Missing values are represented as NaN throughout. A series is constructed
//! fresh from a provider response, aligned onto the study window's hourly
//! grid, repaired, and discarded when the calculation completes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::PipelineError;

/// Physical quantity carried by one column of a [`MeteoSeries`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Channel {
    /// Direct normal irradiance, W/m².
    Dni,
    /// Global horizontal irradiance, W/m².
    Ghi,
    /// Diffuse horizontal irradiance, W/m².
    Dhi,
    /// Plane-of-array irradiance as delivered by the provider, W/m².
    PoaGlobal,
    /// Ambient air temperature, °C.
    TempAir,
    /// Wind speed, m/s.
    WindSpeed,
}

impl Channel {
    /// Irradiance channels get the zero-prefilter gap repair; the rest are
    /// interpolated directly.
    pub fn is_irradiance(&self) -> bool {
        matches!(self, Channel::Dni | Channel::Ghi | Channel::Dhi | Channel::PoaGlobal)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Channel::Dni => "DNI",
            Channel::Ghi => "GHI",
            Channel::Dhi => "DHI",
            Channel::PoaGlobal => "POA",
            Channel::TempAir => "temperature",
            Channel::WindSpeed => "wind speed",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Column-oriented, time-indexed table of meteorological values.
#[derive(Debug, Clone, Default)]
pub struct MeteoSeries {
    timestamps: Vec<DateTime<Utc>>,
    channels: BTreeMap<Channel, Vec<f64>>,
}

impl MeteoSeries {
    pub fn new(
        timestamps: Vec<DateTime<Utc>>,
        channels: BTreeMap<Channel, Vec<f64>>,
    ) -> Result<Self, PipelineError> {
        for (channel, values) in &channels {
            if values.len() != timestamps.len() {
                return Err(PipelineError::time_alignment(format!(
                    "{channel} column has {} values for {} timestamps",
                    values.len(),
                    timestamps.len()
                )));
            }
        }
        Ok(Self { timestamps, channels })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn channel(&self, channel: Channel) -> Option<&[f64]> {
        self.channels.get(&channel).map(Vec::as_slice)
    }

    pub fn has_channel(&self, channel: Channel) -> bool {
        self.channels.contains_key(&channel)
    }

    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.channels.keys().copied()
    }

    /// Sort rows by timestamp ascending and drop duplicate timestamps,
    /// keeping the first occurrence. Upstream data is not guaranteed sorted.
    ///
    /// Afterwards the index is strictly monotonic increasing.
    pub fn sort_and_dedup(&mut self) {
        let mut order: Vec<usize> = (0..self.timestamps.len()).collect();
        // Stable sort so "first occurrence" keeps its meaning for duplicates.
        order.sort_by_key(|&i| self.timestamps[i]);

        let mut keep: Vec<usize> = Vec::with_capacity(order.len());
        let mut last: Option<DateTime<Utc>> = None;
        for i in order {
            let t = self.timestamps[i];
            if last != Some(t) {
                keep.push(i);
                last = Some(t);
            }
        }

        self.timestamps = keep.iter().map(|&i| self.timestamps[i]).collect();
        for values in self.channels.values_mut() {
            *values = keep.iter().map(|&i| values[i]).collect();
        }
    }

    /// Align the series onto `grid` by nearest-neighbor matching: every grid
    /// point takes the value of the closest source timestamp, ties broken
    /// toward the earlier source. No interpolation happens here.
    ///
    /// The series must already be sorted; call [`sort_and_dedup`] first.
    ///
    /// [`sort_and_dedup`]: MeteoSeries::sort_and_dedup
    pub fn reindex_nearest(&self, grid: &[DateTime<Utc>]) -> Result<MeteoSeries, PipelineError> {
        if self.is_empty() {
            return Err(PipelineError::time_alignment(
                "cannot reindex an empty series onto the study grid",
            ));
        }

        let mut picks = Vec::with_capacity(grid.len());
        for &target in grid {
            picks.push(self.nearest_index(target));
        }

        let timestamps = grid.to_vec();
        let channels = self
            .channels
            .iter()
            .map(|(&channel, values)| {
                (channel, picks.iter().map(|&i| values[i]).collect::<Vec<f64>>())
            })
            .collect();

        MeteoSeries::new(timestamps, channels)
    }

    fn nearest_index(&self, target: DateTime<Utc>) -> usize {
        match self.timestamps.binary_search(&target) {
            Ok(i) => i,
            Err(0) => 0,
            Err(i) if i == self.timestamps.len() => self.timestamps.len() - 1,
            Err(i) => {
                let before = target - self.timestamps[i - 1];
                let after = self.timestamps[i] - target;
                // Tie goes to the earlier source timestamp.
                if after < before { i } else { i - 1 }
            }
        }
    }

    /// Repair gaps in place.
    ///
    /// Irradiance channels: exact-zero readings become missing, then linear
    /// interpolation between the nearest valid neighbours fills the run, and
    /// anything still missing at the boundaries becomes zero. Sensors report
    /// hard zeros both at night and when dropping out, so an isolated zero
    /// between sunny hours is treated as a dropout.
    ///
    /// Other channels are interpolated directly and extended from the
    /// nearest valid value at the boundaries.
    pub fn repair_gaps(&mut self) {
        for (channel, values) in self.channels.iter_mut() {
            if channel.is_irradiance() {
                for v in values.iter_mut() {
                    if *v == 0.0 {
                        *v = f64::NAN;
                    }
                }
                interpolate_linear(values);
                for v in values.iter_mut() {
                    if v.is_nan() {
                        *v = 0.0;
                    }
                }
            } else {
                interpolate_linear(values);
                extend_boundaries(values);
            }
        }
    }

    /// True when the channel exists and holds no value other than zero
    /// (post-repair degenerate-data probe).
    pub fn is_all_zero(&self, channel: Channel) -> bool {
        match self.channels.get(&channel) {
            Some(values) if !values.is_empty() => values.iter().all(|v| *v == 0.0),
            _ => false,
        }
    }
}

/// Fill interior NaN runs by linear interpolation between the nearest valid
/// neighbours. Leading/trailing runs with only one valid side are left NaN.
fn interpolate_linear(values: &mut [f64]) {
    let mut prev_valid: Option<usize> = None;
    let mut i = 0;
    while i < values.len() {
        if values[i].is_nan() {
            // Find the end of this NaN run.
            let mut j = i;
            while j < values.len() && values[j].is_nan() {
                j += 1;
            }
            if let (Some(p), true) = (prev_valid, j < values.len()) {
                let left = values[p];
                let right = values[j];
                let span = (j - p) as f64;
                for k in i..j {
                    let frac = (k - p) as f64 / span;
                    values[k] = left + (right - left) * frac;
                }
            }
            i = j;
        } else {
            prev_valid = Some(i);
            i += 1;
        }
    }
}

/// Replace leading/trailing NaN runs with the nearest valid value.
fn extend_boundaries(values: &mut [f64]) {
    if let Some(first) = values.iter().position(|v| !v.is_nan()) {
        let fill = values[first];
        for v in &mut values[..first] {
            *v = fill;
        }
        let last = values.iter().rposition(|v| !v.is_nan()).unwrap_or(first);
        let fill = values[last];
        for v in &mut values[last + 1..] {
            *v = fill;
        }
    }
}
