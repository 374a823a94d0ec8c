// crates/pvqc-core/src/types.rs

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// A raw `(timestamp, value)` pair as delivered by a logger. `None` and
/// non-finite values are both treated as missing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub timestamp: NaiveDateTime,
    pub value: Option<f64>,
}

impl Reading {
    pub fn new(timestamp: NaiveDateTime, value: Option<f64>) -> Self {
        Self { timestamp, value }
    }

    pub fn defined_value(&self) -> Option<f64> {
        self.value.filter(|v| v.is_finite())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: NaiveDateTime, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Ordered samples for one channel over one day.
///
/// Every constructor in this crate hands out a `Series` whose timestamps are
/// strictly increasing. Stages never mutate a series in place; they return a
/// new one so the effect of each stage can be inspected on its own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    samples: Vec<Sample>,
}

impl Series {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a series from samples, sorting them by timestamp. Later duplicates win.
    pub fn from_samples(mut samples: Vec<Sample>) -> Self {
        samples.sort_by_key(|s| s.timestamp);
        samples.dedup_by(|next, prev| {
            if next.timestamp == prev.timestamp {
                prev.value = next.value;
                true
            } else {
                false
            }
        });
        Self { samples }
    }

    pub(crate) fn from_sorted(samples: Vec<Sample>) -> Self {
        debug_assert!(samples.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        Self { samples }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.samples.iter().map(|s| s.timestamp).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    /// Keeps the samples matching `keep`, preserving order.
    pub fn retain_where<F>(&self, mut keep: F) -> Series
    where
        F: FnMut(&Sample) -> bool,
    {
        Series::from_sorted(self.samples.iter().copied().filter(|s| keep(s)).collect())
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Irradiance,
    ModuleTemperature,
    DcPower,
    AcPower,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 4] = [
        ChannelKind::Irradiance,
        ChannelKind::ModuleTemperature,
        ChannelKind::DcPower,
        ChannelKind::AcPower,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Irradiance => "irradiance",
            ChannelKind::ModuleTemperature => "module_temperature",
            ChannelKind::DcPower => "dc_power",
            ChannelKind::AcPower => "ac_power",
        }
    }

    /// Column name used in joined tables.
    pub fn column_name(&self) -> &'static str {
        match self {
            ChannelKind::Irradiance => "irr",
            ChannelKind::ModuleTemperature => "t_mod",
            ChannelKind::DcPower => "p_dc",
            ChannelKind::AcPower => "p_ac",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ChannelKind {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "irradiance" | "irr" => Ok(ChannelKind::Irradiance),
            "module_temperature" | "t_mod" => Ok(ChannelKind::ModuleTemperature),
            "dc_power" | "p_dc" => Ok(ChannelKind::DcPower),
            "ac_power" | "p_ac" => Ok(ChannelKind::AcPower),
            other => Err(format!("unknown channel kind '{other}'")),
        }
    }
}

/// Fractional hour of day: `hour + minute/60 + second/3600`.
pub fn fractional_hour(timestamp: NaiveDateTime) -> f64 {
    f64::from(timestamp.hour())
        + f64::from(timestamp.minute()) / 60.0
        + f64::from(timestamp.second()) / 3600.0
}

/// Static parameters of one PV system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemParameters {
    pub sys: String,
    pub loc: String,
    #[serde(rename = "mod")]
    pub module: String,
    /// Nominal power in W.
    pub p_m: f64,
    /// Module area in m².
    pub area: f64,
    /// Power temperature coefficient (1/°C); reported, never used by the filters.
    #[serde(default)]
    pub gamma: f64,
}

/// Raw readings for one system and one calendar day.
#[derive(Debug, Clone)]
pub struct DayInput {
    pub day: NaiveDate,
    pub irradiance: Vec<Reading>,
    pub module_temperature_center: Vec<Reading>,
    pub module_temperature_side: Vec<Reading>,
    pub dc_power: Vec<Reading>,
    pub ac_power: Vec<Reading>,
}

impl DayInput {
    pub fn new(day: NaiveDate) -> Self {
        Self {
            day,
            irradiance: Vec::new(),
            module_temperature_center: Vec::new(),
            module_temperature_side: Vec::new(),
            dc_power: Vec::new(),
            ac_power: Vec::new(),
        }
    }
}
