use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::types::ChannelKind;

/// How `range_lo`, `range_hi` and `abrupt_max_slope` are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdScale {
    #[default]
    Absolute,
    /// Multiplied by the system's nominal power `p_m` at resolution time.
    NominalPower,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    #[serde(default)]
    pub scale: ThresholdScale,
    /// Samples below this are treated as night/noise before the range check.
    #[serde(default)]
    pub daylight_floor: Option<f64>,
    pub range_lo: f64,
    pub range_hi: f64,
    /// `None` disables the dead-value filter for the channel.
    #[serde(default)]
    pub dead_derivative_eps: Option<f64>,
    #[serde(default)]
    pub dead_value_floor: Option<f64>,
    pub abrupt_max_slope: f64,
}

/// Partial override read from configuration; unset fields keep the canonical value.
///
/// `dead_filter = false` and `daylight_filter = false` switch the optional
/// filters off, since an absent key cannot clear a canonical value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdOverride {
    pub scale: Option<ThresholdScale>,
    pub dead_filter: Option<bool>,
    pub daylight_filter: Option<bool>,
    pub daylight_floor: Option<f64>,
    pub range_lo: Option<f64>,
    pub range_hi: Option<f64>,
    pub dead_derivative_eps: Option<f64>,
    pub dead_value_floor: Option<f64>,
    pub abrupt_max_slope: Option<f64>,
}

impl ThresholdOverride {
    fn apply_to(&self, base: &QualityThresholds) -> QualityThresholds {
        let mut merged = QualityThresholds {
            scale: self.scale.unwrap_or(base.scale),
            daylight_floor: self.daylight_floor.or(base.daylight_floor),
            range_lo: self.range_lo.unwrap_or(base.range_lo),
            range_hi: self.range_hi.unwrap_or(base.range_hi),
            dead_derivative_eps: self.dead_derivative_eps.or(base.dead_derivative_eps),
            dead_value_floor: self.dead_value_floor.or(base.dead_value_floor),
            abrupt_max_slope: self.abrupt_max_slope.unwrap_or(base.abrupt_max_slope),
        };
        if self.dead_filter == Some(false) {
            merged.dead_derivative_eps = None;
            merged.dead_value_floor = None;
        }
        if self.daylight_filter == Some(false) {
            merged.daylight_floor = None;
        }
        merged
    }
}

/// Thresholds in absolute units for one channel of one system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedThresholds {
    pub daylight_floor: Option<f64>,
    pub range_lo: f64,
    pub range_hi: f64,
    pub dead_derivative_eps: Option<f64>,
    pub dead_value_floor: Option<f64>,
    pub abrupt_max_slope: f64,
}

impl QualityThresholds {
    pub fn resolve(&self, p_m: f64) -> ResolvedThresholds {
        let factor = match self.scale {
            ThresholdScale::Absolute => 1.0,
            ThresholdScale::NominalPower => p_m,
        };
        ResolvedThresholds {
            daylight_floor: self.daylight_floor,
            range_lo: self.range_lo * factor,
            range_hi: self.range_hi * factor,
            dead_derivative_eps: self.dead_derivative_eps,
            dead_value_floor: self.dead_value_floor,
            abrupt_max_slope: self.abrupt_max_slope * factor,
        }
    }

    fn validate(&self, channel: ChannelKind) -> Result<()> {
        if !self.range_lo.is_finite() || !self.range_hi.is_finite() || self.range_lo > self.range_hi
        {
            return Err(ConfigError::InvertedRange {
                channel,
                lo: self.range_lo,
                hi: self.range_hi,
            });
        }
        check_non_negative(channel, "abrupt_max_slope", Some(self.abrupt_max_slope))?;
        check_non_negative(channel, "dead_derivative_eps", self.dead_derivative_eps)?;
        check_finite(channel, "dead_value_floor", self.dead_value_floor)?;
        check_finite(channel, "daylight_floor", self.daylight_floor)?;
        Ok(())
    }
}

fn check_non_negative(channel: ChannelKind, field: &'static str, value: Option<f64>) -> Result<()> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(ConfigError::InvalidThreshold {
            channel,
            field,
            value: v,
        }),
        _ => Ok(()),
    }
}

fn check_finite(channel: ChannelKind, field: &'static str, value: Option<f64>) -> Result<()> {
    match value {
        Some(v) if !v.is_finite() => Err(ConfigError::InvalidThreshold {
            channel,
            field,
            value: v,
        }),
        _ => Ok(()),
    }
}

/// Production thresholds of the monitoring deployment.
pub fn canonical_thresholds() -> BTreeMap<ChannelKind, QualityThresholds> {
    use ThresholdScale::{Absolute, NominalPower};

    let power = QualityThresholds {
        scale: NominalPower,
        daylight_floor: None,
        range_lo: -0.01,
        range_hi: 1.2,
        dead_derivative_eps: None,
        dead_value_floor: None,
        abrupt_max_slope: 0.8,
    };

    BTreeMap::from([
        (
            ChannelKind::Irradiance,
            QualityThresholds {
                scale: Absolute,
                daylight_floor: Some(20.0),
                range_lo: -6.0,
                range_hi: 1500.0,
                dead_derivative_eps: Some(0.0001),
                dead_value_floor: Some(5.0),
                abrupt_max_slope: 800.0,
            },
        ),
        (
            ChannelKind::ModuleTemperature,
            QualityThresholds {
                scale: Absolute,
                daylight_floor: None,
                range_lo: -30.0,
                range_hi: 50.0,
                dead_derivative_eps: Some(0.0001),
                dead_value_floor: None,
                abrupt_max_slope: 4.0,
            },
        ),
        (ChannelKind::DcPower, power.clone()),
        (ChannelKind::AcPower, power),
    ])
}

/// Enum-keyed lookup of thresholds; holds an entry for every [`ChannelKind`].
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdTable {
    entries: BTreeMap<ChannelKind, QualityThresholds>,
}

impl ThresholdTable {
    pub fn canonical() -> Self {
        Self {
            entries: canonical_thresholds(),
        }
    }

    /// Builds a table from an explicit map. Every channel kind must be present.
    pub fn from_map(entries: BTreeMap<ChannelKind, QualityThresholds>) -> Result<Self> {
        for kind in ChannelKind::ALL {
            let thresholds = entries
                .get(&kind)
                .ok_or(ConfigError::MissingThresholds(kind))?;
            thresholds.validate(kind)?;
        }
        Ok(Self { entries })
    }

    /// Canonical thresholds with per-channel overrides merged on top.
    pub fn with_overrides(overrides: &BTreeMap<ChannelKind, ThresholdOverride>) -> Result<Self> {
        let mut entries = canonical_thresholds();
        for (kind, patch) in overrides {
            if let Some(base) = entries.get(kind) {
                let merged = patch.apply_to(base);
                entries.insert(*kind, merged);
            }
        }
        Self::from_map(entries)
    }

    pub fn get(&self, kind: ChannelKind) -> &QualityThresholds {
        // `from_map` guarantees presence of every kind.
        &self.entries[&kind]
    }

    pub fn resolve(&self, kind: ChannelKind, p_m: f64) -> ResolvedThresholds {
        self.get(kind).resolve(p_m)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChannelKind, &QualityThresholds)> {
        self.entries.iter()
    }
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self::canonical()
    }
}
