//! Temporal-coverage gate applied to each filtered channel before integration.
//!
//! A channel only counts for a day when it reaches both sides of the solar-noon
//! window and is dense enough between its first and last sample. Anything else
//! voids the whole channel for that day.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

const SECONDS_PER_MINUTE: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorroborationPolicy {
    /// When false every channel passes, keeping partial days.
    pub enabled: bool,
    pub window_start: NaiveTime,
    pub window_end: NaiveTime,
    pub min_density: f64,
}

impl Default for CorroborationPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            window_start: NaiveTime::from_hms_opt(10, 30, 0).unwrap_or(NaiveTime::MIN),
            window_end: NaiveTime::from_hms_opt(13, 30, 0).unwrap_or(NaiveTime::MIN),
            min_density: 0.8,
        }
    }
}

impl CorroborationPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.window_start >= self.window_end {
            return Err(ConfigError::InvertedWindow {
                start: self.window_start,
                end: self.window_end,
            });
        }
        if !(self.min_density > 0.0 && self.min_density <= 1.0) {
            return Err(ConfigError::InvalidDensity(self.min_density));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InsufficientReason {
    Empty,
    TooFewSamples,
    NoSamplesBeforeWindow,
    NoSamplesAfterWindow,
    SparseCoverage { density: f64 },
}

impl fmt::Display for InsufficientReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsufficientReason::Empty => f.write_str("no samples"),
            InsufficientReason::TooFewSamples => f.write_str("fewer than two samples"),
            InsufficientReason::NoSamplesBeforeWindow => {
                f.write_str("no samples before the corroboration window")
            }
            InsufficientReason::NoSamplesAfterWindow => {
                f.write_str("no samples after the corroboration window")
            }
            InsufficientReason::SparseCoverage { density } => {
                write!(f, "sample density {density:.4} below threshold")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Sufficient { density: f64 },
    Insufficient(InsufficientReason),
    /// The gate is disabled by configuration.
    Skipped,
}

impl Verdict {
    pub fn is_voided(&self) -> bool {
        matches!(self, Verdict::Insufficient(_))
    }
}

/// Judges the sorted timestamps of one channel on `day`.
pub fn corroborate(
    timestamps: &[NaiveDateTime],
    day: NaiveDate,
    policy: &CorroborationPolicy,
) -> Verdict {
    if !policy.enabled {
        return Verdict::Skipped;
    }

    let (Some(&first), Some(&last)) = (timestamps.first(), timestamps.last()) else {
        return Verdict::Insufficient(InsufficientReason::Empty);
    };

    let start = day.and_time(policy.window_start);
    let end = day.and_time(policy.window_end);

    if !timestamps.iter().any(|ts| *ts < start) {
        return Verdict::Insufficient(InsufficientReason::NoSamplesBeforeWindow);
    }
    if !timestamps.iter().any(|ts| *ts > end) {
        return Verdict::Insufficient(InsufficientReason::NoSamplesAfterWindow);
    }
    if timestamps.len() < 2 {
        return Verdict::Insufficient(InsufficientReason::TooFewSamples);
    }

    let span_minutes = (last - first).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_MINUTE;
    let density = timestamps.len() as f64 / (span_minutes + 1.0);
    if !density.is_finite() {
        return Verdict::Insufficient(InsufficientReason::SparseCoverage { density });
    }
    if density < policy.min_density {
        return Verdict::Insufficient(InsufficientReason::SparseCoverage { density });
    }

    Verdict::Sufficient { density }
}
