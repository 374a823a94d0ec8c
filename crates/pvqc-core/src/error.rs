// crates/pvqc-core/src/error.rs

use thiserror::Error;

use crate::types::ChannelKind;

/// Configuration problems. Raised while building a pipeline, never per day.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no quality thresholds configured for channel {0}")]
    MissingThresholds(ChannelKind),

    #[error("channel {channel}: range_lo ({lo}) exceeds range_hi ({hi})")]
    InvertedRange { channel: ChannelKind, lo: f64, hi: f64 },

    #[error("channel {channel}: {field} must be a finite, non-negative number (got {value})")]
    InvalidThreshold {
        channel: ChannelKind,
        field: &'static str,
        value: f64,
    },

    #[error("system {sys}: {field} must be positive (got {value})")]
    InvalidSystem {
        sys: String,
        field: &'static str,
        value: f64,
    },

    #[error("corroboration window start {start} is not before end {end}")]
    InvertedWindow {
        start: chrono::NaiveTime,
        end: chrono::NaiveTime,
    },

    #[error("corroboration min_density must be within (0, 1] (got {0})")]
    InvalidDensity(f64),

    #[error("unknown system '{0}'")]
    UnknownSystem(String),

    #[error("failed to parse configuration TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Failures while serializing pipeline outputs.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = ConfigError> = std::result::Result<T, E>;
