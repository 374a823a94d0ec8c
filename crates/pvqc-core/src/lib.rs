pub mod calculator;
pub mod config;
pub mod corroboration;
pub mod energy;
pub mod error;
pub mod merge;
pub mod outputs;
pub mod pipelines;
pub mod quality_filters;
pub mod resample;
pub mod thresholds;
pub mod types;
