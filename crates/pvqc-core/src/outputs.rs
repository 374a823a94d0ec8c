//! Serialization of pipeline results for the metrics-ingestion API and for files.
//!
//! Payloads are columnar (one list per field) and grouped per system, the way
//! the ingestion endpoints accept them. Every number is rounded to four
//! decimals and dates use `YYYY-MM-DD`.

use std::fs::File;
use std::path::Path;

use polars::io::parquet::write::{ParquetCompression, ParquetWriter, StatisticsOptions};
use polars::prelude::{CsvWriter, DataFrame, NamedFrom, SerWriter, Series};
use serde::Serialize;

use crate::calculator::DailyMetrics;
use crate::error::OutputError;
use crate::pipelines::DayOutput;
use crate::types::{ChannelKind, SystemParameters};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn round_opt(value: Option<f64>) -> Option<f64> {
    value.map(round4)
}

/// One scalar per day, e.g. `energies` or `yields`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuePayload {
    pub sys: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub day: Vec<String>,
    pub val: Vec<f64>,
}

impl ValuePayload {
    fn collect<F>(sys: &str, kind: &str, metrics: &[DailyMetrics], value: F) -> Self
    where
        F: Fn(&DailyMetrics) -> Option<f64>,
    {
        let mut day = Vec::new();
        let mut val = Vec::new();
        for m in metrics {
            if let Some(v) = value(m) {
                day.push(m.day.format(DATE_FORMAT).to_string());
                val.push(round4(v));
            }
        }
        Self {
            sys: sys.to_string(),
            kind: kind.to_string(),
            day,
            val,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.day.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EfficiencyPayload {
    pub sys: String,
    pub day: Vec<String>,
    pub e_dc: Vec<Option<f64>>,
    pub e_ac: Vec<Option<f64>>,
    /// Insolation times module area.
    pub h: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceRatioPayload {
    pub sys: String,
    pub day: Vec<String>,
    pub y_r: Vec<Option<f64>>,
    pub y_a: Vec<Option<f64>>,
    pub y_f: Vec<Option<f64>>,
}

/// Everything posted for one system over a run of days.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    pub energies: Vec<ValuePayload>,
    pub yields: Vec<ValuePayload>,
    pub efficiencies: EfficiencyPayload,
    pub performance_ratios: PerformanceRatioPayload,
}

/// Builds the per-endpoint payloads. Days where a record would hold only
/// undefined values are left out of that record.
pub fn build_metrics_report(system: &SystemParameters, metrics: &[DailyMetrics]) -> MetricsReport {
    let sys = system.sys.as_str();

    let energies = vec![
        ValuePayload::collect(sys, "dc", metrics, |m| m.totals.e_dc),
        ValuePayload::collect(sys, "ac", metrics, |m| m.totals.e_ac),
    ];
    let yields = vec![
        ValuePayload::collect(sys, "r", metrics, |m| m.yields.y_r),
        ValuePayload::collect(sys, "a", metrics, |m| m.yields.y_a),
        ValuePayload::collect(sys, "f", metrics, |m| m.yields.y_f),
    ];

    let mut efficiencies = EfficiencyPayload {
        sys: sys.to_string(),
        ..EfficiencyPayload::default()
    };
    let mut performance_ratios = PerformanceRatioPayload {
        sys: sys.to_string(),
        ..PerformanceRatioPayload::default()
    };

    for m in metrics {
        let day = m.day.format(DATE_FORMAT).to_string();

        if m.efficiency.any_defined() {
            efficiencies.day.push(day.clone());
            efficiencies.e_dc.push(round_opt(m.efficiency.e_dc));
            efficiencies.e_ac.push(round_opt(m.efficiency.e_ac));
            efficiencies.h.push(round_opt(m.efficiency.h_area));
        }

        if m.performance_ratio.any_defined() {
            performance_ratios.day.push(day);
            performance_ratios.y_r.push(round_opt(m.performance_ratio.y_r));
            performance_ratios.y_a.push(round_opt(m.performance_ratio.y_a));
            performance_ratios.y_f.push(round_opt(m.performance_ratio.y_f));
        }
    }

    MetricsReport {
        energies,
        yields,
        efficiencies,
        performance_ratios,
    }
}

/// Cleaned per-minute series as accepted by the series endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeriesPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sys: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub dt: Vec<String>,
    pub val: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesReport {
    pub irradiances: SeriesPayload,
    pub module_temperatures: SeriesPayload,
    pub powers: Vec<SeriesPayload>,
}

fn series_payload(
    outputs: &[DayOutput],
    channel: ChannelKind,
    loc: Option<&str>,
    sys: Option<&str>,
    kind: Option<&str>,
) -> SeriesPayload {
    let mut payload = SeriesPayload {
        loc: loc.map(str::to_string),
        sys: sys.map(str::to_string),
        kind: kind.map(str::to_string),
        ..SeriesPayload::default()
    };
    for output in outputs {
        for sample in output.series(channel) {
            payload
                .dt
                .push(sample.timestamp.format(DATETIME_FORMAT).to_string());
            payload.val.push(round4(sample.value));
        }
    }
    payload
}

pub fn build_series_report(system: &SystemParameters, outputs: &[DayOutput]) -> SeriesReport {
    let sys = Some(system.sys.as_str());
    SeriesReport {
        irradiances: series_payload(
            outputs,
            ChannelKind::Irradiance,
            Some(system.loc.as_str()),
            None,
            None,
        ),
        module_temperatures: series_payload(
            outputs,
            ChannelKind::ModuleTemperature,
            None,
            sys,
            None,
        ),
        powers: vec![
            series_payload(outputs, ChannelKind::DcPower, None, sys, Some("dc")),
            series_payload(outputs, ChannelKind::AcPower, None, sys, Some("ac")),
        ],
    }
}

/// Daily totals table: `day, h, e_dc, e_ac, h_sync, e_dc_sync, e_ac_sync`.
pub fn metrics_dataframe(metrics: &[DailyMetrics]) -> Result<DataFrame, OutputError> {
    let column = |name: &str, pick: fn(&DailyMetrics) -> Option<f64>| -> Series {
        let values: Vec<Option<f64>> = metrics.iter().map(|m| round_opt(pick(m))).collect();
        Series::new(name.into(), values)
    };

    let days: Vec<String> = metrics
        .iter()
        .map(|m| m.day.format(DATE_FORMAT).to_string())
        .collect();

    let df = DataFrame::new(vec![
        Series::new("day".into(), days).into(),
        column("h", |m| m.totals.h).into(),
        column("e_dc", |m| m.totals.e_dc).into(),
        column("e_ac", |m| m.totals.e_ac).into(),
        column("h_sync", |m| m.synchronized.h).into(),
        column("e_dc_sync", |m| m.synchronized.e_dc).into(),
        column("e_ac_sync", |m| m.synchronized.e_ac).into(),
    ])?;
    Ok(df)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableFormat {
    #[default]
    Csv,
    Parquet,
}

impl TableFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TableFormat::Csv => "csv",
            TableFormat::Parquet => "parquet",
        }
    }
}

pub fn write_table(df: &DataFrame, path: &Path, format: TableFormat) -> Result<(), OutputError> {
    let mut file = File::create(path)?;
    let mut clone = df.clone();
    match format {
        TableFormat::Csv => {
            CsvWriter::new(&mut file)
                .include_header(true)
                .with_datetime_format(Some(DATETIME_FORMAT.to_string()))
                .finish(&mut clone)?;
        }
        TableFormat::Parquet => {
            ParquetWriter::new(&mut file)
                .with_compression(ParquetCompression::Zstd(None))
                .with_statistics(StatisticsOptions::default())
                .finish(&mut clone)?;
        }
    }
    Ok(())
}

pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), OutputError> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}
