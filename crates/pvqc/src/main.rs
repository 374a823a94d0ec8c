use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Table};
use pvqc_core::merge::JoinedTable;
use pvqc_core::outputs::{
    build_metrics_report, build_series_report, metrics_dataframe, write_json, write_table,
    TableFormat,
};
use pvqc_core::pipelines::{DayOutput, QualityPipeline, PIPELINE_CODE, PIPELINE_VERSION};
use pvqc_core::types::ChannelKind;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod input;
mod settings;

#[derive(Parser, Debug)]
#[command(author, version, about = "Quality control and daily metrics for PV monitoring data", long_about = None)]
struct Cli {
    /// Configuration file (defaults to $PVQC_CONFIG, then ./pvqc.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clean one system's readings over a date range and compute daily metrics
    Process(ProcessArgs),
    /// Print the thresholds resolved for a system
    Thresholds(ThresholdsArgs),
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Csv,
    Parquet,
}

impl From<OutputFormat> for TableFormat {
    fn from(value: OutputFormat) -> Self {
        match value {
            OutputFormat::Csv => TableFormat::Csv,
            OutputFormat::Parquet => TableFormat::Parquet,
        }
    }
}

#[derive(Args, Debug)]
struct ProcessArgs {
    /// System identifier as listed under [[systems]]
    #[arg(long)]
    system: String,
    /// Environmental logger CSV (irradiance and module temperatures)
    #[arg(long)]
    daq: PathBuf,
    /// Inverter CSV (DC and AC power)
    #[arg(long)]
    sfcr: PathBuf,
    /// First day, YYYY-MM-DD
    #[arg(long)]
    start: NaiveDate,
    /// Last day (inclusive), YYYY-MM-DD
    #[arg(long)]
    end: NaiveDate,
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,
}

#[derive(Args, Debug)]
struct ThresholdsArgs {
    #[arg(long)]
    system: String,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Process(args) => handle_process(cli.config.as_deref(), args),
        Command::Thresholds(args) => handle_thresholds(cli.config.as_deref(), args),
    }
}

fn handle_process(config: Option<&Path>, args: ProcessArgs) -> Result<()> {
    if args.start > args.end {
        bail!("--start {} is after --end {}", args.start, args.end);
    }

    let settings = settings::load(config)?;
    if let Some(source) = &settings.source {
        info!(path = %source.display(), "Loaded configuration");
    }

    let system = settings.pipeline.system(&args.system)?.clone();
    let pipeline = QualityPipeline::new(&settings.pipeline, system)
        .with_context(|| format!("invalid configuration for system {}", args.system))?;
    let columns = settings.input.columns_for(pipeline.system());

    let daq = input::read_columns_from_path(
        &args.daq,
        &settings.input,
        settings.input.daq_columns.as_deref(),
        &[
            columns.irradiance.as_str(),
            columns.module_temperature_center.as_str(),
            columns.module_temperature_side.as_str(),
        ],
    )?;
    let sfcr = input::read_columns_from_path(
        &args.sfcr,
        &settings.input,
        settings.input.sfcr_columns.as_deref(),
        &[columns.dc_power.as_str(), columns.ac_power.as_str()],
    )?;

    let inputs = input::build_day_inputs(daq, sfcr, &columns, args.start, args.end);
    info!(
        sys = %pipeline.system().sys,
        days = inputs.len(),
        pipeline = PIPELINE_CODE,
        version = PIPELINE_VERSION,
        "Running pipeline"
    );
    let outputs = pipeline.run_days(&inputs);

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create {}", args.out_dir.display()))?;
    let written = write_outputs(&pipeline, &outputs, &args)?;

    println!("--- Processing Summary ---");
    for output in &outputs {
        let voided: Vec<String> = output
            .reports
            .iter()
            .filter(|r| r.verdict.is_voided())
            .map(|r| r.channel.to_string())
            .collect();
        println!(
            "  {}: {} rows, voided: {}",
            output.day,
            output.table.len(),
            if voided.is_empty() { "none".to_string() } else { voided.join(", ") }
        );
    }
    for path in written {
        println!("  wrote {}", path.display());
    }
    Ok(())
}

fn write_outputs(
    pipeline: &QualityPipeline,
    outputs: &[DayOutput],
    args: &ProcessArgs,
) -> Result<Vec<PathBuf>> {
    let system = pipeline.system();
    let format = TableFormat::from(args.format);
    let stem = format!("{}_{}_{}", system.sys, args.start, args.end);
    let mut written = Vec::new();

    let joined = JoinedTable::concat(outputs.iter().map(|o| o.table.clone()));
    let joined_path = args.out_dir.join(format!("{stem}_joined.{}", format.extension()));
    let joined_df = joined
        .to_dataframe()
        .context("failed to build joined table")?;
    write_table(&joined_df, &joined_path, format)
        .with_context(|| format!("failed to write {}", joined_path.display()))?;
    written.push(joined_path);

    let metrics: Vec<_> = outputs.iter().map(|o| o.metrics.clone()).collect();
    let metrics_path = args.out_dir.join(format!("{stem}_metrics.{}", format.extension()));
    write_table(&metrics_dataframe(&metrics)?, &metrics_path, format)
        .with_context(|| format!("failed to write {}", metrics_path.display()))?;
    written.push(metrics_path);

    let report = json!({
        "pipeline": PIPELINE_CODE,
        "version": PIPELINE_VERSION,
        "metrics": build_metrics_report(system, &metrics),
        "series": build_series_report(system, outputs),
    });
    let report_path = args.out_dir.join(format!("{stem}_report.json"));
    write_json(&report, &report_path)
        .with_context(|| format!("failed to write {}", report_path.display()))?;
    written.push(report_path);

    Ok(written)
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v}"))
}

fn handle_thresholds(config: Option<&Path>, args: ThresholdsArgs) -> Result<()> {
    let settings = settings::load(config)?;
    let system = settings.pipeline.system(&args.system)?.clone();
    let pipeline = QualityPipeline::new(&settings.pipeline, system)?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Channel",
        "Daylight floor",
        "Range low",
        "Range high",
        "Dead eps",
        "Dead floor",
        "Abrupt max",
    ]);
    for kind in ChannelKind::ALL {
        let t = pipeline.thresholds(kind);
        table.add_row(vec![
            kind.to_string(),
            fmt_opt(t.daylight_floor),
            format!("{}", t.range_lo),
            format!("{}", t.range_hi),
            fmt_opt(t.dead_derivative_eps),
            fmt_opt(t.dead_value_floor),
            format!("{}", t.abrupt_max_slope),
        ]);
    }

    let policy = settings.pipeline.corroboration;
    println!(
        "System {} (p_m = {} W, area = {} m²)",
        pipeline.system().sys,
        pipeline.system().p_m,
        pipeline.system().area
    );
    println!("{table}");
    println!(
        "Corroboration: {} (window {}..{}, min density {})",
        if policy.enabled { "enabled" } else { "disabled" },
        policy.window_start,
        policy.window_end,
        policy.min_density
    );
    Ok(())
}
