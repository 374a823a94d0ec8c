use anyhow::Result;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use pvqc_core::config::PipelineConfig;
use pvqc_core::corroboration::{InsufficientReason, Verdict};
use pvqc_core::error::ConfigError;
use pvqc_core::pipelines::QualityPipeline;
use pvqc_core::types::{ChannelKind, DayInput, Reading, SystemParameters};

const MINUTES: i64 = 720;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 7, d).unwrap()
}

fn sunrise(day: NaiveDate) -> NaiveDateTime {
    day.and_hms_opt(6, 0, 0).unwrap()
}

/// Linear ramp from 20 W/m² at 06:00 up to 740 at noon and back down by 18:00.
fn irradiance_at(minute: i64) -> f64 {
    20.0 + 2.0 * minute.min(MINUTES - minute) as f64
}

fn readings<F>(day: NaiveDate, from: i64, to: i64, value: F) -> Vec<Reading>
where
    F: Fn(i64) -> f64,
{
    (from..=to)
        .map(|m| Reading::new(sunrise(day) + Duration::minutes(m), Some(value(m))))
        .collect()
}

fn clear_day(d: NaiveDate) -> DayInput {
    let mut input = DayInput::new(d);
    input.irradiance = readings(d, 0, MINUTES, irradiance_at);
    input.module_temperature_center = readings(d, 0, MINUTES, |m| 20.0 + (m % 10) as f64 * 0.5);
    input.module_temperature_side = readings(d, 0, MINUTES, |m| 21.0 + (m % 10) as f64 * 0.5);
    input.dc_power = readings(d, 0, MINUTES, irradiance_at);
    input.ac_power = readings(d, 0, MINUTES, |m| 0.95 * irradiance_at(m));
    input
}

fn system() -> SystemParameters {
    SystemParameters {
        sys: "pv-1".to_string(),
        loc: "roof".to_string(),
        module: "m1".to_string(),
        p_m: 1000.0,
        area: 6.5,
        gamma: -0.004,
    }
}

fn pipeline() -> Result<QualityPipeline> {
    Ok(QualityPipeline::new(&PipelineConfig::default(), system())?)
}

#[test]
fn clear_day_produces_full_metrics() -> Result<()> {
    let output = pipeline()?.run_day(&clear_day(day(2)));

    assert_eq!(output.table.len(), 721);
    for report in &output.reports {
        assert!(
            matches!(report.verdict, Verdict::Sufficient { .. }),
            "{} was {:?}",
            report.channel,
            report.verdict
        );
    }

    let totals = output.metrics.totals;
    assert!((totals.h.unwrap() - 4560.0).abs() < 1e-6);
    assert!((totals.e_dc.unwrap() - 4560.0).abs() < 1e-6);
    assert!((totals.e_ac.unwrap() - 4332.0).abs() < 1e-6);
    assert!((output.metrics.yields.y_r.unwrap() - 4.56).abs() < 1e-9);
    assert_eq!(output.metrics.synchronized, totals);
    Ok(())
}

#[test]
fn module_temperature_probes_are_pooled() -> Result<()> {
    let output = pipeline()?.run_day(&clear_day(day(2)));

    let first = output.module_temperature.samples()[0];
    assert_eq!(first.timestamp, sunrise(day(2)));
    assert!((first.value - 20.5).abs() < 1e-9);
    assert_eq!(output.module_temperature.len(), 721);
    Ok(())
}

#[test]
fn partial_channel_is_voided_and_leaves_metrics_undefined() -> Result<()> {
    let mut input = clear_day(day(2));
    // AC logger only reported between 11:00 and 12:00
    input.ac_power = readings(day(2), 300, 360, |m| 0.95 * irradiance_at(m));

    let output = pipeline()?.run_day(&input);

    assert!(output.ac_power.is_empty());
    let ac_report = output
        .reports
        .iter()
        .find(|r| r.channel == ChannelKind::AcPower)
        .unwrap();
    assert_eq!(
        ac_report.verdict,
        Verdict::Insufficient(InsufficientReason::NoSamplesBeforeWindow)
    );
    assert_eq!(ac_report.counts.retained, 61);

    assert_eq!(output.metrics.totals.e_ac, None);
    assert_eq!(output.metrics.yields.y_f, None);
    assert!(output.metrics.yields.y_r.is_some());
    assert!(!output.metrics.performance_ratio.any_defined());
    assert!(output.table.rows().iter().all(|row| row.ac_power.is_none()));
    Ok(())
}

#[test]
fn disabled_gate_keeps_partial_channels() -> Result<()> {
    let mut config = PipelineConfig::default();
    config.corroboration.enabled = false;
    let pipeline = QualityPipeline::new(&config, system())?;

    let mut input = clear_day(day(2));
    input.ac_power = readings(day(2), 300, 360, |m| 0.95 * irradiance_at(m));
    let output = pipeline.run_day(&input);

    assert_eq!(output.ac_power.len(), 61);
    assert!(output.metrics.totals.e_ac.is_some());
    assert!(output.metrics.performance_ratio.y_r.is_some());
    Ok(())
}

#[test]
fn out_of_range_power_is_removed_before_integration() -> Result<()> {
    let mut input = clear_day(day(2));
    // 5 kW is beyond 1.2 * p_m
    input.dc_power[100].value = Some(5000.0);

    let output = pipeline()?.run_day(&input);
    let dc_report = output
        .reports
        .iter()
        .find(|r| r.channel == ChannelKind::DcPower)
        .unwrap();

    assert_eq!(dc_report.counts.resampled, 721);
    assert_eq!(dc_report.counts.in_range, 720);
    assert!(output.dc_power.values().iter().all(|v| *v <= 1200.0));
    Ok(())
}

#[test]
fn days_come_back_in_order() -> Result<()> {
    let inputs = vec![clear_day(day(4)), clear_day(day(2)), clear_day(day(3))];

    let outputs = pipeline()?.run_days(&inputs);

    let days: Vec<NaiveDate> = outputs.iter().map(|o| o.day).collect();
    assert_eq!(days, vec![day(2), day(3), day(4)]);
    assert!(outputs
        .iter()
        .all(|o| o.table.rows().iter().all(|row| row.timestamp.date() == o.day)));
    Ok(())
}

#[test]
fn invalid_system_is_rejected() {
    let mut bad = system();
    bad.p_m = 0.0;

    let err = QualityPipeline::new(&PipelineConfig::default(), bad).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidSystem { field: "p_m", .. }));
}

#[test]
fn power_thresholds_follow_nominal_power() -> Result<()> {
    let mut big = system();
    big.p_m = 2000.0;
    let pipeline = QualityPipeline::new(&PipelineConfig::default(), big)?;

    let thresholds = pipeline.thresholds(ChannelKind::AcPower);
    assert!((thresholds.range_hi - 2400.0).abs() < 1e-9);
    assert!((thresholds.abrupt_max_slope - 1600.0).abs() < 1e-9);
    Ok(())
}
