use std::collections::BTreeMap;

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::calculator::{self, DailyMetrics, EnergyTotals};
use crate::config::{validate_system, PipelineConfig};
use crate::corroboration::{corroborate, CorroborationPolicy, Verdict};
use crate::energy::daily_total;
use crate::error::Result;
use crate::merge::{merge_channels, JoinedTable};
use crate::quality_filters::{apply_quality_filters, StageCounts};
use crate::resample::{pool_minutes, resample_to_minutes};
use crate::thresholds::ResolvedThresholds;
use crate::types::{ChannelKind, DayInput, Reading, Series, SystemParameters};

pub const PIPELINE_CODE: &str = "pv_daily_qc";
pub const PIPELINE_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelReport {
    pub channel: ChannelKind,
    pub counts: StageCounts,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelOutcome {
    /// Empty when the gate voided the channel.
    pub series: Series,
    pub report: ChannelReport,
}

/// Resamples one raw channel and runs the quality filters, without gating.
pub fn filter_channel(
    readings: &[Reading],
    day: NaiveDate,
    thresholds: &ResolvedThresholds,
) -> (Series, StageCounts) {
    let resampled = resample_to_minutes(readings, day);
    apply_quality_filters(&resampled, thresholds)
}

fn gate(
    channel: ChannelKind,
    filtered: Series,
    counts: StageCounts,
    day: NaiveDate,
    policy: &CorroborationPolicy,
) -> ChannelOutcome {
    let verdict = corroborate(&filtered.timestamps(), day, policy);
    let series = match verdict {
        Verdict::Insufficient(reason) => {
            info!(%channel, %day, %reason, rows = filtered.len(), "Channel voided for the day");
            Series::empty()
        }
        _ => filtered,
    };

    ChannelOutcome {
        series,
        report: ChannelReport {
            channel,
            counts,
            verdict,
        },
    }
}

/// Resample, filter and gate one channel for one day.
pub fn process_channel(
    channel: ChannelKind,
    readings: &[Reading],
    day: NaiveDate,
    thresholds: &ResolvedThresholds,
    policy: &CorroborationPolicy,
) -> ChannelOutcome {
    let (filtered, counts) = filter_channel(readings, day, thresholds);
    debug!(
        %channel,
        %day,
        resampled = counts.resampled,
        in_range = counts.in_range,
        dead_removed = counts.dead_removed,
        abrupt_removed = counts.abrupt_removed,
        retained = counts.retained,
        "Filtered channel"
    );
    gate(channel, filtered, counts, day, policy)
}

/// Filters the center and side probes independently, pools them per minute,
/// then gates the pooled series as a single channel.
pub fn process_module_temperature(
    center: &[Reading],
    side: &[Reading],
    day: NaiveDate,
    thresholds: &ResolvedThresholds,
    policy: &CorroborationPolicy,
) -> ChannelOutcome {
    let (center_filtered, center_counts) = filter_channel(center, day, thresholds);
    let (side_filtered, side_counts) = filter_channel(side, day, thresholds);
    let pooled = pool_minutes(&[&center_filtered, &side_filtered]);

    let counts = StageCounts {
        resampled: center_counts.resampled + side_counts.resampled,
        daylight: center_counts.daylight + side_counts.daylight,
        in_range: center_counts.in_range + side_counts.in_range,
        dead_removed: center_counts.dead_removed + side_counts.dead_removed,
        abrupt_removed: center_counts.abrupt_removed + side_counts.abrupt_removed,
        retained: pooled.len(),
    };
    debug!(
        %day,
        center = center_filtered.len(),
        side = side_filtered.len(),
        pooled = pooled.len(),
        "Pooled module temperature probes"
    );

    gate(ChannelKind::ModuleTemperature, pooled, counts, day, policy)
}

#[derive(Debug, Clone)]
pub struct DayOutput {
    pub day: NaiveDate,
    pub irradiance: Series,
    pub module_temperature: Series,
    pub dc_power: Series,
    pub ac_power: Series,
    pub table: JoinedTable,
    pub metrics: DailyMetrics,
    pub reports: Vec<ChannelReport>,
}

impl DayOutput {
    pub fn series(&self, kind: ChannelKind) -> &Series {
        match kind {
            ChannelKind::Irradiance => &self.irradiance,
            ChannelKind::ModuleTemperature => &self.module_temperature,
            ChannelKind::DcPower => &self.dc_power,
            ChannelKind::AcPower => &self.ac_power,
        }
    }
}

/// Daily quality-control pipeline bound to one PV system.
///
/// Thresholds are resolved against the system's nominal power when the
/// pipeline is built, so configuration problems surface before any day runs.
#[derive(Debug, Clone)]
pub struct QualityPipeline {
    system: SystemParameters,
    policy: CorroborationPolicy,
    thresholds: BTreeMap<ChannelKind, ResolvedThresholds>,
}

impl QualityPipeline {
    pub fn new(config: &PipelineConfig, system: SystemParameters) -> Result<Self> {
        validate_system(&system)?;
        config.corroboration.validate()?;

        let thresholds = ChannelKind::ALL
            .iter()
            .map(|kind| (*kind, config.thresholds.resolve(*kind, system.p_m)))
            .collect();

        Ok(Self {
            system,
            policy: config.corroboration,
            thresholds,
        })
    }

    pub fn system(&self) -> &SystemParameters {
        &self.system
    }

    pub fn thresholds(&self, kind: ChannelKind) -> &ResolvedThresholds {
        &self.thresholds[&kind]
    }

    pub fn run_day(&self, input: &DayInput) -> DayOutput {
        let day = input.day;
        let policy = &self.policy;

        let irradiance = process_channel(
            ChannelKind::Irradiance,
            &input.irradiance,
            day,
            self.thresholds(ChannelKind::Irradiance),
            policy,
        );
        let module_temperature = process_module_temperature(
            &input.module_temperature_center,
            &input.module_temperature_side,
            day,
            self.thresholds(ChannelKind::ModuleTemperature),
            policy,
        );
        let dc_power = process_channel(
            ChannelKind::DcPower,
            &input.dc_power,
            day,
            self.thresholds(ChannelKind::DcPower),
            policy,
        );
        let ac_power = process_channel(
            ChannelKind::AcPower,
            &input.ac_power,
            day,
            self.thresholds(ChannelKind::AcPower),
            policy,
        );

        let table = merge_channels(&[
            (ChannelKind::Irradiance, &irradiance.series),
            (ChannelKind::ModuleTemperature, &module_temperature.series),
            (ChannelKind::DcPower, &dc_power.series),
            (ChannelKind::AcPower, &ac_power.series),
        ]);

        let totals = EnergyTotals {
            h: daily_total(&irradiance.series),
            e_dc: daily_total(&dc_power.series),
            e_ac: daily_total(&ac_power.series),
        };
        let synchronized = calculator::synchronized_totals(&table);
        let metrics = calculator::compute_daily_metrics(day, totals, synchronized, &self.system);

        info!(
            sys = %self.system.sys,
            %day,
            rows = table.len(),
            h = ?totals.h,
            e_dc = ?totals.e_dc,
            e_ac = ?totals.e_ac,
            "Processed day"
        );

        DayOutput {
            day,
            reports: vec![
                irradiance.report,
                module_temperature.report,
                dc_power.report,
                ac_power.report,
            ],
            irradiance: irradiance.series,
            module_temperature: module_temperature.series,
            dc_power: dc_power.series,
            ac_power: ac_power.series,
            table,
            metrics,
        }
    }

    /// Runs independent days in parallel; outputs come back in day order.
    pub fn run_days(&self, inputs: &[DayInput]) -> Vec<DayOutput> {
        let mut outputs: Vec<DayOutput> = inputs.par_iter().map(|input| self.run_day(input)).collect();
        outputs.sort_by_key(|output| output.day);
        outputs
    }
}
