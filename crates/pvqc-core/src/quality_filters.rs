use crate::thresholds::ResolvedThresholds;
use crate::types::{Sample, Series};

/// Keeps samples with `lower_limit <= value <= upper_limit`.
pub fn select_range(series: &Series, lower_limit: f64, upper_limit: f64) -> Series {
    series.retain_where(|s| lower_limit <= s.value && s.value <= upper_limit)
}

/// Keeps samples with `value >= floor`. Irradiance below the floor is night or noise.
pub fn daylight(series: &Series, floor: f64) -> Series {
    series.retain_where(|s| s.value >= floor)
}

/// `|v[i] - v[i-1]| / (t[i] - t[i-1])` in units per second.
///
/// The first entry is always `None`; so is any entry with a non-positive time step.
pub fn derivative(series: &Series) -> Vec<Option<f64>> {
    let samples = series.samples();
    let mut out = Vec::with_capacity(samples.len());
    if samples.is_empty() {
        return out;
    }
    out.push(None);

    for pair in samples.windows(2) {
        let (prev, curr) = (pair[0], pair[1]);
        let seconds = (curr.timestamp - prev.timestamp).num_milliseconds() as f64 / 1000.0;
        if seconds > 0.0 {
            out.push(Some((curr.value - prev.value).abs() / seconds));
        } else {
            out.push(None);
        }
    }

    out
}

fn is_dead(sample: &Sample, derivative: Option<f64>, eps: f64, floor: Option<f64>) -> bool {
    let Some(d) = derivative else {
        return false;
    };
    let flat = d <= eps;
    match floor {
        Some(floor) => flat && sample.value > floor,
        None => flat,
    }
}

fn is_abrupt(derivative: Option<f64>, max_slope: f64) -> bool {
    matches!(derivative, Some(d) if d > max_slope)
}

/// Removes rows whose slope is at or below `eps` (and, with a floor, whose value
/// is above it). `derivatives` must line up with `series`.
pub fn dead_values(
    series: &Series,
    derivatives: &[Option<f64>],
    eps: f64,
    floor: Option<f64>,
) -> Series {
    keep_indexed(series, |idx, sample| {
        !is_dead(sample, derivatives.get(idx).copied().flatten(), eps, floor)
    })
}

/// Removes rows whose slope exceeds `max_slope`. Undefined slopes are kept.
pub fn abrupt_change(series: &Series, derivatives: &[Option<f64>], max_slope: f64) -> Series {
    keep_indexed(series, |idx, _| {
        !is_abrupt(derivatives.get(idx).copied().flatten(), max_slope)
    })
}

fn keep_indexed<F>(series: &Series, mut keep: F) -> Series
where
    F: FnMut(usize, &Sample) -> bool,
{
    let mut idx = 0usize;
    series.retain_where(|sample| {
        let kept = keep(idx, sample);
        idx += 1;
        kept
    })
}

/// Row counts surviving each filter stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCounts {
    pub resampled: usize,
    pub daylight: usize,
    pub in_range: usize,
    pub dead_removed: usize,
    pub abrupt_removed: usize,
    pub retained: usize,
}

/// Daylight, range, then the dead and abrupt filters on one resampled series.
///
/// The derivative is taken once, after the range filter, and both derivative
/// filters judge against it: a row is kept only if neither removes it.
pub fn apply_quality_filters(
    resampled: &Series,
    thresholds: &ResolvedThresholds,
) -> (Series, StageCounts) {
    let mut counts = StageCounts {
        resampled: resampled.len(),
        ..StageCounts::default()
    };

    let lit = match thresholds.daylight_floor {
        Some(floor) => daylight(resampled, floor),
        None => resampled.clone(),
    };
    counts.daylight = lit.len();

    let ranged = select_range(&lit, thresholds.range_lo, thresholds.range_hi);
    counts.in_range = ranged.len();

    let derivatives = derivative(&ranged);

    let mut dead_removed = 0usize;
    let mut abrupt_removed = 0usize;
    let filtered = keep_indexed(&ranged, |idx, sample| {
        let d = derivatives.get(idx).copied().flatten();
        let dead = thresholds
            .dead_derivative_eps
            .is_some_and(|eps| is_dead(sample, d, eps, thresholds.dead_value_floor));
        let abrupt = is_abrupt(d, thresholds.abrupt_max_slope);
        if dead {
            dead_removed += 1;
        }
        if abrupt {
            abrupt_removed += 1;
        }
        !(dead || abrupt)
    });

    counts.dead_removed = dead_removed;
    counts.abrupt_removed = abrupt_removed;
    counts.retained = filtered.len();

    (filtered, counts)
}
