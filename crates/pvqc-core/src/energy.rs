use crate::types::{fractional_hour, Series};

/// Trapezoidal integral of the series over fractional hours of the day.
///
/// W in gives Wh out, W/m² gives Wh/m². Fewer than two samples leave no
/// interval to integrate over and give `0.0`.
pub fn integrate(series: &Series) -> f64 {
    let samples = series.samples();
    if samples.len() < 2 {
        return 0.0;
    }

    samples
        .windows(2)
        .map(|pair| {
            let dx = fractional_hour(pair[1].timestamp) - fractional_hour(pair[0].timestamp);
            dx * (pair[0].value + pair[1].value) / 2.0
        })
        .sum()
}

/// Daily total of a channel: undefined when the channel has no data for the day.
pub fn daily_total(series: &Series) -> Option<f64> {
    if series.is_empty() {
        None
    } else {
        Some(integrate(series))
    }
}
