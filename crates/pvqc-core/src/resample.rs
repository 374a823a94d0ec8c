use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::types::{Reading, Sample, Series};

#[derive(Default)]
struct MinuteBucket {
    sum: f64,
    count: usize,
}

impl MinuteBucket {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }
}

fn minute_start(time: NaiveTime) -> NaiveTime {
    // hour < 24 and minute < 60 always hold for a NaiveTime.
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

fn bucket_means(buckets: BTreeMap<NaiveDateTime, MinuteBucket>) -> Series {
    Series::from_sorted(
        buckets
            .into_iter()
            .map(|(ts, bucket)| Sample::new(ts, bucket.mean()))
            .collect(),
    )
}

/// Re-dates every reading onto `day` (keeping its time of day) and averages
/// the defined values falling in each minute.
///
/// Minutes without a defined value are left out of the result.
pub fn resample_to_minutes(readings: &[Reading], day: NaiveDate) -> Series {
    let mut buckets: BTreeMap<NaiveDateTime, MinuteBucket> = BTreeMap::new();

    for reading in readings {
        let Some(value) = reading.defined_value() else {
            continue;
        };
        let key = day.and_time(minute_start(reading.timestamp.time()));
        buckets.entry(key).or_default().push(value);
    }

    bucket_means(buckets)
}

/// Concatenates several series and re-averages per minute.
///
/// Used to pool the module temperature probes into a single channel.
pub fn pool_minutes(parts: &[&Series]) -> Series {
    let mut buckets: BTreeMap<NaiveDateTime, MinuteBucket> = BTreeMap::new();

    for series in parts {
        for sample in series.iter() {
            let key = sample
                .timestamp
                .date()
                .and_time(minute_start(sample.timestamp.time()));
            buckets.entry(key).or_default().push(sample.value);
        }
    }

    bucket_means(buckets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minute_start_drops_seconds_and_fraction() {
        let t = NaiveTime::from_hms_milli_opt(7, 15, 42, 250).unwrap();
        assert_eq!(minute_start(t), NaiveTime::from_hms_opt(7, 15, 0).unwrap());
    }
}
