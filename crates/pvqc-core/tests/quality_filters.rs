use chrono::{Duration, NaiveDate, NaiveDateTime};
use pvqc_core::quality_filters::{
    abrupt_change, apply_quality_filters, dead_values, derivative, select_range,
};
use pvqc_core::thresholds::ResolvedThresholds;
use pvqc_core::types::{Sample, Series};

fn base() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2022, 7, 2)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

/// One sample per minute starting at 09:00.
fn minute_series(values: &[f64]) -> Series {
    Series::from_samples(
        values
            .iter()
            .enumerate()
            .map(|(idx, v)| Sample::new(base() + Duration::minutes(idx as i64), *v))
            .collect(),
    )
}

#[test]
fn range_filter_keeps_inclusive_bounds() {
    let series = minute_series(&[-7.0, -6.0, 0.0, 1500.0, 1500.5]);
    let kept = select_range(&series, -6.0, 1500.0);

    assert_eq!(kept.values(), vec![-6.0, 0.0, 1500.0]);
    for sample in &kept {
        assert!((-6.0..=1500.0).contains(&sample.value));
    }
    for sample in &series {
        if !kept.timestamps().contains(&sample.timestamp) {
            assert!(!(-6.0..=1500.0).contains(&sample.value));
        }
    }
}

#[test]
fn derivative_is_per_second_and_undefined_first() {
    let series = minute_series(&[0.0, 60.0, 0.0]);
    let d = derivative(&series);

    assert_eq!(d.len(), 3);
    assert!(d[0].is_none());
    assert!((d[1].unwrap() - 1.0).abs() < 1e-12);
    assert!((d[2].unwrap() - 1.0).abs() < 1e-12);
}

#[test]
fn derivative_uses_actual_gap_length() {
    let series = Series::from_samples(vec![
        Sample::new(base(), 100.0),
        Sample::new(base() + Duration::minutes(10), 160.0),
    ]);
    let d = derivative(&series);
    assert!((d[1].unwrap() - 0.1).abs() < 1e-12);
}

#[test]
fn dead_values_with_floor_only_remove_flat_rows_above_floor() {
    // flat at 3.0 (below floor 5) then flat at 400.0 (above floor)
    let series = minute_series(&[3.0, 3.0, 400.0, 400.0, 410.0]);
    let d = derivative(&series);
    let kept = dead_values(&series, &d, 0.0001, Some(5.0));

    assert_eq!(kept.values(), vec![3.0, 3.0, 400.0, 410.0]);
}

#[test]
fn dead_values_without_floor_remove_any_flat_row() {
    let series = minute_series(&[25.0, 25.0, 25.5, 25.5]);
    let d = derivative(&series);
    let kept = dead_values(&series, &d, 0.0001, None);

    assert_eq!(kept.values(), vec![25.0, 25.5]);
}

#[test]
fn abrupt_change_removes_steep_rows_and_keeps_first() {
    // 0 -> 60000 in a minute is 1000/s
    let series = minute_series(&[0.0, 60000.0, 60010.0]);
    let d = derivative(&series);
    let kept = abrupt_change(&series, &d, 800.0);

    assert_eq!(kept.values(), vec![0.0, 60010.0]);
}

#[test]
fn combined_filters_judge_against_one_derivative() {
    let thresholds = ResolvedThresholds {
        daylight_floor: Some(20.0),
        range_lo: -6.0,
        range_hi: 1500.0,
        dead_derivative_eps: Some(0.0001),
        dead_value_floor: Some(5.0),
        abrupt_max_slope: 5.0,
    };
    // 10 (night), 100, 700 (spike: 10/s), 100 (10/s back down), 130, 130 (stuck)
    let series = minute_series(&[10.0, 100.0, 700.0, 100.0, 130.0, 130.0]);

    let (filtered, counts) = apply_quality_filters(&series, &thresholds);

    assert_eq!(counts.resampled, 6);
    assert_eq!(counts.daylight, 5);
    assert_eq!(counts.in_range, 5);
    assert_eq!(counts.abrupt_removed, 2);
    assert_eq!(counts.dead_removed, 1);
    // The row after the spike is judged on its original slope and removed too;
    // 130 following 100 is kept because the derivative is not recomputed.
    assert_eq!(filtered.values(), vec![100.0, 130.0]);
    assert_eq!(counts.retained, 2);
}

#[test]
fn retained_rows_respect_thresholds() {
    let thresholds = ResolvedThresholds {
        daylight_floor: None,
        range_lo: -30.0,
        range_hi: 50.0,
        dead_derivative_eps: Some(0.0001),
        dead_value_floor: None,
        abrupt_max_slope: 4.0,
    };
    let values: Vec<f64> = (0..120)
        .map(|i| 20.0 + ((i * 37) % 11) as f64 - if i % 17 == 0 { 400.0 } else { 0.0 })
        .collect();
    let series = minute_series(&values);

    let (filtered, _) = apply_quality_filters(&series, &thresholds);
    let ranged = select_range(&series, -30.0, 50.0);
    let d = derivative(&ranged);

    for sample in &filtered {
        let idx = ranged
            .timestamps()
            .iter()
            .position(|ts| *ts == sample.timestamp)
            .expect("retained row present before filtering");
        if let Some(slope) = d[idx] {
            assert!(slope <= 4.0);
            assert!(slope > 0.0001);
        }
    }
}
