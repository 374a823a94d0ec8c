// crates/pvqc/src/input.rs

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use pvqc_core::types::{DayInput, Reading};
use tracing::{debug, warn};

use crate::settings::{ChannelColumns, InputSettings};

/// Readings per requested column, in file order.
pub type ColumnReadings = BTreeMap<String, Vec<Reading>>;

fn parse_value(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

fn column_index(headers: &[String], name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| anyhow!("column '{name}' not found (have: {})", headers.join(", ")))
}

/// Reads the timestamp column and each of `wanted` from a logger CSV.
///
/// `names` replaces the header row for files that have none. Rows with a bad
/// timestamp are skipped with a warning; unparsable values become missing.
pub fn read_columns<R: Read>(
    reader: R,
    settings: &InputSettings,
    names: Option<&[String]>,
    wanted: &[&str],
) -> Result<ColumnReadings> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(names.is_none())
        .delimiter(settings.delimiter_byte()?)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = match names {
        Some(names) => names.to_vec(),
        None => csv_reader
            .headers()
            .context("failed to read CSV header row")?
            .iter()
            .map(str::to_string)
            .collect(),
    };

    let ts_idx = column_index(&headers, &settings.timestamp_column)?;
    let targets: Vec<(&str, usize)> = wanted
        .iter()
        .map(|name| column_index(&headers, name).map(|idx| (*name, idx)))
        .collect::<Result<_>>()?;

    let mut out: ColumnReadings = wanted
        .iter()
        .map(|name| (name.to_string(), Vec::new()))
        .collect();
    let mut skipped = 0usize;

    for (row_idx, record) in csv_reader.records().enumerate() {
        let record = record.with_context(|| format!("malformed CSV record at row {row_idx}"))?;

        let raw_ts = record.get(ts_idx).unwrap_or_default();
        let timestamp = match NaiveDateTime::parse_from_str(raw_ts, &settings.timestamp_format) {
            Ok(ts) => ts,
            Err(err) => {
                warn!(row = row_idx, value = raw_ts, error = %err, "Skipping row with invalid timestamp");
                skipped += 1;
                continue;
            }
        };

        for (name, idx) in &targets {
            let value = record.get(*idx).and_then(parse_value);
            if let Some(readings) = out.get_mut(*name) {
                readings.push(Reading::new(timestamp, value));
            }
        }
    }

    debug!(columns = wanted.len(), skipped, "Read logger CSV");
    Ok(out)
}

pub fn read_columns_from_path(
    path: &Path,
    settings: &InputSettings,
    names: Option<&[String]>,
    wanted: &[&str],
) -> Result<ColumnReadings> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    read_columns(file, settings, names, wanted)
        .with_context(|| format!("failed to read {}", path.display()))
}

fn take(columns: &mut ColumnReadings, name: &str) -> Vec<Reading> {
    columns.remove(name).unwrap_or_default()
}

fn split_into(
    days: &mut BTreeMap<NaiveDate, DayInput>,
    readings: Vec<Reading>,
    pick: fn(&mut DayInput) -> &mut Vec<Reading>,
) {
    for reading in readings {
        if let Some(input) = days.get_mut(&reading.timestamp.date()) {
            pick(input).push(reading);
        }
    }
}

/// Groups DAQ and inverter readings into one [`DayInput`] per calendar day
/// from `start` through `end`. Readings outside the range are dropped.
pub fn build_day_inputs(
    mut daq: ColumnReadings,
    mut sfcr: ColumnReadings,
    columns: &ChannelColumns,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<DayInput> {
    let mut days: BTreeMap<NaiveDate, DayInput> = start
        .iter_days()
        .take_while(|day| *day <= end)
        .map(|day| (day, DayInput::new(day)))
        .collect();

    split_into(&mut days, take(&mut daq, &columns.irradiance), |d| &mut d.irradiance);
    split_into(
        &mut days,
        take(&mut daq, &columns.module_temperature_center),
        |d| &mut d.module_temperature_center,
    );
    split_into(
        &mut days,
        take(&mut daq, &columns.module_temperature_side),
        |d| &mut d.module_temperature_side,
    );
    split_into(&mut days, take(&mut sfcr, &columns.dc_power), |d| &mut d.dc_power);
    split_into(&mut days, take(&mut sfcr, &columns.ac_power), |d| &mut d.ac_power);

    days.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> ChannelColumns {
        ChannelColumns {
            irradiance: "irr".to_string(),
            module_temperature_center: "t_mod_c_m1".to_string(),
            module_temperature_side: "t_mod_s_m1".to_string(),
            dc_power: "p_dc".to_string(),
            ac_power: "p_ac".to_string(),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 7, d).unwrap()
    }

    #[test]
    fn reads_requested_columns_with_missing_values() {
        let csv = "\
dt,irr,t_mod_c_m1,t_mod_s_m1,extra
2022-07-02 10:00:00,512.5,35.1,,x
2022-07-02 10:00:30,NaN,35.2,36.0,x
not a date,1.0,1.0,1.0,x
2022-07-02 10:01:00,oops,35.3,36.1,x
";
        let settings = InputSettings::default();
        let out = read_columns(
            csv.as_bytes(),
            &settings,
            None,
            &["irr", "t_mod_c_m1", "t_mod_s_m1"],
        )
        .unwrap();

        let irr = &out["irr"];
        assert_eq!(irr.len(), 3);
        assert_eq!(irr[0].value, Some(512.5));
        assert_eq!(irr[1].value, None);
        assert_eq!(irr[2].value, None);
        assert_eq!(out["t_mod_s_m1"][0].value, None);
        assert_eq!(out["t_mod_s_m1"][2].value, Some(36.1));
    }

    #[test]
    fn headerless_files_use_configured_names() {
        let csv = "2022-07-02 12:00:00;900;870\n2022-07-02 12:01:00;910;880\n";
        let settings = InputSettings {
            delimiter: ';',
            ..InputSettings::default()
        };
        let names = vec!["dt".to_string(), "p_dc".to_string(), "p_ac".to_string()];

        let out = read_columns(csv.as_bytes(), &settings, Some(&names), &["p_dc", "p_ac"]).unwrap();

        assert_eq!(out["p_dc"].len(), 2);
        assert_eq!(out["p_ac"][1].value, Some(880.0));
    }

    #[test]
    fn missing_column_is_an_error() {
        let csv = "dt,irr\n2022-07-02 10:00:00,1\n";
        let err = read_columns(csv.as_bytes(), &InputSettings::default(), None, &["p_ac"]).unwrap_err();
        assert!(err.to_string().contains("p_ac"));
    }

    #[test]
    fn readings_are_grouped_by_day_within_range() {
        let daq_csv = "\
dt,irr,t_mod_c_m1,t_mod_s_m1
2022-07-01 12:00:00,100,30,31
2022-07-02 12:00:00,200,32,33
2022-07-03 12:00:00,300,34,35
2022-07-05 12:00:00,500,36,37
";
        let sfcr_csv = "\
dt,p_dc,p_ac
2022-07-02 12:00:00,900,870
2022-07-03 12:00:00,950,910
";
        let settings = InputSettings::default();
        let cols = columns();
        let daq = read_columns(
            daq_csv.as_bytes(),
            &settings,
            None,
            &["irr", "t_mod_c_m1", "t_mod_s_m1"],
        )
        .unwrap();
        let sfcr = read_columns(sfcr_csv.as_bytes(), &settings, None, &["p_dc", "p_ac"]).unwrap();

        let inputs = build_day_inputs(daq, sfcr, &cols, day(2), day(4));

        assert_eq!(inputs.len(), 3);
        assert_eq!(inputs[0].day, day(2));
        assert_eq!(inputs[0].irradiance[0].value, Some(200.0));
        assert_eq!(inputs[0].ac_power[0].value, Some(870.0));
        assert_eq!(inputs[1].module_temperature_side[0].value, Some(35.0));
        assert!(inputs[2].irradiance.is_empty());
        assert!(inputs[2].dc_power.is_empty());
    }
}
