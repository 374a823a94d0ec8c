use chrono::NaiveDateTime;
use polars::prelude as pl;
use polars::prelude::NamedFrom;

use crate::outputs::round4;
use crate::types::{fractional_hour, ChannelKind, Sample, Series};

pub const TIMESTAMP_COLUMN: &str = "dt";
pub const HOUR_COLUMN: &str = "dt_hour";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoinedRow {
    pub timestamp: NaiveDateTime,
    pub irradiance: Option<f64>,
    pub module_temperature: Option<f64>,
    pub dc_power: Option<f64>,
    pub ac_power: Option<f64>,
}

impl JoinedRow {
    fn blank(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            irradiance: None,
            module_temperature: None,
            dc_power: None,
            ac_power: None,
        }
    }

    pub fn value(&self, kind: ChannelKind) -> Option<f64> {
        match kind {
            ChannelKind::Irradiance => self.irradiance,
            ChannelKind::ModuleTemperature => self.module_temperature,
            ChannelKind::DcPower => self.dc_power,
            ChannelKind::AcPower => self.ac_power,
        }
    }

    fn slot(&mut self, kind: ChannelKind) -> &mut Option<f64> {
        match kind {
            ChannelKind::Irradiance => &mut self.irradiance,
            ChannelKind::ModuleTemperature => &mut self.module_temperature,
            ChannelKind::DcPower => &mut self.dc_power,
            ChannelKind::AcPower => &mut self.ac_power,
        }
    }

    pub fn hour_of_day(&self) -> f64 {
        fractional_hour(self.timestamp)
    }

    pub fn is_blank(&self) -> bool {
        ChannelKind::ALL.iter().all(|kind| self.value(*kind).is_none())
    }
}

/// Per-minute rows of all channels, ascending by timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinedTable {
    rows: Vec<JoinedRow>,
}

impl JoinedTable {
    pub fn rows(&self) -> &[JoinedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Series of one column over the rows where it is defined.
    pub fn column(&self, kind: ChannelKind) -> Series {
        Series::from_sorted(
            self.rows
                .iter()
                .filter_map(|row| {
                    row.value(kind)
                        .map(|v| Sample::new(row.timestamp, v))
                })
                .collect(),
        )
    }

    /// Rows where every listed column is defined.
    pub fn complete_rows(&self, required: &[ChannelKind]) -> JoinedTable {
        JoinedTable {
            rows: self
                .rows
                .iter()
                .filter(|row| required.iter().all(|kind| row.value(*kind).is_some()))
                .copied()
                .collect(),
        }
    }

    /// Appends several tables and restores timestamp order.
    pub fn concat<I>(tables: I) -> JoinedTable
    where
        I: IntoIterator<Item = JoinedTable>,
    {
        let mut rows: Vec<JoinedRow> = tables.into_iter().flat_map(|t| t.rows).collect();
        rows.sort_by_key(|row| row.timestamp);
        JoinedTable { rows }
    }

    /// Columns `dt, irr, t_mod, p_dc, p_ac, dt_hour`, channel values rounded to four decimals.
    pub fn to_dataframe(&self) -> pl::PolarsResult<pl::DataFrame> {
        let micros: Vec<i64> = self
            .rows
            .iter()
            .map(|row| row.timestamp.and_utc().timestamp_micros())
            .collect();
        let timestamps = pl::Series::new(TIMESTAMP_COLUMN.into(), micros)
            .cast(&pl::DataType::Datetime(pl::TimeUnit::Microseconds, None))?;

        let mut columns: Vec<pl::Column> = vec![timestamps.into()];
        for kind in ChannelKind::ALL {
            let values: Vec<Option<f64>> = self
                .rows
                .iter()
                .map(|row| row.value(kind).map(round4))
                .collect();
            columns.push(pl::Series::new(kind.column_name().into(), values).into());
        }
        let hours: Vec<f64> = self.rows.iter().map(JoinedRow::hour_of_day).collect();
        columns.push(pl::Series::new(HOUR_COLUMN.into(), hours).into());

        pl::DataFrame::new(columns)
    }
}

/// Outer-joins the channel series on timestamp by merging their sorted streams.
///
/// Blank rows are dropped; the result does not depend on argument order.
pub fn merge_channels(channels: &[(ChannelKind, &Series)]) -> JoinedTable {
    let mut cursors = vec![0usize; channels.len()];
    let mut rows = Vec::new();

    loop {
        let next = channels
            .iter()
            .zip(&cursors)
            .filter_map(|((_, series), &pos)| series.samples().get(pos).map(|s| s.timestamp))
            .min();
        let Some(timestamp) = next else {
            break;
        };

        let mut row = JoinedRow::blank(timestamp);
        for ((kind, series), pos) in channels.iter().zip(cursors.iter_mut()) {
            if let Some(sample) = series.samples().get(*pos) {
                if sample.timestamp == timestamp {
                    *row.slot(*kind) = Some(sample.value);
                    *pos += 1;
                }
            }
        }

        if !row.is_blank() {
            rows.push(row);
        }
    }

    JoinedTable { rows }
}
