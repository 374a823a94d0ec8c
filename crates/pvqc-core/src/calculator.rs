use chrono::NaiveDate;
use serde::Serialize;

use crate::energy::daily_total;
use crate::merge::JoinedTable;
use crate::types::{ChannelKind, SystemParameters};

const REFERENCE_IRRADIANCE_W_M2: f64 = 1000.0;

/// Integrated daily totals. `h` in Wh/m², energies in Wh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EnergyTotals {
    pub h: Option<f64>,
    pub e_dc: Option<f64>,
    pub e_ac: Option<f64>,
}

impl EnergyTotals {
    pub fn any_defined(&self) -> bool {
        self.h.is_some() || self.e_dc.is_some() || self.e_ac.is_some()
    }
}

/// Reference, array and final yields (hours at reference conditions).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Yields {
    pub y_r: Option<f64>,
    pub y_a: Option<f64>,
    pub y_f: Option<f64>,
}

impl Yields {
    pub fn any_defined(&self) -> bool {
        self.y_r.is_some() || self.y_a.is_some() || self.y_f.is_some()
    }

    /// `y_f / y_r`.
    pub fn performance_ratio(&self) -> Option<f64> {
        ratio(self.y_f, self.y_r)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Efficiency {
    pub e_dc: Option<f64>,
    pub e_ac: Option<f64>,
    /// In-plane insolation times module area, Wh.
    pub h_area: Option<f64>,
}

impl Efficiency {
    pub fn any_defined(&self) -> bool {
        self.e_dc.is_some() || self.e_ac.is_some() || self.h_area.is_some()
    }

    pub fn array(&self) -> Option<f64> {
        ratio(self.e_dc, self.h_area)
    }

    pub fn system(&self) -> Option<f64> {
        ratio(self.e_ac, self.h_area)
    }

    pub fn inverter(&self) -> Option<f64> {
        ratio(self.e_ac, self.e_dc)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyMetrics {
    pub day: NaiveDate,
    pub totals: EnergyTotals,
    /// Totals over the minutes where irradiance and AC power were both measured.
    pub synchronized: EnergyTotals,
    pub yields: Yields,
    pub efficiency: Efficiency,
    /// Yields from the synchronized totals.
    pub performance_ratio: Yields,
}

fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 && d.is_finite() => Some(n / d),
        _ => None,
    }
}

pub fn compute_yields(totals: &EnergyTotals, p_m: f64) -> Yields {
    Yields {
        y_r: totals.h.map(|h| h / REFERENCE_IRRADIANCE_W_M2),
        y_a: ratio(totals.e_dc, Some(p_m)),
        y_f: ratio(totals.e_ac, Some(p_m)),
    }
}

pub fn compute_efficiency(totals: &EnergyTotals, area: f64) -> Efficiency {
    Efficiency {
        e_dc: totals.e_dc,
        e_ac: totals.e_ac,
        h_area: totals.h.map(|h| h * area),
    }
}

/// Integrates irradiance and both powers over the rows where `irr` and `p_ac`
/// are both defined. Each column is integrated over its own defined rows.
pub fn synchronized_totals(table: &JoinedTable) -> EnergyTotals {
    let synced = table.complete_rows(&[ChannelKind::Irradiance, ChannelKind::AcPower]);
    if synced.is_empty() {
        return EnergyTotals::default();
    }

    EnergyTotals {
        h: daily_total(&synced.column(ChannelKind::Irradiance)),
        e_dc: daily_total(&synced.column(ChannelKind::DcPower)),
        e_ac: daily_total(&synced.column(ChannelKind::AcPower)),
    }
}

pub fn compute_daily_metrics(
    day: NaiveDate,
    totals: EnergyTotals,
    synchronized: EnergyTotals,
    system: &SystemParameters,
) -> DailyMetrics {
    DailyMetrics {
        day,
        totals,
        synchronized,
        yields: compute_yields(&totals, system.p_m),
        efficiency: compute_efficiency(&totals, system.area),
        performance_ratio: compute_yields(&synchronized, system.p_m),
    }
}
