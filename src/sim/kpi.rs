//! Post-hoc run summary computed from tick records.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;

use crate::devices::electrolyser::ElectrolyserPhase;

use super::types::TickRecord;

/// Aggregate indicators derived from a complete run.
///
/// Computed post-hoc from `&[TickRecord]` so that reported totals always
/// agree with the per-tick data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub ticks: usize,
    /// `Off -> WarmUp` transitions over the run.
    pub electrolyser_starts: usize,
    /// Highest number of electrolyser starts on a single calendar day.
    pub max_starts_per_day: usize,
    pub hydrogen_produced_kg: f64,
    pub hydrogen_consumed_kg: f64,
    /// Electrical energy drawn by the electrolyser (kWh, positive).
    pub electrolyser_energy_kwh: f64,
    /// Energy delivered by the fuel cell (kWh).
    pub fuel_cell_energy_kwh: f64,
    pub warning_ticks: usize,
    pub critical_ticks: usize,
    /// Peak grid import (kW, positive).
    pub peak_import_kw: f64,
    /// Peak grid export (kW, positive magnitude).
    pub peak_export_kw: f64,
    /// Ticks on which both assets were commanded to run.
    pub exclusion_breaches: usize,
    /// Ticks on which the controller held its previous command.
    pub held_ticks: usize,
}

impl RunSummary {
    /// Computes the summary from the complete record vector.
    ///
    /// # Arguments
    ///
    /// * `records` - Tick records in order
    /// * `dt_hours` - Tick duration in hours
    pub fn from_records(records: &[TickRecord], dt_hours: f64) -> Self {
        let mut summary = Self {
            ticks: records.len(),
            ..Self::default()
        };
        let mut starts_per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
        let mut prev_phase = ElectrolyserPhase::Off;

        for r in records {
            let el = &r.electrolyser;
            if prev_phase == ElectrolyserPhase::Off && el.phase == ElectrolyserPhase::WarmUp {
                summary.electrolyser_starts += 1;
                *starts_per_day.entry(r.time.date()).or_default() += 1;
            }
            prev_phase = el.phase;

            summary.hydrogen_produced_kg += el.flow2c_kg;
            summary.hydrogen_consumed_kg += r.fuel_cell.h2_kg_per_hour * dt_hours;
            summary.electrolyser_energy_kwh += (-el.flow2e_kw).max(0.0) * dt_hours;
            summary.fuel_cell_energy_kwh += r.fuel_cell.power_kw.max(0.0) * dt_hours;

            if r.grid.flag_warning {
                summary.warning_ticks += 1;
            }
            if r.grid.flag_critical {
                summary.critical_ticks += 1;
            }
            summary.peak_import_kw = summary.peak_import_kw.max(r.grid.grid_flow_kw);
            summary.peak_export_kw = summary.peak_export_kw.max(-r.grid.grid_flow_kw);

            if r.command.run_electrolyser && r.command.run_fuelcell {
                summary.exclusion_breaches += 1;
            }
            if r.held {
                summary.held_ticks += 1;
            }
        }

        summary.max_starts_per_day = starts_per_day.values().copied().max().unwrap_or(0);
        summary
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Run Summary ({} ticks) ---", self.ticks)?;
        writeln!(
            f,
            "Electrolyser starts:   {} (max {}/day)",
            self.electrolyser_starts, self.max_starts_per_day
        )?;
        writeln!(
            f,
            "Hydrogen:              +{:.3} kg / -{:.3} kg",
            self.hydrogen_produced_kg, self.hydrogen_consumed_kg
        )?;
        writeln!(
            f,
            "Energy:                EL {:.2} kWh in, FC {:.2} kWh out",
            self.electrolyser_energy_kwh, self.fuel_cell_energy_kwh
        )?;
        writeln!(f, "Peak import:           {:.2} kW", self.peak_import_kw)?;
        writeln!(f, "Peak export:           {:.2} kW", self.peak_export_kw)?;
        writeln!(
            f,
            "Grid flags:            {} warning, {} critical",
            self.warning_ticks, self.critical_ticks
        )?;
        write!(
            f,
            "Held ticks:            {} (exclusion breaches: {})",
            self.held_ticks, self.exclusion_breaches
        )
    }
}
