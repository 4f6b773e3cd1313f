//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use hess_dispatch::config::PlantConfig;
use hess_dispatch::sim::engine::{Engine, ExternalSignals};
use hess_dispatch::sim::types::{SensorSnapshot, TickRecord};
use serde::Deserialize;

/// Wall-clock instant in 2024.
pub fn at(month: u32, day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, month, day)
        .and_then(|d| d.and_hms_opt(hour, 0, 0))
        .expect("valid test date")
}

/// Snapshot with no grid flow and no fuel cell output.
pub fn snapshot(
    now: NaiveDateTime,
    battery_soc: f64,
    h2_soc: f64,
    pv_signal: f64,
    load_signal: f64,
) -> SensorSnapshot {
    SensorSnapshot {
        tick: 0,
        now,
        pv_signal,
        load_signal,
        battery_soc,
        h2_soc,
        grid_flow: 0.0,
        fuel_cell_output_power: 0.0,
    }
}

/// Reference plant whose tick 0 falls on `start`.
pub fn reference_from(start: NaiveDateTime) -> PlantConfig {
    let mut cfg = PlantConfig::reference();
    cfg.time.start = start;
    cfg
}

/// Bell-shaped PV profile (kW) peaking at 13:00.
pub fn pv_at(hour: f64, peak_kw: f64) -> f64 {
    if !(6.0..=20.0).contains(&hour) {
        return 0.0;
    }
    let x = (hour - 13.0) / 3.5;
    peak_kw * (-x * x).exp()
}

/// Household-style load (kW) with morning and evening peaks.
pub fn load_at(hour: f64, base_kw: f64) -> f64 {
    let morning = 0.6 * (-((hour - 7.5) / 1.5).powi(2)).exp();
    let evening = 1.0 * (-((hour - 19.0) / 2.0).powi(2)).exp();
    base_kw * (1.0 + morning + evening)
}

/// A crude battery and tank closing the loop around an [`Engine`].
///
/// Battery absorbs the PV surplus and the electrolyser draw, the tank follows
/// the hydrogen flows. Good enough to drive SOC across the thresholds.
#[derive(Debug, Clone)]
pub struct ToyPlant {
    pub battery_soc: f64,
    pub h2_soc: f64,
    pub battery_kwh: f64,
    pub tank_kg: f64,
}

impl ToyPlant {
    pub fn new(battery_soc: f64, h2_soc: f64) -> Self {
        Self {
            battery_soc,
            h2_soc,
            battery_kwh: 200.0,
            tank_kg: 20.0,
        }
    }

    /// Battery buffers the PV balance until it is full or empty.
    pub fn signals(&self, pv_kw: f64, load_kw: f64) -> ExternalSignals {
        let surplus = pv_kw - load_kw;
        let buffering = (surplus > 0.0 && self.battery_soc < 100.0)
            || (surplus < 0.0 && self.battery_soc > 0.0);
        ExternalSignals {
            pv_kw,
            load_kw,
            battery_soc: self.battery_soc,
            h2_soc: self.h2_soc,
            battery_kw: if buffering { -surplus } else { 0.0 },
            compressor_kw: 2.0,
        }
    }

    /// Applies one tick's flows to the SOC values.
    pub fn absorb(&mut self, record: &TickRecord, dt_hours: f64) {
        let net_kw = record.pv_kw - record.load_kw
            + record.electrolyser.flow2e_kw
            + record.fuel_cell.power_kw;
        let soc = self.battery_soc + 100.0 * net_kw * dt_hours / self.battery_kwh;
        self.battery_soc = soc.clamp(0.0, 100.0);

        let h2_kg = record.electrolyser.flow2c_kg - record.fuel_cell.h2_kg_per_hour * dt_hours;
        self.h2_soc = (self.h2_soc + 100.0 * h2_kg / self.tank_kg).clamp(0.0, 100.0);
    }
}

/// Runs `engine` in closed loop with [`ToyPlant`] for `ticks` ticks.
pub fn run_closed_loop(
    engine: &mut Engine,
    plant: &mut ToyPlant,
    ticks: u64,
    mut weather: impl FnMut(u64, f64) -> (f64, f64),
) -> Vec<TickRecord> {
    let dt_hours = engine.config().time.tick_seconds() / 3600.0;
    let mut records = Vec::with_capacity(ticks as usize);
    for t in 0..ticks {
        let hour = (t as f64 * dt_hours) % 24.0;
        let (pv, load) = weather(t, hour);
        let record = engine
            .step(&plant.signals(pv, load))
            .expect("closed loop must not hit an invariant");
        plant.absorb(&record, dt_hours);
        records.push(record);
    }
    records
}

#[derive(Debug, Deserialize)]
struct FixtureRow {
    pv_kw: f64,
    load_kw: f64,
    battery_soc: f64,
    h2_soc: f64,
    battery_kw: f64,
}

/// Reads a recorded sensor trace (one row per 15 min tick).
pub fn read_fixture(name: &str) -> Vec<ExternalSignals> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    let mut reader = csv::Reader::from_path(&path).expect("fixture should open");
    reader
        .deserialize::<FixtureRow>()
        .map(|row| {
            let row = row.expect("fixture row should parse");
            ExternalSignals {
                pv_kw: row.pv_kw,
                load_kw: row.load_kw,
                battery_soc: row.battery_soc,
                h2_soc: row.h2_soc,
                battery_kw: row.battery_kw,
                compressor_kw: 2.0,
            }
        })
        .collect()
}
