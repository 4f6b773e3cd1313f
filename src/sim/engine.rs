//! In-process tick loop wiring controller, assets, and grid monitor.

use tracing::warn;

use crate::config::PlantConfig;
use crate::devices::{Device, DeviceContext, Electrolyser, FuelCell};
use crate::error::DispatchError;

use super::clock::{Clock, SimClock};
use super::controller::DispatchController;
use super::grid::GridMonitor;
use super::kpi::RunSummary;
use super::power_balance::GridFlows;
use super::types::{SensorSnapshot, TickRecord};

/// Signals owned by collaborators outside this crate, one set per tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExternalSignals {
    /// PV generation (kW, positive).
    pub pv_kw: f64,
    /// Consumer demand (kW, positive).
    pub load_kw: f64,
    /// Battery SOC reported by the battery model (%).
    pub battery_soc: f64,
    /// Tank SOC reported by the storage model (%).
    pub h2_soc: f64,
    /// Battery power (kW, positive = discharging).
    pub battery_kw: f64,
    /// Compressor draw while running (kW, positive magnitude).
    pub compressor_kw: f64,
}

/// Simulation engine owning the controller, both assets, and the grid monitor.
///
/// Each [`step`](Engine::step) keeps the one-tick control latency: the
/// controller sees the grid flow and fuel cell output of the previous tick,
/// while the grid monitor sees the flows of the current tick.
pub struct Engine {
    config: PlantConfig,
    clock: SimClock,
    controller: DispatchController,
    electrolyser: Electrolyser,
    fuel_cell: FuelCell,
    grid: GridMonitor,
    tick: u64,
    prev_grid_flow: f64,
    prev_fc_kw: f64,
}

impl Engine {
    /// Creates an engine from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Config`] listing every invalid field.
    pub fn new(config: PlantConfig) -> Result<Self, DispatchError> {
        let config = config.validated()?;
        Ok(Self {
            clock: SimClock::new(&config.time),
            controller: DispatchController::new(config.thresholds.clone(), config.policy),
            electrolyser: Electrolyser::new(config.electrolyser.clone(), &config.thresholds),
            fuel_cell: FuelCell::new(config.fuel_cell.clone()),
            grid: GridMonitor::new(config.thresholds.clone()),
            config,
            tick: 0,
            prev_grid_flow: 0.0,
            prev_fc_kw: 0.0,
        })
    }

    /// Executes one tick and returns its record.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Invariant`] on a logic defect; the run must stop.
    pub fn step(&mut self, signals: &ExternalSignals) -> Result<TickRecord, DispatchError> {
        let tick = self.tick;
        let now = self.clock.instant_of_tick(tick);
        let dt = self.clock.tick_seconds();

        // 1. Controller on last tick's grid state
        let snapshot = SensorSnapshot {
            tick,
            now,
            pv_signal: signals.pv_kw,
            load_signal: signals.load_kw,
            battery_soc: signals.battery_soc,
            h2_soc: signals.h2_soc,
            grid_flow: self.prev_grid_flow,
            fuel_cell_output_power: self.prev_fc_kw,
        };
        let decision =
            self.controller
                .decide(&snapshot, self.electrolyser.phase(), self.fuel_cell.phase())?;
        let command = decision.command;

        // 2. Assets
        let electrolyser = self.electrolyser.advance(&DeviceContext::with_setpoint(
            tick,
            dt,
            command.run_electrolyser,
            command.production_rate,
        ))?;
        let fuel_cell = self
            .fuel_cell
            .advance(&DeviceContext::new(tick, dt, command.run_fuelcell))?;

        // 3. Grid on this tick's flows
        let flows = GridFlows {
            load_kw: signals.load_kw,
            pv_kw: signals.pv_kw,
            flow2e_kw: electrolyser.flow2e_kw,
            compressor_kw: if command.compressor_on {
                -signals.compressor_kw.abs()
            } else {
                0.0
            },
            fuel_cell_kw: fuel_cell.power_kw,
            battery_kw: signals.battery_kw,
        };
        self.grid.reset();
        for kw in flows.signed() {
            self.grid.add_net_kw(kw);
        }
        let grid = self.grid.reading();
        if grid.flag_critical {
            warn!(tick, grid_flow = grid.grid_flow_kw, "grid flow at critical limit");
        } else if grid.flag_warning {
            warn!(tick, grid_flow = grid.grid_flow_kw, "grid flow above tolerance");
        }

        if grid.grid_flow_kw.is_finite() {
            self.prev_grid_flow = grid.grid_flow_kw;
        }
        self.prev_fc_kw = fuel_cell.power_kw;
        self.tick += 1;

        Ok(TickRecord {
            tick,
            time: now,
            pv_kw: signals.pv_kw,
            load_kw: signals.load_kw,
            battery_soc: signals.battery_soc,
            h2_soc: signals.h2_soc,
            command,
            held: decision.held,
            electrolyser,
            fuel_cell,
            grid,
        })
    }

    /// Steps once per entry of `signals` and returns every record.
    pub fn run(&mut self, signals: &[ExternalSignals]) -> Result<Vec<TickRecord>, DispatchError> {
        let mut records = Vec::with_capacity(signals.len());
        let mut clock = Clock::new(signals.len() as u64);
        clock.try_run(|i| {
            records.push(self.step(&signals[i as usize])?);
            Ok::<(), DispatchError>(())
        })?;
        Ok(records)
    }

    /// Summarises records produced by this engine.
    pub fn summarize(&self, records: &[TickRecord]) -> RunSummary {
        RunSummary::from_records(records, self.clock.tick_seconds() / 3600.0)
    }

    /// Next tick to be executed.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn config(&self) -> &PlantConfig {
        &self.config
    }

    pub fn controller(&self) -> &DispatchController {
        &self.controller
    }

    pub fn electrolyser(&self) -> &Electrolyser {
        &self.electrolyser
    }

    pub fn fuel_cell(&self) -> &FuelCell {
        &self.fuel_cell
    }
}
