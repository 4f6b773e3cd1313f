//! Dispatch controller for the electrolyser / fuel cell pair.
//!
//! [`decide`] is the pure decision step: thresholds with hysteresis, the
//! seasonal and hour windows, the once-per-day electrolyser start, and the
//! fuel-cell-first exclusion rule. [`DispatchController`] wraps it with the
//! state a host needs across ticks (daily state, last command) and turns
//! sensor errors into a held command.

use chrono::{Datelike, Timelike};
use tracing::{info, warn};

use crate::config::{GridAwarenessPolicy, ThresholdConfig};
use crate::devices::electrolyser::ElectrolyserPhase;
use crate::devices::fuel_cell::FuelCellPhase;
use crate::error::{DecideError, InvariantViolation, SensorError};
use crate::sim::types::{DispatchCommand, SensorSnapshot};

/// Per-day bookkeeping owned by the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerDailyState {
    /// Day of year (1-based) seen on the last decision; `None` before the first.
    pub last_day_of_year: Option<u32>,
    /// Set once the electrolyser has been started today.
    pub el_daily_start_used: bool,
}

impl ControllerDailyState {
    /// Resets the start flag when `day_of_year` differs from the last one seen.
    fn roll_over(&mut self, day_of_year: u32) {
        if self.last_day_of_year != Some(day_of_year) {
            self.last_day_of_year = Some(day_of_year);
            self.el_daily_start_used = false;
        }
    }
}

/// Decides the run commands for the next tick.
///
/// Reads the snapshot, both assets' phases and the thresholds; the only
/// state it mutates is `daily`. The assets are not touched: they receive
/// their run flags (and the production rate) through the returned command.
///
/// # Errors
///
/// * [`DecideError::Sensor`] if the snapshot holds a non-finite or
///   out-of-range value; `daily` is left untouched in that case.
/// * [`DecideError::Invariant`] if the resulting command would run both
///   assets.
pub fn decide(
    snapshot: &SensorSnapshot,
    el: ElectrolyserPhase,
    fc: FuelCellPhase,
    daily: &mut ControllerDailyState,
    cfg: &ThresholdConfig,
    policy: GridAwarenessPolicy,
) -> Result<DispatchCommand, DecideError> {
    snapshot.validate()?;
    daily.roll_over(snapshot.now.ordinal());

    let inputs = Inputs::new(snapshot, cfg);

    let mut run_electrolyser = if !inputs.summer {
        false
    } else {
        match el {
            ElectrolyserPhase::Off => electrolyser_should_start(&inputs, daily, cfg, policy),
            ElectrolyserPhase::WarmUp | ElectrolyserPhase::RampUp | ElectrolyserPhase::On => {
                !electrolyser_should_stop(&inputs, cfg, policy)
            }
            ElectrolyserPhase::RampDown | ElectrolyserPhase::Hold => false,
        }
    };

    let mut run_fuelcell = match fc {
        FuelCellPhase::Off => fuel_cell_should_start(&inputs, cfg, policy),
        FuelCellPhase::RampUp1 | FuelCellPhase::RampUp2 | FuelCellPhase::On => {
            !fuel_cell_should_stop(&inputs, cfg, policy)
        }
        FuelCellPhase::RampDown => false,
    };

    // battery protection wins over hydrogen production
    if run_electrolyser && run_fuelcell {
        run_electrolyser = false;
    }

    // never command a flow the storage bounds forbid
    if inputs.soc <= cfg.soc_min || inputs.h2_soc >= cfg.h2_soc_max {
        run_electrolyser = false;
    }
    if inputs.soc >= cfg.soc_max || inputs.h2_soc <= cfg.h2_soc_min {
        run_fuelcell = false;
    }

    if run_electrolyser && el == ElectrolyserPhase::Off {
        daily.el_daily_start_used = true;
        info!(
            tick = snapshot.tick,
            soc = inputs.soc,
            h2_soc = inputs.h2_soc,
            "daily electrolyser start"
        );
    }

    Ok(DispatchCommand::new(
        snapshot.tick,
        run_electrolyser,
        run_fuelcell,
        inputs.rate,
    )?)
}

/// Values derived once per decision.
struct Inputs {
    hour: u32,
    summer: bool,
    soc: f64,
    h2_soc: f64,
    pv: f64,
    load: f64,
    utilisation: f64,
    rate: f64,
}

impl Inputs {
    fn new(snapshot: &SensorSnapshot, cfg: &ThresholdConfig) -> Self {
        Self {
            hour: snapshot.now.hour(),
            summer: cfg.is_summer(snapshot.now.date()),
            soc: snapshot.battery_soc,
            h2_soc: snapshot.h2_soc,
            pv: snapshot.pv_signal,
            load: snapshot.load_signal,
            utilisation: snapshot.grid_flow.abs() / cfg.grid_import_limit,
            rate: cfg.production_rate(snapshot.battery_soc),
        }
    }

    fn surplus(&self) -> f64 {
        self.pv - self.load
    }

    fn deficit(&self) -> f64 {
        self.load - self.pv
    }
}

fn electrolyser_should_start(
    i: &Inputs,
    daily: &ControllerDailyState,
    cfg: &ThresholdConfig,
    policy: GridAwarenessPolicy,
) -> bool {
    let common = i.soc >= cfg.el_start_soc
        && cfg.in_el_window(i.hour)
        && i.h2_soc < cfg.h2_soc_max
        && !daily.el_daily_start_used;
    let supply = match policy {
        GridAwarenessPolicy::Simple => i.pv > cfg.pv_threshold_start,
        GridAwarenessPolicy::GridAware => {
            i.surplus() > 0.0 && i.utilisation < cfg.grid_congestion_threshold
        }
        GridAwarenessPolicy::Islanded => i.surplus() > cfg.pv_threshold_start,
    };
    common && supply
}

fn electrolyser_should_stop(i: &Inputs, cfg: &ThresholdConfig, policy: GridAwarenessPolicy) -> bool {
    let stop_level = cfg.pv_threshold_start * cfg.pv_threshold_stop_fraction;
    let supply_lost = match policy {
        GridAwarenessPolicy::Simple => i.pv < stop_level,
        GridAwarenessPolicy::GridAware => i.utilisation > cfg.grid_congestion_threshold,
        GridAwarenessPolicy::Islanded => i.surplus() < stop_level,
    };
    i.soc <= cfg.el_stop_soc || i.h2_soc >= cfg.h2_soc_max || supply_lost
}

fn fuel_cell_should_start(i: &Inputs, cfg: &ThresholdConfig, policy: GridAwarenessPolicy) -> bool {
    if i.h2_soc < cfg.h2_soc_min {
        return false;
    }
    let deficit_limit = match policy {
        GridAwarenessPolicy::Simple | GridAwarenessPolicy::Islanded => cfg.fc_deficit_threshold,
        GridAwarenessPolicy::GridAware => cfg.grid_import_limit,
    };
    let emergency = i.soc <= cfg.fc_start_soc && i.deficit() >= deficit_limit;
    let staircase = !i.summer && i.soc <= cfg.staircase_soc(i.hour) && i.load > i.pv;
    emergency || staircase
}

fn fuel_cell_should_stop(i: &Inputs, cfg: &ThresholdConfig, policy: GridAwarenessPolicy) -> bool {
    let resolved = match policy {
        GridAwarenessPolicy::Simple | GridAwarenessPolicy::Islanded => i.load <= i.pv,
        GridAwarenessPolicy::GridAware => {
            i.deficit() < cfg.grid_import_limit * cfg.grid_congestion_threshold
        }
    };
    i.soc >= cfg.fc_stop_soc || i.h2_soc <= cfg.h2_soc_min || resolved
}

/// Result of one [`DispatchController::decide`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub command: DispatchCommand,
    /// `true` if the previous command was held because of bad input.
    pub held: bool,
}

/// Stateful controller driven once per tick.
#[derive(Debug, Clone)]
pub struct DispatchController {
    cfg: ThresholdConfig,
    policy: GridAwarenessPolicy,
    daily: ControllerDailyState,
    last_command: Option<DispatchCommand>,
    last_summer: Option<bool>,
    sensor_faults: u64,
}

impl DispatchController {
    pub fn new(cfg: ThresholdConfig, policy: GridAwarenessPolicy) -> Self {
        Self {
            cfg,
            policy,
            daily: ControllerDailyState::default(),
            last_command: None,
            last_summer: None,
            sensor_faults: 0,
        }
    }

    /// Decides the next command, holding the previous one on sensor errors.
    ///
    /// # Errors
    ///
    /// Only invariant violations are returned; they are fatal.
    pub fn decide(
        &mut self,
        snapshot: &SensorSnapshot,
        el: ElectrolyserPhase,
        fc: FuelCellPhase,
    ) -> Result<Decision, InvariantViolation> {
        match decide(snapshot, el, fc, &mut self.daily, &self.cfg, self.policy) {
            Ok(command) => {
                self.note_season(snapshot);
                self.last_command = Some(command);
                Ok(Decision {
                    command,
                    held: false,
                })
            }
            Err(DecideError::Sensor(err)) => self.hold(snapshot.tick, err, el, fc),
            Err(DecideError::Invariant(v)) => Err(v),
        }
    }

    /// Holds the previous command after a sensor error.
    ///
    /// A held command never starts an asset: any run flag for an asset that
    /// is currently `Off` is cleared.
    pub fn hold(
        &mut self,
        tick: u64,
        err: SensorError,
        el: ElectrolyserPhase,
        fc: FuelCellPhase,
    ) -> Result<Decision, InvariantViolation> {
        self.sensor_faults += 1;
        warn!(tick, error = %err, "sensor error, holding previous command");
        let command = match self.last_command {
            Some(prev) => DispatchCommand::new(
                tick,
                prev.run_electrolyser && el != ElectrolyserPhase::Off,
                prev.run_fuelcell && fc != FuelCellPhase::Off,
                prev.production_rate,
            )?,
            None => DispatchCommand::idle(self.cfg.rate_min),
        };
        self.last_command = Some(command);
        Ok(Decision {
            command,
            held: true,
        })
    }

    fn note_season(&mut self, snapshot: &SensorSnapshot) {
        let summer = self.cfg.is_summer(snapshot.now.date());
        if self.last_summer != Some(summer) {
            if self.last_summer.is_some() {
                info!(
                    tick = snapshot.tick,
                    season = if summer { "summer" } else { "winter" },
                    "season changed"
                );
            }
            self.last_summer = Some(summer);
        }
    }

    pub fn daily(&self) -> &ControllerDailyState {
        &self.daily
    }

    /// Number of ticks on which a sensor error forced a hold.
    pub fn sensor_faults(&self) -> u64 {
        self.sensor_faults
    }
}
