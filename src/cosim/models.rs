//! One boundary adapter per component.
//!
//! Each adapter is driven by the external scheduler with a time, the named
//! inputs resolved from upstream components, and a max-advance hint. It
//! answers with the next time it wants to be called and exposes its outputs
//! as named signals.

use tracing::warn;

use crate::config::PlantConfig;
use crate::cosim::signals::{
    Signal, Signals, read_bool, read_f64, read_text, reject_unknown, signals,
};
use crate::devices::{
    Device, DeviceContext, Electrolyser, ElectrolyserOutput, ElectrolyserPhase, FuelCell,
    FuelCellOutput, FuelCellPhase,
};
use crate::error::{AdapterError, DispatchError, InvariantViolation, SensorError};
use crate::sim::clock::SimClock;
use crate::sim::controller::DispatchController;
use crate::sim::grid::{GridMonitor, GridReading};
use crate::sim::power_balance::GridFlows;
use crate::sim::types::{DispatchCommand, SensorSnapshot};

/// A component the co-simulation scheduler can step.
pub trait CosimModel {
    /// Model name used in errors and logs.
    fn name(&self) -> &'static str;

    /// Advances the model to `time` and returns the next time it needs a call.
    ///
    /// Calling again with the same `time` returns the same answer without
    /// advancing. The cadence is fixed, so `max_advance` does not change the
    /// answer.
    ///
    /// # Errors
    ///
    /// Unknown or mistyped inputs, a `time` earlier than the last one, and
    /// invariant violations inside the component.
    fn step(&mut self, time: u64, inputs: &Signals, max_advance: u64) -> Result<u64, AdapterError>;

    /// Outputs after the last step.
    fn outputs(&self) -> Signals;
}

/// Remembers the last stepped time so repeated calls are idempotent.
#[derive(Debug, Clone, Copy, Default)]
struct StepGuard {
    last: Option<(u64, u64)>,
}

impl StepGuard {
    /// `Some(next)` when `time` was already stepped.
    fn check(&self, model: &'static str, time: u64) -> Result<Option<u64>, InvariantViolation> {
        match self.last {
            Some((last, next)) if last == time => Ok(Some(next)),
            Some((last, _)) if time < last => {
                tracing::error!(model, time, last, "time went backwards");
                Err(InvariantViolation::new(
                    model,
                    time,
                    format!("stepped at {time} after {last}"),
                ))
            }
            _ => Ok(None),
        }
    }

    fn record(&mut self, time: u64, next: u64) -> u64 {
        self.last = Some((time, next));
        next
    }
}

fn tick_of(clock: &SimClock, time: u64) -> u64 {
    time / clock.time_step_size().max(1)
}

/// Adapter around [`DispatchController`].
pub struct ControllerModel {
    controller: DispatchController,
    clock: SimClock,
    guard: StepGuard,
    el_phase: ElectrolyserPhase,
    fc_phase: FuelCellPhase,
    grid_flow: f64,
    fc_power: f64,
    command: DispatchCommand,
}

impl ControllerModel {
    pub const INPUTS: &'static [&'static str] = &[
        "pv_signal",
        "load_signal",
        "soc",
        "h2_soc",
        "grid_flow",
        "output_power_fc",
        "electrolyser_state",
        "fuelcell_state",
    ];

    /// # Errors
    ///
    /// Returns [`DispatchError::Config`] if `config` is invalid.
    pub fn new(config: PlantConfig) -> Result<Self, DispatchError> {
        let config = config.validated()?;
        Ok(Self {
            command: DispatchCommand::idle(config.thresholds.rate_min),
            controller: DispatchController::new(config.thresholds, config.policy),
            clock: SimClock::new(&config.time),
            guard: StepGuard::default(),
            el_phase: ElectrolyserPhase::Off,
            fc_phase: FuelCellPhase::Off,
            grid_flow: 0.0,
            fc_power: 0.0,
        })
    }

    pub fn command(&self) -> DispatchCommand {
        self.command
    }

    pub fn controller(&self) -> &DispatchController {
        &self.controller
    }

    fn read_phases(&mut self, inputs: &Signals) -> Result<(), AdapterError> {
        if let Some(text) = read_text(inputs, "electrolyser_state")? {
            self.el_phase = text.parse().map_err(|_| AdapterError::WrongType {
                name: "electrolyser_state".into(),
                expected: "electrolyser phase",
            })?;
        }
        if let Some(text) = read_text(inputs, "fuelcell_state")? {
            self.fc_phase = text.parse().map_err(|_| AdapterError::WrongType {
                name: "fuelcell_state".into(),
                expected: "fuel cell phase",
            })?;
        }
        Ok(())
    }

    fn snapshot(&mut self, time: u64, inputs: &Signals) -> Result<Result<SensorSnapshot, SensorError>, AdapterError> {
        // feedback keeps its last finite value until the downstream models report
        let grid_flow = read_f64(inputs, "grid_flow")?;
        let fc_power = read_f64(inputs, "output_power_fc")?;
        for (name, value) in [("grid_flow", grid_flow), ("output_power_fc", fc_power)] {
            if let Some(value) = value.filter(|v| !v.is_finite()) {
                return Ok(Err(SensorError::NonFinite { name, value }));
            }
        }
        if let Some(v) = grid_flow {
            self.grid_flow = v;
        }
        if let Some(v) = fc_power {
            self.fc_power = v;
        }
        let mut required = [0.0; 4];
        for (slot, name) in required
            .iter_mut()
            .zip(["pv_signal", "load_signal", "soc", "h2_soc"])
        {
            match read_f64(inputs, name)? {
                Some(v) => *slot = v,
                None => return Ok(Err(SensorError::Missing(name))),
            }
        }
        let [pv_signal, load_signal, battery_soc, h2_soc] = required;
        Ok(Ok(SensorSnapshot {
            tick: tick_of(&self.clock, time),
            now: self.clock.instant_at(time),
            pv_signal,
            load_signal,
            battery_soc,
            h2_soc,
            grid_flow: self.grid_flow,
            fuel_cell_output_power: self.fc_power,
        }))
    }
}

impl CosimModel for ControllerModel {
    fn name(&self) -> &'static str {
        "controller"
    }

    fn step(&mut self, time: u64, inputs: &Signals, _max_advance: u64) -> Result<u64, AdapterError> {
        reject_unknown(self.name(), inputs, Self::INPUTS)?;
        if let Some(next) = self.guard.check(self.name(), time)? {
            return Ok(next);
        }
        self.read_phases(inputs)?;
        let decision = match self.snapshot(time, inputs)? {
            Ok(snapshot) => self.controller.decide(&snapshot, self.el_phase, self.fc_phase)?,
            Err(err) => self.controller.hold(
                tick_of(&self.clock, time),
                err,
                self.el_phase,
                self.fc_phase,
            )?,
        };
        self.command = decision.command;
        Ok(self.guard.record(time, self.clock.next_time(time)))
    }

    fn outputs(&self) -> Signals {
        let c = &self.command;
        signals([
            ("run_electrolyser", c.run_electrolyser.into()),
            ("run_fuelcell", c.run_fuelcell.into()),
            ("compressor_on", c.compressor_on.into()),
            ("storage_flow", c.storage_flow.as_str().into()),
            ("production_rate", c.production_rate.into()),
        ])
    }
}

/// Adapter around [`Electrolyser`].
pub struct ElectrolyserModel {
    electrolyser: Electrolyser,
    clock: SimClock,
    guard: StepGuard,
    run: bool,
    rate: f64,
    output: ElectrolyserOutput,
}

impl ElectrolyserModel {
    pub const INPUTS: &'static [&'static str] = &["run_electrolyser", "production_rate"];

    /// # Errors
    ///
    /// Returns [`DispatchError::Config`] if `config` is invalid.
    pub fn new(config: PlantConfig) -> Result<Self, DispatchError> {
        let config = config.validated()?;
        Ok(Self {
            electrolyser: Electrolyser::new(config.electrolyser, &config.thresholds),
            clock: SimClock::new(&config.time),
            guard: StepGuard::default(),
            run: false,
            rate: config.thresholds.rate_min,
            output: ElectrolyserOutput {
                phase: ElectrolyserPhase::Off,
                flow2e_kw: 0.0,
                flow2c_kg: 0.0,
            },
        })
    }

    pub fn phase(&self) -> ElectrolyserPhase {
        self.electrolyser.phase()
    }
}

impl CosimModel for ElectrolyserModel {
    fn name(&self) -> &'static str {
        "electrolyser"
    }

    fn step(&mut self, time: u64, inputs: &Signals, _max_advance: u64) -> Result<u64, AdapterError> {
        reject_unknown(self.name(), inputs, Self::INPUTS)?;
        if let Some(next) = self.guard.check(self.name(), time)? {
            return Ok(next);
        }
        match read_bool(inputs, "run_electrolyser")? {
            Some(run) => self.run = run,
            None => warn!(time, run = self.run, "run_electrolyser missing, holding last command"),
        }
        match read_f64(inputs, "production_rate")? {
            Some(rate) if rate.is_finite() => self.rate = rate,
            Some(rate) => {
                warn!(time, rate, last = self.rate, "non-finite production_rate, keeping last")
            }
            None => {}
        }
        let context = DeviceContext::with_setpoint(
            tick_of(&self.clock, time),
            self.clock.tick_seconds(),
            self.run,
            self.rate,
        );
        self.output = self.electrolyser.advance(&context)?;
        Ok(self.guard.record(time, self.clock.next_time(time)))
    }

    fn outputs(&self) -> Signals {
        signals([
            ("flow2e", self.output.flow2e_kw.into()),
            ("flow2c", self.output.flow2c_kg.into()),
            ("electrolyser_state", self.output.phase.as_str().into()),
        ])
    }
}

/// Adapter around [`FuelCell`].
pub struct FuelCellModel {
    fuel_cell: FuelCell,
    clock: SimClock,
    guard: StepGuard,
    run: bool,
    output: FuelCellOutput,
}

impl FuelCellModel {
    pub const INPUTS: &'static [&'static str] = &["run_fuelcell"];

    /// # Errors
    ///
    /// Returns [`DispatchError::Config`] if `config` is invalid.
    pub fn new(config: PlantConfig) -> Result<Self, DispatchError> {
        let config = config.validated()?;
        Ok(Self {
            fuel_cell: FuelCell::new(config.fuel_cell),
            clock: SimClock::new(&config.time),
            guard: StepGuard::default(),
            run: false,
            output: FuelCellOutput {
                phase: FuelCellPhase::Off,
                power_kw: 0.0,
                h2_kg_per_hour: 0.0,
            },
        })
    }

    pub fn phase(&self) -> FuelCellPhase {
        self.fuel_cell.phase()
    }
}

impl CosimModel for FuelCellModel {
    fn name(&self) -> &'static str {
        "fuel_cell"
    }

    fn step(&mut self, time: u64, inputs: &Signals, _max_advance: u64) -> Result<u64, AdapterError> {
        reject_unknown(self.name(), inputs, Self::INPUTS)?;
        if let Some(next) = self.guard.check(self.name(), time)? {
            return Ok(next);
        }
        match read_bool(inputs, "run_fuelcell")? {
            Some(run) => self.run = run,
            None => warn!(time, run = self.run, "run_fuelcell missing, holding last command"),
        }
        let context = DeviceContext::new(
            tick_of(&self.clock, time),
            self.clock.tick_seconds(),
            self.run,
        );
        self.output = self.fuel_cell.advance(&context)?;
        Ok(self.guard.record(time, self.clock.next_time(time)))
    }

    fn outputs(&self) -> Signals {
        signals([
            ("p_out_fuelcell", self.output.power_kw.into()),
            ("fuelcell_h2_flow", self.output.h2_kg_per_hour.into()),
            ("fuelcell_state", self.output.phase.as_str().into()),
        ])
    }
}

/// Adapter around [`GridMonitor`].
///
/// `load_signal` and `pv_signal` are required; asset flows that are not
/// wired contribute nothing. Flows use the asset conventions of
/// [`GridFlows`]: `flow2e` and `p_compressor` negative while consuming,
/// `p_battery` positive while discharging.
pub struct GridModel {
    grid: GridMonitor,
    clock: SimClock,
    guard: StepGuard,
    reading: GridReading,
}

impl GridModel {
    pub const INPUTS: &'static [&'static str] = &[
        "load_signal",
        "pv_signal",
        "flow2e",
        "p_compressor",
        "p_out_fuelcell",
        "p_battery",
    ];

    /// # Errors
    ///
    /// Returns [`DispatchError::Config`] if `config` is invalid.
    pub fn new(config: PlantConfig) -> Result<Self, DispatchError> {
        let config = config.validated()?;
        Ok(Self {
            grid: GridMonitor::new(config.thresholds),
            clock: SimClock::new(&config.time),
            guard: StepGuard::default(),
            reading: GridReading::default(),
        })
    }

    pub fn reading(&self) -> GridReading {
        self.reading
    }
}

impl CosimModel for GridModel {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn step(&mut self, time: u64, inputs: &Signals, _max_advance: u64) -> Result<u64, AdapterError> {
        reject_unknown(self.name(), inputs, Self::INPUTS)?;
        if let Some(next) = self.guard.check(self.name(), time)? {
            return Ok(next);
        }
        let load = read_f64(inputs, "load_signal")?;
        let pv = read_f64(inputs, "pv_signal")?;
        let (Some(load_kw), Some(pv_kw)) = (load, pv) else {
            warn!(time, "load_signal or pv_signal missing, holding last grid reading");
            return Ok(self.guard.record(time, self.clock.next_time(time)));
        };
        let flows = GridFlows {
            load_kw,
            pv_kw,
            flow2e_kw: read_f64(inputs, "flow2e")?.unwrap_or(0.0),
            compressor_kw: read_f64(inputs, "p_compressor")?.unwrap_or(0.0),
            fuel_cell_kw: read_f64(inputs, "p_out_fuelcell")?.unwrap_or(0.0),
            battery_kw: read_f64(inputs, "p_battery")?.unwrap_or(0.0),
        };
        if let Some(kw) = flows.signed().into_iter().find(|kw| !kw.is_finite()) {
            warn!(time, value = kw, "non-finite grid input, holding last grid reading");
            return Ok(self.guard.record(time, self.clock.next_time(time)));
        }
        self.grid.reset();
        for kw in flows.signed() {
            self.grid.add_net_kw(kw);
        }
        self.reading = self.grid.reading();
        if self.reading.flag_critical {
            warn!(time, grid_flow = self.reading.grid_flow_kw, "grid flow at critical limit");
        } else if self.reading.flag_warning {
            warn!(time, grid_flow = self.reading.grid_flow_kw, "grid flow above tolerance");
        }
        Ok(self.guard.record(time, self.clock.next_time(time)))
    }

    fn outputs(&self) -> Signals {
        let r = &self.reading;
        let mut out = signals([
            ("grid_flow", r.grid_flow_kw.into()),
            ("flag_warning", r.flag_warning.into()),
            ("flag_critical", r.flag_critical.into()),
        ]);
        out.insert("utilisation".into(), Signal::Float(r.utilisation));
        out
    }
}
