use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::config::FuelCellConfig;
use crate::devices::types::{Device, DeviceContext, advance_timer, ramp_fraction};
use crate::error::InvariantViolation;

/// Operating phase of the fuel cell.
///
/// Start-up runs through two linear ramps: zero to the breakpoint, then the
/// breakpoint to rated output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuelCellPhase {
    Off,
    RampUp1,
    RampUp2,
    On,
    RampDown,
}

impl FuelCellPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::RampUp1 => "ramp_up_1",
            Self::RampUp2 => "ramp_up_2",
            Self::On => "on",
            Self::RampDown => "ramp_down",
        }
    }

    pub fn is_timed(&self) -> bool {
        matches!(self, Self::RampUp1 | Self::RampUp2 | Self::RampDown)
    }
}

impl fmt::Display for FuelCellPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for FuelCellPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(Self::Off),
            "ramp_up_1" => Ok(Self::RampUp1),
            "ramp_up_2" => Ok(Self::RampUp2),
            "on" => Ok(Self::On),
            "ramp_down" => Ok(Self::RampDown),
            other => Err(format!("unknown fuel cell phase \"{other}\"")),
        }
    }
}

/// Result of one fuel cell tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuelCellOutput {
    /// Phase after this tick.
    pub phase: FuelCellPhase,
    /// AC output (kW, positive = supplying).
    pub power_kw: f64,
    /// Hydrogen draw at this output (kg/h).
    pub h2_kg_per_hour: f64,
}

/// PEM fuel cell with a two-stage start ramp.
#[derive(Debug, Clone)]
pub struct FuelCell {
    rating: FuelCellConfig,
    rated_kw: f64,
    phase: FuelCellPhase,
    phase_elapsed_ticks: Option<u64>,
    ramp_start_kw: f64,
}

impl FuelCell {
    pub fn new(rating: FuelCellConfig) -> Self {
        Self {
            rated_kw: rating.rated_output_kw(),
            rating,
            phase: FuelCellPhase::Off,
            phase_elapsed_ticks: None,
            ramp_start_kw: 0.0,
        }
    }

    /// Rated AC output (kW).
    pub fn rated_kw(&self) -> f64 {
        self.rated_kw
    }

    pub fn phase_elapsed_ticks(&self) -> Option<u64> {
        self.phase_elapsed_ticks
    }

    fn breakpoint_kw(&self) -> f64 {
        self.rating.ramp_breakpoint.clamp(0.0, 1.0) * self.rated_kw
    }

    fn h2_kg_per_hour(&self, power_kw: f64) -> f64 {
        if self.rated_kw <= 0.0 {
            return 0.0;
        }
        self.rating.nominal_h2_kg_per_hour() * power_kw.max(0.0) / self.rated_kw
    }

    fn enter(&mut self, next: FuelCellPhase, tick: u64) {
        debug!(asset = "fuel_cell", tick, from = %self.phase, to = %next, "phase transition");
        self.phase = next;
        self.phase_elapsed_ticks = if next.is_timed() { Some(0) } else { None };
    }

    fn elapsed_seconds(&mut self, context: &DeviceContext) -> Result<f64, InvariantViolation> {
        let phase = self.phase;
        advance_timer(&mut self.phase_elapsed_ticks, "fuel_cell", &phase, context)
    }
}

impl Device for FuelCell {
    type Phase = FuelCellPhase;
    type Output = FuelCellOutput;

    /// Stop commands are ignored during the start ramps; the fuel cell reaches
    /// `On` before it can ramp down.
    fn advance(&mut self, context: &DeviceContext) -> Result<FuelCellOutput, InvariantViolation> {
        use FuelCellPhase::*;

        let power_kw = match self.phase {
            Off => {
                if context.run_command {
                    self.enter(RampUp1, context.tick);
                }
                0.0
            }
            RampUp1 => {
                let elapsed = self.elapsed_seconds(context)?;
                let power = self.breakpoint_kw() * ramp_fraction(elapsed, self.rating.ramp_up_1_time);
                if elapsed >= self.rating.ramp_up_1_time {
                    self.enter(RampUp2, context.tick);
                }
                power
            }
            RampUp2 => {
                let elapsed = self.elapsed_seconds(context)?;
                let bp = self.breakpoint_kw();
                let power = bp
                    + (self.rated_kw - bp) * ramp_fraction(elapsed, self.rating.ramp_up_2_time);
                if elapsed >= self.rating.ramp_up_2_time {
                    self.enter(On, context.tick);
                }
                power
            }
            On => {
                if !context.run_command {
                    self.ramp_start_kw = self.rated_kw;
                    self.enter(RampDown, context.tick);
                }
                self.rated_kw
            }
            RampDown => {
                let elapsed = self.elapsed_seconds(context)?;
                let power =
                    self.ramp_start_kw * (1.0 - ramp_fraction(elapsed, self.rating.ramp_down_time));
                if elapsed >= self.rating.ramp_down_time {
                    self.enter(Off, context.tick);
                }
                power
            }
        };

        Ok(FuelCellOutput {
            phase: self.phase,
            power_kw,
            h2_kg_per_hour: self.h2_kg_per_hour(power_kw),
        })
    }

    fn phase(&self) -> FuelCellPhase {
        self.phase
    }

    fn device_type(&self) -> &'static str {
        "FuelCell"
    }
}
