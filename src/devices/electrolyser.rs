use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::config::{ElectrolyserConfig, ThresholdConfig};
use crate::devices::types::{Device, DeviceContext, advance_timer, lerp, ramp_fraction};
use crate::error::InvariantViolation;

/// Operating phase of the electrolyser.
///
/// ```text
///  Off ──run──▶ WarmUp ──warm_up_time──▶ RampUp ──ramp_up_time──▶ On
///   ▲                                                             │
///   │                                                          !run
///   │                                                             ▼
///   └──────hold_time────── Hold ◀──────ramp_down_time──────── RampDown
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectrolyserPhase {
    Off,
    WarmUp,
    RampUp,
    On,
    RampDown,
    Hold,
}

impl ElectrolyserPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::WarmUp => "warm_up",
            Self::RampUp => "ramp_up",
            Self::On => "on",
            Self::RampDown => "ramp_down",
            Self::Hold => "hold",
        }
    }

    /// Phases that run on an elapsed-time gate.
    pub fn is_timed(&self) -> bool {
        matches!(
            self,
            Self::WarmUp | Self::RampUp | Self::RampDown | Self::Hold
        )
    }
}

impl fmt::Display for ElectrolyserPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ElectrolyserPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(Self::Off),
            "warm_up" => Ok(Self::WarmUp),
            "ramp_up" => Ok(Self::RampUp),
            "on" => Ok(Self::On),
            "ramp_down" => Ok(Self::RampDown),
            "hold" => Ok(Self::Hold),
            other => Err(format!("unknown electrolyser phase \"{other}\"")),
        }
    }
}

/// Result of one electrolyser tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElectrolyserOutput {
    /// Phase after this tick.
    pub phase: ElectrolyserPhase,
    /// Electrical flow into the electrolyser (kW, negative = consuming).
    pub flow2e_kw: f64,
    /// Hydrogen delivered to the compressor during this tick (kg).
    pub flow2c_kg: f64,
}

/// PEM electrolyser with a warm-up / ramp / hold cycle.
///
/// A start cannot be aborted: `run_command == false` is ignored during
/// `WarmUp` and `RampUp` and honoured once `On` is reached. A restart is
/// likewise ignored during `RampDown` and `Hold`; the asset has to reach
/// `Off` before it can warm up again.
///
/// The tick on which a phase gate opens still emits the output of the
/// phase being left; the next tick runs in the new phase.
#[derive(Debug, Clone)]
pub struct Electrolyser {
    rating: ElectrolyserConfig,
    warm_up_time: f64,
    ramp_up_time: f64,
    ramp_down_time: f64,
    hold_time: f64,

    phase: ElectrolyserPhase,
    /// Ticks completed in the current timed phase; `None` in `Off` and `On`.
    phase_elapsed_ticks: Option<u64>,
    /// Share of `max_p_in` drawn while `On`, last supplied by the controller.
    production_rate: f64,
    /// Power at the moment `On` was left; start of the ramp-down.
    ramp_start_kw: f64,
}

impl Electrolyser {
    /// Creates an electrolyser in `Off`.
    ///
    /// Phase durations are taken from the controller thresholds so that both
    /// share one source of truth.
    pub fn new(rating: ElectrolyserConfig, thresholds: &ThresholdConfig) -> Self {
        Self {
            production_rate: thresholds.rate_min,
            rating,
            warm_up_time: thresholds.warm_up_time,
            ramp_up_time: thresholds.ramp_up_time,
            ramp_down_time: thresholds.ramp_down_time,
            hold_time: thresholds.hold_time,
            phase: ElectrolyserPhase::Off,
            phase_elapsed_ticks: None,
            ramp_start_kw: 0.0,
        }
    }

    pub fn production_rate(&self) -> f64 {
        self.production_rate
    }

    pub fn phase_elapsed_ticks(&self) -> Option<u64> {
        self.phase_elapsed_ticks
    }

    pub fn rating(&self) -> &ElectrolyserConfig {
        &self.rating
    }

    /// Power held after the ramp-down (kW, negative).
    pub fn idle_power_kw(&self) -> f64 {
        -self.rating.idle_fraction * self.rating.max_p_in
    }

    /// Hydrogen produced from `power_kw` drawn for `dt_seconds`.
    fn hydrogen_kg(&self, power_kw: f64, dt_seconds: f64) -> f64 {
        let energy_kwh = (-power_kw).max(0.0) * dt_seconds / 3600.0;
        energy_kwh * self.rating.efficiency / self.rating.lhv_kwh_per_kg
    }

    fn enter(&mut self, next: ElectrolyserPhase, tick: u64) {
        debug!(asset = "electrolyser", tick, from = %self.phase, to = %next, "phase transition");
        self.phase = next;
        self.phase_elapsed_ticks = if next.is_timed() { Some(0) } else { None };
    }

    fn elapsed_seconds(&mut self, context: &DeviceContext) -> Result<f64, InvariantViolation> {
        let phase = self.phase;
        advance_timer(
            &mut self.phase_elapsed_ticks,
            "electrolyser",
            &phase,
            context,
        )
    }
}

impl Device for Electrolyser {
    type Phase = ElectrolyserPhase;
    type Output = ElectrolyserOutput;

    fn advance(&mut self, context: &DeviceContext) -> Result<ElectrolyserOutput, InvariantViolation> {
        use ElectrolyserPhase::*;

        if let Some(rate) = context.setpoint.filter(|r| r.is_finite()) {
            // never below the idle level, so RampDown stays monotone
            self.production_rate = rate.max(self.rating.idle_fraction).min(1.0);
        }
        let max_p_in = self.rating.max_p_in;
        let producing = !matches!(self.phase, Off | WarmUp);

        let flow2e_kw = match self.phase {
            Off => {
                if context.run_command {
                    self.enter(WarmUp, context.tick);
                }
                0.0
            }
            WarmUp => {
                let elapsed = self.elapsed_seconds(context)?;
                if elapsed >= self.warm_up_time {
                    self.enter(RampUp, context.tick);
                }
                -self.rating.warm_up_power
            }
            RampUp => {
                let elapsed = self.elapsed_seconds(context)?;
                let power = -ramp_fraction(elapsed, self.ramp_up_time) * max_p_in;
                if elapsed >= self.ramp_up_time {
                    self.enter(On, context.tick);
                }
                power.clamp(-max_p_in, 0.0)
            }
            On => {
                let power = -self.production_rate * max_p_in;
                if !context.run_command {
                    self.ramp_start_kw = power;
                    self.enter(RampDown, context.tick);
                }
                power
            }
            RampDown => {
                let elapsed = self.elapsed_seconds(context)?;
                let frac = ramp_fraction(elapsed, self.ramp_down_time);
                let power = lerp(self.ramp_start_kw, self.idle_power_kw(), frac);
                if elapsed >= self.ramp_down_time {
                    self.enter(Hold, context.tick);
                }
                power
            }
            Hold => {
                let elapsed = self.elapsed_seconds(context)?;
                if elapsed >= self.hold_time {
                    self.enter(Off, context.tick);
                }
                self.idle_power_kw()
            }
        };

        let flow2c_kg = if producing {
            self.hydrogen_kg(flow2e_kw, context.dt_seconds)
        } else {
            0.0
        };

        Ok(ElectrolyserOutput {
            phase: self.phase,
            flow2e_kw,
            flow2c_kg,
        })
    }

    fn phase(&self) -> ElectrolyserPhase {
        self.phase
    }

    fn device_type(&self) -> &'static str {
        "Electrolyser"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 60.0;

    /// 3-tick warm-up, 4-tick ramp-up, 2-tick ramp-down, 2-tick hold at 60 s ticks.
    fn electrolyser() -> Electrolyser {
        let thresholds = ThresholdConfig {
            warm_up_time: 180.0,
            ramp_up_time: 240.0,
            ramp_down_time: 120.0,
            hold_time: 120.0,
            ..ThresholdConfig::default()
        };
        Electrolyser::new(ElectrolyserConfig::default(), &thresholds)
    }

    fn step(el: &mut Electrolyser, tick: u64, run: bool, rate: f64) -> ElectrolyserOutput {
        el.advance(&DeviceContext::with_setpoint(tick, DT, run, rate))
            .expect("phase bookkeeping should be consistent")
    }

    #[test]
    fn starts_in_off_with_no_output() {
        let mut el = electrolyser();
        assert_eq!(el.phase(), ElectrolyserPhase::Off);
        let out = step(&mut el, 0, false, 1.0);
        assert_eq!(out.phase, ElectrolyserPhase::Off);
        assert_eq!(out.flow2e_kw, 0.0);
        assert_eq!(out.flow2c_kg, 0.0);
    }

    #[test]
    fn run_command_enters_warm_up_with_zero_output() {
        let mut el = electrolyser();
        let out = step(&mut el, 0, true, 1.0);
        assert_eq!(out.phase, ElectrolyserPhase::WarmUp);
        assert_eq!(out.flow2e_kw, 0.0);
        assert_eq!(el.phase_elapsed_ticks(), Some(0));
    }

    #[test]
    fn warm_up_draws_fixed_power_and_makes_no_hydrogen() {
        let mut el = electrolyser();
        step(&mut el, 0, true, 1.0);
        for t in 1..=3 {
            let out = step(&mut el, t, true, 1.0);
            assert_eq!(out.flow2e_kw, -5.0);
            assert_eq!(out.flow2c_kg, 0.0);
        }
        assert_eq!(el.phase(), ElectrolyserPhase::RampUp);
    }

    #[test]
    fn ramp_up_is_linear_to_max_then_on() {
        let mut el = electrolyser();
        for t in 0..=3 {
            step(&mut el, t, true, 1.0);
        }
        let powers: Vec<f64> = (4..=7).map(|t| step(&mut el, t, true, 1.0).flow2e_kw).collect();
        assert_eq!(powers, vec![-12.5, -25.0, -37.5, -50.0]);
        assert_eq!(el.phase(), ElectrolyserPhase::On);
    }

    #[test]
    fn on_follows_production_rate() {
        let mut el = electrolyser();
        for t in 0..=7 {
            step(&mut el, t, true, 1.0);
        }
        let out = step(&mut el, 8, true, 0.6);
        assert_eq!(out.phase, ElectrolyserPhase::On);
        assert!((out.flow2e_kw + 30.0).abs() < 1e-9);
        assert_eq!(el.production_rate(), 0.6);
    }

    #[test]
    fn hydrogen_follows_power_and_efficiency() {
        let mut el = electrolyser();
        for t in 0..=7 {
            step(&mut el, t, true, 1.0);
        }
        let out = step(&mut el, 8, true, 1.0);
        // 50 kW for one minute at 65% of 33.33 kWh/kg
        let expected = 50.0 / 60.0 * 0.65 / 33.33;
        assert!((out.flow2c_kg - expected).abs() < 1e-12);
    }

    #[test]
    fn stop_runs_through_ramp_down_and_hold() {
        let mut el = electrolyser();
        for t in 0..=8 {
            step(&mut el, t, true, 1.0);
        }
        // stop on tick 9: emits On power, then ramps down
        let out = step(&mut el, 9, false, 1.0);
        assert_eq!(out.flow2e_kw, -50.0);
        assert_eq!(out.phase, ElectrolyserPhase::RampDown);

        let rd: Vec<f64> = (10..=11).map(|t| step(&mut el, t, false, 1.0).flow2e_kw).collect();
        assert_eq!(rd, vec![-40.0, -30.0]);
        assert_eq!(el.phase(), ElectrolyserPhase::Hold);

        let hold: Vec<f64> = (12..=13).map(|t| step(&mut el, t, false, 1.0).flow2e_kw).collect();
        assert_eq!(hold, vec![-30.0, -30.0]);
        assert_eq!(el.phase(), ElectrolyserPhase::Off);

        let out = step(&mut el, 14, false, 1.0);
        assert_eq!(out.flow2e_kw, 0.0);
    }

    #[test]
    fn setpoint_is_clamped_to_idle_and_nan_ignored() {
        let mut el = electrolyser();
        for t in 0..=7 {
            step(&mut el, t, true, 1.0);
        }
        let out = step(&mut el, 8, true, f64::NAN);
        assert_eq!(out.flow2e_kw, -50.0);
        assert_eq!(el.production_rate(), 1.0);

        let out = step(&mut el, 9, true, 0.1);
        assert_eq!(el.production_rate(), 0.6);
        assert_eq!(out.flow2e_kw, -30.0);

        // ramp-down from the idle level never grows
        let rd: Vec<f64> = (10..=12).map(|t| step(&mut el, t, false, 0.1).flow2e_kw).collect();
        assert_eq!(rd, vec![-30.0, -30.0, -30.0]);
    }

    #[test]
    fn stop_during_warm_up_is_ignored() {
        let mut el = electrolyser();
        step(&mut el, 0, true, 1.0);
        let out = step(&mut el, 1, false, 1.0);
        assert_eq!(out.phase, ElectrolyserPhase::WarmUp);
        for t in 2..=3 {
            step(&mut el, t, false, 1.0);
        }
        assert_eq!(el.phase(), ElectrolyserPhase::RampUp);
    }

    #[test]
    fn restart_during_hold_does_not_rewarm() {
        let mut el = electrolyser();
        for t in 0..=8 {
            step(&mut el, t, true, 1.0);
        }
        step(&mut el, 9, false, 1.0);
        for t in 10..=12 {
            let out = step(&mut el, t, true, 1.0);
            assert_ne!(out.phase, ElectrolyserPhase::WarmUp);
        }
        step(&mut el, 13, true, 1.0);
        assert_eq!(el.phase(), ElectrolyserPhase::Off);
        let out = step(&mut el, 14, true, 1.0);
        assert_eq!(out.phase, ElectrolyserPhase::WarmUp);
    }

    #[test]
    fn zero_durations_still_visit_every_phase() {
        let thresholds = ThresholdConfig {
            warm_up_time: 0.0,
            ramp_up_time: 0.0,
            ramp_down_time: 0.0,
            hold_time: 0.0,
            ..ThresholdConfig::default()
        };
        let mut el = Electrolyser::new(ElectrolyserConfig::default(), &thresholds);
        let mut seen = Vec::new();
        for t in 0..4 {
            seen.push(step(&mut el, t, true, 1.0).phase);
        }
        for t in 4..8 {
            seen.push(step(&mut el, t, false, 1.0).phase);
        }
        use ElectrolyserPhase::*;
        assert_eq!(
            seen,
            vec![WarmUp, RampUp, On, On, RampDown, Hold, Off, Off]
        );
    }

    #[test]
    fn phase_names_round_trip() {
        use ElectrolyserPhase::*;
        for phase in [Off, WarmUp, RampUp, On, RampDown, Hold] {
            assert_eq!(phase.as_str().parse::<ElectrolyserPhase>(), Ok(phase));
        }
        assert!("idle".parse::<ElectrolyserPhase>().is_err());
    }
}
