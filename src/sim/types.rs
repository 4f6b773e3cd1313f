//! Core per-tick types: sensor inputs, dispatch commands, and tick records.

use std::fmt;

use chrono::NaiveDateTime;

use crate::devices::electrolyser::ElectrolyserOutput;
use crate::devices::fuel_cell::FuelCellOutput;
use crate::error::{InvariantViolation, SensorError};
use crate::sim::grid::GridReading;

/// Sensor-like readings handed to the controller for one tick.
///
/// Produced externally each tick and discarded after `decide`. The grid flow
/// and fuel cell output are the previous tick's values.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use hess_dispatch::sim::types::SensorSnapshot;
///
/// let now = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(8, 0, 0).unwrap();
/// let snapshot = SensorSnapshot {
///     tick: 0,
///     now,
///     pv_signal: 100.0,
///     load_signal: 20.0,
///     battery_soc: 85.0,
///     h2_soc: 40.0,
///     grid_flow: 0.0,
///     fuel_cell_output_power: 0.0,
/// };
/// assert!(snapshot.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSnapshot {
    pub tick: u64,
    /// Wall-clock time derived from the tick.
    pub now: NaiveDateTime,
    /// PV generation (kW, positive).
    pub pv_signal: f64,
    /// Consumer demand (kW, positive).
    pub load_signal: f64,
    /// Battery SOC (%).
    pub battery_soc: f64,
    /// Hydrogen tank SOC (%).
    pub h2_soc: f64,
    /// Net grid flow (kW, positive = import).
    pub grid_flow: f64,
    /// Fuel cell AC output (kW).
    pub fuel_cell_output_power: f64,
}

impl SensorSnapshot {
    /// Rejects non-finite readings and SOC values outside `[0, 100]`.
    pub fn validate(&self) -> Result<(), SensorError> {
        let finite = [
            ("pv_signal", self.pv_signal),
            ("load_signal", self.load_signal),
            ("soc", self.battery_soc),
            ("h2_soc", self.h2_soc),
            ("grid_flow", self.grid_flow),
            ("output_power_fc", self.fuel_cell_output_power),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(SensorError::NonFinite { name, value });
            }
        }
        for (name, value) in [("soc", self.battery_soc), ("h2_soc", self.h2_soc)] {
            if !(0.0..=100.0).contains(&value) {
                return Err(SensorError::OutOfBounds {
                    name,
                    value,
                    min: 0.0,
                    max: 100.0,
                });
            }
        }
        Ok(())
    }

    /// PV surplus over demand (kW, negative = deficit).
    pub fn surplus_kw(&self) -> f64 {
        self.pv_signal - self.load_signal
    }
}

/// Direction of hydrogen flow at the tank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageFlow {
    Store,
    Withdraw,
    #[default]
    Idle,
}

impl StorageFlow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Store => "store",
            Self::Withdraw => "withdraw",
            Self::Idle => "idle",
        }
    }
}

impl fmt::Display for StorageFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Commanded run intents for one tick.
///
/// Built only through [`DispatchCommand::new`] or [`DispatchCommand::idle`],
/// so `storage_flow` and `compressor_on` always agree with the run flags and
/// the two assets are never commanded together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchCommand {
    pub run_electrolyser: bool,
    pub run_fuelcell: bool,
    pub compressor_on: bool,
    pub storage_flow: StorageFlow,
    /// Electrolyser production rate (share of `max_p_in`).
    pub production_rate: f64,
}

impl DispatchCommand {
    /// Derives the flow direction and compressor state from the run flags.
    ///
    /// # Errors
    ///
    /// Returns an [`InvariantViolation`] if both assets would run.
    pub fn new(
        tick: u64,
        run_electrolyser: bool,
        run_fuelcell: bool,
        production_rate: f64,
    ) -> Result<Self, InvariantViolation> {
        if run_electrolyser && run_fuelcell {
            tracing::error!(tick, "electrolyser and fuel cell commanded together");
            return Err(InvariantViolation::new(
                "controller",
                tick,
                "run_electrolyser and run_fuelcell both true",
            ));
        }
        let storage_flow = if run_electrolyser {
            StorageFlow::Store
        } else if run_fuelcell {
            StorageFlow::Withdraw
        } else {
            StorageFlow::Idle
        };
        Ok(Self {
            run_electrolyser,
            run_fuelcell,
            compressor_on: run_electrolyser,
            storage_flow,
            production_rate,
        })
    }

    /// Both assets stopped.
    pub fn idle(production_rate: f64) -> Self {
        Self {
            run_electrolyser: false,
            run_fuelcell: false,
            compressor_on: false,
            storage_flow: StorageFlow::Idle,
            production_rate,
        }
    }
}

/// Complete record of one engine tick.
#[derive(Debug, Clone)]
pub struct TickRecord {
    pub tick: u64,
    pub time: NaiveDateTime,
    pub pv_kw: f64,
    pub load_kw: f64,
    pub battery_soc: f64,
    pub h2_soc: f64,
    pub command: DispatchCommand,
    /// `true` if the controller held the previous command on bad input.
    pub held: bool,
    pub electrolyser: ElectrolyserOutput,
    pub fuel_cell: FuelCellOutput,
    pub grid: GridReading,
}

impl fmt::Display for TickRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:>4} {} | pv={:>6.1} load={:>6.1} soc={:>5.1}% h2={:>5.1}% | \
             el={:<9} {:>7.2} kW  fc={:<9} {:>6.2} kW | grid={:>7.2} kW{}{}",
            self.tick,
            self.time.format("%m-%d %H:%M"),
            self.pv_kw,
            self.load_kw,
            self.battery_soc,
            self.h2_soc,
            self.electrolyser.phase,
            self.electrolyser.flow2e_kw,
            self.fuel_cell.phase,
            self.fuel_cell.power_kw,
            self.grid.grid_flow_kw,
            if self.grid.flag_critical {
                " CRITICAL"
            } else if self.grid.flag_warning {
                " warning"
            } else {
                ""
            },
            if self.held { " (held)" } else { "" },
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::devices::electrolyser::ElectrolyserPhase;
    use crate::devices::fuel_cell::FuelCellPhase;

    fn snapshot() -> SensorSnapshot {
        SensorSnapshot {
            tick: 3,
            now: NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
            pv_signal: 100.0,
            load_signal: 20.0,
            battery_soc: 85.0,
            h2_soc: 40.0,
            grid_flow: 0.0,
            fuel_cell_output_power: 0.0,
        }
    }

    #[test]
    fn valid_snapshot_passes() {
        assert_eq!(snapshot().validate(), Ok(()));
        assert_eq!(snapshot().surplus_kw(), 80.0);
    }

    #[test]
    fn nan_reading_is_rejected() {
        let s = SensorSnapshot {
            pv_signal: f64::NAN,
            ..snapshot()
        };
        assert!(matches!(
            s.validate(),
            Err(SensorError::NonFinite { name: "pv_signal", .. })
        ));
    }

    #[test]
    fn soc_out_of_range_is_rejected() {
        let s = SensorSnapshot {
            h2_soc: 101.0,
            ..snapshot()
        };
        assert!(matches!(
            s.validate(),
            Err(SensorError::OutOfBounds { name: "h2_soc", .. })
        ));
    }

    #[test]
    fn command_derives_flow_and_compressor() {
        let store = DispatchCommand::new(0, true, false, 0.8).unwrap();
        assert_eq!(store.storage_flow, StorageFlow::Store);
        assert!(store.compressor_on);

        let withdraw = DispatchCommand::new(0, false, true, 0.8).unwrap();
        assert_eq!(withdraw.storage_flow, StorageFlow::Withdraw);
        assert!(!withdraw.compressor_on);

        let idle = DispatchCommand::new(0, false, false, 0.8).unwrap();
        assert_eq!(idle, DispatchCommand::idle(0.8));
    }

    #[test]
    fn running_both_assets_is_invariant_violation() {
        let err = DispatchCommand::new(12, true, true, 1.0).unwrap_err();
        assert_eq!(err.tick, 12);
        assert_eq!(err.asset, "controller");
    }

    #[test]
    fn tick_record_display_does_not_panic() {
        let s = snapshot();
        let r = TickRecord {
            tick: s.tick,
            time: s.now,
            pv_kw: s.pv_signal,
            load_kw: s.load_signal,
            battery_soc: s.battery_soc,
            h2_soc: s.h2_soc,
            command: DispatchCommand::idle(0.6),
            held: true,
            electrolyser: ElectrolyserOutput {
                phase: ElectrolyserPhase::WarmUp,
                flow2e_kw: -5.0,
                flow2c_kg: 0.0,
            },
            fuel_cell: FuelCellOutput {
                phase: FuelCellPhase::Off,
                power_kw: 0.0,
                h2_kg_per_hour: 0.0,
            },
            grid: GridReading {
                grid_flow_kw: 90.0,
                utilisation: 0.9,
                flag_warning: true,
                flag_critical: false,
            },
        };
        let line = format!("{r}");
        assert!(line.contains("warm_up"));
        assert!(line.contains("warning"));
        assert!(line.contains("(held)"));
    }
}
