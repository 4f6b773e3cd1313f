//! TOML-based plant configuration and preset definitions.

use std::fmt;
use std::fs;
use std::path::Path;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::DispatchError;

/// Top-level configuration bundle, loaded once before the first tick.
///
/// All sections have defaults matching the reference plant. Load from
/// TOML with [`PlantConfig::from_toml_file`] or use
/// [`PlantConfig::reference`] for the built-in default.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlantConfig {
    /// Simulation timing.
    #[serde(default)]
    pub time: TimeConfig,
    /// Which controller variant decides starts and stops.
    #[serde(default)]
    pub policy: GridAwarenessPolicy,
    /// Controller thresholds, phase durations, and grid limits.
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    /// Electrolyser rating.
    #[serde(default)]
    pub electrolyser: ElectrolyserConfig,
    /// Fuel cell rating and ramp profile.
    #[serde(default)]
    pub fuel_cell: FuelCellConfig,
}

/// Controller variant.
///
/// - `Simple`: electrolyser follows a PV threshold; fuel cell covers a fixed deficit.
/// - `GridAware`: electrolyser needs PV surplus and an uncongested grid; fuel cell
///   covers transformer overflow.
/// - `Islanded`: no grid behind the plant; electrolyser runs on PV surplus only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridAwarenessPolicy {
    #[default]
    Simple,
    GridAware,
    Islanded,
}

/// Simulation timing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeConfig {
    /// Wall-clock instant of time index 0 (`"YYYY-MM-DDTHH:MM:SS"`).
    pub start: NaiveDateTime,
    /// Seconds represented by one unit of scheduler time.
    pub time_resolution: f64,
    /// Scheduler time units between two ticks.
    pub time_step_size: u64,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2024, 6, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or_default(),
            time_resolution: 60.0,
            time_step_size: 15,
        }
    }
}

impl TimeConfig {
    /// Duration of one tick in seconds.
    pub fn tick_seconds(&self) -> f64 {
        self.time_step_size as f64 * self.time_resolution
    }
}

/// A calendar day without a year, written `"MM-DD"` in TOML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

impl MonthDay {
    pub const fn new(month: u32, day: u32) -> Self {
        Self { month, day }
    }

    pub fn of(date: NaiveDate) -> Self {
        Self::new(date.month(), date.day())
    }

    /// `true` if the pair names a real day in a leap year.
    pub fn is_valid(&self) -> bool {
        NaiveDate::from_ymd_opt(2000, self.month, self.day).is_some()
    }
}

impl TryFrom<String> for MonthDay {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let (m, d) = s
            .split_once('-')
            .ok_or_else(|| format!("expected \"MM-DD\", got \"{s}\""))?;
        let month = m
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("invalid month in \"{s}\""))?;
        let day = d
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("invalid day in \"{s}\""))?;
        Ok(Self::new(month, day))
    }
}

impl From<MonthDay> for String {
    fn from(md: MonthDay) -> Self {
        md.to_string()
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

/// One step of the winter fuel-cell staircase: within `[from_hour, to_hour)`
/// the fuel cell may start once battery SOC drops to `soc_below`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaircaseStep {
    pub from_hour: u32,
    pub to_hour: u32,
    pub soc_below: f64,
}

/// Immutable controller thresholds. SOC values are percentages, durations
/// are seconds, powers are kW.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThresholdConfig {
    /// Battery SOC below which no flow may drain the battery.
    pub soc_min: f64,
    /// Battery SOC above which no flow may charge the battery.
    pub soc_max: f64,
    /// Tank SOC at or below which hydrogen may not be withdrawn.
    pub h2_soc_min: f64,
    /// Tank SOC at or above which hydrogen may not be stored.
    pub h2_soc_max: f64,

    pub el_start_soc: f64,
    pub el_stop_soc: f64,
    /// First hour (inclusive) of the electrolyser start window.
    pub el_start_hour: u32,
    /// Last hour (exclusive) of the electrolyser start window.
    pub el_stop_hour: u32,

    /// Emergency battery SOC at which the fuel cell may start.
    pub fc_start_soc: f64,
    pub fc_stop_soc: f64,
    /// Net deficit `load - pv` (kW) that justifies a fuel-cell start.
    pub fc_deficit_threshold: f64,

    /// PV power (kW) needed to start the electrolyser.
    pub pv_threshold_start: f64,
    /// Fraction of `pv_threshold_start` below which the electrolyser stops.
    pub pv_threshold_stop_fraction: f64,

    /// Grid connection capacity (kW), also the transformer overflow level.
    pub grid_import_limit: f64,
    /// Grid utilisation (0..1) above which the grid counts as congested.
    pub grid_congestion_threshold: f64,
    /// Utilisation at which the monitor raises a warning.
    pub tolerance_limit: f64,
    /// Utilisation at which the monitor raises a critical flag.
    pub critical_limit: f64,

    pub warm_up_time: f64,
    pub ramp_up_time: f64,
    pub ramp_down_time: f64,
    pub hold_time: f64,

    /// Battery SOC below which the electrolyser runs at `rate_min`.
    pub rate_soc_low: f64,
    /// Battery SOC above which the electrolyser runs at `rate_max`.
    pub rate_soc_high: f64,
    pub rate_min: f64,
    pub rate_max: f64,

    /// First summer day (inclusive).
    pub summer_start: MonthDay,
    /// Last summer day (inclusive).
    pub summer_end: MonthDay,
    /// Hour-of-day fuel-cell start levels applied in winter.
    pub winter_staircase: Vec<StaircaseStep>,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            soc_min: 10.0,
            soc_max: 95.0,
            h2_soc_min: 5.0,
            h2_soc_max: 95.0,
            el_start_soc: 80.0,
            el_stop_soc: 50.0,
            el_start_hour: 7,
            el_stop_hour: 16,
            fc_start_soc: 20.0,
            fc_stop_soc: 40.0,
            fc_deficit_threshold: 60.0,
            pv_threshold_start: 50.0,
            pv_threshold_stop_fraction: 0.5,
            grid_import_limit: 100.0,
            grid_congestion_threshold: 0.8,
            tolerance_limit: 0.8,
            critical_limit: 1.0,
            warm_up_time: 900.0,
            ramp_up_time: 1800.0,
            ramp_down_time: 1800.0,
            hold_time: 900.0,
            rate_soc_low: 80.0,
            rate_soc_high: 90.0,
            rate_min: 0.6,
            rate_max: 1.0,
            summer_start: MonthDay::new(4, 1),
            summer_end: MonthDay::new(9, 30),
            winter_staircase: vec![
                StaircaseStep {
                    from_hour: 6,
                    to_hour: 10,
                    soc_below: 30.0,
                },
                StaircaseStep {
                    from_hour: 17,
                    to_hour: 22,
                    soc_below: 35.0,
                },
            ],
        }
    }
}

impl ThresholdConfig {
    /// Returns `true` when `date` falls inside the summer window.
    ///
    /// The window may wrap the year end (`summer_start > summer_end`).
    pub fn is_summer(&self, date: NaiveDate) -> bool {
        let md = MonthDay::of(date);
        if self.summer_start <= self.summer_end {
            self.summer_start <= md && md <= self.summer_end
        } else {
            md >= self.summer_start || md <= self.summer_end
        }
    }

    /// Electrolyser production rate for a battery SOC.
    ///
    /// `rate_min` below `rate_soc_low`, linear up to `rate_max` at
    /// `rate_soc_high`, flat above.
    pub fn production_rate(&self, battery_soc: f64) -> f64 {
        if battery_soc <= self.rate_soc_low {
            self.rate_min
        } else if battery_soc >= self.rate_soc_high {
            self.rate_max
        } else {
            let frac = (battery_soc - self.rate_soc_low) / (self.rate_soc_high - self.rate_soc_low);
            self.rate_min + frac * (self.rate_max - self.rate_min)
        }
    }

    /// Winter staircase start level for `hour`, falling back to `fc_start_soc`.
    pub fn staircase_soc(&self, hour: u32) -> f64 {
        self.winter_staircase
            .iter()
            .find(|s| hour >= s.from_hour && hour < s.to_hour)
            .map_or(self.fc_start_soc, |s| s.soc_below.max(self.fc_start_soc))
    }

    /// `true` if `hour` is inside the electrolyser start window.
    pub fn in_el_window(&self, hour: u32) -> bool {
        hour >= self.el_start_hour && hour < self.el_stop_hour
    }
}

/// Electrolyser rating.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ElectrolyserConfig {
    /// Maximum electrical input (kW, positive magnitude).
    pub max_p_in: f64,
    /// Electrical draw while warming up (kW, positive magnitude).
    pub warm_up_power: f64,
    /// Fraction of `max_p_in` held after ramp-down.
    pub idle_fraction: f64,
    /// Share of electrical input converted to hydrogen LHV (0..1).
    pub efficiency: f64,
    /// Hydrogen lower heating value (kWh/kg).
    pub lhv_kwh_per_kg: f64,
}

impl Default for ElectrolyserConfig {
    fn default() -> Self {
        Self {
            max_p_in: 50.0,
            warm_up_power: 5.0,
            idle_fraction: 0.6,
            efficiency: 0.65,
            lhv_kwh_per_kg: 33.33,
        }
    }
}

/// Fuel cell rating and ramp profile.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FuelCellConfig {
    /// Nominal hydrogen consumption at rated output (Nm³/h).
    pub h2_nominal_flow: f64,
    /// Hydrogen density (kg/Nm³).
    pub h2_density: f64,
    /// Hydrogen energy content (kWh/kg).
    pub energy_content: f64,
    pub dc_efficiency: f64,
    pub ac_efficiency: f64,
    /// Seconds from zero to the ramp breakpoint.
    pub ramp_up_1_time: f64,
    /// Seconds from the ramp breakpoint to rated output.
    pub ramp_up_2_time: f64,
    /// Seconds from the current output down to zero.
    pub ramp_down_time: f64,
    /// Fraction of rated output reached at the end of the first ramp.
    pub ramp_breakpoint: f64,
}

impl Default for FuelCellConfig {
    fn default() -> Self {
        Self {
            h2_nominal_flow: 20.0,
            h2_density: 0.0899,
            energy_content: 33.33,
            dc_efficiency: 0.5,
            ac_efficiency: 0.95,
            ramp_up_1_time: 300.0,
            ramp_up_2_time: 600.0,
            ramp_down_time: 300.0,
            ramp_breakpoint: 0.5,
        }
    }
}

impl FuelCellConfig {
    /// Rated hydrogen draw (kg/h).
    pub fn nominal_h2_kg_per_hour(&self) -> f64 {
        self.h2_nominal_flow * self.h2_density
    }

    /// Rated AC output (kW) from the efficiency chain.
    pub fn rated_output_kw(&self) -> f64 {
        self.nominal_h2_kg_per_hour() * self.energy_content * self.dc_efficiency * self.ac_efficiency
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"thresholds.el_start_soc"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl PlantConfig {
    /// Returns the reference plant with the simple PV-threshold policy.
    pub fn reference() -> Self {
        Self {
            time: TimeConfig::default(),
            policy: GridAwarenessPolicy::Simple,
            thresholds: ThresholdConfig::default(),
            electrolyser: ElectrolyserConfig::default(),
            fuel_cell: FuelCellConfig::default(),
        }
    }

    /// Returns the grid-aware preset: a weaker connection and congestion-based stops.
    pub fn grid_aware() -> Self {
        Self {
            policy: GridAwarenessPolicy::GridAware,
            thresholds: ThresholdConfig {
                grid_import_limit: 60.0,
                grid_congestion_threshold: 0.7,
                tolerance_limit: 0.7,
                ..ThresholdConfig::default()
            },
            ..Self::reference()
        }
    }

    /// Returns the islanded preset: no grid, larger fuel cell, faster ramps.
    pub fn islanded() -> Self {
        Self {
            policy: GridAwarenessPolicy::Islanded,
            thresholds: ThresholdConfig {
                fc_start_soc: 25.0,
                fc_stop_soc: 45.0,
                fc_deficit_threshold: 20.0,
                pv_threshold_start: 30.0,
                ..ThresholdConfig::default()
            },
            fuel_cell: FuelCellConfig {
                h2_nominal_flow: 30.0,
                ramp_up_1_time: 120.0,
                ramp_up_2_time: 300.0,
                ..FuelCellConfig::default()
            },
            ..Self::reference()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["reference", "grid_aware", "islanded"];

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "reference" => Ok(Self::reference()),
            "grid_aware" => Ok(Self::grid_aware()),
            "islanded" => Ok(Self::islanded()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("config", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates and returns the configuration, or the fatal error listing
    /// every violation.
    pub fn validated(self) -> Result<Self, DispatchError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(DispatchError::Config(errors))
        }
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let tm = &self.time;
        if !(tm.time_resolution.is_finite() && tm.time_resolution > 0.0) {
            errors.push(ConfigError::new("time.time_resolution", "must be > 0"));
        }
        if tm.time_step_size == 0 {
            errors.push(ConfigError::new("time.time_step_size", "must be > 0"));
        }

        validate_thresholds(&self.thresholds, &mut errors);

        let el = &self.electrolyser;
        positive("electrolyser.max_p_in", el.max_p_in, &mut errors);
        non_negative("electrolyser.warm_up_power", el.warm_up_power, &mut errors);
        positive("electrolyser.lhv_kwh_per_kg", el.lhv_kwh_per_kg, &mut errors);
        efficiency("electrolyser.efficiency", el.efficiency, &mut errors);
        if !(0.0..=1.0).contains(&el.idle_fraction) {
            errors.push(ConfigError::new(
                "electrolyser.idle_fraction",
                "must be in [0.0, 1.0]",
            ));
        }
        if self.thresholds.rate_min < el.idle_fraction {
            errors.push(ConfigError::new(
                "thresholds.rate_min",
                "must be >= electrolyser.idle_fraction",
            ));
        }

        let fc = &self.fuel_cell;
        positive("fuel_cell.h2_nominal_flow", fc.h2_nominal_flow, &mut errors);
        positive("fuel_cell.h2_density", fc.h2_density, &mut errors);
        positive("fuel_cell.energy_content", fc.energy_content, &mut errors);
        efficiency("fuel_cell.dc_efficiency", fc.dc_efficiency, &mut errors);
        efficiency("fuel_cell.ac_efficiency", fc.ac_efficiency, &mut errors);
        non_negative("fuel_cell.ramp_up_1_time", fc.ramp_up_1_time, &mut errors);
        non_negative("fuel_cell.ramp_up_2_time", fc.ramp_up_2_time, &mut errors);
        non_negative("fuel_cell.ramp_down_time", fc.ramp_down_time, &mut errors);
        if !(0.0..=1.0).contains(&fc.ramp_breakpoint) {
            errors.push(ConfigError::new(
                "fuel_cell.ramp_breakpoint",
                "must be in [0.0, 1.0]",
            ));
        }

        errors
    }
}

fn validate_thresholds(t: &ThresholdConfig, errors: &mut Vec<ConfigError>) {
    for (field, value) in [
        ("thresholds.soc_min", t.soc_min),
        ("thresholds.soc_max", t.soc_max),
        ("thresholds.h2_soc_min", t.h2_soc_min),
        ("thresholds.h2_soc_max", t.h2_soc_max),
        ("thresholds.el_start_soc", t.el_start_soc),
        ("thresholds.el_stop_soc", t.el_stop_soc),
        ("thresholds.fc_start_soc", t.fc_start_soc),
        ("thresholds.fc_stop_soc", t.fc_stop_soc),
        ("thresholds.rate_soc_low", t.rate_soc_low),
        ("thresholds.rate_soc_high", t.rate_soc_high),
    ] {
        percent(field, value, errors);
    }
    for (i, step) in t.winter_staircase.iter().enumerate() {
        percent(
            &format!("thresholds.winter_staircase[{i}].soc_below"),
            step.soc_below,
            errors,
        );
        if step.from_hour >= step.to_hour || step.to_hour > 24 {
            errors.push(ConfigError::new(
                format!("thresholds.winter_staircase[{i}].from_hour"),
                "must be < to_hour <= 24",
            ));
        }
    }

    if t.soc_min >= t.soc_max {
        errors.push(ConfigError::new(
            "thresholds.soc_min",
            "must be < thresholds.soc_max",
        ));
    }
    if t.h2_soc_min >= t.h2_soc_max {
        errors.push(ConfigError::new(
            "thresholds.h2_soc_min",
            "must be < thresholds.h2_soc_max",
        ));
    }
    if t.el_start_soc <= t.el_stop_soc {
        errors.push(ConfigError::new(
            "thresholds.el_start_soc",
            "must be > thresholds.el_stop_soc",
        ));
    }
    if t.fc_stop_soc <= t.fc_start_soc {
        errors.push(ConfigError::new(
            "thresholds.fc_stop_soc",
            "must be > thresholds.fc_start_soc",
        ));
    }
    if t.el_start_hour >= t.el_stop_hour || t.el_stop_hour > 24 {
        errors.push(ConfigError::new(
            "thresholds.el_start_hour",
            "must be < thresholds.el_stop_hour <= 24",
        ));
    }

    non_negative("thresholds.fc_deficit_threshold", t.fc_deficit_threshold, errors);
    non_negative("thresholds.pv_threshold_start", t.pv_threshold_start, errors);
    if !(0.0..=1.0).contains(&t.pv_threshold_stop_fraction) {
        errors.push(ConfigError::new(
            "thresholds.pv_threshold_stop_fraction",
            "must be in [0.0, 1.0]",
        ));
    }

    positive("thresholds.grid_import_limit", t.grid_import_limit, errors);
    non_negative(
        "thresholds.grid_congestion_threshold",
        t.grid_congestion_threshold,
        errors,
    );
    non_negative("thresholds.tolerance_limit", t.tolerance_limit, errors);
    if t.tolerance_limit >= t.critical_limit {
        errors.push(ConfigError::new(
            "thresholds.tolerance_limit",
            "must be < thresholds.critical_limit",
        ));
    }

    for (field, value) in [
        ("thresholds.warm_up_time", t.warm_up_time),
        ("thresholds.ramp_up_time", t.ramp_up_time),
        ("thresholds.ramp_down_time", t.ramp_down_time),
        ("thresholds.hold_time", t.hold_time),
    ] {
        non_negative(field, value, errors);
    }

    if t.rate_soc_low >= t.rate_soc_high {
        errors.push(ConfigError::new(
            "thresholds.rate_soc_low",
            "must be < thresholds.rate_soc_high",
        ));
    }
    if !(0.0 <= t.rate_min && t.rate_min <= t.rate_max && t.rate_max <= 1.0) {
        errors.push(ConfigError::new(
            "thresholds.rate_min",
            "must satisfy 0 <= rate_min <= rate_max <= 1",
        ));
    }

    for (field, md) in [
        ("thresholds.summer_start", t.summer_start),
        ("thresholds.summer_end", t.summer_end),
    ] {
        if !md.is_valid() {
            errors.push(ConfigError::new(
                field,
                format!("\"{md}\" is not a calendar day"),
            ));
        }
    }
}

fn percent(field: &str, value: f64, errors: &mut Vec<ConfigError>) {
    if !(0.0..=100.0).contains(&value) {
        errors.push(ConfigError::new(field, "must be in [0, 100]"));
    }
}

fn positive(field: &str, value: f64, errors: &mut Vec<ConfigError>) {
    if !(value.is_finite() && value > 0.0) {
        errors.push(ConfigError::new(field, "must be > 0"));
    }
}

fn non_negative(field: &str, value: f64, errors: &mut Vec<ConfigError>) {
    if !(value.is_finite() && value >= 0.0) {
        errors.push(ConfigError::new(field, "must be >= 0"));
    }
}

fn efficiency(field: &str, value: f64, errors: &mut Vec<ConfigError>) {
    if !(value > 0.0 && value <= 1.0) {
        errors.push(ConfigError::new(field, "must be in (0.0, 1.0]"));
    }
}
