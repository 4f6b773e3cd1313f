//! Error taxonomy for configuration, sensor input, invariant, and boundary failures.

use thiserror::Error;

use crate::config::ConfigError;

/// Fatal errors that halt a run.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// One or more configuration fields are invalid; raised before any tick executes.
    #[error("invalid configuration:{}", format_config_errors(.0))]
    Config(Vec<ConfigError>),

    /// A logic defect was detected while stepping.
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

fn format_config_errors(errors: &[ConfigError]) -> String {
    errors.iter().map(|e| format!("\n  {e}")).collect()
}

/// A broken internal invariant, identifying the offending asset and tick.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invariant violated in {asset} at tick {tick}: {detail}")]
pub struct InvariantViolation {
    /// Asset or component name (e.g. `"electrolyser"`).
    pub asset: &'static str,
    /// Tick at which the violation was detected.
    pub tick: u64,
    /// What went wrong.
    pub detail: String,
}

impl InvariantViolation {
    pub fn new(asset: &'static str, tick: u64, detail: impl Into<String>) -> Self {
        Self {
            asset,
            tick,
            detail: detail.into(),
        }
    }
}

/// Invalid sensor input for one tick. Recovered locally, never fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorError {
    #[error("missing sensor signal `{0}`")]
    Missing(&'static str),

    #[error("sensor signal `{name}` is not finite ({value})")]
    NonFinite { name: &'static str, value: f64 },

    #[error("sensor signal `{name}`={value} outside [{min}, {max}]")]
    OutOfBounds {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Failure of a single dispatch decision.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecideError {
    #[error(transparent)]
    Sensor(#[from] SensorError),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

/// Errors raised at the co-simulation boundary.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("model `{model}` does not accept input `{name}`")]
    UnknownInput { model: &'static str, name: String },

    #[error("input `{name}` has the wrong type: expected {expected}")]
    WrongType {
        name: String,
        expected: &'static str,
    },

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl From<InvariantViolation> for AdapterError {
    fn from(v: InvariantViolation) -> Self {
        Self::Dispatch(DispatchError::Invariant(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant_message_names_asset_and_tick() {
        let v = InvariantViolation::new("electrolyser", 42, "phase timer missing in WarmUp");
        let msg = v.to_string();
        assert!(msg.contains("electrolyser"));
        assert!(msg.contains("42"));
        assert!(msg.contains("WarmUp"));
    }

    #[test]
    fn config_error_lists_every_field() {
        let err = DispatchError::Config(vec![
            ConfigError {
                field: "thresholds.el_start_soc".into(),
                message: "must be > thresholds.el_stop_soc".into(),
            },
            ConfigError {
                field: "thresholds.hold_time".into(),
                message: "must be >= 0".into(),
            },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("thresholds.el_start_soc"));
        assert!(msg.contains("thresholds.hold_time"));
    }

    #[test]
    fn invariant_converts_into_adapter_error() {
        let err: AdapterError = InvariantViolation::new("grid", 3, "time went backwards").into();
        assert!(matches!(
            err,
            AdapterError::Dispatch(DispatchError::Invariant(_))
        ));
    }
}
