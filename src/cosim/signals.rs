//! Named scalar signals exchanged with the co-simulation scheduler.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AdapterError;

/// One scalar value at the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Signal {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Input or output bundle keyed by signal name.
pub type Signals = BTreeMap<String, Signal>;

impl Signal {
    /// Numeric value; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Boolean value; `0` and `1` are accepted as integers.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            Self::Int(0) => Some(false),
            Self::Int(1) => Some(true),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<bool> for Signal {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Signal {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Signal {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Signal {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for Signal {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Builds a [`Signals`] map from `(name, value)` pairs.
///
/// # Examples
///
/// ```
/// use hess_dispatch::cosim::signals::{signals, Signal};
///
/// let inputs = signals([("soc", Signal::from(85.0)), ("run_fuelcell", false.into())]);
/// assert_eq!(inputs.len(), 2);
/// ```
pub fn signals<const N: usize>(pairs: [(&str, Signal); N]) -> Signals {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_owned(), value))
        .collect()
}

/// Fails on the first input name not listed in `accepted`.
pub fn reject_unknown(
    model: &'static str,
    inputs: &Signals,
    accepted: &[&str],
) -> Result<(), AdapterError> {
    match inputs.keys().find(|k| !accepted.contains(&k.as_str())) {
        Some(name) => Err(AdapterError::UnknownInput {
            model,
            name: name.clone(),
        }),
        None => Ok(()),
    }
}

/// Numeric input `name`; `Ok(None)` if absent.
pub fn read_f64(inputs: &Signals, name: &str) -> Result<Option<f64>, AdapterError> {
    read_as(inputs, name, "number", Signal::as_f64)
}

/// Boolean input `name`; `Ok(None)` if absent.
pub fn read_bool(inputs: &Signals, name: &str) -> Result<Option<bool>, AdapterError> {
    read_as(inputs, name, "bool", Signal::as_bool)
}

/// Text input `name`; `Ok(None)` if absent.
pub fn read_text<'a>(inputs: &'a Signals, name: &str) -> Result<Option<&'a str>, AdapterError> {
    match inputs.get(name) {
        None => Ok(None),
        Some(signal) => signal.as_str().map(Some).ok_or_else(|| AdapterError::WrongType {
            name: name.to_owned(),
            expected: "text",
        }),
    }
}

fn read_as<T>(
    inputs: &Signals,
    name: &str,
    expected: &'static str,
    convert: impl Fn(&Signal) -> Option<T>,
) -> Result<Option<T>, AdapterError> {
    match inputs.get(name) {
        None => Ok(None),
        Some(signal) => convert(signal).map(Some).ok_or_else(|| AdapterError::WrongType {
            name: name.to_owned(),
            expected,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_is_rejected() {
        let inputs = signals([("soc", 50.0.into()), ("temperature", 21.0.into())]);
        let err = reject_unknown("controller", &inputs, &["soc"]).unwrap_err();
        assert!(matches!(
            err,
            AdapterError::UnknownInput { model: "controller", ref name } if name == "temperature"
        ));
        assert!(reject_unknown("controller", &inputs, &["soc", "temperature"]).is_ok());
    }

    #[test]
    fn numbers_accept_ints_and_floats() {
        let inputs = signals([("a", Signal::Int(3)), ("b", 2.5.into())]);
        assert_eq!(read_f64(&inputs, "a").unwrap(), Some(3.0));
        assert_eq!(read_f64(&inputs, "b").unwrap(), Some(2.5));
        assert_eq!(read_f64(&inputs, "missing").unwrap(), None);
    }

    #[test]
    fn wrong_type_is_an_error() {
        let inputs = signals([("run", "yes".into())]);
        assert!(matches!(
            read_bool(&inputs, "run"),
            Err(AdapterError::WrongType { expected: "bool", .. })
        ));
        assert!(read_f64(&inputs, "run").is_err());
        assert_eq!(read_text(&inputs, "run").unwrap(), Some("yes"));
    }

    #[test]
    fn bool_from_integer_flag() {
        let inputs = signals([("on", Signal::Int(1)), ("off", Signal::Int(0)), ("odd", Signal::Int(2))]);
        assert_eq!(read_bool(&inputs, "on").unwrap(), Some(true));
        assert_eq!(read_bool(&inputs, "off").unwrap(), Some(false));
        assert!(read_bool(&inputs, "odd").is_err());
    }

    #[test]
    fn untagged_values_parse_from_toml() {
        #[derive(Deserialize)]
        struct Bundle {
            inputs: Signals,
        }
        let b: Bundle = toml::from_str(
            "[inputs]\nsoc = 85.5\nrun_fuelcell = true\nelectrolyser_state = \"warm_up\"\ncount = 2\n",
        )
        .unwrap();
        assert_eq!(b.inputs["soc"], Signal::Float(85.5));
        assert_eq!(b.inputs["run_fuelcell"], Signal::Bool(true));
        assert_eq!(b.inputs["electrolyser_state"], Signal::from("warm_up"));
        assert_eq!(b.inputs["count"], Signal::Int(2));
    }
}
