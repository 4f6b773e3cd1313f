//! Common types and traits for controllable assets.

use crate::error::InvariantViolation;

/// Per-tick input handed to an asset's state machine.
///
/// # Fields
/// * `tick` - Current tick index
/// * `dt_seconds` - Duration of one tick in seconds
/// * `run_command` - Commanded run intent from the dispatch controller
/// * `setpoint` - Optional operating point (the electrolyser's production rate)
#[derive(Debug, Clone, Copy)]
pub struct DeviceContext {
    pub tick: u64,
    pub dt_seconds: f64,
    pub run_command: bool,
    pub setpoint: Option<f64>,
}

impl DeviceContext {
    /// Creates a context with no setpoint.
    pub fn new(tick: u64, dt_seconds: f64, run_command: bool) -> Self {
        Self {
            tick,
            dt_seconds,
            run_command,
            setpoint: None,
        }
    }

    /// Creates a context carrying a setpoint.
    pub fn with_setpoint(tick: u64, dt_seconds: f64, run_command: bool, setpoint: f64) -> Self {
        Self {
            tick,
            dt_seconds,
            run_command,
            setpoint: Some(setpoint),
        }
    }
}

/// An asset driven once per tick by a run command.
///
/// Each implementation owns its phase and phase timer exclusively; callers
/// can only observe the phase and supply a [`DeviceContext`].
pub trait Device {
    /// Operating phase reported to the controller.
    type Phase: Copy + PartialEq + std::fmt::Debug;
    /// Per-tick output (power, hydrogen flow, next phase).
    type Output;

    /// Advances the state machine by one tick.
    ///
    /// # Errors
    ///
    /// Returns an [`InvariantViolation`] if the phase bookkeeping is
    /// inconsistent (a timed phase without a running timer).
    fn advance(&mut self, context: &DeviceContext) -> Result<Self::Output, InvariantViolation>;

    /// Current phase.
    fn phase(&self) -> Self::Phase;

    /// Returns a human-readable type name for the device.
    fn device_type(&self) -> &'static str;
}

/// Completed fraction of a timed ramp, clamped to `[0, 1]`.
///
/// A zero-length ramp is complete immediately.
pub fn ramp_fraction(elapsed_s: f64, duration_s: f64) -> f64 {
    if duration_s <= 0.0 {
        1.0
    } else {
        (elapsed_s / duration_s).clamp(0.0, 1.0)
    }
}

/// Linear interpolation from `from` to `to` at fraction `frac`.
pub fn lerp(from: f64, to: f64, frac: f64) -> f64 {
    from + (to - from) * frac
}

/// Counts one more tick of a timed phase and returns the elapsed seconds.
///
/// `timer` holds the ticks already completed in the current phase.
pub(crate) fn advance_timer(
    timer: &mut Option<u64>,
    asset: &'static str,
    phase: &dyn std::fmt::Display,
    context: &DeviceContext,
) -> Result<f64, InvariantViolation> {
    let done = timer.ok_or_else(|| {
        tracing::error!(asset, tick = context.tick, %phase, "phase timer missing");
        InvariantViolation::new(
            asset,
            context.tick,
            format!("phase timer missing in {phase}"),
        )
    })?;
    let elapsed = done + 1;
    *timer = Some(elapsed);
    Ok(elapsed as f64 * context.dt_seconds)
}
