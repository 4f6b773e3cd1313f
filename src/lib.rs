//! Dispatch controller for a hydrogen electrolyser and fuel cell pair.

pub mod config;
/// Co-simulation boundary adapters.
pub mod cosim;
pub mod devices;
pub mod error;
/// Controller, grid monitor, tick loop, and run summary.
pub mod sim;
pub mod telemetry;
