//! Controllable hydrogen assets.

/// PEM electrolyser phase machine.
pub mod electrolyser;
/// Ramped fuel cell phase machine.
pub mod fuel_cell;
pub mod types;

// Re-export the main types for convenience
pub use electrolyser::{Electrolyser, ElectrolyserOutput, ElectrolyserPhase};
pub use fuel_cell::{FuelCell, FuelCellOutput, FuelCellPhase};
pub use types::Device;
pub use types::DeviceContext;
