pub mod models;
pub mod signals;

pub use models::{ControllerModel, CosimModel, ElectrolyserModel, FuelCellModel, GridModel};
pub use signals::{Signal, Signals};
