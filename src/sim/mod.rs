/// Tick counting and tick-to-wall-clock mapping.
pub mod clock;
pub mod controller;
pub mod engine;
/// Grid connection monitor with warning and critical flags.
pub mod grid;
pub mod kpi;
pub mod power_balance;
pub mod types;
