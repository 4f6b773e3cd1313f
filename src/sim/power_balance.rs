//! Grid power balance computation.

/// Per-tick flows at the grid connection point, each in its own asset's
/// sign convention.
///
/// - `load_kw`, `pv_kw`: positive magnitudes
/// - `flow2e_kw`, `compressor_kw`: negative while consuming
/// - `fuel_cell_kw`: positive while supplying
/// - `battery_kw`: positive while discharging
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GridFlows {
    pub load_kw: f64,
    pub pv_kw: f64,
    pub flow2e_kw: f64,
    pub compressor_kw: f64,
    pub fuel_cell_kw: f64,
    pub battery_kw: f64,
}

impl GridFlows {
    /// Contributions to grid import (positive = import, negative = export).
    pub fn signed(&self) -> [f64; 6] {
        [
            self.load_kw,
            -self.pv_kw,
            -self.flow2e_kw,
            -self.compressor_kw,
            -self.fuel_cell_kw,
            -self.battery_kw,
        ]
    }

    /// Net grid flow (kW, positive = import).
    ///
    /// `grid_flow = load − pv − flow2e − compressor − fuel_cell − battery`
    pub fn grid_flow_kw(&self) -> f64 {
        self.signed().iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_only_imports() {
        let flows = GridFlows {
            load_kw: 30.0,
            ..GridFlows::default()
        };
        assert_eq!(flows.grid_flow_kw(), 30.0);
    }

    #[test]
    fn pv_surplus_exports() {
        let flows = GridFlows {
            load_kw: 20.0,
            pv_kw: 100.0,
            ..GridFlows::default()
        };
        assert_eq!(flows.grid_flow_kw(), -80.0);
    }

    #[test]
    fn electrolyser_draw_adds_to_import() {
        // consuming flows are negative, so subtracting them raises the import
        let flows = GridFlows {
            load_kw: 20.0,
            pv_kw: 100.0,
            flow2e_kw: -50.0,
            compressor_kw: -2.0,
            ..GridFlows::default()
        };
        assert_eq!(flows.grid_flow_kw(), -28.0);
    }

    #[test]
    fn fuel_cell_and_battery_offset_deficit() {
        let flows = GridFlows {
            load_kw: 80.0,
            pv_kw: 10.0,
            fuel_cell_kw: 28.0,
            battery_kw: 12.0,
            ..GridFlows::default()
        };
        assert_eq!(flows.grid_flow_kw(), 30.0);
    }
}
