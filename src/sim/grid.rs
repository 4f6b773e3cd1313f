use crate::config::ThresholdConfig;

/// Outcome of one grid evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GridReading {
    /// Net grid flow (kW, positive = import).
    pub grid_flow_kw: f64,
    /// `|grid_flow| / grid_import_limit`.
    pub utilisation: f64,
    pub flag_warning: bool,
    pub flag_critical: bool,
}

/// Evaluates signed flows against the connection capacity.
///
/// A pure function of the current tick's flows; no hysteresis.
///
/// # Arguments
///
/// * `flows` - Signed contributions (positive = import)
/// * `cfg` - Supplies `grid_import_limit`, `tolerance_limit`, `critical_limit`
pub fn evaluate(flows: &[f64], cfg: &ThresholdConfig) -> GridReading {
    let grid_flow_kw: f64 = flows.iter().sum();
    let magnitude = grid_flow_kw.abs();
    let capacity = cfg.grid_import_limit;
    GridReading {
        grid_flow_kw,
        utilisation: if capacity > 0.0 { magnitude / capacity } else { 0.0 },
        flag_warning: magnitude >= cfg.tolerance_limit * capacity,
        flag_critical: magnitude >= cfg.critical_limit * capacity,
    }
}

/// Grid connection point that aggregates signed flows into a net flow.
///
/// Net flow convention:
/// - Positive values import from the grid
/// - Negative values export to the grid
#[derive(Debug, Clone)]
pub struct GridMonitor {
    cfg: ThresholdConfig,
    flows: Vec<f64>,
    last: GridReading,
}

impl GridMonitor {
    pub fn new(cfg: ThresholdConfig) -> Self {
        Self {
            cfg,
            flows: Vec::with_capacity(6),
            last: GridReading::default(),
        }
    }

    /// Clears the flows accumulated for the current tick.
    pub fn reset(&mut self) {
        self.flows.clear();
    }

    /// Adds a signed contribution to the net flow.
    pub fn add_net_kw(&mut self, kw: f64) {
        self.flows.push(kw);
    }

    /// Evaluates the accumulated flows and remembers the result.
    pub fn reading(&mut self) -> GridReading {
        self.last = evaluate(&self.flows, &self.cfg);
        self.last
    }

    /// Reading from the last evaluation.
    pub fn last_reading(&self) -> GridReading {
        self.last
    }
}
