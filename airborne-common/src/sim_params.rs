use crate::risk;
use serde::{Deserialize, Serialize};

/// Milliseconds in one simulated hour.
pub const MS_PER_HOUR: f64 = 3_600_000.0;

/// Simulation parameters read every tick by the generator and integrator.
///
/// Only the host mutates these, between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Quanta per hour per infectious person (already scaled by activity).
    pub quanta_rate: f64,
    pub infectious_count: u32,
    /// Air changes per hour.
    pub ventilation_rate: f64,
    pub half_life_hours: f64,
    /// Simulated milliseconds per real millisecond (>= 1).
    pub speed_multiplier: f64,
    /// Suppresses generation only; existing particles keep moving and decaying.
    pub is_vacated: bool,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            quanta_rate: 25.0,
            infectious_count: 1,
            ventilation_rate: 1.0,
            half_life_hours: 1.1,
            speed_multiplier: 1.0,
            is_vacated: false,
        }
    }
}

impl SimulationParams {
    /// Ventilation plus pathogen decay (1/h).
    pub fn total_removal_rate(&self) -> f64 {
        risk::total_removal_rate(self.ventilation_rate, self.half_life_hours)
    }

    /// Expected particles per simulated millisecond while occupied.
    pub fn emission_rate_per_ms(&self) -> f64 {
        self.quanta_rate * self.infectious_count as f64 / MS_PER_HOUR
    }

    /// Mean particle lifespan in simulated milliseconds.
    pub fn mean_lifespan_ms(&self) -> f64 {
        MS_PER_HOUR / self.total_removal_rate()
    }
}
