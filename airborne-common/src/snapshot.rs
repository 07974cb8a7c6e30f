use serde::{Serialize, Deserialize};

/// A snapshot of the simulation state and risk at a specific time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Simulated time (hours) at which the snapshot was taken.
    pub time_hours: f64,
    /// Live particles in the pool.
    pub active_particles: u32,
    /// Transition opacity applied to the particle material (0-1).
    pub opacity: f32,
    pub infectious_count: u32,
    /// Probability for a fixed one-hour stay under the current conditions.
    pub fixed_hour_probability: f64,
    /// Probability for the exposure accumulated so far (post-decay while vacated).
    pub running_probability: f64,
    pub vacated: bool,
    /// Raw [x, y, z] particle positions, when requested by the output config.
    #[serde(skip_serializing_if = "Option::is_none")] // Don't write "positions": null
    pub positions: Option<Vec<[f32; 3]>>,
}
