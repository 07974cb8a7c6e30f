pub mod config;
pub mod error;
pub mod risk;
pub mod room;
pub mod sim_params;
pub mod snapshot;

// Re-export key types for easier use by dependent crates
pub use config::{SimulationConfig, RoomConfig, PathogenConfig, OccupancyConfig, VentilationConfig, EngineConfig, OutputConfig, ScheduledEvent, EventAction};
pub use error::ModelError;
pub use risk::{RiskInputs, RiskResult, calculate_wells_riley, calculate_post_decay, quanta_power_law};
pub use room::{PivotCorner, Plane, PlaneKind, RoomGeometry};
pub use sim_params::{SimulationParams, MS_PER_HOUR};
pub use snapshot::Snapshot;
