//! Particle side of the airborne transmission model: a fixed-capacity pool
//! of dose particles driven by the analytic risk parameters.

pub mod bounds;
pub mod generator;
pub mod integrator;
pub mod particle_pool;
pub mod risk_monitor;
pub mod session;
pub mod simulation;
pub mod transition;

pub use bounds::{check_bounds, check_collision, Aabb, BoundsCheck, RoomBounds, StaticMesh};
pub use particle_pool::ParticlePool;
pub use risk_monitor::{RiskMonitor, RiskUpdate};
pub use session::{Command, OccupancyParams, PathogenParams, Session};
pub use simulation::{ParticleSimulation, StepReport};
pub use transition::{TransitionController, TransitionEvent, TransitionState, TransitionTimings};
