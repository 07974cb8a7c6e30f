use crate::bounds::RoomBounds;
use crate::particle_pool::ParticlePool;
use airborne_common::{RoomGeometry, SimulationParams, MS_PER_HOUR};
use glam::Vec3;
use rand::distr::Open01;
use rand::Rng;
use rand_distr::{Distribution, UnitSphere};

/// Speed (world units per real millisecond) at which a particle crosses the
/// room's longest horizontal span in one simulated hour.
pub fn target_speed(room: &RoomGeometry, units_per_foot: f32, speed_multiplier: f64) -> f32 {
    let span = room.span_ft() as f64 * units_per_foot as f64;
    (span / MS_PER_HOUR * speed_multiplier) as f32
}

/// Draws a lifespan (simulated ms) from the exponential distribution with
/// rate `total_removal_rate` per hour.
pub fn sample_lifespan_ms<R: Rng>(rng: &mut R, total_removal_rate: f64) -> f64 {
    // U in (0, 1) keeps the lifespan strictly positive.
    let u: f64 = rng.sample(Open01);
    -MS_PER_HOUR * (-u).ln_1p() / total_removal_rate
}

/// Uniform point inside the inner room box, shrunk about its centre by `factor`.
pub fn sample_spawn_position<R: Rng>(rng: &mut R, bounds: &RoomBounds, factor: f32) -> Vec3 {
    let (lo, hi) = bounds.inner_box();
    let centre = (lo + hi) * 0.5;
    let half_extent = (hi - lo) * 0.5 * factor;
    let unit = Vec3::new(rng.random::<f32>(), rng.random::<f32>(), rng.random::<f32>());
    centre + half_extent * (unit * 2.0 - Vec3::ONE)
}

pub fn sample_direction<R: Rng>(rng: &mut R) -> Vec3 {
    let [x, y, z]: [f32; 3] = UnitSphere.sample(rng);
    Vec3::new(x, y, z)
}

/// Keeps spawned particles clear of the inner box faces.
const MAX_SPAWN_VOLUME_FACTOR: f32 = 0.99;

/// Used when the configured factor is NaN or infinite.
pub const DEFAULT_SPAWN_VOLUME_FACTOR: f32 = 0.9;

/// Turns the quanta emission rate into discrete particles.
#[derive(Debug, Clone)]
pub struct ParticleGenerator {
    /// Fractional particles owed to the pool.
    to_emit: f64,
    spawn_volume_factor: f32,
}

impl ParticleGenerator {
    pub fn new(spawn_volume_factor: f32) -> Self {
        let spawn_volume_factor = if spawn_volume_factor.is_finite() {
            spawn_volume_factor.clamp(f32::EPSILON, MAX_SPAWN_VOLUME_FACTOR)
        } else {
            log::warn!(
                "Spawn volume factor {} is not usable, using {}.",
                spawn_volume_factor,
                DEFAULT_SPAWN_VOLUME_FACTOR
            );
            DEFAULT_SPAWN_VOLUME_FACTOR
        };
        Self {
            to_emit: 0.0,
            spawn_volume_factor,
        }
    }

    pub fn spawn_volume_factor(&self) -> f32 {
        self.spawn_volume_factor
    }

    pub fn pending(&self) -> f64 {
        self.to_emit
    }

    pub fn reset(&mut self) {
        self.to_emit = 0.0;
    }

    /// Accumulates this tick's share of emission and spawns whole particles.
    /// Returns the number spawned.
    pub fn emit<R: Rng>(
        &mut self,
        pool: &mut ParticlePool,
        params: &SimulationParams,
        bounds: &RoomBounds,
        speed: f32,
        dt_ms: f64,
        rng: &mut R,
    ) -> usize {
        if params.is_vacated {
            return 0;
        }

        self.to_emit += params.emission_rate_per_ms() * dt_ms * params.speed_multiplier;

        let removal = params.total_removal_rate();
        let mut emitted = 0;
        while self.to_emit >= 1.0 && !pool.is_full() {
            let position = sample_spawn_position(rng, bounds, self.spawn_volume_factor);
            let velocity = sample_direction(rng) * speed;
            let lifespan = sample_lifespan_ms(rng, removal);
            pool.spawn(position, velocity, lifespan);
            self.to_emit -= 1.0;
            emitted += 1;
        }

        if pool.is_full() && self.to_emit >= 1.0 {
            log::trace!("Pool at capacity, dropping {:.0} pending particles.", self.to_emit.floor());
            self.to_emit = self.to_emit.fract();
        }
        emitted
    }
}
