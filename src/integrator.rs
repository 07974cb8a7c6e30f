use crate::bounds::{check_bounds, check_collision, RoomBounds, StaticMesh};
use crate::particle_pool::ParticlePool;
use glam::Vec3;

/// Extra push past the margin after a reflection, so float error cannot
/// leave the particle sitting exactly on it.
const NUDGE_EPSILON: f32 = 1e-4;

/// A point can only be past three axis-aligned planes at once, but allow one
/// pass per plane.
const MAX_REFLECTIONS: usize = 6;

/// What happened to the pool during one integration pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Particles whose lifespan ran out.
    pub expired: usize,
    /// Particles removed on entering a static mesh.
    pub absorbed: usize,
    /// Particles bounced off at least one room plane.
    pub reflected: usize,
}

/// Advances every live particle by one tick.
///
/// `dt_ms` is real elapsed time (drives motion); lifespans are consumed in
/// simulated time, `dt_ms * speed_multiplier`. `speed` is the target speed
/// reflected particles are renormalized to.
pub fn advance_particles(
    pool: &mut ParticlePool,
    bounds: &RoomBounds,
    meshes: &[StaticMesh],
    speed: f32,
    dt_ms: f64,
    speed_multiplier: f64,
) -> TickStats {
    let mut stats = TickStats::default();
    let dt = dt_ms as f32;
    let simulated_dt = dt_ms * speed_multiplier;

    let mut idx = 0;
    while idx < pool.active_count() {
        // --- 1. Age ---
        let lifespan = pool.lifespan(idx) - simulated_dt;
        if lifespan <= 0.0 {
            pool.kill_and_compact(idx);
            stats.expired += 1;
            continue; // Slot now holds the former last particle.
        }
        pool.set_lifespan(idx, lifespan);

        // --- 2. Move ---
        let mut velocity = pool.velocity(idx);
        let mut position = pool.position(idx) + velocity * dt;

        // --- 3. Room planes (reflect and push back inside) ---
        let mut bounced = false;
        for _ in 0..MAX_REFLECTIONS {
            let check = check_bounds(bounds, position);
            let (Some(normal), Some(penetration)) = (check.violated_normal, check.penetration) else {
                break;
            };
            if velocity.dot(normal) > 0.0 {
                velocity = reflect(velocity, normal, speed);
            }
            position -= normal * (penetration + NUDGE_EPSILON);
            bounced = true;
        }
        if bounced {
            if !check_bounds(bounds, position).in_bounds {
                let (lo, hi) = bounds.inner_box();
                position = position.clamp(lo, hi);
            }
            stats.reflected += 1;
        }

        // --- 4. Static meshes absorb ---
        if check_collision(position, meshes) {
            pool.kill_and_compact(idx);
            stats.absorbed += 1;
            continue;
        }

        pool.set_position(idx, position);
        pool.set_velocity(idx, velocity);
        idx += 1;
    }

    log::trace!(
        "Integrated pool: {} live, {} expired, {} absorbed, {} reflected.",
        pool.active_count(),
        stats.expired,
        stats.absorbed,
        stats.reflected
    );
    stats
}

/// Mirror `velocity` about the plane with unit `normal`, at `speed`.
#[inline(always)]
pub fn reflect(velocity: Vec3, normal: Vec3, speed: f32) -> Vec3 {
    let mirrored = velocity - 2.0 * velocity.dot(normal) * normal;
    let direction = mirrored.normalize_or_zero();
    if direction == Vec3::ZERO {
        -normal * speed
    } else {
        direction * speed
    }
}
