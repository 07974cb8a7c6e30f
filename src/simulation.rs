use crate::bounds::{RoomBounds, StaticMesh};
use crate::generator::{target_speed, ParticleGenerator};
use crate::integrator::{advance_particles, TickStats};
use crate::particle_pool::ParticlePool;
use crate::transition::{TransitionController, TransitionEvent, TransitionState, TransitionTimings};
use airborne_common::error::Result;
use airborne_common::{EngineConfig, ModelError, RoomGeometry, SimulationParams, MS_PER_HOUR};
use log::{debug, info, trace, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// What one call to [`ParticleSimulation::step`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepReport {
    pub tick: TickStats,
    pub spawned: usize,
    /// Transition boundary crossed this step, if any.
    pub transition: Option<TransitionEvent>,
}

/// Owns the particle pool and everything that mutates it.
///
/// Single threaded: all mutation happens in [`step`](Self::step) or in the
/// setters, which the host calls between steps.
pub struct ParticleSimulation {
    pool: ParticlePool,
    generator: ParticleGenerator,
    /// Seeded from the engine config so runs are reproducible.
    rng: StdRng,
    bounds: RoomBounds,
    meshes: Vec<StaticMesh>,
    params: SimulationParams,
    units_per_foot: f32,
    /// Target particle speed, world units per real millisecond.
    speed: f32,
    transition: TransitionController,
    /// Real milliseconds since creation.
    clock_ms: f64,
    /// Simulated milliseconds since creation.
    simulated_ms: f64,
    last_report: StepReport,
}

impl ParticleSimulation {
    pub fn new(room: RoomGeometry, params: SimulationParams, engine: &EngineConfig) -> Self {
        let room = room.sanitized();
        let params = sanitize_params(params);
        let units_per_foot = engine.units_per_foot;
        let bounds = RoomBounds::new(&room, units_per_foot);
        let speed = target_speed(&room, units_per_foot, params.speed_multiplier);
        let timings = TransitionTimings {
            fade_out_ms: engine.fade_out_ms,
            wait_ms: engine.wait_ms,
            fade_in_ms: engine.fade_in_ms,
        };

        info!(
            "Particle simulation: {} slots, room {}x{}x{} ft, seed {}.",
            engine.capacity, room.width, room.length, room.height, engine.seed
        );
        debug!("Initial parameters: {:?}", params);

        Self {
            pool: ParticlePool::new(engine.capacity),
            generator: ParticleGenerator::new(engine.spawn_volume_factor),
            rng: StdRng::seed_from_u64(engine.seed),
            bounds,
            meshes: Vec::new(),
            params,
            units_per_foot,
            speed,
            transition: TransitionController::new(room, timings),
            clock_ms: 0.0,
            simulated_ms: 0.0,
            last_report: StepReport::default(),
        }
    }

    /// Advances by `dt_ms` of real time: transition, then integration, then
    /// generation.
    pub fn step(&mut self, dt_ms: f64) -> StepReport {
        if !(dt_ms > 0.0) || !dt_ms.is_finite() {
            trace!("Ignoring step with dt {} ms.", dt_ms);
            return StepReport::default();
        }
        self.clock_ms += dt_ms;

        // --- 1. Transition ---
        let transition = self.transition.update(self.clock_ms);
        if let Some(TransitionEvent::SwapGeometry(room)) = transition {
            self.apply_geometry(room);
        }

        // --- 2. Integrate ---
        let tick = advance_particles(
            &mut self.pool,
            &self.bounds,
            &self.meshes,
            self.speed,
            dt_ms,
            self.params.speed_multiplier,
        );

        // --- 3. Generate ---
        let spawned = self.generator.emit(
            &mut self.pool,
            &self.params,
            &self.bounds,
            self.speed,
            dt_ms,
            &mut self.rng,
        );

        self.simulated_ms += dt_ms * self.params.speed_multiplier;
        self.last_report = StepReport {
            tick,
            spawned,
            transition,
        };
        self.last_report
    }

    /// Swaps bounds, clears the pool and retargets speed in one go.
    fn apply_geometry(&mut self, room: RoomGeometry) {
        debug!(
            "Swapping room to {}x{}x{} ft ({} particles dropped).",
            room.width,
            room.length,
            room.height,
            self.pool.active_count()
        );
        self.bounds = RoomBounds::new(&room, self.units_per_foot);
        self.pool.clear();
        self.generator.reset();
        self.speed = target_speed(&room, self.units_per_foot, self.params.speed_multiplier);
    }

    // --- Host inputs ---

    pub fn set_quanta_rate(&mut self, quanta_rate: f64) {
        let quanta_rate = if quanta_rate.is_finite() && quanta_rate >= 0.0 {
            quanta_rate
        } else {
            warn!("Quanta rate {} is not usable, using 0.", quanta_rate);
            0.0
        };
        debug!("Quanta rate -> {}", quanta_rate);
        self.params.quanta_rate = quanta_rate;
    }

    pub fn set_infectious_count(&mut self, infectious_count: u32) {
        debug!("Infectious count -> {}", infectious_count);
        self.params.infectious_count = infectious_count;
    }

    /// NaN or negative rates are treated as no ventilation.
    pub fn set_ventilation_rate(&mut self, ventilation_rate: f64) {
        let ventilation_rate = if ventilation_rate >= 0.0 && ventilation_rate.is_finite() {
            ventilation_rate
        } else {
            warn!("Ventilation rate {} clamped to 0.", ventilation_rate);
            0.0
        };
        let old_removal = self.params.total_removal_rate();
        self.params.ventilation_rate = ventilation_rate;
        self.rescale_for_removal(old_removal);
    }

    pub fn set_half_life(&mut self, half_life_hours: f64) -> Result<()> {
        if !(half_life_hours > 0.0) || !half_life_hours.is_finite() {
            return Err(ModelError::InvalidParameter {
                name: "half_life_hours",
                value: half_life_hours,
            });
        }
        let old_removal = self.params.total_removal_rate();
        self.params.half_life_hours = half_life_hours;
        self.rescale_for_removal(old_removal);
        Ok(())
    }

    /// Keeps every particle's elapsed fraction while the removal rate changes.
    fn rescale_for_removal(&mut self, old_removal: f64) {
        let new_removal = self.params.total_removal_rate();
        if old_removal == new_removal {
            return;
        }
        let ratio = old_removal / new_removal;
        debug!(
            "Removal rate {:.4}/h -> {:.4}/h, scaling {} lifespans by {:.4}.",
            old_removal,
            new_removal,
            self.pool.active_count(),
            ratio
        );
        self.pool.rescale_lifespans(ratio);
    }

    /// Values below 1 (or NaN) mean real time.
    pub fn set_speed_multiplier(&mut self, speed_multiplier: f64) {
        let speed_multiplier = if speed_multiplier >= 1.0 && speed_multiplier.is_finite() {
            speed_multiplier
        } else {
            warn!("Speed multiplier {} clamped to 1.", speed_multiplier);
            1.0
        };
        self.params.speed_multiplier = speed_multiplier;
        self.speed = target_speed(self.transition.current_geometry(), self.units_per_foot, speed_multiplier);
        self.pool.rescale_velocities(self.speed);
        debug!("Speed multiplier -> {} ({} units/ms).", speed_multiplier, self.speed);
    }

    /// Stops or resumes generation. Live particles keep moving and decaying.
    pub fn set_vacated(&mut self, vacated: bool) {
        if self.params.is_vacated != vacated {
            debug!("Room {}.", if vacated { "vacated" } else { "re-occupied" });
        }
        self.params.is_vacated = vacated;
    }

    /// Drops every particle and any partial emission. Parameters and the
    /// room are unchanged.
    pub fn reset(&mut self) {
        debug!("Reset: clearing {} particles.", self.pool.active_count());
        self.pool.clear();
        self.generator.reset();
    }

    /// Starts (or retargets) a room transition. Returns false when the
    /// request was a no-op.
    pub fn request_room(&mut self, room: RoomGeometry) -> bool {
        self.transition.request(room.sanitized(), self.clock_ms)
    }

    pub fn add_static_mesh(&mut self, mesh: StaticMesh) {
        self.meshes.push(mesh);
    }

    pub fn clear_static_meshes(&mut self) {
        self.meshes.clear();
    }

    /// Releases the pool and abandons any in-flight transition.
    pub fn dispose(mut self) {
        self.transition.abandon();
        info!(
            "Disposing particle simulation after {:.3} simulated hours ({} live particles).",
            self.simulated_hours(),
            self.pool.active_count()
        );
    }

    // --- Read-only views ---

    pub fn positions(&self) -> &[[f32; 3]] {
        self.pool.positions()
    }

    pub fn positions_bytes(&self) -> &[u8] {
        self.pool.positions_bytes()
    }

    pub fn pool(&self) -> &ParticlePool {
        &self.pool
    }

    pub fn active_count(&self) -> usize {
        self.pool.active_count()
    }

    pub fn opacity(&self) -> f32 {
        self.transition.opacity(self.clock_ms)
    }

    pub fn transition_state(&self) -> TransitionState {
        self.transition.state()
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn room(&self) -> &RoomGeometry {
        self.transition.current_geometry()
    }

    pub fn bounds(&self) -> &RoomBounds {
        &self.bounds
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn clock_ms(&self) -> f64 {
        self.clock_ms
    }

    pub fn simulated_hours(&self) -> f64 {
        self.simulated_ms / MS_PER_HOUR
    }

    pub fn last_report(&self) -> &StepReport {
        &self.last_report
    }
}

fn sanitize_params(mut params: SimulationParams) -> SimulationParams {
    if !(params.speed_multiplier >= 1.0) || !params.speed_multiplier.is_finite() {
        warn!("Speed multiplier {} clamped to 1.", params.speed_multiplier);
        params.speed_multiplier = 1.0;
    }
    if !(params.ventilation_rate >= 0.0) || !params.ventilation_rate.is_finite() {
        warn!("Ventilation rate {} clamped to 0.", params.ventilation_rate);
        params.ventilation_rate = 0.0;
    }
    if !(params.quanta_rate >= 0.0) || !params.quanta_rate.is_finite() {
        warn!("Quanta rate {} is not usable, using 0.", params.quanta_rate);
        params.quanta_rate = 0.0;
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::{check_bounds, Aabb};
    use glam::{Affine3A, Vec3};

    fn engine() -> EngineConfig {
        EngineConfig {
            capacity: 5_000,
            seed: 9,
            fade_out_ms: 100.0,
            wait_ms: 50.0,
            fade_in_ms: 100.0,
            ..EngineConfig::default()
        }
    }

    fn params() -> SimulationParams {
        SimulationParams {
            quanta_rate: 3600.0,
            infectious_count: 10,
            ventilation_rate: 2.0,
            half_life_hours: 1.1,
            speed_multiplier: 60.0,
            is_vacated: false,
        }
    }

    fn sim() -> ParticleSimulation {
        ParticleSimulation::new(RoomGeometry::new(30.0, 20.0, 10.0), params(), &engine())
    }

    #[test]
    fn test_step_generates_particles() {
        let mut sim = sim();
        // 0.01 particles per simulated ms, 6000 simulated ms per step.
        let report = sim.step(100.0);
        assert_eq!(report.spawned, 60);
        assert_eq!(sim.active_count(), 60);
        assert!((sim.simulated_hours() - 6000.0 / MS_PER_HOUR).abs() < 1e-12);
    }

    #[test]
    fn test_non_positive_dt_is_ignored() {
        let mut sim = sim();
        assert_eq!(sim.step(0.0), StepReport::default());
        assert_eq!(sim.step(f64::NAN), StepReport::default());
        assert_eq!(sim.clock_ms(), 0.0);
        assert_eq!(sim.active_count(), 0);
    }

    #[test]
    fn test_vacate_stops_generation() {
        let mut sim = sim();
        sim.step(100.0);
        let before = sim.active_count();
        sim.set_vacated(true);
        for _ in 0..5 {
            let report = sim.step(100.0);
            assert_eq!(report.spawned, 0);
        }
        assert!(sim.active_count() <= before);
        sim.set_vacated(false);
        assert!(sim.step(100.0).spawned > 0);
    }

    #[test]
    fn test_particles_stay_in_bounds() {
        let mut sim = sim();
        for _ in 0..200 {
            sim.step(1000.0 / 60.0);
        }
        assert!(sim.active_count() > 0);
        for p in sim.positions() {
            assert!(check_bounds(sim.bounds(), Vec3::from_array(*p)).in_bounds);
        }
    }

    #[test]
    fn test_room_change_swaps_after_fade_out() {
        let mut sim = sim();
        sim.step(50.0);
        let target = RoomGeometry::new(12.0, 12.0, 8.0);
        assert!(sim.request_room(target));
        assert_eq!(sim.transition_state(), TransitionState::FadingOut { started_at: 50.0 });

        let report = sim.step(60.0);
        assert_eq!(report.transition, None);
        assert!(sim.opacity() < 1.0);

        let report = sim.step(60.0);
        assert_eq!(report.transition, Some(TransitionEvent::SwapGeometry(target)));
        assert_eq!(sim.room(), &target);
        // Everything alive now was spawned after the swap.
        assert_eq!(sim.active_count(), report.spawned);
        for p in sim.positions() {
            assert!(check_bounds(sim.bounds(), Vec3::from_array(*p)).in_bounds);
        }
        assert_eq!(sim.opacity(), 0.0);
    }

    #[test]
    fn test_same_room_request_is_ignored() {
        let mut sim = sim();
        assert!(!sim.request_room(RoomGeometry::new(30.0, 20.0, 10.0)));
        assert_eq!(sim.transition_state(), TransitionState::Idle);
        assert_eq!(sim.opacity(), 1.0);
    }

    #[test]
    fn test_ventilation_change_scales_lifespans() {
        let mut sim = sim();
        sim.step(100.0);
        sim.step(100.0);
        let before: Vec<f64> = sim.pool().lifespans().to_vec();
        let old_k = sim.params().total_removal_rate();
        sim.set_ventilation_rate(6.0);
        let ratio = old_k / sim.params().total_removal_rate();
        for (i, &life) in before.iter().enumerate() {
            assert_eq!(sim.pool().lifespan(i), life * ratio);
        }
    }

    #[test]
    fn test_bad_inputs_are_clamped_or_rejected() {
        let mut sim = sim();
        sim.set_ventilation_rate(f64::NAN);
        assert_eq!(sim.params().ventilation_rate, 0.0);
        sim.set_ventilation_rate(-3.0);
        assert_eq!(sim.params().ventilation_rate, 0.0);
        sim.set_speed_multiplier(0.5);
        assert_eq!(sim.params().speed_multiplier, 1.0);
        assert!(matches!(
            sim.set_half_life(0.0),
            Err(ModelError::InvalidParameter { name: "half_life_hours", .. })
        ));
        assert_eq!(sim.params().half_life_hours, 1.1);
    }

    #[test]
    fn test_speed_change_rescales_velocities() {
        let mut sim = sim();
        sim.step(100.0);
        sim.set_speed_multiplier(120.0);
        let speed = sim.speed();
        assert!(speed > 0.0);
        for v in sim.pool().velocities() {
            assert!((v.length() - speed).abs() <= speed * 1e-4);
        }
    }

    #[test]
    fn test_static_mesh_absorbs() {
        let mut sim = sim();
        // A mesh covering the whole room swallows everything on the next step.
        sim.add_static_mesh(StaticMesh::new(
            Affine3A::IDENTITY,
            Aabb::new(Vec3::splat(-100.0), Vec3::splat(100.0)),
        ));
        sim.step(100.0);
        let spawned = sim.active_count();
        assert!(spawned > 0);
        let report = sim.step(100.0);
        assert_eq!(report.tick.absorbed + report.tick.expired, spawned);
    }

    #[test]
    fn test_reset_and_dispose() {
        let mut sim = sim();
        sim.step(100.0);
        sim.reset();
        assert_eq!(sim.active_count(), 0);
        sim.request_room(RoomGeometry::new(12.0, 12.0, 8.0));
        sim.dispose();
    }
}
