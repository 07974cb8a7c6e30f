use glam::Vec3;
use zerocopy::IntoBytes;

/// Fixed-capacity struct-of-arrays particle storage.
///
/// Slots `[0, active_count)` are live. Everything past the cursor is stale
/// and never exposed. Removal swaps the last live particle into the freed
/// slot, so an index is only meaningful until the next removal; callers
/// must not keep indices across ticks.
#[derive(Debug)]
pub struct ParticlePool {
    active_count: usize,
    capacity: usize,

    // Positions stay as plain arrays so the live range can be handed to a
    // renderer as raw bytes.
    positions: Vec<[f32; 3]>,
    velocities: Vec<Vec3>,
    /// Remaining life in simulated milliseconds. Kept in f64 so a frame's
    /// decrement still registers on lifespans of hundreds of hours.
    lifespans: Vec<f64>,
    /// Total life assigned at spawn (simulated milliseconds).
    lifetimes: Vec<f64>,
}

impl ParticlePool {
    /// Allocates every buffer up front; the pool never grows.
    pub fn new(capacity: usize) -> Self {
        Self {
            active_count: 0,
            capacity,
            positions: vec![[0.0; 3]; capacity],
            velocities: vec![Vec3::ZERO; capacity],
            lifespans: vec![0.0; capacity],
            lifetimes: vec![0.0; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn active_count(&self) -> usize {
        self.active_count
    }

    pub fn is_full(&self) -> bool {
        self.active_count >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.active_count == 0
    }

    /// Adds a particle at the cursor. Returns false when the pool is full.
    pub fn spawn(&mut self, position: Vec3, velocity: Vec3, lifespan_ms: f64) -> bool {
        let idx = self.active_count;
        if idx >= self.capacity {
            log::trace!("Particle pool full ({} slots), spawn skipped.", self.capacity);
            return false;
        }
        self.positions[idx] = position.to_array();
        self.velocities[idx] = velocity;
        self.lifespans[idx] = lifespan_ms;
        self.lifetimes[idx] = lifespan_ms;
        self.active_count += 1;
        true
    }

    /// Removes the particle at `idx` by moving the last live particle into its slot.
    pub fn kill_and_compact(&mut self, idx: usize) {
        debug_assert!(idx < self.active_count, "kill index {} past active count {}", idx, self.active_count);
        if idx >= self.active_count {
            return;
        }
        let last = self.active_count - 1;
        if idx != last {
            self.positions.swap(idx, last);
            self.velocities.swap(idx, last);
            self.lifespans.swap(idx, last);
            self.lifetimes.swap(idx, last);
        }
        self.active_count = last;
    }

    /// Drops every live particle. Stale data is left in place.
    pub fn clear(&mut self) {
        self.active_count = 0;
    }

    #[inline(always)]
    pub fn position(&self, idx: usize) -> Vec3 {
        Vec3::from_array(self.positions[idx])
    }

    #[inline(always)]
    pub fn set_position(&mut self, idx: usize, position: Vec3) {
        self.positions[idx] = position.to_array();
    }

    #[inline(always)]
    pub fn velocity(&self, idx: usize) -> Vec3 {
        self.velocities[idx]
    }

    #[inline(always)]
    pub fn set_velocity(&mut self, idx: usize, velocity: Vec3) {
        self.velocities[idx] = velocity;
    }

    #[inline(always)]
    pub fn lifespan(&self, idx: usize) -> f64 {
        self.lifespans[idx]
    }

    #[inline(always)]
    pub fn set_lifespan(&mut self, idx: usize, lifespan_ms: f64) {
        self.lifespans[idx] = lifespan_ms;
    }

    #[inline(always)]
    pub fn lifetime(&self, idx: usize) -> f64 {
        self.lifetimes[idx]
    }

    /// Fraction of the particle's assigned life already spent (0-1).
    pub fn elapsed_fraction(&self, idx: usize) -> f64 {
        let lifetime = self.lifetimes[idx];
        if lifetime > 0.0 {
            1.0 - self.lifespans[idx] / lifetime
        } else {
            1.0
        }
    }

    /// Live positions, `[x, y, z]` per particle.
    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions[..self.active_count]
    }

    /// Live positions as tightly packed little-endian f32 bytes.
    pub fn positions_bytes(&self) -> &[u8] {
        self.positions[..self.active_count].as_bytes()
    }

    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities[..self.active_count]
    }

    pub fn lifespans(&self) -> &[f64] {
        &self.lifespans[..self.active_count]
    }

    /// Sets every live velocity to `speed`, keeping its direction.
    pub fn rescale_velocities(&mut self, speed: f32) {
        for velocity in &mut self.velocities[..self.active_count] {
            *velocity = velocity.normalize_or_zero() * speed;
        }
    }

    /// Scales remaining and total life together so the elapsed fraction of
    /// every particle is unchanged.
    pub fn rescale_lifespans(&mut self, ratio: f64) {
        let live = self.active_count;
        for (lifespan, lifetime) in self.lifespans[..live]
            .iter_mut()
            .zip(self.lifetimes[..live].iter_mut())
        {
            *lifespan *= ratio;
            *lifetime *= ratio;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_with(lifespans: &[f64]) -> ParticlePool {
        let mut pool = ParticlePool::new(lifespans.len() + 2);
        for (i, &life) in lifespans.iter().enumerate() {
            assert!(pool.spawn(Vec3::splat(i as f32), Vec3::X, life));
        }
        pool
    }

    #[test]
    fn test_spawn_stops_at_capacity() {
        let mut pool = ParticlePool::new(2);
        assert!(pool.spawn(Vec3::ZERO, Vec3::X, 1.0));
        assert!(pool.spawn(Vec3::ZERO, Vec3::X, 1.0));
        assert!(pool.is_full());
        assert!(!pool.spawn(Vec3::ZERO, Vec3::X, 1.0));
        assert_eq!(pool.active_count(), 2);
    }

    #[test]
    fn test_kill_swaps_last_into_slot() {
        let mut pool = pool_with(&[10.0, 20.0, 30.0]);
        pool.kill_and_compact(0);
        assert_eq!(pool.active_count(), 2);
        assert_eq!(pool.lifespan(0), 30.0);
        assert_eq!(pool.position(0), Vec3::splat(2.0));
        assert_eq!(pool.lifespan(1), 20.0);
    }

    #[test]
    fn test_kill_last_only_moves_cursor() {
        let mut pool = pool_with(&[10.0, 20.0]);
        pool.kill_and_compact(1);
        assert_eq!(pool.active_count(), 1);
        assert_eq!(pool.lifespans(), &[10.0]);
    }

    #[test]
    fn test_views_cover_live_range_only() {
        let mut pool = pool_with(&[1.0, 2.0, 3.0]);
        pool.kill_and_compact(2);
        assert_eq!(pool.positions().len(), 2);
        assert_eq!(pool.positions_bytes().len(), 2 * 3 * std::mem::size_of::<f32>());
        pool.clear();
        assert!(pool.is_empty());
        assert!(pool.positions().is_empty());
    }

    #[test]
    fn test_rescale_velocities_keeps_direction() {
        let mut pool = ParticlePool::new(1);
        pool.spawn(Vec3::ZERO, Vec3::new(3.0, 4.0, 0.0), 1.0);
        pool.rescale_velocities(10.0);
        let v = pool.velocity(0);
        assert!((v.length() - 10.0).abs() < 1e-5);
        assert!((v.normalize() - Vec3::new(0.6, 0.8, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_rescale_lifespans_keeps_elapsed_fraction() {
        let mut pool = pool_with(&[100.0]);
        pool.set_lifespan(0, 40.0);
        let before = pool.elapsed_fraction(0);
        pool.rescale_lifespans(0.25);
        assert_eq!(pool.lifespan(0), 10.0);
        assert!((pool.elapsed_fraction(0) - before).abs() < 1e-12);
    }
}
