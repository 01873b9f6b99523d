//! Structure-of-arrays container for all bodies in the simulation.

use log::info;

use crate::error::BhError;
use crate::vector2::Vector2;

/// Holds every body's position, velocity, acceleration, mass, radius and
/// deletion flag in parallel arrays. Exclusively owned by the engine; the
/// quadtree only ever borrows it immutably during a build/traversal.
#[derive(Clone, Debug, Default)]
pub struct ParticleStore {
    pos: Vec<Vector2>,
    vel: Vec<Vector2>,
    acc: Vec<Vector2>,
    mass: Vec<f64>,
    radius: Vec<f64>,
    deleted: Vec<bool>,
}

impl ParticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        let mut s = Self::new();
        s.resize(n);
        s
    }

    pub fn len(&self) -> usize {
        self.pos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pos.is_empty()
    }

    /// Number of particles not flagged deleted.
    pub fn live_count(&self) -> usize {
        self.deleted.iter().filter(|d| !**d).count()
    }

    fn check_index(&self, i: usize) -> Result<(), BhError> {
        if i >= self.len() {
            return Err(BhError::InvalidIndex {
                index: i,
                len: self.len(),
            });
        }
        Ok(())
    }

    /// Grow capacity to `n`, zero-initializing new entries. Existing
    /// entries are preserved. Shrinking is not supported here; use
    /// `compact` to remove slots.
    pub fn resize(&mut self, n: usize) {
        self.pos.resize(n, Vector2::new_zero());
        self.vel.resize(n, Vector2::new_zero());
        self.acc.resize(n, Vector2::new_zero());
        self.mass.resize(n, 0.);
        self.radius.resize(n, 0.);
        self.deleted.resize(n, false);
    }

    pub fn pos(&self) -> &[Vector2] {
        &self.pos
    }

    pub fn vel(&self) -> &[Vector2] {
        &self.vel
    }

    pub fn acc(&self) -> &[Vector2] {
        &self.acc
    }

    pub fn mass(&self) -> &[f64] {
        &self.mass
    }

    pub fn radius(&self) -> &[f64] {
        &self.radius
    }

    pub fn deleted(&self) -> &[bool] {
        &self.deleted
    }

    pub fn acc_mut(&mut self) -> &mut [Vector2] {
        &mut self.acc
    }

    /// Splits the store into the disjoint views the parallel force phase
    /// needs: immutable `pos`/`mass`/`deleted`, and a mutable `acc` slice
    /// workers partition by index range (spec §5 "Shared-resource
    /// policy"). A plain field-by-field borrow split, not a lock.
    pub fn split_for_force_phase(&mut self) -> (&[Vector2], &[f64], &[bool], &mut [Vector2]) {
        (&self.pos, &self.mass, &self.deleted, &mut self.acc)
    }

    pub fn pos_at(&self, i: usize) -> Result<Vector2, BhError> {
        self.check_index(i)?;
        Ok(self.pos[i])
    }

    pub fn set_pos(&mut self, i: usize, p: Vector2) -> Result<(), BhError> {
        self.check_index(i)?;
        self.pos[i] = p;
        Ok(())
    }

    pub fn set_vel(&mut self, i: usize, v: Vector2) -> Result<(), BhError> {
        self.check_index(i)?;
        self.vel[i] = v;
        Ok(())
    }

    /// Sets mass and derives `radius[i] = mass^(1/3)` (spec §4.2 ingress).
    pub fn set_mass(&mut self, i: usize, mass: f64) -> Result<(), BhError> {
        self.check_index(i)?;
        if mass <= 0. {
            return Err(BhError::NonPositiveMass { index: i, mass });
        }
        self.mass[i] = mass;
        self.radius[i] = mass.cbrt();
        Ok(())
    }

    pub fn is_deleted(&self, i: usize) -> Result<bool, BhError> {
        self.check_index(i)?;
        Ok(self.deleted[i])
    }

    pub fn mark_deleted(&mut self, i: usize) -> Result<(), BhError> {
        self.check_index(i)?;
        self.deleted[i] = true;
        Ok(())
    }

    /// `acc[i] += F / mass[i]`. Precondition: `mass[i] > 0`.
    pub fn add_force(&mut self, i: usize, force: Vector2) -> Result<(), BhError> {
        self.check_index(i)?;
        let m = self.mass[i];
        if m <= 0. {
            return Err(BhError::NonPositiveMass { index: i, mass: m });
        }
        self.acc[i] += force / m;
        Ok(())
    }

    pub fn reset_force(&mut self, i: usize) -> Result<(), BhError> {
        self.check_index(i)?;
        self.acc[i] = Vector2::new_zero();
        Ok(())
    }

    /// Clears every live particle's acceleration to zero.
    pub fn reset_all_forces(&mut self) {
        for (acc, &deleted) in self.acc.iter_mut().zip(self.deleted.iter()) {
            if !deleted {
                *acc = Vector2::new_zero();
            }
        }
    }

    /// Half-kick/drift symplectic step (spec §4.5):
    /// `vel += acc * (dt/2)`; `pos += vel * dt`.
    pub fn integrate(&mut self, dt: f64) {
        for i in 0..self.pos.len() {
            if self.deleted[i] {
                continue;
            }
            self.vel[i] += self.acc[i] * (0.5 * dt);
            self.pos[i] += self.vel[i] * dt;
        }
    }

    /// Full kick-drift-kick variant: a second half-kick using the
    /// accelerations passed in (normally recomputed against the
    /// post-drift positions by the caller). Exposed for tests that need
    /// time-symmetry; the engine's default protocol uses `integrate`
    /// alone (spec §9 Open Question 4).
    pub fn second_half_kick(&mut self, dt: f64) {
        for i in 0..self.pos.len() {
            if self.deleted[i] {
                continue;
            }
            self.vel[i] += self.acc[i] * (0.5 * dt);
        }
    }

    /// Removes all slots flagged deleted, preserving the relative order
    /// of survivors. Returns the number removed.
    pub fn compact(&mut self) -> usize {
        let before = self.len();
        let mut write = 0;
        for read in 0..before {
            if self.deleted[read] {
                continue;
            }
            if write != read {
                self.pos[write] = self.pos[read];
                self.vel[write] = self.vel[read];
                self.acc[write] = self.acc[read];
                self.mass[write] = self.mass[read];
                self.radius[write] = self.radius[read];
                self.deleted[write] = self.deleted[read];
            }
            write += 1;
        }
        self.pos.truncate(write);
        self.vel.truncate(write);
        self.acc.truncate(write);
        self.mass.truncate(write);
        self.radius.truncate(write);
        self.deleted.truncate(write);
        let removed = before - write;
        if removed > 0 {
            info!("compacted particle store: removed {removed}, {write} remain");
        }
        removed
    }

    /// Mass-weighted merge of `remove` into `keep`. `remove` is marked
    /// deleted; `keep`'s fields become the combined body.
    pub fn merge(&mut self, keep: usize, remove: usize) -> Result<(), BhError> {
        self.check_index(keep)?;
        self.check_index(remove)?;
        if keep == remove {
            return Ok(());
        }

        let m_k = self.mass[keep];
        let m_r = self.mass[remove];
        let total_mass = m_k + m_r;

        let pos = (self.pos[keep] * m_k + self.pos[remove] * m_r) / total_mass;
        let vel = (self.vel[keep] * m_k + self.vel[remove] * m_r) / total_mass;
        let acc = self.acc[keep] + self.acc[remove];

        self.pos[keep] = pos;
        self.vel[keep] = vel;
        self.acc[keep] = acc;
        self.mass[keep] = total_mass;
        self.radius[keep] = total_mass.cbrt();
        self.deleted[remove] = true;

        Ok(())
    }

    /// Minimum and maximum `|acc[i]|` magnitude over live slots. Returns
    /// `None` when there are no live particles.
    pub fn acceleration_magnitude_bounds(&self) -> Option<(f64, f64)> {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut any = false;
        for (acc, &deleted) in self.acc.iter().zip(self.deleted.iter()) {
            if deleted {
                continue;
            }
            any = true;
            let mag = acc.length();
            min = min.min(mag);
            max = max.max(mag);
        }
        any.then_some((min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(n: usize) -> ParticleStore {
        let mut s = ParticleStore::with_capacity(n);
        for i in 0..n {
            s.set_pos(i, Vector2::new(i as f64, 0.)).unwrap();
            s.set_mass(i, (i + 1) as f64).unwrap();
        }
        s
    }

    #[test]
    fn resize_preserves_existing_and_zero_fills_new() {
        let mut s = seeded(2);
        s.resize(4);
        assert_eq!(s.len(), 4);
        assert_eq!(s.pos_at(0).unwrap(), Vector2::new(0., 0.));
        assert_eq!(s.pos_at(1).unwrap(), Vector2::new(1., 0.));
        assert_eq!(s.pos_at(2).unwrap(), Vector2::new_zero());
        assert_eq!(s.mass()[2], 0.);
    }

    #[test]
    fn radius_derived_as_cube_root_of_mass() {
        let mut s = ParticleStore::with_capacity(1);
        s.set_mass(0, 8.).unwrap();
        assert!((s.radius()[0] - 2.).abs() < 1e-12);
    }

    #[test]
    fn add_force_divides_by_mass() {
        let mut s = ParticleStore::with_capacity(1);
        s.set_mass(0, 2.).unwrap();
        s.add_force(0, Vector2::new(4., 0.)).unwrap();
        assert_eq!(s.acc()[0], Vector2::new(2., 0.));
    }

    #[test]
    fn integrate_applies_half_kick_drift() {
        let mut s = ParticleStore::with_capacity(1);
        s.set_mass(0, 1.).unwrap();
        s.set_pos(0, Vector2::new_zero()).unwrap();
        s.set_vel(0, Vector2::new_zero()).unwrap();
        s.acc_mut()[0] = Vector2::new(2., 0.);
        s.integrate(1.0);
        // vel += acc*0.5 => (1,0); pos += vel*dt => (1,0)
        assert_eq!(s.vel()[0], Vector2::new(1., 0.));
        assert_eq!(s.pos()[0], Vector2::new(1., 0.));
    }

    #[test]
    fn compact_removes_deleted_and_preserves_order() {
        let mut s = seeded(5);
        s.mark_deleted(1).unwrap();
        s.mark_deleted(3).unwrap();
        let removed = s.compact();
        assert_eq!(removed, 2);
        assert_eq!(s.len(), 3);
        // survivors were originally indices 0, 2, 4 with x = 0, 2, 4
        assert_eq!(s.pos()[0].x, 0.);
        assert_eq!(s.pos()[1].x, 2.);
        assert_eq!(s.pos()[2].x, 4.);
        assert!(s.deleted().iter().all(|d| !d));
    }

    #[test]
    fn merge_is_mass_weighted() {
        let mut s = ParticleStore::with_capacity(2);
        s.set_pos(0, Vector2::new(0., 0.)).unwrap();
        s.set_mass(0, 1.).unwrap();
        s.set_pos(1, Vector2::new(10., 0.)).unwrap();
        s.set_mass(1, 3.).unwrap();

        s.merge(0, 1).unwrap();
        // (0*1 + 10*3) / 4 = 7.5
        assert!((s.pos()[0].x - 7.5).abs() < 1e-12);
        assert_eq!(s.mass()[0], 4.);
        assert!(s.is_deleted(1).unwrap());
    }

    #[test]
    fn invalid_index_is_an_error() {
        let s = ParticleStore::with_capacity(2);
        assert!(matches!(
            s.pos_at(5),
            Err(BhError::InvalidIndex { index: 5, len: 2 })
        ));
    }

    #[test]
    fn acceleration_bounds_ignore_deleted() {
        let mut s = ParticleStore::with_capacity(2);
        s.set_mass(0, 1.).unwrap();
        s.set_mass(1, 1.).unwrap();
        s.acc_mut()[0] = Vector2::new(3., 4.); // magnitude 5
        s.acc_mut()[1] = Vector2::new(1., 0.); // magnitude 1
        let (min, max) = s.acceleration_magnitude_bounds().unwrap();
        assert_eq!(min, 1.);
        assert_eq!(max, 5.);

        s.mark_deleted(1).unwrap();
        let (min, max) = s.acceleration_magnitude_bounds().unwrap();
        assert_eq!(min, 5.);
        assert_eq!(max, 5.);
    }
}
