//! The symplectic time integrator (spec §4.5). Pure over `ParticleStore`:
//! it holds no state of its own and never touches the tree.

use crate::config::IntegratorMode;
use crate::particle_store::ParticleStore;

/// Advances every live particle in `store` by one step of `dt`, given the
/// accelerations the engine already wrote into `store` this step.
///
/// `HalfKickDrift` performs the single half-kick/drift the original
/// engine implements (spec §9 Open Question 4): `vel += acc*(dt/2)`, then
/// `pos += vel*dt`. `KickDriftKick` additionally re-applies a second
/// half-kick using `recompute_acc`, a caller-supplied closure that must
/// recompute accelerations at the drifted positions before returning, so
/// the second half-kick is time-symmetric rather than reusing the
/// pre-drift forces. `recompute_acc` is never called under
/// `HalfKickDrift`.
pub fn step<F>(store: &mut ParticleStore, dt: f64, mode: IntegratorMode, recompute_acc: F)
where
    F: FnOnce(&mut ParticleStore),
{
    store.integrate(dt);

    if mode == IntegratorMode::KickDriftKick {
        recompute_acc(store);
        store.second_half_kick(dt);
    }
}
