//! Shared fixtures for the test suites in `quadtree`, `engine`, and the
//! integration tests: a naive O(N^2) reference force and a random body
//! generator. Test-only; not part of the public API.

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::particle_store::ParticleStore;
use crate::vector2::Vector2;

/// Direct pairwise summation of the acceleration on body `i`, using the
/// same un-normalized stipulated force law as `QuadTree::compute_force`
/// (spec §9 Open Question 1): `acc += Δ · (G · mass_j / (d² + ε²))`.
pub fn direct_summation_force(store: &ParticleStore, i: usize, g: f64, epsilon_squared: f64) -> Vector2 {
    let pos_i = store.pos()[i];
    let mut acc = Vector2::new_zero();
    for j in 0..store.len() {
        if j == i || store.deleted()[j] {
            continue;
        }
        let delta = store.pos()[j] - pos_i;
        let d_sq = delta.length_squared();
        if d_sq == 0. {
            continue;
        }
        acc += delta * (g * store.mass()[j] / (d_sq + epsilon_squared));
    }
    acc
}

/// `n` random bodies uniformly scattered in a square of the given radius,
/// with masses in `[min_mass, max_mass)`. Deterministic for a given seed.
pub fn random_bodies(n: usize, radius: f64, min_mass: f64, max_mass: f64, seed: u64) -> ParticleStore {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut store = ParticleStore::with_capacity(n);
    for i in 0..n {
        let x = rng.gen_range(-radius..radius);
        let y = rng.gen_range(-radius..radius);
        store.set_pos(i, Vector2::new(x, y)).unwrap();
        store.set_mass(i, rng.gen_range(min_mass..max_mass)).unwrap();
    }
    store
}
