//! Per-step orchestrator: measures the domain, rebuilds the quadtree,
//! drives the parallel force phase, and invokes the integrator (spec
//! §4.6).

use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::bounding_box::BoundingBox;
use crate::config::{BhConfig, IntegratorMode};
use crate::error::BhError;
use crate::integrator;
use crate::particle_store::ParticleStore;
use crate::quadtree::QuadTree;
use crate::vector2::Vector2;

/// Read-only counters and timing exposed to observers (spec §6).
#[derive(Clone, Copy, Debug, Default)]
pub struct StepStats {
    pub step: u64,
    pub interactions_this_step: usize,
    pub total_interactions: u64,
}

pub struct SimulationEngine {
    store: ParticleStore,
    config: BhConfig,
    pool: Option<ThreadPool>,
    tree: Option<QuadTree>,
    root_bounds: Option<BoundingBox>,
    step: u64,
    interactions_this_step: usize,
    total_interactions: u64,
    last_physics_time: f64,
}

impl SimulationEngine {
    pub fn new(config: BhConfig) -> Self {
        let pool = config.worker_count.map(|n| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .expect("failed to build worker thread pool")
        });

        Self {
            store: ParticleStore::new(),
            config,
            pool,
            tree: None,
            root_bounds: None,
            step: 0,
            interactions_this_step: 0,
            total_interactions: 0,
            last_physics_time: 0.,
        }
    }

    // --- Population ingress (spec §6) -------------------------------------

    pub fn store(&self) -> &ParticleStore {
        &self.store
    }

    /// Mutable access for presets populating `pos`/`vel`/`mass` after a
    /// `resize`. The core never enumerates preset kinds (spec §9); this is
    /// the whole of the ingress contract.
    pub fn store_mut(&mut self) -> &mut ParticleStore {
        &mut self.store
    }

    // --- Control ingress ---------------------------------------------------

    pub fn config(&self) -> &BhConfig {
        &self.config
    }

    pub fn set_g(&mut self, g: f64) {
        self.config.g = g;
    }

    pub fn set_theta(&mut self, theta: f64) {
        self.config.theta = theta;
    }

    pub fn set_dt(&mut self, dt: f64) {
        self.config.dt = dt;
    }

    pub fn set_worker_count(&mut self, worker_count: Option<usize>) {
        self.config.worker_count = worker_count;
        self.pool = worker_count.map(|n| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .expect("failed to build worker thread pool")
        });
    }

    /// Resets step counters and timing to zero, leaving particle state
    /// untouched.
    pub fn reset_step_counters(&mut self) {
        self.step = 0;
        self.interactions_this_step = 0;
        self.total_interactions = 0;
        self.last_physics_time = 0.;
    }

    // --- Observation egress --------------------------------------------------

    pub fn stats(&self) -> StepStats {
        StepStats {
            step: self.step,
            interactions_this_step: self.interactions_this_step,
            total_interactions: self.total_interactions,
        }
    }

    pub fn last_physics_time(&self) -> f64 {
        self.last_physics_time
    }

    pub fn particle_count(&self) -> usize {
        self.store.live_count()
    }

    pub fn root_bounds(&self) -> Option<BoundingBox> {
        self.root_bounds
    }

    pub fn center_of_mass(&self) -> Option<Vector2> {
        self.tree.as_ref().map(|t| t.root().center_of_mass)
    }

    /// Snapshot of every node's rectangle in the current tree, as
    /// (top_left, bottom_right) corner pairs a renderer can turn into line
    /// segments (spec §6).
    pub fn tree_rectangles(&self) -> Vec<(Vector2, Vector2)> {
        match &self.tree {
            Some(tree) => tree
                .nodes()
                .iter()
                .map(|n| (n.bounds.top_left, n.bounds.bottom_right))
                .collect(),
            None => Vec::new(),
        }
    }

    // --- Per-step protocol (spec §4.6) --------------------------------------

    /// Advances the simulation by one step. A no-op when there are no live
    /// particles (spec §7 "Empty population").
    pub fn step(&mut self) -> Result<(), BhError> {
        self.interactions_this_step = 0;

        if self.store.live_count() == 0 {
            self.step += 1;
            return Ok(());
        }

        let (tree, bounds) = Self::build_tree(&self.store, &self.config)?;
        debug!(
            "rebuilt quadtree: {} nodes over {} live particles, bounds width {:.3}",
            tree.nodes().len(),
            self.store.live_count(),
            bounds.width()
        );
        self.root_bounds = Some(bounds);

        let interactions = Self::fill_forces(&mut self.store, &tree, &self.config, &self.pool);
        self.interactions_this_step = interactions;
        self.total_interactions += interactions as u64;

        let pending_merges = tree.pending_merges().to_vec();
        self.tree = Some(tree);

        for (keep, remove) in pending_merges {
            self.store.merge(keep, remove)?;
        }

        // `kdk_outcome` is only populated when `integrator_mode` is
        // `KickDriftKick`: the closure below re-measures bounds, rebuilds the
        // tree at the drifted positions, and refills `acc` before the
        // integrator's second half-kick, so that kick is never taken against
        // stale, pre-drift forces (spec §9 Open Question 4).
        let config = self.config;
        let pool = &self.pool;
        let mut kdk_outcome: Result<Option<(QuadTree, BoundingBox, usize)>, BhError> = Ok(None);

        integrator::step(&mut self.store, config.dt, config.integrator_mode, |store| {
            if config.integrator_mode != IntegratorMode::KickDriftKick {
                return;
            }
            kdk_outcome = Self::build_tree(store, &config).and_then(|(tree2, bounds2)| {
                let interactions2 = Self::fill_forces(store, &tree2, &config, pool);
                for &(keep, remove) in tree2.pending_merges() {
                    store.merge(keep, remove)?;
                }
                Ok(Some((tree2, bounds2, interactions2)))
            });
        });

        if let Some((tree2, bounds2, interactions2)) = kdk_outcome? {
            debug!(
                "kick-drift-kick recompute: {} nodes, bounds width {:.3}",
                tree2.nodes().len(),
                bounds2.width()
            );
            self.interactions_this_step += interactions2;
            self.total_interactions += interactions2 as u64;
            self.root_bounds = Some(bounds2);
            self.tree = Some(tree2);
        }

        if self.store.deleted().iter().any(|&d| d) {
            self.store.compact();
        }

        self.step += 1;
        self.last_physics_time += self.config.dt;

        Ok(())
    }

    /// Measures the square root bounds covering every live particle in
    /// `store` and builds a fresh quadtree over it (spec §4.6 steps 2-4).
    fn build_tree(store: &ParticleStore, config: &BhConfig) -> Result<(QuadTree, BoundingBox), BhError> {
        let live_positions: Vec<Vector2> = (0..store.len())
            .filter(|&i| !store.deleted()[i])
            .map(|i| store.pos()[i])
            .collect();
        let bounds = BoundingBox::from_points(&live_positions)
            .expect("live_count > 0 implies at least one position");
        let tree = QuadTree::build(store, bounds, config)?;
        Ok((tree, bounds))
    }

    /// Runs the parallel force phase (spec §4.6 step 5), writing each live
    /// body's acceleration from `tree`. Returns the accepted-interaction
    /// count, summed across workers.
    fn fill_forces(store: &mut ParticleStore, tree: &QuadTree, config: &BhConfig, pool: &Option<ThreadPool>) -> usize {
        let interactions = AtomicU64::new(0);
        let (pos, mass, deleted, acc) = store.split_for_force_phase();
        let work = || {
            acc.par_iter_mut().enumerate().for_each(|(i, a)| {
                if deleted[i] {
                    return;
                }
                let (force, count) = tree.compute_force(i, pos[i], mass[i], config);
                *a = force / mass[i];
                interactions.fetch_add(count as u64, Ordering::Relaxed);
            });
        };
        match pool {
            Some(pool) => pool.install(work),
            None => work(),
        }
        interactions.load(Ordering::Relaxed) as usize
    }

    /// Runs up to `n_steps`, polling `should_continue` between steps for a
    /// cooperative, graceful shutdown (spec §5 "Cancellation / timeouts").
    /// Returns the number of steps actually executed.
    pub fn run<F>(&mut self, n_steps: u64, mut should_continue: F) -> Result<u64, BhError>
    where
        F: FnMut() -> bool,
    {
        let mut done = 0;
        while done < n_steps && should_continue() {
            self.step()?;
            done += 1;
        }
        Ok(done)
    }
}
