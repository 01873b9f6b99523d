//! The mass-aggregating region quadtree. Rebuilt from scratch every
//! simulation step; read-only and freely shared across workers once built
//! (spec §4.4, §5).

use crate::bounding_box::BoundingBox;
use crate::config::{BhConfig, SubdivisionPolicy};
use crate::error::BhError;
use crate::particle_store::ParticleStore;
use crate::vector2::Vector2;

/// Hard ceiling on recursion depth, guarding against runaway subdivision
/// when many particles sit at (near-)identical positions. Mirrors the
/// teacher crate's `max_tree_depth` safeguard.
const MAX_TREE_DEPTH: usize = 64;

/// A single quadtree node, stored by value in `QuadTree::nodes`. Child
/// slots are arena indices rather than owned pointers (spec §9 design
/// note), which keeps the tree flat, cheap to share read-only across
/// worker threads, and free of recursive-drop stack depth concerns.
#[derive(Clone, Debug)]
pub struct QuadNode {
    pub bounds: BoundingBox,
    pub center_of_mass: Vector2,
    pub total_mass: f64,
    /// Set only for a leaf holding exactly one particle.
    pub body_index: Option<usize>,
    /// Populated only when subdivision was refused for a leaf that
    /// already held a particle (spec §4.4 co-locate policy); such a leaf
    /// is still a leaf (`children.is_none()`) but aggregates more than
    /// one body. Empty in the common case.
    pub colocated: Vec<usize>,
    /// `None` for a leaf; `Some([nw, ne, sw, se])` for an internal node.
    pub children: Option<[usize; 4]>,
    pub depth: usize,
}

impl QuadNode {
    fn empty(bounds: BoundingBox, depth: usize) -> Self {
        Self {
            bounds,
            center_of_mass: Vector2::new_zero(),
            total_mass: 0.,
            body_index: None,
            colocated: Vec::new(),
            children: None,
            depth,
        }
    }

    fn is_empty(&self) -> bool {
        self.total_mass == 0. && self.body_index.is_none() && self.colocated.is_empty() && self.children.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Whether the query body `i` is part of this leaf's own aggregate
    /// (so traversal must skip it as a self-interaction).
    fn contains_body(&self, i: usize) -> bool {
        self.body_index == Some(i) || self.colocated.contains(&i)
    }
}

/// Arena-backed Barnes-Hut quadtree. Node 0 is always the root.
#[derive(Clone, Debug)]
pub struct QuadTree {
    nodes: Vec<QuadNode>,
    /// (keep, remove) pairs recorded when `SubdivisionPolicy::Merge` was
    /// configured and a cell refused to subdivide. The tree cannot apply
    /// these itself (it only borrows the store immutably); the engine may
    /// apply them via `ParticleStore::merge` once the step's traversal is
    /// done. Always empty under `SubdivisionPolicy::Colocate`.
    pending_merges: Vec<(usize, usize)>,
}

impl QuadTree {
    /// Builds a tree over every live particle in `store`, within
    /// `root_bounds`. `root_bounds` must be square and must contain every
    /// live particle; violating that is a programming error (spec §4.4
    /// "Failure semantics").
    pub fn build(
        store: &ParticleStore,
        root_bounds: BoundingBox,
        config: &BhConfig,
    ) -> Result<Self, BhError> {
        let mut tree = Self {
            nodes: vec![QuadNode::empty(root_bounds, 0)],
            pending_merges: Vec::new(),
        };

        for i in 0..store.len() {
            if store.is_deleted(i)? {
                continue;
            }
            let pos = store.pos_at(i)?;
            if !root_bounds.contains(pos) {
                return Err(BhError::OutOfBounds { index: i });
            }
            tree.insert_at(0, i, pos, store.mass()[i], store, config)?;
        }

        Ok(tree)
    }

    pub fn nodes(&self) -> &[QuadNode] {
        &self.nodes
    }

    pub fn root(&self) -> &QuadNode {
        &self.nodes[0]
    }

    pub fn pending_merges(&self) -> &[(usize, usize)] {
        &self.pending_merges
    }

    /// Insertion algorithm of spec §4.4, implemented over arena indices.
    /// Recursion here is plain call recursion (not the explicit-stack form
    /// required of the read-only *traversal*); build is sequential and
    /// bounded by `MAX_TREE_DEPTH`, so stack depth is not a concern.
    fn insert_at(
        &mut self,
        node_id: usize,
        index: usize,
        pos: Vector2,
        mass: f64,
        store: &ParticleStore,
        config: &BhConfig,
    ) -> Result<(), BhError> {
        if self.nodes[node_id].is_empty() {
            let n = &mut self.nodes[node_id];
            n.body_index = Some(index);
            n.total_mass = mass;
            n.center_of_mass = pos;
            return Ok(());
        }

        {
            let n = &mut self.nodes[node_id];
            let new_total = n.total_mass + mass;
            n.center_of_mass = (n.center_of_mass * n.total_mass + pos * mass) / new_total;
            n.total_mass = new_total;
        }

        if let Some(children) = self.nodes[node_id].children {
            let bounds = self.nodes[node_id].bounds;
            let q = bounds.quadrant_of(pos);
            return self.insert_at(children[q], index, pos, mass, store, config);
        }

        // A leaf that already refused to subdivide once (body_index is gone
        // but colocated is non-empty) stays refused: further arrivals just
        // join the aggregate rather than re-deriving a conflict.
        if self.nodes[node_id].body_index.is_none() {
            let n = &mut self.nodes[node_id];
            if config.subdivision_policy == SubdivisionPolicy::Merge {
                let keep = n.colocated[0];
                self.pending_merges.push((keep, index));
            }
            self.nodes[node_id].colocated.push(index);
            return Ok(());
        }

        // Leaf already holding one particle: this is the insertion conflict
        // the spec's step 4 describes.
        let existing = self.nodes[node_id].body_index.take().unwrap();
        let existing_pos = store.pos_at(existing)?;
        let existing_mass = store.mass()[existing];
        let bounds = self.nodes[node_id].bounds;
        let depth = self.nodes[node_id].depth;

        let can_subdivide = bounds.width() > config.min_cell_size && depth < MAX_TREE_DEPTH;

        if !can_subdivide {
            match config.subdivision_policy {
                SubdivisionPolicy::Colocate => {
                    let n = &mut self.nodes[node_id];
                    n.colocated.push(existing);
                    n.colocated.push(index);
                }
                SubdivisionPolicy::Merge => {
                    self.pending_merges.push((existing, index));
                    let n = &mut self.nodes[node_id];
                    n.colocated.push(existing);
                    n.colocated.push(index);
                }
            }
            return Ok(());
        }

        let quads = bounds.subdivide();
        let mut child_ids = [0usize; 4];
        for (q, bb) in quads.into_iter().enumerate() {
            child_ids[q] = self.nodes.len();
            self.nodes.push(QuadNode::empty(bb, depth + 1));
        }
        self.nodes[node_id].children = Some(child_ids);
        self.nodes[node_id].body_index = None;

        // Descend straight into the two particles' own child quadrants
        // rather than re-entering `node_id`: its mass/center-of-mass were
        // already folded in above, by both particles' original visits.
        // Re-running `insert_at(node_id, ...)` here would accumulate them
        // a second time.
        let q_existing = bounds.quadrant_of(existing_pos);
        self.insert_at(child_ids[q_existing], existing, existing_pos, existing_mass, store, config)?;
        let q_new = bounds.quadrant_of(pos);
        self.insert_at(child_ids[q_new], index, pos, mass, store, config)?;
        Ok(())
    }

    /// Opening-angle force traversal for a single query body (spec §4.4).
    /// Iterative with an explicit stack so it is trivially safe to run
    /// concurrently with other queries against this same, read-only tree.
    ///
    /// Returns the raw force `F = Δ · (G · M_n · mass_i / (d² + ε²))`
    /// accumulated over every accepted node, the stipulated un-normalized
    /// form of §9 Open Question 1, along with the accepted-interaction
    /// count. The caller passes this into `ParticleStore::add_force`,
    /// which divides by `mass_i` to land on the final stated acceleration
    /// `acc[i] += Δ · (G · M_n / (d² + ε²))`.
    pub fn compute_force(
        &self,
        i: usize,
        pos_i: Vector2,
        mass_i: f64,
        config: &BhConfig,
    ) -> (Vector2, usize) {
        let mut stack = vec![0usize];
        let mut force = Vector2::new_zero();
        let mut interactions = 0usize;
        let theta_sq = config.theta * config.theta;

        while let Some(node_id) = stack.pop() {
            let node = &self.nodes[node_id];

            if node.total_mass == 0. {
                continue;
            }
            let is_leaf = node.is_leaf();
            if is_leaf {
                if node.contains_body(i) {
                    continue;
                }
            } else if node.bounds.contains(pos_i) {
                // Query body i's own position falls inside this internal
                // node's bounds, so i is somewhere in its subtree. Never
                // accept the node as a whole here, no matter how small
                // theta makes the opening test: that would fold i's own
                // mass into the force on i. Force it open instead, at
                // worst trading away one acceptance for the O(log N)
                // traversal depth below it.
                if let Some(children) = node.children {
                    stack.extend_from_slice(&children);
                }
                continue;
            }

            let delta = node.center_of_mass - pos_i;
            let d_sq = delta.length_squared();
            if d_sq == 0. {
                // Degenerate zero-distance surrogate path (spec §4.4
                // "Failure semantics"); softening cannot rescue a true
                // zero separation, so skip rather than divide.
                continue;
            }

            let s_sq = node.bounds.side_squared();
            let accept = is_leaf || s_sq / d_sq < theta_sq;

            if accept {
                let force_scalar =
                    config.g * node.total_mass * mass_i / (d_sq + config.epsilon_squared);
                force += delta * force_scalar;
                interactions += 1;
            } else if let Some(children) = node.children {
                stack.extend_from_slice(&children);
            }
        }

        (force, interactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{direct_summation_force, random_bodies};

    fn store_of(positions: &[(f64, f64)], masses: &[f64]) -> ParticleStore {
        let mut s = ParticleStore::with_capacity(positions.len());
        for (i, (p, m)) in positions.iter().zip(masses).enumerate() {
            s.set_pos(i, Vector2::new(p.0, p.1)).unwrap();
            s.set_mass(i, *m).unwrap();
        }
        s
    }

    fn square(half: f64) -> BoundingBox {
        BoundingBox::new(Vector2::new(-half, -half), Vector2::new(half, half))
    }

    #[test]
    fn root_total_mass_equals_sum_of_masses() {
        let s = store_of(
            &[(1., 1.), (-3., 2.), (4., -4.), (0., 0.)],
            &[1., 2., 3., 4.],
        );
        let config = BhConfig::default();
        let tree = QuadTree::build(&s, square(10.), &config).unwrap();
        assert!((tree.root().total_mass - 10.).abs() < 1e-12);
    }

    #[test]
    fn internal_node_mass_equals_sum_of_children() {
        let s = store_of(
            &[(1., 1.), (-3., 2.), (4., -4.), (0.5, 0.5), (-1., -1.)],
            &[1., 2., 3., 4., 5.],
        );
        let config = BhConfig::default();
        let tree = QuadTree::build(&s, square(10.), &config).unwrap();

        for node in tree.nodes() {
            if let Some(children) = node.children {
                let child_mass: f64 = children.iter().map(|&c| tree.nodes()[c].total_mass).sum();
                assert!((node.total_mass - child_mass).abs() < 1e-10 * node.total_mass.max(1.));

                let weighted: Vector2 = children
                    .iter()
                    .map(|&c| {
                        let n = &tree.nodes()[c];
                        n.center_of_mass * n.total_mass
                    })
                    .fold(Vector2::new_zero(), |a, b| a + b);
                let expected = node.center_of_mass * node.total_mass;
                assert!((weighted.x - expected.x).abs() < 1e-9);
                assert!((weighted.y - expected.y).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn every_live_particle_is_within_root_bounds() {
        let bounds = square(50.);
        let s = random_bodies(200, 50., 1., 10., 7);
        let config = BhConfig::default();
        let tree = QuadTree::build(&s, bounds, &config).unwrap();
        for i in 0..s.len() {
            assert!(bounds.contains(s.pos_at(i).unwrap()));
        }
        assert!((tree.root().total_mass - s.mass().iter().sum::<f64>()).abs() < 1e-9);
    }

    #[test]
    fn theta_zero_matches_direct_summation() {
        let s = random_bodies(50, 50., 1., 10., 11);
        let mut config = BhConfig::default();
        config.theta = 0.;
        config.epsilon_squared = 1.0;
        let tree = QuadTree::build(&s, square(60.), &config).unwrap();

        for i in 0..s.len() {
            let pos_i = s.pos_at(i).unwrap();
            let mass_i = s.mass()[i];
            let (force, interactions) = tree.compute_force(i, pos_i, mass_i, &config);
            assert_eq!(interactions, s.len() - 1);
            let tree_acc = force / mass_i;

            let direct = direct_summation_force(&s, i, config.g, config.epsilon_squared);
            let rel_err = (tree_acc - direct).length() / direct.length().max(1e-300);
            assert!(rel_err < 1e-9, "rel_err = {rel_err}");
        }
    }

    #[test]
    fn zero_distance_interaction_is_skipped_without_panic() {
        let s = store_of(&[(0., 0.), (0., 0.)], &[1., 1.]);
        let config = BhConfig::default();
        let tree = QuadTree::build(&s, square(10.), &config).unwrap();
        let (force, interactions) = tree.compute_force(0, s.pos_at(0).unwrap(), s.mass()[0], &config);
        assert_eq!(force, Vector2::new_zero());
        assert_eq!(interactions, 0);
    }

    #[test]
    fn subdivision_refused_colocates_instead_of_panicking() {
        let mut config = BhConfig::default();
        config.min_cell_size = 1000.; // always refuse
        let s = store_of(&[(1., 1.), (-1., -1.)], &[1., 2.]);
        let tree = QuadTree::build(&s, square(10.), &config).unwrap();
        assert!(tree.root().is_leaf());
        assert_eq!(tree.root().colocated.len(), 2);
        assert!((tree.root().total_mass - 3.).abs() < 1e-12);
    }

    #[test]
    fn three_particles_in_a_refused_cell_all_colocate() {
        let mut config = BhConfig::default();
        config.min_cell_size = 1000.; // always refuse
        let s = store_of(&[(1., 1.), (-1., -1.), (0.5, 0.5)], &[1., 2., 3.]);
        let tree = QuadTree::build(&s, square(10.), &config).unwrap();
        assert!(tree.root().is_leaf());
        assert_eq!(tree.root().colocated.len(), 3);
        assert!((tree.root().total_mass - 6.).abs() < 1e-12);
    }

    #[test]
    fn internal_node_containing_query_body_is_never_accepted_as_aggregate() {
        let s = store_of(&[(1., 1.), (-1., -1.)], &[1., 1000.]);
        let mut config = BhConfig::default();
        config.theta = 2.0; // max per spec; root's s²/d² test alone would pass here
        config.min_cell_size = 0.01;
        let tree = QuadTree::build(&s, square(2.), &config).unwrap();
        assert!(!tree.root().is_leaf(), "root must subdivide for this test to be meaningful");

        let pos_i = s.pos_at(0).unwrap();
        let (force, interactions) = tree.compute_force(0, pos_i, s.mass()[0], &config);

        // Only body 1 should contribute; body 0 must never fold its own
        // mass into its own force via an accepted internal node.
        let delta = s.pos_at(1).unwrap() - pos_i;
        let d_sq = delta.length_squared();
        let expected_scalar = config.g * s.mass()[1] * s.mass()[0] / (d_sq + config.epsilon_squared);
        let expected = delta * expected_scalar;

        assert_eq!(interactions, 1);
        assert!((force.x - expected.x).abs() < 1e-9);
        assert!((force.y - expected.y).abs() < 1e-9);
    }

    #[test]
    fn out_of_bounds_insertion_is_an_error() {
        let s = store_of(&[(100., 100.)], &[1.]);
        let config = BhConfig::default();
        let err = QuadTree::build(&s, square(1.), &config).unwrap_err();
        assert!(matches!(err, BhError::OutOfBounds { index: 0 }));
    }

    #[test]
    fn deleted_particles_are_skipped_on_build() {
        let mut s = store_of(&[(1., 1.), (-1., -1.)], &[1., 2.]);
        s.mark_deleted(1).unwrap();
        let config = BhConfig::default();
        let tree = QuadTree::build(&s, square(10.), &config).unwrap();
        assert!((tree.root().total_mass - 1.).abs() < 1e-12);
    }
}
