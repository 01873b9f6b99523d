//! Typed configuration knobs for the engine (spec §6's "Recognized
//! configuration options"). Loading these from a file or the command line
//! is an external collaborator's job; this struct is just the surface the
//! engine is built around, mirroring the teacher crate's `BhConfig`.

/// Policy applied when the quadtree refuses to subdivide a cell below
/// `min_cell_size` and two particles would otherwise land in the same
/// leaf (spec §4.4, §9 Open Question 3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SubdivisionPolicy {
    /// Co-locate both particles in the same leaf; the leaf is treated as
    /// a single aggregate body by subsequent traversals. Deterministic;
    /// used for the reference implementation and all correctness tests.
    #[default]
    Colocate,
    /// Fold the incoming particle into the resident one via
    /// `ParticleStore::merge`, shedding runaway bodies. Out of scope for
    /// correctness tests (spec §4.4).
    Merge,
}

/// Which half of the leapfrog step the integrator performs each call
/// (spec §4.5, §9 Open Question 4).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum IntegratorMode {
    /// `vel += acc*(dt/2); pos += vel*dt`, once per step, the
    /// half-implemented leapfrog the original performs.
    #[default]
    HalfKickDrift,
    /// `HalfKickDrift` followed by a second half-kick against
    /// accelerations recomputed at the new positions. Time-symmetric;
    /// intended for tests that need better energy conservation.
    KickDriftKick,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BhConfig {
    /// Gravitational constant in simulation units.
    pub g: f64,
    /// Opening angle. The accept test uses `theta^2` against `s^2/d^2`.
    pub theta: f64,
    /// Integration step size.
    pub dt: f64,
    /// Softening term added to squared distance before the force divide.
    pub epsilon_squared: f64,
    /// Refuse to subdivide a cell whose side is at or below this length.
    pub min_cell_size: f64,
    /// Number of worker tasks for the parallel force phase. `None` means
    /// use rayon's default (hardware concurrency hint).
    pub worker_count: Option<usize>,
    pub subdivision_policy: SubdivisionPolicy,
    pub integrator_mode: IntegratorMode,
}

impl Default for BhConfig {
    fn default() -> Self {
        Self {
            g: 1.,
            theta: 0.5,
            dt: 0.01,
            epsilon_squared: 2.0,
            min_cell_size: 0.1,
            worker_count: None,
            subdivision_policy: SubdivisionPolicy::default(),
            integrator_mode: IntegratorMode::default(),
        }
    }
}
