//! A parallel, planar Barnes-Hut N-body engine.
//!
//! Given a [`ParticleStore`] of point masses, [`SimulationEngine`] advances
//! them through discrete time steps, approximating the gravitational force
//! on each body from every other body via a mass-aggregating [`QuadTree`]
//! and an opening-angle traversal, in sub-quadratic time. The force phase
//! is data-parallel across worker threads over a read-only, per-step tree.
//!
//! Particle initialization presets, rendering, configuration loading, and
//! state persistence are external collaborators and out of scope for this
//! crate; see the [`SimulationEngine`] ingress/egress methods for the
//! surface they're expected to drive.

pub mod bounding_box;
pub mod config;
pub mod engine;
pub mod error;
pub mod integrator;
pub mod particle_store;
pub mod quadtree;
pub mod vector2;

#[cfg(test)]
mod test_support;

pub use bounding_box::BoundingBox;
pub use config::{BhConfig, IntegratorMode, SubdivisionPolicy};
pub use engine::{SimulationEngine, StepStats};
pub use error::BhError;
pub use particle_store::ParticleStore;
pub use quadtree::{QuadNode, QuadTree};
pub use vector2::Vector2;
